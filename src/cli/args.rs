//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// File conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "convertd",
    version,
    about = "HTTP service for office, PDF, image and speech conversions",
    long_about = "Serves conversion tools over HTTP.\n\n\
                  Uploads are kept per tool and every output gets a name that does not \
                  collide with earlier outputs."
)]
pub struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "convertd.toml", env = "CONVERTD_CONFIG")]
    pub config: PathBuf,

    /// Address to bind.
    #[arg(long, env = "CONVERTD_HOST")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "CONVERTD_PORT")]
    pub port: Option<u16>,

    /// Storage root holding uploads/ and outputs/.
    #[arg(short, long, env = "CONVERTD_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Public URL prefix for download links.
    #[arg(long = "download-base", env = "CONVERTD_DOWNLOAD_BASE")]
    pub download_base: Option<String>,

    /// Write the effective configuration to --config and exit.
    #[arg(long)]
    pub write_config: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }

        if let Some(port) = self.port {
            config.server.port = port;
        }

        if let Some(root) = &self.storage {
            config.storage.root = root.clone();
        }

        if let Some(base) = &self.download_base {
            config.storage.download_base_url = base.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "convertd",
            "--port",
            "9100",
            "--storage",
            "/srv/convertd",
            "--download-base",
            "https://tools.example.com/downloads",
        ]);
        let mut config = Config::default();
        args.merge_into_config(&mut config);

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.root, PathBuf::from("/srv/convertd"));
        assert_eq!(
            config.storage.download_base_url,
            "https://tools.example.com/downloads"
        );
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::parse_from(["convertd"]);
        let mut config = Config::default();
        args.merge_into_config(&mut config);

        assert_eq!(config.server.port, 8000);
        assert!(!args.write_config);
    }
}
