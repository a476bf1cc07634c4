//! Configuration structures and loading logic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::fs::DEFAULT_MAX_NAME_ATTEMPTS;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub speech: SpeechConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    pub port: u16,

    /// Service name reported by `/api/` and `/health`.
    pub title: String,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,

    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            title: "Conversion Tools API".to_string(),
            max_upload_bytes: 100 * 1024 * 1024,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
        }
    }
}

/// Storage root and naming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory containing `uploads/` and `outputs/`.
    pub root: PathBuf,

    /// Public prefix that `/downloads` is reachable under.
    pub download_base_url: String,

    /// Numbered candidates probed before naming gives up.
    pub max_name_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
            download_base_url: "http://localhost:8000/downloads".to_string(),
            max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
        }
    }
}

/// External program locations and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-invocation timeout for external programs.
    pub timeout_secs: u64,

    /// Office suite binaries, tried in order.
    pub office_binaries: Vec<String>,

    pub ghostscript: String,
    pub qpdf: String,
    pub cpdf: String,
    pub pdftoppm: String,
    pub pdftotext: String,
    /// OCR engine for PDFs without a text layer.
    pub tesseract: String,
    pub img2pdf: String,
    pub rembg: String,
    pub zip: String,
    pub gtts: String,
    pub ffmpeg: String,

    /// Resolution for PDF page rasterisation.
    pub jpg_dpi: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            office_binaries: vec![
                "libreoffice".to_string(),
                "soffice".to_string(),
                "/usr/bin/libreoffice".to_string(),
            ],
            ghostscript: "gs".to_string(),
            qpdf: "qpdf".to_string(),
            cpdf: "cpdf".to_string(),
            pdftoppm: "pdftoppm".to_string(),
            pdftotext: "pdftotext".to_string(),
            tesseract: "tesseract".to_string(),
            img2pdf: "img2pdf".to_string(),
            rembg: "rembg".to_string(),
            zip: "zip".to_string(),
            gtts: "gtts-cli".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            jpg_dpi: 200,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Language used for `auto` when the text's own language cannot be spoken.
    pub default_language: String,

    /// Pitch shift applied for the male voice.
    pub male_pitch_octaves: f64,

    /// Sample rate of the synthesized audio.
    pub sample_rate: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            male_pitch_octaves: -0.2,
            sample_rate: 24_000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one with --write-config",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Parsed download base URL.
    pub fn download_base(&self) -> Result<Url> {
        Ok(Url::parse(&self.storage.download_base_url)?)
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [storage]
            root = "/var/lib/convertd"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/convertd"));
        assert_eq!(config.storage.max_name_attempts, DEFAULT_MAX_NAME_ATTEMPTS);
        assert_eq!(config.tools.office_binaries.len(), 3);
        assert_eq!(config.speech.default_language, "en");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convertd.toml");

        let mut config = Config::default();
        config.tools.timeout_secs = 30;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.tools.timeout(), Duration::from_secs(30));
        assert_eq!(loaded.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/convertd.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
