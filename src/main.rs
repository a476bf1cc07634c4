//! convertd - CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use convertd::{
    cli::Args,
    config::{validate_config, Config},
    error::{exit_codes, Error, Result},
    output::{
        print_banner, print_config_summary, print_error, print_info, print_success, print_warning,
    },
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_) | Error::ConfigValidation { .. } | Error::TomlParse(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::Io(_) => ExitCode::from(exit_codes::SERVER_ERROR as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    print_banner();

    let config_path = args.config.clone();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        if !args.write_config {
            print_warning(&format!(
                "Configuration file not found: {}",
                config_path.display()
            ));
            print_info("Using default configuration with CLI arguments");
        }
        Config::default()
    };

    args.merge_into_config(&mut config);
    validate_config(&config)?;

    if args.write_config {
        config.save(&config_path)?;
        print_success(&format!("Configuration written to {}", config_path.display()));
        return Ok(());
    }

    print_config_summary(&config);

    let state = AppState::from_config(&config)?;
    server::serve(&config, state).await
}
