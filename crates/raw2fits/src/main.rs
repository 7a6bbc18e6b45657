//! raw2fits CLI - batch conversion of camera RAW files into FITS images.
//!
//! Every supported RAW file in a directory is decoded and written as one or
//! more FITS files carrying the observation metadata from the config file and
//! the camera.
//!
//! # Usage
//!
//! ```bash
//! # Convert a night's frames into red-channel FITS files
//! raw2fits convert --input ~/raw --output ~/fits --object M31 --mode red-only
//!
//! # List the RAW files a conversion would pick up
//! raw2fits scan ~/raw
//!
//! # View configuration
//! raw2fits config show
//! ```

use clap::{Parser, Subcommand};
use raw2fits_core::Config;
use std::path::Path;

mod cli;
mod logging;

/// raw2fits - Batch converter from camera RAW files to FITS images.
#[derive(Parser, Debug)]
#[command(name = "raw2fits")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert every RAW file in a directory to FITS
    Convert(cli::convert::ConvertArgs),

    /// List supported RAW files in a directory
    Scan(cli::scan::ScanArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let explicit = match &cli.command {
        Commands::Convert(args) => args.config.as_deref(),
        _ => None,
    };
    let config = match load_config(explicit) {
        Ok(config) => config,
        // An explicitly requested file must load
        Err(e) if explicit.is_some() => return Err(e.into()),
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `raw2fits config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("raw2fits v{}", raw2fits_core::VERSION);

    match cli.command {
        Commands::Convert(args) => cli::convert::execute(args, config).await,
        Commands::Scan(args) => cli::scan::execute(args).await,
        Commands::Config(args) => cli::config::execute(args, config).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, raw2fits_core::ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw2fits_core::{FrameMode, NamingPolicy};

    #[test]
    fn test_parse_convert_flags() {
        let cli = Cli::try_parse_from([
            "raw2fits",
            "-v",
            "convert",
            "--input",
            "/raw",
            "--object",
            "M31",
            "--naming",
            "1",
            "--mode",
            "red-only",
            "-j",
            "4",
            "--overwrite",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.object.as_deref(), Some("M31"));
        assert_eq!(args.naming, Some(NamingPolicy::ObjectDatetime));
        assert_eq!(args.mode, Some(FrameMode::RedOnly));
        assert_eq!(args.workers, Some(4));
        assert!(args.overwrite);
    }

    #[test]
    fn test_rejects_bad_mode() {
        assert!(Cli::try_parse_from(["raw2fits", "convert", "--mode", "7"]).is_err());
    }

    #[test]
    fn test_config_init_force_flag() {
        let cli = Cli::try_parse_from(["raw2fits", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(cli::config::ConfigArgs {
                command: cli::config::ConfigCommand::Init { force: true }
            })
        ));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("missing.toml").as_path())).is_err());
    }
}
