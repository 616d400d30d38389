//! Command-line interface for the index server
//!
//! This module contains argument parsing, command definitions, and command
//! execution. Every server setting can also come from a `SIMPLE_PYPI_*`
//! environment variable or a JSON config file.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

use crate::client::IndexClient;
use crate::config::{Config, ConfigFile, DEFAULT_HOST, DEFAULT_PORT};
use crate::digest::DigestAlgorithm;
use crate::index::{IndexSnapshot, ScanPolicy};
use crate::server;
use crate::state::IndexState;

/// Command-line interface for the index server
#[derive(Debug, Parser)]
#[command(name = "simple-pypi")]
#[command(about = "Serve a directory of wheels and sdists as a PEP 503 simple index")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Server settings shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Host to bind the server to
    #[arg(long, env = "SIMPLE_PYPI_HOST", global = true)]
    pub host: Option<String>,

    /// Port to run the server on
    #[arg(long, env = "SIMPLE_PYPI_PORT", global = true)]
    pub port: Option<u16>,

    /// Directory holding the package files
    #[arg(long, env = "SIMPLE_PYPI_PKG_DIR", global = true)]
    pub package_dir: Option<PathBuf>,

    /// Digest shown in package page link fragments
    #[arg(long = "hash", env = "SIMPLE_PYPI_HASH", value_enum, global = true)]
    pub hash_algorithm: Option<DigestAlgorithm>,

    /// What to do with package files that cannot be indexed
    #[arg(long, env = "SIMPLE_PYPI_SCAN_POLICY", value_enum, global = true)]
    pub scan_policy: Option<ScanPolicy>,

    /// Answer every request with status 200
    #[arg(long = "legacy-status", env = "SIMPLE_PYPI_LEGACY_STATUS", global = true)]
    pub legacy_status_codes: bool,

    /// JSON config file; flags and environment variables take precedence
    #[arg(long, env = "SIMPLE_PYPI_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Explicitly given settings, to be layered over the config file.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            host: self.host.clone(),
            port: self.port,
            // An empty SIMPLE_PYPI_PKG_DIR counts as unset.
            package_dir: self
                .package_dir
                .clone()
                .filter(|dir| !dir.as_os_str().is_empty()),
            hash_algorithm: self.hash_algorithm,
            scan_policy: self.scan_policy,
            legacy_status_codes: self.legacy_status_codes.then_some(true),
        }
    }

    /// Fully resolved configuration; logs the reason when it is invalid.
    pub fn resolve(&self) -> Result<Config> {
        Config::resolve(self.config.as_deref(), self.overrides()).map_err(|e| {
            error!(error = %e, "Invalid configuration");
            e.into()
        })
    }

    /// Server URL derived from host and port alone, for client commands.
    pub fn server_url(&self) -> Result<String> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        let host = self
            .host
            .clone()
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = self.port.or(file.port).unwrap_or(DEFAULT_PORT);
        Ok(format!("http://{host}:{port}"))
    }
}

/// Available commands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Build the index and serve it until Ctrl-C (default)
    Serve,
    /// Build the index once and print what would be served
    Check,
    /// Ask a running server to re-scan its package directory
    Rebuild {
        /// Server URL (defaults to the configured host and port)
        #[arg(long)]
        server: Option<String>,
    },
}

/// Execute the CLI command
pub async fn run() -> Result<()> {
    let _log_guard = simple_pypi_logging::init_subscriber();

    let cli = Cli::parse();
    handle_command(cli.command.unwrap_or(Commands::Serve), &cli.config).await
}

/// Handle individual commands
async fn handle_command(command: Commands, args: &ConfigArgs) -> Result<()> {
    match command {
        Commands::Serve => handle_serve(args).await,
        Commands::Check => handle_check(args).await,
        Commands::Rebuild { server } => handle_rebuild(args, server).await,
    }
}

async fn handle_serve(args: &ConfigArgs) -> Result<()> {
    let config = args.resolve()?;
    info!(host = %config.host, port = config.port, "Starting simple index server");
    server::run_server(config).await
}

async fn handle_check(args: &ConfigArgs) -> Result<()> {
    let config = args.resolve()?;
    let package_dir = config.package_dir.clone();

    let index = tokio::task::spawn_blocking(move || {
        IndexState::open(
            &config.package_dir,
            config.hash_algorithm,
            config.scan_policy,
        )
    })
    .await??;

    print_snapshot(&package_dir, &index.current());
    Ok(())
}

async fn handle_rebuild(args: &ConfigArgs, server: Option<String>) -> Result<()> {
    let server = match server {
        Some(url) => url,
        None => args.server_url()?,
    };

    let message = tokio::task::spawn_blocking(move || -> Result<String> {
        let client = IndexClient::new(&server)?;
        client.rebuild()
    })
    .await??;

    println!("{} {}", "✅".green(), message.trim());
    Ok(())
}

fn print_snapshot(package_dir: &Path, snapshot: &IndexSnapshot) {
    println!(
        "\n{} {}",
        "📦 Package index for".bright_cyan().bold(),
        package_dir.display()
    );

    if snapshot.is_empty() {
        println!("   {}", "No package files found".yellow());
    }

    for (key, records) in snapshot.packages() {
        println!("\n{}", key.bold());
        for record in records {
            println!(
                "   {:<12} {:<48} {:>10}  {}",
                record.full_version,
                record.filename,
                record.size,
                record.digest.fragment().dimmed()
            );
        }
    }

    println!(
        "\n{} packages, {} files",
        snapshot.package_count(),
        snapshot.artifact_count()
    );

    if !snapshot.skipped().is_empty() {
        println!("\n{}", "⚠️  Skipped files:".yellow().bold());
        for entry in snapshot.skipped() {
            println!("   {} ({})", entry.filename.red(), entry.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("simple-pypi").chain(args.iter().copied()))
            .expect("should parse arguments")
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = parse(&["--package-dir", "/srv/wheels"]);
        assert!(cli.command.is_none());
        assert_eq!(
            cli.config.overrides().package_dir,
            Some(PathBuf::from("/srv/wheels"))
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "check",
            "--package-dir",
            "/srv/wheels",
            "--hash",
            "sha256",
            "--scan-policy",
            "skip-invalid",
            "--legacy-status",
        ]);
        assert!(matches!(cli.command, Some(Commands::Check)));

        let overrides = cli.config.overrides();
        assert_eq!(overrides.hash_algorithm, Some(DigestAlgorithm::Sha256));
        assert_eq!(overrides.scan_policy, Some(ScanPolicy::SkipInvalid));
        assert_eq!(overrides.legacy_status_codes, Some(true));
    }

    #[test]
    fn test_unset_flags_do_not_override_file() {
        let overrides = ConfigArgs::default().overrides();
        assert_eq!(overrides, ConfigFile::default());
    }

    #[test]
    fn test_empty_package_dir_is_a_config_error() {
        let args = ConfigArgs {
            package_dir: Some(PathBuf::new()),
            ..Default::default()
        };
        let err = args.resolve().unwrap_err();
        assert!(err
            .to_string()
            .contains("SIMPLE_PYPI_PKG_DIR must not be empty"));
    }

    #[test]
    fn test_rebuild_server_url() {
        let cli = parse(&["rebuild", "--server", "http://index.local:9000"]);
        match cli.command {
            Some(Commands::Rebuild { server }) => {
                assert_eq!(server.as_deref(), Some("http://index.local:9000"))
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = ConfigArgs {
            host: Some("0.0.0.0".to_string()),
            port: Some(9100),
            ..Default::default()
        };
        assert_eq!(args.server_url().unwrap(), "http://0.0.0.0:9100");
        assert_eq!(
            ConfigArgs::default().server_url().unwrap(),
            "http://127.0.0.1:8888"
        );
    }
}
