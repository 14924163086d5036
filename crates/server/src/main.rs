//! filedrop
//!
//! Password-gated HTTP file sharing server.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use server::config::{Config, ConfigOverrides};
use server::files::FileStore;
use server::http::HttpServer;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle used to swap in the configured log level once config is loaded.
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// filedrop - share files over HTTP behind a single password.
#[derive(Parser, Debug)]
#[command(name = "filedrop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The directory to which uploaded files will be saved [default: .]
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// The password required to upload and download files [default: password]
    #[arg(short, long)]
    pub password: Option<String>,

    /// The port on which the server will listen [default: 3000]
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// The address on which the server will listen [default: 0.0.0.0]
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Resolve download names against the working directory instead of the storage directory
    #[arg(long)]
    pub download_from_cwd: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            dir: self.dir.clone(),
            password: self.password.clone(),
            port: self.port,
            bind_address: self.bind.clone(),
            download_from_cwd: self.download_from_cwd,
            verbose: self.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = init_logging(cli.verbose);

    let config = load_config(&cli)?;
    if let Some(handle) = &log_filter {
        handle
            .reload(EnvFilter::new(config.server.log_level.to_lowercase()))
            .context("Failed to apply configured log level")?;
    }

    FileStore::from_config(&config.storage)
        .ensure_root()
        .await
        .with_context(|| {
            format!(
                "Failed to create storage directory: {}",
                config.storage.dir.display()
            )
        })?;

    let storage_dir = config.storage.dir.clone();
    let server = HttpServer::bind(config)
        .await
        .context("Failed to bind HTTP listener")?;
    let addr = server.local_addr()?;

    tracing::info!(storage = %storage_dir.display(), "Server listening on port {}", addr.port());

    server.serve(wait_for_shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Load the config file, then apply environment and command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    config.apply_env_overrides();
    config.apply_overrides(cli.overrides());
    config.validate()?;

    Ok(config)
}

/// Install the global subscriber before any config is read.
///
/// Info and below go to stdout; warnings and errors go to stderr. Returns a
/// reload handle unless `RUST_LOG` fixes the filter.
fn init_logging(verbose: bool) -> Option<FilterHandle> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(if verbose { "debug" } else { "info" }), false),
    };
    let (filter, handle) = reload::Layer::new(filter);
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer))
        .init();

    (!from_env).then_some(handle)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {
            tracing::info!("Received SIGINT");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn cli_with_config(temp_dir: &TempDir, extra: &[&str]) -> Cli {
        let config_path = temp_dir.path().join("config.toml");
        let mut args = vec!["filedrop", "-c", config_path.to_str().unwrap()];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    #[serial]
    fn test_env_override_warnings_reach_subscriber() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli_with_config(&temp_dir, &[]);
        std::env::set_var("FILEDROP_PORT", "eighty");

        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let config = tracing::subscriber::with_default(subscriber, || load_config(&cli));
        std::env::remove_var("FILEDROP_PORT");

        assert_eq!(config.unwrap().server.port, 3000);
        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Ignoring invalid FILEDROP_PORT"), "{output}");
    }

    #[test]
    #[serial]
    fn test_load_config_layers() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "[server]\nport = 8080\n\n[auth]\npassword = \"from-file\"\n",
        )
        .unwrap();
        let cli = cli_with_config(&temp_dir, &["-p", "secret"]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.password, "secret");
    }

    #[test]
    #[serial]
    fn test_load_config_rejects_empty_password() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli_with_config(&temp_dir, &["-p", ""]);

        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("password must not be empty"));
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "filedrop", "-d", "./data", "-p", "secret", "-P", "4000",
        ])
        .unwrap();

        assert_eq!(cli.dir, Some(PathBuf::from("./data")));
        assert_eq!(cli.password.as_deref(), Some("secret"));
        assert_eq!(cli.port, Some(4000));
        assert!(!cli.download_from_cwd);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "filedrop",
            "--dir",
            "./data",
            "--password",
            "secret",
            "--port",
            "4000",
            "--download-from-cwd",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.dir, Some(PathBuf::from("./data")));
        assert_eq!(overrides.password.as_deref(), Some("secret"));
        assert_eq!(overrides.port, Some(4000));
        assert!(overrides.download_from_cwd);
    }

    #[test]
    fn test_no_flags_leave_defaults() {
        let cli = Cli::try_parse_from(["filedrop"]).unwrap();

        let mut config = Config::default();
        config.apply_overrides(cli.overrides());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["filedrop", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Cli::try_parse_from(["filedrop", "-P", "99999"]).is_err());
    }
}
