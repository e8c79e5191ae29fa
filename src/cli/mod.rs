//! Command-line interface: configuration file path, log level, and an
//! optional bind-address override.

use crate::core::{Config, LokiError, Result};
use clap::Parser;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "loki.yml";

/// Distributed-tracing aggregator: agent-side span collector and two-tier
/// span store behind a Zipkin-compatible query API.
#[derive(Parser, Debug)]
#[command(name = "loki")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the scrape configuration file.
    #[arg(long = "config.file", env = "LOKI_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Log level passed to the tracing subscriber (`error`, `warn`, `info`,
    /// `debug`, `trace`), overridden by `RUST_LOG` if set.
    #[arg(long = "log-level", env = "LOKI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Override the query API's bind address from the config file.
    #[arg(long, env = "LOKI_BIND")]
    pub bind: Option<std::net::SocketAddr>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Install the global tracing subscriber.
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.clone()));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| LokiError::config(format!("failed to initialize logging: {e}")))?;

        Ok(())
    }

    /// Load the scrape configuration, falling back to defaults when the
    /// file path was never overridden and doesn't exist.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = if self.config_file.exists() {
            Config::load_file(&self.config_file)?
        } else if self.config_file == PathBuf::from(DEFAULT_CONFIG_FILE) {
            Config::default()
        } else {
            return Err(LokiError::config(format!(
                "config file {} not found",
                self.config_file.display()
            )));
        };

        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }

        Ok(config)
    }
}

/// Parse CLI args, wire up logging and configuration, and run the collector
/// until it receives a shutdown signal.
pub async fn execute(cli: Cli) -> Result<()> {
    cli.init_logging()?;
    let config = cli.load_config()?;
    crate::run(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(config_file: &str) -> Cli {
        Cli {
            config_file: PathBuf::from(config_file),
            log_level: "info".to_string(),
            bind: None,
        }
    }

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let config = cli("loki.yml").load_config().unwrap();
        assert_eq!(config.server.bind_address.port(), 3100);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(cli("/nonexistent/path.yml").load_config().is_err());
    }

    #[test]
    fn bind_flag_overrides_config() {
        let mut c = cli("loki.yml");
        c.bind = Some("127.0.0.1:9999".parse().unwrap());
        let config = c.load_config().unwrap();
        assert_eq!(config.server.bind_address.port(), 9999);
    }
}
