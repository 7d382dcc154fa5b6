//! Exporter configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, `ECS_EXPORTER_*` environment variables, command line flags.

use anyhow::{ensure, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "ECS_EXPORTER";

/// Prometheus exporter for ECS task metadata and stats
#[derive(Debug, Default, Parser)]
#[command(name = "ecs-exporter", version, about)]
pub struct Cli {
    /// Address to serve metrics on
    #[arg(long)]
    pub addr: Option<String>,

    /// Path to a config file (toml, yaml or json)
    #[arg(long, env = "ECS_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Task metadata endpoint, instead of ECS_CONTAINER_METADATA_URI_V4
    #[arg(long)]
    pub metadata_endpoint: Option<String>,
}

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Socket address for the metrics server
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Metadata endpoint; taken from the container environment when unset
    #[serde(default)]
    pub metadata_endpoint: Option<String>,

    /// Deadline for each metadata request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:9779".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

impl ExporterConfig {
    /// Load configuration from all sources
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with_env(cli, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(cli: &Cli, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("listen_addr", default_listen_addr())?
            .set_default("request_timeout_secs", default_request_timeout())?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let config = builder
            .add_source(env.try_parsing(true))
            .set_override_option("listen_addr", cli.addr.clone())?
            .set_override_option("metadata_endpoint", cli.metadata_endpoint.clone())?
            .build()
            .context("failed to read configuration")?;

        let config: ExporterConfig = config.try_deserialize().context("invalid configuration")?;
        ensure!(
            config.request_timeout_secs > 0,
            "request_timeout_secs must be positive"
        );

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Listen address with an empty host (`:9779`) bound to all interfaces
    pub fn bind_addr(&self) -> String {
        match self.listen_addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen_addr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::load_with_env(&Cli::default(), env(&[])).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:9779");
        assert_eq!(config.metadata_endpoint, None);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = config_file(
            "listen_addr = \"127.0.0.1:9000\"\n\
             metadata_endpoint = \"http://169.254.170.2/v4/abc\"\n",
        );
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };

        let config = ExporterConfig::load_with_env(&cli, env(&[])).unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(
            config.metadata_endpoint.as_deref(),
            Some("http://169.254.170.2/v4/abc")
        );
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_env_overrides_file_and_flags_override_env() {
        let file = config_file("listen_addr = \"127.0.0.1:9000\"\nrequest_timeout_secs = 2\n");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };
        let vars = [
            ("ECS_EXPORTER_LISTEN_ADDR", "127.0.0.1:9100"),
            ("ECS_EXPORTER_REQUEST_TIMEOUT_SECS", "7"),
        ];

        let config = ExporterConfig::load_with_env(&cli, env(&vars)).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9100");
        assert_eq!(config.request_timeout_secs, 7);

        let cli = Cli {
            addr: Some("127.0.0.1:9200".to_string()),
            ..cli
        };
        let config = ExporterConfig::load_with_env(&cli, env(&vars)).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9200");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/ecs-exporter.toml")),
            ..Cli::default()
        };

        assert!(ExporterConfig::load_with_env(&cli, env(&[])).is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let vars = [("ECS_EXPORTER_REQUEST_TIMEOUT_SECS", "0")];
        assert!(ExporterConfig::load_with_env(&Cli::default(), env(&vars)).is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "ecs-exporter",
            "--addr",
            ":9779",
            "--metadata-endpoint",
            "http://localhost:51678/v4",
        ]);

        assert_eq!(cli.addr.as_deref(), Some(":9779"));
        assert_eq!(
            cli.metadata_endpoint.as_deref(),
            Some("http://localhost:51678/v4")
        );

        let config = ExporterConfig::load_with_env(&cli, env(&[])).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9779");
    }
}
