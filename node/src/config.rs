//! Node configuration file (`config.toml`).
//!
//! ```toml
//! [ledger]
//! mint_policy = "holder"
//!
//! [server]
//! bind = "127.0.0.1"
//! rpc_port = 9841
//! metrics_port = 9842
//!
//! [logging]
//! level = "wrapt_node=info,wrapt_ledger=info,tower_http=debug"
//! format = "pretty"
//!
//! [custody]
//! faucet_enabled = false
//! ```
//!
//! Every key is optional. Missing keys take the defaults shown above.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use wrapt_ledger::LedgerConfig;

use crate::cli::RunArgs;
use crate::logging::{LogFormat, DEFAULT_LOG_LEVEL};

/// File name looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_RPC_PORT: u16 = 9841;
pub const DEFAULT_METRICS_PORT: u16 = 9842;
pub const DEFAULT_BIND: &str = "127.0.0.1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub custody: CustodyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub rpc_port: u16,
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Serve the local-custody faucet (`POST /custody/fund`).
    pub faucet_enabled: bool,
}

impl NodeConfig {
    /// Parses a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid node configuration")
    }

    /// Renders the config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize node configuration")
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Resolves the config for `run`: an explicit `--config` must exist,
    /// otherwise `<data_dir>/config.toml` is used if present, otherwise the
    /// defaults. CLI flags are applied last.
    pub fn resolve(args: &RunArgs) -> Result<(Self, Option<PathBuf>)> {
        let (mut config, source) = match &args.config {
            Some(path) => (Self::load(path)?, Some(path.clone())),
            None => {
                let candidate = args.data_dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    (Self::load(&candidate)?, Some(candidate))
                } else {
                    (Self::default(), None)
                }
            }
        };
        config.apply_overrides(args);
        Ok((config, source))
    }

    /// Overlays the flags that were actually given on the command line.
    pub fn apply_overrides(&mut self, args: &RunArgs) {
        if let Some(bind) = &args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(port) = args.rpc_port {
            self.server.rpc_port = port;
        }
        if let Some(port) = args.metrics_port {
            self.server.metrics_port = port;
        }
        if let Some(policy) = args.mint_policy {
            self.ledger.mint_policy = policy;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            self.logging.format = LogFormat::from_str_lossy(format);
        }
        if args.faucet {
            self.custody.faucet_enabled = true;
        }
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.rpc_port)
    }

    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.metrics_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrapt_ledger::MintPolicy;

    #[test]
    fn empty_document_gives_defaults() {
        let config = NodeConfig::from_toml("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.rpc_addr(), "127.0.0.1:9841");
    }

    #[test]
    fn partial_sections_fill_in() {
        let config = NodeConfig::from_toml(
            r#"
            [ledger]
            mint_policy = "admin"

            [server]
            rpc_port = 7000

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.mint_policy, MintPolicy::Admin);
        assert_eq!(config.server.rpc_port, 7000);
        assert_eq!(config.server.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.custody.faucet_enabled);
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let result = NodeConfig::from_toml("[ledger]\nmint_policy = \"everyone\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn default_config_survives_toml() {
        let mut config = NodeConfig::default();
        config.custody.faucet_enabled = true;
        let text = config.to_toml().unwrap();
        assert_eq!(NodeConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn flags_override_file() {
        let mut config = NodeConfig::from_toml("[server]\nrpc_port = 7000\n").unwrap();
        let args = RunArgs {
            rpc_port: Some(8000),
            mint_policy: Some(MintPolicy::Open),
            log_format: Some("json".into()),
            faucet: true,
            ..RunArgs::default()
        };
        config.apply_overrides(&args);

        assert_eq!(config.server.rpc_port, 8000);
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.ledger.mint_policy, MintPolicy::Open);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.custody.faucet_enabled);
    }

    #[test]
    fn resolve_reads_config_from_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[custody]\nfaucet_enabled = true\n",
        )
        .unwrap();

        let args = RunArgs {
            data_dir: dir.path().to_path_buf(),
            ..RunArgs::default()
        };
        let (config, source) = NodeConfig::resolve(&args).unwrap();
        assert!(config.custody.faucet_enabled);
        assert_eq!(source, Some(dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn resolve_without_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = RunArgs {
            data_dir: dir.path().to_path_buf(),
            ..RunArgs::default()
        };
        let (config, source) = NodeConfig::resolve(&args).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(source.is_none());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let args = RunArgs {
            config: Some(PathBuf::from("/nonexistent/wrapt.toml")),
            ..RunArgs::default()
        };
        assert!(NodeConfig::resolve(&args).is_err());
    }
}
