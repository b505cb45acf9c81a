//! # CLI Interface
//!
//! Command-line structure for `wrapt-node`, built with `clap` derive.
//! Subcommands: `run`, `init` and `version`.
//!
//! Every `run` flag is optional. When present it overrides the matching
//! value from `config.toml`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wrapt_ledger::MintPolicy;

/// Wrapt ledger node.
///
/// Serves the Wrapt token ledger over HTTP: accounts, transfers,
/// allowances and vault-backed wrapping, plus Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "wrapt-node",
    about = "Wrapt ledger node",
    version,
    propagate_version = true
)]
pub struct WraptNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create the data directory and write a default `config.toml`.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, the node looks for `config.toml` in the data directory
    /// and falls back to built-in defaults.
    #[arg(long, short = 'c', env = "WRAPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the ledger database and `config.toml`.
    #[arg(long, short = 'd', env = "WRAPT_DATA_DIR", default_value = ".wrapt")]
    pub data_dir: PathBuf,

    /// Address the API and metrics listeners bind to.
    #[arg(long, env = "WRAPT_BIND")]
    pub bind: Option<String>,

    /// Port for the REST API.
    #[arg(long, env = "WRAPT_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "WRAPT_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Who may mint: open, holder or admin.
    #[arg(long, env = "WRAPT_MINT_POLICY")]
    pub mint_policy: Option<MintPolicy>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "WRAPT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format: pretty or json.
    #[arg(long, env = "WRAPT_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Expose `POST /custody/fund` for devnets.
    #[arg(long, env = "WRAPT_FAUCET")]
    pub faucet: bool,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "WRAPT_DATA_DIR", default_value = ".wrapt")]
    pub data_dir: PathBuf,

    /// Overwrite an existing `config.toml`.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        WraptNodeCli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = WraptNodeCli::try_parse_from([
            "wrapt-node",
            "run",
            "--rpc-port",
            "8000",
            "--mint-policy",
            "admin",
            "--faucet",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.rpc_port, Some(8000));
                assert_eq!(args.mint_policy, Some(MintPolicy::Admin));
                assert!(args.faucet);
                assert!(args.metrics_port.is_none());
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn unknown_mint_policy_rejected() {
        let result =
            WraptNodeCli::try_parse_from(["wrapt-node", "run", "--mint-policy", "everyone"]);
        assert!(result.is_err());
    }
}
