//! # Ledger Configuration & Constants
//!
//! Derivation seeds, metadata limits and the runtime [`LedgerConfig`].
//! The seeds are part of the storage layout: changing one orphans every
//! record written under the old value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Derivation Seeds
// ---------------------------------------------------------------------------

/// Seed for per-owner balance accounts.
pub const BALANCE_SEED: &[u8] = b"createAccount";

/// Seed for per-(owner, spender) allowance records.
pub const ALLOWANCE_SEED: &[u8] = b"approveAccount";

/// Seed for the single token info slot.
pub const TOKEN_INFO_SEED: &[u8] = b"tokenInfo";

/// Seed for external holdings kept by [`crate::custody::LocalCustody`].
pub const CUSTODY_HOLDING_SEED: &[u8] = b"custodyHolding";

// ---------------------------------------------------------------------------
// Metadata Limits
// ---------------------------------------------------------------------------

/// Maximum token name length in bytes.
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum token symbol length in bytes.
pub const MAX_SYMBOL_LENGTH: usize = 10;

/// Maximum decimal places. 10^18 still fits comfortably below `u64::MAX`
/// for display scaling.
pub const MAX_DECIMALS: u8 = 18;

/// Decimals used when a caller does not specify any.
pub const DEFAULT_DECIMALS: u8 = 9;

// ---------------------------------------------------------------------------
// Mint Policy
// ---------------------------------------------------------------------------

/// Who may call `mint`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MintPolicy {
    /// Anyone may mint to any existing account.
    Open,
    /// The account owner or the token admin may mint.
    #[default]
    Holder,
    /// Only the token admin may mint. Requires an initialized token.
    Admin,
}

impl fmt::Display for MintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintPolicy::Open => write!(f, "open"),
            MintPolicy::Holder => write!(f, "holder"),
            MintPolicy::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for MintPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(MintPolicy::Open),
            "holder" => Ok(MintPolicy::Holder),
            "admin" => Ok(MintPolicy::Admin),
            other => Err(format!("unknown mint policy: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Runtime knobs for a [`crate::Ledger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Mint authorization policy.
    pub mint_policy: MintPolicy,
}

impl LedgerConfig {
    /// Config with the given mint policy.
    pub fn with_mint_policy(mint_policy: MintPolicy) -> Self {
        Self { mint_policy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_distinct() {
        let seeds = [
            BALANCE_SEED,
            ALLOWANCE_SEED,
            TOKEN_INFO_SEED,
            CUSTODY_HOLDING_SEED,
        ];
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn default_policy_is_holder() {
        assert_eq!(LedgerConfig::default().mint_policy, MintPolicy::Holder);
    }

    #[test]
    fn mint_policy_parses_case_insensitively() {
        assert_eq!("OPEN".parse::<MintPolicy>().unwrap(), MintPolicy::Open);
        assert_eq!("admin".parse::<MintPolicy>().unwrap(), MintPolicy::Admin);
        assert!("everyone".parse::<MintPolicy>().is_err());
    }

    #[test]
    fn mint_policy_serde_uses_lowercase() {
        let json = serde_json::to_string(&LedgerConfig::with_mint_policy(MintPolicy::Admin))
            .unwrap();
        assert_eq!(json, r#"{"mint_policy":"admin"}"#);

        let cfg: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.mint_policy, MintPolicy::Holder);
    }

    #[test]
    fn decimal_limits_sane() {
        assert!(DEFAULT_DECIMALS <= MAX_DECIMALS);
        assert!(10u64.checked_pow(MAX_DECIMALS as u32).is_some());
    }
}
