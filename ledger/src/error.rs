//! # Ledger Errors
//!
//! Every failed precondition aborts the whole operation and surfaces as one
//! [`LedgerError`] variant. [`ErrorKind`] is the stable, serializable tag
//! that outer layers (the node API) branch on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::custody::CustodyError;
use crate::storage::StoreError;

/// Errors returned by [`crate::Ledger`] operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A balance account already exists at the derived address.
    #[error("account already exists for owner {0}")]
    AlreadyExists(Address),

    /// `initialize` was called twice.
    #[error("token info is already initialized")]
    AlreadyInitialized,

    /// The operation needs token info and there is none.
    #[error("token info is not initialized")]
    NotInitialized,

    /// No balance account lives at the given address.
    #[error("account not found: {0}")]
    AccountNotFound(Address),

    /// The caller is not the recorded authority.
    #[error("You are not authorised for this action")]
    Unauthorized,

    /// Source balance too low.
    #[error("Account has insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Balance at the time of the check.
        available: u64,
        /// Amount the caller asked to move.
        requested: u64,
    },

    /// `transfer_from` asked for more than the remaining allowance.
    #[error(
        "You are trying to transfer more than you are allowed to: allowed {allowed}, requested {requested}"
    )]
    AllowanceExceeded {
        /// Remaining allowance.
        allowed: u64,
        /// Amount the spender asked to move.
        requested: u64,
    },

    /// A credit would exceed `u64::MAX`.
    #[error("arithmetic overflow: {current} + {credit} exceeds u64::MAX")]
    Overflow {
        /// Value before the failed credit.
        current: u64,
        /// Amount that caused the overflow.
        credit: u64,
    },

    /// Token metadata failed validation.
    #[error("invalid token metadata: {0}")]
    InvalidMetadata(String),

    /// The custody adapter refused or failed the external leg.
    #[error("custody failure: {0}")]
    CustodyFailure(#[from] CustodyError),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Stable discriminant of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AlreadyExists,
    AlreadyInitialized,
    NotInitialized,
    AccountNotFound,
    Unauthorized,
    InsufficientBalance,
    AllowanceExceeded,
    Overflow,
    InvalidMetadata,
    CustodyFailure,
    Storage,
}

impl LedgerError {
    /// Returns the error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            LedgerError::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            LedgerError::NotInitialized => ErrorKind::NotInitialized,
            LedgerError::AccountNotFound(_) => ErrorKind::AccountNotFound,
            LedgerError::Unauthorized => ErrorKind::Unauthorized,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::AllowanceExceeded { .. } => ErrorKind::AllowanceExceeded,
            LedgerError::Overflow { .. } => ErrorKind::Overflow,
            LedgerError::InvalidMetadata(_) => ErrorKind::InvalidMetadata,
            LedgerError::CustodyFailure(_) => ErrorKind::CustodyFailure,
            LedgerError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// `current + credit`, or [`LedgerError::Overflow`].
pub(crate) fn checked_credit(current: u64, credit: u64) -> LedgerResult<u64> {
    current
        .checked_add(credit)
        .ok_or(LedgerError::Overflow { current, credit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_user_facing_text() {
        assert_eq!(
            LedgerError::Unauthorized.to_string(),
            "You are not authorised for this action"
        );
        assert!(LedgerError::InsufficientBalance {
            available: 0,
            requested: 1000
        }
        .to_string()
        .starts_with("Account has insufficient balance"));
        assert!(LedgerError::AllowanceExceeded {
            allowed: 1000,
            requested: 10_000
        }
        .to_string()
        .starts_with("You are trying to transfer more than you are allowed to"));
    }

    #[test]
    fn custody_error_converts() {
        let err: LedgerError = CustodyError::Rejected("vault frozen".into()).into();
        assert_eq!(err.kind(), ErrorKind::CustodyFailure);
    }

    #[test]
    fn checked_credit_detects_overflow() {
        assert_eq!(checked_credit(1, 2).unwrap(), 3);
        assert!(matches!(
            checked_credit(u64::MAX, 1),
            Err(LedgerError::Overflow {
                current: u64::MAX,
                credit: 1
            })
        ));
    }

    #[test]
    fn kind_serializes_as_variant_name() {
        let json = serde_json::to_string(&ErrorKind::AllowanceExceeded).unwrap();
        assert_eq!(json, "\"AllowanceExceeded\"");
    }
}
