//! Error classification
//!
//! Every error type in the crate maps onto one of five classes, so
//! callers can decide what to tell an operator without matching on each
//! module's variants. None of them is retried automatically.

use crate::address::AddressError;
use crate::core::{DraftError, SelectionError};
use crate::ledger::LedgerError;
use crate::multisig::ImportError;
use crate::proxy::ProxyError;
use crate::script::{CodecError, PolicyError};
use serde::Serialize;
use std::fmt;

/// Error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed address, key hash, script or other caller input
    Validation,
    /// Funding, collateral or balance shortfall
    InsufficientFunds,
    /// The ledger index has no such entity
    NotFound,
    /// The ledger index or another provider failed
    ExternalFetch,
    /// The operation cannot run in the current state (no auth token,
    /// missing anchor, proxy not set up)
    ProtocolPrecondition,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientFunds => "insufficient funds",
            ErrorKind::NotFound => "not found",
            ErrorKind::ExternalFetch => "external fetch",
            ErrorKind::ProtocolPrecondition => "protocol precondition",
        })
    }
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl SelectionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InsufficientFunds
    }
}

impl DraftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DraftError::Unbalanced { .. }
            | DraftError::MissingCollateral
            | DraftError::OutputBelowMinimum { .. }
            | DraftError::ChangeBelowMinimum { .. } => ErrorKind::InsufficientFunds,
            DraftError::NoInputs | DraftError::MissingChangeAddress => ErrorKind::Validation,
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Fetch(_) | LedgerError::Decode(_) => ErrorKind::ExternalFetch,
        }
    }
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::NotSetUp
            | ProxyError::AlreadySetUp
            | ProxyError::NotPending
            | ProxyError::NoAuthToken(_)
            | ProxyError::MissingAnchor(_) => ErrorKind::ProtocolPrecondition,
            ProxyError::NoParamUtxo { .. } | ProxyError::NoCollateral { .. } => {
                ErrorKind::InsufficientFunds
            }
            ProxyError::InvalidRequest(_)
            | ProxyError::Blueprint(_)
            | ProxyError::Address(_)
            | ProxyError::Codec(_) => ErrorKind::Validation,
            ProxyError::Selection(err) => err.kind(),
            ProxyError::Draft(err) => err.kind(),
            ProxyError::Ledger(err) => err.kind(),
        }
    }
}
