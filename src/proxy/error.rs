//! Proxy errors

use crate::address::AddressError;
use crate::core::{DraftError, SelectionError};
use crate::ledger::LedgerError;
use crate::script::CodecError;
use thiserror::Error;

/// Errors raised by proxy operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("Proxy has not been set up")]
    NotSetUp,
    #[error("Proxy is already set up; reset it to run setup again")]
    AlreadySetUp,
    #[error("No proxy setup is pending")]
    NotPending,
    #[error("No authorization token UTxO at owner address {0}")]
    NoAuthToken(String),
    #[error("{0} requires both an anchor URL and an anchor hash")]
    MissingAnchor(&'static str),
    #[error("No funding output holds at least {minimum} lovelace for the parameter UTxO")]
    NoParamUtxo { minimum: u128 },
    #[error("No ADA-only output of at least {minimum} lovelace available as collateral")]
    NoCollateral { minimum: u128 },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Blueprint error: {0}")]
    Blueprint(String),
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
