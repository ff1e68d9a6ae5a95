//! Ledger index collaborator
//!
//! The index answers UTxO queries, generic JSON lookups for account and
//! governance endpoints, and accepts signed transactions. Every call can
//! fail with a distinguished "not found".

use crate::ledger::types::Utxo;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Ledger index errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Ledger index request failed: {0}")]
    Fetch(String),
    #[error("Unexpected ledger index response: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Decode(err.to_string())
    }
}

/// Query and submission interface of a ledger index
#[async_trait]
pub trait LedgerIndex: Send + Sync {
    /// Unspent outputs currently at an address
    async fn fetch_address_utxos(&self, address: &str) -> Result<Vec<Utxo>, LedgerError>;

    /// Raw JSON document at an index path (e.g. `governance/dreps/{id}`)
    async fn get(&self, path: &str) -> Result<serde_json::Value, LedgerError>;

    /// Submit a signed transaction, returning its hash
    async fn submit_tx(&self, signed_tx: &[u8]) -> Result<String, LedgerError>;
}

#[derive(Deserialize)]
struct AccountAddress {
    address: String,
}

/// Path listing the addresses ever associated with a stake account
pub fn account_addresses_path(stake_address: &str) -> String {
    format!("accounts/{}/addresses", stake_address)
}

/// Addresses historically associated with a stake account
///
/// An unknown account has no addresses rather than being an error.
pub async fn fetch_account_addresses<L: LedgerIndex + ?Sized>(
    ledger: &L,
    stake_address: &str,
) -> Result<Vec<String>, LedgerError> {
    match ledger.get(&account_addresses_path(stake_address)).await {
        Ok(doc) => {
            let entries: Vec<AccountAddress> = serde_json::from_value(doc)?;
            Ok(entries.into_iter().map(|e| e.address).collect())
        }
        Err(LedgerError::NotFound(_)) => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}
