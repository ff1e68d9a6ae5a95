//! Ledger index collaborator
//!
//! The core never talks to a node directly. It reads UTxOs and account
//! or governance documents through `LedgerIndex` and submits signed
//! transactions through the same trait.

pub mod index;
pub mod memory;
pub mod types;

pub use index::{account_addresses_path, fetch_account_addresses, LedgerError, LedgerIndex};
pub use memory::{LedgerSnapshot, MemoryLedger};
pub use types::{Asset, TxIn, TxOut, Utxo, LOVELACE, LOVELACE_PER_ADA};
