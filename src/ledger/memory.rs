//! In-memory ledger index
//!
//! Serves UTxOs and JSON documents from maps. Used by the CLI with a
//! snapshot file and by tests, which can also inject per-key failures
//! and inspect how often a path was queried.

use crate::crypto::blake2b_256_hex;
use crate::ledger::index::{LedgerError, LedgerIndex};
use crate::ledger::types::Utxo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Serializable contents of a memory ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// UTxOs by address
    #[serde(default)]
    pub utxos: HashMap<String, Vec<Utxo>>,
    /// JSON documents by index path
    #[serde(default)]
    pub documents: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: LedgerSnapshot,
    failures: HashMap<String, String>,
    calls: HashMap<String, usize>,
    submitted: Vec<Vec<u8>>,
}

/// Ledger index backed by in-memory maps
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            inner: Mutex::new(Inner {
                snapshot,
                ..Default::default()
            }),
        }
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let data = fs::read_to_string(path)
            .map_err(|e| LedgerError::Fetch(format!("{}: {}", path.display(), e)))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&data)?;
        Ok(Self::from_snapshot(snapshot))
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Add a UTxO at its output address
    pub fn add_utxo(&self, utxo: Utxo) {
        self.with_inner(|inner| {
            inner
                .snapshot
                .utxos
                .entry(utxo.output.address.clone())
                .or_default()
                .push(utxo)
        });
    }

    /// Replace the JSON document at a path
    pub fn set_document(&self, path: &str, doc: serde_json::Value) {
        self.with_inner(|inner| {
            inner.snapshot.documents.insert(path.to_string(), doc);
        });
    }

    /// Make every request for this path or address fail
    pub fn fail_on(&self, key: &str, message: &str) {
        self.with_inner(|inner| {
            inner.failures.insert(key.to_string(), message.to_string());
        });
    }

    pub fn clear_failure(&self, key: &str) {
        self.with_inner(|inner| {
            inner.failures.remove(key);
        });
    }

    /// Number of requests seen for a path or address
    pub fn call_count(&self, key: &str) -> usize {
        self.with_inner(|inner| inner.calls.get(key).copied().unwrap_or(0))
    }

    /// Transactions submitted so far
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.with_inner(|inner| inner.submitted.clone())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.with_inner(|inner| inner.snapshot.clone())
    }

    fn record(&self, key: &str) -> Result<(), LedgerError> {
        self.with_inner(|inner| {
            *inner.calls.entry(key.to_string()).or_insert(0) += 1;
            match inner.failures.get(key) {
                Some(message) => Err(LedgerError::Fetch(message.clone())),
                None => Ok(()),
            }
        })
    }
}

#[async_trait]
impl LedgerIndex for MemoryLedger {
    async fn fetch_address_utxos(&self, address: &str) -> Result<Vec<Utxo>, LedgerError> {
        self.record(address)?;
        Ok(self.with_inner(|inner| {
            inner
                .snapshot
                .utxos
                .get(address)
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value, LedgerError> {
        self.record(path)?;
        self.with_inner(|inner| {
            inner
                .snapshot
                .documents
                .get(path)
                .cloned()
                .ok_or_else(|| LedgerError::NotFound(path.to_string()))
        })
    }

    async fn submit_tx(&self, signed_tx: &[u8]) -> Result<String, LedgerError> {
        self.record("submit")?;
        let tx_hash = blake2b_256_hex(signed_tx);
        self.with_inner(|inner| inner.submitted.push(signed_tx.to_vec()));
        log::info!("Accepted transaction {}", tx_hash);
        Ok(tx_hash)
    }
}
