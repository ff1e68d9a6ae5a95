//! Multisig Vault: native-script custody policies and token-gated proxy
//! vaults for a UTxO ledger
//!
//! This crate provides:
//! - M-of-N native-script policies built from signer rosters, with
//!   script, enterprise and base addresses and DRep ids
//! - A CBOR codec for native scripts and structural analysis of
//!   decoded policies
//! - Reconciliation of decoded policy signers against known rosters,
//!   including account-history lookups
//! - Multi-asset UTxO selection and unsigned transaction drafts
//! - A proxy vault whose funds and DRep credential are controlled by
//!   authorization tokens held at the owner address
//!
//! # Example
//!
//! ```rust
//! use multisig_vault::address::Network;
//! use multisig_vault::multisig::{KeyRole, MultisigWallet, SignerKey};
//!
//! let keys = vec![
//!     SignerKey::new("aa".repeat(28), KeyRole::PAYMENT, "alice"),
//!     SignerKey::new("bb".repeat(28), KeyRole::PAYMENT, "bob"),
//!     SignerKey::new("cc".repeat(28), KeyRole::PAYMENT, "carol"),
//! ];
//! let wallet = MultisigWallet::new("Treasury", keys, "team funds", 2, Network::Testnet);
//!
//! let script = wallet.get_script().unwrap();
//! assert_eq!(script.script.describe(), "2-of-3");
//! assert!(script.address.starts_with("addr_test1"));
//! ```

pub mod address;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod multisig;
pub mod proxy;
pub mod script;
pub mod storage;

// Re-export commonly used types
pub use address::{Address, Credential, Hash28, Network};
pub use core::{GreedyBestFit, SelectionStrategy, TxBuilder, TxDraft, Value};
pub use error::ErrorKind;
pub use ledger::{LedgerIndex, MemoryLedger, Utxo};
pub use multisig::{import_wallet, MultisigWallet, SignerKey, WalletRecord};
pub use proxy::{AikenBlueprint, DrepStatusService, ProxyConfig, ProxyContract, ProxyState};
pub use script::{NativeScript, ScriptKind};
pub use storage::TtlCache;
