//! Multi-signature custody wallets
//!
//! - `wallet`: signer rosters and the policies and addresses they derive
//! - `reconcile`: matching decoded policy leaves to known signers
//! - `import`: validation and reconciliation of third-party wallets
//! - `record`: the persisted wallet shape
//!
//! # Example
//!
//! ```ignore
//! use multisig_vault::multisig::{KeyRole, MultisigWallet, SignerKey};
//!
//! // 2-of-3 wallet on the test network
//! let wallet = MultisigWallet::new("Treasury", keys, "team funds", 2, Network::Testnet);
//! let script = wallet.get_script()?;
//! println!("{} at {}", script.script.describe(), script.address);
//! ```

pub mod import;
pub mod reconcile;
pub mod record;
pub mod wallet;

pub use import::{
    import_wallet, validate_users, ImportCommunity, ImportError, ImportMultisig, ImportPayload,
    ImportUser, ImportedWallet, ValidationError,
};
pub use reconcile::{
    reconcile_payment, reconcile_stake, LeafMatch, MatchSource, Reconciliation, RosterEntry,
};
pub use record::WalletRecord;
pub use wallet::{KeyRole, MultisigWallet, SignerKey, WalletScript, WALLET_METADATA_LABEL};
