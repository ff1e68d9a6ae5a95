//! Token-gated proxy vault
//!
//! A Plutus-script address whose funds move only alongside an
//! authorization token held by the owner. The proxy can also act as a
//! DRep: register, update, deregister and vote, all gated by the same
//! token.
//!
//! # Example
//!
//! ```no_run
//! use multisig_vault::address::Network;
//! use multisig_vault::proxy::{AikenBlueprint, ProxyConfig, ProxyContract};
//!
//! let json = std::fs::read_to_string("plutus.json").unwrap();
//! let blueprint = AikenBlueprint::from_json(&json).unwrap();
//! let mut proxy = ProxyContract::new(
//!     "addr_test1...",
//!     Network::Testnet,
//!     blueprint,
//!     ProxyConfig::default(),
//! );
//! let funding = Vec::new();
//! match proxy.setup_proxy(&funding) {
//!     Ok(setup) => println!("proxy at {}", setup.params.proxy_address),
//!     Err(e) => println!("setup failed ({}): {}", e.kind(), e),
//! }
//! ```

pub mod blueprint;
pub mod config;
pub mod contract;
pub mod error;
pub mod governance;
pub mod uplc;

pub use blueprint::{AikenBlueprint, PlutusScript, PlutusVersion, ProxyBlueprint};
pub use config::ProxyConfig;
pub use contract::{
    DrepAction, ProxyContract, ProxyParams, ProxyState, SetupResult, MESSAGE_METADATA_LABEL,
};
pub use error::ProxyError;
pub use governance::{DrepDelegator, DrepInfo, DrepStatusService};
