//! Proxy configuration
//!
//! Amounts are lovelace. Defaults follow current protocol parameters
//! (500 ADA DRep deposit) with a margin for fees.

use crate::core::DEFAULT_COINS_PER_UTXO_BYTE;
use crate::ledger::LOVELACE_PER_ADA;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for proxy transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Authorization tokens minted at setup
    pub auth_token_count: u32,
    /// Smallest funding output accepted as the parameter UTxO
    pub param_utxo_min_lovelace: u128,
    /// Lovelace sent to the proxy address at setup
    pub proxy_seed_lovelace: u128,
    /// Lovelace carried by the output returning an auth token to the owner
    pub token_output_lovelace: u128,
    /// Fee put on every draft
    pub fee: u128,
    /// Extra lovelace required on top of the requested outputs
    pub fee_buffer: u128,
    /// Smallest ADA-only output accepted as collateral
    pub collateral_min_lovelace: u128,
    /// Input lovelace needed before registering as a DRep
    pub drep_register_min_lovelace: u128,
    /// Input lovelace needed for other governance actions
    pub governance_min_lovelace: u128,
    /// DRep registration deposit, refunded on deregistration
    pub drep_deposit: u128,
    /// Governance status cache time to live
    pub cache_ttl_secs: i64,
    /// Lovelace per output byte for the minimum UTxO value
    pub coins_per_utxo_byte: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            auth_token_count: 10,
            param_utxo_min_lovelace: 60 * LOVELACE_PER_ADA,
            proxy_seed_lovelace: LOVELACE_PER_ADA,
            token_output_lovelace: 1_500_000,
            fee: 500_000,
            fee_buffer: LOVELACE_PER_ADA,
            collateral_min_lovelace: 5 * LOVELACE_PER_ADA,
            drep_register_min_lovelace: 505 * LOVELACE_PER_ADA,
            governance_min_lovelace: 2 * LOVELACE_PER_ADA,
            drep_deposit: 500 * LOVELACE_PER_ADA,
            cache_ttl_secs: crate::storage::DEFAULT_TTL_SECS,
            coins_per_utxo_byte: DEFAULT_COINS_PER_UTXO_BYTE,
        }
    }
}

impl ProxyConfig {
    /// Load overrides from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: ProxyConfig = serde_json::from_str(&data)?;
        log::info!("Loaded proxy config from {}", path.display());
        Ok(config)
    }
}
