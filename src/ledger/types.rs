//! Ledger-facing UTxO shapes
//!
//! These mirror the JSON the ledger index returns: quantities are
//! decimal strings on the wire and `u128` in memory.

use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit name of the native currency
pub const LOVELACE: &str = "lovelace";

/// Lovelace per ADA
pub const LOVELACE_PER_ADA: u128 = 1_000_000;

/// Serde helper: quantities as decimal strings, numbers accepted on input
pub(crate) mod quantity {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
            Raw::Number(n) => Ok(n as u128),
        }
    }
}

/// An amount of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// `lovelace`, or policy id hex followed by asset name hex
    pub unit: String,
    #[serde(with = "quantity")]
    pub quantity: u128,
}

impl Asset {
    pub fn new(unit: impl Into<String>, quantity: u128) -> Self {
        Self {
            unit: unit.into(),
            quantity,
        }
    }

    pub fn lovelace(quantity: u128) -> Self {
        Self::new(LOVELACE, quantity)
    }
}

/// Reference to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxIn {
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    #[serde(rename = "outputIndex")]
    pub output_index: u32,
}

impl TxIn {
    pub fn new(tx_hash: impl Into<String>, output_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            output_index,
        }
    }
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

/// A transaction output: an address and the value it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub address: String,
    pub amount: Vec<Asset>,
}

impl TxOut {
    pub fn new(address: impl Into<String>, amount: Vec<Asset>) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }

    pub fn value(&self) -> Value {
        Value::from_assets(&self.amount)
    }
}

/// Unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub input: TxIn,
    pub output: TxOut,
}

impl Utxo {
    pub fn new(input: TxIn, output: TxOut) -> Self {
        Self { input, output }
    }

    pub fn value(&self) -> Value {
        self.output.value()
    }

    pub fn lovelace(&self) -> u128 {
        self.quantity_of(LOVELACE)
    }

    pub fn quantity_of(&self, unit: &str) -> u128 {
        self.output
            .amount
            .iter()
            .filter(|a| a.unit == unit)
            .map(|a| a.quantity)
            .sum()
    }

    pub fn holds(&self, unit: &str) -> bool {
        self.quantity_of(unit) > 0
    }

    /// Holds nothing but lovelace
    pub fn is_pure_ada(&self) -> bool {
        self.output
            .amount
            .iter()
            .all(|a| a.unit == LOVELACE || a.quantity == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utxo_json_shape() {
        let json = r#"{
            "input": {"txHash": "ab", "outputIndex": 1},
            "output": {"address": "addr_test1x", "amount": [
                {"unit": "lovelace", "quantity": "5000000"},
                {"unit": "policyasset", "quantity": 3}
            ]}
        }"#;
        let utxo: Utxo = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.input.to_string(), "ab#1");
        assert_eq!(utxo.lovelace(), 5_000_000);
        assert_eq!(utxo.quantity_of("policyasset"), 3);
        assert!(!utxo.is_pure_ada());

        let back = serde_json::to_value(&utxo).unwrap();
        assert_eq!(back["output"]["amount"][1]["quantity"], "3");
    }

    #[test]
    fn test_pure_ada() {
        let utxo = Utxo::new(
            TxIn::new("aa", 0),
            TxOut::new("addr", vec![Asset::lovelace(2)]),
        );
        assert!(utxo.is_pure_ada());
        assert!(utxo.holds(LOVELACE));
        assert!(!utxo.holds("other"));
    }
}
