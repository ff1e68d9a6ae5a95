//! Multi-asset values
//!
//! A value maps asset units to quantities. Zero quantities are never
//! stored, so two equal values always compare equal.

use crate::ledger::types::{Asset, LOVELACE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantities per asset unit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Value(BTreeMap<String, u128>);

impl Value {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lovelace(quantity: u128) -> Self {
        let mut value = Self::new();
        value.add_asset(LOVELACE, quantity);
        value
    }

    pub fn from_assets(assets: &[Asset]) -> Self {
        let mut value = Self::new();
        for asset in assets {
            value.add_asset(&asset.unit, asset.quantity);
        }
        value
    }

    pub fn get(&self, unit: &str) -> u128 {
        self.0.get(unit).copied().unwrap_or(0)
    }

    pub fn lovelace_amount(&self) -> u128 {
        self.get(LOVELACE)
    }

    pub fn add_asset(&mut self, unit: &str, quantity: u128) {
        if quantity == 0 {
            return;
        }
        let entry = self.0.entry(unit.to_string()).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    pub fn add(&mut self, other: &Value) {
        for (unit, quantity) in &other.0 {
            self.add_asset(unit, *quantity);
        }
    }

    /// Subtract, flooring every unit at zero
    pub fn saturating_sub(&self, other: &Value) -> Value {
        let mut out = Value::new();
        for (unit, quantity) in &self.0 {
            out.add_asset(unit, quantity.saturating_sub(other.get(unit)));
        }
        out
    }

    /// Subtract, or `None` when any unit would go negative
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        if !self.covers(other) {
            return None;
        }
        Some(self.saturating_sub(other))
    }

    /// Every unit of `required` is available in `self`
    pub fn covers(&self, required: &Value) -> bool {
        required
            .0
            .iter()
            .all(|(unit, quantity)| self.get(unit) >= *quantity)
    }

    /// First unit (in unit order) where `self` falls short of `required`,
    /// as `(unit, required, available)`
    pub fn shortfall(&self, required: &Value) -> Option<(String, u128, u128)> {
        required.0.iter().find_map(|(unit, quantity)| {
            let available = self.get(unit);
            (available < *quantity).then(|| (unit.clone(), *quantity, available))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.0.iter().map(|(unit, quantity)| (unit.as_str(), *quantity))
    }

    /// Asset list with lovelace first, then units in order
    pub fn to_assets(&self) -> Vec<Asset> {
        let mut assets = Vec::with_capacity(self.0.len());
        if let Some(lovelace) = self.0.get(LOVELACE) {
            assets.push(Asset::lovelace(*lovelace));
        }
        assets.extend(
            self.0
                .iter()
                .filter(|(unit, _)| unit.as_str() != LOVELACE)
                .map(|(unit, quantity)| Asset::new(unit.clone(), *quantity)),
        );
        assets
    }
}

impl FromIterator<(String, u128)> for Value {
    fn from_iter<T: IntoIterator<Item = (String, u128)>>(iter: T) -> Self {
        let mut value = Value::new();
        for (unit, quantity) in iter {
            value.add_asset(&unit, quantity);
        }
        value
    }
}
