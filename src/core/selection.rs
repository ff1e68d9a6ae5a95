//! UTxO selection
//!
//! Picks inputs covering a per-asset requirement vector. The default
//! strategy is greedy best-fit: at every step take the candidate whose
//! holdings reduce the outstanding requirement the most. It is not
//! guaranteed to use the fewest inputs, but for a fixed candidate order
//! it always returns the same selection.

use crate::core::value::Value;
use crate::ledger::types::{TxOut, Utxo, LOVELACE};
use thiserror::Error;

/// Selection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Insufficient balance of {unit}: need {required}, have {available}")]
    InsufficientBalance {
        unit: String,
        required: u128,
        available: u128,
    },
    #[error("Selection stalled with {outstanding} of {unit} still outstanding")]
    SelectionStalled { unit: String, outstanding: u128 },
}

/// A way of choosing inputs that cover a requirement
///
/// Transaction assembly only depends on this trait, so another strategy
/// can replace the greedy one without touching the builders.
pub trait SelectionStrategy: Send + Sync {
    fn select(&self, available: &[Utxo], required: &Value) -> Result<Vec<Utxo>, SelectionError>;
}

/// Greedy best-fit-first selection
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyBestFit;

/// Sum of `min(outstanding, held)` over every outstanding unit
fn contribution_score(candidate: &Value, outstanding: &Value) -> u128 {
    outstanding
        .iter()
        .map(|(unit, needed)| needed.min(candidate.get(unit)))
        .fold(0u128, |acc, x| acc.saturating_add(x))
}

impl SelectionStrategy for GreedyBestFit {
    fn select(&self, available: &[Utxo], required: &Value) -> Result<Vec<Utxo>, SelectionError> {
        let total = sum_values(available);
        if let Some((unit, required, available)) = total.shortfall(required) {
            return Err(SelectionError::InsufficientBalance {
                unit,
                required,
                available,
            });
        }

        let mut outstanding = required.clone();
        let mut remaining: Vec<(&Utxo, Value)> =
            available.iter().map(|u| (u, u.value())).collect();
        let mut selected = Vec::new();

        while !outstanding.is_empty() {
            let mut best: Option<(usize, u128)> = None;
            for (idx, (_, value)) in remaining.iter().enumerate() {
                let score = contribution_score(value, &outstanding);
                if score > best.map(|(_, s)| s).unwrap_or(0) {
                    best = Some((idx, score));
                }
            }

            let Some((idx, score)) = best else {
                let (unit, outstanding) = outstanding
                    .iter()
                    .next()
                    .map(|(unit, q)| (unit.to_string(), q))
                    .unwrap_or_default();
                return Err(SelectionError::SelectionStalled { unit, outstanding });
            };

            let (utxo, value) = remaining.remove(idx);
            log::debug!("Selected {} (score {})", utxo.input, score);
            outstanding = outstanding.saturating_sub(&value);
            selected.push(utxo.clone());
        }

        Ok(selected)
    }
}

/// Total value held by a set of UTxOs
pub fn sum_values(utxos: &[Utxo]) -> Value {
    let mut total = Value::new();
    for utxo in utxos {
        total.add(&utxo.value());
    }
    total
}

/// Requirement vector for a set of outputs plus a lovelace fee buffer
pub fn required_for_outputs(outputs: &[TxOut], fee_buffer: u128) -> Value {
    let mut required = Value::lovelace(fee_buffer);
    for output in outputs {
        required.add(&output.value());
    }
    required
}

/// Add inputs in order until `unit` reaches `minimum`
pub fn accumulate_until(
    utxos: &[Utxo],
    unit: &str,
    minimum: u128,
) -> Result<Vec<Utxo>, SelectionError> {
    let mut selected = Vec::new();
    let mut accumulated: u128 = 0;
    for utxo in utxos {
        if accumulated >= minimum {
            break;
        }
        let held = utxo.quantity_of(unit);
        if held == 0 {
            continue;
        }
        accumulated = accumulated.saturating_add(held);
        selected.push(utxo.clone());
    }

    if accumulated < minimum {
        return Err(SelectionError::InsufficientBalance {
            unit: unit.to_string(),
            required: minimum,
            available: accumulated,
        });
    }
    Ok(selected)
}

/// Lovelace-only convenience over `accumulate_until`
pub fn accumulate_lovelace(utxos: &[Utxo], minimum: u128) -> Result<Vec<Utxo>, SelectionError> {
    accumulate_until(utxos, LOVELACE, minimum)
}
