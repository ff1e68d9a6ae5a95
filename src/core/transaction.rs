//! Unsigned transaction drafts
//!
//! A `TxDraft` is everything a signer needs to review and witness a
//! transaction: inputs and how each is unlocked, collateral, outputs,
//! mints, governance certificates and votes, metadata and the fee.
//! Drafts are balanced here; serialization to the ledger's binary body
//! and witnessing happen outside this crate.

use crate::address::Address;
use crate::core::value::Value;
use crate::crypto::blake2b_256_hex;
use crate::ledger::types::{Asset, TxIn, Utxo, LOVELACE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Draft assembly errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("Transaction has no inputs")]
    NoInputs,
    #[error("Script-witnessed transaction has no collateral")]
    MissingCollateral,
    #[error("Transaction leaves change but has no change address")]
    MissingChangeAddress,
    #[error("Transaction is unbalanced: short {missing} of {unit}")]
    Unbalanced { unit: String, missing: u128 },
    #[error("Output to {address} holds {have} lovelace, below the minimum {required}")]
    OutputBelowMinimum {
        address: String,
        required: u128,
        have: u128,
    },
    #[error("Change output carrying tokens is short {missing} lovelace of its minimum")]
    ChangeBelowMinimum { missing: u128 },
}

// =============================================================================
// Minimum UTxO
// =============================================================================

/// Lovelace per serialized output byte on current protocol parameters
pub const DEFAULT_COINS_PER_UTXO_BYTE: u64 = 4310;

/// Per-output overhead counted on top of the serialized size
const UTXO_ENTRY_OVERHEAD: u128 = 160;

/// Length of a base address, assumed for addresses that do not decode
const FALLBACK_ADDRESS_LEN: u128 = 57;

/// Length of a CBOR unsigned integer head for `n`
fn uint_len(n: u128) -> u128 {
    match n {
        0..=23 => 1,
        24..=0xff => 2,
        0x100..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn bytes_len(len: u128) -> u128 {
    uint_len(len) + len
}

/// Serialized size of an output in the post-Alonzo map form
fn output_size(address: &str, value: &Value) -> u128 {
    let address_len = Address::from_bech32(address)
        .map(|a| a.to_bytes().len() as u128)
        .unwrap_or(FALLBACK_ADDRESS_LEN);

    let coin = uint_len(value.lovelace_amount());
    let mut policies: BTreeMap<&str, Vec<(u128, u128)>> = BTreeMap::new();
    for (unit, quantity) in value.iter().filter(|(unit, _)| *unit != LOVELACE) {
        let policy = unit.get(..56).unwrap_or(unit);
        let name_len = unit.len().saturating_sub(56) / 2;
        policies
            .entry(policy)
            .or_default()
            .push((name_len as u128, quantity));
    }

    let amount = if policies.is_empty() {
        coin
    } else {
        let mut size = 1 + coin + uint_len(policies.len() as u128);
        for assets in policies.values() {
            size += bytes_len(28) + uint_len(assets.len() as u128);
            for (name_len, quantity) in assets {
                size += bytes_len(*name_len) + uint_len(*quantity);
            }
        }
        size
    };

    // map head, two keys, address bytes, amount
    1 + 1 + bytes_len(address_len) + 1 + amount
}

/// Smallest lovelace an output holding `value` at `address` may carry
///
/// `(160 + serialized size) * coins_per_utxo_byte`. The lovelace already
/// in `value` is counted in the size, so callers topping up an output
/// should recompute after the top-up.
pub fn min_output_lovelace(address: &str, value: &Value, coins_per_utxo_byte: u64) -> u128 {
    (UTXO_ENTRY_OVERHEAD + output_size(address, value)) * u128::from(coins_per_utxo_byte)
}

// =============================================================================
// Witnesses
// =============================================================================

/// Plutus data passed to a validator, in the ledger's detailed JSON schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redeemer(pub serde_json::Value);

impl Redeemer {
    /// Constructor `alternative` with the given fields
    pub fn constr(alternative: u64, fields: Vec<serde_json::Value>) -> Self {
        Self(serde_json::json!({ "constructor": alternative, "fields": fields }))
    }

    /// The unit constructor, `Constr 0 []`
    pub fn unit() -> Self {
        Self::constr(0, Vec::new())
    }
}

/// Script that authorizes an input, mint, certificate or vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScriptWitness {
    /// Native script, by its CBOR hex
    Native { cbor: String },
    /// Plutus validator, by hash, with its redeemer
    Plutus { script_hash: String, redeemer: Redeemer },
}

impl ScriptWitness {
    pub fn plutus(script_hash: impl Into<String>, redeemer: Redeemer) -> Self {
        ScriptWitness::Plutus {
            script_hash: script_hash.into(),
            redeemer,
        }
    }

    pub fn is_plutus(&self) -> bool {
        matches!(self, ScriptWitness::Plutus { .. })
    }
}

// =============================================================================
// Draft Components
// =============================================================================

/// An input together with how it is unlocked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftInput {
    pub utxo: Utxo,
    /// `None` for key-witnessed inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<ScriptWitness>,
}

/// Transaction output with an optional inline datum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftOutput {
    pub address: String,
    pub amount: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<serde_json::Value>,
}

impl DraftOutput {
    pub fn value(&self) -> Value {
        Value::from_assets(&self.amount)
    }
}

/// Mint (positive) or burn (negative) of one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mint {
    pub policy_id: String,
    /// Asset name hex, empty for the policy's nameless asset
    pub asset_name: String,
    pub quantity: i64,
    pub witness: ScriptWitness,
}

impl Mint {
    pub fn unit(&self) -> String {
        format!("{}{}", self.policy_id, self.asset_name)
    }
}

/// Off-chain metadata anchor for governance certificates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub url: String,
    pub data_hash: String,
}

/// Governance certificates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Certificate {
    RegDRep {
        drep_id: String,
        deposit: u128,
        anchor: Anchor,
    },
    UnregDRep {
        drep_id: String,
        refund: u128,
    },
    UpdateDRep {
        drep_id: String,
        anchor: Anchor,
    },
}

impl Certificate {
    pub fn deposit(&self) -> u128 {
        match self {
            Certificate::RegDRep { deposit, .. } => *deposit,
            _ => 0,
        }
    }

    pub fn refund(&self) -> u128 {
        match self {
            Certificate::UnregDRep { refund, .. } => *refund,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftCertificate {
    pub certificate: Certificate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<ScriptWitness>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

/// Governance action being voted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovActionId {
    pub tx_hash: String,
    pub index: u32,
}

/// A DRep vote on one governance action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub drep_id: String,
    pub action: GovActionId,
    pub choice: VoteChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<ScriptWitness>,
}

// =============================================================================
// Transaction Draft
// =============================================================================

/// An unsigned, balanced transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxDraft {
    pub inputs: Vec<DraftInput>,
    #[serde(default)]
    pub collateral: Vec<Utxo>,
    pub outputs: Vec<DraftOutput>,
    #[serde(default)]
    pub mints: Vec<Mint>,
    #[serde(default)]
    pub certificates: Vec<DraftCertificate>,
    #[serde(default)]
    pub votes: Vec<Vote>,
    #[serde(default)]
    pub metadata: BTreeMap<u64, serde_json::Value>,
    #[serde(default)]
    pub required_signers: Vec<String>,
    pub change_address: Option<String>,
    pub fee: u128,
}

impl TxDraft {
    /// Value consumed by the inputs
    pub fn input_value(&self) -> Value {
        let mut total = Value::new();
        for input in &self.inputs {
            total.add(&input.utxo.value());
        }
        total
    }

    /// Value sent to outputs
    pub fn output_value(&self) -> Value {
        let mut total = Value::new();
        for output in &self.outputs {
            total.add(&output.value());
        }
        total
    }

    fn minted(&self) -> (Value, Value) {
        let mut minted = Value::new();
        let mut burned = Value::new();
        for mint in &self.mints {
            let quantity = mint.quantity.unsigned_abs() as u128;
            if mint.quantity >= 0 {
                minted.add_asset(&mint.unit(), quantity);
            } else {
                burned.add_asset(&mint.unit(), quantity);
            }
        }
        (minted, burned)
    }

    /// Total DRep deposits paid and refunds received
    pub fn deposits(&self) -> (u128, u128) {
        self.certificates.iter().fold((0, 0), |(paid, refunded), c| {
            (
                paid + c.certificate.deposit(),
                refunded + c.certificate.refund(),
            )
        })
    }

    /// What is left for the change output
    ///
    /// inputs + minted + refunds - outputs - burned - fee - deposits
    pub fn change(&self) -> Result<Value, DraftError> {
        let (minted, burned) = self.minted();
        let (paid, refunded) = self.deposits();

        let mut available = self.input_value();
        available.add(&minted);
        available.add_asset(LOVELACE, refunded);

        let mut spent = self.output_value();
        spent.add(&burned);
        spent.add_asset(LOVELACE, self.fee + paid);

        match available.shortfall(&spent) {
            Some((unit, required, have)) => Err(DraftError::Unbalanced {
                unit,
                missing: required - have,
            }),
            None => Ok(available.saturating_sub(&spent)),
        }
    }

    /// Ok when nothing goes negative
    pub fn balance_check(&self) -> Result<(), DraftError> {
        self.change().map(|_| ())
    }

    /// Whether any part of the draft runs a Plutus validator
    pub fn needs_collateral(&self) -> bool {
        let plutus = |w: &Option<ScriptWitness>| w.as_ref().map_or(false, |w| w.is_plutus());
        self.inputs.iter().any(|i| plutus(&i.witness))
            || self.mints.iter().any(|m| m.witness.is_plutus())
            || self.certificates.iter().any(|c| plutus(&c.witness))
            || self.votes.iter().any(|v| plutus(&v.witness))
    }

    pub fn spends(&self, input: &TxIn) -> bool {
        self.inputs.iter().any(|i| &i.utxo.input == input)
    }

    /// Outputs paying to an address
    pub fn outputs_to(&self, address: &str) -> impl Iterator<Item = &DraftOutput> + '_ {
        let address = address.to_string();
        self.outputs.iter().filter(move |o| o.address == address)
    }

    /// Content hash of the draft's JSON form, for operator reference
    pub fn draft_hash(&self) -> String {
        let data = serde_json::to_vec(self).unwrap_or_default();
        blake2b_256_hex(&data)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for transaction drafts
///
/// `build()` validates collateral, balances the draft, checks every
/// output against the minimum UTxO value and appends the change output.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    draft: TxDraft,
    coins_per_utxo_byte: u64,
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self {
            draft: TxDraft::default(),
            coins_per_utxo_byte: DEFAULT_COINS_PER_UTXO_BYTE,
        }
    }
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key-witnessed input
    pub fn add_input(mut self, utxo: &Utxo) -> Self {
        self.draft.inputs.push(DraftInput {
            utxo: utxo.clone(),
            witness: None,
        });
        self
    }

    /// Add a script-locked input
    pub fn add_script_input(mut self, utxo: &Utxo, witness: ScriptWitness) -> Self {
        self.draft.inputs.push(DraftInput {
            utxo: utxo.clone(),
            witness: Some(witness),
        });
        self
    }

    pub fn add_collateral(mut self, utxo: &Utxo) -> Self {
        self.draft.collateral.push(utxo.clone());
        self
    }

    pub fn add_output(mut self, address: &str, amount: Vec<Asset>) -> Self {
        self.draft.outputs.push(DraftOutput {
            address: address.to_string(),
            amount,
            datum: None,
        });
        self
    }

    pub fn add_output_with_datum(
        mut self,
        address: &str,
        amount: Vec<Asset>,
        datum: serde_json::Value,
    ) -> Self {
        self.draft.outputs.push(DraftOutput {
            address: address.to_string(),
            amount,
            datum: Some(datum),
        });
        self
    }

    pub fn mint(
        mut self,
        policy_id: &str,
        asset_name: &str,
        quantity: i64,
        witness: ScriptWitness,
    ) -> Self {
        self.draft.mints.push(Mint {
            policy_id: policy_id.to_string(),
            asset_name: asset_name.to_string(),
            quantity,
            witness,
        });
        self
    }

    pub fn certificate(mut self, certificate: Certificate, witness: Option<ScriptWitness>) -> Self {
        self.draft.certificates.push(DraftCertificate {
            certificate,
            witness,
        });
        self
    }

    pub fn vote(mut self, vote: Vote) -> Self {
        self.draft.votes.push(vote);
        self
    }

    /// Attach metadata under a label, replacing any earlier value
    pub fn metadata(mut self, label: u64, value: serde_json::Value) -> Self {
        self.draft.metadata.insert(label, value);
        self
    }

    pub fn required_signer(mut self, key_hash: &str) -> Self {
        if !self.draft.required_signers.iter().any(|k| k == key_hash) {
            self.draft.required_signers.push(key_hash.to_string());
        }
        self
    }

    pub fn change_address(mut self, address: &str) -> Self {
        self.draft.change_address = Some(address.to_string());
        self
    }

    pub fn fee(mut self, fee: u128) -> Self {
        self.draft.fee = fee;
        self
    }

    /// Lovelace per output byte for the minimum UTxO check; 0 disables it
    pub fn coins_per_utxo_byte(mut self, coins: u64) -> Self {
        self.coins_per_utxo_byte = coins;
        self
    }

    /// Balance the draft and append its change output
    ///
    /// ADA-only change below the minimum UTxO value is added to the fee.
    /// Change that carries tokens cannot be dropped, so a shortfall there
    /// is `ChangeBelowMinimum` and the caller has to add inputs.
    pub fn build(self) -> Result<TxDraft, DraftError> {
        let coins = self.coins_per_utxo_byte;
        let mut draft = self.draft;
        if draft.inputs.is_empty() {
            return Err(DraftError::NoInputs);
        }
        if draft.needs_collateral() && draft.collateral.is_empty() {
            return Err(DraftError::MissingCollateral);
        }

        let change = draft.change()?;
        for output in &draft.outputs {
            let value = output.value();
            let required = min_output_lovelace(&output.address, &value, coins);
            if value.lovelace_amount() < required {
                return Err(DraftError::OutputBelowMinimum {
                    address: output.address.clone(),
                    required,
                    have: value.lovelace_amount(),
                });
            }
        }

        if !change.is_empty() {
            let address = draft
                .change_address
                .clone()
                .ok_or(DraftError::MissingChangeAddress)?;
            let required = min_output_lovelace(&address, &change, coins);
            let have = change.lovelace_amount();
            if have < required {
                if change.units().any(|unit| unit != LOVELACE) {
                    return Err(DraftError::ChangeBelowMinimum {
                        missing: required - have,
                    });
                }
                log::debug!("Adding {} lovelace of dust change to the fee", have);
                draft.fee += have;
            } else {
                draft.outputs.push(DraftOutput {
                    address,
                    amount: change.to_assets(),
                    datum: None,
                });
            }
        }

        log::info!(
            "Built draft: {} inputs, {} outputs, {} mints, {} certificates, fee {}",
            draft.inputs.len(),
            draft.outputs.len(),
            draft.mints.len(),
            draft.certificates.len(),
            draft.fee
        );
        Ok(draft)
    }
}

// =============================================================================
// Tests
// =============================================================================
