//! Persisted wallet shape
//!
//! The storage layer keeps one record per wallet with signer data as
//! parallel arrays in the policy's signer order.

use crate::multisig::wallet::{KeyRole, MultisigWallet, SignerKey};
use crate::script::PolicyError;
use serde::{Deserialize, Serialize};

/// Stored form of a multisig wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub signers_addresses: Vec<String>,
    pub signers_stake_keys: Vec<String>,
    #[serde(rename = "signersDRepKeys")]
    pub signers_drep_keys: Vec<String>,
    pub signers_descriptions: Vec<String>,
    pub script_cbor: String,
    pub num_required_signers: u32,
    pub stake_credential_hash: Option<String>,
    #[serde(rename = "type")]
    pub script_type: String,
}

impl WalletRecord {
    /// Record for a wallet built from a roster
    ///
    /// Payment keys fill the signer slots. Stake and DRep keys are paired
    /// with a payment key by signer name; a signer without one gets an
    /// empty string. The payment key hash stands in for the address.
    pub fn from_wallet(wallet: &MultisigWallet) -> Result<Self, PolicyError> {
        let script = wallet.get_script()?;
        let payment = wallet.keys_by_role(KeyRole::PAYMENT);
        let stake = wallet.keys_by_role(KeyRole::STAKE);
        let drep = wallet.keys_by_role(KeyRole::DREP);

        let paired = |keys: &[&SignerKey], name: &str| -> String {
            keys.iter()
                .find(|k| !name.is_empty() && k.name == name)
                .map(|k| k.key_hash.clone())
                .unwrap_or_default()
        };

        Ok(Self {
            name: wallet.name.clone(),
            description: wallet.description.clone(),
            signers_addresses: payment.iter().map(|k| k.key_hash.clone()).collect(),
            signers_stake_keys: payment
                .iter()
                .map(|k| paired(stake.as_slice(), &k.name))
                .collect(),
            signers_drep_keys: payment
                .iter()
                .map(|k| paired(drep.as_slice(), &k.name))
                .collect(),
            signers_descriptions: payment.iter().map(|k| k.name.clone()).collect(),
            script_cbor: script.cbor,
            num_required_signers: wallet.required,
            stake_credential_hash: wallet.stake_credential_hash()?.map(|h| h.to_hex()),
            script_type: wallet.kind.to_string(),
        })
    }

    pub fn signer_count(&self) -> usize {
        self.signers_addresses.len()
    }
}
