//! Multi-signature wallet definition
//!
//! A wallet is a named roster of signer keys plus a threshold. The
//! payment policy, stake policy, script address and DRep id are all
//! derived from the roster on demand and never stored.

use crate::address::{drep_id, drep_id_legacy, Credential, Hash28, Network};
use crate::script::{build_policy, derive_address, NativeScript, PolicyError, ScriptKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Metadata label for multisig wallet descriptions (CIP-146)
pub const WALLET_METADATA_LABEL: u64 = 1854;

/// Role tag of a signer key, following the derivation-path role index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyRole(pub u32);

impl KeyRole {
    pub const PAYMENT: KeyRole = KeyRole(0);
    pub const STAKE: KeyRole = KeyRole(2);
    pub const DREP: KeyRole = KeyRole(3);
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            KeyRole::PAYMENT => f.write_str("payment"),
            KeyRole::STAKE => f.write_str("stake"),
            KeyRole::DREP => f.write_str("drep"),
            KeyRole(other) => write!(f, "role {}", other),
        }
    }
}

/// One signer key in a roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerKey {
    pub key_hash: String,
    pub role: KeyRole,
    #[serde(default)]
    pub name: String,
}

impl SignerKey {
    pub fn new(key_hash: impl Into<String>, role: KeyRole, name: impl Into<String>) -> Self {
        Self {
            key_hash: key_hash.into(),
            role,
            name: name.into(),
        }
    }

    /// Rosters coming from forms carry blanks and the literal "undefined"
    pub fn is_valid(&self) -> bool {
        !self.key_hash.is_empty() && self.key_hash != "undefined"
    }
}

/// Payment policy with its encoded form and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletScript {
    pub script: NativeScript,
    pub cbor: String,
    pub address: String,
}

/// A named M-of-N wallet over a roster of signer keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigWallet {
    pub name: String,
    pub description: String,
    keys: Vec<SignerKey>,
    pub required: u32,
    pub network: Network,
    #[serde(default)]
    pub kind: ScriptKind,
    /// Externally supplied stake credential, takes precedence over the
    /// one derived from stake keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_stake_hash: Option<Hash28>,
}

impl MultisigWallet {
    /// Create a wallet, dropping invalid keys and sorting by key hash
    pub fn new(
        name: &str,
        keys: Vec<SignerKey>,
        description: &str,
        required: u32,
        network: Network,
    ) -> Self {
        let mut keys: Vec<SignerKey> = keys.into_iter().filter(SignerKey::is_valid).collect();
        keys.sort_by(|a, b| a.key_hash.cmp(&b.key_hash));

        Self {
            name: name.to_string(),
            description: description.to_string(),
            keys,
            required,
            network,
            kind: ScriptKind::default(),
            external_stake_hash: None,
        }
    }

    pub fn with_stake_credential_hash(mut self, hash: Hash28) -> Self {
        self.external_stake_hash = Some(hash);
        self
    }

    pub fn with_script_kind(mut self, kind: ScriptKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn keys(&self) -> &[SignerKey] {
        &self.keys
    }

    pub fn keys_by_role(&self, role: KeyRole) -> Vec<&SignerKey> {
        self.keys.iter().filter(|k| k.role == role).collect()
    }

    /// Distinct roles present in the roster, ascending
    pub fn available_roles(&self) -> Vec<KeyRole> {
        let mut roles: Vec<KeyRole> = self.keys.iter().map(|k| k.role).collect();
        roles.sort();
        roles.dedup();
        roles
    }

    fn policy_for(&self, role: KeyRole) -> Option<NativeScript> {
        let keys = self.keys_by_role(role);
        if keys.is_empty() {
            return None;
        }
        Some(build_policy(
            keys.iter().map(|k| k.key_hash.as_str()),
            self.required,
            self.kind,
        ))
    }

    /// Policy over the payment keys
    pub fn payment_script(&self) -> Result<NativeScript, PolicyError> {
        self.policy_for(KeyRole::PAYMENT)
            .ok_or(PolicyError::NoValidKeys("payment"))
    }

    /// Policy over the stake keys, if any
    pub fn staking_script(&self) -> Option<NativeScript> {
        self.policy_for(KeyRole::STAKE)
    }

    /// Every payment signer is assumed to have a stake signer when the
    /// two role counts are equal and non-zero. The pairing itself is not
    /// checked.
    pub fn staking_enabled(&self) -> bool {
        let payment = self.keys_by_role(KeyRole::PAYMENT).len();
        let stake = self.keys_by_role(KeyRole::STAKE).len();
        payment > 0 && payment == stake
    }

    /// External stake credential hash if set, else the stake policy hash
    pub fn stake_credential_hash(&self) -> Result<Option<Hash28>, PolicyError> {
        if let Some(hash) = self.external_stake_hash {
            return Ok(Some(hash));
        }
        match self.staking_script() {
            Some(script) => Ok(Some(script.script_hash()?)),
            None => Ok(None),
        }
    }

    /// Stake part used in the wallet address
    ///
    /// An external credential is always used. A derived one only when
    /// staking is enabled.
    fn address_stake_part(&self) -> Result<Option<Credential>, PolicyError> {
        if self.external_stake_hash.is_none() && !self.staking_enabled() {
            return Ok(None);
        }
        Ok(self.stake_credential_hash()?.map(Credential::Script))
    }

    /// Payment policy, its CBOR and the wallet address
    pub fn get_script(&self) -> Result<WalletScript, PolicyError> {
        let script = self.payment_script()?;
        let cbor = script.to_hex()?;
        let address = derive_address(&script, self.network, self.address_stake_part()?)?;
        Ok(WalletScript {
            script,
            cbor,
            address,
        })
    }

    /// Script credential of the payment policy
    pub fn payment_credential(&self) -> Result<Credential, PolicyError> {
        Ok(Credential::Script(self.payment_script()?.script_hash()?))
    }

    /// CIP-129 DRep id of the payment policy
    pub fn drep_id(&self) -> Result<String, PolicyError> {
        Ok(drep_id(&self.payment_credential()?)?)
    }

    /// CIP-105 DRep id of the payment policy
    pub fn drep_id_legacy(&self) -> Result<String, PolicyError> {
        Ok(drep_id_legacy(&self.payment_credential()?)?)
    }

    /// On-chain description of the wallet under label 1854
    pub fn metadata_json(&self) -> serde_json::Value {
        let mut participants = BTreeMap::new();
        for key in &self.keys {
            participants
                .entry(key.key_hash.clone())
                .or_insert_with(|| json!({ "name": key.name }));
        }
        let types: Vec<u32> = self.available_roles().iter().map(|r| r.0).collect();

        json!({
            "name": self.name,
            "description": self.description,
            "types": types,
            "participants": participants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    fn hash(b: u8) -> String {
        hex::encode([b; 28])
    }

    fn roster() -> Vec<SignerKey> {
        vec![
            SignerKey::new(hash(3), KeyRole::PAYMENT, "carol"),
            SignerKey::new(hash(1), KeyRole::PAYMENT, "alice"),
            SignerKey::new(hash(2), KeyRole::PAYMENT, "bob"),
            SignerKey::new(hash(13), KeyRole::STAKE, "carol"),
            SignerKey::new(hash(11), KeyRole::STAKE, "alice"),
            SignerKey::new(hash(12), KeyRole::STAKE, "bob"),
        ]
    }

    #[test]
    fn test_invalid_keys_filtered_and_sorted() {
        let wallet = MultisigWallet::new(
            "w",
            vec![
                SignerKey::new("zzzz", KeyRole::PAYMENT, "z"),
                SignerKey::new("", KeyRole::PAYMENT, "blank"),
                SignerKey::new("undefined", KeyRole::PAYMENT, "u"),
                SignerKey::new("aaaa", KeyRole::PAYMENT, "a"),
            ],
            "",
            1,
            Network::Testnet,
        );
        let hashes: Vec<&str> = wallet.keys().iter().map(|k| k.key_hash.as_str()).collect();
        assert_eq!(hashes, vec!["aaaa", "zzzz"]);
        assert_eq!(
            wallet.payment_script().unwrap(),
            NativeScript::at_least(1, vec![NativeScript::sig("aaaa"), NativeScript::sig("zzzz")])
        );
        assert_eq!(wallet.payment_script().unwrap().minimum_required_signatures(), 1);
    }

    #[test]
    fn test_no_valid_payment_keys() {
        let wallet = MultisigWallet::new(
            "w",
            vec![SignerKey::new("", KeyRole::PAYMENT, "blank")],
            "",
            1,
            Network::Testnet,
        );
        let err = wallet.get_script().unwrap_err();
        assert_eq!(err, PolicyError::NoValidKeys("payment"));
        assert_eq!(err.to_string(), "No valid payment keys provided");
    }

    #[test]
    fn test_staking_parity() {
        let wallet = MultisigWallet::new("w", roster(), "", 2, Network::Testnet);
        assert!(wallet.staking_enabled());
        assert_eq!(wallet.available_roles(), vec![KeyRole::PAYMENT, KeyRole::STAKE]);

        let script = wallet.get_script().unwrap();
        let address = Address::from_bech32(&script.address).unwrap();
        let stake_hash = wallet.stake_credential_hash().unwrap().unwrap();
        assert_eq!(address.stake(), Some(&Credential::Script(stake_hash)));

        let mut uneven = roster();
        uneven.pop();
        let wallet = MultisigWallet::new("w", uneven, "", 2, Network::Testnet);
        assert!(!wallet.staking_enabled());
        assert!(wallet.stake_credential_hash().unwrap().is_some());
        let address = Address::from_bech32(&wallet.get_script().unwrap().address).unwrap();
        assert!(address.stake().is_none());
    }

    #[test]
    fn test_external_stake_credential_wins() {
        let external: Hash28 = hash(0xee).parse().unwrap();
        let wallet = MultisigWallet::new("w", roster(), "", 2, Network::Mainnet)
            .with_stake_credential_hash(external);
        assert_eq!(wallet.stake_credential_hash().unwrap(), Some(external));
        let script = wallet.get_script().unwrap();
        assert!(script.address.starts_with(Network::Mainnet.payment_hrp()));
        let address = Address::from_bech32(&script.address).unwrap();
        assert_eq!(address.stake(), Some(&Credential::Script(external)));
    }

    #[test]
    fn test_drep_ids() {
        let wallet = MultisigWallet::new("w", roster(), "", 2, Network::Testnet);
        assert!(wallet.drep_id().unwrap().starts_with("drep1"));
        assert!(wallet.drep_id_legacy().unwrap().starts_with("drep_script1"));
    }

    #[test]
    fn test_metadata() {
        let wallet = MultisigWallet::new("Treasury", roster(), "team funds", 2, Network::Testnet);
        let meta = wallet.metadata_json();
        assert_eq!(meta["name"], "Treasury");
        assert_eq!(meta["types"], json!([0, 2]));
        assert_eq!(meta["participants"][hash(1)]["name"], "alice");
    }

    #[test]
    fn test_script_kind_override() {
        let wallet = MultisigWallet::new("w", roster(), "", 2, Network::Testnet)
            .with_script_kind(ScriptKind::All);
        assert_eq!(wallet.payment_script().unwrap().minimum_required_signatures(), 3);
    }
}
