//! Import of wallets defined by a third party
//!
//! The payload carries the policy as CBOR hex and the users who are
//! supposed to be its signers. Users are validated first, then the
//! scripts are decoded and reconciled against them.

use crate::address::{
    address_network, is_valid_address, is_valid_stake_key_hash, Credential, Network,
};
use crate::ledger::LedgerIndex;
use crate::multisig::reconcile::{reconcile_payment, reconcile_stake, Reconciliation, RosterEntry};
use crate::multisig::record::WalletRecord;
use crate::script::{native_script_hash, script_address, NativeScript, PolicyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Import errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("{} invalid user(s): {}", .0.len(), join_errors(.0))]
    InvalidUsers(Vec<ValidationError>),
    #[error("The {0} script could not be decoded into a usable policy")]
    DegeneratePolicy(&'static str),
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A problem with one user of the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub user_index: usize,
    pub user_id: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} ({}): {}: {}",
            self.user_index, self.user_id, self.field, self.message
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCommunity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMultisig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub payment_script: String,
    #[serde(default)]
    pub stake_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address_bech32: String,
    #[serde(default)]
    pub stake_pubkey_hash_hex: String,
    #[serde(default)]
    pub drep_key_hash: Option<String>,
}

impl ImportUser {
    fn roster_entry(&self) -> RosterEntry {
        let mut entry = RosterEntry::new(
            self.address_bech32.trim(),
            self.stake_pubkey_hash_hex.trim(),
            &self.name,
        );
        entry.drep_key_hash = self.drep_key_hash.clone().filter(|h| !h.is_empty());
        entry
    }
}

/// Wallet import payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPayload {
    #[serde(default)]
    pub community: ImportCommunity,
    pub multisig: ImportMultisig,
    #[serde(default)]
    pub users: Vec<ImportUser>,
}

impl ImportPayload {
    /// Network of the declared multisig address, else of the first valid
    /// user address, else the test network
    pub fn network(&self) -> Network {
        std::iter::once(self.multisig.address.as_str())
            .chain(self.users.iter().map(|u| u.address_bech32.as_str()))
            .find_map(|address| address_network(address).ok())
            .unwrap_or_default()
    }
}

/// Check every user's address and stake key hash
///
/// A user needs at least one of the two. Whatever is present must be
/// well formed.
pub fn validate_users(users: &[ImportUser], network: Network) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (index, user) in users.iter().enumerate() {
        let mut fail = |field: &str, message: &str| {
            errors.push(ValidationError {
                user_index: index,
                user_id: user.id.clone(),
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        let address = user.address_bech32.trim();
        let stake = user.stake_pubkey_hash_hex.trim();
        if address.is_empty() && stake.is_empty() {
            fail("address_bech32", "user has neither an address nor a stake key hash");
            continue;
        }
        if !address.is_empty() && !is_valid_address(address) {
            fail("address_bech32", "not a valid payment address");
        }
        if !stake.is_empty() && !is_valid_stake_key_hash(stake, network) {
            fail(
                "stake_pubkey_hash_hex",
                "expected 56 lowercase hex characters forming a valid reward address",
            );
        }
    }
    errors
}

/// Result of importing a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedWallet {
    pub record: WalletRecord,
    pub payment_script: NativeScript,
    pub stake_script: Option<NativeScript>,
    pub hierarchical: bool,
    /// Address derived from the decoded scripts
    pub derived_address: String,
    /// Whether the payload's declared address equals `derived_address`
    pub address_matches: bool,
    pub payment: Reconciliation,
    pub stake: Option<Reconciliation>,
}

/// Decode a supplied script, keeping the exact bytes it arrived as
///
/// `None` when the hex or the CBOR is unusable.
fn supplied_script(cbor_hex: &str) -> Option<(NativeScript, Vec<u8>)> {
    let bytes = match hex::decode(cbor_hex.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("Script is not valid hex: {}", err);
            return None;
        }
    };
    let script = NativeScript::decode(&bytes);
    (!script.is_degenerate()).then_some((script, bytes))
}

/// Validate, decode and reconcile an import payload
///
/// Hashes, the derived address and the stored CBOR all come from the
/// supplied script bytes, so non-canonical encodings keep their identity.
pub async fn import_wallet<L: LedgerIndex + ?Sized>(
    payload: &ImportPayload,
    ledger: &L,
) -> Result<ImportedWallet, ImportError> {
    let network = payload.network();
    let errors = validate_users(&payload.users, network);
    if !errors.is_empty() {
        return Err(ImportError::InvalidUsers(errors));
    }

    let (payment_script, payment_bytes) = supplied_script(&payload.multisig.payment_script)
        .ok_or(ImportError::DegeneratePolicy("payment"))?;

    let stake = payload
        .multisig
        .stake_script
        .as_deref()
        .filter(|cbor| !cbor.trim().is_empty())
        .and_then(|cbor| {
            let decoded = supplied_script(cbor);
            if decoded.is_none() {
                log::warn!("Ignoring undecodable stake script");
            }
            decoded
        });
    let stake_hash = stake.as_ref().map(|(_, bytes)| native_script_hash(bytes));
    let stake_script = stake.map(|(script, _)| script);

    let derived_address = script_address(
        native_script_hash(&payment_bytes),
        network,
        stake_hash.map(Credential::Script),
    )?;
    let address_matches = derived_address == payload.multisig.address;
    if !address_matches {
        log::warn!(
            "Declared multisig address {} does not match script address {}",
            payload.multisig.address,
            derived_address
        );
    }

    let roster: Vec<RosterEntry> = payload.users.iter().map(ImportUser::roster_entry).collect();
    let payment = reconcile_payment(
        &payment_script.collect_leaf_key_hashes(),
        &roster,
        ledger,
        network,
    )
    .await;
    let stake = stake_script
        .as_ref()
        .map(|script| reconcile_stake(&script.collect_leaf_key_hashes(), &roster));

    let hierarchical = payment_script.is_hierarchical();
    if hierarchical {
        log::warn!(
            "Imported policy is hierarchical ({}), review before use",
            payment_script.describe()
        );
    }

    let record = WalletRecord {
        name: payload.multisig.name.clone(),
        description: payload.community.name.clone(),
        signers_addresses: payment.addresses(),
        signers_stake_keys: match &stake {
            Some(stake) => stake.stake_key_hashes(),
            None => payment.stake_key_hashes(),
        },
        signers_drep_keys: payment
            .roster
            .iter()
            .map(|e| e.drep_key_hash.clone().unwrap_or_default())
            .collect(),
        signers_descriptions: payment.descriptions(),
        script_cbor: hex::encode(&payment_bytes),
        num_required_signers: payment_script.minimum_required_signatures(),
        stake_credential_hash: stake_hash.map(|h| h.to_hex()),
        script_type: payment_script.type_name().to_string(),
    };

    log::info!(
        "Imported wallet {} ({}), {} of {} signers matched",
        record.name,
        payment_script.describe(),
        payment.matches.iter().filter(|m| m.matched).count(),
        payment.matches.len()
    );

    Ok(ImportedWallet {
        record,
        payment_script,
        stake_script,
        hierarchical,
        derived_address,
        address_matches,
        payment,
        stake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Hash28};
    use crate::ledger::MemoryLedger;
    use crate::script::{build_policy, derive_address, ScriptKind};

    fn hash(b: u8) -> Hash28 {
        Hash28([b; 28])
    }

    fn user(id: &str, payment: u8, stake: u8) -> ImportUser {
        ImportUser {
            id: id.to_string(),
            name: format!("user {}", id),
            address_bech32: Address::Base {
                network: Network::Testnet,
                payment: Credential::Key(hash(payment)),
                stake: Credential::Key(hash(stake)),
            }
            .to_bech32()
            .unwrap(),
            stake_pubkey_hash_hex: hash(stake).to_hex(),
            drep_key_hash: None,
        }
    }

    fn payload(users: Vec<ImportUser>) -> ImportPayload {
        let keys: Vec<String> = [1u8, 2, 3].iter().map(|b| hash(*b).to_hex()).collect();
        let stake_keys: Vec<String> = [11u8, 12, 13].iter().map(|b| hash(*b).to_hex()).collect();
        let payment = build_policy(keys.iter().map(String::as_str), 2, ScriptKind::AtLeast);
        let stake = build_policy(stake_keys.iter().map(String::as_str), 2, ScriptKind::AtLeast);
        let address = derive_address(
            &payment,
            Network::Testnet,
            Some(Credential::Script(stake.script_hash().unwrap())),
        )
        .unwrap();

        ImportPayload {
            community: ImportCommunity {
                id: "c1".to_string(),
                name: "Guild".to_string(),
            },
            multisig: ImportMultisig {
                id: "m1".to_string(),
                name: "Guild treasury".to_string(),
                address,
                payment_script: payment.to_hex().unwrap(),
                stake_script: Some(stake.to_hex().unwrap()),
            },
            users,
        }
    }

    #[test]
    fn test_validate_users() {
        let mut bad_stake = user("2", 2, 12);
        bad_stake.stake_pubkey_hash_hex = bad_stake.stake_pubkey_hash_hex.to_uppercase();
        let mut bad_address = user("3", 3, 13);
        bad_address.address_bech32 = "addr_test1notanaddress".to_string();
        let empty = ImportUser {
            id: "4".to_string(),
            name: String::new(),
            address_bech32: String::new(),
            stake_pubkey_hash_hex: String::new(),
            drep_key_hash: None,
        };

        let errors = validate_users(
            &[user("1", 1, 11), bad_stake, bad_address, empty],
            Network::Testnet,
        );
        let fields: Vec<(usize, &str)> = errors
            .iter()
            .map(|e| (e.user_index, e.field.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                (1, "stake_pubkey_hash_hex"),
                (2, "address_bech32"),
                (3, "address_bech32")
            ]
        );
    }

    #[tokio::test]
    async fn test_import_reconciles_in_leaf_order() {
        let ledger = MemoryLedger::new();
        let payload = payload(vec![user("c", 3, 13), user("a", 1, 11), user("b", 2, 12)]);

        let imported = import_wallet(&payload, &ledger).await.unwrap();
        assert!(imported.address_matches);
        assert!(!imported.hierarchical);
        assert!(imported.payment.all_matched());
        assert_eq!(imported.record.num_required_signers, 2);
        assert_eq!(imported.record.script_type, "atLeast");
        assert_eq!(
            imported.record.signers_descriptions,
            vec!["user a", "user b", "user c"]
        );
        assert_eq!(
            imported.record.signers_stake_keys,
            vec![hash(11).to_hex(), hash(12).to_hex(), hash(13).to_hex()]
        );
        assert!(imported.record.stake_credential_hash.is_some());
    }

    #[tokio::test]
    async fn test_import_rejects_degenerate_policy() {
        let ledger = MemoryLedger::new();
        let mut payload = payload(vec![user("a", 1, 11)]);
        payload.multisig.payment_script = "ff00".to_string();
        assert_eq!(
            import_wallet(&payload, &ledger).await,
            Err(ImportError::DegeneratePolicy("payment"))
        );
    }

    #[tokio::test]
    async fn test_import_flags_hierarchical_and_mismatch() {
        let ledger = MemoryLedger::new();
        let mut payload = payload(vec![user("a", 1, 11), user("b", 2, 12), user("c", 3, 13)]);
        let policy = NativeScript::all(vec![
            NativeScript::any(vec![
                NativeScript::sig(hash(1).to_hex()),
                NativeScript::sig(hash(2).to_hex()),
            ]),
            NativeScript::sig(hash(3).to_hex()),
        ]);
        payload.multisig.payment_script = policy.to_hex().unwrap();
        payload.multisig.stake_script = None;

        let imported = import_wallet(&payload, &ledger).await.unwrap();
        assert!(imported.hierarchical);
        assert!(!imported.address_matches);
        assert_eq!(imported.record.num_required_signers, 2);
        assert_eq!(imported.record.script_type, "all");
        assert_eq!(imported.record.stake_credential_hash, None);
    }

    #[tokio::test]
    async fn test_import_invalid_users_fails() {
        let ledger = MemoryLedger::new();
        let mut bad = user("a", 1, 11);
        bad.stake_pubkey_hash_hex = "abc".to_string();
        let result = import_wallet(&payload(vec![bad]), &ledger).await;
        assert!(matches!(result, Err(ImportError::InvalidUsers(ref e)) if e.len() == 1));
    }

    #[tokio::test]
    async fn test_import_hashes_supplied_bytes() {
        let ledger = MemoryLedger::new();
        // all [sig h'07..'] with indefinite-length arrays
        let mut bytes = vec![0x9f, 0x01, 0x9f, 0x82, 0x00, 0x58, 0x1c];
        bytes.extend_from_slice(hash(7).as_bytes());
        bytes.extend_from_slice(&[0xff, 0xff]);
        let address = script_address(native_script_hash(&bytes), Network::Testnet, None).unwrap();

        let mut payload = payload(vec![user("a", 7, 17)]);
        payload.multisig.address = address.clone();
        payload.multisig.payment_script = hex::encode(&bytes);
        payload.multisig.stake_script = None;

        let imported = import_wallet(&payload, &ledger).await.unwrap();
        assert!(imported.address_matches);
        assert_eq!(imported.derived_address, address);
        assert_eq!(imported.record.script_cbor, hex::encode(&bytes));
        assert!(imported.payment.all_matched());

        let canonical = derive_address(&imported.payment_script, Network::Testnet, None).unwrap();
        assert_ne!(canonical, address);
    }
}
