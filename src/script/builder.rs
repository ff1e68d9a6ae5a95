//! Policy construction and address derivation
//!
//! A policy built from a set of key hashes is canonical: leaves are
//! sorted by key hash so the same signers always hash to the same
//! script, whatever order they were supplied in.

use crate::address::{Address, AddressError, Credential, Hash28, Network};
use crate::script::codec::CodecError;
use crate::script::native::NativeScript;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building a policy or deriving its addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("No valid {0} keys provided")]
    NoValidKeys(&'static str),
    #[error("Invalid script type: {0}")]
    InvalidScriptKind(String),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

/// Combinator wrapping the signer leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScriptKind {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "any")]
    Any,
    #[default]
    #[serde(rename = "atLeast")]
    AtLeast,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScriptKind::All => "all",
            ScriptKind::Any => "any",
            ScriptKind::AtLeast => "atLeast",
        })
    }
}

impl FromStr for ScriptKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ScriptKind::All),
            "any" => Ok(ScriptKind::Any),
            "atLeast" | "atleast" | "at-least" => Ok(ScriptKind::AtLeast),
            other => Err(PolicyError::InvalidScriptKind(other.to_string())),
        }
    }
}

/// Build a canonical policy from signer key hashes
///
/// Duplicates are kept. `required` is only used by `AtLeast`.
pub fn build_policy<'a, I>(key_hashes: I, required: u32, kind: ScriptKind) -> NativeScript
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = key_hashes.into_iter().collect();
    sorted.sort_unstable();

    let leaves = sorted.into_iter().map(NativeScript::sig).collect();
    match kind {
        ScriptKind::All => NativeScript::all(leaves),
        ScriptKind::Any => NativeScript::any(leaves),
        ScriptKind::AtLeast => NativeScript::at_least(required, leaves),
    }
}

/// Script address for a policy, with an optional stake part
pub fn derive_address(
    policy: &NativeScript,
    network: Network,
    stake: Option<Credential>,
) -> Result<String, PolicyError> {
    script_address(policy.script_hash()?, network, stake)
}

/// Address whose payment part is the script with hash `script_hash`
pub fn script_address(
    script_hash: Hash28,
    network: Network,
    stake: Option<Credential>,
) -> Result<String, PolicyError> {
    let payment = Credential::Script(script_hash);
    let address = match stake {
        Some(stake) => Address::Base {
            network,
            payment,
            stake,
        },
        None => Address::Enterprise { network, payment },
    };
    Ok(address.to_bech32()?)
}

/// Hash of the stake policy built from stake keys, `None` without keys
pub fn derive_stake_credential_hash<'a, I>(
    stake_key_hashes: I,
    required: u32,
    kind: ScriptKind,
) -> Result<Option<Hash28>, PolicyError>
where
    I: IntoIterator<Item = &'a str>,
{
    let keys: Vec<&str> = stake_key_hashes.into_iter().collect();
    if keys.is_empty() {
        return Ok(None);
    }
    Ok(Some(build_policy(keys, required, kind).script_hash()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn keys() -> Vec<String> {
        (1u8..=5).map(|b| hex::encode([b * 17; 28])).collect()
    }

    #[test]
    fn test_sorted_leaves() {
        let policy = build_policy(["zzzz", "aaaa"], 1, ScriptKind::AtLeast);
        assert_eq!(
            policy,
            NativeScript::at_least(1, vec![NativeScript::sig("aaaa"), NativeScript::sig("zzzz")])
        );
        assert_eq!(policy.minimum_required_signatures(), 1);
    }

    #[test]
    fn test_deterministic_under_shuffle() {
        let keys = keys();
        let reference = build_policy(keys.iter().map(String::as_str), 3, ScriptKind::AtLeast);
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let mut shuffled = keys.clone();
            shuffled.shuffle(&mut rng);
            let policy = build_policy(shuffled.iter().map(String::as_str), 3, ScriptKind::AtLeast);
            assert_eq!(policy, reference);
            assert_eq!(
                derive_address(&policy, Network::Testnet, None).unwrap(),
                derive_address(&reference, Network::Testnet, None).unwrap()
            );
        }
    }

    #[test]
    fn test_kinds() {
        let keys = keys();
        let all = build_policy(keys.iter().map(String::as_str), 2, ScriptKind::All);
        assert_eq!(all.minimum_required_signatures(), 5);
        let any = build_policy(keys.iter().map(String::as_str), 2, ScriptKind::Any);
        assert_eq!(any.minimum_required_signatures(), 1);
    }

    #[test]
    fn test_duplicates_propagate() {
        let policy = build_policy(["aa", "aa"], 1, ScriptKind::AtLeast);
        assert_eq!(policy.children().len(), 2);
    }

    #[test]
    fn test_derive_address_forms() {
        let keys = keys();
        let policy = build_policy(keys.iter().map(String::as_str), 2, ScriptKind::AtLeast);
        let enterprise = derive_address(&policy, Network::Testnet, None).unwrap();
        let mainnet = derive_address(&policy, Network::Mainnet, None).unwrap();
        assert!(enterprise.starts_with("addr_test1"));
        assert!(mainnet.starts_with("addr1"));

        let stake_hash = derive_stake_credential_hash(
            keys.iter().map(String::as_str),
            2,
            ScriptKind::AtLeast,
        )
        .unwrap()
        .unwrap();
        let base = derive_address(&policy, Network::Testnet, Some(Credential::Script(stake_hash)))
            .unwrap();
        assert_ne!(base, enterprise);
        let decoded = Address::from_bech32(&base).unwrap();
        assert_eq!(decoded.stake(), Some(&Credential::Script(stake_hash)));
    }

    #[test]
    fn test_no_stake_keys() {
        assert_eq!(
            derive_stake_credential_hash(Vec::<&str>::new(), 1, ScriptKind::AtLeast).unwrap(),
            None
        );
    }

    #[test]
    fn test_invalid_key_hash_cannot_derive_address() {
        let policy = build_policy(["aaaa"], 1, ScriptKind::AtLeast);
        assert!(matches!(
            derive_address(&policy, Network::Testnet, None),
            Err(PolicyError::Codec(_))
        ));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("all".parse::<ScriptKind>().unwrap(), ScriptKind::All);
        assert_eq!("atLeast".parse::<ScriptKind>().unwrap(), ScriptKind::AtLeast);
        assert!("some".parse::<ScriptKind>().is_err());
        assert_eq!(ScriptKind::default(), ScriptKind::AtLeast);
    }
}
