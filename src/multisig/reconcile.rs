//! Signer reconciliation
//!
//! Matches the leaf key hashes of a decoded policy against a roster of
//! known signers. Payment leaves are matched in two phases: a local pass
//! over the roster's declared addresses, then one joined batch of ledger
//! lookups over the address history of each remaining entry's stake
//! account. Output is always in leaf order.

use crate::address::{payment_key_hash, reward_address_from_key_hash, reward_address_of, Network};
use crate::ledger::{fetch_account_addresses, LedgerIndex};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A known signer as supplied by an import or an operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub stake_key_hash: Option<String>,
    #[serde(default)]
    pub drep_key_hash: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl RosterEntry {
    pub fn new(address: &str, stake_key_hash: &str, description: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            address: non_empty(address),
            stake_key_hash: non_empty(stake_key_hash),
            drep_key_hash: None,
            description: description.to_string(),
        }
    }

    fn declared_address(&self) -> Option<&str> {
        self.address.as_deref().filter(|a| !a.is_empty())
    }

    /// Reward address whose history is searched in the second phase
    fn stake_account(&self, network: Network) -> Option<String> {
        if let Some(hash) = self.stake_key_hash.as_deref().filter(|h| !h.is_empty()) {
            if let Ok(reward) = reward_address_from_key_hash(hash, network) {
                return Some(reward);
            }
        }
        self.declared_address()
            .and_then(|address| reward_address_of(address).ok())
    }
}

/// How a leaf was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchSource {
    /// The entry's declared address or stake key
    Direct,
    /// An address from the entry's stake account history
    AccountHistory,
    Unmatched,
}

/// Reconciliation outcome for one leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafMatch {
    pub key_hash: String,
    pub matched: bool,
    pub source: MatchSource,
    /// Index into the input roster
    pub roster_index: Option<usize>,
    /// Payment address whose key hash equals the leaf (payment case)
    pub address: Option<String>,
}

impl LeafMatch {
    fn unmatched(key_hash: &str) -> Self {
        Self {
            key_hash: key_hash.to_string(),
            matched: false,
            source: MatchSource::Unmatched,
            roster_index: None,
            address: None,
        }
    }
}

/// Per-leaf matches plus the roster reordered to leaf order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub matches: Vec<LeafMatch>,
    /// One entry per leaf; unmatched leaves carry the key hash itself as
    /// a placeholder
    pub roster: Vec<RosterEntry>,
}

impl Reconciliation {
    pub fn all_matched(&self) -> bool {
        self.matches.iter().all(|m| m.matched)
    }

    pub fn unmatched(&self) -> Vec<&str> {
        self.matches
            .iter()
            .filter(|m| !m.matched)
            .map(|m| m.key_hash.as_str())
            .collect()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.roster
            .iter()
            .map(|e| e.address.clone().unwrap_or_default())
            .collect()
    }

    pub fn stake_key_hashes(&self) -> Vec<String> {
        self.roster
            .iter()
            .map(|e| e.stake_key_hash.clone().unwrap_or_default())
            .collect()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.roster.iter().map(|e| e.description.clone()).collect()
    }
}

struct Matcher {
    leaves: Vec<String>,
    matches: Vec<LeafMatch>,
    used: Vec<bool>,
}

impl Matcher {
    fn new(leaves: &[String], roster_len: usize) -> Self {
        let leaves: Vec<String> = leaves.iter().map(|l| l.to_lowercase()).collect();
        let matches = leaves.iter().map(|l| LeafMatch::unmatched(l)).collect();
        Self {
            leaves,
            matches,
            used: vec![false; roster_len],
        }
    }

    /// Record a match for the first unmatched leaf equal to `key_hash`
    fn claim(
        &mut self,
        key_hash: &str,
        index: usize,
        address: Option<String>,
        source: MatchSource,
    ) -> bool {
        if self.used[index] {
            return false;
        }
        let key_hash = key_hash.to_lowercase();
        let slot = self
            .leaves
            .iter()
            .zip(self.matches.iter())
            .position(|(leaf, m)| *leaf == key_hash && !m.matched);
        match slot {
            Some(slot) => {
                self.matches[slot] = LeafMatch {
                    key_hash,
                    matched: true,
                    source,
                    roster_index: Some(index),
                    address,
                };
                self.used[index] = true;
                true
            }
            None => false,
        }
    }

    fn finish(
        self,
        roster: &[RosterEntry],
        placeholder: fn(&mut RosterEntry, &str),
    ) -> Reconciliation {
        let aligned = self
            .matches
            .iter()
            .map(|m| match m.roster_index {
                Some(index) => {
                    let mut entry = roster[index].clone();
                    if m.address.is_some() {
                        entry.address = m.address.clone();
                    }
                    entry
                }
                None => {
                    let mut entry = RosterEntry::default();
                    placeholder(&mut entry, &m.key_hash);
                    entry
                }
            })
            .collect();
        Reconciliation {
            matches: self.matches,
            roster: aligned,
        }
    }
}

/// Reconcile payment leaves against roster addresses
///
/// Lookup failures for one entry are logged and do not affect the
/// others. Each roster entry satisfies at most one leaf.
pub async fn reconcile_payment<L: LedgerIndex + ?Sized>(
    leaves: &[String],
    roster: &[RosterEntry],
    ledger: &L,
    network: Network,
) -> Reconciliation {
    let mut matcher = Matcher::new(leaves, roster.len());

    for (index, entry) in roster.iter().enumerate() {
        let Some(address) = entry.declared_address() else {
            continue;
        };
        if let Ok(key_hash) = payment_key_hash(address) {
            matcher.claim(&key_hash, index, Some(address.to_string()), MatchSource::Direct);
        }
    }

    // Entries whose declared key is a leaf are not looked up, even when a
    // duplicate entry claimed that leaf first
    let leaf_set: HashSet<&str> = matcher.leaves.iter().map(String::as_str).collect();
    let pending: Vec<(usize, String)> = roster
        .iter()
        .enumerate()
        .filter(|(index, entry)| {
            !matcher.used[*index]
                && match entry.declared_address().map(payment_key_hash) {
                    Some(Ok(key_hash)) => !leaf_set.contains(key_hash.to_lowercase().as_str()),
                    _ => true,
                }
        })
        .filter_map(|(index, entry)| entry.stake_account(network).map(|stake| (index, stake)))
        .collect();

    if !pending.is_empty() && matcher.matches.iter().any(|m| !m.matched) {
        log::debug!("Looking up address history for {} roster entries", pending.len());
        let lookups = pending
            .iter()
            .map(|(_, stake)| fetch_account_addresses(ledger, stake));
        let results = join_all(lookups).await;

        for ((index, stake), result) in pending.iter().zip(results) {
            let candidates = match result {
                Ok(candidates) => candidates,
                Err(err) => {
                    log::warn!(
                        "Address lookup for roster entry {} ({}) failed: {}",
                        index,
                        stake,
                        err
                    );
                    continue;
                }
            };
            for candidate in candidates {
                let Ok(key_hash) = payment_key_hash(&candidate) else {
                    continue;
                };
                if matcher.claim(&key_hash, *index, Some(candidate), MatchSource::AccountHistory) {
                    break;
                }
            }
        }
    }

    let result = matcher.finish(roster, |entry, key_hash| {
        entry.address = Some(key_hash.to_string())
    });
    log::info!(
        "Reconciled {} of {} payment leaves",
        result.matches.iter().filter(|m| m.matched).count(),
        result.matches.len()
    );
    result
}

/// Reconcile stake leaves against roster stake key hashes
pub fn reconcile_stake(leaves: &[String], roster: &[RosterEntry]) -> Reconciliation {
    let mut matcher = Matcher::new(leaves, roster.len());
    for (index, entry) in roster.iter().enumerate() {
        if let Some(key_hash) = entry.stake_key_hash.as_deref().filter(|h| !h.is_empty()) {
            matcher.claim(key_hash, index, None, MatchSource::Direct);
        }
    }
    matcher.finish(roster, |entry, key_hash| {
        entry.stake_key_hash = Some(key_hash.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Credential, Hash28};
    use crate::ledger::{account_addresses_path, MemoryLedger};
    use serde_json::json;

    fn hash(b: u8) -> Hash28 {
        Hash28([b; 28])
    }

    fn base_address(payment: u8, stake: u8) -> String {
        Address::Base {
            network: Network::Testnet,
            payment: Credential::Key(hash(payment)),
            stake: Credential::Key(hash(stake)),
        }
        .to_bech32()
        .unwrap()
    }

    fn stake_account(stake: u8) -> String {
        reward_address_from_key_hash(&hash(stake).to_hex(), Network::Testnet).unwrap()
    }

    fn leaves(bytes: &[u8]) -> Vec<String> {
        bytes.iter().map(|b| hash(*b).to_hex()).collect()
    }

    #[tokio::test]
    async fn test_direct_matches_follow_leaf_order() {
        let ledger = MemoryLedger::new();
        let roster = vec![
            RosterEntry::new(&base_address(3, 13), "", "carol"),
            RosterEntry::new(&base_address(1, 11), "", "alice"),
        ];
        let result = reconcile_payment(&leaves(&[1, 3]), &roster, &ledger, Network::Testnet).await;

        assert!(result.all_matched());
        assert_eq!(result.descriptions(), vec!["alice", "carol"]);
        assert_eq!(result.matches[0].roster_index, Some(1));
        assert_eq!(result.matches[0].source, MatchSource::Direct);
        assert_eq!(ledger.call_count(&account_addresses_path(&stake_account(11))), 0);
    }

    #[tokio::test]
    async fn test_history_lookup_fallback() {
        let ledger = MemoryLedger::new();
        let historical = base_address(2, 12);
        ledger.set_document(
            &account_addresses_path(&stake_account(12)),
            json!([{ "address": base_address(9, 12) }, { "address": historical }]),
        );
        // Declared address uses a payment key that is not in the policy
        let roster = vec![RosterEntry::new(&base_address(7, 12), "", "bob")];

        let result = reconcile_payment(&leaves(&[2]), &roster, &ledger, Network::Testnet).await;
        assert!(result.all_matched());
        assert_eq!(result.matches[0].source, MatchSource::AccountHistory);
        assert_eq!(result.addresses(), vec![historical]);
    }

    #[tokio::test]
    async fn test_lookup_by_stake_key_without_address() {
        let ledger = MemoryLedger::new();
        ledger.set_document(
            &account_addresses_path(&stake_account(14)),
            json!([{ "address": base_address(4, 14) }]),
        );
        let roster = vec![RosterEntry::new("", &hash(14).to_hex(), "dave")];

        let result = reconcile_payment(&leaves(&[4]), &roster, &ledger, Network::Testnet).await;
        assert!(result.all_matched());
        assert_eq!(result.stake_key_hashes(), vec![hash(14).to_hex()]);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_isolated() {
        let ledger = MemoryLedger::new();
        ledger.fail_on(&account_addresses_path(&stake_account(15)), "provider down");
        ledger.set_document(
            &account_addresses_path(&stake_account(16)),
            json!([{ "address": base_address(6, 16) }]),
        );
        let roster = vec![
            RosterEntry::new(&base_address(8, 15), "", "erin"),
            RosterEntry::new(&base_address(8, 16), "", "frank"),
        ];

        let result = reconcile_payment(&leaves(&[5, 6]), &roster, &ledger, Network::Testnet).await;
        assert!(!result.all_matched());
        assert_eq!(result.unmatched(), vec![hash(5).to_hex()]);
        assert!(result.matches[1].matched);
        assert_eq!(ledger.call_count(&account_addresses_path(&stake_account(15))), 1);
    }

    #[tokio::test]
    async fn test_unmatched_leaf_placeholder_and_alignment() {
        let ledger = MemoryLedger::new();
        let roster = vec![RosterEntry::new(&base_address(1, 11), "", "alice")];
        let leaves = leaves(&[1, 2, 3]);

        let result = reconcile_payment(&leaves, &roster, &ledger, Network::Testnet).await;
        assert_eq!(result.roster.len(), leaves.len());
        assert_eq!(result.addresses()[1], leaves[1]);
        for m in result.matches.iter().filter(|m| m.matched) {
            let address = m.address.as_deref().unwrap();
            assert_eq!(payment_key_hash(address).unwrap(), m.key_hash);
        }
    }

    #[tokio::test]
    async fn test_entry_used_once() {
        let ledger = MemoryLedger::new();
        let address = base_address(1, 11);
        let roster = vec![RosterEntry::new(&address, "", "alice")];
        // Duplicate leaf: the single entry can only satisfy one of them
        let leaves = vec![hash(1).to_hex(), hash(1).to_hex()];

        let result = reconcile_payment(&leaves, &roster, &ledger, Network::Testnet).await;
        assert!(result.matches[0].matched);
        assert!(!result.matches[1].matched);
    }

    #[tokio::test]
    async fn test_duplicate_declared_key_not_looked_up() {
        let ledger = MemoryLedger::new();
        ledger.set_document(
            &account_addresses_path(&stake_account(12)),
            json!([{ "address": base_address(2, 12) }]),
        );
        // Both entries declare leaf 1; the second loses it to the first
        let roster = vec![
            RosterEntry::new(&base_address(1, 11), "", "alice"),
            RosterEntry::new(&base_address(1, 12), "", "alice again"),
        ];

        let result = reconcile_payment(&leaves(&[1, 2]), &roster, &ledger, Network::Testnet).await;
        assert!(result.matches[0].matched);
        assert!(!result.matches[1].matched);
        assert_eq!(ledger.call_count(&account_addresses_path(&stake_account(12))), 0);
    }

    #[test]
    fn test_stake_reconciliation() {
        let roster = vec![
            RosterEntry::new("", &hash(12).to_hex(), "bob"),
            RosterEntry::new("", &hash(11).to_hex().to_uppercase(), "alice"),
        ];
        let result = reconcile_stake(&leaves(&[11, 12, 13]), &roster);
        assert_eq!(result.matches[0].roster_index, Some(1));
        assert_eq!(result.matches[1].roster_index, Some(0));
        assert!(!result.matches[2].matched);
        assert_eq!(result.stake_key_hashes()[2], hash(13).to_hex());
        assert_eq!(result.descriptions(), vec!["alice", "bob", ""]);
    }
}
