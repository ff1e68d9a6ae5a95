//! Key-hash helpers over bech32 addresses
//!
//! Everything here returns lowercase hex so results can be compared
//! directly against script leaves and roster entries.

use crate::address::address::{Address, AddressError, Credential, Hash28, Network};

/// Length of a key hash rendered as hex
pub const KEY_HASH_HEX_LEN: usize = 56;

/// Payment key hash of a base or enterprise address
///
/// Script payment credentials are returned as well; callers compare
/// against leaf hashes and a script hash never matches a signer.
pub fn payment_key_hash(address: &str) -> Result<String, AddressError> {
    let addr = Address::from_bech32(address)?;
    addr.payment()
        .map(|cred| cred.hash().to_hex())
        .ok_or_else(|| AddressError::UnexpectedPrefix(address.to_string()))
}

/// Stake key hash of a base address or reward address
pub fn stake_key_hash(address: &str) -> Result<String, AddressError> {
    let addr = Address::from_bech32(address)?;
    addr.stake()
        .map(|cred| cred.hash().to_hex())
        .ok_or_else(|| AddressError::NoStakePart(address.to_string()))
}

/// Network an address belongs to
pub fn address_network(address: &str) -> Result<Network, AddressError> {
    Ok(Address::from_bech32(address)?.network())
}

/// Whether the string decodes as a payment address
pub fn is_valid_address(address: &str) -> bool {
    matches!(
        Address::from_bech32(address),
        Ok(Address::Base { .. }) | Ok(Address::Enterprise { .. })
    )
}

/// Reward address for a stake key hash
pub fn reward_address_from_key_hash(
    key_hash_hex: &str,
    network: Network,
) -> Result<String, AddressError> {
    let hash: Hash28 = key_hash_hex.parse()?;
    Address::Reward {
        network,
        stake: Credential::Key(hash),
    }
    .to_bech32()
}

/// Reward address sharing the stake credential of a base address
pub fn reward_address_of(address: &str) -> Result<String, AddressError> {
    let addr = Address::from_bech32(address)?;
    let stake = *addr
        .stake()
        .ok_or_else(|| AddressError::NoStakePart(address.to_string()))?;
    Address::Reward {
        network: addr.network(),
        stake,
    }
    .to_bech32()
}

/// A stake key hash is 56 lowercase hex characters that survive a round
/// trip through a reward address.
pub fn is_valid_stake_key_hash(key_hash_hex: &str, network: Network) -> bool {
    if key_hash_hex.len() != KEY_HASH_HEX_LEN
        || !key_hash_hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return false;
    }

    reward_address_from_key_hash(key_hash_hex, network)
        .and_then(|reward| stake_key_hash(&reward))
        .map(|round_trip| round_trip == key_hash_hex)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HASH28_LEN;

    fn base_address(payment: u8, stake: u8) -> String {
        Address::Base {
            network: Network::Testnet,
            payment: Credential::Key(Hash28([payment; HASH28_LEN])),
            stake: Credential::Key(Hash28([stake; HASH28_LEN])),
        }
        .to_bech32()
        .unwrap()
    }

    #[test]
    fn test_payment_and_stake_key_hash() {
        let addr = base_address(0x11, 0x22);
        assert_eq!(payment_key_hash(&addr).unwrap(), "11".repeat(28));
        assert_eq!(stake_key_hash(&addr).unwrap(), "22".repeat(28));
        assert_eq!(address_network(&addr).unwrap(), Network::Testnet);
        assert!(is_valid_address(&addr));
    }

    #[test]
    fn test_reward_address_round_trip() {
        let key = "33".repeat(28);
        let reward = reward_address_from_key_hash(&key, Network::Mainnet).unwrap();
        assert!(reward.starts_with("stake1"));
        assert_eq!(stake_key_hash(&reward).unwrap(), key);
        assert!(payment_key_hash(&reward).is_err());
        assert!(!is_valid_address(&reward));
    }

    #[test]
    fn test_reward_address_of_base() {
        let addr = base_address(0x01, 0x02);
        let reward = reward_address_of(&addr).unwrap();
        assert_eq!(stake_key_hash(&reward).unwrap(), "02".repeat(28));
    }

    #[test]
    fn test_stake_key_hash_validation() {
        assert!(is_valid_stake_key_hash(&"ab".repeat(28), Network::Testnet));
        assert!(!is_valid_stake_key_hash(&"AB".repeat(28), Network::Testnet));
        assert!(!is_valid_stake_key_hash(&"ab".repeat(27), Network::Testnet));
        assert!(!is_valid_stake_key_hash(&"zz".repeat(28), Network::Testnet));
    }

    #[test]
    fn test_enterprise_has_no_stake_part() {
        let addr = Address::Enterprise {
            network: Network::Testnet,
            payment: Credential::Key(Hash28([9; HASH28_LEN])),
        }
        .to_bech32()
        .unwrap();
        assert!(matches!(
            stake_key_hash(&addr),
            Err(AddressError::NoStakePart(_))
        ));
    }
}
