//! Shelley address encoding
//!
//! Addresses are a one-byte header (address type in the high nibble,
//! network id in the low nibble) followed by one or two 28-byte
//! credentials, rendered as bech32.

use crate::crypto::HASH28_LEN;
use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Address and key-hash parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid bech32 string: {0}")]
    InvalidBech32(String),
    #[error("Unexpected bech32 prefix: {0}")]
    UnexpectedPrefix(String),
    #[error("Unsupported address type: {0:#x}")]
    UnsupportedAddressType(u8),
    #[error("Invalid address length: {0} bytes")]
    InvalidLength(usize),
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
    #[error("Address has no stake part: {0}")]
    NoStakePart(String),
    #[error("Unknown network id: {0}")]
    UnknownNetwork(u8),
}

impl From<bech32::Error> for AddressError {
    fn from(err: bech32::Error) -> Self {
        AddressError::InvalidBech32(err.to_string())
    }
}

// =============================================================================
// Network
// =============================================================================

/// Target network tag (0 = test networks, 1 = main network)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    /// Network id as carried in the address header
    pub fn id(self) -> u8 {
        match self {
            Network::Testnet => 0,
            Network::Mainnet => 1,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, AddressError> {
        match id {
            0 => Ok(Network::Testnet),
            1 => Ok(Network::Mainnet),
            other => Err(AddressError::UnknownNetwork(other)),
        }
    }

    /// Human-readable part for payment addresses
    pub fn payment_hrp(self) -> &'static str {
        match self {
            Network::Testnet => "addr_test",
            Network::Mainnet => "addr",
        }
    }

    /// Human-readable part for reward (stake) addresses
    pub fn stake_hrp(self) -> &'static str {
        match self {
            Network::Testnet => "stake_test",
            Network::Mainnet => "stake",
        }
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "testnet" | "preprod" | "preview" => Ok(Network::Testnet),
            "1" | "mainnet" => Ok(Network::Mainnet),
            _ => Err(AddressError::UnexpectedPrefix(s.to_string())),
        }
    }
}

// =============================================================================
// Hash28
// =============================================================================

/// A 28-byte key hash or script hash
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash28(pub [u8; HASH28_LEN]);

impl Hash28 {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() != HASH28_LEN {
            return Err(AddressError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH28_LEN,
                bytes.len()
            )));
        }
        let mut out = [0u8; HASH28_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; HASH28_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Hash28 {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| AddressError::InvalidHash(s.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Hash28 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash28 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash28({})", self.to_hex())
    }
}

impl Serialize for Hash28 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash28 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Credential
// =============================================================================

/// A payment or stake credential: either a key hash or a script hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "hash", rename_all = "lowercase")]
pub enum Credential {
    Key(Hash28),
    Script(Hash28),
}

impl Credential {
    pub fn hash(&self) -> &Hash28 {
        match self {
            Credential::Key(h) | Credential::Script(h) => h,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }
}

// =============================================================================
// Address
// =============================================================================

/// A Shelley-era address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Payment credential plus stake credential
    Base {
        network: Network,
        payment: Credential,
        stake: Credential,
    },
    /// Payment credential only
    Enterprise {
        network: Network,
        payment: Credential,
    },
    /// Stake (reward account) address
    Reward { network: Network, stake: Credential },
}

impl Address {
    pub fn network(&self) -> Network {
        match self {
            Address::Base { network, .. }
            | Address::Enterprise { network, .. }
            | Address::Reward { network, .. } => *network,
        }
    }

    pub fn payment(&self) -> Option<&Credential> {
        match self {
            Address::Base { payment, .. } | Address::Enterprise { payment, .. } => Some(payment),
            Address::Reward { .. } => None,
        }
    }

    pub fn stake(&self) -> Option<&Credential> {
        match self {
            Address::Base { stake, .. } | Address::Reward { stake, .. } => Some(stake),
            Address::Enterprise { .. } => None,
        }
    }

    /// Address type nibble of the header byte
    fn type_nibble(&self) -> u8 {
        match self {
            Address::Base { payment, stake, .. } => {
                (payment.is_script() as u8) | ((stake.is_script() as u8) << 1)
            }
            Address::Enterprise { payment, .. } => 0b0110 | payment.is_script() as u8,
            Address::Reward { stake, .. } => 0b1110 | stake.is_script() as u8,
        }
    }

    /// Raw address bytes (header followed by credentials)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![(self.type_nibble() << 4) | self.network().id()];
        match self {
            Address::Base { payment, stake, .. } => {
                bytes.extend_from_slice(payment.hash().as_bytes());
                bytes.extend_from_slice(stake.hash().as_bytes());
            }
            Address::Enterprise { payment, .. } => {
                bytes.extend_from_slice(payment.hash().as_bytes());
            }
            Address::Reward { stake, .. } => {
                bytes.extend_from_slice(stake.hash().as_bytes());
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let header = *bytes.first().ok_or(AddressError::InvalidLength(0))?;
        let network = Network::from_id(header & 0x0f)?;
        let kind = header >> 4;

        let credential = |script: bool, slice: &[u8]| -> Result<Credential, AddressError> {
            let hash = Hash28::from_slice(slice)?;
            Ok(if script {
                Credential::Script(hash)
            } else {
                Credential::Key(hash)
            })
        };

        match kind {
            0..=3 => {
                if bytes.len() != 1 + 2 * HASH28_LEN {
                    return Err(AddressError::InvalidLength(bytes.len()));
                }
                Ok(Address::Base {
                    network,
                    payment: credential(kind & 0b01 != 0, &bytes[1..29])?,
                    stake: credential(kind & 0b10 != 0, &bytes[29..57])?,
                })
            }
            6 | 7 => {
                if bytes.len() != 1 + HASH28_LEN {
                    return Err(AddressError::InvalidLength(bytes.len()));
                }
                Ok(Address::Enterprise {
                    network,
                    payment: credential(kind == 7, &bytes[1..29])?,
                })
            }
            14 | 15 => {
                if bytes.len() != 1 + HASH28_LEN {
                    return Err(AddressError::InvalidLength(bytes.len()));
                }
                Ok(Address::Reward {
                    network,
                    stake: credential(kind == 15, &bytes[1..29])?,
                })
            }
            other => Err(AddressError::UnsupportedAddressType(other)),
        }
    }

    /// Human-readable part matching this address kind and network
    pub fn hrp(&self) -> &'static str {
        match self {
            Address::Reward { network, .. } => network.stake_hrp(),
            other => other.network().payment_hrp(),
        }
    }

    /// Encode as bech32
    pub fn to_bech32(&self) -> Result<String, AddressError> {
        Ok(bech32::encode(
            self.hrp(),
            self.to_bytes().to_base32(),
            Variant::Bech32,
        )?)
    }

    /// Decode from bech32, checking that the prefix agrees with the header
    pub fn from_bech32(s: &str) -> Result<Self, AddressError> {
        let (hrp, data, _variant) = bech32::decode(s)?;
        let bytes = Vec::<u8>::from_base32(&data)?;
        let address = Self::from_bytes(&bytes)?;
        if address.hrp() != hrp {
            return Err(AddressError::UnexpectedPrefix(hrp));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bech32() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}", hex::encode(self.to_bytes())),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bech32(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> Hash28 {
        Hash28([byte; HASH28_LEN])
    }

    #[test]
    fn test_enterprise_script_address() {
        let addr = Address::Enterprise {
            network: Network::Testnet,
            payment: Credential::Script(hash(0xab)),
        };
        let bytes = addr.to_bytes();
        assert_eq!(bytes[0], 0x70);
        assert_eq!(bytes.len(), 29);

        let encoded = addr.to_bech32().unwrap();
        assert!(encoded.starts_with("addr_test1"));
        assert_eq!(Address::from_bech32(&encoded).unwrap(), addr);
    }

    #[test]
    fn test_base_address_header() {
        let addr = Address::Base {
            network: Network::Mainnet,
            payment: Credential::Script(hash(1)),
            stake: Credential::Key(hash(2)),
        };
        assert_eq!(addr.to_bytes()[0], 0x11);
        let encoded = addr.to_string();
        assert!(encoded.starts_with("addr1"));
        let decoded: Address = encoded.parse().unwrap();
        assert_eq!(decoded.stake(), Some(&Credential::Key(hash(2))));
    }

    #[test]
    fn test_reward_address() {
        let addr = Address::Reward {
            network: Network::Testnet,
            stake: Credential::Key(hash(7)),
        };
        assert_eq!(addr.to_bytes()[0], 0xe0);
        let encoded = addr.to_bech32().unwrap();
        assert!(encoded.starts_with("stake_test1"));
        assert_eq!(Address::from_bech32(&encoded).unwrap(), addr);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Address::from_bech32("not an address").is_err());
        assert!(matches!(
            Address::from_bytes(&[0x40, 1, 2]),
            Err(AddressError::UnsupportedAddressType(4))
        ));
        assert!(matches!(
            Address::from_bytes(&[0x60, 1, 2]),
            Err(AddressError::InvalidLength(3))
        ));
    }

    #[test]
    fn test_prefix_must_match_header() {
        let reward = Address::Reward {
            network: Network::Testnet,
            stake: Credential::Key(hash(3)),
        };
        let forged =
            bech32::encode("addr_test", reward.to_bytes().to_base32(), Variant::Bech32).unwrap();
        assert!(matches!(
            Address::from_bech32(&forged),
            Err(AddressError::UnexpectedPrefix(_))
        ));
    }

    #[test]
    fn test_hash28_parse() {
        let h: Hash28 = "ab".repeat(28).parse().unwrap();
        assert_eq!(h, hash(0xab));
        assert!("abcd".parse::<Hash28>().is_err());
        assert!("zz".repeat(28).parse::<Hash28>().is_err());
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("preprod".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("1".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!(Network::Mainnet.id(), 1);
    }
}
