//! Addresses, credentials and key-hash utilities
//!
//! Foundation for every other module: deriving payment and stake key
//! hashes from bech32 addresses, composing script addresses, and
//! rendering DRep identifiers.

pub mod address;
pub mod drep;
pub mod keyhash;

pub use address::{Address, AddressError, Credential, Hash28, Network};
pub use drep::{drep_id, drep_id_legacy, parse_drep_id};
pub use keyhash::{
    address_network, is_valid_address, is_valid_stake_key_hash, payment_key_hash,
    reward_address_from_key_hash, reward_address_of, stake_key_hash, KEY_HASH_HEX_LEN,
};
