//! Native script policies
//!
//! - `native`: the policy tree and its structural analysis
//! - `codec`: the CBOR wire format and script hashing
//! - `builder`: canonical policy construction and address derivation

pub mod builder;
pub mod codec;
pub mod native;

pub use builder::{
    build_policy, derive_address, derive_stake_credential_hash, script_address, PolicyError,
    ScriptKind,
};
pub use codec::{native_script_hash, CodecError, NATIVE_SCRIPT_TAG};
pub use native::{NativeScript, ScriptShape};
