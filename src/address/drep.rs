//! DRep identifiers
//!
//! CIP-129 ids prefix the credential with a header byte (`0x22` key,
//! `0x23` script) under the `drep` prefix. The older CIP-105 form is the
//! bare hash under `drep_script` / `drep`.

use crate::address::address::{AddressError, Credential, Hash28};
use bech32::{FromBase32, ToBase32, Variant};

const DREP_HRP: &str = "drep";
const DREP_SCRIPT_HRP: &str = "drep_script";
const KEY_HEADER: u8 = 0x22;
const SCRIPT_HEADER: u8 = 0x23;

/// CIP-129 DRep id for a credential
pub fn drep_id(credential: &Credential) -> Result<String, AddressError> {
    let header = match credential {
        Credential::Key(_) => KEY_HEADER,
        Credential::Script(_) => SCRIPT_HEADER,
    };
    let mut bytes = vec![header];
    bytes.extend_from_slice(credential.hash().as_bytes());
    Ok(bech32::encode(DREP_HRP, bytes.to_base32(), Variant::Bech32)?)
}

/// CIP-105 DRep id for a credential
pub fn drep_id_legacy(credential: &Credential) -> Result<String, AddressError> {
    let hrp = match credential {
        Credential::Key(_) => DREP_HRP,
        Credential::Script(_) => DREP_SCRIPT_HRP,
    };
    Ok(bech32::encode(
        hrp,
        credential.hash().as_bytes().to_base32(),
        Variant::Bech32,
    )?)
}

/// Parse either DRep id form back into its credential
pub fn parse_drep_id(id: &str) -> Result<Credential, AddressError> {
    let (hrp, data, _) = bech32::decode(id)?;
    let bytes = Vec::<u8>::from_base32(&data)?;

    match (hrp.as_str(), bytes.len()) {
        (DREP_HRP, 29) => {
            let hash = Hash28::from_slice(&bytes[1..])?;
            match bytes[0] {
                KEY_HEADER => Ok(Credential::Key(hash)),
                SCRIPT_HEADER => Ok(Credential::Script(hash)),
                other => Err(AddressError::UnsupportedAddressType(other)),
            }
        }
        (DREP_HRP, 28) => Ok(Credential::Key(Hash28::from_slice(&bytes)?)),
        (DREP_SCRIPT_HRP, 28) => Ok(Credential::Script(Hash28::from_slice(&bytes)?)),
        (DREP_HRP, len) | (DREP_SCRIPT_HRP, len) => Err(AddressError::InvalidLength(len)),
        _ => Err(AddressError::UnexpectedPrefix(hrp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HASH28_LEN;

    #[test]
    fn test_script_drep_id_round_trip() {
        let cred = Credential::Script(Hash28([0x5a; HASH28_LEN]));
        let id = drep_id(&cred).unwrap();
        assert!(id.starts_with("drep1"));
        assert_eq!(parse_drep_id(&id).unwrap(), cred);

        let legacy = drep_id_legacy(&cred).unwrap();
        assert!(legacy.starts_with("drep_script1"));
        assert_eq!(parse_drep_id(&legacy).unwrap(), cred);
    }

    #[test]
    fn test_key_and_script_ids_differ() {
        let hash = Hash28([1; HASH28_LEN]);
        assert_ne!(
            drep_id(&Credential::Key(hash)).unwrap(),
            drep_id(&Credential::Script(hash)).unwrap()
        );
    }
}
