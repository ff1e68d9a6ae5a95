//! Parametrized proxy validators
//!
//! A proxy instance is two Plutus validators. The auth-token minting
//! policy is parametrized by the UTxO consumed at setup, which makes
//! its policy id unique. The proxy spending validator is parametrized
//! by that policy id. Parameters are applied to the flat-encoded UPLC
//! program (see `uplc`), so the hashes match what the ledger computes
//! for the deployed scripts.

use crate::address::{Address, Credential, Hash28, Network};
use crate::crypto::blake2b_224;
use crate::ledger::TxIn;
use crate::proxy::error::ProxyError;
use crate::proxy::uplc::Program;
use crate::script::codec::{write_head, MAJOR_BYTES, MAJOR_UINT};
use serde::{Deserialize, Serialize};

const MAJOR_TAG: u8 = 6;
/// CBOR tag of Plutus data constructor 0
const CONSTR_0_TAG: u64 = 121;
/// Plutus data writes non-empty lists with indefinite length
const INDEFINITE_ARRAY: u8 = 0x9f;
const BREAK: u8 = 0xff;

/// Plutus language version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlutusVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl PlutusVersion {
    /// Prefix byte of the script hash preimage
    pub fn script_tag(self) -> u8 {
        match self {
            PlutusVersion::V1 => 0x01,
            PlutusVersion::V2 => 0x02,
            PlutusVersion::V3 => 0x03,
        }
    }
}

/// A compiled Plutus script as hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlutusScript {
    pub version: PlutusVersion,
    pub code: String,
}

impl PlutusScript {
    pub fn new(version: PlutusVersion, code: impl Into<String>) -> Self {
        Self {
            version,
            code: code.into(),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>, ProxyError> {
        hex::decode(&self.code).map_err(|e| ProxyError::Blueprint(format!("script code: {}", e)))
    }

    pub fn hash(&self) -> Result<Hash28, ProxyError> {
        let mut preimage = vec![self.version.script_tag()];
        preimage.extend(self.bytes()?);
        Ok(Hash28(blake2b_224(&preimage)))
    }

    /// Enterprise address locked by this script
    pub fn address(&self, network: Network) -> Result<String, ProxyError> {
        let address = Address::Enterprise {
            network,
            payment: Credential::Script(self.hash()?),
        };
        Ok(address.to_bech32()?)
    }

    /// Copy of this script applied to a Plutus data parameter
    pub fn apply(&self, param_cbor: Vec<u8>) -> Result<Self, ProxyError> {
        let program = Program::from_cbor(&self.bytes()?)
            .map_err(|e| ProxyError::Blueprint(format!("compiled code: {}", e)))?;
        Ok(Self {
            version: self.version,
            code: hex::encode(program.apply_data(param_cbor).to_cbor()),
        })
    }
}

/// Source of the two proxy validators
pub trait ProxyBlueprint: Send + Sync {
    /// Auth-token minting policy bound to the setup UTxO
    fn auth_token_script(&self, param_utxo: &TxIn) -> Result<PlutusScript, ProxyError>;

    /// Proxy spending validator bound to the auth-token policy
    fn proxy_script(&self, auth_policy_id: &str) -> Result<PlutusScript, ProxyError>;
}

/// `OutputReference` as Plutus data: `Constr 0 [tx_hash, index]`
pub fn output_reference_cbor(input: &TxIn) -> Result<Vec<u8>, ProxyError> {
    let tx_hash = hex::decode(&input.tx_hash)
        .map_err(|e| ProxyError::Blueprint(format!("tx hash {}: {}", input.tx_hash, e)))?;
    let mut out = Vec::with_capacity(tx_hash.len() + 10);
    write_head(&mut out, MAJOR_TAG, CONSTR_0_TAG);
    out.push(INDEFINITE_ARRAY);
    write_head(&mut out, MAJOR_BYTES, tx_hash.len() as u64);
    out.extend_from_slice(&tx_hash);
    write_head(&mut out, MAJOR_UINT, input.output_index as u64);
    out.push(BREAK);
    Ok(out)
}

/// Policy id as Plutus data bytes
pub fn policy_id_cbor(policy_id: &str) -> Result<Vec<u8>, ProxyError> {
    let bytes = hex::decode(policy_id)
        .map_err(|e| ProxyError::Blueprint(format!("policy id {}: {}", policy_id, e)))?;
    let mut out = Vec::with_capacity(bytes.len() + 2);
    write_head(&mut out, MAJOR_BYTES, bytes.len() as u64);
    out.extend_from_slice(&bytes);
    Ok(out)
}

#[derive(Deserialize)]
struct BlueprintFile {
    #[serde(default)]
    preamble: Preamble,
    validators: Vec<ValidatorEntry>,
}

#[derive(Deserialize, Default)]
struct Preamble {
    #[serde(rename = "plutusVersion", default)]
    plutus_version: PlutusVersion,
}

#[derive(Deserialize)]
struct ValidatorEntry {
    title: String,
    #[serde(rename = "compiledCode")]
    compiled_code: String,
}

/// Unparametrized validators compiled by Aiken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AikenBlueprint {
    auth_token: PlutusScript,
    proxy: PlutusScript,
}

impl AikenBlueprint {
    pub fn new(auth_token: PlutusScript, proxy: PlutusScript) -> Self {
        Self { auth_token, proxy }
    }

    /// Read a `plutus.json` blueprint
    ///
    /// Picks the first validators whose titles start with `auth_token`
    /// and `proxy`.
    pub fn from_json(json: &str) -> Result<Self, ProxyError> {
        let file: BlueprintFile =
            serde_json::from_str(json).map_err(|e| ProxyError::Blueprint(e.to_string()))?;
        let version = file.preamble.plutus_version;
        let find = |prefix: &str| {
            file.validators
                .iter()
                .find(|v| v.title.starts_with(prefix))
                .map(|v| PlutusScript::new(version, v.compiled_code.clone()))
                .ok_or_else(|| ProxyError::Blueprint(format!("no {} validator", prefix)))
        };
        Ok(Self::new(find("auth_token")?, find("proxy")?))
    }
}

impl ProxyBlueprint for AikenBlueprint {
    fn auth_token_script(&self, param_utxo: &TxIn) -> Result<PlutusScript, ProxyError> {
        self.auth_token.apply(output_reference_cbor(param_utxo)?)
    }

    fn proxy_script(&self, auth_policy_id: &str) -> Result<PlutusScript, ProxyError> {
        self.proxy.apply(policy_id_cbor(auth_policy_id)?)
    }
}
