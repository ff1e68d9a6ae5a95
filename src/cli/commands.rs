//! CLI commands for multisig wallets and proxy vaults
//!
//! Every handler reads its inputs from JSON files and prints its result
//! as pretty JSON on stdout.

use crate::address::{
    address_network, payment_key_hash, reward_address_of, stake_key_hash, Hash28, Network,
};
use crate::core::Anchor;
use crate::ledger::{MemoryLedger, TxIn, TxOut, Utxo};
use crate::multisig::{import_wallet, ImportPayload, MultisigWallet, SignerKey, WalletRecord};
use crate::proxy::{AikenBlueprint, DrepAction, ProxyConfig, ProxyContract};
use crate::script::{native_script_hash, script_address, NativeScript, ScriptKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&data)?)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Proxy settings from `--config`, or the defaults
pub fn load_config(path: Option<&Path>) -> CliResult<ProxyConfig> {
    match path {
        Some(path) => ProxyConfig::load(path),
        None => Ok(ProxyConfig::default()),
    }
}

fn load_ledger(path: Option<&Path>) -> CliResult<MemoryLedger> {
    match path {
        Some(path) => Ok(MemoryLedger::load(path)?),
        None => Ok(MemoryLedger::new()),
    }
}

fn load_blueprint(path: &Path) -> CliResult<AikenBlueprint> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(AikenBlueprint::from_json(&data)?)
}

// =============================================================================
// Wallets and scripts
// =============================================================================

/// Options for `wallet build`
pub struct WalletBuildArgs<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub keys: &'a Path,
    pub required: u32,
    pub kind: ScriptKind,
    pub stake_credential_hash: Option<&'a str>,
}

/// Build a wallet from a JSON array of signer keys
pub fn cmd_wallet_build(network: Network, args: &WalletBuildArgs<'_>) -> CliResult<()> {
    let keys: Vec<SignerKey> = read_json(args.keys)?;
    let mut wallet = MultisigWallet::new(
        args.name,
        keys,
        args.description,
        args.required,
        network,
    )
    .with_script_kind(args.kind);
    if let Some(hash) = args.stake_credential_hash {
        wallet = wallet.with_stake_credential_hash(hash.parse::<Hash28>()?);
    }

    let script = wallet.get_script()?;
    let record = WalletRecord::from_wallet(&wallet)?;
    print_json(&json!({
        "policy": script.script.describe(),
        "script": script.script,
        "scriptCbor": script.cbor,
        "address": script.address,
        "stakingEnabled": wallet.staking_enabled(),
        "drepId": wallet.drep_id()?,
        "record": record,
        "metadata": wallet.metadata_json(),
    }))
}

/// Decode a native script and summarize its structure
pub fn cmd_script_inspect(network: Network, cbor_hex: &str) -> CliResult<()> {
    let bytes = hex::decode(cbor_hex.trim())?;
    let script = NativeScript::try_decode(&bytes)?;
    let hash = native_script_hash(&bytes);
    print_json(&json!({
        "type": script.type_name(),
        "policy": script.describe(),
        "shape": script.shape(),
        "requiredSignatures": script.minimum_required_signatures(),
        "signers": script.collect_leaf_key_hashes(),
        "scriptHash": hash.to_hex(),
        "address": script_address(hash, network, None)?,
        "script": script,
    }))
}

/// Key hashes carried by a bech32 address
pub fn cmd_address_keyhash(address: &str) -> CliResult<()> {
    print_json(&json!({
        "network": address_network(address)?,
        "paymentKeyHash": payment_key_hash(address)?,
        "stakeKeyHash": stake_key_hash(address).ok(),
        "rewardAddress": reward_address_of(address).ok(),
    }))
}

/// Validate and reconcile an import payload
pub async fn cmd_import_validate(payload: &Path, ledger: Option<&Path>) -> CliResult<()> {
    let payload: ImportPayload = read_json(payload)?;
    let ledger = load_ledger(ledger)?;
    let imported = import_wallet(&payload, &ledger).await?;
    if !imported.payment.all_matched() {
        log::warn!(
            "Unmatched payment signers: {}",
            imported.payment.unmatched().join(", ")
        );
    }
    print_json(&imported)
}

// =============================================================================
// Proxy
// =============================================================================

/// Draft the proxy setup transaction from a JSON array of funding UTxOs
pub fn cmd_proxy_setup(
    network: Network,
    config: ProxyConfig,
    blueprint: &Path,
    owner: &str,
    funding: &Path,
) -> CliResult<()> {
    let funding: Vec<Utxo> = read_json(funding)?;
    let mut proxy = ProxyContract::new(owner, network, load_blueprint(blueprint)?, config);
    let setup = proxy.setup_proxy(&funding)?;
    print_json(&setup)
}

/// Identifies an already deployed proxy
pub struct ProxyArgs<'a> {
    pub blueprint: &'a Path,
    pub owner: &'a str,
    pub param_tx: &'a str,
    pub param_index: u32,
    pub ledger: &'a Path,
}

fn open_proxy(
    network: Network,
    config: ProxyConfig,
    args: &ProxyArgs<'_>,
) -> CliResult<(ProxyContract<AikenBlueprint>, MemoryLedger)> {
    let proxy = ProxyContract::from_params(
        args.owner,
        network,
        load_blueprint(args.blueprint)?,
        config,
        &TxIn::new(args.param_tx, args.param_index),
    )?;
    Ok((proxy, MemoryLedger::load(args.ledger)?))
}

/// Draft a payment out of the proxy from a JSON array of outputs
pub async fn cmd_proxy_spend(
    network: Network,
    config: ProxyConfig,
    args: &ProxyArgs<'_>,
    outputs: &Path,
) -> CliResult<()> {
    let outputs: Vec<TxOut> = read_json(outputs)?;
    let (proxy, ledger) = open_proxy(network, config, args)?;
    let draft = proxy.spend_proxy_simple(&ledger, &outputs).await?;
    print_json(&draft)
}

/// Draft a DRep certificate for the proxy
pub async fn cmd_proxy_drep(
    network: Network,
    config: ProxyConfig,
    args: &ProxyArgs<'_>,
    action: DrepAction,
    anchor_url: Option<&str>,
    anchor_hash: Option<&str>,
) -> CliResult<()> {
    let anchor = match (anchor_url, anchor_hash) {
        (Some(url), Some(hash)) => Some(Anchor {
            url: url.to_string(),
            data_hash: hash.to_string(),
        }),
        _ => None,
    };
    let (proxy, ledger) = open_proxy(network, config, args)?;
    let draft = proxy.manage_proxy_drep(&ledger, action, anchor).await?;
    print_json(&draft)
}

/// Proxy address, DRep id and balance
pub async fn cmd_proxy_info(
    network: Network,
    config: ProxyConfig,
    args: &ProxyArgs<'_>,
) -> CliResult<()> {
    let (proxy, ledger) = open_proxy(network, config, args)?;
    let balance = proxy.proxy_balance(&ledger).await?;
    print_json(&json!({
        "state": proxy.state(),
        "drepId": proxy.proxy_drep_id()?,
        "balance": balance.to_assets(),
    }))
}
