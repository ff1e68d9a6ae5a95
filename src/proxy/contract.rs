//! Proxy vault
//!
//! Funds sit at a Plutus script address that releases them only when the
//! spending transaction also moves one of the vault's authorization
//! tokens. Whoever controls the owner address (typically a multisig
//! wallet) holds the tokens and so controls the vault.
//!
//! Lifecycle: `Uninitialized` -> `setup_proxy` -> `SetupPending` ->
//! `submit_setup` or `activate` -> `Active`. A pending setup can be
//! abandoned with `reset`.

use crate::address::{drep_id, Credential, Hash28, Network};
use crate::core::{
    accumulate_lovelace, required_for_outputs, sum_values, Anchor, Certificate, DraftError,
    GovActionId, GreedyBestFit, Redeemer, ScriptWitness, SelectionStrategy, TxBuilder, TxDraft,
    Value, Vote, VoteChoice,
};
use crate::ledger::{Asset, LedgerIndex, TxIn, TxOut, Utxo, LOVELACE};
use crate::proxy::blueprint::ProxyBlueprint;
use crate::proxy::config::ProxyConfig;
use crate::proxy::error::ProxyError;
use crate::proxy::governance::{DrepInfo, DrepStatusService};
use crate::script::NativeScript;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction message metadata label (CIP-20)
pub const MESSAGE_METADATA_LABEL: u64 = 674;

/// Reselections allowed when token-carrying change is under its minimum
const CHANGE_TOP_UP_ROUNDS: usize = 3;

// =============================================================================
// State
// =============================================================================

/// Everything that identifies one proxy instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyParams {
    /// UTxO consumed at setup; parametrizes the auth-token policy
    pub param_utxo: TxIn,
    /// Policy id of the auth tokens; tokens have an empty asset name
    pub auth_policy_id: String,
    pub proxy_script_hash: String,
    pub proxy_address: String,
}

impl ProxyParams {
    /// Asset unit of the auth token
    pub fn auth_token_unit(&self) -> &str {
        &self.auth_policy_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "params", rename_all = "camelCase")]
pub enum ProxyState {
    Uninitialized,
    /// Setup drafted but not yet confirmed on chain
    SetupPending(ProxyParams),
    Active(ProxyParams),
}

impl ProxyState {
    pub fn params(&self) -> Option<&ProxyParams> {
        match self {
            ProxyState::Uninitialized => None,
            ProxyState::SetupPending(params) | ProxyState::Active(params) => Some(params),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ProxyState::Active(_))
    }
}

/// DRep certificate operations on the proxy's script credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrepAction {
    Register,
    Deregister,
    Update,
}

impl DrepAction {
    pub fn name(self) -> &'static str {
        match self {
            DrepAction::Register => "register",
            DrepAction::Deregister => "deregister",
            DrepAction::Update => "update",
        }
    }

    pub fn needs_anchor(self) -> bool {
        !matches!(self, DrepAction::Deregister)
    }
}

impl fmt::Display for DrepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DrepAction {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "register" => Ok(DrepAction::Register),
            "deregister" => Ok(DrepAction::Deregister),
            "update" => Ok(DrepAction::Update),
            other => Err(ProxyError::InvalidRequest(format!(
                "unknown DRep action {}",
                other
            ))),
        }
    }
}

/// Output of `setup_proxy`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupResult {
    pub draft: TxDraft,
    pub params: ProxyParams,
}

/// Inputs shared by every token-gated proxy transaction
struct ControlContext {
    params: ProxyParams,
    token: Utxo,
    collateral: Utxo,
    proxy_utxos: Vec<Utxo>,
}

// =============================================================================
// Contract
// =============================================================================

/// A proxy vault controlled by one owner address
pub struct ProxyContract<B: ProxyBlueprint> {
    owner_address: String,
    /// Native script locking the owner address, witnessed on owner inputs
    owner_script: Option<NativeScript>,
    network: Network,
    blueprint: B,
    config: ProxyConfig,
    strategy: Box<dyn SelectionStrategy>,
    state: ProxyState,
}

impl<B: ProxyBlueprint> ProxyContract<B> {
    pub fn new(owner_address: &str, network: Network, blueprint: B, config: ProxyConfig) -> Self {
        Self {
            owner_address: owner_address.to_string(),
            owner_script: None,
            network,
            blueprint,
            config,
            strategy: Box::new(GreedyBestFit),
            state: ProxyState::Uninitialized,
        }
    }

    /// Reattach to a proxy that was set up earlier from `param_utxo`
    pub fn from_params(
        owner_address: &str,
        network: Network,
        blueprint: B,
        config: ProxyConfig,
        param_utxo: &TxIn,
    ) -> Result<Self, ProxyError> {
        let mut contract = Self::new(owner_address, network, blueprint, config);
        let params = contract.derive_params(param_utxo)?;
        contract.state = ProxyState::Active(params);
        Ok(contract)
    }

    pub fn with_owner_script(mut self, script: NativeScript) -> Self {
        self.owner_script = Some(script);
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn owner_address(&self) -> &str {
        &self.owner_address
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Forget any setup so that `setup_proxy` can run again
    pub fn reset(&mut self) {
        if let Some(params) = self.state.params() {
            log::warn!("Resetting proxy {}", params.proxy_address);
        }
        self.state = ProxyState::Uninitialized;
    }

    /// Mark a pending setup as confirmed
    pub fn activate(&mut self) -> Result<&ProxyParams, ProxyError> {
        let params = match &self.state {
            ProxyState::SetupPending(params) => params.clone(),
            _ => return Err(ProxyError::NotPending),
        };
        log::info!("Proxy {} active", params.proxy_address);
        self.state = ProxyState::Active(params);
        self.active_params()
    }

    fn active_params(&self) -> Result<&ProxyParams, ProxyError> {
        match &self.state {
            ProxyState::Active(params) => Ok(params),
            _ => Err(ProxyError::NotSetUp),
        }
    }

    /// Policy, script hash and address of the proxy bound to `param_utxo`
    pub fn derive_params(&self, param_utxo: &TxIn) -> Result<ProxyParams, ProxyError> {
        let auth_policy_id = self.blueprint.auth_token_script(param_utxo)?.hash()?.to_hex();
        let proxy = self.blueprint.proxy_script(&auth_policy_id)?;
        Ok(ProxyParams {
            param_utxo: param_utxo.clone(),
            auth_policy_id,
            proxy_script_hash: proxy.hash()?.to_hex(),
            proxy_address: proxy.address(self.network)?,
        })
    }

    /// CIP-129 DRep id of the proxy script
    pub fn proxy_drep_id(&self) -> Result<String, ProxyError> {
        let params = self.state.params().ok_or(ProxyError::NotSetUp)?;
        Ok(drep_id(&proxy_credential(params)?)?)
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Draft the setup transaction from the owner's funding UTxOs
    ///
    /// The first funding output holding enough lovelace becomes the
    /// parameter UTxO. The draft mints the auth tokens, seeds the proxy
    /// address and sends one token to the owner in its own output; the
    /// other tokens stay in the owner's change.
    pub fn setup_proxy(&mut self, funding: &[Utxo]) -> Result<SetupResult, ProxyError> {
        if !matches!(self.state, ProxyState::Uninitialized) {
            return Err(ProxyError::AlreadySetUp);
        }

        let minimum = self.config.param_utxo_min_lovelace;
        let param = funding
            .iter()
            .find(|u| u.lovelace() >= minimum)
            .ok_or(ProxyError::NoParamUtxo { minimum })?;
        let remaining: Vec<Utxo> = funding
            .iter()
            .filter(|u| u.input != param.input)
            .cloned()
            .collect();
        let collateral = pick_collateral(&remaining, self.config.collateral_min_lovelace, None)
            .or_else(|| {
                pick_collateral(
                    std::slice::from_ref(param),
                    self.config.collateral_min_lovelace,
                    None,
                )
            })
            .ok_or(ProxyError::NoCollateral {
                minimum: self.config.collateral_min_lovelace,
            })?;

        let params = self.derive_params(&param.input)?;
        let required = Value::lovelace(
            self.config.proxy_seed_lovelace
                + self.config.token_output_lovelace
                + self.config.fee_buffer,
        );
        let extra = if param.value().covers(&required) {
            Vec::new()
        } else {
            self.strategy
                .select(&remaining, &required.saturating_sub(&param.value()))?
        };

        let owner_witness = self.owner_witness()?;
        let mut builder = add_owner_input(self.new_builder(), param, &owner_witness);
        for utxo in &extra {
            builder = add_owner_input(builder, utxo, &owner_witness);
        }
        let draft = builder
            .add_collateral(&collateral)
            .mint(
                &params.auth_policy_id,
                "",
                i64::from(self.config.auth_token_count),
                ScriptWitness::plutus(&params.auth_policy_id, Redeemer::unit()),
            )
            .add_output(
                &params.proxy_address,
                vec![Asset::lovelace(self.config.proxy_seed_lovelace)],
            )
            .add_output(&self.owner_address, self.token_output(&params, 1))
            .metadata(
                MESSAGE_METADATA_LABEL,
                serde_json::json!({ "msg": ["Proxy setup", params.auth_policy_id] }),
            )
            .change_address(&self.owner_address)
            .fee(self.config.fee)
            .build()?;

        log::info!(
            "Drafted proxy setup: {} tokens under {}, proxy {}",
            self.config.auth_token_count,
            params.auth_policy_id,
            params.proxy_address
        );
        self.state = ProxyState::SetupPending(params.clone());
        Ok(SetupResult { draft, params })
    }

    /// Submit a signed setup transaction and activate the proxy
    pub async fn submit_setup<L: LedgerIndex + ?Sized>(
        &mut self,
        ledger: &L,
        signed_tx: &[u8],
    ) -> Result<String, ProxyError> {
        if !matches!(self.state, ProxyState::SetupPending(_)) {
            return Err(ProxyError::NotPending);
        }
        let tx_hash = ledger.submit_tx(signed_tx).await?;
        log::info!("Proxy setup submitted in {}", tx_hash);
        self.activate()?;
        Ok(tx_hash)
    }

    // =========================================================================
    // Token-gated operations
    // =========================================================================

    /// Draft a payment out of the proxy
    pub async fn spend_proxy_simple<L: LedgerIndex + ?Sized>(
        &self,
        ledger: &L,
        outputs: &[TxOut],
    ) -> Result<TxDraft, ProxyError> {
        if outputs.is_empty() {
            return Err(ProxyError::InvalidRequest("no outputs requested".into()));
        }
        let ctx = self.control_context(ledger).await?;
        let required = required_for_outputs(outputs, self.config.fee_buffer);
        if required.get(ctx.params.auth_token_unit()) > 0 {
            return Err(ProxyError::InvalidRequest(
                "outputs may not carry authorization tokens".into(),
            ));
        }

        let draft = self.build_with_change_top_up(|extra| {
            let mut required = required.clone();
            required.add_asset(LOVELACE, extra);
            let selected = self.strategy.select(&ctx.proxy_utxos, &required)?;
            let mut builder = self.control_builder(&ctx, &selected)?;
            for output in outputs {
                builder = builder.add_output(&output.address, output.amount.clone());
            }
            Ok(builder)
        })?;
        log::info!(
            "Drafted proxy spend: {} outputs from {} proxy inputs",
            outputs.len(),
            draft.inputs.len() - 1
        );
        Ok(draft)
    }

    /// Draft a DRep certificate for the proxy's script credential
    pub async fn manage_proxy_drep<L: LedgerIndex + ?Sized>(
        &self,
        ledger: &L,
        action: DrepAction,
        anchor: Option<Anchor>,
    ) -> Result<TxDraft, ProxyError> {
        let anchor = if action.needs_anchor() {
            match anchor {
                Some(anchor) if !anchor.url.is_empty() && !anchor.data_hash.is_empty() => {
                    Some(anchor)
                }
                _ => return Err(ProxyError::MissingAnchor(action.name())),
            }
        } else {
            None
        };

        let ctx = self.control_context(ledger).await?;
        let drep = drep_id(&proxy_credential(&ctx.params)?)?;
        let minimum = match action {
            DrepAction::Register => self.config.drep_register_min_lovelace,
            _ => self.config.governance_min_lovelace,
        };
        let certificate = match (action, anchor) {
            (DrepAction::Register, Some(anchor)) => Certificate::RegDRep {
                drep_id: drep.clone(),
                deposit: self.config.drep_deposit,
                anchor,
            },
            (DrepAction::Update, Some(anchor)) => Certificate::UpdateDRep {
                drep_id: drep.clone(),
                anchor,
            },
            (DrepAction::Deregister, _) => Certificate::UnregDRep {
                drep_id: drep.clone(),
                refund: self.config.drep_deposit,
            },
            (action, None) => return Err(ProxyError::MissingAnchor(action.name())),
        };

        let draft = self.build_with_change_top_up(|extra| {
            let inputs = accumulate_lovelace(&ctx.proxy_utxos, minimum + extra)?;
            Ok(self
                .control_builder(&ctx, &inputs)?
                .certificate(certificate.clone(), Some(proxy_witness(&ctx.params))))
        })?;
        log::info!("Drafted {} of proxy DRep {}", action, drep);
        Ok(draft)
    }

    /// Draft the proxy DRep's votes on governance actions
    pub async fn vote_proxy<L: LedgerIndex + ?Sized>(
        &self,
        ledger: &L,
        votes: &[(GovActionId, VoteChoice)],
        anchor: Option<Anchor>,
    ) -> Result<TxDraft, ProxyError> {
        if votes.is_empty() {
            return Err(ProxyError::InvalidRequest("no votes given".into()));
        }
        let ctx = self.control_context(ledger).await?;
        let drep = drep_id(&proxy_credential(&ctx.params)?)?;
        let minimum = self.config.governance_min_lovelace;

        let draft = self.build_with_change_top_up(|extra| {
            let inputs = accumulate_lovelace(&ctx.proxy_utxos, minimum + extra)?;
            let mut builder = self.control_builder(&ctx, &inputs)?;
            for (action, choice) in votes {
                builder = builder.vote(Vote {
                    drep_id: drep.clone(),
                    action: action.clone(),
                    choice: *choice,
                    anchor: anchor.clone(),
                    witness: Some(proxy_witness(&ctx.params)),
                });
            }
            Ok(builder)
        })?;
        log::info!("Drafted {} votes for proxy DRep {}", votes.len(), drep);
        Ok(draft)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Total value held at the proxy address
    pub async fn proxy_balance<L: LedgerIndex + ?Sized>(
        &self,
        ledger: &L,
    ) -> Result<Value, ProxyError> {
        let params = self.state.params().ok_or(ProxyError::NotSetUp)?;
        let utxos = ledger.fetch_address_utxos(&params.proxy_address).await?;
        Ok(sum_values(&utxos))
    }

    /// Registration state of the proxy DRep
    pub async fn drep_status(
        &self,
        service: &DrepStatusService,
        force_refresh: bool,
    ) -> Result<Option<DrepInfo>, ProxyError> {
        let drep = self.proxy_drep_id()?;
        service.get_drep_status(&drep, force_refresh).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn new_builder(&self) -> TxBuilder {
        TxBuilder::new().coins_per_utxo_byte(self.config.coins_per_utxo_byte)
    }

    /// Build a draft, selecting more lovelace while the proxy change
    /// output carries tokens but too little ADA
    ///
    /// `assemble` receives the extra lovelace to select on top of the
    /// request.
    fn build_with_change_top_up<F>(&self, mut assemble: F) -> Result<TxDraft, ProxyError>
    where
        F: FnMut(u128) -> Result<TxBuilder, ProxyError>,
    {
        let mut extra = 0;
        for _ in 0..CHANGE_TOP_UP_ROUNDS {
            match assemble(extra)?.build() {
                Err(DraftError::ChangeBelowMinimum { missing }) => {
                    log::debug!("Change short {} lovelace, selecting more", missing);
                    extra += missing;
                }
                result => return Ok(result?),
            }
        }
        Ok(assemble(extra)?.build()?)
    }

    fn owner_witness(&self) -> Result<Option<ScriptWitness>, ProxyError> {
        match &self.owner_script {
            Some(script) => Ok(Some(ScriptWitness::Native {
                cbor: script.to_hex()?,
            })),
            None => Ok(None),
        }
    }

    fn token_output(&self, params: &ProxyParams, tokens: u128) -> Vec<Asset> {
        vec![
            Asset::lovelace(self.config.token_output_lovelace),
            Asset::new(params.auth_token_unit(), tokens),
        ]
    }

    /// Owner UTxOs and proxy UTxOs for a token-gated transaction
    ///
    /// The auth token is looked up before anything at the proxy address
    /// is fetched.
    async fn control_context<L: LedgerIndex + ?Sized>(
        &self,
        ledger: &L,
    ) -> Result<ControlContext, ProxyError> {
        let params = self.active_params()?.clone();
        let owner_utxos = ledger.fetch_address_utxos(&self.owner_address).await?;
        let token = owner_utxos
            .iter()
            .find(|u| u.holds(params.auth_token_unit()))
            .cloned()
            .ok_or_else(|| ProxyError::NoAuthToken(self.owner_address.clone()))?;
        let collateral = pick_collateral(
            &owner_utxos,
            self.config.collateral_min_lovelace,
            Some(&token.input),
        )
        .ok_or(ProxyError::NoCollateral {
            minimum: self.config.collateral_min_lovelace,
        })?;
        let proxy_utxos = ledger.fetch_address_utxos(&params.proxy_address).await?;
        log::debug!(
            "Proxy {} holds {} UTxOs; auth token at {}",
            params.proxy_address,
            proxy_utxos.len(),
            token.input
        );

        Ok(ControlContext {
            params,
            token,
            collateral,
            proxy_utxos,
        })
    }

    /// Builder with the token input, proxy inputs and collateral in place
    ///
    /// The token UTxO's whole value goes back to the owner, so the tokens
    /// it carries are reissued one for one. Change returns to the proxy.
    fn control_builder(
        &self,
        ctx: &ControlContext,
        proxy_inputs: &[Utxo],
    ) -> Result<TxBuilder, ProxyError> {
        let owner_witness = self.owner_witness()?;
        let mut builder = add_owner_input(self.new_builder(), &ctx.token, &owner_witness);
        for utxo in proxy_inputs {
            builder = builder.add_script_input(utxo, proxy_witness(&ctx.params));
        }
        Ok(builder
            .add_collateral(&ctx.collateral)
            .add_output(&self.owner_address, ctx.token.output.amount.clone())
            .change_address(&ctx.params.proxy_address)
            .fee(self.config.fee))
    }
}

fn add_owner_input(builder: TxBuilder, utxo: &Utxo, witness: &Option<ScriptWitness>) -> TxBuilder {
    match witness {
        Some(witness) => builder.add_script_input(utxo, witness.clone()),
        None => builder.add_input(utxo),
    }
}

fn proxy_witness(params: &ProxyParams) -> ScriptWitness {
    ScriptWitness::plutus(&params.proxy_script_hash, Redeemer::unit())
}

fn proxy_credential(params: &ProxyParams) -> Result<Credential, ProxyError> {
    Ok(Credential::Script(params.proxy_script_hash.parse::<Hash28>()?))
}

/// First ADA-only UTxO of at least `minimum` lovelace
fn pick_collateral(utxos: &[Utxo], minimum: u128, exclude: Option<&TxIn>) -> Option<Utxo> {
    utxos
        .iter()
        .filter(|u| Some(&u.input) != exclude)
        .find(|u| u.is_pure_ada() && u.lovelace() >= minimum)
        .cloned()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::core::SelectionError;
    use crate::error::ErrorKind;
    use crate::ledger::{MemoryLedger, LOVELACE, LOVELACE_PER_ADA};
    use crate::proxy::blueprint::{AikenBlueprint, PlutusScript, PlutusVersion};
    use crate::storage::ManualClock;
    use std::sync::Arc;

    const ADA: u128 = LOVELACE_PER_ADA;

    fn blueprint() -> AikenBlueprint {
        AikenBlueprint::new(
            PlutusScript::new(PlutusVersion::V3, "46010100200101"),
            PlutusScript::new(PlutusVersion::V3, "450101002601"),
        )
    }

    fn owner() -> String {
        Address::Enterprise {
            network: Network::Testnet,
            payment: Credential::Script(Hash28([7; 28])),
        }
        .to_bech32()
        .unwrap()
    }

    fn utxo(id: u32, address: &str, assets: Vec<Asset>) -> Utxo {
        Utxo::new(
            TxIn::new(format!("{:064x}", id), 0),
            TxOut::new(address, assets),
        )
    }

    fn contract() -> ProxyContract<AikenBlueprint> {
        ProxyContract::new(&owner(), Network::Testnet, blueprint(), ProxyConfig::default())
    }

    /// An active contract plus a ledger holding the owner's token and
    /// collateral and the given proxy UTxOs
    fn active(proxy_lovelace: &[u128]) -> (ProxyContract<AikenBlueprint>, MemoryLedger) {
        let contract = ProxyContract::from_params(
            &owner(),
            Network::Testnet,
            blueprint(),
            ProxyConfig::default(),
            &TxIn::new(format!("{:064x}", 1), 0),
        )
        .unwrap();
        let params = contract.state().params().unwrap().clone();
        let ledger = MemoryLedger::new();
        ledger.add_utxo(utxo(
            10,
            &owner(),
            vec![
                Asset::lovelace(1_500_000),
                Asset::new(params.auth_token_unit(), 9),
            ],
        ));
        ledger.add_utxo(utxo(11, &owner(), vec![Asset::lovelace(10 * ADA)]));
        for (i, amount) in proxy_lovelace.iter().enumerate() {
            ledger.add_utxo(utxo(
                20 + i as u32,
                &params.proxy_address,
                vec![Asset::lovelace(*amount)],
            ));
        }
        (contract, ledger)
    }

    fn anchor() -> Anchor {
        Anchor {
            url: "https://example.org/drep.jsonld".into(),
            data_hash: "00".repeat(32),
        }
    }

    #[test]
    fn test_setup_mints_and_seeds_proxy() {
        let mut contract = contract();
        let funding = vec![
            utxo(1, &owner(), vec![Asset::lovelace(100 * ADA)]),
            utxo(2, &owner(), vec![Asset::lovelace(10 * ADA)]),
        ];
        let SetupResult { draft, params } = contract.setup_proxy(&funding).unwrap();

        assert_eq!(params.param_utxo, funding[0].input);
        assert!(draft.spends(&funding[0].input));
        assert_eq!(draft.collateral, vec![funding[1].clone()]);
        assert_eq!(draft.mints.len(), 1);
        assert_eq!(draft.mints[0].quantity, 10);
        assert!(draft.mints[0].witness.is_plutus());
        assert!(draft.metadata.contains_key(&MESSAGE_METADATA_LABEL));

        let seeded: Vec<_> = draft.outputs_to(&params.proxy_address).collect();
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].value().lovelace_amount(), ADA);

        let owner_outputs: Vec<_> = draft.outputs_to(&owner()).collect();
        assert_eq!(owner_outputs.len(), 2);
        assert_eq!(owner_outputs[0].value().get(params.auth_token_unit()), 1);
        assert_eq!(owner_outputs[1].value().get(params.auth_token_unit()), 9);
        assert_eq!(
            owner_outputs[1].value().lovelace_amount(),
            100 * ADA - ADA - 1_500_000 - 500_000
        );
        assert!(draft.balance_check().is_ok());
        assert_eq!(contract.state(), &ProxyState::SetupPending(params));
    }

    #[test]
    fn test_setup_twice_needs_reset() {
        let mut contract = contract();
        let funding = vec![utxo(1, &owner(), vec![Asset::lovelace(100 * ADA)])];
        contract.setup_proxy(&funding).unwrap();
        assert_eq!(
            contract.setup_proxy(&funding).unwrap_err(),
            ProxyError::AlreadySetUp
        );
        contract.reset();
        assert!(contract.setup_proxy(&funding).is_ok());
    }

    #[test]
    fn test_setup_funding_failures() {
        let mut contract = contract();
        let err = contract
            .setup_proxy(&[utxo(1, &owner(), vec![Asset::lovelace(10 * ADA)])])
            .unwrap_err();
        assert!(matches!(err, ProxyError::NoParamUtxo { .. }));
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let err = contract
            .setup_proxy(&[utxo(
                1,
                &owner(),
                vec![Asset::lovelace(100 * ADA), Asset::new("aa".repeat(28), 5)],
            )])
            .unwrap_err();
        assert!(matches!(err, ProxyError::NoCollateral { .. }));
        assert_eq!(contract.state(), &ProxyState::Uninitialized);
    }

    #[test]
    fn test_from_params_matches_setup() {
        let mut fresh = contract();
        let funding = vec![utxo(1, &owner(), vec![Asset::lovelace(100 * ADA)])];
        let setup = fresh.setup_proxy(&funding).unwrap();

        let (reattached, _) = active(&[]);
        assert_eq!(reattached.state(), &ProxyState::Active(setup.params));
    }

    #[tokio::test]
    async fn test_submit_activates() {
        let mut contract = contract();
        let ledger = MemoryLedger::new();
        assert_eq!(
            contract.submit_setup(&ledger, b"tx").await.unwrap_err(),
            ProxyError::NotPending
        );

        contract
            .setup_proxy(&[utxo(1, &owner(), vec![Asset::lovelace(100 * ADA)])])
            .unwrap();
        contract.submit_setup(&ledger, b"signed").await.unwrap();
        assert!(contract.state().is_active());
        assert_eq!(ledger.submitted().len(), 1);
        assert_eq!(contract.activate().unwrap_err(), ProxyError::NotPending);
    }

    #[tokio::test]
    async fn test_spend_requires_setup() {
        let contract = contract();
        let ledger = MemoryLedger::new();
        let outputs = vec![TxOut::new("addr_test1dest", vec![Asset::lovelace(ADA)])];
        assert_eq!(
            contract
                .spend_proxy_simple(&ledger, &outputs)
                .await
                .unwrap_err(),
            ProxyError::NotSetUp
        );
    }

    #[tokio::test]
    async fn test_spend_without_token_stops_before_proxy_lookup() {
        let contract = ProxyContract::from_params(
            &owner(),
            Network::Testnet,
            blueprint(),
            ProxyConfig::default(),
            &TxIn::new(format!("{:064x}", 1), 0),
        )
        .unwrap();
        let proxy_address = contract.state().params().unwrap().proxy_address.clone();
        let ledger = MemoryLedger::new();
        ledger.add_utxo(utxo(11, &owner(), vec![Asset::lovelace(10 * ADA)]));

        let outputs = vec![TxOut::new("addr_test1dest", vec![Asset::lovelace(ADA)])];
        let err = contract
            .spend_proxy_simple(&ledger, &outputs)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::NoAuthToken(_)));
        assert_eq!(err.kind(), ErrorKind::ProtocolPrecondition);
        assert_eq!(ledger.call_count(&proxy_address), 0);
    }

    #[tokio::test]
    async fn test_spend_returns_token_and_change_to_proxy() {
        let (contract, ledger) = active(&[3 * ADA, 20 * ADA]);
        let params = contract.state().params().unwrap().clone();
        let outputs = vec![TxOut::new("addr_test1dest", vec![Asset::lovelace(5 * ADA)])];

        let draft = contract
            .spend_proxy_simple(&ledger, &outputs)
            .await
            .unwrap();
        assert_eq!(draft.inputs.len(), 2);
        assert!(draft.inputs[1].witness.as_ref().unwrap().is_plutus());
        assert_eq!(draft.collateral[0].lovelace(), 10 * ADA);

        let returned: Vec<_> = draft.outputs_to(&owner()).collect();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].value().get(params.auth_token_unit()), 9);

        let change: Vec<_> = draft.outputs_to(&params.proxy_address).collect();
        assert_eq!(change[0].value().lovelace_amount(), 20 * ADA - 5 * ADA - 500_000);
        assert_eq!(draft.input_value().get(params.auth_token_unit()), 9);
        assert!(draft.balance_check().is_ok());
    }

    #[tokio::test]
    async fn test_spend_rejects_empty_and_underfunded() {
        let (contract, ledger) = active(&[3 * ADA]);
        assert!(matches!(
            contract.spend_proxy_simple(&ledger, &[]).await,
            Err(ProxyError::InvalidRequest(_))
        ));

        let outputs = vec![TxOut::new("addr_test1dest", vec![Asset::lovelace(5 * ADA)])];
        let err = contract
            .spend_proxy_simple(&ledger, &outputs)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Selection(SelectionError::InsufficientBalance { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_spend_tops_up_token_change() {
        let (contract, ledger) = active(&[]);
        let params = contract.state().params().unwrap().clone();
        let other = "ab".repeat(28);
        ledger.add_utxo(utxo(
            20,
            &params.proxy_address,
            vec![Asset::lovelace(6 * ADA), Asset::new(other.as_str(), 5)],
        ));
        let outputs = vec![TxOut::new("addr_test1dest", vec![Asset::lovelace(5 * ADA)])];

        // 0.5 ADA of change cannot carry the five tokens
        let err = contract
            .spend_proxy_simple(&ledger, &outputs)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        ledger.add_utxo(utxo(21, &params.proxy_address, vec![Asset::lovelace(3 * ADA)]));
        let draft = contract
            .spend_proxy_simple(&ledger, &outputs)
            .await
            .unwrap();
        assert_eq!(draft.inputs.len(), 3);
        let change: Vec<_> = draft.outputs_to(&params.proxy_address).collect();
        assert_eq!(change[0].value().get(&other), 5);
        assert_eq!(change[0].value().lovelace_amount(), 9 * ADA - 5 * ADA - 500_000);
        assert!(draft.balance_check().is_ok());
    }

    #[tokio::test]
    async fn test_register_needs_anchor_before_any_lookup() {
        let (contract, ledger) = active(&[600 * ADA]);
        let err = contract
            .manage_proxy_drep(&ledger, DrepAction::Register, None)
            .await
            .unwrap_err();
        assert_eq!(err, ProxyError::MissingAnchor("register"));
        assert_eq!(ledger.call_count(&owner()), 0);

        let partial = Anchor {
            url: "https://example.org".into(),
            data_hash: String::new(),
        };
        assert!(matches!(
            contract
                .manage_proxy_drep(&ledger, DrepAction::Update, Some(partial))
                .await,
            Err(ProxyError::MissingAnchor("update"))
        ));
    }

    #[tokio::test]
    async fn test_register_drep() {
        let (contract, ledger) = active(&[300 * ADA, 300 * ADA]);
        let params = contract.state().params().unwrap().clone();
        let draft = contract
            .manage_proxy_drep(&ledger, DrepAction::Register, Some(anchor()))
            .await
            .unwrap();

        assert_eq!(draft.certificates.len(), 1);
        let cert = &draft.certificates[0];
        assert_eq!(cert.certificate.deposit(), 500 * ADA);
        assert!(cert.witness.as_ref().unwrap().is_plutus());
        match &cert.certificate {
            Certificate::RegDRep { drep_id, .. } => {
                assert_eq!(drep_id, &contract.proxy_drep_id().unwrap())
            }
            other => panic!("unexpected certificate {:?}", other),
        }
        let change: Vec<_> = draft.outputs_to(&params.proxy_address).collect();
        assert_eq!(
            change[0].value().lovelace_amount(),
            600 * ADA - 500 * ADA - 500_000
        );
    }

    #[tokio::test]
    async fn test_register_underfunded() {
        let (contract, ledger) = active(&[100 * ADA]);
        let err = contract
            .manage_proxy_drep(&ledger, DrepAction::Register, Some(anchor()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Selection(SelectionError::InsufficientBalance { required, .. })
                if required == 505 * ADA
        ));
    }

    #[tokio::test]
    async fn test_deregister_refunds_deposit() {
        let (contract, ledger) = active(&[3 * ADA]);
        let params = contract.state().params().unwrap().clone();
        let draft = contract
            .manage_proxy_drep(&ledger, DrepAction::Deregister, None)
            .await
            .unwrap();
        assert_eq!(draft.certificates[0].certificate.refund(), 500 * ADA);
        let change: Vec<_> = draft.outputs_to(&params.proxy_address).collect();
        assert_eq!(
            change[0].value().lovelace_amount(),
            3 * ADA + 500 * ADA - 500_000
        );
    }

    #[tokio::test]
    async fn test_vote() {
        let (contract, ledger) = active(&[5 * ADA]);
        let action = GovActionId {
            tx_hash: "cd".repeat(32),
            index: 0,
        };
        let draft = contract
            .vote_proxy(&ledger, &[(action.clone(), VoteChoice::Yes)], None)
            .await
            .unwrap();
        assert_eq!(draft.votes.len(), 1);
        assert_eq!(draft.votes[0].action, action);
        assert_eq!(draft.votes[0].drep_id, contract.proxy_drep_id().unwrap());

        assert!(matches!(
            contract.vote_proxy(&ledger, &[], None).await,
            Err(ProxyError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_balance_and_drep_status() {
        let (contract, ledger) = active(&[3 * ADA, 4 * ADA]);
        let balance = contract.proxy_balance(&ledger).await.unwrap();
        assert_eq!(balance.get(LOVELACE), 7 * ADA);

        let drep = contract.proxy_drep_id().unwrap();
        assert!(drep.starts_with("drep1"));
        let ledger = Arc::new(ledger);
        ledger.set_document(
            &crate::proxy::governance::drep_path(&drep),
            serde_json::json!({"drep_id": drep, "active": true}),
        );
        let service = DrepStatusService::new(
            ledger.clone(),
            chrono::Duration::seconds(300),
            Arc::new(ManualClock::default()),
        );
        let info = contract.drep_status(&service, false).await.unwrap().unwrap();
        assert!(info.active);
    }

    #[test]
    fn test_drep_action_parse() {
        assert_eq!("Register".parse::<DrepAction>().unwrap(), DrepAction::Register);
        assert!("retire".parse::<DrepAction>().is_err());
        assert!(!DrepAction::Deregister.needs_anchor());
    }
}
