//! Core transaction building blocks
//!
//! - Multi-asset values
//! - UTxO selection (pluggable strategy, greedy best-fit by default)
//! - Unsigned transaction drafts

pub mod selection;
pub mod transaction;
pub mod value;

pub use selection::{
    accumulate_lovelace, accumulate_until, required_for_outputs, sum_values, GreedyBestFit,
    SelectionError, SelectionStrategy,
};
pub use transaction::{
    min_output_lovelace, Anchor, Certificate, DraftCertificate, DraftError, DraftInput,
    DraftOutput, GovActionId, Mint, Redeemer, ScriptWitness, TxBuilder, TxDraft, Vote,
    VoteChoice, DEFAULT_COINS_PER_UTXO_BYTE,
};
pub use value::Value;
