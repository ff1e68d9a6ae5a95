//! Native script tree
//!
//! Boolean threshold policies over key-hash signers, plus the two
//! validity-interval leaves. Structural analysis used when reviewing an
//! imported policy lives here as well.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// =============================================================================
// Native Script
// =============================================================================

/// A native script (multisig policy)
///
/// The JSON form follows the CIP-1854 layout
/// (`{"type":"atLeast","required":2,"scripts":[...]}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NativeScript {
    /// Requires a signature from the key with this hash (lowercase hex)
    #[serde(rename = "sig", rename_all = "camelCase")]
    Sig { key_hash: String },

    /// Every child must be satisfied
    #[serde(rename = "all")]
    All { scripts: Vec<NativeScript> },

    /// At least one child must be satisfied
    #[serde(rename = "any")]
    Any { scripts: Vec<NativeScript> },

    /// At least `required` children must be satisfied
    #[serde(rename = "atLeast")]
    AtLeast {
        required: u32,
        scripts: Vec<NativeScript>,
    },

    /// Valid only from this slot onward (invalid-before)
    #[serde(rename = "after")]
    TimelockStart { slot: u64 },

    /// Valid only before this slot (invalid-hereafter)
    #[serde(rename = "before")]
    TimelockExpiry { slot: u64 },
}

/// Structural shape of a policy, flagged for operator review on import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptShape {
    Flat,
    Hierarchical,
}

impl NativeScript {
    pub fn sig(key_hash: impl Into<String>) -> Self {
        NativeScript::Sig {
            key_hash: key_hash.into(),
        }
    }

    pub fn all(scripts: Vec<NativeScript>) -> Self {
        NativeScript::All { scripts }
    }

    pub fn any(scripts: Vec<NativeScript>) -> Self {
        NativeScript::Any { scripts }
    }

    pub fn at_least(required: u32, scripts: Vec<NativeScript>) -> Self {
        NativeScript::AtLeast { required, scripts }
    }

    /// The degenerate policy produced by lenient decoding of bad input
    pub fn degenerate() -> Self {
        NativeScript::AtLeast {
            required: 1,
            scripts: Vec::new(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        *self == Self::degenerate()
    }

    /// Children of a combinator node (empty for leaves)
    pub fn children(&self) -> &[NativeScript] {
        match self {
            NativeScript::All { scripts }
            | NativeScript::Any { scripts }
            | NativeScript::AtLeast { scripts, .. } => scripts,
            _ => &[],
        }
    }

    pub fn is_combinator(&self) -> bool {
        matches!(
            self,
            NativeScript::All { .. } | NativeScript::Any { .. } | NativeScript::AtLeast { .. }
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NativeScript::Sig { .. } => "sig",
            NativeScript::All { .. } => "all",
            NativeScript::Any { .. } => "any",
            NativeScript::AtLeast { .. } => "atLeast",
            NativeScript::TimelockStart { .. } => "after",
            NativeScript::TimelockExpiry { .. } => "before",
        }
    }

    // =========================================================================
    // Structural analysis
    // =========================================================================

    /// Minimum number of signatures that can satisfy this policy
    ///
    /// `AtLeast` uses its `required` count clamped to the number of
    /// children and sums the cheapest children.
    pub fn minimum_required_signatures(&self) -> u32 {
        match self {
            NativeScript::Sig { .. } => 1,
            NativeScript::TimelockStart { .. } | NativeScript::TimelockExpiry { .. } => 0,
            NativeScript::All { scripts } => scripts
                .iter()
                .map(NativeScript::minimum_required_signatures)
                .sum(),
            NativeScript::Any { scripts } => scripts
                .iter()
                .map(NativeScript::minimum_required_signatures)
                .min()
                .unwrap_or(0),
            NativeScript::AtLeast { required, scripts } => {
                if scripts.is_empty() {
                    return 0;
                }
                let k = (*required as usize).min(scripts.len());
                let mut costs: Vec<u32> = scripts
                    .iter()
                    .map(NativeScript::minimum_required_signatures)
                    .collect();
                costs.sort_unstable();
                costs.iter().take(k).sum()
            }
        }
    }

    /// Largest number of combinator ancestors above any `Sig` leaf
    ///
    /// Timelock leaves never count. A policy without signers has depth 0.
    pub fn hierarchy_depth(&self) -> usize {
        self.sig_depth(0).unwrap_or(0)
    }

    fn sig_depth(&self, ancestors: usize) -> Option<usize> {
        match self {
            NativeScript::Sig { .. } => Some(ancestors),
            NativeScript::TimelockStart { .. } | NativeScript::TimelockExpiry { .. } => None,
            _ => self
                .children()
                .iter()
                .filter_map(|child| child.sig_depth(ancestors + 1))
                .max(),
        }
    }

    /// A signer nested under two or more combinators makes a policy hierarchical
    pub fn is_hierarchical(&self) -> bool {
        self.hierarchy_depth() >= 2
    }

    pub fn shape(&self) -> ScriptShape {
        if self.is_hierarchical() {
            ScriptShape::Hierarchical
        } else {
            ScriptShape::Flat
        }
    }

    /// All signer key hashes, lowercased and de-duplicated, in tree order
    pub fn collect_leaf_key_hashes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.walk_sigs(&mut |key_hash: &str| {
            let lower = key_hash.to_ascii_lowercase();
            if seen.insert(lower.clone()) {
                out.push(lower);
            }
        });
        out
    }

    fn walk_sigs<F: FnMut(&str)>(&self, visit: &mut F) {
        match self {
            NativeScript::Sig { key_hash } => visit(key_hash),
            _ => {
                for child in self.children() {
                    child.walk_sigs(visit);
                }
            }
        }
    }

    /// Number of distinct signers referenced by the policy
    pub fn signer_count(&self) -> usize {
        self.collect_leaf_key_hashes().len()
    }

    /// Short human-readable summary such as "2-of-3" or "all-of-2"
    pub fn describe(&self) -> String {
        let n = self.signer_count();
        match self {
            NativeScript::AtLeast { required, .. } if !self.is_hierarchical() => {
                format!("{}-of-{}", required, n)
            }
            NativeScript::All { .. } if !self.is_hierarchical() => format!("all-of-{}", n),
            NativeScript::Any { .. } if !self.is_hierarchical() => format!("any-of-{}", n),
            NativeScript::Sig { .. } => "single-signer".to_string(),
            _ => format!(
                "{} (hierarchical, min {} of {})",
                self.type_name(),
                self.minimum_required_signatures(),
                n
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
