use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::model::NodeId;

/// Key prefix of the synthesized installed-ledger entry counting luminaire
/// codes per node (one per distinct installed code).
pub const LUMINAIRE_ARM_PREFIX: &str = "LUMINARIA/BRAZO";

/// Synthesized ledger key for an installed luminaire with the given power.
pub fn luminaire_arm_key(power: Option<&str>) -> String {
    match power {
        Some(p) => format!("{LUMINAIRE_ARM_PREFIX} {p}W"),
        None => LUMINAIRE_ARM_PREFIX.to_string(),
    }
}

/// True for keys produced by [`luminaire_arm_key`].
pub fn is_luminaire_arm_key(key: &str) -> bool {
    key.starts_with(LUMINAIRE_ARM_PREFIX)
}

// ---------------------------------------------------------------------------
// Material ledger
// ---------------------------------------------------------------------------

/// Material key → node → accumulated quantity. Entries are only ever
/// increased by positive amounts, so no quantity is ever negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MaterialLedger {
    entries: BTreeMap<String, BTreeMap<NodeId, f64>>,
}

impl MaterialLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of `key` at `node`. Non-positive or non-finite
    /// quantities are ignored; returns whether anything was recorded.
    pub fn add(&mut self, key: &str, node: &NodeId, quantity: f64) -> bool {
        if !(quantity > 0.0) || !quantity.is_finite() {
            return false;
        }
        *self
            .entries
            .entry(key.to_string())
            .or_default()
            .entry(node.clone())
            .or_insert(0.0) += quantity;
        true
    }

    pub fn quantity(&self, key: &str, node: &NodeId) -> f64 {
        self.entries
            .get(key)
            .and_then(|nodes| nodes.get(node))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of `key` over all nodes.
    pub fn total(&self, key: &str) -> f64 {
        self.entries.get(key).map(|nodes| nodes.values().sum()).unwrap_or(0.0)
    }

    /// Material keys in alphabetical order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Per-node quantities of one key.
    pub fn nodes(&self, key: &str) -> Option<&BTreeMap<NodeId, f64>> {
        self.entries.get(key)
    }

    /// Every (key, quantity) recorded at `node`.
    pub fn at_node<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.entries
            .iter()
            .filter_map(move |(key, nodes)| nodes.get(node).map(|q| (key.as_str(), *q)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Point-wise sum of `other` into `self`, translating node ids through
    /// `renames` (ids missing from the map are kept) and skipping keys for
    /// which `skip` returns true.
    pub fn absorb(
        &mut self,
        other: &MaterialLedger,
        renames: &HashMap<NodeId, NodeId>,
        skip: impl Fn(&str) -> bool,
    ) {
        for (key, nodes) in &other.entries {
            if skip(key) {
                continue;
            }
            for (node, quantity) in nodes {
                let target = renames.get(node).unwrap_or(node);
                self.add(key, target, *quantity);
            }
        }
    }

    /// Translate node ids through `renames`, a permutation of the ids in use.
    pub fn rename_nodes(&mut self, renames: &HashMap<NodeId, NodeId>) {
        for nodes in self.entries.values_mut() {
            *nodes = rename_keys(std::mem::take(nodes), renames);
        }
    }
}

/// Re-key a node map through `renames`; ids missing from the map are kept.
pub(crate) fn rename_keys<V>(map: BTreeMap<NodeId, V>, renames: &HashMap<NodeId, NodeId>) -> BTreeMap<NodeId, V> {
    map.into_iter()
        .map(|(node, value)| (renames.get(&node).cloned().unwrap_or(node), value))
        .collect()
}

// ---------------------------------------------------------------------------
// Luminaire codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Slot {
    N1,
    N2,
}

impl Slot {
    pub fn number(&self) -> u8 {
        match self {
            Self::N1 => 1,
            Self::N2 => 2,
        }
    }
}

/// Key of a luminaire code collection: slot plus power rating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeKey {
    pub slot: Slot,
    pub power: Option<String>,
}

impl fmt::Display for CodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.power {
            Some(p) => write!(f, "CODIGO {} LUMINARIA INSTALADA {p} W", self.slot.number()),
            None => write!(f, "CODIGO {} LUMINARIA INSTALADA", self.slot.number()),
        }
    }
}

impl Serialize for CodeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Code key → node → set of installed code strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LuminaireCodes {
    entries: BTreeMap<CodeKey, BTreeMap<NodeId, BTreeSet<String>>>,
}

impl LuminaireCodes {
    /// Record `code` at `node`; returns true if it was not already there.
    pub fn insert(&mut self, key: CodeKey, node: &NodeId, code: &str) -> bool {
        self.entries
            .entry(key)
            .or_default()
            .entry(node.clone())
            .or_default()
            .insert(code.to_string())
    }

    pub fn codes(&self, key: &CodeKey, node: &NodeId) -> Option<&BTreeSet<String>> {
        self.entries.get(key).and_then(|nodes| nodes.get(node))
    }

    /// Number of distinct codes under `key` across all nodes.
    pub fn count(&self, key: &CodeKey) -> usize {
        self.entries
            .get(key)
            .map(|nodes| nodes.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }

    /// True when any code of any key is recorded at `node`.
    pub fn has_node(&self, node: &NodeId) -> bool {
        self.entries
            .values()
            .any(|nodes| nodes.get(node).is_some_and(|codes| !codes.is_empty()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CodeKey, &BTreeMap<NodeId, BTreeSet<String>>)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rename_nodes(&mut self, renames: &HashMap<NodeId, NodeId>) {
        for nodes in self.entries.values_mut() {
            *nodes = rename_keys(std::mem::take(nodes), renames);
        }
    }
}
