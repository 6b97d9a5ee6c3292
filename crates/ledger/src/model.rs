use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::config::Markers;
use crate::identity::NodeIdentityResolver;
use crate::ledger::{
    is_luminaire_arm_key, luminaire_arm_key, rename_keys, CodeKey, LuminaireCodes, MaterialLedger, Slot,
};
use crate::normalize::is_marker;
use crate::timestamp::SyncTime;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Resolved node-instance id, unique within one work order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder instances (`0_{OT}_{n}`) stand for materials not tied to a pole.
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with("0_")
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a row came from: upload index, sheet index, data row index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowOrigin {
    pub file: usize,
    pub sheet: usize,
    pub row: usize,
}

// ---------------------------------------------------------------------------
// Row facts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialQty {
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LuminaireReading {
    pub slot: Slot,
    pub code: String,
    pub power: Option<String>,
}

/// One spreadsheet row, normalized. Produced by extraction, consumed by
/// [`WorkOrder::fold`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFact {
    pub ot: String,
    pub pole_id: String,
    pub installed: Vec<MaterialQty>,
    pub removed: Vec<MaterialQty>,
    pub luminaires: Vec<LuminaireReading>,
    pub aspect: Option<String>,
    pub sync: SyncTime,
    pub soil: Option<String>,
    pub origin: RowOrigin,
}

impl RowFact {
    pub fn new(ot: impl Into<String>, pole_id: impl Into<String>) -> Self {
        Self {
            ot: ot.into(),
            pole_id: pole_id.into(),
            installed: Vec::new(),
            removed: Vec::new(),
            luminaires: Vec::new(),
            aspect: None,
            sync: SyncTime::Unparseable,
            soil: None,
            origin: RowOrigin::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Work order
// ---------------------------------------------------------------------------

/// One physical-pole visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub raw_pole_id: String,
    pub node_id: NodeId,
    pub sync: SyncTime,
    pub origin: RowOrigin,
}

/// Aggregate of every row referencing one OT. Owns its ledgers; the labor
/// engine only reads them.
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrder {
    pub ot: String,
    nodes: Vec<NodeRecord>,
    #[serde(skip)]
    node_index: HashMap<NodeId, usize>,
    pub installed: MaterialLedger,
    pub removed: MaterialLedger,
    pub codes_n1: LuminaireCodes,
    pub codes_n2: LuminaireCodes,
    pub observations: BTreeMap<NodeId, BTreeSet<String>>,
    pub soil: BTreeMap<NodeId, String>,
    #[serde(skip)]
    resolver: NodeIdentityResolver,
}

impl WorkOrder {
    pub fn new(ot: impl Into<String>) -> Self {
        let ot = ot.into();
        Self {
            resolver: NodeIdentityResolver::new(ot.clone()),
            ot,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            installed: MaterialLedger::new(),
            removed: MaterialLedger::new(),
            codes_n1: LuminaireCodes::default(),
            codes_n2: LuminaireCodes::default(),
            observations: BTreeMap::new(),
            soil: BTreeMap::new(),
        }
    }

    /// Fold one row into the aggregate. Returns the node instance the row
    /// was attributed to.
    pub fn fold(&mut self, fact: &RowFact, markers: &Markers) -> NodeId {
        let node = self
            .resolver
            .resolve(&fact.pole_id, &fact.sync, &markers.pole_sentinels);

        self.upsert_node(NodeRecord {
            raw_pole_id: fact.pole_id.clone(),
            node_id: node.clone(),
            sync: fact.sync.clone(),
            origin: fact.origin,
        });

        if let Some(soil) = &fact.soil {
            self.soil.insert(node.clone(), soil.clone());
        }

        let mut removed_signal = false;
        for m in &fact.removed {
            removed_signal |= self.removed.add(&m.name, &node, m.quantity);
        }
        if removed_signal {
            if let Some(aspect) = &fact.aspect {
                if !is_marker(aspect, &markers.observation_null_markers) {
                    self.observations
                        .entry(node.clone())
                        .or_default()
                        .insert(aspect.trim().to_string());
                }
            }
        }

        for m in &fact.installed {
            self.installed.add(&m.name, &node, m.quantity);
        }

        for reading in &fact.luminaires {
            let key = CodeKey {
                slot: reading.slot,
                power: reading.power.clone(),
            };
            self.record_code(key, &node, &reading.code);
        }

        node
    }

    /// Merge another aggregate of the same OT (typically built from another
    /// uploaded file). Ledgers sum point-wise, code and observation sets
    /// union. Visits already known keep their instance; new visits and all
    /// placeholders from `other` get fresh ids, then every node is
    /// renumbered (see [`renumber_nodes`](Self::renumber_nodes)).
    pub fn merge(&mut self, other: &WorkOrder) {
        let mut renames = self.resolver.adopt_visits(&other.resolver);
        for record in &other.nodes {
            if record.node_id.is_placeholder() {
                renames.insert(record.node_id.clone(), self.resolver.fresh_placeholder());
            }
        }
        let rename = |id: &NodeId| renames.get(id).cloned().unwrap_or_else(|| id.clone());

        for record in &other.nodes {
            self.upsert_node(NodeRecord {
                node_id: rename(&record.node_id),
                ..record.clone()
            });
        }

        self.installed.absorb(&other.installed, &renames, is_luminaire_arm_key);
        self.removed.absorb(&other.removed, &renames, |_| false);

        for (key, nodes) in other.codes_n1.iter().chain(other.codes_n2.iter()) {
            for (node, codes) in nodes {
                let target = rename(node);
                for code in codes {
                    self.record_code(key.clone(), &target, code);
                }
            }
        }

        for (node, texts) in &other.observations {
            self.observations
                .entry(rename(node))
                .or_default()
                .extend(texts.iter().cloned());
        }

        // Both sides recorded a soil label: keep the smaller one so the
        // result does not depend on merge order.
        for (node, label) in &other.soil {
            let target = rename(node);
            match self.soil.get(&target) {
                Some(existing) if existing <= label => {}
                _ => {
                    self.soil.insert(target, label.clone());
                }
            }
        }

        self.renumber_nodes();
    }

    /// Give every node its canonical id: repeat visits of a pole take
    /// suffixes in sync-time order, placeholders are numbered by row origin.
    /// Afterwards ids no longer depend on the order rows or files arrived in.
    pub fn renumber_nodes(&mut self) {
        let mut placeholders: Vec<&NodeRecord> =
            self.nodes.iter().filter(|n| n.node_id.is_placeholder()).collect();
        placeholders.sort_by(|a, b| a.origin.cmp(&b.origin).then_with(|| a.sync.cmp(&b.sync)));
        let placeholders: Vec<NodeId> = placeholders.into_iter().map(|n| n.node_id.clone()).collect();

        let renames = self.resolver.renumber(&placeholders);
        if renames.iter().all(|(old, new)| old == new) {
            return;
        }

        for record in &mut self.nodes {
            if let Some(id) = renames.get(&record.node_id) {
                record.node_id = id.clone();
            }
        }
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.node_id.clone(), idx))
            .collect();

        self.installed.rename_nodes(&renames);
        self.removed.rename_nodes(&renames);
        self.codes_n1.rename_nodes(&renames);
        self.codes_n2.rename_nodes(&renames);
        self.observations = rename_keys(std::mem::take(&mut self.observations), &renames);
        self.soil = rename_keys(std::mem::take(&mut self.soil), &renames);
    }

    fn record_code(&mut self, key: CodeKey, node: &NodeId, code: &str) {
        let arm_key = luminaire_arm_key(key.power.as_deref());
        let codes = match key.slot {
            Slot::N1 => &mut self.codes_n1,
            Slot::N2 => &mut self.codes_n2,
        };
        if codes.insert(key, node, code) {
            self.installed.add(&arm_key, node, 1.0);
        }
    }

    fn upsert_node(&mut self, record: NodeRecord) {
        match self.node_index.get(&record.node_id) {
            Some(&idx) => {
                // The earliest row describes the node.
                let existing = &mut self.nodes[idx];
                if record.origin < existing.origin {
                    existing.raw_pole_id = record.raw_pole_id;
                    existing.origin = record.origin;
                }
                existing.sync = existing.sync.clone().min(record.sync);
            }
            None => {
                self.node_index.insert(record.node_id.clone(), self.nodes.len());
                self.nodes.push(record);
            }
        }
    }

    /// Nodes in first-seen order (ids may have been renumbered since).
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    /// Nodes ordered by sync timestamp, ties broken by original row order.
    /// Unparseable timestamps sort last.
    pub fn ordered_nodes(&self) -> Vec<&NodeRecord> {
        let mut ordered: Vec<&NodeRecord> = self.nodes.iter().collect();
        ordered.sort_by(|a, b| a.sync.cmp(&b.sync).then(a.origin.cmp(&b.origin)));
        ordered
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn sync_time(&self, id: &NodeId) -> Option<&SyncTime> {
        self.node(id).map(|n| &n.sync)
    }

    /// True when any luminaire code (either slot) is recorded at `node`.
    pub fn has_code(&self, node: &NodeId) -> bool {
        self.codes_n1.has_node(node) || self.codes_n2.has_node(node)
    }

    /// True when the OT carries no material, code or observation at all.
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
            && self.removed.is_empty()
            && self.codes_n1.is_empty()
            && self.codes_n2.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// All work orders built from one upload (or from a whole batch once merged).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Batch {
    orders: BTreeMap<String, WorkOrder>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a row into its OT, creating the OT on first reference.
    pub fn fold(&mut self, fact: &RowFact, markers: &Markers) -> NodeId {
        self.orders
            .entry(fact.ot.clone())
            .or_insert_with(|| WorkOrder::new(fact.ot.clone()))
            .fold(fact, markers)
    }

    /// Merge another batch OT by OT.
    pub fn merge(&mut self, other: &Batch) {
        for (ot, order) in &other.orders {
            match self.orders.get_mut(ot) {
                Some(existing) => existing.merge(order),
                None => {
                    self.orders.insert(ot.clone(), order.clone());
                }
            }
        }
    }

    /// Canonical node ids in every OT.
    pub fn renumber_nodes(&mut self) {
        for order in self.orders.values_mut() {
            order.renumber_nodes();
        }
    }

    pub fn get(&self, ot: &str) -> Option<&WorkOrder> {
        self.orders.get(ot)
    }

    pub fn orders(&self) -> impl Iterator<Item = &WorkOrder> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
