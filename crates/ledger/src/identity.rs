//! Node identity resolution.
//!
//! A raw pole id becomes a node-instance id that is unique within its work
//! order. Repeat rows describing the *same visit* (same normalized pole id and
//! same sync timestamp) resolve to the instance already assigned; a new visit
//! to a known pole gets the next occurrence suffix (`42`, `42_2`, `42_3`).
//! Placeholder poles (`0`, blank, `N/A`...) never share an instance: each one
//! becomes `0_{OT}_{n}` with a strictly increasing per-OT counter.
//!
//! Ids handed out while rows arrive follow arrival order;
//! [`NodeIdentityResolver::renumber`] makes them canonical afterwards.

use std::collections::HashMap;

use crate::model::NodeId;
use crate::normalize::is_marker;
use crate::timestamp::SyncTime;

/// Inner decimal points are kept: `42.5` and `425` are different poles.
const FORMATTING_PUNCTUATION: &[char] = &[' ', '-', '_', ',', '#', '/', '\'', '"'];

/// Normalize a raw pole id: trim, drop a trailing `.0` decimal artifact,
/// strip formatting punctuation, upper-case.
pub fn normalize_pole_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_artifact = match trimmed.split_once('.') {
        Some((head, tail))
            if !head.is_empty()
                && head.chars().all(|c| c.is_ascii_digit())
                && !tail.is_empty()
                && tail.chars().all(|c| c == '0') =>
        {
            head
        }
        _ => trimmed,
    };
    without_artifact
        .chars()
        .filter(|c| !FORMATTING_PUNCTUATION.contains(c))
        .collect::<String>()
        .to_uppercase()
}

/// True when a normalized pole id does not point at a real pole.
pub fn is_placeholder(normalized: &str, sentinels: &[String]) -> bool {
    normalized.is_empty()
        || normalized.chars().all(|c| c == '0')
        || is_marker(normalized, sentinels)
}

/// Per-work-order resolver state.
#[derive(Debug, Clone, Default)]
pub struct NodeIdentityResolver {
    ot: String,
    placeholders: u64,
    occurrences: HashMap<String, u32>,
    visits: HashMap<(String, SyncTime), NodeId>,
}

impl NodeIdentityResolver {
    pub fn new(ot: impl Into<String>) -> Self {
        Self {
            ot: ot.into(),
            ..Self::default()
        }
    }

    /// Resolve one row's pole id. Never fails.
    pub fn resolve(&mut self, raw: &str, sync: &SyncTime, sentinels: &[String]) -> NodeId {
        let normalized = normalize_pole_id(raw);
        if is_placeholder(&normalized, sentinels) {
            return self.fresh_placeholder();
        }
        self.resolve_visit(normalized, sync.clone())
    }

    fn resolve_visit(&mut self, pole: String, sync: SyncTime) -> NodeId {
        let visit = (pole, sync);
        if let Some(existing) = self.visits.get(&visit) {
            return existing.clone();
        }

        let count = self.occurrences.entry(visit.0.clone()).or_insert(0);
        *count += 1;
        let id = occurrence_id(&visit.0, *count);
        self.visits.insert(visit, id.clone());
        id
    }

    /// Allocate the next `0_{OT}_{n}` placeholder id.
    pub fn fresh_placeholder(&mut self) -> NodeId {
        self.placeholders += 1;
        self.placeholder_id(self.placeholders)
    }

    fn placeholder_id(&self, n: u64) -> NodeId {
        NodeId(format!("0_{}_{}", self.ot, n))
    }

    /// Re-resolve every visit known to `other` against this resolver and
    /// return the id translation. Visits already seen here map onto their
    /// existing instance; new visits get the next free suffix, taken in
    /// (pole, sync time) order. Placeholders are not covered: callers
    /// allocate fresh ones with [`fresh_placeholder`](Self::fresh_placeholder).
    pub fn adopt_visits(&mut self, other: &NodeIdentityResolver) -> HashMap<NodeId, NodeId> {
        let mut visits: Vec<(&(String, SyncTime), &NodeId)> = other.visits.iter().collect();
        visits.sort();

        let mut renames = HashMap::with_capacity(visits.len());
        for ((pole, sync), old_id) in visits {
            let new_id = self.resolve_visit(pole.clone(), sync.clone());
            renames.insert(old_id.clone(), new_id);
        }
        renames
    }

    /// Renumber every known visit so each pole's suffixes follow sync-time
    /// order (unparseable last), and number `placeholders` from 1 in the
    /// order given. Returns the id translation, which is a permutation of
    /// the ids in use.
    pub fn renumber(&mut self, placeholders: &[NodeId]) -> HashMap<NodeId, NodeId> {
        let mut visits: Vec<((String, SyncTime), NodeId)> = self.visits.drain().collect();
        visits.sort_by(|a, b| a.0.cmp(&b.0));
        self.occurrences.clear();

        let mut renames = HashMap::with_capacity(visits.len() + placeholders.len());
        for ((pole, sync), old_id) in visits {
            let count = self.occurrences.entry(pole.clone()).or_insert(0);
            *count += 1;
            let id = occurrence_id(&pole, *count);
            renames.insert(old_id, id.clone());
            self.visits.insert((pole, sync), id);
        }

        for (n, old_id) in (1u64..).zip(placeholders) {
            renames.insert(old_id.clone(), self.placeholder_id(n));
        }
        self.placeholders = placeholders.len() as u64;
        renames
    }
}

fn occurrence_id(pole: &str, count: u32) -> NodeId {
    if count == 1 {
        NodeId(pole.to_string())
    } else {
        NodeId(format!("{pole}_{count}"))
    }
}
