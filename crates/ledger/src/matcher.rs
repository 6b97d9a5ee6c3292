//! Labor matchers: one per rule family.
//!
//! A matcher looks at one node of one work order and decides how much of its
//! template applies there. Matchers only read the ledgers. OT-wide signals
//! are precomputed once per work order in [`OtContext`].

use std::fmt;

use crate::catalog::{Rig, Rule, Side, Soil};
use crate::config::RuleSettings;
use crate::ledger::is_luminaire_arm_key;
use crate::measure::{is_arm, length_m, Band};
use crate::model::{NodeId, WorkOrder};
use crate::normalize::{has_keyword, match_form};

const ELECTRICAL_KEYWORDS: &[&str] = &[
    "CABLE",
    "ALAMBRE",
    "CONECTOR",
    "FOTOCELDA",
    "BOMBILLA",
    "LUMINARIA",
    "BORNERA",
];

/// True for grounding-kit material names (already in match form).
fn is_grounding_kit(name: &str) -> bool {
    has_keyword(name, "KIT") && has_keyword(name, "TIERRA")
}

// ---------------------------------------------------------------------------
// Inputs + output
// ---------------------------------------------------------------------------

/// Read-only view of one node inside its work order.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub order: &'a WorkOrder,
    pub node: &'a NodeId,
}

impl<'a> NodeView<'a> {
    pub fn new(order: &'a WorkOrder, node: &'a NodeId) -> Self {
        Self { order, node }
    }

    pub fn side(&self, side: Side) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let ledger = match side {
            Side::Installed => &self.order.installed,
            Side::Removed => &self.order.removed,
        };
        ledger.at_node(self.node)
    }

    pub fn soil(&self) -> Option<&'a str> {
        self.order.soil.get(self.node).map(String::as_str)
    }

    /// Display keys of the code collections holding a code at this node.
    pub fn code_keys(&self) -> Vec<String> {
        self.order
            .codes_n1
            .iter()
            .chain(self.order.codes_n2.iter())
            .filter(|(_, nodes)| nodes.get(self.node).is_some_and(|codes| !codes.is_empty()))
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Sum and names of the materials on `side` whose match form satisfies `pred`.
    fn collect(&self, side: Side, pred: impl Fn(&str, &str) -> bool) -> (f64, Vec<String>) {
        let mut total = 0.0;
        let mut names = Vec::new();
        for (name, quantity) in self.side(side) {
            if pred(name, &match_form(name)) {
                total += quantity;
                names.push(name.to_string());
            }
        }
        (total, names)
    }
}

/// Signals computed once per work order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OtContext {
    /// Any node of the OT has a grounding kit installed.
    pub has_grounding_kit: bool,
}

impl OtContext {
    pub fn for_order(order: &WorkOrder) -> Self {
        Self {
            has_grounding_kit: order.installed.keys().any(|key| is_grounding_kit(&match_form(key))),
        }
    }
}

/// What a matcher found at one node. A zero quantity means "not applicable".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub quantity: f64,
    pub installed: Vec<String>,
    pub removed: Vec<String>,
}

impl Evaluation {
    pub fn none() -> Self {
        Self::default()
    }

    fn installed(quantity: f64, evidence: Vec<String>) -> Self {
        Self { quantity, installed: evidence, removed: Vec::new() }
    }

    fn removed(quantity: f64, evidence: Vec<String>) -> Self {
        Self { quantity, installed: Vec::new(), removed: evidence }
    }

    pub fn applies(&self) -> bool {
        self.quantity > 0.0
    }
}

pub trait LaborMatcher: fmt::Debug {
    fn evaluate(&self, node: &NodeView<'_>, ctx: &OtContext) -> Evaluation;
}

/// Build the matcher for a template rule.
pub fn matcher_for(rule: &Rule, settings: &RuleSettings) -> Box<dyn LaborMatcher> {
    match rule {
        Rule::LuminaireInstall { rig } => Box::new(LuminaireInstall {
            rig: *rig,
            threshold_m: settings.arm_basket_threshold_m,
        }),
        Rule::LuminaireDismount { rig } => Box::new(LuminaireDismount {
            rig: *rig,
            threshold_m: settings.arm_basket_threshold_m,
        }),
        Rule::LuminaireTransport => Box::new(LuminaireTransport),
        Rule::SoilRecovery { soil } => Box::new(SoilRecovery {
            soil: *soil,
            quantity: settings.soil_recovery_quantity,
            hard_labels: settings.hard_soil_labels.iter().map(|l| match_form(l)).collect(),
        }),
        Rule::GroundingConnector => Box::new(GroundingConnector),
        Rule::GroundingTransport => Box::new(GroundingTransport),
        Rule::Material { side, all_of, any_of, none_of, band } => Box::new(MaterialMatch {
            side: *side,
            all_of: all_of.iter().map(|k| match_form(k)).collect(),
            any_of: any_of.iter().map(|k| match_form(k)).collect(),
            none_of: none_of.iter().map(|k| match_form(k)).collect(),
            band: *band,
        }),
        Rule::PairedMaterial { first, second } => Box::new(PairedMaterial {
            first: first.iter().map(|k| match_form(k)).collect(),
            second: second.iter().map(|k| match_form(k)).collect(),
        }),
        Rule::PerchDressing { band } => Box::new(PerchDressing { band: *band }),
        Rule::Unmatched => Box::new(Unmatched),
    }
}

/// Rig required by the arms in `arms`: basket when any is at least
/// `threshold_m` long.
fn rig_for(arms: &[(String, Option<f64>)], threshold_m: f64) -> Rig {
    if arms.iter().any(|(_, len)| len.is_some_and(|m| m >= threshold_m)) {
        Rig::Basket
    } else {
        Rig::Truck
    }
}

fn arms_on(view: &NodeView<'_>, side: Side) -> Vec<(String, Option<f64>)> {
    view.side(side)
        .filter(|(name, _)| !is_luminaire_arm_key(name) && is_arm(name))
        .map(|(name, _)| (name.to_string(), length_m(name)))
        .collect()
}

// ---------------------------------------------------------------------------
// Luminaire install / dismount / transport
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LuminaireInstall {
    pub rig: Rig,
    pub threshold_m: f64,
}

impl LaborMatcher for LuminaireInstall {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        let (count, mut evidence) = view.collect(Side::Installed, |name, _| is_luminaire_arm_key(name));
        if count <= 0.0 {
            return Evaluation::none();
        }
        let arms = arms_on(view, Side::Installed);
        if rig_for(&arms, self.threshold_m) != self.rig {
            return Evaluation::none();
        }
        add_evidence(&mut evidence, arms);
        Evaluation::installed(count, evidence)
    }
}

#[derive(Debug)]
pub struct LuminaireDismount {
    pub rig: Rig,
    pub threshold_m: f64,
}

impl LaborMatcher for LuminaireDismount {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        // A removed arm "para luminaria" is an arm, not a luminaire.
        let (count, mut evidence) =
            view.collect(Side::Removed, |name, form| has_keyword(form, "LUMINARIA") && !is_arm(name));
        if count <= 0.0 {
            return Evaluation::none();
        }
        let arms = arms_on(view, Side::Removed);
        if rig_for(&arms, self.threshold_m) != self.rig {
            return Evaluation::none();
        }
        add_evidence(&mut evidence, arms);
        Evaluation::removed(count, evidence)
    }
}

fn add_evidence(evidence: &mut Vec<String>, arms: Vec<(String, Option<f64>)>) {
    for (name, _) in arms {
        if !evidence.contains(&name) {
            evidence.push(name);
        }
    }
}

/// Placeholder; the reconciler assigns transport from install and dismount.
#[derive(Debug)]
pub struct LuminaireTransport;

impl LaborMatcher for LuminaireTransport {
    fn evaluate(&self, _view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        Evaluation::none()
    }
}

// ---------------------------------------------------------------------------
// Support tasks
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SoilRecovery {
    pub soil: Soil,
    pub quantity: f64,
    /// Hard-surface labels in match form.
    pub hard_labels: Vec<String>,
}

impl SoilRecovery {
    fn classify(&self, label: Option<&str>) -> Soil {
        match label {
            Some(label) => {
                let form = match_form(label);
                if self.hard_labels.iter().any(|hard| form.contains(hard.as_str())) {
                    Soil::Hard
                } else {
                    Soil::Soft
                }
            }
            None => Soil::Soft,
        }
    }
}

impl LaborMatcher for SoilRecovery {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        if self.classify(view.soil()) != self.soil {
            return Evaluation::none();
        }
        let (_, installed) = view.collect(Side::Installed, |_, form| {
            has_keyword(form, "POSTE") || has_keyword(form, "EXCAVACION") || is_grounding_kit(form)
        });
        let (_, removed) = view.collect(Side::Removed, |_, form| has_keyword(form, "POSTE"));
        if installed.is_empty() && removed.is_empty() {
            return Evaluation::none();
        }
        Evaluation { quantity: self.quantity, installed, removed }
    }
}

#[derive(Debug)]
pub struct GroundingConnector;

impl LaborMatcher for GroundingConnector {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        let (kits, _) = view.collect(Side::Installed, |_, form| is_grounding_kit(form));
        if kits > 0.0 {
            return Evaluation::none();
        }
        let (_, mut evidence) = view.collect(Side::Installed, |_, form| {
            ELECTRICAL_KEYWORDS.iter().any(|kw| has_keyword(form, kw))
        });
        if evidence.is_empty() {
            evidence = view.code_keys();
        }
        if evidence.is_empty() {
            return Evaluation::none();
        }
        Evaluation::installed(1.0, evidence)
    }
}

#[derive(Debug)]
pub struct GroundingTransport;

impl LaborMatcher for GroundingTransport {
    fn evaluate(&self, view: &NodeView<'_>, ctx: &OtContext) -> Evaluation {
        let (kits, evidence) = view.collect(Side::Installed, |_, form| is_grounding_kit(form));
        if kits > 0.0 {
            return Evaluation::installed(kits, evidence);
        }
        // Loose rods only count when the OT installed no kit anywhere.
        if ctx.has_grounding_kit {
            return Evaluation::none();
        }
        let (rods, evidence) = view.collect(Side::Installed, |_, form| has_keyword(form, "VARILLA"));
        Evaluation::installed(rods, evidence)
    }
}

// ---------------------------------------------------------------------------
// Generic material rules
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MaterialMatch {
    pub side: Side,
    pub all_of: Vec<String>,
    pub any_of: Vec<String>,
    pub none_of: Vec<String>,
    pub band: Option<Band>,
}

impl MaterialMatch {
    fn accepts(&self, name: &str, form: &str) -> bool {
        if is_luminaire_arm_key(name) {
            return false;
        }
        let keywords = self.all_of.iter().all(|kw| form.contains(kw.as_str()))
            && (self.any_of.is_empty() || self.any_of.iter().any(|kw| form.contains(kw.as_str())))
            && !self.none_of.iter().any(|kw| form.contains(kw.as_str()));
        if !keywords {
            return false;
        }
        match self.band {
            Some(band) => length_m(name).is_some_and(|m| band.contains(m)),
            None => true,
        }
    }
}

impl LaborMatcher for MaterialMatch {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        let (quantity, evidence) = view.collect(self.side, |name, form| self.accepts(name, form));
        match self.side {
            Side::Installed => Evaluation::installed(quantity, evidence),
            Side::Removed => Evaluation::removed(quantity, evidence),
        }
    }
}

#[derive(Debug)]
pub struct PairedMaterial {
    pub first: Vec<String>,
    pub second: Vec<String>,
}

impl LaborMatcher for PairedMaterial {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        let matches = |keys: &[String], form: &str| keys.iter().any(|kw| form.contains(kw.as_str()));
        let (a, mut evidence) = view.collect(Side::Installed, |_, form| matches(&self.first, form));
        let (b, other) = view.collect(Side::Installed, |_, form| matches(&self.second, form));
        let quantity = a.min(b);
        if quantity <= 0.0 {
            return Evaluation::none();
        }
        evidence.extend(other);
        Evaluation::installed(quantity, evidence)
    }
}

#[derive(Debug)]
pub struct PerchDressing {
    pub band: Band,
}

impl LaborMatcher for PerchDressing {
    fn evaluate(&self, view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        let (perches, evidence) = view.collect(Side::Installed, |_, form| has_keyword(form, "PERCHA"));
        if perches > 0.0 && self.band.contains(perches) {
            Evaluation::installed(1.0, evidence)
        } else {
            Evaluation::none()
        }
    }
}

#[derive(Debug)]
pub struct Unmatched;

impl LaborMatcher for Unmatched {
    fn evaluate(&self, _view: &NodeView<'_>, _ctx: &OtContext) -> Evaluation {
        Evaluation::none()
    }
}
