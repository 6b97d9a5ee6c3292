//! Cross-line reconciliation within one OT.

use std::collections::HashMap;

use crate::catalog::Rule;
use crate::labor::{LaborAssignment, LaborLine};
use crate::model::NodeId;

/// Overwrite the luminaire-transport line with the per-node sum of every
/// install and dismount assignment, so transport always equals installs
/// plus dismounts. When the catalog lists several transport templates only
/// the first carries the quantity; the others are cleared.
pub fn reconcile_transport(ot: &str, lines: &mut [LaborLine], nodes: &[NodeId]) {
    let mut per_node: HashMap<&NodeId, (f64, Vec<String>, Vec<String>)> = HashMap::new();
    for line in lines.iter().filter(|l| l.rule.is_install() || l.rule.is_dismount()) {
        for a in &line.assignments {
            let entry = per_node.entry(&a.node).or_default();
            entry.0 += a.quantity;
            entry.1.extend(a.evidence_installed.iter().cloned());
            entry.2.extend(a.evidence_removed.iter().cloned());
        }
    }

    let mut assignments = Vec::new();
    for node in nodes {
        if let Some((quantity, installed, removed)) = per_node.remove(node) {
            assignments.push((node.clone(), quantity, installed, removed));
        }
    }

    let mut first = true;
    for line in lines.iter_mut().filter(|l| l.rule == Rule::LuminaireTransport) {
        line.reset();
        if !first {
            continue;
        }
        first = false;
        for (node, quantity, installed, removed) in &assignments {
            line.push(LaborAssignment {
                ot: ot.to_string(),
                node: node.clone(),
                template: line.template,
                quantity: *quantity,
                evidence_installed: installed.clone(),
                evidence_removed: removed.clone(),
            });
        }
    }
}
