use serde::Serialize;

use crate::catalog::{Block, Catalog, LaborTemplate, Rule};
use crate::config::RuleSettings;
use crate::matcher::{matcher_for, LaborMatcher, NodeView, OtContext};
use crate::model::{NodeId, WorkOrder};
use crate::reconcile::reconcile_transport;

/// One template applied at one node of one OT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaborAssignment {
    pub ot: String,
    pub node: NodeId,
    pub template: usize,
    pub quantity: f64,
    pub evidence_installed: Vec<String>,
    pub evidence_removed: Vec<String>,
}

/// All assignments of one template within one OT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaborLine {
    pub template: usize,
    pub description: String,
    pub unit: String,
    pub block: Block,
    pub unit_price: f64,
    pub quantity: f64,
    #[serde(skip)]
    pub rule: Rule,
    pub assignments: Vec<LaborAssignment>,
}

impl LaborLine {
    pub fn empty(template: &LaborTemplate) -> Self {
        Self {
            template: template.id,
            description: template.description.clone(),
            unit: template.unit.clone(),
            block: template.block,
            unit_price: template.unit_price,
            quantity: 0.0,
            rule: template.rule.clone(),
            assignments: Vec::new(),
        }
    }

    /// Append an assignment; non-positive quantities are dropped.
    pub fn push(&mut self, assignment: LaborAssignment) {
        if assignment.quantity > 0.0 {
            self.quantity += assignment.quantity;
            self.assignments.push(assignment);
        }
    }

    /// Replace every assignment.
    pub fn reset(&mut self) {
        self.quantity = 0.0;
        self.assignments.clear();
    }

    pub fn total_value(&self) -> f64 {
        self.quantity * self.unit_price
    }

    pub fn quantity_at(&self, node: &NodeId) -> f64 {
        self.assignments
            .iter()
            .filter(|a| &a.node == node)
            .map(|a| a.quantity)
            .sum()
    }
}

/// Labor table of one OT: non-zero lines in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtLabor {
    pub ot: String,
    pub lines: Vec<LaborLine>,
}

impl OtLabor {
    pub fn line(&self, template: usize) -> Option<&LaborLine> {
        self.lines.iter().find(|l| l.template == template)
    }

    /// Lines grouped by block, blocks in taxonomy order, empty blocks omitted.
    pub fn by_block(&self) -> Vec<(Block, Vec<&LaborLine>)> {
        Block::ALL
            .iter()
            .filter_map(|block| {
                let lines: Vec<&LaborLine> = self.lines.iter().filter(|l| l.block == *block).collect();
                (!lines.is_empty()).then_some((*block, lines))
            })
            .collect()
    }

    pub fn total_value(&self) -> f64 {
        self.lines.iter().map(LaborLine::total_value).sum()
    }
}

/// Evaluates a catalog against work orders. Built once per run.
#[derive(Debug)]
pub struct LaborEngine {
    entries: Vec<(LaborTemplate, Box<dyn LaborMatcher>)>,
}

impl LaborEngine {
    pub fn new(catalog: &Catalog, settings: &RuleSettings) -> Self {
        let entries = catalog
            .templates()
            .iter()
            .map(|template| (template.clone(), matcher_for(&template.rule, settings)))
            .collect();
        Self { entries }
    }

    /// Evaluate every (node, template) pair of one OT, reconcile transport
    /// and drop lines that ended at zero.
    pub fn evaluate(&self, order: &WorkOrder) -> OtLabor {
        let ctx = OtContext::for_order(order);
        let nodes: Vec<NodeId> = order.ordered_nodes().into_iter().map(|n| n.node_id.clone()).collect();

        let mut lines = Vec::with_capacity(self.entries.len());
        for (template, matcher) in &self.entries {
            let mut line = LaborLine::empty(template);
            for node in &nodes {
                let evaluation = matcher.evaluate(&NodeView::new(order, node), &ctx);
                line.push(LaborAssignment {
                    ot: order.ot.clone(),
                    node: node.clone(),
                    template: template.id,
                    quantity: evaluation.quantity,
                    evidence_installed: evaluation.installed,
                    evidence_removed: evaluation.removed,
                });
            }
            lines.push(line);
        }

        reconcile_transport(&order.ot, &mut lines, &nodes);
        lines.retain(|line| line.quantity > 0.0);

        log::debug!("OT {}: {} labor line(s) over {} node(s)", order.ot, lines.len(), nodes.len());
        OtLabor {
            ot: order.ot.clone(),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Markers;
    use crate::ledger::Slot;
    use crate::model::{LuminaireReading, MaterialQty, RowFact};

    fn catalog() -> Catalog {
        Catalog::from_toml(
            r#"
[[template]]
description = "INSTALACION DE LUMINARIA CON CARRO"
unit_price = 100.0
[[template]]
description = "INSTALACION DE LUMINARIA CON CANASTA"
unit_price = 150.0
[[template]]
description = "DESMONTAJE DE LUMINARIA CON CARRO"
[[template]]
description = "TRANSPORTE DE LUMINARIA"
unit_price = 10.0
[[template]]
description = "TENDIDO DE CABLE"
unit = "ml"
[[template]]
description = "LIMPIEZA"
"#,
        )
        .unwrap()
    }

    fn order() -> WorkOrder {
        let markers = Markers::default();
        let mut order = WorkOrder::new("77");

        let mut a = RowFact::new("77", "1");
        a.installed.push(MaterialQty { name: "BRAZO 1M".into(), quantity: 1.0 });
        a.installed.push(MaterialQty { name: "CABLE DUPLEX".into(), quantity: 12.5 });
        a.luminaires.push(LuminaireReading { slot: Slot::N1, code: "X1".into(), power: Some("70".into()) });
        a.removed.push(MaterialQty { name: "LUMINARIA RETIRADA N1 150W".into(), quantity: 1.0 });
        order.fold(&a, &markers);

        let mut b = RowFact::new("77", "2");
        b.installed.push(MaterialQty { name: "BRAZO 3 M".into(), quantity: 1.0 });
        b.luminaires.push(LuminaireReading { slot: Slot::N1, code: "X2".into(), power: Some("100".into()) });
        b.luminaires.push(LuminaireReading { slot: Slot::N2, code: "X3".into(), power: Some("100".into()) });
        order.fold(&b, &markers);
        order
    }

    #[test]
    fn lines_follow_catalog_order_and_drop_zeroes() {
        let engine = LaborEngine::new(&catalog(), &RuleSettings::default());
        let labor = engine.evaluate(&order());
        let descriptions: Vec<&str> = labor.lines.iter().map(|l| l.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "INSTALACION DE LUMINARIA CON CARRO",
                "INSTALACION DE LUMINARIA CON CANASTA",
                "DESMONTAJE DE LUMINARIA CON CARRO",
                "TRANSPORTE DE LUMINARIA",
                "TENDIDO DE CABLE",
            ]
        );
        assert_eq!(labor.line(0).unwrap().quantity, 1.0);
        assert_eq!(labor.line(1).unwrap().quantity, 2.0);
        assert_eq!(labor.line(2).unwrap().quantity, 1.0);
        assert_eq!(labor.line(3).unwrap().quantity, 4.0);
        assert_eq!(labor.line(4).unwrap().quantity, 12.5);
        assert_eq!(labor.line(4).unwrap().unit, "ML");
        assert!(labor.line(5).is_none());
    }

    #[test]
    fn assignments_carry_evidence() {
        let engine = LaborEngine::new(&catalog(), &RuleSettings::default());
        let labor = engine.evaluate(&order());
        let basket = labor.line(1).unwrap();
        assert_eq!(basket.assignments.len(), 1);
        let assignment = &basket.assignments[0];
        assert_eq!(assignment.node.as_str(), "2");
        assert_eq!(assignment.ot, "77");
        assert!(assignment.evidence_installed.contains(&"BRAZO 3 M".to_string()));
        assert!(assignment.evidence_installed.contains(&"LUMINARIA/BRAZO 100W".to_string()));
    }

    #[test]
    fn grouping_and_values() {
        let engine = LaborEngine::new(&catalog(), &RuleSettings::default());
        let labor = engine.evaluate(&order());
        let blocks: Vec<Block> = labor.by_block().into_iter().map(|(b, _)| b).collect();
        assert_eq!(
            blocks,
            vec![Block::LuminaireInstall, Block::DismountTransport, Block::CableWork]
        );
        assert_eq!(labor.total_value(), 100.0 + 300.0 + 40.0);
    }
}
