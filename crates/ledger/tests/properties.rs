// Property-based tests for ledger folding, merging and labor inference.
// CI: 128 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::NaiveDate;
use proptest::prelude::*;

use otledger_ledger::config::{Markers, RuleSettings};
use otledger_ledger::ledger::{is_luminaire_arm_key, LuminaireCodes, MaterialLedger, Slot};
use otledger_ledger::model::{LuminaireReading, MaterialQty, NodeId, RowFact, RowOrigin, WorkOrder};
use otledger_ledger::timestamp::SyncTime;
use otledger_ledger::{Catalog, LaborEngine};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const POLES: &[&str] = &["0", "", "N/A", "1", "2", "42", "42.0", "7-A"];
const INSTALLED: &[&str] = &[
    "ARM 3M",
    "BRAZO 1.5M",
    "BRAZO 4 M",
    "CABLE DUPLEX 2X8",
    "KIT PUESTA A TIERRA",
    "VARILLA COPPERWELD",
    "POSTE CONCRETO 8M",
    "PERCHA 1 PUESTO",
];
const REMOVED: &[&str] = &[
    "LUMINARIA SODIO 70W",
    "LUMINARIA RETIRADA N1 150W",
    "BRAZO RETIRADO 3M",
    "BRAZO RETIRADO 1 M",
    "CABLE RETIRADO",
];

fn arb_sync() -> impl Strategy<Value = SyncTime> {
    prop_oneof![
        4 => (6u32..9).prop_map(|h| {
            SyncTime::At(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(h, 0, 0).unwrap())
        }),
        1 => Just(SyncTime::Unparseable),
    ]
}

fn arb_materials(names: &'static [&'static str]) -> impl Strategy<Value = Vec<MaterialQty>> {
    prop::collection::vec(
        (prop::sample::select(names), -1i32..5).prop_map(|(name, qty)| MaterialQty {
            name: name.to_string(),
            quantity: qty as f64,
        }),
        0..3,
    )
}

fn arb_luminaires() -> impl Strategy<Value = Vec<LuminaireReading>> {
    prop::collection::vec(
        (
            prop::sample::select(vec![Slot::N1, Slot::N2]),
            prop::sample::select(vec!["A", "B", "C"]),
            prop::sample::select(vec!["70", "100"]),
        )
            .prop_map(|(slot, code, power)| LuminaireReading {
                slot,
                code: code.to_string(),
                power: Some(power.to_string()),
            }),
        0..2,
    )
}

fn arb_fact() -> impl Strategy<Value = RowFact> {
    (
        prop::sample::select(POLES),
        arb_sync(),
        arb_materials(INSTALLED),
        arb_materials(REMOVED),
        arb_luminaires(),
        prop::option::of(prop::sample::select(vec!["ZONA DURA", "ZONA VERDE"])),
    )
        .prop_map(|(pole, sync, installed, removed, luminaires, soil)| {
            let mut fact = RowFact::new("OT-1", pole);
            fact.sync = sync;
            fact.installed = installed;
            fact.removed = removed;
            fact.luminaires = luminaires;
            fact.soil = soil.map(str::to_string);
            fact.aspect = Some("revisar".into());
            fact
        })
}

fn arb_file() -> impl Strategy<Value = Vec<RowFact>> {
    prop::collection::vec(arb_fact(), 0..8)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stamp `facts` as rows of upload `file`, the way extraction does.
fn stamped(facts: &[RowFact], file: usize) -> Vec<RowFact> {
    facts
        .iter()
        .enumerate()
        .map(|(row, fact)| RowFact {
            origin: RowOrigin { file, sheet: 0, row },
            ..fact.clone()
        })
        .collect()
}

fn fold(facts: &[RowFact]) -> WorkOrder {
    let markers = Markers::default();
    let mut order = WorkOrder::new("OT-1");
    for fact in facts {
        order.fold(fact, &markers);
    }
    order.renumber_nodes();
    order
}

fn merged(parts: &[&WorkOrder]) -> WorkOrder {
    let mut order = WorkOrder::new("OT-1");
    for part in parts {
        order.merge(part);
    }
    order
}

type Nodes = Vec<(NodeId, String, SyncTime, RowOrigin)>;

/// Everything a report shows for one OT, with nodes sorted by id.
fn snapshot(order: &WorkOrder) -> (MaterialLedger, MaterialLedger, LuminaireCodes, LuminaireCodes, Nodes) {
    let mut nodes: Nodes = order
        .nodes()
        .iter()
        .map(|n| (n.node_id.clone(), n.raw_pole_id.clone(), n.sync.clone(), n.origin))
        .collect();
    nodes.sort_by(|a, b| a.0.cmp(&b.0));
    (
        order.installed.clone(),
        order.removed.clone(),
        order.codes_n1.clone(),
        order.codes_n2.clone(),
        nodes,
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn merge_is_order_independent(a in arb_file(), b in arb_file(), c in arb_file()) {
        let (wa, wb, wc) = (fold(&stamped(&a, 0)), fold(&stamped(&b, 1)), fold(&stamped(&c, 2)));

        let abc = merged(&[&wa, &wb, &wc]);
        let cba = merged(&[&wc, &wb, &wa]);
        let bac = merged(&[&wb, &wa, &wc]);
        prop_assert_eq!(snapshot(&abc), snapshot(&cba));
        prop_assert_eq!(snapshot(&abc), snapshot(&bac));
        prop_assert_eq!(&abc.observations, &cba.observations);
        prop_assert_eq!(&abc.soil, &bac.soil);

        // (a + b) + c == a + (b + c)
        let mut left = merged(&[&wa, &wb]);
        left.merge(&wc);
        let right_tail = merged(&[&wb, &wc]);
        let mut right = merged(&[&wa]);
        right.merge(&right_tail);
        prop_assert_eq!(snapshot(&left), snapshot(&right));
    }

    #[test]
    fn merged_files_equal_one_file(a in arb_file(), b in arb_file()) {
        let (a, b) = (stamped(&a, 0), stamped(&b, 1));
        let split = merged(&[&fold(&a), &fold(&b)]);
        let joined: Vec<RowFact> = a.iter().chain(b.iter()).cloned().collect();
        let single = fold(&joined);
        prop_assert_eq!(snapshot(&split), snapshot(&single));
        prop_assert_eq!(&split.observations, &single.observations);
    }

    #[test]
    fn ledgers_never_hold_non_positive_quantities(a in arb_file()) {
        let order = fold(&a);
        for ledger in [&order.installed, &order.removed] {
            for key in ledger.keys() {
                for quantity in ledger.nodes(key).into_iter().flat_map(|n| n.values()) {
                    prop_assert!(*quantity > 0.0, "{key} has {quantity}");
                }
            }
        }
    }

    #[test]
    fn placeholder_ids_are_never_shared(a in arb_file()) {
        let order = fold(&a);
        let placeholders = a
            .iter()
            .filter(|f| matches!(f.pole_id.as_str(), "0" | "" | "N/A"))
            .count();
        let placeholder_nodes = order.nodes().iter().filter(|n| n.node_id.is_placeholder()).count();
        prop_assert_eq!(placeholders, placeholder_nodes);
    }

    #[test]
    fn labor_invariants_hold(a in arb_file(), b in arb_file()) {
        let order = merged(&[&fold(&a), &fold(&b)]);
        let catalog = Catalog::builtin().unwrap();
        let labor = LaborEngine::new(&catalog, &RuleSettings::default()).evaluate(&order);

        for line in &labor.lines {
            prop_assert!(line.quantity > 0.0);
            prop_assert!(line.assignments.iter().all(|a| a.quantity > 0.0));
        }

        // Mutual exclusivity: each node's luminaire count lands on exactly one install line.
        let installs: Vec<_> = labor.lines.iter().filter(|l| l.rule.is_install()).collect();
        for record in order.nodes() {
            let count: f64 = order
                .installed
                .at_node(&record.node_id)
                .filter(|(key, _)| is_luminaire_arm_key(key))
                .map(|(_, q)| q)
                .sum();
            let hits: Vec<f64> = installs
                .iter()
                .map(|l| l.quantity_at(&record.node_id))
                .filter(|q| *q > 0.0)
                .collect();
            if count > 0.0 {
                prop_assert_eq!(hits, vec![count]);
            } else {
                prop_assert!(hits.is_empty());
            }
        }

        // Transport = installs + dismounts.
        let sum_of = |pred: &dyn Fn(&otledger_ledger::LaborLine) -> bool| -> f64 {
            labor.lines.iter().filter(|l| pred(l)).map(|l| l.quantity).sum()
        };
        let expected = sum_of(&|l| l.rule.is_install()) + sum_of(&|l| l.rule.is_dismount());
        let transport = sum_of(&|l| l.rule == otledger_ledger::Rule::LuminaireTransport);
        prop_assert!((transport - expected).abs() < 1e-9, "transport {transport} != {expected}");
    }
}
