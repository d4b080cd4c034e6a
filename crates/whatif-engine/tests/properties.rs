//! Property tests: determinism, snapshot round-trip and scenario isolation.

use proptest::prelude::*;

use whatif_core::{
    ComputationGraph, ComputationNode, ExecutionState, GraphBuilder, PropertyBag, Value,
};
use whatif_engine::{Engine, Override};

/// A three-node pricing chain with a division that fails for zero quantity.
fn pricing_graph() -> ComputationGraph {
    let mut b = GraphBuilder::new("pricing");
    b.node(ComputationNode::new("subtotal", "Subtotal", "price * quantity"))
        .unwrap();
    b.node(ComputationNode::new(
        "discount",
        "Discount",
        "if quantity >= 10 then subtotal * 0.1 else 0",
    ))
    .unwrap();
    b.node(ComputationNode::new("unit", "Unit price", "(subtotal - discount) / quantity"))
        .unwrap();

    b.reads("r1", "order", "subtotal", "price").unwrap();
    b.reads("r2", "order", "subtotal", "quantity").unwrap();
    b.writes("w1", "subtotal", "invoice", "subtotal").unwrap();
    b.reads("r3", "invoice", "discount", "subtotal").unwrap();
    b.reads("r4", "order", "discount", "quantity").unwrap();
    b.writes("w2", "discount", "invoice", "discount").unwrap();
    b.reads("r5", "invoice", "unit", "subtotal").unwrap();
    b.reads("r6", "invoice", "unit", "discount").unwrap();
    b.reads("r7", "order", "unit", "quantity").unwrap();
    b.writes("w3", "unit", "invoice", "unit_price").unwrap();
    b.build()
}

fn state(price: i64, quantity: i64) -> ExecutionState {
    ExecutionState::new()
        .with_entity(
            "order",
            PropertyBag::from_iter([("price", price), ("quantity", quantity)]),
        )
        .with_entity("invoice", PropertyBag::new())
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000i64..1_000).prop_map(Value::Int),
        (-1_000.0f64..1_000.0).prop_map(Value::Float),
        "[a-z]{0,4}".prop_map(Value::Str),
    ]
}

fn arb_override() -> impl Strategy<Value = Override> {
    (
        prop_oneof![Just("order"), Just("invoice")],
        prop_oneof![Just("price"), Just("quantity"), Just("subtotal"), Just("extra")],
        arb_value(),
    )
        .prop_map(|(e, p, v)| Override::new(e, p, v))
}

proptest! {
    #[test]
    fn execution_is_deterministic(price in -500i64..500, quantity in 0i64..50) {
        let mut a = Engine::new(pricing_graph(), state(price, quantity)).unwrap();
        let mut b = Engine::new(pricing_graph(), state(price, quantity)).unwrap();
        let ra = a.execute().unwrap();
        let rb = b.execute().unwrap();
        prop_assert_eq!(ra.order, rb.order);
        prop_assert_eq!(ra.errors.len(), rb.errors.len());
        prop_assert_eq!(a.all_data_nodes(), b.all_data_nodes());
    }

    #[test]
    fn snapshot_round_trip(price in -500i64..500, quantity in 0i64..50, edits in prop::collection::vec(arb_override(), 0..6)) {
        let mut engine = Engine::new(pricing_graph(), state(price, quantity)).unwrap();
        engine.execute().unwrap();
        let before = engine.all_data_nodes();
        let snap = engine.snapshot();

        for o in &edits {
            engine.set_property(o.entity.as_str(), o.property.clone(), o.value.clone()).unwrap();
        }
        engine.execute().unwrap();
        engine.restore(&snap);

        prop_assert_eq!(engine.all_data_nodes(), before);
    }

    #[test]
    fn scenarios_never_leak(price in -500i64..500, quantity in 0i64..50, overrides in prop::collection::vec(arb_override(), 0..6)) {
        let mut engine = Engine::new(pricing_graph(), state(price, quantity)).unwrap();
        engine.execute().unwrap();
        let before = engine.all_data_nodes();

        let result = engine.run_scenario(overrides, "random").unwrap();

        prop_assert_eq!(&result.baseline, &before);
        prop_assert_eq!(engine.all_data_nodes(), before);
        prop_assert_eq!(result.success, result.errors.is_empty());
    }

    #[test]
    fn empty_scenario_is_idempotent(price in -500i64..500, quantity in 1i64..50) {
        let mut engine = Engine::new(pricing_graph(), state(price, quantity)).unwrap();
        engine.execute().unwrap();
        let result = engine.run_scenario(Vec::<Override>::new(), "noop").unwrap();
        prop_assert!(result.diff.is_empty());
        prop_assert_eq!(result.baseline, result.scenario);
    }
}
