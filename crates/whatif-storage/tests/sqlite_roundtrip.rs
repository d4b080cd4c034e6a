//! File-backed SQLite tests: persistence across reopen, and the
//! load -> execute -> persist cycle around an engine.

use tempfile::TempDir;

use whatif_core::{ComputationNode, GraphBuilder, NodeId, PropertyBag, Value};
use whatif_engine::Engine;
use whatif_storage::{persist_outputs, EntitySpec, PropertyStore, SqliteStore};

fn db_path(dir: &TempDir) -> String {
    dir.path().join("whatif.db").to_string_lossy().into_owned()
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    {
        let mut store = SqliteStore::new(&path).unwrap();
        store
            .create_entities(&[EntitySpec::new("order_001", "Order")
                .with_properties(PropertyBag::from_iter([("price", 100)]))])
            .unwrap();
        store
            .write_properties("order_001", &PropertyBag::from_iter([("quantity", 5)]))
            .unwrap();
    }

    let store = SqliteStore::new(&path).unwrap();
    let dump = store.load_properties(&["order_001".into()]).unwrap();
    let bag = &dump[&NodeId::from("order_001")];
    assert_eq!(bag.get("price"), Some(&Value::Int(100)));
    assert_eq!(bag.get("quantity"), Some(&Value::Int(5)));
}

#[test]
fn scenario_results_are_not_persisted_unless_asked() {
    let dir = TempDir::new().unwrap();
    let mut store = SqliteStore::new(&db_path(&dir)).unwrap();
    store
        .create_entities(&[
            EntitySpec::new("order_001", "Order")
                .with_properties(PropertyBag::from_iter([("price", 100), ("quantity", 2)])),
            EntitySpec::new("invoice_001", "Invoice"),
        ])
        .unwrap();

    let mut b = GraphBuilder::new("subtotal");
    b.node(ComputationNode::new("calc_subtotal", "Subtotal", "price * quantity"))
        .unwrap();
    b.reads("r1", "order_001", "calc_subtotal", "price").unwrap();
    b.reads("r2", "order_001", "calc_subtotal", "quantity").unwrap();
    b.writes("w1", "calc_subtotal", "invoice_001", "subtotal").unwrap();
    let graph = b.build();

    let ids: Vec<NodeId> = graph.entity_ids().iter().cloned().collect();
    let state = store.load_state(&ids).unwrap();
    let mut engine = Engine::new(graph, state).unwrap();

    let result = engine
        .run_scenario([("order_001", "price", 150)], "price rise")
        .unwrap();
    assert!(result.success);
    let stored = store.load_properties(&["invoice_001".into()]).unwrap();
    assert!(!stored[&NodeId::from("invoice_001")].contains("subtotal"));

    engine.execute().unwrap();
    let written = persist_outputs(
        &mut store,
        &engine.all_data_nodes(),
        &engine.graph().declared_outputs_by_entity(),
    )
    .unwrap();
    assert_eq!(written, 1);

    let stored = store.load_properties(&["invoice_001".into(), "order_001".into()]).unwrap();
    assert_eq!(
        stored[&NodeId::from("invoice_001")].get("subtotal"),
        Some(&Value::Int(200))
    );
    assert_eq!(
        stored[&NodeId::from("order_001")].get("price"),
        Some(&Value::Int(100))
    );
}
