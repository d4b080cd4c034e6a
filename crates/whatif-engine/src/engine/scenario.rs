//! What-if scenarios: override, execute, diff, restore.
//!
//! [`Engine::run_scenario`] applies hypothetical property values, runs a full
//! pass, and reports what changed relative to the state before the overrides.
//! The engine's state is restored afterwards on every exit path, so a
//! scenario never leaves a trace in the live state and never persists
//! anything.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use whatif_core::{NodeId, StateDump, Value};

use super::error::{EngineError, NodeError};
use super::snapshot::RestoreGuard;
use super::Engine;

/// One hypothetical property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Override {
    pub entity: NodeId,
    pub property: String,
    pub value: Value,
}

impl Override {
    pub fn new(
        entity: impl Into<NodeId>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Override {
            entity: entity.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

impl<E: Into<NodeId>, P: Into<String>, V: Into<Value>> From<(E, P, V)> for Override {
    fn from((entity, property, value): (E, P, V)) -> Self {
        Override::new(entity, property, value)
    }
}

/// A property whose value differs between baseline and scenario.
///
/// `None` means the property was absent on that side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub entity_id: NodeId,
    pub property: String,
    pub baseline: Option<Value>,
    pub scenario: Option<Value>,
}

/// Entity id to property name to value.
pub type PropertyMap = BTreeMap<NodeId, BTreeMap<String, Value>>;

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub title: String,
    /// Full state before the overrides were applied.
    pub baseline: StateDump,
    /// Full state after the overrides and the execution pass.
    pub scenario: StateDump,
    pub diff: Vec<DiffEntry>,
    pub overrides: PropertyMap,
    /// Declared outputs of each entity, as present in the scenario state.
    pub outputs_per_node: PropertyMap,
    /// Ids of every entity with at least one diff entry, sorted.
    pub affected_entity_ids: Vec<NodeId>,
    pub errors: Vec<NodeError>,
    pub success: bool,
}

impl ScenarioResult {
    /// Diff entry for one property, if it changed.
    pub fn change(&self, entity: &str, property: &str) -> Option<&DiffEntry> {
        self.diff
            .iter()
            .find(|d| d.entity_id == entity && d.property == property)
    }
}

impl Engine {
    /// Runs a what-if scenario and restores the state afterwards.
    ///
    /// Fails without touching the state when an override names an entity the
    /// state does not contain, or when the graph has a dependency cycle. Node
    /// failures do not fail the call; they are reported in
    /// [`ScenarioResult::errors`] with `success == false`.
    pub fn run_scenario<I, O>(
        &mut self,
        overrides: I,
        title: &str,
    ) -> Result<ScenarioResult, EngineError>
    where
        I: IntoIterator<Item = O>,
        O: Into<Override>,
    {
        let overrides: Vec<Override> = overrides.into_iter().map(Into::into).collect();
        if let Some(o) = overrides
            .iter()
            .find(|o| !self.state.contains_entity(o.entity.as_str()))
        {
            return Err(EngineError::UnknownEntity {
                id: o.entity.clone(),
            });
        }
        self.execution_order()?;

        let (baseline, scenario, errors) = {
            let mut guard = RestoreGuard::new(self);
            let baseline = guard.baseline().clone();
            for o in &overrides {
                guard
                    .state
                    .set(o.entity.as_str(), o.property.clone(), o.value.clone())?;
            }
            let report = guard.execute()?;
            (baseline, guard.state.dump(), report.errors)
        };

        let diff = diff_states(&baseline, &scenario);
        let affected_entity_ids: Vec<NodeId> = diff
            .iter()
            .map(|d| d.entity_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut override_map = PropertyMap::new();
        for o in overrides {
            override_map
                .entry(o.entity)
                .or_default()
                .insert(o.property, o.value);
        }

        let mut outputs_per_node = PropertyMap::new();
        for (entity, props) in self.graph.declared_outputs_by_entity() {
            let Some(bag) = scenario.get(&entity) else {
                continue;
            };
            let present: BTreeMap<String, Value> = props
                .into_iter()
                .filter_map(|p| bag.get(&p).cloned().map(|v| (p, v)))
                .collect();
            if !present.is_empty() {
                outputs_per_node.insert(entity, present);
            }
        }

        let success = errors.is_empty();
        let override_count: usize = override_map.values().map(BTreeMap::len).sum();
        tracing::info!(
            title,
            overrides = override_count,
            changes = diff.len(),
            errors = errors.len(),
            success,
            "scenario complete"
        );

        Ok(ScenarioResult {
            title: title.to_string(),
            baseline,
            scenario,
            diff,
            overrides: override_map,
            outputs_per_node,
            affected_entity_ids,
            errors,
            success,
        })
    }
}

/// Every `(entity, property)` whose value differs between the two dumps,
/// including properties present on one side only. Ordered by entity then
/// property.
pub fn diff_states(baseline: &StateDump, scenario: &StateDump) -> Vec<DiffEntry> {
    let entities: BTreeSet<&NodeId> = baseline.keys().chain(scenario.keys()).collect();
    let mut diff = Vec::new();
    for entity in entities {
        let before = baseline.get(entity);
        let after = scenario.get(entity);
        let props: BTreeSet<&String> = before
            .into_iter()
            .flat_map(|b| b.keys())
            .chain(after.into_iter().flat_map(|a| a.keys()))
            .collect();
        for prop in props {
            let b = before.and_then(|bag| bag.get(prop));
            let a = after.and_then(|bag| bag.get(prop));
            if b != a {
                diff.push(DiffEntry {
                    entity_id: entity.clone(),
                    property: prop.clone(),
                    baseline: b.cloned(),
                    scenario: a.cloned(),
                });
            }
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatif_core::PropertyBag;

    fn dump(entries: &[(&str, Vec<(&str, Value)>)]) -> StateDump {
        entries
            .iter()
            .map(|(id, props)| {
                let bag: PropertyBag = props.iter().map(|(k, v)| (*k, v.clone())).collect();
                (NodeId::from(*id), bag)
            })
            .collect()
    }

    #[test]
    fn diff_reports_changes_appearances_and_disappearances() {
        let before = dump(&[
            ("a", vec![("x", Value::Int(1)), ("gone", Value::Int(0))]),
            ("b", vec![("y", Value::Int(2))]),
        ]);
        let after = dump(&[
            ("a", vec![("x", Value::Int(5))]),
            ("b", vec![("y", Value::Int(2)), ("new", Value::Null)]),
        ]);
        let diff = diff_states(&before, &after);
        let summary: Vec<_> = diff
            .iter()
            .map(|d| (d.entity_id.as_str(), d.property.as_str()))
            .collect();
        assert_eq!(summary, vec![("a", "gone"), ("a", "x"), ("b", "new")]);
        assert_eq!(diff[0].scenario, None);
        assert_eq!(diff[2].baseline, None);
        assert_eq!(diff[2].scenario, Some(Value::Null));
    }

    #[test]
    fn identical_dumps_have_no_diff() {
        let d = dump(&[("a", vec![("x", Value::Float(f64::NAN))])]);
        assert!(diff_states(&d, &d.clone()).is_empty());
    }

    #[test]
    fn override_from_tuple() {
        let o: Override = ("order_001", "price", 150).into();
        assert_eq!(o, Override::new("order_001", "price", Value::Int(150)));
    }
}
