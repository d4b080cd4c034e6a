//! Writing engine results back to a store.

use std::collections::BTreeMap;

use whatif_core::{NodeId, PropertyBag, StateDump};

use crate::error::StorageError;
use crate::traits::PropertyStore;

/// Writes the declared output properties of each entity in `state` to
/// `store`, leaving every other stored property untouched.
///
/// `declared` is usually
/// [`ComputationGraph::declared_outputs_by_entity`](whatif_core::ComputationGraph::declared_outputs_by_entity).
/// Outputs absent from `state` (for example because their node failed) are
/// skipped. Returns the number of properties written.
pub fn persist_outputs<S: PropertyStore + ?Sized>(
    store: &mut S,
    state: &StateDump,
    declared: &BTreeMap<NodeId, Vec<String>>,
) -> Result<usize, StorageError> {
    let mut written = 0;
    for (entity, props) in declared {
        let Some(bag) = state.get(entity) else {
            continue;
        };
        let outputs: PropertyBag = props
            .iter()
            .filter_map(|p| bag.get(p).map(|v| (p.clone(), v.clone())))
            .collect();
        if outputs.is_empty() {
            continue;
        }
        store.write_properties(entity.as_str(), &outputs)?;
        written += outputs.len();
    }
    tracing::info!(written, "persisted declared outputs");
    Ok(written)
}
