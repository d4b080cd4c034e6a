//! Snapshot and restore of the execution state.

use whatif_core::StateDump;

use super::{Engine, NodeError};

/// A deep copy of every entity's property bag at one point in time.
///
/// Opaque beyond [`Engine::restore`]; holding a snapshot never aliases the
/// live state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    bags: StateDump,
}

impl Snapshot {
    pub fn entity_count(&self) -> usize {
        self.bags.len()
    }
}

impl Engine {
    /// Deep-copies the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            bags: self.state.dump(),
        }
    }

    /// Replaces every snapshotted entity's bag with its snapshotted contents.
    ///
    /// Properties added since the snapshot are removed. Entities added since
    /// the snapshot are kept as they are.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.state.replace_from(&snapshot.bags);
        tracing::debug!(entities = snapshot.bags.len(), "restored snapshot");
    }
}

/// Restores a snapshot when dropped, so a scenario reverts on every exit path
/// including a panic during evaluation. The engine's last pass errors are
/// restored with it.
pub(crate) struct RestoreGuard<'e> {
    engine: &'e mut Engine,
    snapshot: Snapshot,
    last_errors: Vec<NodeError>,
}

impl<'e> RestoreGuard<'e> {
    pub(crate) fn new(engine: &'e mut Engine) -> Self {
        let snapshot = engine.snapshot();
        let last_errors = engine.last_errors.clone();
        RestoreGuard {
            engine,
            snapshot,
            last_errors,
        }
    }

    pub(crate) fn baseline(&self) -> &StateDump {
        &self.snapshot.bags
    }
}

impl std::ops::Deref for RestoreGuard<'_> {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        self.engine
    }
}

impl std::ops::DerefMut for RestoreGuard<'_> {
    fn deref_mut(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.engine.restore(&self.snapshot);
        self.engine.last_errors = std::mem::take(&mut self.last_errors);
    }
}
