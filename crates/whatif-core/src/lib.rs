pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod state;
pub mod value;

// Re-export commonly used types
pub use edge::{RelationKind, Relationship};
pub use error::CoreError;
pub use graph::{ComputationGraph, GraphBuilder, GraphDocument};
pub use id::{NodeId, RelationshipId};
pub use node::{ComputationLevel, ComputationNode, EngineKind, InputBinding, OutputBinding};
pub use state::{ExecutionState, PropertyBag, StateDump};
pub use value::Value;
