//! Stable string ID newtypes for graph elements.
//!
//! Computation nodes and entities share one namespace: a relationship endpoint
//! is a computation node if its id is registered as one, and an entity
//! otherwise. Both are addressed with [`NodeId`]. Relationships have their own
//! namespace, addressed with [`RelationshipId`].

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a graph vertex: a computation node or an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Identifier of a READS/WRITES relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Creates an id from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                $name(s.clone())
            }
        }

        // Lets maps keyed by the id be queried with a plain `&str`.
        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(NodeId);
string_id!(RelationshipId);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId::new("order_001")), "order_001");
    }

    #[test]
    fn relationship_id_display() {
        assert_eq!(format!("{}", RelationshipId::from("rel_price")), "rel_price");
    }

    #[test]
    fn maps_can_be_queried_by_str() {
        let mut hashed = HashMap::new();
        hashed.insert(NodeId::from("a"), 1);
        assert_eq!(hashed.get("a"), Some(&1));

        let mut ordered = BTreeMap::new();
        ordered.insert(NodeId::from("b"), 2);
        assert_eq!(ordered.get("b"), Some(&2));
    }

    #[test]
    fn ids_compare_with_str() {
        let id = NodeId::from("calc_tax");
        assert_eq!(id, "calc_tax");
        assert!(NodeId::from("a") < NodeId::from("b"));
    }

    #[test]
    fn serde_is_transparent() {
        let id = NodeId::from("invoice_001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"invoice_001\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
