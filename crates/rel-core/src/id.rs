use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of client-side pending ids. Shared by every entity kind so a
/// pending node id never collides with a pending edge id in logs.
static PENDING: AtomicI64 = AtomicI64::new(-1);

fn next_pending() -> i64 {
    PENDING.fetch_sub(1, Ordering::Relaxed)
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Allocate a fresh pending id (negative) for an entity the
            /// server has not acknowledged yet.
            pub fn pending() -> Self {
                Self(next_pending())
            }

            /// `true` until the persistence layer assigns a real id.
            pub fn is_pending(&self) -> bool {
                self.0 < 0
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_pending() {
                    write!(f, "{}~{}", $tag, -self.0)
                } else {
                    write!(f, "{}#{}", $tag, self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

entity_id!(
    /// Identifier of a node. Positive once persisted, negative while pending.
    NodeId,
    "node"
);
entity_id!(
    /// Identifier of an edge. Positive once persisted, negative while pending.
    EdgeId,
    "edge"
);
entity_id!(
    /// Identifier of a node task row.
    TaskId,
    "task"
);
entity_id!(
    /// Identifier of a graph record.
    GraphId,
    "graph"
);
