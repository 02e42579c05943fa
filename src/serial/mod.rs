//! Output serialization.
//!
//! Each match produced by the query engine becomes exactly one line of
//! output. See [`xml`] for the per-node rules.

pub mod xml;

pub use xml::{serialize_match, serialize_node, write_matches};
