//! The register: the hierarchical structure of the canonical record.
//!
//! The register composes the domain model, the record layout, and the
//! integrity layer into one tree. Each node aligns three views over the
//! same lazily-materialized members: the domain view (versions, e-prints,
//! listings), the record view (keys and bitstreams), and the integrity
//! view (manifests and checksums). Interior levels share one generic
//! implementation ([`node::Block`]); versions, e-prints, and listings have
//! their own node types with the mutation semantics of the record.
//!
//! Use [`RegisterApi`] to read from and write to a record.

mod api;
mod eprint;
mod lazy;
mod listing;
mod node;
mod validate;
mod version;

pub use api::{EventIter, RegisterApi, Selector};
pub use node::{Ctx, Node};
