//! Coeffects Foundation
//!
//! Core vocabulary shared by the static checker and the runtime:
//! capability tags, capability bitsets, the capability lattice and
//! source locations.

pub mod capability;
pub mod lattice;
pub mod span;

// Re-export at crate root
pub use capability::{CapabilitySet, CapabilityTag, Family};
pub use lattice::{CapabilityLattice, LatticeBuilder, LatticeError};
pub use span::{SourceMap, Span};
