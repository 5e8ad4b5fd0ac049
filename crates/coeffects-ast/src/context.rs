//! Context sets: the capabilities a declaration is permitted to use.
//!
//! A [`ContextSet`] is either a concrete, lattice-normal [`CapabilitySet`],
//! a concrete part plus symbolic references that are only resolvable against
//! a binding environment, or `Inferred` (no annotation, i.e. `defaults`).
//!
//! # Normal Form
//!
//! A concrete set is normal when no tag is implied by another tag of the same
//! family in the set. `pure` is the empty set and never appears in normal form.
//!
//! ```text
//! [pure]               → []
//! [rx, rx_local]       → [rx_local]
//! [io, defaults]       → [defaults]
//! [io, write_props]    → [write_props, io]     (unordered, both kept)
//! ```
//!
//! # Subsumption
//!
//! A callee set is subsumed by a caller set when every callee tag is
//! `≤` some caller tag. Tags of different families are never compared
//! silently: doing so is a lattice misuse and surfaces
//! [`LatticeError::Incomparable`].
//!
//! # Examples
//!
//! ```
//! # use coeffects_ast::context::*;
//! # use coeffects_foundation::{CapabilityLattice, CapabilitySet, CapabilityTag};
//! let lattice = CapabilityLattice::standard();
//! let callee = CapabilitySet::single(CapabilityTag::Rx);
//! let caller = CapabilitySet::single(CapabilityTag::RxLocal);
//!
//! let result = is_subset_or_equal(&lattice, callee, caller).unwrap();
//! assert!(result.is_satisfied());
//! ```

use coeffects_foundation::{CapabilityLattice, CapabilitySet, CapabilityTag, LatticeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A symbolic reference inside a context list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextRef {
    /// `this::C`: context member of the enclosing class
    ThisMember { member: String },
    /// `$param::C`: context member of a parameter's static type
    ParamMember { param: String, member: String },
    /// `ctx $param`: declared context of a higher-order parameter
    ParamContext { param: String },
}

/// A declaration's context, possibly symbolic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextSet {
    /// Lattice-normal concrete set
    Concrete { tags: CapabilitySet },
    /// Concrete part plus symbolic references
    Symbolic {
        tags: CapabilitySet,
        refs: Vec<ContextRef>,
    },
    /// No annotation; behaves as `defaults`
    Inferred,
}

/// Outcome of a subsumption check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsumption {
    /// Every required tag is provided
    Satisfied,
    /// These required tags are not provided
    Missing(CapabilitySet),
}

/// Reduce a tag set to lattice-normal form.
///
/// Drops `pure` and every tag strictly implied by another tag of the same
/// family. Idempotent.
pub fn normalize(lattice: &CapabilityLattice, tags: CapabilitySet) -> CapabilitySet {
    let tags = tags.without(CapabilityTag::Pure);
    tags.iter()
        .filter(|&tag| {
            !tags.iter().any(|other| {
                other != tag
                    && other.family() == tag.family()
                    && lattice.down_set(other).contains(tag)
            })
        })
        .collect()
}

/// Check that every tag in `callee` is `≤` some tag in `caller`.
///
/// An empty (`pure`) callee is always satisfied.
///
/// # Errors
///
/// Returns [`LatticeError::Incomparable`] as soon as a callee tag is compared
/// with a caller tag of a different family.
pub fn is_subset_or_equal(
    lattice: &CapabilityLattice,
    callee: CapabilitySet,
    caller: CapabilitySet,
) -> Result<Subsumption, LatticeError> {
    let mut missing = CapabilitySet::empty();

    for required in callee.without(CapabilityTag::Pure).iter() {
        let mut provided = false;
        for available in caller.iter() {
            if lattice.is_stricter_or_equal(required, available)? {
                provided = true;
            }
        }
        if !provided {
            missing = missing.with(required);
        }
    }

    if missing.is_empty() {
        Ok(Subsumption::Satisfied)
    } else {
        Ok(Subsumption::Missing(missing))
    }
}

impl Subsumption {
    /// Check if the requirement is met.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// Tags that are required but not provided (empty when satisfied).
    pub fn missing(&self) -> CapabilitySet {
        match self {
            Self::Satisfied => CapabilitySet::empty(),
            Self::Missing(tags) => *tags,
        }
    }
}

impl ContextSet {
    /// The empty context `[]`.
    pub fn pure() -> Self {
        Self::Concrete {
            tags: CapabilitySet::empty(),
        }
    }

    /// The unrestricted context `[defaults]`.
    pub fn defaults() -> Self {
        Self::Concrete {
            tags: CapabilitySet::single(CapabilityTag::Defaults),
        }
    }

    /// Build a normalized context, symbolic only if `refs` is non-empty.
    pub fn new(lattice: &CapabilityLattice, tags: CapabilitySet, refs: Vec<ContextRef>) -> Self {
        let tags = normalize(lattice, tags);
        if refs.is_empty() {
            Self::Concrete { tags }
        } else {
            Self::Symbolic { tags, refs }
        }
    }

    /// The concrete part; `Inferred` contributes `defaults`.
    pub fn concrete_tags(&self) -> CapabilitySet {
        match self {
            Self::Concrete { tags } | Self::Symbolic { tags, .. } => *tags,
            Self::Inferred => CapabilitySet::single(CapabilityTag::Defaults),
        }
    }

    /// The symbolic references, empty for concrete and inferred contexts.
    pub fn refs(&self) -> &[ContextRef] {
        match self {
            Self::Symbolic { refs, .. } => refs,
            Self::Concrete { .. } | Self::Inferred => &[],
        }
    }

    /// Check whether resolution against a binding environment is needed.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic { .. })
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThisMember { member } => write!(f, "this::{}", member),
            Self::ParamMember { param, member } => write!(f, "${}::{}", param, member),
            Self::ParamContext { param } => write!(f, "ctx ${}", param),
        }
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concrete { tags } => write!(f, "{}", tags),
            Self::Symbolic { tags, refs } => {
                let mut parts: Vec<String> = refs.iter().map(ToString::to_string).collect();
                parts.extend(tags.iter().map(|t| t.name().to_string()));
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Inferred => f.write_str("[defaults] (inferred)"),
        }
    }
}
