//! The "stricter-or-equal" partial order over capability tags.
//!
//! `a ≤ b` means a body that requires `a` can run anywhere `b` is available.
//! Each [`Family`] is its own lattice with a fixed bottom and top:
//!
//! ```text
//!                        defaults
//!      ┌──────────┬─────────┼──────────────┐
//!  rx_local   read_globals  io       policy_global
//!      │                                   │
//!  rx_shallow                         policy_local
//!      │                                   │
//!      rx                                policy
//!      │                                   │
//!  write_props                             │
//!      └──────────┴─────────┼──────────────┘
//!                          pure
//!
//!  immutable ≤ mutable ≤ owned_mutable
//! ```
//!
//! Comparing tags of different families is a lattice misuse and fails with
//! [`LatticeError::Incomparable`]; unrelated tags of the same family simply
//! compare as "not ordered".
//!
//! # Examples
//!
//! ```
//! # use coeffects_foundation::{CapabilityLattice, CapabilityTag};
//! let lattice = CapabilityLattice::standard();
//! assert!(lattice.is_stricter_or_equal(CapabilityTag::Rx, CapabilityTag::RxLocal).unwrap());
//! assert!(!lattice.is_stricter_or_equal(CapabilityTag::Io, CapabilityTag::Rx).unwrap());
//! assert!(lattice.is_stricter_or_equal(CapabilityTag::Io, CapabilityTag::Mutable).is_err());
//! ```

use crate::capability::{CapabilitySet, CapabilityTag, Family};
use std::cmp::Ordering;
use thiserror::Error;

/// Lattice construction and comparison errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    #[error("incomparable capabilities: {left} ({}) cannot be compared with {right} ({})", .left.family().name(), .right.family().name())]
    Incomparable {
        left: CapabilityTag,
        right: CapabilityTag,
    },

    #[error("capability order is cyclic: {left} and {right} are each stricter than the other")]
    Cycle {
        left: CapabilityTag,
        right: CapabilityTag,
    },
}

/// Immutable partial order over [`CapabilityTag`]s.
///
/// Stored as the reflexive-transitive down-set of every tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityLattice {
    down: [CapabilitySet; CapabilityTag::COUNT],
}

/// Builder for custom lattices.
///
/// Family bottoms and tops are implied; only the interior edges are given.
#[derive(Debug, Clone, Default)]
pub struct LatticeBuilder {
    edges: Vec<(CapabilityTag, CapabilityTag)>,
}

/// Interior edges of the standard lattice, `(weaker, stronger)`.
const STANDARD_EDGES: &[(CapabilityTag, CapabilityTag)] = &[
    (CapabilityTag::WriteProps, CapabilityTag::Rx),
    (CapabilityTag::Rx, CapabilityTag::RxShallow),
    (CapabilityTag::RxShallow, CapabilityTag::RxLocal),
    (CapabilityTag::Policy, CapabilityTag::PolicyLocal),
    (CapabilityTag::PolicyLocal, CapabilityTag::PolicyGlobal),
    (CapabilityTag::Immutable, CapabilityTag::Mutable),
    (CapabilityTag::Mutable, CapabilityTag::OwnedMutable),
];

impl LatticeBuilder {
    /// Create a builder with no interior edges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `weaker ≤ stronger`.
    pub fn order(mut self, weaker: CapabilityTag, stronger: CapabilityTag) -> Self {
        self.edges.push((weaker, stronger));
        self
    }

    /// Close the order transitively and validate it.
    ///
    /// # Errors
    ///
    /// - [`LatticeError::Incomparable`] if an edge crosses families.
    /// - [`LatticeError::Cycle`] if two distinct tags end up ordered both ways.
    pub fn build(self) -> Result<CapabilityLattice, LatticeError> {
        for &(weaker, stronger) in &self.edges {
            if weaker.family() != stronger.family() {
                return Err(LatticeError::Incomparable {
                    left: weaker,
                    right: stronger,
                });
            }
        }

        let lattice = CapabilityLattice::close(&self.edges);

        for a in CapabilityTag::ALL {
            for b in CapabilityTag::ALL {
                if a < b && lattice.down[a as usize].contains(b) && lattice.down[b as usize].contains(a)
                {
                    return Err(LatticeError::Cycle { left: a, right: b });
                }
            }
        }

        Ok(lattice)
    }
}

impl CapabilityLattice {
    /// The standard capability order.
    pub fn standard() -> Self {
        Self::close(STANDARD_EDGES)
    }

    /// Bottom element of a family.
    pub const fn bottom(family: Family) -> CapabilityTag {
        match family {
            Family::Effect => CapabilityTag::Pure,
            Family::Mutability => CapabilityTag::Immutable,
        }
    }

    /// Top element of a family.
    pub const fn top(family: Family) -> CapabilityTag {
        match family {
            Family::Effect => CapabilityTag::Defaults,
            Family::Mutability => CapabilityTag::OwnedMutable,
        }
    }

    /// Check whether `a ≤ b`.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Incomparable`] when `a` and `b` belong to
    /// different families.
    pub fn is_stricter_or_equal(
        &self,
        a: CapabilityTag,
        b: CapabilityTag,
    ) -> Result<bool, LatticeError> {
        if a.family() != b.family() {
            return Err(LatticeError::Incomparable { left: a, right: b });
        }
        Ok(self.down[b as usize].contains(a))
    }

    /// Compare two tags of the same family.
    ///
    /// Returns `Ok(None)` for unordered tags of the same family.
    pub fn compare(
        &self,
        a: CapabilityTag,
        b: CapabilityTag,
    ) -> Result<Option<Ordering>, LatticeError> {
        if a == b {
            return Ok(Some(Ordering::Equal));
        }
        if self.is_stricter_or_equal(a, b)? {
            Ok(Some(Ordering::Less))
        } else if self.is_stricter_or_equal(b, a)? {
            Ok(Some(Ordering::Greater))
        } else {
            Ok(None)
        }
    }

    /// Every tag `≤ tag`, including `tag` itself.
    pub fn down_set(&self, tag: CapabilityTag) -> CapabilitySet {
        self.down[tag as usize]
    }

    /// Reflexive-transitive closure over family bottoms, tops and `edges`.
    fn close(edges: &[(CapabilityTag, CapabilityTag)]) -> Self {
        let mut down = [CapabilitySet::empty(); CapabilityTag::COUNT];

        for tag in CapabilityTag::ALL {
            let family = tag.family();
            down[tag as usize] = CapabilitySet::single(tag).with(Self::bottom(family));
            if tag == Self::top(family) {
                down[tag as usize] = CapabilitySet::all().of_family(family);
            }
        }
        for &(weaker, stronger) in edges {
            down[stronger as usize] = down[stronger as usize].with(weaker);
        }

        // Fixpoint; the vocabulary is tiny so the naive loop is fine
        let mut changed = true;
        while changed {
            changed = false;
            for tag in CapabilityTag::ALL {
                let current = down[tag as usize];
                let expanded = current
                    .iter()
                    .fold(current, |acc, below| acc.union(down[below as usize]));
                if expanded != current {
                    down[tag as usize] = expanded;
                    changed = true;
                }
            }
        }

        Self { down }
    }
}

impl Default for CapabilityLattice {
    fn default() -> Self {
        Self::standard()
    }
}
