//! Capability tags and capability sets.
//!
//! A capability tag names one ambient permission a function body may require.
//! Tags are split into two families that are never compared with each other:
//!
//! - **Effect** tags describe what a body may do (`pure`, `rx`, `io`, ...).
//!   `pure` is the empty requirement; `defaults` grants everything.
//! - **Mutability** tags describe how a parameter may be used
//!   (`immutable`, `mutable`, `owned_mutable`).
//!
//! The ordering between tags is not defined here; see
//! [`CapabilityLattice`](crate::lattice::CapabilityLattice).
//!
//! # Examples
//!
//! ```
//! # use coeffects_foundation::capability::*;
//! let tag = CapabilityTag::from_name("RX").unwrap();
//! assert_eq!(tag, CapabilityTag::Rx);
//! assert_eq!(tag.family(), Family::Effect);
//!
//! let caps = CapabilitySet::empty()
//!     .with(CapabilityTag::Rx)
//!     .with(CapabilityTag::Io);
//! assert!(caps.contains(CapabilityTag::Io));
//! assert!(!caps.contains(CapabilityTag::Defaults));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single capability in the fixed vocabulary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CapabilityTag {
    // === Effect family ===
    /// No ambient capability at all (bottom)
    Pure = 0,
    /// Write properties of `this`
    WriteProps = 1,
    /// Read global state
    ReadGlobals = 2,
    /// Reactive
    Rx = 3,
    /// Reactive, shallow
    RxShallow = 4,
    /// Reactive, local
    RxLocal = 5,
    /// Input/output
    Io = 6,
    /// Policy-tier access
    Policy = 7,
    /// Policy-tier access, local
    PolicyLocal = 8,
    /// Policy-tier access, global
    PolicyGlobal = 9,
    /// Unrestricted (top)
    Defaults = 10,

    // === Mutability family ===
    /// Parameter may only be read
    Immutable = 11,
    /// Parameter may be mutated but not stored
    Mutable = 12,
    /// Parameter ownership is transferred to the callee
    OwnedMutable = 13,
}

/// The chain a tag belongs to.
///
/// Tags of different families are incomparable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Function/method effect capabilities
    Effect,
    /// Parameter mutability capabilities
    Mutability,
}

/// Bitset of capability tags (compact representation).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CapabilitySet(u16);

impl CapabilityTag {
    /// Total number of tags
    pub const COUNT: usize = 14;

    /// Every tag, in discriminant order.
    pub const ALL: [CapabilityTag; Self::COUNT] = [
        Self::Pure,
        Self::WriteProps,
        Self::ReadGlobals,
        Self::Rx,
        Self::RxShallow,
        Self::RxLocal,
        Self::Io,
        Self::Policy,
        Self::PolicyLocal,
        Self::PolicyGlobal,
        Self::Defaults,
        Self::Immutable,
        Self::Mutable,
        Self::OwnedMutable,
    ];

    /// Get the family this tag belongs to.
    pub const fn family(self) -> Family {
        match self {
            Self::Immutable | Self::Mutable | Self::OwnedMutable => Family::Mutability,
            _ => Family::Effect,
        }
    }

    /// Get the canonical tag name as written in annotations.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pure => "pure",
            Self::WriteProps => "write_props",
            Self::ReadGlobals => "read_globals",
            Self::Rx => "rx",
            Self::RxShallow => "rx_shallow",
            Self::RxLocal => "rx_local",
            Self::Io => "io",
            Self::Policy => "policy",
            Self::PolicyLocal => "policy_local",
            Self::PolicyGlobal => "policy_global",
            Self::Defaults => "defaults",
            Self::Immutable => "immutable",
            Self::Mutable => "mutable",
            Self::OwnedMutable => "owned_mutable",
        }
    }

    /// Look up a tag by annotation name.
    ///
    /// Matching is case-insensitive. The attribute spellings `cipp`,
    /// `cipp_local`, `cipp_global` and `owned` are accepted as aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        let tag = match lowered.as_str() {
            "pure" => Self::Pure,
            "write_props" => Self::WriteProps,
            "read_globals" => Self::ReadGlobals,
            "rx" => Self::Rx,
            "rx_shallow" => Self::RxShallow,
            "rx_local" => Self::RxLocal,
            "io" => Self::Io,
            "policy" | "cipp" => Self::Policy,
            "policy_local" | "cipp_local" => Self::PolicyLocal,
            "policy_global" | "cipp_global" => Self::PolicyGlobal,
            "defaults" => Self::Defaults,
            "immutable" => Self::Immutable,
            "mutable" => Self::Mutable,
            "owned_mutable" | "owned" => Self::OwnedMutable,
            _ => return None,
        };
        Some(tag)
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Family {
    /// Get the family name as a static string.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Effect => "effect",
            Self::Mutability => "mutability",
        }
    }
}

impl CapabilitySet {
    /// Create an empty capability set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create a capability set containing every tag of every family.
    pub const fn all() -> Self {
        Self((1 << CapabilityTag::COUNT) - 1)
    }

    /// Create a capability set with a single tag.
    pub const fn single(tag: CapabilityTag) -> Self {
        Self(tag.bit())
    }

    /// Add a tag to this set.
    pub const fn with(self, tag: CapabilityTag) -> Self {
        Self(self.0 | tag.bit())
    }

    /// Check if this set contains a tag.
    pub const fn contains(self, tag: CapabilityTag) -> bool {
        (self.0 & tag.bit()) != 0
    }

    /// Remove a tag from this set.
    pub const fn without(self, tag: CapabilityTag) -> Self {
        Self(self.0 & !tag.bit())
    }

    /// Check if this set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the number of tags in this set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Compute the union of two capability sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Compute the intersection of two capability sets.
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Compute the tags in `self` that are not in `other`.
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Check if this set is a subset of another (plain set inclusion).
    pub const fn is_subset_of(self, other: Self) -> bool {
        (self.0 & other.0) == self.0
    }

    /// Iterate over the tags in discriminant order.
    pub fn iter(self) -> impl Iterator<Item = CapabilityTag> {
        CapabilityTag::ALL
            .into_iter()
            .filter(move |tag| self.contains(*tag))
    }

    /// Restrict this set to the tags of one family.
    pub fn of_family(self, family: Family) -> Self {
        self.iter()
            .filter(|tag| tag.family() == family)
            .collect()
    }
}

impl FromIterator<CapabilityTag> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CapabilityTag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(CapabilityTag::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
