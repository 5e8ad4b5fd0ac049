//! Read-only reflection over checked declarations.
//!
//! Answers the questions a `ReflectionFunction`-style API asks about a
//! declaration without running it:
//!
//! - [`ReflectionView::coeffects_of`] - the normalized capability set the
//!   declaration runs with, and whether it is exact or only an upper bound
//! - [`ReflectionView::declared_coeffects_of`] - the annotation as written
//! - [`ReflectionView::param_capabilities_of`] - per-parameter mutability
//!
//! Reflection is purely static and never consults runtime state.

use crate::resolve::contexts::{BindingEnv, Resolver};
use crate::resolve::table::DeclarationTable;
use coeffects_ast::{normalize, DeclId};
use coeffects_foundation::{CapabilityLattice, CapabilitySet, CapabilityTag};
use serde::Serialize;

/// A declaration's context as seen by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedContext {
    /// Normalized capability set
    pub tags: CapabilitySet,
    /// `tags` is an upper bound because part of the context depends on
    /// `this` or a parameter
    pub is_upper_bound: bool,
}

/// Reflection over a declaration table.
#[derive(Debug, Clone, Copy)]
pub struct ReflectionView<'a> {
    table: &'a DeclarationTable,
    lattice: &'a CapabilityLattice,
}

impl<'a> ReflectionView<'a> {
    pub fn new(table: &'a DeclarationTable, lattice: &'a CapabilityLattice) -> Self {
        Self { table, lattice }
    }

    /// The capabilities `id` runs with, resolved in its own environment.
    ///
    /// Unannotated declarations report `[defaults]`. `None` for unknown ids.
    pub fn coeffects_of(&self, id: &DeclId) -> Option<ResolvedContext> {
        let decl = self.table.get(id)?;
        let resolver = Resolver::new(self.lattice, self.table.classes());

        let resolved = match resolver.require(decl, &BindingEnv::own(decl)) {
            Ok(required) => ResolvedContext {
                tags: normalize(self.lattice, required.upper_bound()),
                is_upper_bound: !required.is_exact(),
            },
            Err(_) => ResolvedContext {
                tags: CapabilitySet::single(CapabilityTag::Defaults),
                is_upper_bound: true,
            },
        };
        Some(resolved)
    }

    /// The annotation tokens exactly as written, unknown names included.
    ///
    /// Empty for unannotated declarations. `None` for unknown ids.
    pub fn declared_coeffects_of(&self, id: &DeclId) -> Option<Vec<String>> {
        let decl = self.table.get(id)?;
        Some(decl.declared.tokens().iter().map(ToString::to_string).collect())
    }

    /// Mutability of each parameter in positional order.
    pub fn param_capabilities_of(&self, id: &DeclId) -> Option<Vec<(String, CapabilityTag)>> {
        let decl = self.table.get(id)?;
        Some(
            decl.params
                .iter()
                .map(|p| (p.name.clone(), p.mutability))
                .collect(),
        )
    }
}
