//! Unified checking pipeline.
//!
//! This module orchestrates the table, override and call-site passes to turn
//! a [`Program`] manifest into a [`CheckedProgram`] that reflection can be
//! served from.

use crate::error::{CheckError, Severity};
use crate::reflection::ReflectionView;
use crate::resolve::calls::check_calls;
use crate::resolve::overrides::check_overrides;
use crate::resolve::table::DeclarationTable;
use coeffects_ast::Program;
use coeffects_foundation::CapabilityLattice;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

/// Pipeline configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    /// Check overrides on the rayon pool
    pub parallel: bool,
    /// Treat warnings as errors
    pub deny_warnings: bool,
}

/// A program that passed every check.
#[derive(Debug, Clone)]
pub struct CheckedProgram {
    table: DeclarationTable,
    lattice: CapabilityLattice,
    warnings: Vec<CheckError>,
}

impl CheckedProgram {
    /// The declaration table.
    pub fn table(&self) -> &DeclarationTable {
        &self.table
    }

    /// The lattice the program was checked against.
    pub fn lattice(&self) -> &CapabilityLattice {
        &self.lattice
    }

    /// Diagnostics that did not fail the check.
    pub fn warnings(&self) -> &[CheckError] {
        &self.warnings
    }

    /// Read-only reflection over the checked declarations.
    pub fn reflection(&self) -> ReflectionView<'_> {
        ReflectionView::new(&self.table, &self.lattice)
    }
}

/// Check a program against the standard lattice.
///
/// This is the main entry point for the checker.
pub fn check(program: &Program, options: &CheckOptions) -> Result<CheckedProgram, Vec<CheckError>> {
    check_with_lattice(program, CapabilityLattice::standard(), options)
}

/// Check a program against a custom lattice.
///
/// # Errors
///
/// Returns every diagnostic when any of them is an error (or a warning with
/// `deny_warnings`). A fatal lattice error stops the pipeline at once and is
/// returned after the errors collected so far.
pub fn check_with_lattice(
    program: &Program,
    lattice: CapabilityLattice,
    options: &CheckOptions,
) -> Result<CheckedProgram, Vec<CheckError>> {
    let _span = info_span!(
        "coeffect_check",
        classes = program.classes.len(),
        decls = program.functions.len(),
        calls = program.calls.len()
    )
    .entered();

    // 1. Declaration table (class graph, lowering, duplicates)
    let (table, mut errors) = DeclarationTable::build(program, &lattice);

    // 2. Overrides
    match check_overrides(&table, &lattice, options.parallel) {
        Ok(found) => errors.extend(found),
        Err(fatal) => {
            errors.push(fatal);
            return Err(errors);
        }
    }

    // 3. Call sites
    match check_calls(&table, &lattice, &program.calls) {
        Ok(found) => errors.extend(found),
        Err(fatal) => {
            errors.push(fatal);
            return Err(errors);
        }
    }

    let error_count = errors.iter().filter(|e| e.is_error()).count();
    let warning_count = errors
        .iter()
        .filter(|e| e.severity == Severity::Warning)
        .count();
    info!(
        decls = table.len(),
        errors = error_count,
        warnings = warning_count,
        "coeffect check complete"
    );

    if error_count > 0 || (options.deny_warnings && warning_count > 0) {
        return Err(errors);
    }

    Ok(CheckedProgram {
        table,
        lattice,
        warnings: errors,
    })
}
