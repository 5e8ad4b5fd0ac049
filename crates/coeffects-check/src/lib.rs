// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Static coeffect checking
//!
//! This crate builds the declaration table of a program, checks every
//! override and call site against the capability lattice, and serves
//! reflection queries over the result.

pub mod error;
pub mod reflection;
pub mod resolve;

pub use error::{CheckError, DiagnosticFormatter, ErrorKind, Severity};
pub use reflection::{ReflectionView, ResolvedContext};
pub use resolve::contexts::{Binding, BindingEnv, Resolver};
pub use resolve::hierarchy::ClassGraph;
pub use resolve::pipeline::{check, check_with_lattice, CheckOptions, CheckedProgram};
pub use resolve::table::{Declaration, DeclarationTable, Param};
