// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Input model for the coeffect checker
//!
//! This crate contains the data the checker consumes from its collaborators
//! (class hierarchy, declarations with raw annotations, call graph) and the
//! [`ContextSet`] type with its normalization and subsumption rules.

pub mod annotation;
pub mod callgraph;
pub mod context;
pub mod declaration;
pub mod hierarchy;
pub mod program;

// Re-export commonly used types
pub use annotation::{ContextAnnotation, ContextToken, TokenError};
pub use callgraph::{ArgType, CallSite, CallTarget};
pub use context::{is_subset_or_equal, normalize, ContextRef, ContextSet, Subsumption};
pub use declaration::{DeclId, FunctionDecl, ParamDecl, TypeHint};
pub use hierarchy::{ClassDecl, CtxConstDecl};
pub use program::Program;

pub use coeffects_foundation as foundation;
