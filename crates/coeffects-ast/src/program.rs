//! The complete input handed to the checker.

use crate::callgraph::CallSite;
use crate::declaration::FunctionDecl;
use crate::hierarchy::ClassDecl;
use coeffects_foundation::SourceMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classes, declarations and call sites of one program.
///
/// `Span::file_id` values index into `files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Source files, indexed by `Span::file_id`
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Class hierarchy
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
    /// Functions and methods
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    /// Call graph
    #[serde(default)]
    pub calls: Vec<CallSite>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class.
    pub fn class(mut self, class: ClassDecl) -> Self {
        self.classes.push(class);
        self
    }

    /// Add a function or method.
    pub fn function(mut self, function: FunctionDecl) -> Self {
        self.functions.push(function);
        self
    }

    /// Add a call site.
    pub fn call(mut self, call: CallSite) -> Self {
        self.calls.push(call);
        self
    }

    /// Build the source map for diagnostics.
    pub fn source_map(&self) -> SourceMap {
        let mut map = SourceMap::new();
        for file in &self.files {
            map.add_file(file.clone());
        }
        map
    }
}
