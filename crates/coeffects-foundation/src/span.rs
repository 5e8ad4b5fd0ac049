//! Source location tracking for diagnostics.
//!
//! The checker never sees source text; locations arrive pre-computed from the
//! parser collaborator as `(file, line, column)` triples.
//!
//! # Design
//!
//! - `Span` - compact source location
//! - `SourceMap` - file table used to turn a `Span` into a printable path
//!
//! # Examples
//!
//! ```
//! # use coeffects_foundation::span::*;
//! # use std::path::PathBuf;
//! let mut map = SourceMap::new();
//! let file_id = map.add_file(PathBuf::from("cc-this.php"));
//! let span = Span::new(file_id, 5, 3);
//!
//! assert_eq!(map.file_path(&span).and_then(|p| p.to_str()), Some("cc-this.php"));
//! assert_eq!(map.describe(&span), "cc-this.php:5:3");
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compact source location reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index into `SourceMap` files
    pub file_id: u16,
    /// 1-based line, 0 when unknown
    pub line: u32,
    /// 1-based column, 0 when unknown
    pub column: u32,
}

/// Table of all source files that contributed declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<PathBuf>,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, line: u32, column: u32) -> Self {
        Self {
            file_id,
            line,
            column,
        }
    }

    /// A span with no known location.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Check if this span carries a real location.
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl SourceMap {
    /// File ID of files that did not fit in the map.
    pub const OVERFLOW_ID: u16 = u16::MAX;

    /// Create an empty source map.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Add a source file and return its ID.
    ///
    /// Adding the same path twice returns the existing ID. Once the map is
    /// full, further files are not registered and get [`Self::OVERFLOW_ID`],
    /// which renders as an unknown file.
    pub fn add_file(&mut self, path: PathBuf) -> u16 {
        if let Some(existing) = self.files.iter().position(|p| *p == path) {
            return existing as u16;
        }
        match u16::try_from(self.files.len()) {
            Ok(file_id) if file_id < Self::OVERFLOW_ID => {
                self.files.push(path);
                file_id
            }
            _ => Self::OVERFLOW_ID,
        }
    }

    /// Get the file path for a span, if the file is registered.
    pub fn file_path(&self, span: &Span) -> Option<&Path> {
        self.files.get(span.file_id as usize).map(PathBuf::as_path)
    }

    /// Render a span as `path:line:column`.
    pub fn describe(&self, span: &Span) -> String {
        let path = self
            .file_path(span)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        format!("{}:{}:{}", path, span.line, span.column)
    }

    /// Get the number of files in this map.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
