//! Class declarations as delivered by the hierarchy collaborator.
//!
//! Only what the coeffect checker needs is modelled: inheritance edges and
//! context constants (`const ctx C = [...]`).

use crate::annotation::ContextToken;
use coeffects_foundation::Span;
use serde::{Deserialize, Serialize};

/// A class or interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Class name, unique across the program
    pub name: String,
    /// Parent class, if any
    #[serde(default)]
    pub parent: Option<String>,
    /// Implemented (or, for interfaces, extended) interfaces
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Declared `abstract`
    #[serde(default)]
    pub is_abstract: bool,
    /// Declared as an interface
    #[serde(default)]
    pub is_interface: bool,
    /// Context constants declared directly on this class
    #[serde(default)]
    pub ctx_consts: Vec<CtxConstDecl>,
    /// Declaration site
    #[serde(default)]
    pub span: Span,
}

/// A context constant, `const ctx C = [...]`.
///
/// - concrete: `is_abstract == false`, `value` set
/// - abstract with default: `is_abstract == true`, `value` set
/// - abstract: `is_abstract == true`, `value` absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtxConstDecl {
    /// Constant name
    pub name: String,
    /// Assigned (or default) context list
    #[serde(default)]
    pub value: Option<Vec<ContextToken>>,
    /// Declared `abstract`
    #[serde(default)]
    pub is_abstract: bool,
    /// `as [...]`: the most any override may require
    #[serde(default)]
    pub upper_bound: Option<Vec<ContextToken>>,
    /// `super [...]`: the least any override provides
    #[serde(default)]
    pub lower_bound: Option<Vec<ContextToken>>,
}

impl ClassDecl {
    /// Create a class with no parents and no context constants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_interface: false,
            ctx_consts: Vec::new(),
            span: Span::unknown(),
        }
    }

    /// Set the parent class.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add an implemented interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Mark the class abstract.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the class as an interface.
    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    /// Add a context constant.
    pub fn with_ctx(mut self, ctx: CtxConstDecl) -> Self {
        self.ctx_consts.push(ctx);
        self
    }

    /// Look up a context constant declared directly on this class.
    pub fn ctx_const(&self, name: &str) -> Option<&CtxConstDecl> {
        self.ctx_consts.iter().find(|c| c.name == name)
    }

    /// Direct supertypes: parent first, then interfaces in declaration order.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.parent
            .iter()
            .chain(self.interfaces.iter())
            .map(String::as_str)
    }
}

impl CtxConstDecl {
    /// `const ctx NAME = value;`
    pub fn concrete(name: impl Into<String>, value: Vec<ContextToken>) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            is_abstract: false,
            upper_bound: None,
            lower_bound: None,
        }
    }

    /// `abstract const ctx NAME;`
    pub fn abstract_ctx(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            is_abstract: true,
            upper_bound: None,
            lower_bound: None,
        }
    }

    /// `abstract const ctx NAME = default;`
    pub fn abstract_with_default(name: impl Into<String>, default: Vec<ContextToken>) -> Self {
        Self {
            value: Some(default),
            ..Self::abstract_ctx(name)
        }
    }

    /// Add an `as` bound.
    pub fn with_upper_bound(mut self, bound: Vec<ContextToken>) -> Self {
        self.upper_bound = Some(bound);
        self
    }

    /// Add a `super` bound.
    pub fn with_lower_bound(mut self, bound: Vec<ContextToken>) -> Self {
        self.lower_bound = Some(bound);
        self
    }

    /// Check whether this constant supplies a non-default value.
    pub fn is_concrete(&self) -> bool {
        !self.is_abstract && self.value.is_some()
    }
}
