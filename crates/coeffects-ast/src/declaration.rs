//! Function and method declarations.

use crate::annotation::ContextAnnotation;
use coeffects_foundation::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a declaration: `name` for functions, `Class::name` for methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(String);

impl DeclId {
    /// Identity of a free function.
    pub fn function(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Identity of a method.
    pub fn method(class: &str, name: &str) -> Self {
        Self(format!("{}::{}", class, name))
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeclId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static type hint of a parameter, as far as the checker cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeHint {
    /// Untyped or otherwise unknown
    #[default]
    Dynamic,
    /// An instance of a class
    Class { name: String },
    /// A function type with its own context list, e.g. `(function()[_]: void)`
    Function {
        #[serde(default)]
        contexts: ContextAnnotation,
    },
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    /// Name without the leading `$`
    pub name: String,
    /// Static type hint
    #[serde(default)]
    pub ty: TypeHint,
    /// Mutability annotation as written (`mutable`, `owned_mutable`, ...)
    #[serde(default)]
    pub capability: Option<String>,
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Unqualified name
    pub name: String,
    /// Declaring class for methods
    #[serde(default)]
    pub owner: Option<String>,
    /// Parameters in positional order
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// Context annotation
    #[serde(default)]
    pub contexts: ContextAnnotation,
    /// Declaration site
    #[serde(default)]
    pub span: Span,
}

impl FunctionDecl {
    /// A free function with no parameters and no annotation.
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            params: Vec::new(),
            contexts: ContextAnnotation::Unspecified,
            span: Span::unknown(),
        }
    }

    /// A method with no parameters and no annotation.
    pub fn method(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::function(name)
        }
    }

    /// Set the context annotation.
    pub fn with_contexts(mut self, contexts: ContextAnnotation) -> Self {
        self.contexts = contexts;
        self
    }

    /// Append a parameter.
    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    /// Identity of this declaration.
    pub fn id(&self) -> DeclId {
        match &self.owner {
            Some(owner) => DeclId::method(owner, &self.name),
            None => DeclId::function(&self.name),
        }
    }

    /// Find a parameter by name.
    pub fn param(&self, name: &str) -> Option<(usize, &ParamDecl)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }
}

impl ParamDecl {
    /// An untyped, unannotated parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: TypeHint::Dynamic,
            capability: None,
        }
    }

    /// Set the type hint.
    pub fn typed(mut self, ty: TypeHint) -> Self {
        self.ty = ty;
        self
    }

    /// Set the mutability annotation.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_ids() {
        assert_eq!(FunctionDecl::function("pure").id().as_str(), "pure");
        assert_eq!(FunctionDecl::method("A", "f").id().as_str(), "A::f");
    }

    #[test]
    fn test_param_lookup() {
        let decl = FunctionDecl::method("C", "f")
            .with_param(ParamDecl::new("x1"))
            .with_param(ParamDecl::new("x2"));
        assert_eq!(decl.param("x2").map(|(i, _)| i), Some(1));
        assert!(decl.param("x3").is_none());
    }

    #[test]
    fn test_deserialize_minimal_method() {
        let json = r#"{
            "name": "f",
            "owner": "B",
            "params": [{ "name": "a", "ty": { "kind": "class", "name": "A" }, "capability": "mutable" }],
            "contexts": ["rx"]
        }"#;
        let decl: FunctionDecl = serde_json::from_str(json).unwrap();
        assert_eq!(decl.id().as_str(), "B::f");
        assert_eq!(decl.params[0].capability.as_deref(), Some("mutable"));
        assert_eq!(decl.params[0].ty, TypeHint::Class { name: "A".into() });
        assert!(decl.contexts.is_specified());
    }

    #[test]
    fn test_deserialize_unannotated_function() {
        let decl: FunctionDecl = serde_json::from_str(r#"{ "name": "h" }"#).unwrap();
        assert!(!decl.contexts.is_specified());
        assert!(decl.owner.is_none());
    }
}
