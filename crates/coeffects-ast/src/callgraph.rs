//! Call sites as delivered by the type resolver collaborator.
//!
//! Each call site carries whatever static type information the resolver
//! could establish; anything it could not is `Dynamic`.

use crate::annotation::{ContextAnnotation, ContextToken};
use crate::declaration::DeclId;
use coeffects_foundation::Span;
use serde::{Deserialize, Serialize};

/// What a call expression invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallTarget {
    /// Statically known callee
    Static { callee: DeclId },
    /// Callee reached through an untyped value; only an upper bound of its
    /// context is known (`defaults` when absent)
    Dynamic {
        #[serde(default)]
        upper_bound: Option<Vec<ContextToken>>,
    },
    /// Invocation of one of the caller's own higher-order parameters
    Parameter { name: String },
}

/// Static type of a receiver or argument expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgType {
    /// No static type available
    #[default]
    Dynamic,
    /// The caller's own `$this`
    This,
    /// An instance of a known class
    Class { name: String },
    /// A function value with a known context list
    Function {
        #[serde(default)]
        contexts: ContextAnnotation,
    },
}

/// One call expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Enclosing declaration
    pub caller: DeclId,
    /// What is invoked
    pub target: CallTarget,
    /// Static type of the receiver for method calls
    #[serde(default)]
    pub receiver: ArgType,
    /// Static types of the positional arguments
    #[serde(default)]
    pub args: Vec<ArgType>,
    /// Call expression site
    #[serde(default)]
    pub span: Span,
}

impl CallSite {
    /// A call to a statically known callee with no receiver or arguments.
    pub fn to_static(caller: DeclId, callee: DeclId) -> Self {
        Self {
            caller,
            target: CallTarget::Static { callee },
            receiver: ArgType::Dynamic,
            args: Vec::new(),
            span: Span::unknown(),
        }
    }

    /// A call through a dynamic value.
    pub fn to_dynamic(caller: DeclId, upper_bound: Option<Vec<ContextToken>>) -> Self {
        Self {
            target: CallTarget::Dynamic { upper_bound },
            ..Self::to_static(caller.clone(), caller)
        }
    }

    /// A call of the caller's own higher-order parameter.
    pub fn to_parameter(caller: DeclId, name: impl Into<String>) -> Self {
        Self {
            target: CallTarget::Parameter { name: name.into() },
            ..Self::to_static(caller.clone(), caller)
        }
    }

    /// Set the receiver type.
    pub fn on(mut self, receiver: ArgType) -> Self {
        self.receiver = receiver;
        self
    }

    /// Append an argument type.
    pub fn with_arg(mut self, arg: ArgType) -> Self {
        self.args.push(arg);
        self
    }

    /// Human-readable description used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.target {
            CallTarget::Static { callee } => format!("call to {} in {}", callee, self.caller),
            CallTarget::Dynamic { .. } => format!("dynamic call in {}", self.caller),
            CallTarget::Parameter { name } => format!("call to ${} in {}", name, self.caller),
        }
    }
}

impl ArgType {
    /// An instance of `name`.
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into() }
    }
}
