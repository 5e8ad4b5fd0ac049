//! Raw context annotations as delivered by the parser collaborator.
//!
//! An annotation is the bracketed list after a parameter list, e.g.
//! `[$x1::C, ctx $x2, this::C, IO]`. Each element is a [`ContextToken`].
//! Tokens are kept verbatim (tag names are not validated here) so that
//! reflection can echo exactly what was written.
//!
//! # Token Syntax
//!
//! | Written      | Token                                  |
//! |--------------|----------------------------------------|
//! | `rx`         | `Tag("rx")`                            |
//! | `this::C`    | `ThisMember("C")`                      |
//! | `$x::C`      | `ParamMember { param: "x", member: "C" }` |
//! | `ctx $f`     | `ParamContext("f")`                    |
//! | `_`          | `Wildcard` (function types only)       |
//!
//! # Examples
//!
//! ```
//! # use coeffects_ast::annotation::ContextToken;
//! let token: ContextToken = "ctx $f".parse().unwrap();
//! assert_eq!(token, ContextToken::ParamContext("f".to_string()));
//! assert_eq!(token.to_string(), "ctx $f");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Malformed annotation token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed context token '{0}'")]
pub struct TokenError(pub String);

/// One element of a context list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContextToken {
    /// A capability tag by name (validated later against the lattice)
    Tag(String),
    /// `this::C`
    ThisMember(String),
    /// `$param::C`
    ParamMember { param: String, member: String },
    /// `ctx $param`
    ParamContext(String),
    /// `_`, the polymorphic placeholder inside function types
    Wildcard,
}

/// A declaration's context annotation.
///
/// `Unspecified` (no brackets at all) is distinct from `Listed(vec![])`
/// (empty brackets, i.e. pure).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<ContextToken>>", into = "Option<Vec<ContextToken>>")]
pub enum ContextAnnotation {
    /// No annotation; the declaration runs with inferred defaults
    #[default]
    Unspecified,
    /// Explicit context list
    Listed(Vec<ContextToken>),
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn param_name(s: &str) -> Option<&str> {
    let name = s.strip_prefix('$')?;
    is_ident(name).then_some(name)
}

impl FromStr for ContextToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || TokenError(s.to_string());

        if s == "_" {
            return Ok(Self::Wildcard);
        }

        if let Some(rest) = s.strip_prefix("ctx ") {
            return param_name(rest.trim())
                .map(|p| Self::ParamContext(p.to_string()))
                .ok_or_else(malformed);
        }

        if let Some((root, member)) = s.split_once("::") {
            if !is_ident(member) {
                return Err(malformed());
            }
            if root == "this" {
                return Ok(Self::ThisMember(member.to_string()));
            }
            return param_name(root)
                .map(|p| Self::ParamMember {
                    param: p.to_string(),
                    member: member.to_string(),
                })
                .ok_or_else(malformed);
        }

        if is_ident(s) {
            Ok(Self::Tag(s.to_string()))
        } else {
            Err(malformed())
        }
    }
}

impl TryFrom<String> for ContextToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContextToken> for String {
    fn from(token: ContextToken) -> Self {
        token.to_string()
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(name) => f.write_str(name),
            Self::ThisMember(member) => write!(f, "this::{}", member),
            Self::ParamMember { param, member } => write!(f, "${}::{}", param, member),
            Self::ParamContext(param) => write!(f, "ctx ${}", param),
            Self::Wildcard => f.write_str("_"),
        }
    }
}

impl ContextAnnotation {
    /// Build an annotation from written tokens.
    ///
    /// # Errors
    ///
    /// Returns the first malformed token.
    pub fn parse<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, TokenError> {
        let tokens = tokens
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Listed(tokens))
    }

    /// Tokens as written; empty when unspecified.
    pub fn tokens(&self) -> &[ContextToken] {
        match self {
            Self::Unspecified => &[],
            Self::Listed(tokens) => tokens,
        }
    }

    /// Check whether the annotation was written at all.
    pub fn is_specified(&self) -> bool {
        matches!(self, Self::Listed(_))
    }
}

impl From<Option<Vec<ContextToken>>> for ContextAnnotation {
    fn from(value: Option<Vec<ContextToken>>) -> Self {
        match value {
            None => Self::Unspecified,
            Some(tokens) => Self::Listed(tokens),
        }
    }
}

impl From<ContextAnnotation> for Option<Vec<ContextToken>> {
    fn from(value: ContextAnnotation) -> Self {
        match value {
            ContextAnnotation::Unspecified => None,
            ContextAnnotation::Listed(tokens) => Some(tokens),
        }
    }
}

impl fmt::Display for ContextAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => f.write_str("<unspecified>"),
            Self::Listed(tokens) => {
                let parts: Vec<_> = tokens.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_form() {
        assert_eq!(
            "rx".parse::<ContextToken>().unwrap(),
            ContextToken::Tag("rx".into())
        );
        assert_eq!(
            "this::C".parse::<ContextToken>().unwrap(),
            ContextToken::ThisMember("C".into())
        );
        assert_eq!(
            "$x1::C".parse::<ContextToken>().unwrap(),
            ContextToken::ParamMember {
                param: "x1".into(),
                member: "C".into()
            }
        );
        assert_eq!(
            "ctx $x2".parse::<ContextToken>().unwrap(),
            ContextToken::ParamContext("x2".into())
        );
        assert_eq!("_".parse::<ContextToken>().unwrap(), ContextToken::Wildcard);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("ctx f".parse::<ContextToken>().is_err());
        assert!("$::C".parse::<ContextToken>().is_err());
        assert!("this::".parse::<ContextToken>().is_err());
        assert!("rx local".parse::<ContextToken>().is_err());
        assert!("".parse::<ContextToken>().is_err());
    }

    #[test]
    fn test_display_matches_written_form() {
        let written = ["$x1::C", "ctx $x2", "this::C", "IO"];
        let annotation = ContextAnnotation::parse(written).unwrap();
        assert_eq!(annotation.to_string(), "[$x1::C, ctx $x2, this::C, IO]");
    }

    #[test]
    fn test_unspecified_vs_empty() {
        let empty = ContextAnnotation::parse([]).unwrap();
        assert!(empty.is_specified());
        assert!(empty.tokens().is_empty());
        assert!(!ContextAnnotation::Unspecified.is_specified());
    }

    #[test]
    fn test_serde_uses_written_form() {
        let annotation: ContextAnnotation =
            serde_json::from_str(r#"["rx", "ctx $f", "this::C"]"#).unwrap();
        assert_eq!(annotation.tokens().len(), 3);

        let unspecified: ContextAnnotation = serde_json::from_str("null").unwrap();
        assert_eq!(unspecified, ContextAnnotation::Unspecified);

        let json = serde_json::to_string(&annotation).unwrap();
        assert_eq!(json, r#"["rx","ctx $f","this::C"]"#);
    }

    #[test]
    fn test_serde_rejects_malformed_token() {
        let result: Result<ContextAnnotation, _> = serde_json::from_str(r#"["ctx f"]"#);
        assert!(result.is_err());
    }
}
