//! Lowering of written context annotations into context sets.
//!
//! Annotations arrive as token lists (`["rx", "this::C", "ctx $f"]`). This
//! module turns them into a normalized [`ContextSet`], separating capability
//! tags from symbolic references.
//!
//! Unknown tag names never fail lowering: they are collected in
//! [`Lowered::unknown`] so the caller can report them and continue with the
//! remaining tags.

use coeffects_ast::{ContextAnnotation, ContextRef, ContextSet, ContextToken};
use coeffects_foundation::{CapabilityLattice, CapabilitySet, CapabilityTag, Family};

/// Result of lowering one token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lowered {
    /// Normalized context (concrete or symbolic)
    pub context: ContextSet,
    /// The list contains the `_` wildcard
    pub has_wildcard: bool,
    /// Tag names the lattice does not define
    pub unknown: Vec<String>,
    /// Known tags outside the effect family (`mutable` in a context list)
    pub misplaced: Vec<CapabilityTag>,
}

/// Why a parameter mutability annotation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutabilityError {
    /// Not a capability name at all
    Unknown(String),
    /// A capability, but not a mutability one
    WrongFamily(CapabilityTag),
}

/// Lower a token list.
///
/// Tags are collected and normalized, references kept in written order
/// (duplicates removed). The wildcard contributes nothing to the set.
pub fn lower_tokens(lattice: &CapabilityLattice, tokens: &[ContextToken]) -> Lowered {
    let mut tags = CapabilitySet::empty();
    let mut refs: Vec<ContextRef> = Vec::new();
    let mut has_wildcard = false;
    let mut unknown = Vec::new();
    let mut misplaced = Vec::new();

    for token in tokens {
        let reference = match token {
            ContextToken::Tag(name) => {
                match CapabilityTag::from_name(name) {
                    Some(tag) if tag.family() == Family::Effect => tags = tags.with(tag),
                    Some(tag) => misplaced.push(tag),
                    None => unknown.push(name.clone()),
                }
                continue;
            }
            ContextToken::Wildcard => {
                has_wildcard = true;
                continue;
            }
            ContextToken::ThisMember(member) => ContextRef::ThisMember {
                member: member.clone(),
            },
            ContextToken::ParamMember { param, member } => ContextRef::ParamMember {
                param: param.clone(),
                member: member.clone(),
            },
            ContextToken::ParamContext(param) => ContextRef::ParamContext {
                param: param.clone(),
            },
        };
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }

    Lowered {
        context: ContextSet::new(lattice, tags, refs),
        has_wildcard,
        unknown,
        misplaced,
    }
}

/// Lower a declaration annotation; an absent annotation is `Inferred`.
pub fn lower_annotation(lattice: &CapabilityLattice, annotation: &ContextAnnotation) -> Lowered {
    match annotation {
        ContextAnnotation::Unspecified => Lowered {
            context: ContextSet::Inferred,
            has_wildcard: false,
            unknown: Vec::new(),
            misplaced: Vec::new(),
        },
        ContextAnnotation::Listed(tokens) => lower_tokens(lattice, tokens),
    }
}

/// Capability tags of a token list, ignoring references and the wildcard.
pub fn lower_tags(lattice: &CapabilityLattice, tokens: &[ContextToken]) -> CapabilitySet {
    lower_tokens(lattice, tokens).context.concrete_tags()
}

/// Lower a token list that may only contain tags (bounds, constant values).
///
/// References and the wildcard make the list unknowable statically, so the
/// result widens to `defaults`.
pub fn lower_concrete(lattice: &CapabilityLattice, tokens: &[ContextToken]) -> CapabilitySet {
    let lowered = lower_tokens(lattice, tokens);
    if lowered.has_wildcard || lowered.context.is_symbolic() {
        CapabilitySet::single(CapabilityTag::Defaults)
    } else {
        lowered.context.concrete_tags()
    }
}

/// Parse a parameter mutability annotation; absent means `immutable`.
pub fn lower_mutability(raw: Option<&str>) -> Result<CapabilityTag, MutabilityError> {
    let Some(raw) = raw else {
        return Ok(CapabilityTag::Immutable);
    };
    let tag = CapabilityTag::from_name(raw).ok_or_else(|| MutabilityError::Unknown(raw.into()))?;
    if tag.family() == Family::Mutability {
        Ok(tag)
    } else {
        Err(MutabilityError::WrongFamily(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<ContextToken> {
        raw.iter().map(|t| t.parse().unwrap()).collect()
    }

    #[test]
    fn test_lower_concrete_tags_normalizes() {
        let lattice = CapabilityLattice::standard();
        let lowered = lower_tokens(&lattice, &tokens(&["rx", "rx_local", "pure"]));
        assert_eq!(
            lowered.context,
            ContextSet::Concrete {
                tags: CapabilitySet::single(CapabilityTag::RxLocal)
            }
        );
        assert!(lowered.unknown.is_empty());
    }

    #[test]
    fn test_lower_mixed_is_symbolic() {
        let lattice = CapabilityLattice::standard();
        let lowered = lower_tokens(&lattice, &tokens(&["this::C", "io", "ctx $f", "this::C"]));
        assert_eq!(lowered.context.concrete_tags(), CapabilitySet::single(CapabilityTag::Io));
        assert_eq!(lowered.context.refs().len(), 2);
    }

    #[test]
    fn test_unknown_tags_collected_and_dropped() {
        let lattice = CapabilityLattice::standard();
        let lowered = lower_tokens(&lattice, &tokens(&["lol", "io"]));
        assert_eq!(lowered.unknown, vec!["lol".to_string()]);
        assert_eq!(lowered.context.concrete_tags(), CapabilitySet::single(CapabilityTag::Io));
    }

    #[test]
    fn test_mutability_tags_are_misplaced_in_contexts() {
        let lattice = CapabilityLattice::standard();
        let lowered = lower_tokens(&lattice, &tokens(&["mutable", "rx"]));
        assert_eq!(lowered.misplaced, vec![CapabilityTag::Mutable]);
        assert_eq!(lowered.context.concrete_tags(), CapabilitySet::single(CapabilityTag::Rx));
    }

    #[test]
    fn test_wildcard_widens_concrete_lowering() {
        let lattice = CapabilityLattice::standard();
        let lowered = lower_tokens(&lattice, &tokens(&["_"]));
        assert!(lowered.has_wildcard);
        assert_eq!(
            lower_concrete(&lattice, &tokens(&["_"])),
            CapabilitySet::single(CapabilityTag::Defaults)
        );
    }

    #[test]
    fn test_unspecified_is_inferred() {
        let lattice = CapabilityLattice::standard();
        let lowered = lower_annotation(&lattice, &ContextAnnotation::Unspecified);
        assert_eq!(lowered.context, ContextSet::Inferred);
    }

    #[test]
    fn test_mutability() {
        assert_eq!(lower_mutability(None), Ok(CapabilityTag::Immutable));
        assert_eq!(lower_mutability(Some("owned")), Ok(CapabilityTag::OwnedMutable));
        assert_eq!(lower_mutability(Some("mutable")), Ok(CapabilityTag::Mutable));
        assert_eq!(
            lower_mutability(Some("rx")),
            Err(MutabilityError::WrongFamily(CapabilityTag::Rx))
        );
        assert!(matches!(
            lower_mutability(Some("frozen")),
            Err(MutabilityError::Unknown(_))
        ));
    }
}
