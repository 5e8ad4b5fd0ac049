//! Override checking.
//!
//! # What This Pass Does
//!
//! For every method with an ancestor declaration of the same name, checks
//! that the override never asks for more than the declaration it overrides:
//!
//! 1. **Context** - the override's context must be subsumed by the
//!    ancestor's, with `this` bound to the overriding class on both sides.
//!    Violations report [`ErrorKind::WidenedContext`].
//! 2. **Parameter mutability** - only checked when (1) passes. Each parameter
//!    position present in both must carry the same mutability, except that
//!    an ancestor `owned_mutable` may be overridden by `mutable`. Anything
//!    else reports [`ErrorKind::WidenedParameterCapability`].
//!
//! # Pairs, Not Chains
//!
//! A declaration is checked against the declarations it directly overrides:
//! for each direct supertype of its class, the nearest same-named
//! declaration along that supertype. `B extends A implements I` checks
//! `B::f` against both `A::f` and `I::f`. Every link of a chain
//! `E < D < C < B < A` is visited exactly once, from its deeper end, so one
//! widening link yields exactly one error.
//!
//! # Pipeline Position
//!
//! ```text
//! Manifest → Declaration Table → Override Check → Call-Site Check → Reflection
//!                                ^^^^^^^^^^^^^^
//!                                 YOU ARE HERE
//! ```

use super::contexts::{BindingEnv, Outcome, Resolver};
use super::table::{Declaration, DeclarationTable};
use crate::error::{CheckError, ErrorKind};
use coeffects_foundation::{CapabilityLattice, CapabilitySet, CapabilityTag};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Check every override in the table.
///
/// Declarations are independent; with `parallel` they are checked on the
/// rayon pool. Errors are returned in declaration order either way.
///
/// # Errors
///
/// Returns the fatal [`ErrorKind::IncomparableCapabilities`] error if the
/// lattice rejects a comparison. Recoverable errors are in the `Ok` vector.
pub fn check_overrides(
    table: &DeclarationTable,
    lattice: &CapabilityLattice,
    parallel: bool,
) -> Result<Vec<CheckError>, CheckError> {
    let resolver = Resolver::new(lattice, table.classes());
    let methods: Vec<&Declaration> = table.iter().filter(|d| d.is_method()).collect();

    let results: Vec<Result<Option<CheckError>, CheckError>> = if parallel {
        methods
            .par_iter()
            .map(|decl| check_declaration(table, &resolver, decl))
            .collect()
    } else {
        methods
            .iter()
            .map(|decl| check_declaration(table, &resolver, decl))
            .collect()
    };

    let mut errors = Vec::new();
    for result in results {
        if let Some(error) = result? {
            errors.push(error);
        }
    }
    Ok(errors)
}

/// Check one declaration against each declaration it directly overrides.
///
/// The first violation ends the check for this declaration.
fn check_declaration(
    table: &DeclarationTable,
    resolver: &Resolver<'_>,
    decl: &Declaration,
) -> Result<Option<CheckError>, CheckError> {
    for ancestor in table.immediate_overrides(&decl.id) {
        if let Some(error) = check_pair(resolver, decl, ancestor)? {
            return Ok(Some(error));
        }
    }
    Ok(None)
}

fn check_pair(
    resolver: &Resolver<'_>,
    decl: &Declaration,
    ancestor: &Declaration,
) -> Result<Option<CheckError>, CheckError> {
    debug!(decl = %decl.id, overrides = %ancestor.id, "checking override");

    let env = BindingEnv::within(decl.owner.clone());
    let required = match resolver.require(decl, &env) {
        Ok(required) => required,
        Err(unresolvable) => {
            return Ok(Some(CheckError::new(
                ErrorKind::UnresolvableContext,
                decl.span,
                decl.id.as_str(),
                unresolvable.to_string(),
            )))
        }
    };
    let provided = resolver.provide(ancestor, &env);

    let outcome = resolver.check(&required, &provided).map_err(|err| {
        CheckError::new(
            ErrorKind::IncomparableCapabilities,
            decl.span,
            decl.id.as_str(),
            err.to_string(),
        )
    })?;

    let widened = match outcome {
        Outcome::Satisfied => None,
        Outcome::Insufficient(tags) | Outcome::UnresolvedBound(tags) => Some(tags),
    };
    if let Some(tags) = widened {
        return Ok(Some(widened_context(decl, ancestor, tags)));
    }
    trace!(decl = %decl.id, overrides = %ancestor.id, "context narrows or matches");

    Ok(check_params(decl, ancestor))
}

fn widened_context(decl: &Declaration, ancestor: &Declaration, tags: CapabilitySet) -> CheckError {
    CheckError::new(
        ErrorKind::WidenedContext,
        decl.span,
        decl.id.as_str(),
        format!(
            "context {} of {} is wider than {} declared by {}",
            decl.context, decl.id, ancestor.context, ancestor.id
        ),
    )
    .with_tags(tags)
    .with_label(ancestor.span, format!("overrides {}", ancestor.id))
    .with_note(format!(
        "an override may only require capabilities its ancestor already requires; remove {}",
        tags
    ))
}

/// Compare parameter mutability position by position.
fn check_params(decl: &Declaration, ancestor: &Declaration) -> Option<CheckError> {
    decl.params
        .iter()
        .zip(&ancestor.params)
        .find(|(ours, theirs)| !mutability_compatible(theirs.mutability, ours.mutability))
        .map(|(ours, theirs)| {
            CheckError::new(
                ErrorKind::WidenedParameterCapability,
                decl.span,
                decl.id.as_str(),
                format!(
                    "parameter ${} is {} in {} but {} in {}",
                    ours.name, ours.mutability, decl.id, theirs.mutability, ancestor.id
                ),
            )
            .with_tags(CapabilitySet::single(ours.mutability))
            .with_label(ancestor.span, format!("overrides {}", ancestor.id))
        })
}

/// An override's parameter must match its ancestor's, except that an
/// `owned_mutable` parameter may be narrowed to `mutable`.
fn mutability_compatible(ancestor: CapabilityTag, override_: CapabilityTag) -> bool {
    ancestor == override_
        || (ancestor == CapabilityTag::OwnedMutable && override_ == CapabilityTag::Mutable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coeffects_ast::{ClassDecl, ContextAnnotation, CtxConstDecl, FunctionDecl, ParamDecl, Program};

    fn annotation(raw: &[&str]) -> ContextAnnotation {
        ContextAnnotation::parse(raw.iter().copied()).unwrap()
    }

    fn run(program: &Program) -> Vec<CheckError> {
        let lattice = CapabilityLattice::standard();
        let (table, errors) = DeclarationTable::build(program, &lattice);
        assert!(errors.is_empty(), "{:?}", errors);
        check_overrides(&table, &lattice, false).unwrap()
    }

    fn pair(ancestor: FunctionDecl, decl: FunctionDecl) -> Program {
        Program::new()
            .class(ClassDecl::new("A"))
            .class(ClassDecl::new("B").extends("A"))
            .function(ancestor)
            .function(decl)
    }

    #[test]
    fn test_narrowing_passes() {
        let program = pair(
            FunctionDecl::method("A", "f").with_contexts(annotation(&["defaults"])),
            FunctionDecl::method("B", "f").with_contexts(annotation(&["rx"])),
        );
        assert!(run(&program).is_empty());
    }

    #[test]
    fn test_widening_reported() {
        let program = pair(
            FunctionDecl::method("A", "f").with_contexts(annotation(&["rx"])),
            FunctionDecl::method("B", "f").with_contexts(annotation(&["io"])),
        );
        let errors = run(&program);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::WidenedContext);
        assert_eq!(errors[0].subject, "B::f");
        assert!(errors[0].tags.contains(CapabilityTag::Io));
    }

    #[test]
    fn test_unannotated_override_is_defaults() {
        let program = pair(
            FunctionDecl::method("A", "f").with_contexts(annotation(&["rx"])),
            FunctionDecl::method("B", "f"),
        );
        let errors = run(&program);
        assert_eq!(errors[0].kind, ErrorKind::WidenedContext);
    }

    #[test]
    fn test_owned_mutable_may_become_mutable() {
        let program = pair(
            FunctionDecl::method("A", "f").with_param(ParamDecl::new("a").with_capability("owned_mutable")),
            FunctionDecl::method("B", "f").with_param(ParamDecl::new("a").with_capability("mutable")),
        );
        assert!(run(&program).is_empty());
    }

    #[test]
    fn test_mutable_may_not_become_owned_mutable() {
        let program = pair(
            FunctionDecl::method("A", "f").with_param(ParamDecl::new("a").with_capability("mutable")),
            FunctionDecl::method("B", "f").with_param(ParamDecl::new("a").with_capability("owned_mutable")),
        );
        let errors = run(&program);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::WidenedParameterCapability);
    }

    #[test]
    fn test_context_violation_stops_before_params() {
        let program = pair(
            FunctionDecl::method("A", "f")
                .with_contexts(annotation(&["rx"]))
                .with_param(ParamDecl::new("a").with_capability("mutable")),
            FunctionDecl::method("B", "f")
                .with_contexts(annotation(&["defaults"]))
                .with_param(ParamDecl::new("a")),
        );
        let errors = run(&program);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::WidenedContext);
    }

    #[test]
    fn test_this_member_matches_symbolically() {
        let program = Program::new()
            .class(ClassDecl::new("A").abstract_class().with_ctx(CtxConstDecl::abstract_ctx("C")))
            .class(ClassDecl::new("B").extends("A").abstract_class())
            .function(FunctionDecl::method("A", "f").with_contexts(annotation(&["this::C"])))
            .function(FunctionDecl::method("B", "f").with_contexts(annotation(&["this::C"])));
        assert!(run(&program).is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let program = Program::new()
            .class(ClassDecl::new("A"))
            .class(ClassDecl::new("B").extends("A"))
            .class(ClassDecl::new("C").extends("B"))
            .function(FunctionDecl::method("A", "f").with_contexts(annotation(&["rx"])))
            .function(FunctionDecl::method("B", "f").with_contexts(annotation(&["defaults"])))
            .function(FunctionDecl::method("C", "f").with_contexts(annotation(&["rx"])));
        let lattice = CapabilityLattice::standard();
        let (table, _) = DeclarationTable::build(&program, &lattice);

        let sequential = check_overrides(&table, &lattice, false).unwrap();
        let parallel = check_overrides(&table, &lattice, true).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 1);
        assert_eq!(sequential[0].subject, "B::f");
    }
}
