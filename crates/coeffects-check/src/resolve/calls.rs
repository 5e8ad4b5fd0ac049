//! Call-site checking.
//!
//! # What This Pass Does
//!
//! For every call in the call graph, verifies that the caller's declared
//! context provides everything the callee requires:
//!
//! - **Static callee** - the callee's context is resolved under the receiver
//!   and argument types of the call; the caller's context is resolved in its
//!   own environment. Missing exact tags report
//!   [`ErrorKind::InsufficientCapability`]; missing tags that only come from
//!   a dynamic binding's upper bound report
//!   [`ErrorKind::UnresolvedDynamicCapability`]; a static receiver whose
//!   member is abstract reports [`ErrorKind::UnresolvableContext`].
//! - **Dynamic callee** - the caller must provide the call's upper bound
//!   (`defaults` when unknown).
//! - **Parameter callee** - calling `$f` is free when the caller declares
//!   `ctx $f`; otherwise the parameter's function-type context is required.
//!
//! # Pipeline Position
//!
//! ```text
//! Manifest → Declaration Table → Override Check → Call-Site Check → Reflection
//!                                                 ^^^^^^^^^^^^^^^
//!                                                  YOU ARE HERE
//! ```

use super::contexts::{BindingEnv, Outcome, Resolver};
use super::table::DeclarationTable;
use crate::error::{CheckError, ErrorKind};
use coeffects_ast::{CallSite, CallTarget, DeclId};
use coeffects_foundation::CapabilityLattice;
use tracing::{debug, trace};

/// Check every call site.
///
/// # Errors
///
/// Returns the fatal [`ErrorKind::IncomparableCapabilities`] error if the
/// lattice rejects a comparison. Recoverable errors are in the `Ok` vector.
pub fn check_calls(
    table: &DeclarationTable,
    lattice: &CapabilityLattice,
    calls: &[CallSite],
) -> Result<Vec<CheckError>, CheckError> {
    let resolver = Resolver::new(lattice, table.classes());
    let mut errors = Vec::new();

    for site in calls {
        debug!(call = %site.describe(), "checking call site");
        if let Some(error) = check_call(table, &resolver, site)? {
            errors.push(error);
        }
    }

    Ok(errors)
}

fn check_call(
    table: &DeclarationTable,
    resolver: &Resolver<'_>,
    site: &CallSite,
) -> Result<Option<CheckError>, CheckError> {
    let subject = site.describe();
    let Some(caller) = table.get(&site.caller) else {
        return Ok(Some(unknown_declaration(site, &site.caller, &subject)));
    };

    let required = match &site.target {
        CallTarget::Static { callee } => {
            let Some(callee) = table.get(callee) else {
                return Ok(Some(unknown_declaration(site, callee, &subject)));
            };
            match resolver.require(callee, &BindingEnv::call(caller, site)) {
                Ok(required) => required,
                Err(unresolvable) => {
                    return Ok(Some(
                        CheckError::new(
                            ErrorKind::UnresolvableContext,
                            site.span,
                            subject,
                            unresolvable.to_string(),
                        )
                        .with_label(callee.span, format!("{} declared here", callee.id)),
                    ))
                }
            }
        }
        CallTarget::Dynamic { upper_bound } => resolver.require_dynamic(upper_bound.as_deref()),
        CallTarget::Parameter { name } => match resolver.require_parameter(caller, name) {
            Some(required) => required,
            None => {
                return Ok(Some(CheckError::new(
                    ErrorKind::UnknownDeclaration,
                    site.span,
                    subject,
                    format!("{} has no parameter ${}", caller.id, name),
                )))
            }
        },
    };

    let provided = resolver.provide(caller, &BindingEnv::own(caller));
    let outcome = resolver.check(&required, &provided).map_err(|err| {
        CheckError::new(
            ErrorKind::IncomparableCapabilities,
            site.span,
            subject.as_str(),
            err.to_string(),
        )
    })?;

    let error = match outcome {
        Outcome::Satisfied => {
            trace!(call = %subject, "satisfied");
            return Ok(None);
        }
        Outcome::Insufficient(missing) => CheckError::new(
            ErrorKind::InsufficientCapability,
            site.span,
            subject.as_str(),
            format!(
                "{} requires {} which {} (context {}) does not provide",
                target_name(site),
                missing,
                caller.id,
                caller.context
            ),
        )
        .with_tags(missing),
        Outcome::UnresolvedBound(missing) => CheckError::new(
            ErrorKind::UnresolvedDynamicCapability,
            site.span,
            subject.as_str(),
            format!(
                "{} may require up to {} which {} (context {}) does not provide",
                target_name(site),
                missing,
                caller.id,
                caller.context
            ),
        )
        .with_tags(missing)
        .with_note("give the receiver or argument a static type to check it exactly".to_string()),
    };

    Ok(Some(
        error.with_label(caller.span, format!("{} declared here", caller.id)),
    ))
}

fn target_name(site: &CallSite) -> String {
    match &site.target {
        CallTarget::Static { callee } => callee.to_string(),
        CallTarget::Dynamic { .. } => "dynamic callee".to_string(),
        CallTarget::Parameter { name } => format!("${}", name),
    }
}

fn unknown_declaration(site: &CallSite, id: &DeclId, subject: &str) -> CheckError {
    CheckError::new(
        ErrorKind::UnknownDeclaration,
        site.span,
        subject,
        format!("no declaration named '{}'", id),
    )
}
