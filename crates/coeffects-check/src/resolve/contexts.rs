//! Resolution of symbolic contexts against a binding environment.
//!
//! A declaration such as `f(A $x)[this::C, $x::D, ctx $g, io]` has a context
//! that only becomes concrete once it is known what `this`, `$x` and `$g`
//! are. This module resolves such contexts from two sides:
//!
//! - **Requiring side** ([`Resolver::require`]): the callee of a call, or the
//!   override in an override check. References resolve to concrete values
//!   where the binding is static, to the reference's **upper bound** (marked
//!   deferred) where it is dynamic, and stay symbolic (with an upper-bound
//!   fallback) where they name the provider's own `this` or parameters.
//! - **Providing side** ([`Resolver::provide`]): the caller, or the ancestor
//!   in an override check. References resolve to their **lower bound** and
//!   are retained so an identical reference on the requiring side is
//!   satisfied symbolically.
//!
//! # Binding Environments
//!
//! ```text
//! own environment     this = self_class (symbolic), params = declared hints (symbolic)
//! call environment    this = receiver type, params = argument types
//! ```
//!
//! References to parameters are matched by position, so an override that
//! renames `$x` to `$y` still matches `$x::C` against `$y::C`.
//!
//! # Member Values
//!
//! A constant value that itself contains references or `_` cannot be known
//! statically: it widens to `defaults` when required and contributes only its
//! tags when provided.

use super::annotations::{lower_concrete, lower_tags, lower_tokens};
use super::hierarchy::{ClassGraph, MemberLookup};
use super::table::{Declaration, Param};
use coeffects_ast::{
    is_subset_or_equal, normalize, ArgType, CallSite, ContextAnnotation, ContextRef, ContextSet,
    ContextToken, TypeHint,
};
use coeffects_foundation::{CapabilityLattice, CapabilitySet, CapabilityTag, LatticeError};
use std::fmt;

/// What a receiver or argument is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The environment's own `$this`
    This,
    /// An instance of a known class
    Class(String),
    /// A function value with a known context list
    Function(ContextAnnotation),
    /// Nothing static is known
    Dynamic,
}

impl From<&ArgType> for Binding {
    fn from(ty: &ArgType) -> Self {
        match ty {
            ArgType::Dynamic => Self::Dynamic,
            ArgType::This => Self::This,
            ArgType::Class { name } => Self::Class(name.clone()),
            ArgType::Function { contexts } => Self::Function(contexts.clone()),
        }
    }
}

/// Bindings under which a declaration's context is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEnv {
    /// Class the environment's `$this` is an instance of
    pub self_class: Option<String>,
    /// Binding of `this::` references
    pub receiver: Binding,
    /// Argument bindings by position; `None` keeps parameters symbolic
    pub args: Option<Vec<Binding>>,
}

impl BindingEnv {
    /// A declaration's own environment.
    pub fn own(decl: &Declaration) -> Self {
        Self::within(decl.owner.clone())
    }

    /// An own environment with `this` bound to `self_class`.
    ///
    /// Used by the override check, where an ancestor's `this::C` refers to
    /// the overriding class.
    pub fn within(self_class: Option<String>) -> Self {
        Self {
            self_class,
            receiver: Binding::This,
            args: None,
        }
    }

    /// The environment a call site imposes on its callee.
    pub fn call(caller: &Declaration, site: &CallSite) -> Self {
        Self {
            self_class: caller.owner.clone(),
            receiver: Binding::from(&site.receiver),
            args: Some(site.args.iter().map(Binding::from).collect()),
        }
    }
}

/// Identity of a symbolic reference that survives resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    /// `this::C` of the shared `$this`
    This(String),
    /// `$param::C` by parameter position
    ParamMember(usize, String),
    /// `ctx $param` by parameter position
    ParamContext(usize),
}

/// Resolved requirement of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    /// Capabilities that must be provided
    pub tags: CapabilitySet,
    /// Upper bounds of dynamically bound references
    pub deferred: CapabilitySet,
    /// References still symbolic, with the bound to require when unmatched
    pub symbolic: Vec<(SymbolKey, CapabilitySet)>,
}

impl Requirement {
    /// Check whether the requirement is exact (no bound involved).
    pub fn is_exact(&self) -> bool {
        self.deferred.is_empty() && self.symbolic.is_empty()
    }

    /// Everything that may be required, bounds included.
    pub fn upper_bound(&self) -> CapabilitySet {
        self.symbolic
            .iter()
            .fold(self.tags.union(self.deferred), |acc, (_, bound)| acc.union(*bound))
    }
}

/// Resolved provision of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provision {
    /// Capabilities available
    pub tags: CapabilitySet,
    /// Symbolic references retained for matching
    pub refs: Vec<SymbolKey>,
}

/// A reference that has no value under a static binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolvable {
    pub reference: ContextRef,
    pub class: String,
    /// The class declares the member, but only abstractly
    pub is_abstract: bool,
}

impl fmt::Display for Unresolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_abstract {
            write!(
                f,
                "{} names abstract context constant '{}' with no value on {}",
                self.reference,
                member_of(&self.reference).unwrap_or_default(),
                self.class
            )
        } else {
            write!(
                f,
                "{}: class {} has no context constant '{}'",
                self.reference,
                self.class,
                member_of(&self.reference).unwrap_or_default()
            )
        }
    }
}

fn member_of(reference: &ContextRef) -> Option<&str> {
    match reference {
        ContextRef::ThisMember { member } | ContextRef::ParamMember { member, .. } => Some(member),
        ContextRef::ParamContext { .. } => None,
    }
}

/// Outcome of matching a requirement against a provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Satisfied,
    /// Exact tags not provided
    Insufficient(CapabilitySet),
    /// Bound tags not provided
    UnresolvedBound(CapabilitySet),
}

/// Resolves contexts over one lattice and class graph.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    lattice: &'a CapabilityLattice,
    classes: &'a ClassGraph,
}

impl<'a> Resolver<'a> {
    pub fn new(lattice: &'a CapabilityLattice, classes: &'a ClassGraph) -> Self {
        Self { lattice, classes }
    }

    /// Resolve what `decl` requires under `env`.
    ///
    /// # Errors
    ///
    /// Returns the first reference bound to a static class on which the
    /// member is abstract or missing.
    pub fn require(&self, decl: &Declaration, env: &BindingEnv) -> Result<Requirement, Unresolvable> {
        let mut req = Requirement {
            tags: decl.context.concrete_tags(),
            ..Requirement::default()
        };

        for reference in decl.context.refs() {
            match reference {
                ContextRef::ThisMember { member } => match &env.receiver {
                    Binding::This => self.require_this(env, member, &mut req),
                    Binding::Class(class) => {
                        req.tags = req.tags.union(self.require_on_class(class, reference)?);
                    }
                    Binding::Function(_) | Binding::Dynamic => {
                        let bound = match &decl.owner {
                            Some(owner) => self.member_upper_bound(owner, member),
                            None => defaults(),
                        };
                        req.deferred = req.deferred.union(bound);
                    }
                },
                ContextRef::ParamMember { param, member } => {
                    let Some((index, p)) = decl.param(param) else {
                        req.deferred = req.deferred.union(defaults());
                        continue;
                    };
                    match &env.args {
                        None => self.require_declared_member(index, p, member, &mut req),
                        Some(args) => match args.get(index).unwrap_or(&Binding::Dynamic) {
                            Binding::Class(class) => {
                                req.tags = req.tags.union(self.require_on_class(class, reference)?);
                            }
                            Binding::This => self.require_this(env, member, &mut req),
                            Binding::Function(_) | Binding::Dynamic => {
                                let bound = match &p.ty {
                                    TypeHint::Class { name } => self.member_upper_bound(name, member),
                                    _ => defaults(),
                                };
                                req.deferred = req.deferred.union(bound);
                            }
                        },
                    }
                }
                ContextRef::ParamContext { param } => {
                    let Some((index, p)) = decl.param(param) else {
                        req.deferred = req.deferred.union(defaults());
                        continue;
                    };
                    let bound = self.function_hint_bound(p);
                    match env.args.as_ref().map(|args| args.get(index)) {
                        None => req.symbolic.push((SymbolKey::ParamContext(index), bound)),
                        Some(Some(Binding::Function(contexts))) => {
                            match self.function_contexts(contexts) {
                                Some(tags) => req.tags = req.tags.union(tags),
                                None => req.deferred = req.deferred.union(bound),
                            }
                        }
                        Some(_) => req.deferred = req.deferred.union(bound),
                    }
                }
            }
        }

        req.tags = normalize(self.lattice, req.tags);
        req.deferred = normalize(self.lattice, req.deferred);
        Ok(req)
    }

    /// Resolve what calling `caller`'s own parameter `$name` requires.
    ///
    /// Free when the caller declares `ctx $name`; exact when the parameter
    /// has a concrete function type; otherwise deferred to its bound.
    /// `None` when the caller has no such parameter.
    pub fn require_parameter(&self, caller: &Declaration, name: &str) -> Option<Requirement> {
        let (_, param) = caller.param(name)?;
        let forwarded = caller
            .context
            .refs()
            .iter()
            .any(|r| matches!(r, ContextRef::ParamContext { param } if param == name));

        let mut req = Requirement::default();
        if forwarded {
            return Some(req);
        }
        match &param.ty {
            TypeHint::Function { contexts } => match self.function_contexts(contexts) {
                Some(tags) => req.tags = tags,
                None => req.deferred = self.function_hint_bound(param),
            },
            _ => req.deferred = defaults(),
        }
        Some(req)
    }

    /// What a call through an untyped value requires: its upper bound.
    pub fn require_dynamic(&self, upper_bound: Option<&[ContextToken]>) -> Requirement {
        Requirement {
            deferred: match upper_bound {
                Some(bound) => lower_concrete(self.lattice, bound),
                None => defaults(),
            },
            ..Requirement::default()
        }
    }

    /// Resolve what `decl` provides in `env`, keeping its references.
    ///
    /// References resolve to concrete values where the class fixes them and
    /// to their lower bound (`super`, or `pure`) otherwise.
    pub fn provide(&self, decl: &Declaration, env: &BindingEnv) -> Provision {
        let mut tags = decl.context.concrete_tags();
        let mut refs = Vec::new();

        for reference in decl.context.refs() {
            match reference {
                ContextRef::ThisMember { member } => {
                    refs.push(SymbolKey::This(member.clone()));
                    if let Some(class) = &env.self_class {
                        tags = tags.union(self.member_lower_bound(class, member));
                    }
                }
                ContextRef::ParamMember { param, member } => {
                    let Some((index, p)) = decl.param(param) else {
                        continue;
                    };
                    refs.push(SymbolKey::ParamMember(index, member.clone()));
                    if let TypeHint::Class { name } = &p.ty {
                        tags = tags.union(self.member_lower_bound(name, member));
                    }
                }
                ContextRef::ParamContext { param } => {
                    if let Some((index, _)) = decl.param(param) {
                        refs.push(SymbolKey::ParamContext(index));
                    }
                }
            }
        }

        Provision {
            tags: normalize(self.lattice, tags),
            refs,
        }
    }

    /// Match a requirement against a provision.
    ///
    /// Exact tags are checked first; bounds are only checked once the exact
    /// part is satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Incomparable`] if tags of different families
    /// meet.
    pub fn check(&self, req: &Requirement, provided: &Provision) -> Result<Outcome, LatticeError> {
        let exact = is_subset_or_equal(self.lattice, req.tags, provided.tags)?;
        if !exact.is_satisfied() {
            return Ok(Outcome::Insufficient(exact.missing()));
        }

        let bound = req
            .symbolic
            .iter()
            .filter(|(key, _)| !provided.refs.contains(key))
            .fold(req.deferred, |acc, (_, bound)| acc.union(*bound));
        let bounded = is_subset_or_equal(self.lattice, normalize(self.lattice, bound), provided.tags)?;
        if bounded.is_satisfied() {
            Ok(Outcome::Satisfied)
        } else {
            Ok(Outcome::UnresolvedBound(bounded.missing()))
        }
    }

    /// `this::C` with `$this` shared between both sides.
    fn require_this(&self, env: &BindingEnv, member: &str, req: &mut Requirement) {
        let key = SymbolKey::This(member.to_string());
        let Some(class) = &env.self_class else {
            req.symbolic.push((key, defaults()));
            return;
        };
        match self.classes.ctx_member(class, member).value() {
            Some(value) => req.tags = req.tags.union(lower_concrete(self.lattice, value)),
            None => req.symbolic.push((key, self.member_upper_bound(class, member))),
        }
    }

    /// `$x::C` in an own environment, resolved through the declared hint.
    fn require_declared_member(&self, index: usize, param: &Param, member: &str, req: &mut Requirement) {
        let key = SymbolKey::ParamMember(index, member.to_string());
        let TypeHint::Class { name } = &param.ty else {
            req.symbolic.push((key, defaults()));
            return;
        };
        match self.classes.ctx_member(name, member).value() {
            Some(value) => req.tags = req.tags.union(lower_concrete(self.lattice, value)),
            None => req.symbolic.push((key, self.member_upper_bound(name, member))),
        }
    }

    fn require_on_class(&self, class: &str, reference: &ContextRef) -> Result<CapabilitySet, Unresolvable> {
        let member = member_of(reference).unwrap_or_default();
        match self.classes.ctx_member(class, member) {
            MemberLookup::Concrete { value, .. } | MemberLookup::Default { value, .. } => {
                Ok(lower_concrete(self.lattice, value))
            }
            lookup => Err(Unresolvable {
                reference: reference.clone(),
                class: class.to_string(),
                is_abstract: matches!(lookup, MemberLookup::Abstract { .. }),
            }),
        }
    }

    /// The most `member` can be on `class` or any subclass.
    fn member_upper_bound(&self, class: &str, member: &str) -> CapabilitySet {
        match self.classes.member_bounds(class, member).upper {
            Some(bound) => lower_concrete(self.lattice, bound),
            None => defaults(),
        }
    }

    /// The least `member` provides on `class` or any subclass.
    fn member_lower_bound(&self, class: &str, member: &str) -> CapabilitySet {
        if let Some(value) = self.classes.ctx_member(class, member).value() {
            return lower_tags(self.lattice, value);
        }
        match self.classes.member_bounds(class, member).lower {
            Some(bound) => lower_tags(self.lattice, bound),
            None => CapabilitySet::empty(),
        }
    }

    /// Upper bound of a higher-order parameter's context.
    fn function_hint_bound(&self, param: &Param) -> CapabilitySet {
        match &param.ty {
            TypeHint::Function { contexts } => self.function_contexts(contexts).unwrap_or_else(defaults),
            _ => defaults(),
        }
    }

    /// Concrete context of a function type, if it has one.
    fn function_contexts(&self, contexts: &ContextAnnotation) -> Option<CapabilitySet> {
        match contexts {
            ContextAnnotation::Unspecified => Some(defaults()),
            ContextAnnotation::Listed(tokens) => {
                let lowered = lower_tokens(self.lattice, tokens);
                match lowered.context {
                    ContextSet::Concrete { tags } if !lowered.has_wildcard => Some(tags),
                    _ => None,
                }
            }
        }
    }
}

fn defaults() -> CapabilitySet {
    CapabilitySet::single(CapabilityTag::Defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::table::DeclarationTable;
    use coeffects_ast::{ClassDecl, CtxConstDecl, DeclId, FunctionDecl, ParamDecl, Program};

    fn tokens(raw: &[&str]) -> Vec<ContextToken> {
        raw.iter().map(|t| t.parse().unwrap()).collect()
    }

    fn annotation(raw: &[&str]) -> ContextAnnotation {
        ContextAnnotation::parse(raw.iter().copied()).unwrap()
    }

    fn set(tags: &[CapabilityTag]) -> CapabilitySet {
        tags.iter().copied().collect()
    }

    fn table() -> DeclarationTable {
        let program = Program::new()
            .class(
                ClassDecl::new("A")
                    .abstract_class()
                    .with_ctx(CtxConstDecl::abstract_ctx("C").with_upper_bound(tokens(&["rx"]))),
            )
            .class(
                ClassDecl::new("B")
                    .extends("A")
                    .with_ctx(CtxConstDecl::concrete("C", tokens(&["rx_local"]))),
            )
            .function(FunctionDecl::method("A", "f").with_contexts(annotation(&["this::C"])))
            .function(
                FunctionDecl::function("apply")
                    .with_param(ParamDecl::new("g").typed(TypeHint::Function {
                        contexts: annotation(&["_"]),
                    }))
                    .with_contexts(annotation(&["ctx $g", "io"])),
            )
            .function(
                FunctionDecl::function("via")
                    .with_param(ParamDecl::new("x").typed(TypeHint::Class { name: "A".into() }))
                    .with_contexts(annotation(&["$x::C"])),
            );
        let (table, errors) = DeclarationTable::build(&program, &CapabilityLattice::standard());
        assert!(errors.is_empty(), "{:?}", errors);
        table
    }

    #[test]
    fn test_require_on_static_receiver() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let f = table.get(&DeclId::method("A", "f")).unwrap();

        let env = BindingEnv {
            self_class: None,
            receiver: Binding::Class("B".into()),
            args: Some(Vec::new()),
        };
        let req = resolver.require(f, &env).unwrap();
        assert_eq!(req.tags, set(&[CapabilityTag::RxLocal]));
        assert!(req.is_exact());
    }

    #[test]
    fn test_require_on_abstract_receiver_is_unresolvable() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let f = table.get(&DeclId::method("A", "f")).unwrap();

        let env = BindingEnv {
            self_class: None,
            receiver: Binding::Class("A".into()),
            args: Some(Vec::new()),
        };
        let err = resolver.require(f, &env).unwrap_err();
        assert!(err.is_abstract);
        assert_eq!(err.class, "A");
    }

    #[test]
    fn test_dynamic_receiver_defers_to_upper_bound() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let f = table.get(&DeclId::method("A", "f")).unwrap();

        let env = BindingEnv {
            self_class: None,
            receiver: Binding::Dynamic,
            args: Some(Vec::new()),
        };
        let req = resolver.require(f, &env).unwrap();
        assert!(req.tags.is_empty());
        assert_eq!(req.deferred, set(&[CapabilityTag::Rx]));
    }

    #[test]
    fn test_own_environment_stays_symbolic() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let f = table.get(&DeclId::method("A", "f")).unwrap();

        let env = BindingEnv::own(f);
        let req = resolver.require(f, &env).unwrap();
        let provided = resolver.provide(f, &env);
        assert_eq!(req.symbolic, vec![(SymbolKey::This("C".into()), set(&[CapabilityTag::Rx]))]);
        assert_eq!(resolver.check(&req, &provided).unwrap(), Outcome::Satisfied);
        assert_eq!(req.upper_bound(), set(&[CapabilityTag::Rx]));
    }

    #[test]
    fn test_param_context_with_function_argument() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let apply = table.get(&DeclId::function("apply")).unwrap();

        let env = BindingEnv {
            self_class: None,
            receiver: Binding::Dynamic,
            args: Some(vec![Binding::Function(annotation(&["rx"]))]),
        };
        let req = resolver.require(apply, &env).unwrap();
        assert_eq!(req.tags, set(&[CapabilityTag::Rx, CapabilityTag::Io]));

        // Untyped argument: wildcard parameter type bounds it at defaults
        let env = BindingEnv {
            args: Some(vec![Binding::Dynamic]),
            ..env
        };
        let req = resolver.require(apply, &env).unwrap();
        assert_eq!(req.deferred, set(&[CapabilityTag::Defaults]));
    }

    #[test]
    fn test_require_parameter_forwarded_is_free() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let apply = table.get(&DeclId::function("apply")).unwrap();

        let req = resolver.require_parameter(apply, "g").unwrap();
        assert!(req.tags.is_empty());
        assert!(req.is_exact());
        assert!(resolver.require_parameter(apply, "h").is_none());
    }

    #[test]
    fn test_provide_uses_lower_bound_and_keeps_refs() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());
        let via = table.get(&DeclId::function("via")).unwrap();

        let provided = resolver.provide(via, &BindingEnv::own(via));
        assert!(provided.tags.is_empty());
        assert_eq!(provided.refs, vec![SymbolKey::ParamMember(0, "C".into())]);
    }

    #[test]
    fn test_check_reports_exact_before_bound() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());

        let req = Requirement {
            tags: set(&[CapabilityTag::Io]),
            deferred: set(&[CapabilityTag::Defaults]),
            symbolic: Vec::new(),
        };
        let provided = Provision {
            tags: set(&[CapabilityTag::Rx]),
            refs: Vec::new(),
        };
        assert_eq!(
            resolver.check(&req, &provided).unwrap(),
            Outcome::Insufficient(set(&[CapabilityTag::Io]))
        );

        let provided = Provision {
            tags: set(&[CapabilityTag::Io, CapabilityTag::Rx]),
            refs: Vec::new(),
        };
        assert_eq!(
            resolver.check(&req, &provided).unwrap(),
            Outcome::UnresolvedBound(set(&[CapabilityTag::Defaults]))
        );
    }

    #[test]
    fn test_check_across_families_is_an_error() {
        let lattice = CapabilityLattice::standard();
        let table = table();
        let resolver = Resolver::new(&lattice, table.classes());

        let req = Requirement {
            tags: set(&[CapabilityTag::Mutable]),
            ..Requirement::default()
        };
        let provided = Provision {
            tags: set(&[CapabilityTag::Defaults]),
            refs: Vec::new(),
        };
        assert!(matches!(
            resolver.check(&req, &provided),
            Err(LatticeError::Incomparable { .. })
        ));
    }
}
