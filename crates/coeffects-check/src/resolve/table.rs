//! Declaration table: every function and method with its lowered context.
//!
//! # What This Pass Does
//!
//! Builds the single table all later passes read from:
//!
//! 1. Builds the [`ClassGraph`] (duplicate, unknown and cyclic classes)
//! 2. Lowers each declaration's annotation into a [`ContextSet`]
//! 3. Lowers each parameter's mutability annotation
//! 4. Rejects duplicate identities, keeping the first declaration
//!
//! # Pipeline Position
//!
//! ```text
//! Manifest → Declaration Table → Override Check → Call-Site Check → Reflection
//!            ^^^^^^^^^^^^^^^^^
//!               YOU ARE HERE
//! ```
//!
//! The table is immutable once built; later passes only read it.

use super::annotations::{lower_annotation, lower_mutability, MutabilityError};
use super::hierarchy::{ClassGraph, MemberLookup};
use crate::error::{CheckError, ErrorKind};
use coeffects_ast::{
    ContextAnnotation, ContextRef, ContextSet, DeclId, FunctionDecl, Program, TypeHint,
};
use coeffects_foundation::{CapabilityLattice, CapabilityTag, Span};
use indexmap::IndexMap;
use tracing::debug;

/// A resolved function or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: DeclId,
    pub name: String,
    /// Declaring class for methods
    pub owner: Option<String>,
    pub params: Vec<Param>,
    /// Lowered, normalized context
    pub context: ContextSet,
    /// Annotation as written, unknown names included
    pub declared: ContextAnnotation,
    pub span: Span,
}

/// A resolved parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeHint,
    /// Mutability capability (`immutable` when unannotated)
    pub mutability: CapabilityTag,
}

impl Declaration {
    /// Find a parameter by name with its position.
    pub fn param(&self, name: &str) -> Option<(usize, &Param)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }

    /// Check whether this is a method.
    pub fn is_method(&self) -> bool {
        self.owner.is_some()
    }
}

/// All declarations of a program, keyed by identity in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DeclarationTable {
    classes: ClassGraph,
    decls: IndexMap<DeclId, Declaration>,
}

impl DeclarationTable {
    /// Build the table from a program.
    ///
    /// # Returns
    ///
    /// The table (always usable) and every error found while building it.
    /// Errors are recoverable: offending tags are dropped, duplicate
    /// declarations are skipped.
    pub fn build(program: &Program, lattice: &CapabilityLattice) -> (Self, Vec<CheckError>) {
        let (classes, mut errors) = ClassGraph::build(&program.classes);
        let mut decls: IndexMap<DeclId, Declaration> = IndexMap::new();

        for function in &program.functions {
            let id = function.id();

            if let Some(existing) = decls.get(&id) {
                errors.push(
                    CheckError::new(
                        ErrorKind::DuplicateDeclaration,
                        function.span,
                        id.as_str(),
                        format!("'{}' is declared more than once", id),
                    )
                    .with_label(existing.span, "first declared here".to_string()),
                );
                continue;
            }

            if let Some(owner) = &function.owner {
                if !classes.contains(owner) {
                    errors.push(CheckError::new(
                        ErrorKind::UnknownClass,
                        function.span,
                        id.as_str(),
                        format!("method '{}' belongs to unknown class '{}'", id, owner),
                    ));
                }
            }

            let declaration = lower_declaration(function, lattice, &mut errors);
            validate_refs(&declaration, &classes, &mut errors);
            debug!(decl = %id, context = %declaration.context, "declared");
            decls.insert(id, declaration);
        }

        (Self { classes, decls }, errors)
    }

    /// Get a declaration by identity.
    pub fn get(&self, id: &DeclId) -> Option<&Declaration> {
        self.decls.get(id)
    }

    /// Iterate declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.decls.values()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// The validated class graph.
    pub fn classes(&self) -> &ClassGraph {
        &self.classes
    }

    /// The override chain of a declaration.
    ///
    /// The declaration itself followed by every ancestor declaration of the
    /// same method name, most-derived first. Free functions and unknown ids
    /// yield at most the declaration itself.
    pub fn overrides_of(&self, id: &DeclId) -> Vec<&Declaration> {
        let Some(decl) = self.decls.get(id) else {
            return Vec::new();
        };
        let Some(owner) = &decl.owner else {
            return vec![decl];
        };

        let mut chain = vec![decl];
        for ancestor in self.classes.linearize(owner).into_iter().skip(1) {
            if let Some(found) = self.decls.get(&DeclId::method(ancestor, &decl.name)) {
                chain.push(found);
            }
        }
        chain
    }

    /// The declarations a method directly overrides.
    ///
    /// For each direct supertype of the owner, the nearest declaration of the
    /// same name along that supertype's linearization. A declaration reached
    /// through several supertypes is listed once.
    pub fn immediate_overrides(&self, id: &DeclId) -> Vec<&Declaration> {
        let Some(decl) = self.decls.get(id) else {
            return Vec::new();
        };
        let Some(owner) = &decl.owner else {
            return Vec::new();
        };

        let mut found: Vec<&Declaration> = Vec::new();
        for sup in self.classes.direct_supers(owner) {
            let nearest = self
                .classes
                .linearize(sup)
                .into_iter()
                .find_map(|ancestor| self.decls.get(&DeclId::method(ancestor, &decl.name)));
            if let Some(ancestor) = nearest {
                if !found.iter().any(|seen| seen.id == ancestor.id) {
                    found.push(ancestor);
                }
            }
        }
        found
    }
}

fn lower_declaration(
    function: &FunctionDecl,
    lattice: &CapabilityLattice,
    errors: &mut Vec<CheckError>,
) -> Declaration {
    let id = function.id();
    let lowered = lower_annotation(lattice, &function.contexts);

    for name in &lowered.unknown {
        errors.push(
            CheckError::warning(
                ErrorKind::UnknownCapability,
                function.span,
                id.as_str(),
                format!("unknown capability '{}' is ignored", name),
            )
            .with_note(format!("known capabilities: {}", known_names())),
        );
    }
    for tag in &lowered.misplaced {
        errors.push(CheckError::warning(
            ErrorKind::UnknownCapability,
            function.span,
            id.as_str(),
            format!("'{}' is a parameter capability, not a context, and is ignored", tag),
        ));
    }
    if lowered.has_wildcard {
        errors.push(CheckError::warning(
            ErrorKind::UnknownCapability,
            function.span,
            id.as_str(),
            "'_' is only meaningful in function types and is ignored here".to_string(),
        ));
    }

    let params = function
        .params
        .iter()
        .map(|param| {
            let mutability = match lower_mutability(param.capability.as_deref()) {
                Ok(tag) => tag,
                Err(err) => {
                    let message = match err {
                        MutabilityError::Unknown(name) => {
                            format!("unknown capability '{}' on parameter ${}", name, param.name)
                        }
                        MutabilityError::WrongFamily(tag) => format!(
                            "'{}' is not a mutability capability (parameter ${})",
                            tag, param.name
                        ),
                    };
                    errors.push(CheckError::warning(
                        ErrorKind::UnknownCapability,
                        function.span,
                        id.as_str(),
                        message,
                    ));
                    CapabilityTag::Immutable
                }
            };
            Param {
                name: param.name.clone(),
                ty: param.ty.clone(),
                mutability,
            }
        })
        .collect();

    Declaration {
        id,
        name: function.name.clone(),
        owner: function.owner.clone(),
        params,
        context: lowered.context,
        declared: function.contexts.clone(),
        span: function.span,
    }
}

/// Check that every symbolic reference names something that exists.
fn validate_refs(decl: &Declaration, classes: &ClassGraph, errors: &mut Vec<CheckError>) {
    let subject = decl.id.as_str();
    let mut report = |kind: ErrorKind, message: String| {
        errors.push(CheckError::new(kind, decl.span, subject, message));
    };

    for reference in decl.context.refs() {
        match reference {
            ContextRef::ThisMember { member } => match &decl.owner {
                None => report(
                    ErrorKind::UnresolvableContext,
                    format!("'{}' used outside a class", reference),
                ),
                Some(owner) => {
                    if classes.contains(owner)
                        && classes.ctx_member(owner, member) == MemberLookup::Missing
                    {
                        report(
                            ErrorKind::UnresolvableContext,
                            format!("class {} has no context constant '{}'", owner, member),
                        );
                    }
                }
            },
            ContextRef::ParamMember { param, member } => match decl.param(param) {
                None => report(
                    ErrorKind::UnknownDeclaration,
                    format!("'{}' names unknown parameter ${}", reference, param),
                ),
                Some((_, p)) => {
                    if let TypeHint::Class { name } = &p.ty {
                        if !classes.contains(name) {
                            report(
                                ErrorKind::UnknownClass,
                                format!("parameter ${} has unknown type '{}'", param, name),
                            );
                        } else if classes.ctx_member(name, member) == MemberLookup::Missing {
                            report(
                                ErrorKind::UnresolvableContext,
                                format!("class {} has no context constant '{}'", name, member),
                            );
                        }
                    }
                }
            },
            ContextRef::ParamContext { param } => {
                if decl.param(param).is_none() {
                    report(
                        ErrorKind::UnknownDeclaration,
                        format!("'{}' names unknown parameter ${}", reference, param),
                    );
                }
            }
        }
    }
}

fn known_names() -> String {
    CapabilityTag::ALL
        .iter()
        .map(|tag| tag.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use coeffects_ast::{ClassDecl, ParamDecl};
    use coeffects_foundation::CapabilitySet;

    fn annotation(raw: &[&str]) -> ContextAnnotation {
        ContextAnnotation::parse(raw.iter().copied()).unwrap()
    }

    fn chain_program() -> Program {
        Program::new()
            .class(ClassDecl::new("A"))
            .class(ClassDecl::new("B").extends("A"))
            .class(ClassDecl::new("C").extends("B"))
            .function(FunctionDecl::method("A", "f").with_contexts(annotation(&["defaults"])))
            .function(FunctionDecl::method("C", "f").with_contexts(annotation(&["rx"])))
            .function(FunctionDecl::method("C", "g"))
    }

    #[test]
    fn test_build_lowers_contexts() {
        let lattice = CapabilityLattice::standard();
        let (table, errors) = DeclarationTable::build(&chain_program(), &lattice);
        assert!(errors.is_empty());
        assert_eq!(table.len(), 3);

        let f = table.get(&DeclId::method("C", "f")).unwrap();
        assert_eq!(f.context.concrete_tags(), CapabilitySet::single(CapabilityTag::Rx));
        let g = table.get(&DeclId::method("C", "g")).unwrap();
        assert_eq!(g.context, ContextSet::Inferred);
    }

    #[test]
    fn test_overrides_of_skips_classes_without_the_method() {
        let lattice = CapabilityLattice::standard();
        let (table, _) = DeclarationTable::build(&chain_program(), &lattice);

        let chain: Vec<&str> = table
            .overrides_of(&DeclId::method("C", "f"))
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(chain, vec!["C::f", "A::f"]);

        assert_eq!(table.overrides_of(&DeclId::method("C", "g")).len(), 1);
        assert!(table.overrides_of(&DeclId::function("nope")).is_empty());
    }

    #[test]
    fn test_immediate_overrides_follow_every_supertype() {
        let program = Program::new()
            .class(ClassDecl::new("I").interface())
            .class(ClassDecl::new("A").implements("I"))
            .class(ClassDecl::new("B").extends("A").implements("I"))
            .class(ClassDecl::new("C").extends("B"))
            .function(FunctionDecl::method("I", "f"))
            .function(FunctionDecl::method("A", "f"))
            .function(FunctionDecl::method("B", "f"))
            .function(FunctionDecl::method("C", "f"));
        let lattice = CapabilityLattice::standard();
        let (table, errors) = DeclarationTable::build(&program, &lattice);
        assert!(errors.is_empty(), "{:?}", errors);

        let ids = |id: DeclId| -> Vec<String> {
            table
                .immediate_overrides(&id)
                .iter()
                .map(|d| d.id.to_string())
                .collect()
        };
        assert_eq!(ids(DeclId::method("B", "f")), vec!["A::f", "I::f"]);
        assert_eq!(ids(DeclId::method("C", "f")), vec!["B::f"]);
        assert_eq!(ids(DeclId::method("A", "f")), vec!["I::f"]);
        assert!(ids(DeclId::method("I", "f")).is_empty());
    }

    #[test]
    fn test_duplicate_declaration_keeps_first() {
        let lattice = CapabilityLattice::standard();
        let program = Program::new()
            .function(FunctionDecl::function("f").with_contexts(annotation(&["rx"])))
            .function(FunctionDecl::function("f").with_contexts(annotation(&["io"])));
        let (table, errors) = DeclarationTable::build(&program, &lattice);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::DuplicateDeclaration);
        let f = table.get(&DeclId::function("f")).unwrap();
        assert_eq!(f.context.concrete_tags(), CapabilitySet::single(CapabilityTag::Rx));
    }

    #[test]
    fn test_unknown_capability_dropped_but_kept_raw() {
        let lattice = CapabilityLattice::standard();
        let program =
            Program::new().function(FunctionDecl::function("f").with_contexts(annotation(&["lol", "io"])));
        let (table, errors) = DeclarationTable::build(&program, &lattice);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::UnknownCapability);
        assert!(!errors[0].is_error());

        let f = table.get(&DeclId::function("f")).unwrap();
        assert_eq!(f.context.concrete_tags(), CapabilitySet::single(CapabilityTag::Io));
        assert_eq!(f.declared.tokens().len(), 2);
    }

    #[test]
    fn test_method_on_unknown_class() {
        let lattice = CapabilityLattice::standard();
        let program = Program::new().function(FunctionDecl::method("Ghost", "f"));
        let (table, errors) = DeclarationTable::build(&program, &lattice);
        assert_eq!(errors[0].kind, ErrorKind::UnknownClass);
        assert!(table.get(&DeclId::method("Ghost", "f")).is_some());
    }

    #[test]
    fn test_dangling_references_reported() {
        let lattice = CapabilityLattice::standard();
        let program = Program::new()
            .class(ClassDecl::new("A"))
            .function(FunctionDecl::method("A", "f").with_contexts(annotation(&["this::C"])))
            .function(FunctionDecl::function("g").with_contexts(annotation(&["this::C"])))
            .function(FunctionDecl::function("h").with_contexts(annotation(&["ctx $nope"])));
        let (_, errors) = DeclarationTable::build(&program, &lattice);

        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::UnresolvableContext,
                ErrorKind::UnresolvableContext,
                ErrorKind::UnknownDeclaration
            ]
        );
    }

    #[test]
    fn test_param_mutability() {
        let lattice = CapabilityLattice::standard();
        let program = Program::new().function(
            FunctionDecl::function("f")
                .with_param(ParamDecl::new("a").with_capability("owned_mutable"))
                .with_param(ParamDecl::new("b"))
                .with_param(ParamDecl::new("c").with_capability("io")),
        );
        let (table, errors) = DeclarationTable::build(&program, &lattice);
        assert_eq!(errors.len(), 1);

        let f = table.get(&DeclId::function("f")).unwrap();
        let tags: Vec<CapabilityTag> = f.params.iter().map(|p| p.mutability).collect();
        assert_eq!(
            tags,
            vec![
                CapabilityTag::OwnedMutable,
                CapabilityTag::Immutable,
                CapabilityTag::Immutable
            ]
        );
    }
}
