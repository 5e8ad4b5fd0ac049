//! Class graph: inheritance edges, linearization and context member lookup.
//!
//! # What This Pass Does
//!
//! Builds an indexable graph of the program's classes and interfaces, then
//! validates it:
//!
//! 1. **Duplicate detection** - two classes with one name (first one kept)
//! 2. **Unknown supertypes** - `extends`/`implements` of an undeclared class
//!    (edge dropped)
//! 3. **Cycle detection** - depth-first search over supertype edges
//!
//! # Linearization
//!
//! Member lookup walks a class's linearization: the class itself, then its
//! parent's linearization, then each interface's linearization, keeping only
//! the first occurrence of every class.
//!
//! ```text
//! class B1 extends A implements I
//!   linearize(B1) = [B1, A, ...A's supertypes, I, ...I's supertypes]
//! ```
//!
//! Walking is guarded by a visited set, so a cyclic hierarchy that was
//! already reported still yields a finite linearization.
//!
//! # Member Lookup
//!
//! A context constant reached through several paths resolves as follows:
//! the most-derived **concrete** value wins, even over an abstract default
//! declared closer; otherwise the most-derived abstract default; otherwise
//! the member is abstract.

use crate::error::{CheckError, ErrorKind};
use coeffects_ast::{ClassDecl, ContextToken, CtxConstDecl};
use coeffects_foundation::Span;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Indexable class graph.
#[derive(Debug, Clone, Default)]
pub struct ClassGraph {
    nodes: IndexMap<String, ClassNode>,
}

#[derive(Debug, Clone)]
struct ClassNode {
    decl: ClassDecl,
    /// Indices of known direct supertypes, parent first
    supers: Vec<usize>,
}

/// Result of looking up a context constant on a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberLookup<'a> {
    /// A concrete value, declared on `owner`
    Concrete {
        owner: &'a str,
        value: &'a [ContextToken],
    },
    /// No concrete value; the abstract default declared on `owner`
    Default {
        owner: &'a str,
        value: &'a [ContextToken],
    },
    /// Abstract with no value on any path
    Abstract { owner: &'a str },
    /// Not declared anywhere in the linearization
    Missing,
}

/// `as` and `super` bounds of a context constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberBounds<'a> {
    /// Most-derived `as` bound
    pub upper: Option<&'a [ContextToken]>,
    /// Most-derived `super` bound
    pub lower: Option<&'a [ContextToken]>,
}

impl<'a> MemberLookup<'a> {
    /// The value to use, if any.
    pub fn value(&self) -> Option<&'a [ContextToken]> {
        match self {
            Self::Concrete { value, .. } | Self::Default { value, .. } => Some(value),
            Self::Abstract { .. } | Self::Missing => None,
        }
    }
}

impl ClassGraph {
    /// Build and validate the graph.
    ///
    /// # Returns
    ///
    /// The graph (always usable) and every structural error found.
    pub fn build(classes: &[ClassDecl]) -> (Self, Vec<CheckError>) {
        let mut errors = Vec::new();
        let mut nodes: IndexMap<String, ClassNode> = IndexMap::new();

        for class in classes {
            if let Some(existing) = nodes.get(&class.name) {
                errors.push(
                    CheckError::new(
                        ErrorKind::DuplicateDeclaration,
                        class.span,
                        class.name.as_str(),
                        format!("class '{}' is declared more than once", class.name),
                    )
                    .with_label(existing.decl.span, "first declared here".to_string()),
                );
                continue;
            }
            nodes.insert(
                class.name.clone(),
                ClassNode {
                    decl: class.clone(),
                    supers: Vec::new(),
                },
            );
        }

        // Resolve supertype edges now that every name is known
        for index in 0..nodes.len() {
            let decl = &nodes[index].decl;
            let mut supers = Vec::new();
            for name in decl.supertypes() {
                match nodes.get_index_of(name) {
                    Some(target) => supers.push(target),
                    None => errors.push(CheckError::new(
                        ErrorKind::UnknownClass,
                        decl.span,
                        decl.name.as_str(),
                        format!("class '{}' extends unknown class '{}'", decl.name, name),
                    )),
                }
            }
            nodes[index].supers = supers;
        }

        let graph = Self { nodes };
        errors.extend(graph.validate_cycles());
        (graph, errors)
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no classes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check whether a class is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Get a class declaration by name.
    pub fn get(&self, name: &str) -> Option<&ClassDecl> {
        self.nodes.get(name).map(|node| &node.decl)
    }

    /// Linearization of `name`: itself, then parent chain, then interfaces.
    ///
    /// Empty for unknown classes.
    pub fn linearize(&self, name: &str) -> Vec<&str> {
        let mut order = Vec::new();
        if let Some(index) = self.nodes.get_index_of(name) {
            let mut seen = HashSet::new();
            self.linearize_into(index, &mut seen, &mut order);
        }
        order
    }

    fn linearize_into<'a>(&'a self, index: usize, seen: &mut HashSet<usize>, order: &mut Vec<&'a str>) {
        if !seen.insert(index) {
            return;
        }
        let (name, node) = match self.nodes.get_index(index) {
            Some(entry) => entry,
            None => return,
        };
        order.push(name.as_str());
        for &parent in &node.supers {
            self.linearize_into(parent, seen, order);
        }
    }

    /// Known direct supertypes of `name`, parent first.
    pub fn direct_supers(&self, name: &str) -> Vec<&str> {
        let Some(node) = self.nodes.get(name) else {
            return Vec::new();
        };
        node.supers
            .iter()
            .filter_map(|&index| self.nodes.get_index(index))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Check whether `class` is `ancestor` or inherits from it.
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        self.linearize(class).contains(&ancestor)
    }

    /// Look up context constant `member` as seen from `class`.
    pub fn ctx_member(&self, class: &str, member: &str) -> MemberLookup<'_> {
        let mut default = None;
        let mut abstract_owner = None;

        for owner in self.linearize(class) {
            let Some(decl) = self.ctx_decl(owner, member) else {
                continue;
            };
            match (&decl.value, decl.is_abstract) {
                (Some(value), false) => {
                    return MemberLookup::Concrete {
                        owner,
                        value: value.as_slice(),
                    }
                }
                (Some(value), true) => {
                    default.get_or_insert(MemberLookup::Default {
                        owner,
                        value: value.as_slice(),
                    });
                }
                (None, _) => {
                    abstract_owner.get_or_insert(owner);
                }
            }
        }

        match (default, abstract_owner) {
            (Some(found), _) => found,
            (None, Some(owner)) => MemberLookup::Abstract { owner },
            (None, None) => MemberLookup::Missing,
        }
    }

    /// Most-derived `as`/`super` bounds of `member` as seen from `class`.
    pub fn member_bounds(&self, class: &str, member: &str) -> MemberBounds<'_> {
        let mut bounds = MemberBounds::default();
        for owner in self.linearize(class) {
            let Some(decl) = self.ctx_decl(owner, member) else {
                continue;
            };
            if bounds.upper.is_none() {
                bounds.upper = decl.upper_bound.as_deref();
            }
            if bounds.lower.is_none() {
                bounds.lower = decl.lower_bound.as_deref();
            }
        }
        bounds
    }

    fn ctx_decl(&self, class: &str, member: &str) -> Option<&CtxConstDecl> {
        self.nodes.get(class)?.decl.ctx_const(member)
    }

    /// Detect inheritance cycles, one error per cycle found.
    fn validate_cycles(&self) -> Vec<CheckError> {
        let mut errors = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for start in 0..self.nodes.len() {
            if visited.contains(&start) {
                continue;
            }
            if let Some(cycle) = self.detect_cycle_dfs(start, &mut visited, &mut rec_stack, Vec::new())
            {
                let span = self.span_of(start);
                let names: Vec<&str> = cycle
                    .iter()
                    .filter_map(|&i| self.nodes.get_index(i).map(|(name, _)| name.as_str()))
                    .collect();
                let subject = names.first().copied().unwrap_or_default();
                errors.push(CheckError::new(
                    ErrorKind::CyclicInheritance,
                    span,
                    subject,
                    format!("cyclic inheritance: {}", names.join(" → ")),
                ));
            }
        }

        errors
    }

    /// Depth-first search over supertype edges.
    ///
    /// Returns the cycle path (closed, first index repeated) if one is found.
    fn detect_cycle_dfs(
        &self,
        current: usize,
        visited: &mut HashSet<usize>,
        rec_stack: &mut HashSet<usize>,
        mut path: Vec<usize>,
    ) -> Option<Vec<usize>> {
        visited.insert(current);
        rec_stack.insert(current);
        path.push(current);

        let mut found_cycle = None;
        for &next in &self.nodes[current].supers {
            if !visited.contains(&next) {
                if let Some(cycle) = self.detect_cycle_dfs(next, visited, rec_stack, path.clone()) {
                    found_cycle = Some(cycle);
                    break;
                }
            } else if rec_stack.contains(&next) {
                let start = path.iter().position(|&p| p == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                found_cycle = Some(cycle);
                break;
            }
        }

        rec_stack.remove(&current);
        found_cycle
    }

    fn span_of(&self, index: usize) -> Span {
        self.nodes
            .get_index(index)
            .map(|(_, node)| node.decl.span)
            .unwrap_or_default()
    }
}
