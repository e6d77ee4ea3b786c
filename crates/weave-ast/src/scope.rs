//! Lexical scopes and identifier lookup.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use weave_core::{QualifiedId, Symbol};

use crate::{AstContext, DeclKind, NodeKind, NodeRef, ScopeRef, TypeKind};

/// Declarations visible at a scope-introducing node.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    items: BTreeMap<Symbol, SmallVec<[NodeRef; 1]>>,
    /// Module declarations whose exported items are visible here.
    imports: Vec<NodeRef>,
}

impl Scope {
    /// Register `decl` under `id`. Registering the same node twice is a
    /// no-op.
    pub fn insert(&mut self, id: Symbol, decl: NodeRef) {
        let entry = self.items.entry(id).or_default();
        if !entry.contains(&decl) {
            entry.push(decl);
        }
    }

    pub fn add_import(&mut self, module: NodeRef) {
        if !self.imports.contains(&module) {
            self.imports.push(module);
        }
    }

    pub fn get(&self, id: Symbol) -> &[NodeRef] {
        self.items.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn items(&self) -> impl Iterator<Item = (Symbol, &[NodeRef])> {
        self.items.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn imports(&self) -> &[NodeRef] {
        &self.imports
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.imports.is_empty()
    }
}

/// Nested lookups through imports stop after this many hops.
const MAX_IMPORT_DEPTH: usize = 8;

impl AstContext {
    /// Find the declarations `id` denotes as seen from `from`, walking
    /// outward through enclosing scopes. The innermost scope with a match
    /// wins; an empty result means the ID is unknown.
    pub fn lookup(&self, from: NodeRef, id: &QualifiedId) -> SmallVec<[NodeRef; 1]> {
        for n in std::iter::once(from).chain(self.ancestors(from)) {
            if let Some(scope) = self.node_scope(n) {
                let found = self.lookup_in_scope(scope, id, true, 0);
                if !found.is_empty() {
                    return found;
                }
            }
        }
        SmallVec::new()
    }

    /// Look `id` up in one scope, optionally also in the scopes it imports.
    pub fn lookup_in_scope(
        &self,
        scope: ScopeRef,
        id: &QualifiedId,
        follow_imports: bool,
        depth: usize,
    ) -> SmallVec<[NodeRef; 1]> {
        let s = self.scope(scope);

        // Qualified IDs may be registered verbatim, e.g. a method `S::m`.
        let direct = s.get(id.to_symbol());
        if !direct.is_empty() {
            return direct.iter().copied().collect();
        }

        if let Some(rest) = id.rest() {
            let mut result = SmallVec::new();
            let heads = self.lookup_in_scope(scope, &QualifiedId::simple(id.first()), follow_imports, depth);
            for head in heads {
                if let Some(inner) = self.namespace_scope(head) {
                    result.extend(self.lookup_in_scope(inner, &rest, false, depth + 1));
                }
            }
            return result;
        }

        if !follow_imports || depth >= MAX_IMPORT_DEPTH {
            return SmallVec::new();
        }
        let mut result = SmallVec::new();
        for &module in s.imports() {
            let Some(inner) = self.node_scope(module) else {
                continue;
            };
            for decl in self.lookup_in_scope(inner, id, false, depth + 1) {
                let exported = self
                    .kind(decl)
                    .as_declaration()
                    .is_some_and(|d| d.linkage.is_exported());
                if exported {
                    result.push(decl);
                }
            }
        }
        result
    }

    /// The scope a qualified lookup continues in after matching `decl`:
    /// a module's scope, an imported module's target, or a declared
    /// type's members.
    fn namespace_scope(&self, decl: NodeRef) -> Option<ScopeRef> {
        let d = self.kind(decl).as_declaration()?;
        match &d.kind {
            DeclKind::Module => self.node_scope(decl),
            DeclKind::ImportedModule { module } => {
                let target = self.find_module(*module)?;
                self.node_scope(target)
            }
            DeclKind::Type => {
                let t = self.declared_type(decl)?;
                match self.type_kind(t)? {
                    TypeKind::Enum | TypeKind::Struct | TypeKind::Union | TypeKind::Unit => {
                        self.node_scope(t)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The module declaration with the given ID directly under the root.
    pub fn find_module(&self, id: Symbol) -> Option<NodeRef> {
        self.children(self.root()).iter().flatten().copied().find(|&m| {
            matches!(self.kind(m), NodeKind::Declaration(d) if d.kind == DeclKind::Module && d.id == id)
        })
    }
}
