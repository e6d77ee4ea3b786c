//! AstContext: arena-based mutable AST storage.
//!
//! Every node lives in a `PrimaryMap` owned by `AstContext`. Parent links are
//! plain `NodeRef`s maintained by the mutation API, so a node is owned by
//! exactly one parent slot at a time. Cross-links to declarations are
//! non-owning [`DeclLink`]s.

use std::collections::BTreeMap;
use std::ops::Range;

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;
use weave_core::{CompilationPhase, Diagnostic, Location, Severity, Symbol};

use crate::node::{Category, Meta, NodeClass, NodeData, NodeError, NodeKind};
use crate::refs::{NodeRef, ScopeRef};
use crate::scope::Scope;
use crate::{DeclLink, Expression, TypeKind};

// ============================================================================
// AstContext
// ============================================================================

/// Arena-based mutable AST context.
///
/// Owns all nodes and scopes of one compilation. The root node is created
/// with the context; modules are attached beneath it.
pub struct AstContext {
    nodes: PrimaryMap<NodeRef, NodeData>,
    scopes: PrimaryMap<ScopeRef, Scope>,
    root: NodeRef,
    anon_counters: BTreeMap<&'static str, u64>,
}

impl AstContext {
    /// Create a context holding just an empty root node.
    pub fn new() -> Self {
        let mut nodes = PrimaryMap::new();
        let root = nodes.push(NodeData {
            kind: NodeKind::Root,
            meta: Meta::default(),
            children: SmallVec::new(),
            parent: None,
            scope: None,
            errors: Vec::new(),
        });
        Self {
            nodes,
            scopes: PrimaryMap::new(),
            root,
            anon_counters: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create a new node owning `children`. Null children are allowed.
    ///
    /// # Panics
    ///
    /// Panics if any child already has a parent.
    pub fn create_node(
        &mut self,
        kind: NodeKind,
        children: impl IntoIterator<Item = Option<NodeRef>>,
        location: Option<Location>,
    ) -> NodeRef {
        let children: SmallVec<[Option<NodeRef>; 4]> = children.into_iter().collect();
        for child in children.iter().flatten() {
            self.assert_detached(*child, "create_node");
        }
        let node = self.nodes.push(NodeData {
            kind,
            meta: Meta {
                location,
                comments: Vec::new(),
            },
            children: children.clone(),
            parent: None,
            scope: None,
            errors: Vec::new(),
        });
        for child in children.into_iter().flatten() {
            self.nodes[child].parent = Some(node);
        }
        node
    }

    fn assert_detached(&self, child: NodeRef, what: &str) {
        assert!(
            self.nodes[child].parent.is_none(),
            "{what}: node {child} already has parent {:?}",
            self.nodes[child].parent,
        );
    }

    pub fn node(&self, n: NodeRef) -> &NodeData {
        &self.nodes[n]
    }

    pub fn node_mut(&mut self, n: NodeRef) -> &mut NodeData {
        &mut self.nodes[n]
    }

    pub fn kind(&self, n: NodeRef) -> &NodeKind {
        &self.nodes[n].kind
    }

    pub fn kind_mut(&mut self, n: NodeRef) -> &mut NodeKind {
        &mut self.nodes[n].kind
    }

    pub fn class(&self, n: NodeRef) -> NodeClass {
        self.nodes[n].kind.class()
    }

    /// The node's own location.
    pub fn location(&self, n: NodeRef) -> Option<Location> {
        self.nodes[n].meta.location
    }

    /// The node's location, or the closest ancestor's if it has none.
    pub fn nearest_location(&self, n: NodeRef) -> Option<Location> {
        std::iter::once(n)
            .chain(self.ancestors(n))
            .find_map(|a| self.nodes[a].meta.location)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Tree structure
    // ========================================================================

    pub fn parent(&self, n: NodeRef) -> Option<NodeRef> {
        self.nodes[n].parent
    }

    /// Raw child slots, including null ones.
    pub fn children(&self, n: NodeRef) -> &[Option<NodeRef>] {
        &self.nodes[n].children
    }

    /// The child in slot `index`; `None` if the slot is null or absent.
    pub fn child(&self, n: NodeRef, index: usize) -> Option<NodeRef> {
        self.nodes[n].children.get(index).copied().flatten()
    }

    /// Non-null children from slot `start` on whose kind is in `category`.
    pub fn children_of(
        &self,
        n: NodeRef,
        start: usize,
        category: Category,
    ) -> impl Iterator<Item = NodeRef> + '_ {
        let end = self.nodes[n].children.len();
        self.children_in(n, start..end, category)
    }

    /// Like [`children_of`](Self::children_of) restricted to a slot range.
    pub fn children_in(
        &self,
        n: NodeRef,
        range: Range<usize>,
        category: Category,
    ) -> impl Iterator<Item = NodeRef> + '_ {
        let slots = &self.nodes[n].children;
        let range = range.start.min(slots.len())..range.end.min(slots.len());
        slots[range]
            .iter()
            .flatten()
            .copied()
            .filter(move |&c| category.matches(&self.nodes[c].kind))
    }

    /// Put `child` into slot `index`, growing the slot list with nulls as
    /// needed. The previous occupant, if any, becomes detached.
    ///
    /// # Panics
    ///
    /// Panics if `child` already has a parent.
    pub fn set_child(&mut self, n: NodeRef, index: usize, child: Option<NodeRef>) {
        if let Some(c) = child {
            self.assert_detached(c, "set_child");
        }
        let slots = &mut self.nodes[n].children;
        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        let old = std::mem::replace(&mut slots[index], child);
        if let Some(old) = old {
            self.nodes[old].parent = None;
        }
        if let Some(c) = child {
            self.nodes[c].parent = Some(n);
        }
    }

    /// Append a child slot.
    ///
    /// # Panics
    ///
    /// Panics if `child` already has a parent.
    pub fn add_child(&mut self, n: NodeRef, child: Option<NodeRef>) {
        if let Some(c) = child {
            self.assert_detached(c, "add_child");
            self.nodes[c].parent = Some(n);
        }
        self.nodes[n].children.push(child);
    }

    /// Remove slot `index`. Slots after it shift down by one.
    pub fn remove_child(&mut self, n: NodeRef, index: usize) -> Option<NodeRef> {
        let removed = self.nodes[n].children.remove(index);
        if let Some(c) = removed {
            self.nodes[c].parent = None;
        }
        removed
    }

    /// Remove a range of slots. Slots before the range keep their indices.
    pub fn remove_children(&mut self, n: NodeRef, range: Range<usize>) {
        let removed: SmallVec<[Option<NodeRef>; 4]> =
            self.nodes[n].children.drain(range).collect();
        for c in removed.into_iter().flatten() {
            self.nodes[c].parent = None;
        }
    }

    /// Slot index of `n` within its parent.
    pub fn index_in_parent(&self, n: NodeRef) -> Option<usize> {
        let parent = self.nodes[n].parent?;
        self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == Some(n))
    }

    /// Replace `old` (a child of `n`) with `new`.
    ///
    /// # Panics
    ///
    /// Panics if `old` is not a child of `n` or `new` already has a parent.
    pub fn replace_child(&mut self, n: NodeRef, old: NodeRef, new: NodeRef) {
        let index = self.nodes[n]
            .children
            .iter()
            .position(|&c| c == Some(old))
            .unwrap_or_else(|| panic!("replace_child: {old} is not a child of {n}"));
        self.set_child(n, index, Some(new));
    }

    /// Put `new` into the slot `old` occupies; `old` becomes detached.
    ///
    /// # Panics
    ///
    /// Panics if `old` has no parent.
    pub fn replace_node(&mut self, old: NodeRef, new: NodeRef) {
        let parent = self.nodes[old]
            .parent
            .unwrap_or_else(|| panic!("replace_node: {old} has no parent"));
        self.replace_child(parent, old, new);
    }

    /// Null out the slot holding `n`. No-op for detached nodes.
    pub fn detach(&mut self, n: NodeRef) {
        if let (Some(parent), Some(index)) = (self.nodes[n].parent, self.index_in_parent(n)) {
            self.set_child(parent, index, None);
        }
    }

    /// Ancestors of `n`, closest first; `n` itself is not included.
    pub fn ancestors(&self, n: NodeRef) -> Ancestors<'_> {
        Ancestors {
            ctx: self,
            next: self.nodes[n].parent,
        }
    }

    pub fn find_ancestor(
        &self,
        n: NodeRef,
        mut pred: impl FnMut(&NodeKind) -> bool,
    ) -> Option<NodeRef> {
        self.ancestors(n).find(|&a| pred(&self.nodes[a].kind))
    }

    /// True if `n` is `ancestor` or lies beneath it.
    pub fn is_within(&self, n: NodeRef, ancestor: NodeRef) -> bool {
        n == ancestor || self.ancestors(n).any(|a| a == ancestor)
    }

    /// True if `n` is reachable from the root.
    pub fn is_attached(&self, n: NodeRef) -> bool {
        self.is_within(n, self.root)
    }

    /// Copy the subtree rooted at `n`. The copy is detached, carries no
    /// scopes or errors, and keeps weak links pointing at the original
    /// targets.
    pub fn deep_clone(&mut self, n: NodeRef) -> NodeRef {
        let children: SmallVec<[Option<NodeRef>; 4]> = self.nodes[n].children.clone();
        let cloned: SmallVec<[Option<NodeRef>; 4]> = children
            .into_iter()
            .map(|c| c.map(|c| self.deep_clone(c)))
            .collect();
        let kind = self.nodes[n].kind.clone();
        let location = self.nodes[n].meta.location;
        let copy = self.create_node(kind, cloned, location);
        self.nodes[copy].meta.comments = self.nodes[n].meta.comments.clone();
        copy
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Pre-order walk from `root` yielding `(node, depth)`; null slots are
    /// skipped.
    pub fn pre_order(&self, root: NodeRef) -> PreOrder<'_> {
        PreOrder {
            ctx: self,
            stack: vec![(root, 0)],
        }
    }

    /// Post-order walk from `root` yielding `(node, depth)`.
    pub fn post_order(&self, root: NodeRef) -> std::vec::IntoIter<(NodeRef, usize)> {
        let mut out = Vec::new();
        self.post_order_into(root, 0, &mut out);
        out.into_iter()
    }

    fn post_order_into(&self, n: NodeRef, depth: usize, out: &mut Vec<(NodeRef, usize)>) {
        for c in self.nodes[n].children.iter().flatten() {
            self.post_order_into(*c, depth + 1, out);
        }
        out.push((n, depth));
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub fn add_error(&mut self, n: NodeRef, message: impl Into<String>, phase: CompilationPhase) {
        self.nodes[n].errors.push(NodeError {
            message: message.into(),
            severity: Severity::Error,
            phase,
        });
    }

    pub fn add_warning(&mut self, n: NodeRef, message: impl Into<String>, phase: CompilationPhase) {
        self.nodes[n].errors.push(NodeError {
            message: message.into(),
            severity: Severity::Warning,
            phase,
        });
    }

    pub fn errors(&self, n: NodeRef) -> &[NodeError] {
        &self.nodes[n].errors
    }

    pub fn has_errors(&self, root: NodeRef) -> bool {
        self.pre_order(root).any(|(n, _)| {
            self.nodes[n]
                .errors
                .iter()
                .any(|e| e.severity == Severity::Error)
        })
    }

    /// All errors and warnings attached beneath `root`, in tree order.
    pub fn collect_diagnostics(&self, root: NodeRef) -> Vec<Diagnostic> {
        self.pre_order(root)
            .flat_map(|(n, _)| {
                let location = self.nearest_location(n);
                self.nodes[n].errors.iter().map(move |e| Diagnostic {
                    message: e.message.clone(),
                    location,
                    severity: e.severity,
                    phase: e.phase,
                })
            })
            .collect()
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    pub fn scope(&self, s: ScopeRef) -> &Scope {
        &self.scopes[s]
    }

    pub fn scope_mut(&mut self, s: ScopeRef) -> &mut Scope {
        &mut self.scopes[s]
    }

    pub fn node_scope(&self, n: NodeRef) -> Option<ScopeRef> {
        self.nodes[n].scope
    }

    /// The scope attached to `n`, creating an empty one if needed.
    pub fn get_or_create_scope(&mut self, n: NodeRef) -> ScopeRef {
        if let Some(s) = self.nodes[n].scope {
            return s;
        }
        let s = self.scopes.push(Scope::default());
        self.nodes[n].scope = Some(s);
        s
    }

    /// Drop every scope; they are rebuilt from scratch each round.
    pub fn clear_scopes(&mut self) {
        for (_, data) in self.nodes.iter_mut() {
            data.scope = None;
        }
        self.scopes.clear();
    }

    // ========================================================================
    // Links and IDs
    // ========================================================================

    /// The declaration a link points to, provided it is still attached and
    /// its canonical ID still matches the one captured in the link.
    pub fn link_target(&self, link: DeclLink) -> Option<NodeRef> {
        let data = self.nodes.get(link.node)?;
        let current = match &data.kind {
            NodeKind::Declaration(d) => d.canonical_id,
            NodeKind::UnitItem(_) => None,
            _ => return None,
        };
        if let (Some(expected), Some(current)) = (link.canonical_id, current) {
            if expected != current {
                return None;
            }
        }
        self.is_attached(link.node).then_some(link.node)
    }

    /// A link to `decl` capturing its current canonical ID.
    pub fn link_to(&self, decl: NodeRef) -> DeclLink {
        let canonical_id = self.nodes[decl]
            .kind
            .as_declaration()
            .and_then(|d| d.canonical_id);
        DeclLink {
            node: decl,
            canonical_id,
        }
    }

    /// Record what a name expression or name type refers to.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a name, or already refers to a different target.
    pub fn set_resolved(&mut self, n: NodeRef, link: DeclLink) {
        let slot = match &mut self.nodes[n].kind {
            NodeKind::Expression(Expression::Name { resolved, .. }) => resolved,
            NodeKind::Type(t) => match &mut t.kind {
                TypeKind::Name { resolved, .. } => resolved,
                other => panic!("set_resolved: {n} is a {} type, not a name", other.category()),
            },
            other => panic!("set_resolved: {n} is {}, not a name", other.class_name()),
        };
        if let Some(existing) = slot {
            assert!(
                existing.node == link.node,
                "set_resolved: {n} already refers to {}, cannot re-target to {}",
                existing.node,
                link.node,
            );
        }
        *slot = Some(link);
    }

    /// A fresh identifier such as `__anon_field_3`, unique per context.
    pub fn fresh_id(&mut self, prefix: &'static str) -> Symbol {
        let counter = self.anon_counters.entry(prefix).or_insert(0);
        let id = format!("__anon_{prefix}_{counter}");
        *counter += 1;
        Symbol::from_dynamic(&id)
    }
}

impl Default for AstContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Iterators
// ============================================================================

pub struct Ancestors<'a> {
    ctx: &'a AstContext,
    next: Option<NodeRef>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let current = self.next?;
        self.next = self.ctx.nodes[current].parent;
        Some(current)
    }
}

pub struct PreOrder<'a> {
    ctx: &'a AstContext,
    stack: Vec<(NodeRef, usize)>,
}

impl Iterator for PreOrder<'_> {
    type Item = (NodeRef, usize);

    fn next(&mut self) -> Option<(NodeRef, usize)> {
        let (n, depth) = self.stack.pop()?;
        let children = &self.ctx.nodes[n].children;
        self.stack
            .extend(children.iter().rev().flatten().map(|&c| (c, depth + 1)));
        Some((n, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Constness};

    #[test]
    fn create_node_sets_parents() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let qt = b.qualified(t, Constness::Const);
        assert_eq!(ctx.parent(t), Some(qt));
        assert_eq!(ctx.child(qt, 0), Some(t));
        assert_eq!(ctx.parent(qt), None);
    }

    #[test]
    #[should_panic(expected = "already has parent")]
    fn node_cannot_have_two_parents() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let _first = b.qualified(t, Constness::Const);
        let _second = b.qualified(t, Constness::Const);
    }

    #[test]
    fn set_child_detaches_previous_occupant() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t1 = b.type_bool();
        let t2 = b.type_real();
        let qt = b.qualified(t1, Constness::Mutable);

        ctx.set_child(qt, 0, Some(t2));
        assert_eq!(ctx.parent(t1), None);
        assert_eq!(ctx.parent(t2), Some(qt));

        ctx.set_child(qt, 0, None);
        assert_eq!(ctx.child(qt, 0), None);
        assert_eq!(ctx.children(qt).len(), 1);
    }

    #[test]
    fn remove_children_keeps_earlier_indices() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let elems: Vec<_> = (0..4)
            .map(|i| {
                let t = b.type_signed_integer(8 * (i + 1));
                b.qualified(t, Constness::Const)
            })
            .collect();
        let tuple = b.type_tuple(elems.clone());

        ctx.remove_children(tuple, 1..3);
        assert_eq!(ctx.children(tuple), &[Some(elems[0]), Some(elems[3])]);
        assert_eq!(ctx.parent(elems[1]), None);

        ctx.remove_child(tuple, 0);
        assert_eq!(ctx.children(tuple), &[Some(elems[3])]);
    }

    #[test]
    fn typed_children_skip_nulls_and_other_kinds() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let qt = b.qualified(t, Constness::Const);
        let e = b.expr_bool(true);
        let n = ctx.create_node(NodeKind::Statement(crate::Statement::Block), [None], None);
        ctx.add_child(n, Some(qt));
        ctx.add_child(n, None);
        ctx.add_child(n, Some(e));

        let exprs: Vec<_> = ctx.children_of(n, 0, Category::Expression).collect();
        assert_eq!(exprs, vec![e]);
        let qts: Vec<_> = ctx.children_in(n, 0..2, Category::QualifiedType).collect();
        assert_eq!(qts, vec![qt]);
    }

    #[test]
    fn deep_clone_is_detached_copy() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let inner = b.type_signed_integer(32);
        let inner_q = b.qualified(inner, Constness::Mutable);
        let opt = b.type_optional(inner_q);
        let root_q = b.qualified(opt, Constness::Const);

        let copy = ctx.deep_clone(root_q);
        assert_ne!(copy, root_q);
        assert_eq!(ctx.parent(copy), None);
        assert_eq!(ctx.kind(copy), ctx.kind(root_q));
        let copy_opt = ctx.child(copy, 0).unwrap();
        assert_ne!(copy_opt, opt);
        assert_eq!(ctx.parent(copy_opt), Some(copy));
    }

    #[test]
    fn pre_and_post_order_report_depth() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let inner = b.type_bool();
        let inner_q = b.qualified(inner, Constness::Mutable);
        let opt = b.type_optional(inner_q);

        let pre: Vec<_> = ctx.pre_order(opt).collect();
        assert_eq!(pre, vec![(opt, 0), (inner_q, 1), (inner, 2)]);
        let post: Vec<_> = ctx.post_order(opt).collect();
        assert_eq!(post, vec![(inner, 2), (inner_q, 1), (opt, 0)]);
    }

    #[test]
    #[should_panic(expected = "already refers to")]
    fn resolved_link_cannot_be_retargeted() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let name = b.expr_name("x");
        let t1 = b.type_bool();
        let q1 = b.qualified(t1, Constness::Mutable);
        let d1 = b.decl_local("x", q1, None);
        let t2 = b.type_bool();
        let q2 = b.qualified(t2, Constness::Mutable);
        let d2 = b.decl_local("x", q2, None);

        let l1 = ctx.link_to(d1);
        ctx.set_resolved(name, l1);
        ctx.set_resolved(name, l1);
        let l2 = ctx.link_to(d2);
        ctx.set_resolved(name, l2);
    }

    #[test]
    fn link_target_requires_attachment() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let q = b.qualified(t, Constness::Mutable);
        let decl = b.decl_global("x", q, None, crate::Linkage::Public);
        let module = b.decl_module("m", vec![decl]);
        let link = ctx.link_to(decl);
        assert_eq!(ctx.link_target(link), None);

        let root = ctx.root();
        ctx.add_child(root, Some(module));
        assert_eq!(ctx.link_target(link), Some(decl));
    }

    #[test]
    fn fresh_ids_count_per_prefix() {
        let mut ctx = AstContext::new();
        assert_eq!(ctx.fresh_id("field"), "__anon_field_0");
        assert_eq!(ctx.fresh_id("field"), "__anon_field_1");
        assert_eq!(ctx.fresh_id("tmp"), "__anon_tmp_0");
    }
}
