//! Type unification.
//!
//! Each resolved type gets a canonical serialization; two type nodes denote
//! the same type iff their serializations are equal. Declared types
//! serialize by their type ID rather than their structure, which keeps
//! recursive types finite. Serialization aborts on anything not yet
//! resolved, and the type is retried in a later round.

use tracing::trace;
use weave_ast::{AstContext, DeclKind, Mutator, NodeKind, NodeRef, TypeKind, visitor};
use weave_core::DebugStream;

/// Guards against runaway recursion through anonymous types.
const MAX_DEPTH: usize = 32;

/// Incremental builder for a unification string.
pub struct Unifier<'a> {
    ctx: &'a AstContext,
    out: String,
    aborted: bool,
    depth: usize,
}

impl<'a> Unifier<'a> {
    pub fn new(ctx: &'a AstContext) -> Self {
        Self {
            ctx,
            out: String::new(),
            aborted: false,
            depth: 0,
        }
    }

    pub fn add_str(&mut self, s: &str) {
        if !self.aborted {
            self.out.push_str(s);
        }
    }

    /// Give up; the type cannot be unified yet.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Serialize a qualified type: `c:` or `m:` followed by its type.
    pub fn add_qualified(&mut self, qt: NodeRef) {
        match self.ctx.qualifiers(qt) {
            Some(q) => {
                self.add_str(if q.is_const() { "c:" } else { "m:" });
                match self.ctx.child(qt, 0) {
                    Some(t) => self.add_type(t),
                    None => self.abort(),
                }
            }
            None => self.add_type(qt),
        }
    }

    /// Serialize an unqualified type (a qualified one is unwrapped).
    pub fn add_type(&mut self, t: NodeRef) {
        if self.aborted {
            return;
        }
        let Some(u) = self.ctx.unqualified(t) else {
            return self.abort();
        };
        let Some(ty) = self.ctx.type_of_node(u) else {
            return self.abort();
        };
        if let Some(existing) = &ty.unification {
            let existing = existing.clone();
            return self.add_str(&existing);
        }
        if self.depth >= MAX_DEPTH {
            return self.abort();
        }
        self.depth += 1;

        let category = ty.kind.category();
        if ty.wildcard {
            self.add_str(&format!("{category}<*>"));
            self.depth -= 1;
            return;
        }

        match &ty.kind {
            TypeKind::Auto | TypeKind::Unknown => self.abort(),
            TypeKind::Name { resolved, .. } => {
                let target = resolved
                    .and_then(|l| self.ctx.link_target(l))
                    .and_then(|d| self.ctx.declared_type(d));
                match target {
                    Some(declared) => self.add_type(declared),
                    None => self.abort(),
                }
            }
            TypeKind::SignedInteger { width } | TypeKind::UnsignedInteger { width } => {
                self.add_str(&format!("{category}<{width}>"));
            }
            TypeKind::List => match self.ctx.element_type(u) {
                Some(elem) => {
                    self.add_str("list(");
                    self.add_qualified(elem);
                    self.add_str(")");
                }
                None => self.abort(),
            },
            TypeKind::Iterator
            | TypeKind::Optional
            | TypeKind::Result
            | TypeKind::StrongRef
            | TypeKind::WeakRef
            | TypeKind::ValueRef
            | TypeKind::TypeOf => match self.ctx.child(u, 0) {
                Some(elem) => {
                    self.add_str(category);
                    self.add_str("(");
                    self.add_qualified(elem);
                    self.add_str(")");
                }
                None => self.abort(),
            },
            TypeKind::Tuple => {
                self.add_str("tuple(");
                let elems: Vec<_> = self.ctx.children(u).iter().flatten().copied().collect();
                for (i, e) in elems.into_iter().enumerate() {
                    if i > 0 {
                        self.add_str(",");
                    }
                    self.add_qualified(e);
                }
                self.add_str(")");
            }
            TypeKind::Enum | TypeKind::Struct | TypeKind::Union | TypeKind::Unit => {
                self.add_compound(u, category, ty.type_id)
            }
            TypeKind::Function => {
                self.add_str("function(");
                let children: Vec<_> = self.ctx.children(u).iter().flatten().copied().collect();
                for (i, c) in children.into_iter().enumerate() {
                    match i {
                        0 => {}
                        1 => self.add_str(";"),
                        _ => self.add_str(","),
                    }
                    match self.ctx.kind(c) {
                        NodeKind::Declaration(_) => match self.ctx.child(c, 0) {
                            Some(qt) => self.add_qualified(qt),
                            None => self.abort(),
                        },
                        _ => self.add_qualified(c),
                    }
                }
                self.add_str(")");
            }
            TypeKind::Library { cxx_name } => self.add_str(&format!("library({cxx_name})")),
            TypeKind::Member { id } => self.add_str(&format!("member({id})")),
            _ => self.add_str(category),
        }
        self.depth -= 1;
    }

    fn add_compound(&mut self, u: NodeRef, category: &str, type_id: Option<weave_core::Symbol>) {
        if let Some(id) = type_id {
            return self.add_str(&format!("{category}{{name:{id}}}"));
        }
        // A declared type is only serialized once its declaration has an ID.
        let declared = self
            .ctx
            .parent(u)
            .and_then(|qt| self.ctx.parent(qt))
            .is_some_and(|d| matches!(self.ctx.kind(d), NodeKind::Declaration(decl) if decl.kind == DeclKind::Type));
        if declared {
            return self.abort();
        }
        self.add_str(category);
        self.add_str("{");
        let members: Vec<_> = self.ctx.children(u).iter().flatten().copied().collect();
        for (i, m) in members.into_iter().enumerate() {
            if i > 0 {
                self.add_str(",");
            }
            let Some(d) = self.ctx.kind(m).as_declaration() else {
                continue;
            };
            match d.kind {
                DeclKind::EnumLabel { value, .. } => {
                    self.add_str(&format!("{}={}", d.id, value.unwrap_or(-1)))
                }
                _ => {
                    self.add_str(&format!("{}:", d.id));
                    match self.ctx.child(m, 0) {
                        Some(qt) => self.add_qualified(qt),
                        None => self.abort(),
                    }
                }
            }
        }
        self.add_str("}");
    }

    pub fn finish(self) -> Option<String> {
        (!self.aborted).then_some(self.out)
    }
}

/// The unification string of a type, or `None` if it cannot be computed
/// yet.
pub fn serialize(ctx: &AstContext, t: NodeRef) -> Option<String> {
    let mut u = Unifier::new(ctx);
    u.add_type(t);
    u.finish()
}

/// Whether two types are the same. Falls back to serializing on the fly
/// for types not unified yet.
pub fn types_equal(ctx: &AstContext, a: NodeRef, b: NodeRef) -> bool {
    if ctx.same_type(a, b) {
        return true;
    }
    match (serialize(ctx, a), serialize(ctx, b)) {
        (Some(sa), Some(sb)) => sa == sb,
        _ => false,
    }
}

/// Unify a single type node. Returns true if it was newly unified.
pub fn unify_type(ctx: &mut AstContext, t: NodeRef) -> bool {
    let already = ctx.type_of_node(t).is_none_or(|ty| ty.unification.is_some());
    if already {
        return false;
    }
    let Some(serial) = serialize(ctx, t) else {
        return false;
    };
    if let NodeKind::Type(ty) = ctx.kind_mut(t) {
        ty.unification = Some(serial);
    }
    true
}

/// Unify every type beneath `root`. Returns true if anything changed.
pub fn unify(ctx: &mut AstContext, root: NodeRef) -> bool {
    let mut mutator = Mutator::new(DebugStream::Unifier);
    visitor::walk(ctx, root, visitor::Order::Post, |ctx, n| {
        if matches!(ctx.kind(n), NodeKind::Type(_)) && unify_type(ctx, n) {
            if let Some(u) = ctx.type_of_node(n).and_then(|t| t.unification.clone()) {
                trace!(target: "unifier", node = %n, unification = %u);
                mutator.record_change(ctx, n, &format!("unified as {u}"));
            }
        }
    });
    mutator.is_modified()
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness, Linkage};
    use weave_core::Symbol;

    use super::*;

    #[test]
    fn integers_and_containers() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let i = b.type_signed_integer(32);
        let iq = b.qualified(i, Constness::Const);
        let list = b.type_list(iq);
        let w = b.type_wildcard(TypeKind::SignedInteger { width: 0 });

        assert_eq!(serialize(&ctx, i).as_deref(), Some("int<32>"));
        assert_eq!(serialize(&ctx, list).as_deref(), Some("list(c:int<32>)"));
        assert_eq!(serialize(&ctx, w).as_deref(), Some("int<*>"));
    }

    #[test]
    fn list_of_auto_aborts() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let a = b.type_auto();
        let aq = b.qualified(a, Constness::Mutable);
        let list = b.type_list(aq);
        assert_eq!(serialize(&ctx, list), None);
        assert!(!unify_type(&mut ctx, list));
    }

    fn bool_uint_tuple(b: &mut Builder<'_>) -> NodeRef {
        let x = b.type_bool();
        let xq = b.qualified(x, Constness::Mutable);
        let y = b.type_unsigned_integer(16);
        let yq = b.qualified(y, Constness::Mutable);
        b.type_tuple(vec![xq, yq])
    }

    #[test]
    fn structurally_equal_tuples_unify_equal() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t1 = bool_uint_tuple(&mut b);
        let t2 = bool_uint_tuple(&mut b);

        assert!(unify_type(&mut ctx, t1));
        assert!(unify_type(&mut ctx, t2));
        // Unifying again is a no-op.
        assert!(!unify_type(&mut ctx, t1));
        assert_eq!(
            ctx.type_of_node(t1).unwrap().unification.as_deref(),
            Some("tuple(m:bool,m:uint<16>)")
        );
        assert!(ctx.same_type(t1, t2));
    }

    #[test]
    fn declared_struct_serializes_by_id() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let ft = b.type_bool();
        let fq = b.qualified(ft, Constness::Mutable);
        let field = b.decl_field("x", fq, None);
        let s = b.type_struct(vec![field]);
        let sq = b.qualified(s, Constness::Mutable);
        let _decl = b.decl_type("S", sq, Linkage::Public);

        // No type ID yet: the declaration has not been assigned one.
        assert_eq!(serialize(&ctx, s), None);

        if let NodeKind::Type(ty) = ctx.kind_mut(s) {
            ty.type_id = Some(Symbol::new("m::S"));
        }
        assert_eq!(serialize(&ctx, s).as_deref(), Some("struct{name:m::S}"));
    }
}
