//! Node factories.
//!
//! `Builder` wraps a context and stamps every node it creates with the
//! current location. Factories take ownership of their child nodes, which
//! must be detached.

use weave_core::{Location, QualifiedId, Symbol};

use crate::{
    AstContext, Constness, Ctor, DeclKind, Declaration, Expression, FunctionInfo, Keyword,
    Linkage, NodeKind, NodeRef, OperatorKind, ParameterKind, Qualifiers, Side, Statement,
    TypeKind, UnitItem, UnqualifiedType,
};

pub struct Builder<'a> {
    ctx: &'a mut AstContext,
    location: Option<Location>,
}

impl<'a> Builder<'a> {
    pub fn new(ctx: &'a mut AstContext) -> Self {
        Self {
            ctx,
            location: None,
        }
    }

    /// Location stamped on subsequently created nodes.
    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    pub fn ctx(&mut self) -> &mut AstContext {
        self.ctx
    }

    fn node(&mut self, kind: NodeKind, children: impl IntoIterator<Item = Option<NodeRef>>) -> NodeRef {
        self.ctx.create_node(kind, children, self.location)
    }

    fn ty(&mut self, kind: TypeKind, children: impl IntoIterator<Item = Option<NodeRef>>) -> NodeRef {
        self.node(NodeKind::Type(UnqualifiedType::new(kind)), children)
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub fn type_bool(&mut self) -> NodeRef {
        self.ty(TypeKind::Bool, [])
    }

    pub fn type_signed_integer(&mut self, width: u16) -> NodeRef {
        self.ty(TypeKind::SignedInteger { width }, [])
    }

    pub fn type_unsigned_integer(&mut self, width: u16) -> NodeRef {
        self.ty(TypeKind::UnsignedInteger { width }, [])
    }

    pub fn type_real(&mut self) -> NodeRef {
        self.ty(TypeKind::Real, [])
    }

    pub fn type_string(&mut self) -> NodeRef {
        self.ty(TypeKind::String, [])
    }

    pub fn type_bytes(&mut self) -> NodeRef {
        self.ty(TypeKind::Bytes, [])
    }

    pub fn type_port(&mut self) -> NodeRef {
        self.ty(TypeKind::Port, [])
    }

    pub fn type_address(&mut self) -> NodeRef {
        self.ty(TypeKind::Address, [])
    }

    pub fn type_stream(&mut self) -> NodeRef {
        self.ty(TypeKind::Stream, [])
    }

    pub fn type_error(&mut self) -> NodeRef {
        self.ty(TypeKind::Error, [])
    }

    pub fn type_void(&mut self) -> NodeRef {
        self.ty(TypeKind::Void, [])
    }

    pub fn type_null(&mut self) -> NodeRef {
        self.ty(TypeKind::Null, [])
    }

    pub fn type_unknown(&mut self) -> NodeRef {
        self.ty(TypeKind::Unknown, [])
    }

    pub fn type_auto(&mut self) -> NodeRef {
        self.ty(TypeKind::Auto, [])
    }

    pub fn type_sink(&mut self) -> NodeRef {
        self.ty(TypeKind::Sink, [])
    }

    /// The wildcard of a parameterised category, e.g. `int<*>` or
    /// `list<*>`.
    pub fn type_wildcard(&mut self, kind: TypeKind) -> NodeRef {
        self.node(NodeKind::Type(UnqualifiedType::wildcard(kind)), [])
    }

    /// `list<T>`; stores an `iterator<T>` from which the element type is
    /// derived.
    pub fn type_list(&mut self, element: NodeRef) -> NodeRef {
        let iter = self.type_iterator(element);
        let iter = self.qualified(iter, Constness::Mutable);
        self.ty(TypeKind::List, [Some(iter)])
    }

    pub fn type_iterator(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::Iterator, [Some(element)])
    }

    pub fn type_optional(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::Optional, [Some(element)])
    }

    pub fn type_result(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::Result, [Some(element)])
    }

    pub fn type_tuple(&mut self, elements: Vec<NodeRef>) -> NodeRef {
        self.ty(TypeKind::Tuple, elements.into_iter().map(Some))
    }

    pub fn type_strong_ref(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::StrongRef, [Some(element)])
    }

    pub fn type_weak_ref(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::WeakRef, [Some(element)])
    }

    pub fn type_value_ref(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::ValueRef, [Some(element)])
    }

    /// `type(T)`.
    pub fn type_type(&mut self, element: NodeRef) -> NodeRef {
        self.ty(TypeKind::TypeOf, [Some(element)])
    }

    /// An enum with the given labels. Values left out are numbered by the
    /// normalizer, which also appends the implicit `Undef` label.
    pub fn type_enum(&mut self, labels: Vec<(Symbol, Option<i64>)>) -> NodeRef {
        let labels: Vec<_> = labels
            .into_iter()
            .map(|(id, value)| Some(self.decl_enum_label(id, value, false)))
            .collect();
        self.ty(TypeKind::Enum, labels)
    }

    pub fn decl_enum_label(&mut self, id: Symbol, value: Option<i64>, implicit: bool) -> NodeRef {
        self.decl(
            id,
            Linkage::Public,
            DeclKind::EnumLabel {
                value,
                implicit,
                enum_type: None,
            },
            [],
        )
    }

    pub fn type_struct(&mut self, fields: Vec<NodeRef>) -> NodeRef {
        self.ty(TypeKind::Struct, fields.into_iter().map(Some))
    }

    pub fn type_union(&mut self, fields: Vec<NodeRef>) -> NodeRef {
        self.ty(TypeKind::Union, fields.into_iter().map(Some))
    }

    /// A function type: `[0]` result, then parameter declarations.
    pub fn type_function(&mut self, result: NodeRef, params: Vec<NodeRef>) -> NodeRef {
        let children = std::iter::once(Some(result)).chain(params.into_iter().map(Some));
        self.ty(TypeKind::Function, children)
    }

    /// A PDL unit: parameter declarations followed by unit items.
    pub fn type_unit(&mut self, params: Vec<NodeRef>, items: Vec<NodeRef>) -> NodeRef {
        let children = params.into_iter().chain(items).map(Some);
        self.ty(TypeKind::Unit, children)
    }

    pub fn type_name(&mut self, id: impl Into<QualifiedId>) -> NodeRef {
        self.ty(
            TypeKind::Name {
                id: id.into(),
                resolved: None,
            },
            [],
        )
    }

    pub fn type_library(&mut self, cxx_name: impl Into<String>) -> NodeRef {
        self.ty(
            TypeKind::Library {
                cxx_name: cxx_name.into(),
            },
            [],
        )
    }

    pub fn type_member(&mut self, id: impl Into<Symbol>) -> NodeRef {
        self.ty(TypeKind::Member { id: id.into() }, [])
    }

    // ========================================================================
    // Qualified types
    // ========================================================================

    /// An r-value qualified type.
    pub fn qualified(&mut self, t: NodeRef, constness: Constness) -> NodeRef {
        self.node(NodeKind::QualifiedType(Qualifiers::rhs(constness)), [Some(t)])
    }

    /// An l-value qualified type.
    pub fn qualified_lhs(&mut self, t: NodeRef, constness: Constness) -> NodeRef {
        self.node(NodeKind::QualifiedType(Qualifiers::lhs(constness)), [Some(t)])
    }

    /// Turn a detached qualified type into its l-value form in place; an
    /// attached one is copied first.
    fn as_lhs(&mut self, qt: NodeRef) -> NodeRef {
        let qt = if self.ctx.parent(qt).is_some() {
            self.ctx.deep_clone(qt)
        } else {
            qt
        };
        if let NodeKind::QualifiedType(q) = self.ctx.kind_mut(qt) {
            q.side = Side::Lhs;
        }
        qt
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn decl(
        &mut self,
        id: Symbol,
        linkage: Linkage,
        kind: DeclKind,
        children: impl IntoIterator<Item = Option<NodeRef>>,
    ) -> NodeRef {
        self.node(
            NodeKind::Declaration(Declaration {
                id,
                linkage,
                canonical_id: None,
                kind,
            }),
            children,
        )
    }

    pub fn decl_module(&mut self, id: impl Into<Symbol>, decls: Vec<NodeRef>) -> NodeRef {
        self.decl(id.into(), Linkage::Public, DeclKind::Module, decls.into_iter().map(Some))
    }

    /// `import <module>`.
    pub fn decl_import(&mut self, module: impl Into<Symbol>) -> NodeRef {
        let module = module.into();
        self.decl(module, Linkage::Private, DeclKind::ImportedModule { module }, [])
    }

    pub fn decl_type(&mut self, id: impl Into<Symbol>, qt: NodeRef, linkage: Linkage) -> NodeRef {
        self.decl(id.into(), linkage, DeclKind::Type, [Some(qt)])
    }

    pub fn decl_constant(&mut self, id: impl Into<Symbol>, qt: NodeRef, value: NodeRef) -> NodeRef {
        self.decl(id.into(), Linkage::Private, DeclKind::Constant, [Some(qt), Some(value)])
    }

    pub fn decl_global(
        &mut self,
        id: impl Into<Symbol>,
        qt: NodeRef,
        init: Option<NodeRef>,
        linkage: Linkage,
    ) -> NodeRef {
        let qt = self.as_lhs(qt);
        self.decl(id.into(), linkage, DeclKind::GlobalVariable, [Some(qt), init])
    }

    pub fn decl_local(&mut self, id: impl Into<Symbol>, qt: NodeRef, init: Option<NodeRef>) -> NodeRef {
        let qt = self.as_lhs(qt);
        self.decl(id.into(), Linkage::Private, DeclKind::LocalVariable, [Some(qt), init])
    }

    pub fn decl_parameter(
        &mut self,
        id: impl Into<Symbol>,
        qt: NodeRef,
        kind: ParameterKind,
        default: Option<NodeRef>,
    ) -> NodeRef {
        let qt = self.as_lhs(qt);
        self.decl(id.into(), Linkage::Private, DeclKind::Parameter { kind }, [Some(qt), default])
    }

    /// A function; `body` is `None` for a prototype.
    pub fn decl_function(
        &mut self,
        id: impl Into<Symbol>,
        result: NodeRef,
        params: Vec<NodeRef>,
        body: Option<NodeRef>,
        linkage: Linkage,
    ) -> NodeRef {
        let ftype = self.type_function(result, params);
        let ftype = self.qualified(ftype, Constness::Const);
        self.decl(
            id.into(),
            linkage,
            DeclKind::Function(FunctionInfo::default()),
            [Some(ftype), body],
        )
    }

    /// A struct field.
    pub fn decl_field(&mut self, id: impl Into<Symbol>, qt: NodeRef, attributes: Option<NodeRef>) -> NodeRef {
        let qt = self.as_lhs(qt);
        self.decl(id.into(), Linkage::Struct, DeclKind::Field, [Some(qt), attributes])
    }

    // ========================================================================
    // Ctors
    // ========================================================================

    fn ctor(&mut self, ctor: Ctor, ty: NodeRef, values: impl IntoIterator<Item = Option<NodeRef>>) -> NodeRef {
        let qt = self.qualified(ty, Constness::Const);
        let children = std::iter::once(Some(qt)).chain(values);
        self.node(NodeKind::Ctor(ctor), children)
    }

    pub fn ctor_bool(&mut self, value: bool) -> NodeRef {
        let t = self.type_bool();
        self.ctor(Ctor::Bool(value), t, [])
    }

    pub fn ctor_signed_integer(&mut self, value: i64, width: u16) -> NodeRef {
        let t = self.type_signed_integer(width);
        self.ctor(Ctor::SignedInteger { value, width }, t, [])
    }

    pub fn ctor_unsigned_integer(&mut self, value: u64, width: u16) -> NodeRef {
        let t = self.type_unsigned_integer(width);
        self.ctor(Ctor::UnsignedInteger { value, width }, t, [])
    }

    pub fn ctor_real(&mut self, value: f64) -> NodeRef {
        let t = self.type_real();
        self.ctor(Ctor::Real(value), t, [])
    }

    pub fn ctor_string(&mut self, value: impl Into<String>) -> NodeRef {
        let t = self.type_string();
        self.ctor(Ctor::String(value.into()), t, [])
    }

    pub fn ctor_bytes(&mut self, value: impl Into<Vec<u8>>) -> NodeRef {
        let t = self.type_bytes();
        self.ctor(Ctor::Bytes(value.into()), t, [])
    }

    pub fn ctor_null(&mut self) -> NodeRef {
        let t = self.type_null();
        self.ctor(Ctor::Null, t, [])
    }

    pub fn ctor_error(&mut self, message: impl Into<String>) -> NodeRef {
        let t = self.type_error();
        self.ctor(Ctor::Error(message.into()), t, [])
    }

    /// `optional(e)`, or an unset optional of any type.
    pub fn ctor_optional(&mut self, value: Option<NodeRef>) -> NodeRef {
        let t = match value {
            Some(e) => match self.element_type_of(e) {
                Some(et) => self.type_optional(et),
                None => self.type_auto(),
            },
            None => self.type_wildcard(TypeKind::Optional),
        };
        self.ctor(Ctor::Optional, t, [value])
    }

    pub fn ctor_result(&mut self, value: NodeRef) -> NodeRef {
        let t = match self.element_type_of(value) {
            Some(et) => self.type_result(et),
            None => self.type_auto(),
        };
        self.ctor(Ctor::Result, t, [Some(value)])
    }

    /// A tuple literal. Its type is `auto` until every element's type is
    /// known.
    pub fn ctor_tuple(&mut self, elements: Vec<NodeRef>) -> NodeRef {
        let types: Option<Vec<_>> = elements.iter().map(|&e| self.element_type_of(e)).collect();
        let t = match types {
            Some(types) => self.type_tuple(types),
            None => self.type_auto(),
        };
        self.ctor(Ctor::Tuple, t, elements.into_iter().map(Some))
    }

    /// A list literal, typed after its first element. An empty list has
    /// type `list<*>`.
    pub fn ctor_list(&mut self, elements: Vec<NodeRef>) -> NodeRef {
        let t = match elements.first() {
            None => self.type_wildcard(TypeKind::List),
            Some(&first) => match self.element_type_of(first) {
                Some(et) => self.type_list(et),
                None => self.type_auto(),
            },
        };
        self.ctor(Ctor::List, t, elements.into_iter().map(Some))
    }

    /// `T::label`, with `enum_type` naming the enum.
    pub fn ctor_enum(&mut self, label: impl Into<Symbol>, enum_type: NodeRef) -> NodeRef {
        self.ctor(Ctor::Enum { label: label.into() }, enum_type, [])
    }

    /// A non-const copy of an expression's type if it is already resolved.
    fn element_type_of(&mut self, e: NodeRef) -> Option<NodeRef> {
        let et = self.ctx.expression_type(e)?;
        if !self.ctx.is_resolved(et) {
            return None;
        }
        let inner = self.ctx.unqualified(et)?;
        let inner = self.ctx.deep_clone(inner);
        Some(self.qualified(inner, Constness::Mutable))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self, e: Expression, children: impl IntoIterator<Item = Option<NodeRef>>) -> NodeRef {
        self.node(NodeKind::Expression(e), children)
    }

    pub fn expr_name(&mut self, id: impl Into<QualifiedId>) -> NodeRef {
        self.expr(
            Expression::Name {
                id: id.into(),
                resolved: None,
            },
            [None],
        )
    }

    pub fn expr_ctor(&mut self, ctor: NodeRef) -> NodeRef {
        self.expr(Expression::Ctor, [Some(ctor)])
    }

    pub fn expr_bool(&mut self, value: bool) -> NodeRef {
        let c = self.ctor_bool(value);
        self.expr_ctor(c)
    }

    /// An integer literal, typed `int<64>`.
    pub fn expr_int(&mut self, value: i64) -> NodeRef {
        let c = self.ctor_signed_integer(value, 64);
        self.expr_ctor(c)
    }

    /// An unsigned literal, typed `uint<64>`.
    pub fn expr_uint(&mut self, value: u64) -> NodeRef {
        let c = self.ctor_unsigned_integer(value, 64);
        self.expr_ctor(c)
    }

    pub fn expr_string(&mut self, value: impl Into<String>) -> NodeRef {
        let c = self.ctor_string(value);
        self.expr_ctor(c)
    }

    pub fn expr_bytes(&mut self, value: impl Into<Vec<u8>>) -> NodeRef {
        let c = self.ctor_bytes(value);
        self.expr_ctor(c)
    }

    pub fn expr_operator(&mut self, kind: OperatorKind, operands: Vec<NodeRef>) -> NodeRef {
        self.expr(Expression::UnresolvedOperator(kind), operands.into_iter().map(Some))
    }

    /// `callee(args...)`.
    pub fn expr_call(&mut self, callee: impl Into<QualifiedId>, args: Vec<NodeRef>) -> NodeRef {
        let callee = self.expr_name(callee);
        let operands = std::iter::once(callee).chain(args).collect();
        self.expr_operator(OperatorKind::Call, operands)
    }

    /// `receiver.method(args...)`.
    pub fn expr_member_call(
        &mut self,
        receiver: NodeRef,
        method: impl Into<Symbol>,
        args: Vec<NodeRef>,
    ) -> NodeRef {
        let member = self.expr_member(method);
        let operands = [receiver, member].into_iter().chain(args).collect();
        self.expr_operator(OperatorKind::MemberCall, operands)
    }

    /// `receiver.field`.
    pub fn expr_field(&mut self, receiver: NodeRef, field: impl Into<Symbol>) -> NodeRef {
        let member = self.expr_member(field);
        self.expr_operator(OperatorKind::Member, vec![receiver, member])
    }

    pub fn expr_member(&mut self, id: impl Into<Symbol>) -> NodeRef {
        let id = id.into();
        let t = self.type_member(id);
        let qt = self.qualified(t, Constness::Const);
        self.expr(Expression::Member(id), [Some(qt)])
    }

    pub fn expr_coerced(&mut self, e: NodeRef, target: NodeRef) -> NodeRef {
        self.expr(Expression::Coerced, [Some(e), Some(target)])
    }

    pub fn expr_assign(&mut self, target: NodeRef, source: NodeRef) -> NodeRef {
        self.expr(Expression::Assign, [Some(target), Some(source)])
    }

    fn bool_qt(&mut self) -> NodeRef {
        let t = self.type_bool();
        self.qualified(t, Constness::Const)
    }

    pub fn expr_and(&mut self, lhs: NodeRef, rhs: NodeRef) -> NodeRef {
        let qt = self.bool_qt();
        self.expr(Expression::LogicalAnd, [Some(qt), Some(lhs), Some(rhs)])
    }

    pub fn expr_or(&mut self, lhs: NodeRef, rhs: NodeRef) -> NodeRef {
        let qt = self.bool_qt();
        self.expr(Expression::LogicalOr, [Some(qt), Some(lhs), Some(rhs)])
    }

    pub fn expr_not(&mut self, operand: NodeRef) -> NodeRef {
        let qt = self.bool_qt();
        self.expr(Expression::LogicalNot, [Some(qt), Some(operand)])
    }

    pub fn expr_ternary(&mut self, cond: NodeRef, then: NodeRef, otherwise: NodeRef) -> NodeRef {
        self.expr(Expression::Ternary, [Some(cond), Some(then), Some(otherwise)])
    }

    /// A type used as an expression; typed `type(T)`.
    pub fn expr_type(&mut self, qt: NodeRef) -> NodeRef {
        let t = self.type_type(qt);
        let t = self.qualified(t, Constness::Const);
        self.expr(Expression::TypeExpr, [Some(t)])
    }

    pub fn expr_keyword(&mut self, keyword: Keyword) -> NodeRef {
        self.expr(Expression::Keyword(keyword), [None])
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn stmt_block(&mut self, stmts: Vec<NodeRef>) -> NodeRef {
        self.node(NodeKind::Statement(Statement::Block), stmts.into_iter().map(Some))
    }

    pub fn stmt_expression(&mut self, e: NodeRef) -> NodeRef {
        self.node(NodeKind::Statement(Statement::Expression), [Some(e)])
    }

    pub fn stmt_declaration(&mut self, decl: NodeRef) -> NodeRef {
        self.node(NodeKind::Statement(Statement::Declaration), [Some(decl)])
    }

    pub fn stmt_return(&mut self, value: Option<NodeRef>) -> NodeRef {
        self.node(NodeKind::Statement(Statement::Return), [value])
    }

    pub fn stmt_if(&mut self, cond: NodeRef, then: NodeRef, otherwise: Option<NodeRef>) -> NodeRef {
        self.node(NodeKind::Statement(Statement::If), [Some(cond), Some(then), otherwise])
    }

    pub fn stmt_while(&mut self, cond: NodeRef, body: NodeRef) -> NodeRef {
        self.node(NodeKind::Statement(Statement::While), [Some(cond), Some(body)])
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attribute(&mut self, tag: impl Into<Symbol>, value: Option<NodeRef>) -> NodeRef {
        self.node(NodeKind::Attribute { tag: tag.into() }, [value])
    }

    pub fn attribute_set(&mut self, attributes: Vec<NodeRef>) -> NodeRef {
        self.node(NodeKind::AttributeSet, attributes.into_iter().map(Some))
    }

    // ========================================================================
    // PDL unit items
    // ========================================================================

    /// A unit field parsing a value of type `qt`.
    pub fn unit_field(
        &mut self,
        id: Option<Symbol>,
        qt: NodeRef,
        condition: Option<NodeRef>,
        attributes: Option<NodeRef>,
    ) -> NodeRef {
        self.node(
            NodeKind::UnitItem(UnitItem::Field { id, skip: false }),
            [Some(qt), None, condition, attributes],
        )
    }

    /// A unit field parsing exactly the literal `ctor_expr`.
    pub fn unit_literal_field(
        &mut self,
        id: Option<Symbol>,
        ctor_expr: NodeRef,
        condition: Option<NodeRef>,
        attributes: Option<NodeRef>,
    ) -> NodeRef {
        let qt = match self.ctx.expression_type(ctor_expr) {
            Some(t) => self.ctx.deep_clone(t),
            None => {
                let t = self.type_auto();
                self.qualified(t, Constness::Const)
            }
        };
        self.node(
            NodeKind::UnitItem(UnitItem::Field { id, skip: false }),
            [Some(qt), Some(ctor_expr), condition, attributes],
        )
    }

    pub fn unit_variable(
        &mut self,
        id: impl Into<Symbol>,
        qt: NodeRef,
        default: Option<NodeRef>,
        attributes: Option<NodeRef>,
    ) -> NodeRef {
        let qt = self.as_lhs(qt);
        self.node(
            NodeKind::UnitItem(UnitItem::Variable { id: id.into() }),
            [Some(qt), default, attributes],
        )
    }

    /// `switch (expr) { cases }`; without `expr` the case is chosen by
    /// look-ahead.
    pub fn unit_switch(&mut self, expr: Option<NodeRef>, cases: Vec<NodeRef>) -> NodeRef {
        let children = std::iter::once(expr).chain(cases.into_iter().map(Some));
        self.node(NodeKind::UnitItem(UnitItem::Switch), children)
    }

    pub fn unit_switch_case(&mut self, item: NodeRef, exprs: Vec<NodeRef>) -> NodeRef {
        let children = std::iter::once(Some(item)).chain(exprs.into_iter().map(Some));
        self.node(NodeKind::UnitItem(UnitItem::SwitchCase { default: false }), children)
    }

    pub fn unit_switch_default(&mut self, item: NodeRef) -> NodeRef {
        self.node(NodeKind::UnitItem(UnitItem::SwitchCase { default: true }), [Some(item)])
    }

    /// `%id = value;`
    pub fn unit_property(&mut self, id: impl Into<Symbol>, value: Option<NodeRef>) -> NodeRef {
        self.node(NodeKind::UnitItem(UnitItem::Property { id: id.into() }), [value])
    }

    pub fn unit_sink(&mut self, id: impl Into<Symbol>, attributes: Option<NodeRef>) -> NodeRef {
        self.node(NodeKind::UnitItem(UnitItem::Sink { id: id.into() }), [attributes])
    }
}

impl AstContext {
    /// A copy of `qt` with its role switched to l-value.
    pub fn recreate_as_lhs(&mut self, qt: NodeRef) -> NodeRef {
        let copy = self.deep_clone(qt);
        if let NodeKind::QualifiedType(q) = self.kind_mut(copy) {
            q.side = Side::Lhs;
        }
        copy
    }

    /// A detached copy of a type for use in another slot. Declared types
    /// (those carrying a type ID) are referenced by name instead of
    /// duplicated, so recursive types stay finite.
    pub fn clone_type_reference(&mut self, t: NodeRef) -> NodeRef {
        let Some(u) = self.unqualified(t) else {
            return self.deep_clone(t);
        };
        let declared = self
            .parent(u)
            .and_then(|qt| self.parent(qt))
            .filter(|&d| self.declared_type(d) == Some(u));
        let Some(decl) = declared else {
            return self.deep_clone(t);
        };
        let (id, link) = match self.kind(decl) {
            NodeKind::Declaration(d) => (d.canonical_id.unwrap_or(d.id), self.link_to(decl)),
            _ => return self.deep_clone(t),
        };
        let name = self.create_node(
            NodeKind::Type(UnqualifiedType::new(TypeKind::Name {
                id: QualifiedId::from(id),
                resolved: Some(link),
            })),
            [],
            self.location(u),
        );
        match self.qualifiers(t) {
            Some(q) => self.create_node(NodeKind::QualifiedType(q), [Some(name)], self.location(t)),
            None => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_types_are_lvalues() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_signed_integer(32);
        let qt = b.qualified(t, Constness::Mutable);
        let decl = b.decl_local("x", qt, None);
        let stored = ctx.child(decl, 0).unwrap();
        assert_eq!(ctx.qualifiers(stored).unwrap().side, Side::Lhs);
    }

    #[test]
    fn ctor_types_are_const() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let e = b.expr_int(5);
        let qt = ctx.expression_type(e).unwrap();
        assert!(ctx.qualifiers(qt).unwrap().is_const());
        assert_eq!(
            ctx.followed_kind(qt),
            Some(&TypeKind::SignedInteger { width: 64 })
        );
    }

    #[test]
    fn tuple_ctor_typed_from_elements() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let a = b.expr_int(1);
        let s = b.expr_string("x");
        let tuple = b.ctor_tuple(vec![a, s]);
        let tt = ctx.child(tuple, 0).and_then(|q| ctx.unqualified(q)).unwrap();
        assert_eq!(ctx.type_kind(tt), Some(&TypeKind::Tuple));
        assert_eq!(ctx.children(tt).len(), 2);

        let mut b = Builder::new(&mut ctx);
        let n = b.expr_name("y");
        let unknown = b.ctor_tuple(vec![n]);
        let ut = ctx.child(unknown, 0).and_then(|q| ctx.unqualified(q)).unwrap();
        assert_eq!(ctx.type_kind(ut), Some(&TypeKind::Auto));
    }

    #[test]
    fn list_element_type_through_iterator() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_unsigned_integer(8);
        let qt = b.qualified(t, Constness::Mutable);
        let list = b.type_list(qt);
        let elem = ctx.element_type(list).unwrap();
        assert_eq!(elem, qt);
    }
}
