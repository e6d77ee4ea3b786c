//! Node payloads and classification.

use smallvec::SmallVec;
use weave_core::{CompilationPhase, Location, Severity, Symbol};

use crate::{
    Ctor, DeclKind, Declaration, Expression, NodeRef, Qualifiers, ScopeRef, Statement, TypeKind,
    UnitItem, UnqualifiedType,
};

/// What a node is. Children are stored separately in [`NodeData`].
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// The single root of a compilation; children are modules.
    Root,
    Declaration(Declaration),
    Type(UnqualifiedType),
    QualifiedType(Qualifiers),
    Expression(Expression),
    Ctor(Ctor),
    Statement(Statement),
    /// `&tag` or `&tag=value`; child 0 is the optional value expression.
    Attribute { tag: Symbol },
    /// Children are attributes.
    AttributeSet,
    UnitItem(UnitItem),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Meta {
    pub location: Option<Location>,
    pub comments: Vec<String>,
}

/// An error attached to a node during processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeError {
    pub message: String,
    pub severity: Severity,
    pub phase: CompilationPhase,
}

/// Per-node storage in the arena.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    pub meta: Meta,
    pub(crate) children: SmallVec<[Option<NodeRef>; 4]>,
    pub(crate) parent: Option<NodeRef>,
    pub(crate) scope: Option<ScopeRef>,
    pub(crate) errors: Vec<NodeError>,
}

/// The language a node class belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    Gpil,
    Pdl,
}

/// Broad node categories, for typed child projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Declaration,
    Type,
    QualifiedType,
    Expression,
    Ctor,
    Statement,
    Attribute,
    UnitItem,
}

impl Category {
    pub fn matches(self, kind: &NodeKind) -> bool {
        matches!(
            (self, kind),
            (Category::Declaration, NodeKind::Declaration(_))
                | (Category::Type, NodeKind::Type(_))
                | (Category::QualifiedType, NodeKind::QualifiedType(_))
                | (Category::Expression, NodeKind::Expression(_))
                | (Category::Ctor, NodeKind::Ctor(_))
                | (Category::Statement, NodeKind::Statement(_))
                | (Category::Attribute, NodeKind::Attribute { .. })
                | (Category::UnitItem, NodeKind::UnitItem(_))
        )
    }
}

/// Concrete node classes as seen by visitor dispatch.
///
/// Types without a dedicated visitor method fall under `TypeOther`, and
/// ctors likewise under `CtorOther`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Root,
    Module,
    ImportedModule,
    TypeDeclaration,
    Constant,
    GlobalVariable,
    LocalVariable,
    Parameter,
    Function,
    Field,
    EnumLabel,
    QualifiedType,
    TypeName,
    TypeEnum,
    TypeStruct,
    TypeUnion,
    TypeFunction,
    TypeList,
    TypeTuple,
    TypeUnit,
    TypeSink,
    TypeOther,
    ExprName,
    ExprCtor,
    ExprUnresolvedOperator,
    ExprResolvedOperator,
    ExprCoerced,
    ExprAssign,
    ExprLogicalAnd,
    ExprLogicalOr,
    ExprLogicalNot,
    ExprTernary,
    ExprMember,
    ExprType,
    ExprKeyword,
    CtorTuple,
    CtorList,
    CtorEnum,
    CtorOther,
    StmtBlock,
    StmtExpression,
    StmtDeclaration,
    StmtReturn,
    StmtIf,
    StmtWhile,
    Attribute,
    AttributeSet,
    UnitField,
    UnitVariable,
    UnitSwitch,
    UnitSwitchCase,
    UnitProperty,
    UnitSink,
}

impl NodeClass {
    pub fn dialect(self) -> Dialect {
        match self {
            NodeClass::TypeUnit
            | NodeClass::TypeSink
            | NodeClass::UnitField
            | NodeClass::UnitVariable
            | NodeClass::UnitSwitch
            | NodeClass::UnitSwitchCase
            | NodeClass::UnitProperty
            | NodeClass::UnitSink => Dialect::Pdl,
            _ => Dialect::Gpil,
        }
    }
}

impl NodeKind {
    pub fn class(&self) -> NodeClass {
        match self {
            NodeKind::Root => NodeClass::Root,
            NodeKind::Declaration(d) => match d.kind {
                DeclKind::Module => NodeClass::Module,
                DeclKind::ImportedModule { .. } => NodeClass::ImportedModule,
                DeclKind::Type => NodeClass::TypeDeclaration,
                DeclKind::Constant => NodeClass::Constant,
                DeclKind::GlobalVariable => NodeClass::GlobalVariable,
                DeclKind::LocalVariable => NodeClass::LocalVariable,
                DeclKind::Parameter { .. } => NodeClass::Parameter,
                DeclKind::Function(_) => NodeClass::Function,
                DeclKind::Field => NodeClass::Field,
                DeclKind::EnumLabel { .. } => NodeClass::EnumLabel,
            },
            NodeKind::Type(t) => match t.kind {
                TypeKind::Name { .. } => NodeClass::TypeName,
                TypeKind::Enum => NodeClass::TypeEnum,
                TypeKind::Struct => NodeClass::TypeStruct,
                TypeKind::Union => NodeClass::TypeUnion,
                TypeKind::Function => NodeClass::TypeFunction,
                TypeKind::List => NodeClass::TypeList,
                TypeKind::Tuple => NodeClass::TypeTuple,
                TypeKind::Unit => NodeClass::TypeUnit,
                TypeKind::Sink => NodeClass::TypeSink,
                _ => NodeClass::TypeOther,
            },
            NodeKind::QualifiedType(_) => NodeClass::QualifiedType,
            NodeKind::Expression(e) => match e {
                Expression::Name { .. } => NodeClass::ExprName,
                Expression::Ctor => NodeClass::ExprCtor,
                Expression::UnresolvedOperator(_) => NodeClass::ExprUnresolvedOperator,
                Expression::ResolvedOperator { .. } => NodeClass::ExprResolvedOperator,
                Expression::Coerced => NodeClass::ExprCoerced,
                Expression::Assign => NodeClass::ExprAssign,
                Expression::LogicalAnd => NodeClass::ExprLogicalAnd,
                Expression::LogicalOr => NodeClass::ExprLogicalOr,
                Expression::LogicalNot => NodeClass::ExprLogicalNot,
                Expression::Ternary => NodeClass::ExprTernary,
                Expression::Member(_) => NodeClass::ExprMember,
                Expression::TypeExpr => NodeClass::ExprType,
                Expression::Keyword(_) => NodeClass::ExprKeyword,
            },
            NodeKind::Ctor(c) => match c {
                Ctor::Tuple => NodeClass::CtorTuple,
                Ctor::List => NodeClass::CtorList,
                Ctor::Enum { .. } => NodeClass::CtorEnum,
                _ => NodeClass::CtorOther,
            },
            NodeKind::Statement(s) => match s {
                Statement::Block => NodeClass::StmtBlock,
                Statement::Expression => NodeClass::StmtExpression,
                Statement::Declaration => NodeClass::StmtDeclaration,
                Statement::Return => NodeClass::StmtReturn,
                Statement::If => NodeClass::StmtIf,
                Statement::While => NodeClass::StmtWhile,
            },
            NodeKind::Attribute { .. } => NodeClass::Attribute,
            NodeKind::AttributeSet => NodeClass::AttributeSet,
            NodeKind::UnitItem(u) => match u {
                UnitItem::Field { .. } => NodeClass::UnitField,
                UnitItem::Variable { .. } => NodeClass::UnitVariable,
                UnitItem::Switch => NodeClass::UnitSwitch,
                UnitItem::SwitchCase { .. } => NodeClass::UnitSwitchCase,
                UnitItem::Property { .. } => NodeClass::UnitProperty,
                UnitItem::Sink { .. } => NodeClass::UnitSink,
            },
        }
    }

    /// Fully qualified class name, e.g. `declaration::Function` or
    /// `pdl::unit::Field`.
    pub fn class_name(&self) -> String {
        match self {
            NodeKind::Root => "Root".to_string(),
            NodeKind::Declaration(d) => format!("declaration::{}", d.kind.name()),
            NodeKind::Type(t) if matches!(t.kind, TypeKind::Unit | TypeKind::Sink) => {
                format!("pdl::type::{}", t.kind.class_name())
            }
            NodeKind::Type(t) => format!("type::{}", t.kind.class_name()),
            NodeKind::QualifiedType(_) => "QualifiedType".to_string(),
            NodeKind::Expression(e) => format!("expression::{}", e.class_name()),
            NodeKind::Ctor(c) => format!("ctor::{}", c.class_name()),
            NodeKind::Statement(s) => format!("statement::{}", s.class_name()),
            NodeKind::Attribute { .. } => "Attribute".to_string(),
            NodeKind::AttributeSet => "AttributeSet".to_string(),
            NodeKind::UnitItem(u) => format!("pdl::unit::{}", u.class_name()),
        }
    }

    pub fn as_declaration(&self) -> Option<&Declaration> {
        match self {
            NodeKind::Declaration(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_declaration_mut(&mut self) -> Option<&mut Declaration> {
        match self {
            NodeKind::Declaration(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            NodeKind::Expression(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_ctor(&self) -> Option<&Ctor> {
        match self {
            NodeKind::Ctor(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_unit_item(&self) -> Option<&UnitItem> {
        match self {
            NodeKind::UnitItem(u) => Some(u),
            _ => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, NodeKind::Expression(_))
    }
}
