//! Declarations.

use weave_core::Symbol;

use crate::NodeRef;

/// Visibility of a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// Exported from its module.
    Public,
    /// Visible only inside its module.
    Private,
    /// Declared elsewhere and made visible through an import.
    Imported,
    /// A method belonging to a struct type.
    Struct,
}

impl Linkage {
    /// Whether lookups arriving through an import may see this declaration.
    pub fn is_exported(self) -> bool {
        matches!(self, Linkage::Public | Linkage::Struct)
    }
}

/// Non-owning link from a reference to the declaration it names.
///
/// The canonical ID captured at link time lets readers detect a link whose
/// target has since been replaced by a different declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeclLink {
    pub node: NodeRef,
    pub canonical_id: Option<Symbol>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub id: Symbol,
    pub linkage: Linkage,
    /// Globally unique path such as `m::S::x`, assigned once per declaration.
    pub canonical_id: Option<Symbol>,
    pub kind: DeclKind,
}

/// Concrete declaration kinds.
///
/// Child layout per kind:
///
/// | kind             | children                                      |
/// |------------------|-----------------------------------------------|
/// | `Module`         | declarations                                  |
/// | `ImportedModule` | none                                          |
/// | `Type`           | `[0]` qualified type                          |
/// | `Constant`       | `[0]` qualified type, `[1]` value             |
/// | `GlobalVariable` | `[0]` qualified type, `[1]` init (optional)   |
/// | `LocalVariable`  | `[0]` qualified type, `[1]` init (optional)   |
/// | `Parameter`      | `[0]` qualified type, `[1]` default (optional)|
/// | `Function`       | `[0]` qualified function type, `[1]` body (optional), `[2]` attributes (optional) |
/// | `Field`          | `[0]` qualified type, `[1]` attributes (optional) |
/// | `EnumLabel`      | none                                          |
#[derive(Clone, Debug, PartialEq)]
pub enum DeclKind {
    Module,
    ImportedModule { module: Symbol },
    Type,
    Constant,
    GlobalVariable,
    LocalVariable,
    Parameter { kind: ParameterKind },
    Function(FunctionInfo),
    Field,
    EnumLabel {
        value: Option<i64>,
        /// The `Undef` label every enum receives.
        implicit: bool,
        /// The type declaration of the owning enum, once linked.
        enum_type: Option<DeclLink>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    In,
    InOut,
    Copy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionInfo {
    /// For a method `T::m`, the type declaration of `T`.
    pub linked_type: Option<DeclLink>,
    /// The earlier prototype this definition implements, if any.
    pub linked_prototype: Option<DeclLink>,
}

impl DeclKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeclKind::Module => "Module",
            DeclKind::ImportedModule { .. } => "ImportedModule",
            DeclKind::Type => "Type",
            DeclKind::Constant => "Constant",
            DeclKind::GlobalVariable => "GlobalVariable",
            DeclKind::LocalVariable => "LocalVariable",
            DeclKind::Parameter { .. } => "Parameter",
            DeclKind::Function(_) => "Function",
            DeclKind::Field => "Field",
            DeclKind::EnumLabel { .. } => "EnumLabel",
        }
    }

    /// Declarations whose child 0 is the declared value's qualified type.
    pub fn has_value_type(&self) -> bool {
        matches!(
            self,
            DeclKind::Constant
                | DeclKind::GlobalVariable
                | DeclKind::LocalVariable
                | DeclKind::Parameter { .. }
                | DeclKind::Field
                | DeclKind::Function(_)
        )
    }
}
