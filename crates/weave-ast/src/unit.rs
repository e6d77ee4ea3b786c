//! PDL unit items. These live inside a `unit` type.

use weave_core::Symbol;

/// Items of a unit type.
///
/// - `Field`: `[0]` parse type, `[1]` optional literal ctor expression,
///   `[2]` optional condition, `[3]` optional attribute set. A field with a
///   ctor parses exactly that literal; `[0]` is then the ctor's type.
/// - `Variable`: `[0]` type, `[1]` optional default, `[2]` optional
///   attribute set.
/// - `Switch`: `[0]` optional discriminator expression, then cases.
/// - `SwitchCase`: `[0]` the item parsed, then the case expressions.
/// - `Property`: `[0]` optional value.
/// - `Sink`: `[0]` optional attribute set.
#[derive(Clone, Debug, PartialEq)]
pub enum UnitItem {
    Field { id: Option<Symbol>, skip: bool },
    Variable { id: Symbol },
    Switch,
    SwitchCase { default: bool },
    Property { id: Symbol },
    Sink { id: Symbol },
}

impl UnitItem {
    pub fn class_name(&self) -> &'static str {
        match self {
            UnitItem::Field { .. } => "Field",
            UnitItem::Variable { .. } => "Variable",
            UnitItem::Switch => "Switch",
            UnitItem::SwitchCase { .. } => "SwitchCase",
            UnitItem::Property { .. } => "Property",
            UnitItem::Sink { .. } => "Sink",
        }
    }

    /// The ID an item declares inside its unit's scope.
    pub fn id(&self) -> Option<Symbol> {
        match self {
            UnitItem::Field { id, .. } => *id,
            UnitItem::Variable { id } | UnitItem::Sink { id } => Some(*id),
            UnitItem::Switch | UnitItem::SwitchCase { .. } | UnitItem::Property { .. } => None,
        }
    }
}
