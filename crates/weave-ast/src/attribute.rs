//! Attribute sets (`&size=4 &eod ...`).

use weave_core::Symbol;

use crate::{AstContext, Ctor, NodeKind, NodeRef};

/// Why an attribute's value could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeError {
    MissingValue(Symbol),
    NotAnExpression(Symbol),
    WrongType { tag: Symbol, expected: &'static str },
}

impl std::fmt::Display for AttributeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeError::MissingValue(tag) => write!(f, "attribute '{tag}' requires an argument"),
            AttributeError::NotAnExpression(tag) => {
                write!(f, "value of attribute '{tag}' must be an expression")
            }
            AttributeError::WrongType { tag, expected } => {
                write!(f, "value of attribute '{tag}' must be {expected}")
            }
        }
    }
}

impl AstContext {
    pub fn attribute_tag(&self, attr: NodeRef) -> Option<Symbol> {
        match self.kind(attr) {
            NodeKind::Attribute { tag } => Some(*tag),
            _ => None,
        }
    }

    /// The first attribute in `set` carrying `tag`.
    pub fn find_attribute(&self, set: Option<NodeRef>, tag: Symbol) -> Option<NodeRef> {
        self.find_attributes(set, tag).next()
    }

    /// Every attribute in `set` carrying `tag`.
    pub fn find_attributes(
        &self,
        set: Option<NodeRef>,
        tag: Symbol,
    ) -> impl Iterator<Item = NodeRef> + '_ {
        set.into_iter()
            .flat_map(move |s| self.children(s).iter().flatten().copied())
            .filter(move |&a| self.attribute_tag(a) == Some(tag))
    }

    pub fn has_attribute(&self, set: Option<NodeRef>, tag: Symbol) -> bool {
        self.find_attribute(set, tag).is_some()
    }

    /// Remove every attribute carrying `tag` from `set`.
    pub fn remove_attribute(&mut self, set: NodeRef, tag: Symbol) {
        while let Some(index) = self
            .children(set)
            .iter()
            .position(|c| c.is_some_and(|a| self.attribute_tag(a) == Some(tag)))
        {
            self.remove_child(set, index);
        }
    }

    /// The attribute's value expression.
    pub fn attribute_value(&self, attr: NodeRef) -> Result<NodeRef, AttributeError> {
        let tag = self.attribute_tag(attr).unwrap_or_else(|| Symbol::new("<not an attribute>"));
        let value = self.child(attr, 0).ok_or(AttributeError::MissingValue(tag))?;
        if self.kind(value).is_expression() {
            Ok(value)
        } else {
            Err(AttributeError::NotAnExpression(tag))
        }
    }

    /// The value as a string literal.
    pub fn attribute_string(&self, attr: NodeRef) -> Result<String, AttributeError> {
        let value = self.attribute_value(attr)?;
        match self.ctor_of(value).map(|c| self.kind(c)) {
            Some(NodeKind::Ctor(Ctor::String(s))) => Ok(s.clone()),
            _ => Err(self.wrong_type(attr, "a string")),
        }
    }

    /// The value as an integer literal.
    pub fn attribute_integer(&self, attr: NodeRef) -> Result<i128, AttributeError> {
        let value = self.attribute_value(attr)?;
        match self.ctor_of(value).map(|c| self.kind(c)) {
            Some(NodeKind::Ctor(Ctor::SignedInteger { value, .. })) => Ok(i128::from(*value)),
            Some(NodeKind::Ctor(Ctor::UnsignedInteger { value, .. })) => Ok(i128::from(*value)),
            _ => Err(self.wrong_type(attr, "an integer")),
        }
    }

    fn wrong_type(&self, attr: NodeRef, expected: &'static str) -> AttributeError {
        AttributeError::WrongType {
            tag: self.attribute_tag(attr).unwrap_or_else(|| Symbol::new("<not an attribute>")),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    #[test]
    fn find_and_remove() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let four = b.expr_uint(4);
        let size = b.attribute("&size", Some(four));
        let eod = b.attribute("&eod", None);
        let eod2 = b.attribute("&eod", None);
        let set = b.attribute_set(vec![size, eod, eod2]);

        assert_eq!(ctx.find_attribute(Some(set), Symbol::new("&size")), Some(size));
        assert_eq!(ctx.find_attributes(Some(set), Symbol::new("&eod")).count(), 2);
        assert_eq!(ctx.attribute_integer(size), Ok(4));
        assert_eq!(
            ctx.attribute_value(eod),
            Err(AttributeError::MissingValue(Symbol::new("&eod")))
        );

        ctx.remove_attribute(set, Symbol::new("&eod"));
        assert!(!ctx.has_attribute(Some(set), Symbol::new("&eod")));
        assert_eq!(ctx.children(set).len(), 1);
        assert!(!ctx.has_attribute(None, Symbol::new("&size")));
    }

    #[test]
    fn typed_value_accessors() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let s = b.expr_string("utf8");
        let attr = b.attribute("&charset", Some(s));
        assert_eq!(ctx.attribute_string(attr), Ok("utf8".to_string()));
        assert_eq!(
            ctx.attribute_integer(attr).unwrap_err().to_string(),
            "value of attribute '&charset' must be an integer"
        );
    }
}
