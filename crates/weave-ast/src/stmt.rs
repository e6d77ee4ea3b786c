/// Statement kinds.
///
/// `Block` holds statements, `Expression` `[0]` the expression,
/// `Declaration` `[0]` a local declaration, `Return` `[0]` an optional
/// value, `If` `[0]` condition `[1]` then `[2]` optional else, and `While`
/// `[0]` condition `[1]` body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statement {
    Block,
    Expression,
    Declaration,
    Return,
    If,
    While,
}

impl Statement {
    pub fn class_name(self) -> &'static str {
        match self {
            Statement::Block => "Block",
            Statement::Expression => "Expression",
            Statement::Declaration => "Declaration",
            Statement::Return => "Return",
            Statement::If => "If",
            Statement::While => "While",
        }
    }
}
