//! Parser grammars derived from unit types.
//!
//! Every unit type declaration yields a [`Grammar`]: an arena of
//! [`Production`]s rooted at the unit's `Unit` production. Units that refer
//! back to themselves, directly or through other units, are tied together
//! with `Resolved` placeholders that [`build_grammar`] patches once the
//! whole graph exists. [`Grammar::lookahead`] and [`Grammar::errors`] expose
//! the LL(1) analysis run afterwards.

mod analysis;
mod builder;
mod production;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use cranelift_entity::{PrimaryMap, SecondaryMap};
use weave_ast::NodeRef;
use weave_core::Location;

pub use analysis::{GrammarError, Token};
pub use builder::build_grammar;
pub use production::{Production, ProductionKind, ProductionRef};

#[derive(Clone, Debug, Default)]
struct Attributes {
    nullable: bool,
    first: BTreeSet<Token>,
    follow: BTreeSet<Token>,
}

#[derive(Debug)]
pub struct Grammar {
    name: String,
    root: Option<ProductionRef>,
    productions: PrimaryMap<ProductionRef, Production>,
    attributes: SecondaryMap<ProductionRef, Attributes>,
    lookaheads: HashMap<ProductionRef, [BTreeSet<Token>; 2]>,
    errors: Vec<GrammarError>,
}

impl Grammar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            productions: PrimaryMap::new(),
            attributes: SecondaryMap::new(),
            lookaheads: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// The canonical ID of the unit this grammar parses.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<ProductionRef> {
        self.root
    }

    pub fn add(
        &mut self,
        symbol: String,
        kind: ProductionKind,
        location: Option<Location>,
        field: Option<NodeRef>,
    ) -> ProductionRef {
        self.productions.push(Production {
            symbol,
            kind,
            location,
            field,
        })
    }

    pub fn get(&self, p: ProductionRef) -> &Production {
        &self.productions[p]
    }

    pub(crate) fn get_mut(&mut self, p: ProductionRef) -> &mut Production {
        &mut self.productions[p]
    }

    pub fn productions(&self) -> impl Iterator<Item = (ProductionRef, &Production)> {
        self.productions.iter()
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    /// The production with the given symbol, skipping references.
    pub fn find(&self, symbol: &str) -> Option<ProductionRef> {
        self.productions
            .iter()
            .find(|(_, prod)| {
                prod.symbol == symbol
                    && !matches!(
                        prod.kind,
                        ProductionKind::Reference(_) | ProductionKind::Resolved { .. }
                    )
            })
            .map(|(p, _)| p)
    }

    /// Chase `Reference` and patched `Resolved` productions to what they
    /// point at.
    pub fn resolve(&self, p: ProductionRef) -> ProductionRef {
        let mut current = p;
        for _ in 0..self.productions.len() {
            match self.productions[current].kind {
                ProductionKind::Reference(target)
                | ProductionKind::Resolved {
                    target: Some(target),
                } => current = target,
                _ => break,
            }
        }
        current
    }

    pub fn is_nullable(&self, p: ProductionRef) -> bool {
        self.attributes[self.resolve(p)].nullable
    }

    pub fn first(&self, p: ProductionRef) -> &BTreeSet<Token> {
        &self.attributes[self.resolve(p)].first
    }

    pub fn follow(&self, p: ProductionRef) -> &BTreeSet<Token> {
        &self.attributes[self.resolve(p)].follow
    }

    pub fn is_terminal(&self, p: ProductionRef) -> bool {
        self.productions[self.resolve(p)].kind.is_terminal()
    }

    pub fn is_literal(&self, p: ProductionRef) -> bool {
        self.productions[self.resolve(p)].kind.is_literal()
    }

    pub fn is_atomic(&self, p: ProductionRef) -> bool {
        let p = self.resolve(p);
        self.productions[p].kind.is_terminal()
            || matches!(self.productions[p].kind, ProductionKind::Epsilon)
    }

    /// Whether parsing may legitimately stop at the end of the input here.
    pub fn is_eod_ok(&self, p: ProductionRef) -> bool {
        let p = self.resolve(p);
        match &self.productions[p].kind {
            ProductionKind::ForEach { eod: true, .. }
            | ProductionKind::While {
                condition: None, ..
            } => true,
            ProductionKind::Sequence(items) => items.iter().all(|&i| self.is_eod_ok(i)),
            ProductionKind::Boolean {
                then, otherwise, ..
            } => self.is_eod_ok(*then) || self.is_eod_ok(*otherwise),
            ProductionKind::LookAhead { alternatives } => {
                alternatives.iter().any(|&a| self.is_eod_ok(a))
            }
            _ => self.is_nullable(p),
        }
    }

    /// The look-ahead sets of both alternatives of a `LookAhead`.
    pub fn lookahead(&self, p: ProductionRef) -> Option<&[BTreeSet<Token>; 2]> {
        self.lookaheads.get(&p)
    }

    /// Problems found by the analysis, such as ambiguous look-aheads.
    pub fn errors(&self) -> &[GrammarError] {
        &self.errors
    }

    /// The symbol a child is listed under; references show their target.
    fn child_symbol(&self, p: ProductionRef) -> &str {
        match self.productions[p].kind {
            ProductionKind::Resolved { target: None } => "<unresolved>",
            _ => &self.productions[self.resolve(p)].symbol,
        }
    }

    fn rhs(&self, kind: &ProductionKind) -> String {
        let sym = |p: &ProductionRef| self.child_symbol(*p).to_string();
        match kind {
            ProductionKind::Epsilon => "()".to_string(),
            ProductionKind::Ctor { literal } => literal.clone(),
            ProductionKind::TypeLiteral { ty } => format!("type({ty})"),
            ProductionKind::Boolean {
                predicate,
                then,
                otherwise,
            } => format!("{predicate} ? {} : {}", sym(then), sym(otherwise)),
            ProductionKind::ByteBlock { size, body } => format!("bytes({size}) {}", sym(body)),
            ProductionKind::Counter { count, body } => format!("count({count}) {}", sym(body)),
            ProductionKind::Sequence(items) => {
                items.iter().map(sym).collect::<Vec<_>>().join(" ")
            }
            ProductionKind::Enclosure(p) => format!("enclose {}", sym(p)),
            ProductionKind::ForEach { body, eod } => {
                let eod = if *eod { "(eod)" } else { "" };
                format!("foreach{eod} {}", sym(body))
            }
            ProductionKind::While { condition, body } => match condition {
                Some(c) => format!("while({c}) {}", sym(body)),
                None => format!("while(eod) {}", sym(body)),
            },
            ProductionKind::Switch {
                expr,
                cases,
                default,
            } => {
                let mut arms: Vec<String> = cases
                    .iter()
                    .map(|(labels, p)| format!("{} => {}", labels.join(", "), sym(p)))
                    .collect();
                if let Some(d) = default {
                    arms.push(format!("* => {}", sym(d)));
                }
                format!("switch({expr}) {}", arms.join(" | "))
            }
            ProductionKind::LookAhead { alternatives } => {
                format!("{} | {}", sym(&alternatives[0]), sym(&alternatives[1]))
            }
            ProductionKind::Reference(p) => format!("-> {}", sym(p)),
            ProductionKind::Resolved { target } => match target {
                Some(p) => format!("-> {}", sym(p)),
                None => "<unresolved>".to_string(),
            },
            ProductionKind::Skip { ty } => format!("skip({ty})"),
            ProductionKind::Variable { ty } => ty.clone(),
            ProductionKind::Unit { args, fields, .. } => {
                let mut rhs = if args.is_empty() {
                    "unit".to_string()
                } else {
                    format!("unit({})", args.join(", "))
                };
                for f in fields {
                    rhs.push(' ');
                    rhs.push_str(&sym(f));
                }
                rhs
            }
        }
    }
}

/// One line per production, `<symbol> -> <rhs>`, followed by attribute
/// markers. References are folded into the lines that use them.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (p, prod) in self.productions.iter() {
            if matches!(
                prod.kind,
                ProductionKind::Reference(_) | ProductionKind::Resolved { .. }
            ) {
                continue;
            }
            write!(f, "{} -> {}", prod.symbol, self.rhs(&prod.kind))?;
            if prod.kind.is_literal() {
                write!(f, " [literal]")?;
            }
            if self.attributes[p].nullable {
                write!(f, " [nullable]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
