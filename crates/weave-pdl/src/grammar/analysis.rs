//! Nullable, FIRST and FOLLOW sets, and look-ahead checks.

use std::collections::BTreeSet;
use std::fmt;

use weave_ast::NodeRef;
use weave_core::{DebugStream, Location};

use super::{Grammar, ProductionKind, ProductionRef};

/// What a terminal production starts with.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    Literal(String),
    /// A value of the given type.
    Value(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(l) => write!(f, "literal {l}"),
            Token::Value(ty) => write!(f, "value of type {ty}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError {
    /// The unit item the offending production parses.
    pub field: Option<NodeRef>,
    pub location: Option<Location>,
    pub message: String,
}

fn token(kind: &ProductionKind) -> Option<Token> {
    match kind {
        ProductionKind::Ctor { literal } => Some(Token::Literal(literal.clone())),
        ProductionKind::TypeLiteral { ty } => Some(Token::Literal(format!("type({ty})"))),
        ProductionKind::Skip { ty } | ProductionKind::Variable { ty } => {
            Some(Token::Value(ty.clone()))
        }
        _ => None,
    }
}

impl Grammar {
    /// Compute attributes and look-ahead sets, then record ambiguities.
    pub(crate) fn analyze(&mut self) {
        self.compute_first();
        self.compute_follow();
        self.compute_lookaheads();
    }

    /// FIRST of a sequence of productions, and whether all of them are
    /// nullable.
    fn first_of_sequence(&self, items: &[ProductionRef]) -> (BTreeSet<Token>, bool) {
        let mut first = BTreeSet::new();
        for &item in items {
            first.extend(self.first(item).iter().cloned());
            if !self.is_nullable(item) {
                return (first, false);
            }
        }
        (first, true)
    }

    fn compute_first(&mut self) {
        let refs: Vec<ProductionRef> = self.productions.keys().collect();
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for &p in &refs {
                let kind = &self.productions[p].kind;
                let (nullable, first) = match kind {
                    ProductionKind::Ctor { .. }
                    | ProductionKind::TypeLiteral { .. }
                    | ProductionKind::Skip { .. }
                    | ProductionKind::Variable { .. } => (false, token(kind).into_iter().collect()),
                    ProductionKind::Epsilon => (true, BTreeSet::new()),
                    // Mirrors the target at query time.
                    ProductionKind::Reference(_) | ProductionKind::Resolved { .. } => continue,
                    ProductionKind::Sequence(items) | ProductionKind::Unit { fields: items, .. } => {
                        let (first, nullable) = self.first_of_sequence(items);
                        (nullable, first)
                    }
                    ProductionKind::Enclosure(body)
                    | ProductionKind::ByteBlock { body, .. } => {
                        (self.is_nullable(*body), self.first(*body).clone())
                    }
                    ProductionKind::Counter { body, .. }
                    | ProductionKind::While { body, .. } => (true, self.first(*body).clone()),
                    ProductionKind::ForEach { body, eod } => {
                        (*eod || self.is_nullable(*body), self.first(*body).clone())
                    }
                    ProductionKind::Boolean { .. }
                    | ProductionKind::Switch { .. }
                    | ProductionKind::LookAhead { .. } => {
                        let alternatives = kind.children();
                        let mut first = BTreeSet::new();
                        for &a in &alternatives {
                            first.extend(self.first(a).iter().cloned());
                        }
                        let mut nullable = alternatives.iter().any(|&a| self.is_nullable(a));
                        if let ProductionKind::Switch { default: None, .. } = kind {
                            // No case may match.
                            nullable = true;
                        }
                        (nullable, first)
                    }
                };
                let attrs = &mut self.attributes[p];
                if attrs.nullable != nullable || attrs.first != first {
                    attrs.nullable = nullable;
                    attrs.first = first;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        DebugStream::PdlGrammar.emit(&format!("{}: FIRST settled after {rounds} rounds", self.name));
    }

    fn compute_follow(&mut self) {
        let refs: Vec<ProductionRef> = self.productions.keys().collect();
        loop {
            let mut additions: Vec<(ProductionRef, BTreeSet<Token>)> = Vec::new();
            for &p in &refs {
                let follow = self.follow(p).clone();
                match &self.productions[p].kind {
                    ProductionKind::Sequence(items) | ProductionKind::Unit { fields: items, .. } => {
                        for (i, &item) in items.iter().enumerate() {
                            let (mut set, rest_nullable) = self.first_of_sequence(&items[i + 1..]);
                            if rest_nullable {
                                set.extend(follow.iter().cloned());
                            }
                            additions.push((item, set));
                        }
                    }
                    ProductionKind::Counter { body, .. }
                    | ProductionKind::ForEach { body, .. }
                    | ProductionKind::While { body, .. } => {
                        let mut set = self.first(*body).clone();
                        set.extend(follow.iter().cloned());
                        additions.push((*body, set));
                    }
                    kind => {
                        for child in kind.children() {
                            additions.push((child, follow.clone()));
                        }
                    }
                }
            }
            let mut changed = false;
            for (p, set) in additions {
                let target = self.resolve(p);
                let attrs = &mut self.attributes[target];
                for t in set {
                    changed |= attrs.follow.insert(t);
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn compute_lookaheads(&mut self) {
        let lookaheads: Vec<(ProductionRef, [ProductionRef; 2])> = self
            .productions
            .iter()
            .filter_map(|(p, prod)| match prod.kind {
                ProductionKind::LookAhead { alternatives } => Some((p, alternatives)),
                _ => None,
            })
            .collect();
        for (p, alternatives) in lookaheads {
            let sets = alternatives.map(|a| {
                let mut set = self.first(a).clone();
                if self.is_nullable(a) {
                    set.extend(self.follow(p).iter().cloned());
                }
                set
            });
            let shared: Vec<String> = sets[0].intersection(&sets[1]).map(|t| t.to_string()).collect();
            if !shared.is_empty() {
                let prod = &self.productions[p];
                let message = format!(
                    "ambiguous look-ahead in '{}': {} can start both alternatives",
                    prod.symbol,
                    shared.join(", ")
                );
                DebugStream::PdlGrammar.emit(&message);
                self.errors.push(GrammarError {
                    field: prod.field,
                    location: prod.location,
                    message,
                });
            }
            self.lookaheads.insert(p, sets);
        }
    }
}
