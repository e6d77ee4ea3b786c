//! Interned identifiers and `::`-separated qualified IDs.

use std::sync::LazyLock;

use lasso::{Rodeo, Spur};
use parking_lot::RwLock;
use smallvec::SmallVec;

// ============================================================================
// Symbol
// ============================================================================

/// Process-wide table of identifier texts. Lookups of known text only take
/// the read lock.
struct Interner(RwLock<Rodeo>);

impl Interner {
    fn intern(&self, text: &str, insert: impl FnOnce(&mut Rodeo) -> Spur) -> Spur {
        if let Some(key) = self.0.read().get(text) {
            return key;
        }
        // Another thread may have won the race; `insert` re-checks.
        insert(&mut self.0.write())
    }

    fn text<R>(&self, key: Spur, f: impl FnOnce(&str) -> R) -> R {
        f(self.0.read_recursive().resolve(&key))
    }
}

static IDENTIFIERS: LazyLock<Interner> = LazyLock::new(|| Interner(RwLock::new(Rodeo::default())));

/// An interned identifier: declaration IDs, attribute tags, operator
/// namespaces and production symbols all use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    pub fn new(text: &'static str) -> Self {
        Symbol(IDENTIFIERS.intern(text, |r| r.get_or_intern_static(text)))
    }

    /// Intern text built at run time, such as a rendered qualified ID.
    pub fn from_dynamic(text: &str) -> Self {
        Symbol(IDENTIFIERS.intern(text, |r| r.get_or_intern(text)))
    }

    /// Run `f` on the text. Symbols may be printed inside `f`, but not
    /// interned.
    pub fn with_text<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        IDENTIFIERS.text(self.0, f)
    }

    /// Whether the text is a `::`-separated path.
    pub fn is_qualified(&self) -> bool {
        self.with_text(|s| s.contains("::"))
    }
}

impl From<&'static str> for Symbol {
    fn from(text: &'static str) -> Self {
        Symbol::new(text)
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.with_text(|s| s == other)
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_text(|s| f.write_str(s))
    }
}

/// Named accessors for fixed symbols. Each accessor interns its text on
/// first use and caches the key.
///
/// ```
/// weave_core::symbols! {
///     ATTR_SIZE => "&size",
/// }
/// assert_eq!(ATTR_SIZE(), "&size");
/// ```
#[macro_export]
macro_rules! symbols {
    ($($(#[$attr:meta])* $name:ident => $text:literal),* $(,)?) => {
        $(
            $(#[$attr])*
            #[doc = concat!("The symbol `", $text, "`.")]
            #[allow(non_snake_case)]
            pub fn $name() -> $crate::Symbol {
                static KEY: ::std::sync::OnceLock<$crate::Symbol> = ::std::sync::OnceLock::new();
                *KEY.get_or_init(|| $crate::Symbol::new($text))
            }
        )*
    };
}

// ============================================================================
// Qualified IDs
// ============================================================================

/// A `::`-separated identifier such as `Foo::bar` or `m::Color::Red`.
///
/// Non-empty: every qualified ID has at least its final segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedId {
    parent: SmallVec<[Symbol; 4]>,
    name: Symbol,
}

impl QualifiedId {
    /// Build from segments. Returns `None` if there are none.
    pub fn new(segments: impl IntoIterator<Item = Symbol>) -> Option<Self> {
        let mut parent: SmallVec<[Symbol; 4]> = segments.into_iter().collect();
        let name = parent.pop()?;
        Some(Self { parent, name })
    }

    /// A single-segment ID.
    pub fn simple(name: Symbol) -> Self {
        Self {
            parent: SmallVec::new(),
            name,
        }
    }

    /// Split `a::b::c` into its segments. Empty segments are dropped.
    pub fn parse(text: &str) -> Option<Self> {
        Self::new(
            text.split("::")
                .filter(|s| !s.is_empty())
                .map(Symbol::from_dynamic),
        )
    }

    /// All segments, outermost first.
    pub fn segments(&self) -> SmallVec<[Symbol; 6]> {
        let mut result = SmallVec::with_capacity(self.parent.len() + 1);
        result.extend_from_slice(&self.parent);
        result.push(self.name);
        result
    }

    /// Everything but the final segment.
    pub fn parent(&self) -> &[Symbol] {
        &self.parent
    }

    /// The final segment.
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// The first segment.
    pub fn first(&self) -> Symbol {
        self.parent.first().copied().unwrap_or(self.name)
    }

    /// The ID with its first segment removed, if any segments remain.
    pub fn rest(&self) -> Option<QualifiedId> {
        if self.is_simple() {
            return None;
        }
        QualifiedId::new(self.segments().into_iter().skip(1))
    }

    pub fn is_simple(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of segments (always at least 1).
    pub fn len(&self) -> usize {
        self.parent.len() + 1
    }

    /// Append a segment: `a::b` + `c` = `a::b::c`.
    pub fn join(&self, name: Symbol) -> QualifiedId {
        let mut parent = self.parent.clone();
        parent.push(self.name);
        QualifiedId { parent, name }
    }

    /// Intern the rendered form.
    pub fn to_symbol(&self) -> Symbol {
        if self.is_simple() {
            self.name
        } else {
            Symbol::from_dynamic(&self.to_string())
        }
    }
}

impl std::fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for seg in &self.parent {
            write!(f, "{seg}::")?;
        }
        write!(f, "{}", self.name)
    }
}

impl From<Symbol> for QualifiedId {
    fn from(symbol: Symbol) -> Self {
        QualifiedId::parse(&symbol.to_string()).unwrap_or(QualifiedId::simple(symbol))
    }
}

impl From<&'static str> for QualifiedId {
    fn from(text: &'static str) -> Self {
        QualifiedId::from(Symbol::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_intern_to_same_key() {
        let a = Symbol::new("foo");
        let b = Symbol::from_dynamic(&String::from("foo"));
        assert_eq!(a, b);
        assert_eq!(a, "foo");
        assert_ne!(a, Symbol::new("bar"));
        assert!(Symbol::new("m::x").is_qualified());
    }

    #[test]
    fn symbols_print_inside_with_text() {
        let a = Symbol::new("outer");
        let joined = a.with_text(|s| format!("{s}::{a}"));
        assert_eq!(joined, "outer::outer");
    }

    crate::symbols! {
        CACHED => "&cached",
    }

    #[test]
    fn symbols_macro_caches_keys() {
        assert_eq!(CACHED(), CACHED());
        assert_eq!(CACHED(), Symbol::new("&cached"));
    }

    #[test]
    fn qualified_id_parse_and_display() {
        let id = QualifiedId::parse("m::Color::Red").unwrap();
        assert_eq!(id.len(), 3);
        assert_eq!(id.first(), "m");
        assert_eq!(id.name(), "Red");
        assert_eq!(id.to_string(), "m::Color::Red");
        assert_eq!(id.rest().unwrap().to_string(), "Color::Red");
        assert!(QualifiedId::parse("").is_none());
    }

    #[test]
    fn qualified_id_join() {
        let id = QualifiedId::simple(Symbol::new("m")).join(Symbol::new("x"));
        assert_eq!(id.to_string(), "m::x");
        assert_eq!(id.to_symbol(), "m::x");
        assert!(QualifiedId::from("x").is_simple());
    }
}
