use std::{error::Error, fmt};

use indexmap::{IndexMap, IndexSet};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::grammar::Grammar;

/// A symbol as it appears in a production handed to a [`GrammarBuilder`]:
/// rules and tokens are referenced by name, before any index has been
/// assigned to them.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum GrammarSymbol {
    Rule(String),
    Token(String),
}

impl GrammarSymbol {
    /// Shorthand for `GrammarSymbol::Rule(name.to_string())`.
    pub fn rule<S: Into<String>>(name: S) -> Self {
        GrammarSymbol::Rule(name.into())
    }

    /// Shorthand for `GrammarSymbol::Token(name.to_string())`.
    pub fn token<S: Into<String>>(name: S) -> Self {
        GrammarSymbol::Token(name.into())
    }
}

impl fmt::Display for GrammarSymbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GrammarSymbol::Rule(s) => write!(f, "{}", s),
            GrammarSymbol::Token(s) => write!(f, "'{}'", s),
        }
    }
}

/// Incrementally describes a grammar, then freezes it into an immutable
/// [`Grammar`] with [`build`](GrammarBuilder::build).
///
/// Rules come into existence the first time a production is added for them;
/// tokens come into existence the first time a production references them.
/// The order in which productions are added is significant: it is the order
/// in which the built grammar numbers them, and the table builder uses that
/// numbering to break reduce/reduce ties in favour of the earliest
/// production.
///
/// ```
/// use srgrammar::{GrammarBuilder, GrammarSymbol};
///
/// let grm = GrammarBuilder::new()
///     .start("Expr")
///     .prod("Expr", vec![GrammarSymbol::rule("Expr"),
///                        GrammarSymbol::token("+"),
///                        GrammarSymbol::rule("Num")])
///     .prod("Expr", vec![GrammarSymbol::rule("Num")])
///     .prod("Num", vec![GrammarSymbol::token("INT")])
///     .build::<u32>()
///     .unwrap();
/// assert_eq!(usize::from(grm.prods_len()), 4); // 3 + the start production
/// ```
pub struct GrammarBuilder {
    pub(crate) start: Option<String>,
    // Maps a rule name to indices into `prods`. An IndexMap retains the order
    // in which rules were first mentioned.
    pub(crate) rules: IndexMap<String, Vec<usize>>,
    pub(crate) prods: Vec<Vec<GrammarSymbol>>,
    pub(crate) tokens: IndexSet<String>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder {
            start: None,
            rules: IndexMap::new(),
            prods: Vec::new(),
            tokens: IndexSet::new(),
        }
    }

    /// Designate `name` as the start rule. Calling this a second time
    /// replaces the earlier designation.
    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.to_string());
        self
    }

    /// Add a production `rule_name: symbols;`. An empty `symbols` adds an
    /// epsilon production. Rules referenced in `symbols` need not exist yet,
    /// but must have at least one production of their own by the time
    /// [`build`](GrammarBuilder::build) is called.
    pub fn prod(mut self, rule_name: &str, symbols: Vec<GrammarSymbol>) -> Self {
        for sym in &symbols {
            if let GrammarSymbol::Token(name) = sym {
                self.tokens.insert(name.clone());
            }
        }
        self.rules
            .entry(rule_name.to_string())
            .or_default()
            .push(self.prods.len());
        self.prods.push(symbols);
        self
    }

    /// Validate the description and freeze it into a [`Grammar`], checking
    /// that:
    ///   1) a start rule was designated and has at least one production;
    ///   2) every rule referenced in a production body has at least one
    ///      production (the grammar is closed);
    ///   3) `StorageT` is big enough to index every rule, production, token,
    ///      and production body position.
    pub fn build<StorageT: 'static + PrimInt + Unsigned>(
        self,
    ) -> Result<Grammar<StorageT>, MalformedGrammarError>
    where
        usize: AsPrimitive<StorageT>,
    {
        self.validate()?;
        Grammar::new(self)
    }

    fn validate(&self) -> Result<(), MalformedGrammarError> {
        match self.start {
            None => {
                return Err(MalformedGrammarError {
                    kind: MalformedGrammarErrorKind::NoStartRule,
                    name: None,
                });
            }
            Some(ref s) => {
                if !self.rules.contains_key(s) {
                    return Err(MalformedGrammarError {
                        kind: MalformedGrammarErrorKind::InvalidStartRule,
                        name: Some(s.clone()),
                    });
                }
            }
        }
        for prod in &self.prods {
            for sym in prod {
                if let GrammarSymbol::Rule(name) = sym {
                    if !self.rules.contains_key(name) {
                        return Err(MalformedGrammarError {
                            kind: MalformedGrammarErrorKind::UndefinedRule,
                            name: Some(name.clone()),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// The reasons a grammar description can be rejected at build time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedGrammarErrorKind {
    /// No start rule was designated.
    NoStartRule,
    /// The designated start rule has no productions.
    InvalidStartRule,
    /// A production body references a rule which has no productions of its
    /// own, so the grammar is not closed.
    UndefinedRule,
    /// `StorageT` cannot index every rule, production, token, or production
    /// body position of this grammar.
    TooManySymbols,
}

/// Returned when a grammar description fails validation. `name` identifies
/// the offending rule where one exists.
#[derive(Debug)]
pub struct MalformedGrammarError {
    pub kind: MalformedGrammarErrorKind,
    pub name: Option<String>,
}

impl Error for MalformedGrammarError {}

impl fmt::Display for MalformedGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            MalformedGrammarErrorKind::NoStartRule => {
                write!(f, "No start rule specified")
            }
            MalformedGrammarErrorKind::InvalidStartRule => {
                write!(
                    f,
                    "Start rule '{}' has no productions",
                    self.name.as_ref().unwrap()
                )
            }
            MalformedGrammarErrorKind::UndefinedRule => {
                write!(
                    f,
                    "Reference to rule '{}', which has no productions",
                    self.name.as_ref().unwrap()
                )
            }
            MalformedGrammarErrorKind::TooManySymbols => {
                write!(f, "Storage type is not big enough to index this grammar")
            }
        }
    }
}
