#![allow(clippy::new_without_default)]
#![forbid(unsafe_code)]

//! A library for building and querying context-free grammars, intended as the
//! input stage of a shift-reduce parsing pipeline. Grammars are assembled
//! programmatically with [`GrammarBuilder`] and frozen into an immutable,
//! densely indexed [`Grammar`].
//!
//! Context-free grammar terminology is used inconsistently across tools and
//! papers, so this library pins down the following meanings:
//!
//!   * A *grammar* is an ordered sequence of *productions*.
//!   * A *production* is an ordered sequence of *symbols*.
//!   * A *rule* maps a name to one or more productions.
//!   * A *token* is the name of a class of input (a terminal symbol).
//!
//! For example, in the grammar:
//!
//! ```text
//!   R1: "a" "b" | R2;
//!   R2: "c";
//! ```
//!
//! the following statements are true:
//!
//!   * There are 3 productions. 1: ["a", "b"] 2: ["R2"] 3: ["c"]
//!   * There are two rules: R1 and R2. The mapping to productions is
//!     {R1: {1, 2}, R2: {3}}
//!   * There are three tokens: a, b, and c.
//!
//! srgrammar makes the following guarantees about a built [`Grammar`]:
//!
//!   * Productions are numbered from `0` to `prods_len() - 1` (inclusive).
//!     Productions passed to the builder keep their declaration order; the
//!     synthesised start production is numbered last.
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive). The
//!     synthesised start rule is rule 0.
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive), in
//!     order of first appearance in a production; the reserved end-of-input
//!     token is numbered last and has no name.
//!   * The `StorageT` type used to store production, rule, and token indices
//!     can be infallibly converted into `usize` (see [`TIdx`] and friends).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod builder;
mod firsts;
mod follows;
mod grammar;
mod idxnewtype;
mod span;

pub use crate::builder::{
    GrammarBuilder, GrammarSymbol, MalformedGrammarError, MalformedGrammarErrorKind,
};
pub use crate::firsts::Firsts;
pub use crate::follows::Follows;
pub use crate::grammar::{Grammar, GrammarWarning, GrammarWarningKind};
pub use crate::idxnewtype::{PIdx, RIdx, SIdx, TIdx};
pub use crate::span::Span;

/// A symbol in a production body, after name resolution.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Rule(RIdx<StorageT>),
    Token(TIdx<StorageT>),
}
