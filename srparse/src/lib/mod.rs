#![allow(clippy::new_without_default)]
#![forbid(unsafe_code)]

//! The runtime parse engine of the srtools toolkit. A [`Parser`] is built
//! once from an [`srgrammar::Grammar`] and can then parse any number of
//! token streams, concurrently if desired. Tokens come from the caller's
//! own lexer via the [`Token`] and [`TokenStream`] traits; the parser
//! matches them to the grammar by name.
//!
//! [`Parser::parse`] builds a generic parse tree. When a tree is not
//! wanted, [`Parser::parse_with`] calls a hook at every reduction instead,
//! so values (ASTs, evaluation results, and so on) can be built bottom-up
//! without materialising nodes. Long-running parses can be interrupted from
//! another thread with [`Parser::parse_with_cancel`].
//!
//! ```
//! use srgrammar::{GrammarBuilder, GrammarSymbol, Span};
//! use srparse::{ParserBuilder, Token};
//!
//! struct Tok {
//!     kind: &'static str,
//!     off: usize,
//! }
//!
//! impl Token for Tok {
//!     fn kind(&self) -> &str {
//!         self.kind
//!     }
//!
//!     fn span(&self) -> Span {
//!         Span::new(self.off, self.off + 1)
//!     }
//! }
//!
//! // List: List 'x' | 'x';
//! let grm = GrammarBuilder::new()
//!     .start("List")
//!     .prod("List", vec![GrammarSymbol::rule("List"), GrammarSymbol::token("x")])
//!     .prod("List", vec![GrammarSymbol::token("x")])
//!     .build::<u32>()
//!     .unwrap();
//! let parser = ParserBuilder::new().build(grm).unwrap();
//! let toks = vec![Tok { kind: "x", off: 0 }, Tok { kind: "x", off: 1 }];
//! let tree = parser.parse(toks.into_iter().peekable()).unwrap();
//! assert_eq!(tree.span().map(|s| (s.start(), s.end())), Some((0, 2)));
//! ```

mod parser;
mod tokens;

pub use crate::parser::{Node, ParseError, ParseValue, Parser, ParserBuilder, Reduction};
pub use crate::tokens::{Token, TokenStream};

// Re-exported so that callers choosing a table algorithm, or matching on
// build errors, don't need a direct srtable dependency.
pub use srtable::{Algorithm, AmbiguousGrammarError, AmbiguousGrammarErrorKind};
