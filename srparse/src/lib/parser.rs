use std::{
    error::Error,
    fmt::{self, Debug},
    hash::Hash,
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};

use fnv::FnvHashMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use srgrammar::{Grammar, PIdx, Span, TIdx};
use srtable::{
    Action, Algorithm, AmbiguousGrammarError, StIdx, StateGraph, StateTable, from_grammar,
};

use crate::tokens::{Token, TokenStream};

/// A generic parse tree, as built by [Parser::parse].
#[derive(Clone, Debug, PartialEq)]
pub enum Node<TokT, StorageT> {
    /// Terminal nodes wrap the token which was shifted from the input.
    Term { token: TokT },
    /// Nonterminal nodes record the production that was reduced and its
    /// children, one per symbol in the production's body (so a node for an
    /// empty production has no children).
    Nonterm {
        pidx: PIdx<StorageT>,
        nodes: Vec<Node<TokT, StorageT>>,
    },
}

impl<TokT: Token, StorageT: 'static + PrimInt + Unsigned> Node<TokT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return the span of input this node covers, or `None` if the node
    /// derives the empty string.
    pub fn span(&self) -> Option<Span> {
        match self {
            Node::Term { token } => Some(token.span()),
            Node::Nonterm { nodes, .. } => {
                let mut spans = nodes.iter().filter_map(|x| x.span());
                let fst = spans.next()?;
                let lst = spans.last().unwrap_or(fst);
                Some(Span::new(fst.start(), lst.end()))
            }
        }
    }

    /// Return a pretty-printed version of this node.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut st = vec![(0, self)]; // Stack of (indent level, node) pairs
        let mut s = String::new();
        while let Some((indent, e)) = st.pop() {
            for _ in 0..indent {
                s.push_str(" ");
            }
            match e {
                Node::Term { token } => {
                    s.push_str(&format!("{}\n", token.kind()));
                }
                Node::Nonterm { pidx, nodes } => {
                    s.push_str(&format!("{}\n", grm.rule_name(grm.prod_to_rule(*pidx))));
                    for x in nodes.iter().rev() {
                        st.push((indent + 1, x));
                    }
                }
            }
        }
        s
    }
}

/// A value on the parse stack: either a token shifted straight from the
/// input, or whatever a reduction hook produced for a nonterminal.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseValue<TokT, V> {
    Token(TokT),
    Value(V),
}

/// A single reduction step, passed to the hook of [Parser::parse_with]. The
/// production's body has already been popped from the parse stacks:
/// `children` holds one [ParseValue] per body symbol, in left-to-right
/// order.
#[derive(Debug)]
pub struct Reduction<StorageT, TokT, V> {
    /// The production being reduced.
    pub pidx: PIdx<StorageT>,
    /// The values of the production's body symbols.
    pub children: Vec<ParseValue<TokT, V>>,
}

/// The reasons a parse can fail.
#[derive(Debug)]
pub enum ParseError<StorageT, TokT> {
    /// The automaton had no action for the current state and lookahead.
    /// `token` is the offending token, or `None` if the parser was at the
    /// end of the input. `expected` names the tokens the state could have
    /// consumed, with `"$"` standing for the end of input.
    Syntax {
        stidx: StIdx,
        token: Option<TokT>,
        expected: Vec<String>,
    },
    /// The cancellation flag passed to [Parser::parse_with_cancel] was
    /// observed set.
    Cancelled,
    /// A reduction hook returned `None` for the given production.
    Hook { pidx: PIdx<StorageT> },
}

impl<StorageT: Debug, TokT: Debug + Token> Error for ParseError<StorageT, TokT> {}

impl<StorageT, TokT: Token> fmt::Display for ParseError<StorageT, TokT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Syntax {
                token, expected, ..
            } => {
                match token {
                    Some(t) => write!(
                        f,
                        "Parse error: unexpected '{}' at bytes {}..{}",
                        t.kind(),
                        t.span().start(),
                        t.span().end()
                    )?,
                    None => write!(f, "Parse error: unexpected end of input")?,
                }
                if !expected.is_empty() {
                    write!(f, " (expected one of: {})", expected.join(", "))?;
                }
                Ok(())
            }
            ParseError::Cancelled => write!(f, "Parse cancelled"),
            ParseError::Hook { .. } => write!(f, "Reduction hook produced no value"),
        }
    }
}

/// A parser for a single grammar, holding the state machine built from it.
/// Parsing takes `&self`, so one `Parser` can be shared freely between
/// threads.
pub struct Parser<StorageT: Eq + Hash = u32> {
    grm: Grammar<StorageT>,
    sgraph: StateGraph<StorageT>,
    stable: StateTable<StorageT>,
    token_kinds: FnvHashMap<String, TIdx<StorageT>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Parser<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Parse `ts` into a generic parse tree.
    pub fn parse<TokT: Token>(
        &self,
        ts: impl TokenStream<TokT>,
    ) -> Result<Node<TokT, StorageT>, ParseError<StorageT, TokT>> {
        self.parse_with(ts, |Reduction { pidx, children }| {
            let nodes = children
                .into_iter()
                .map(|pv| match pv {
                    ParseValue::Token(token) => Node::Term { token },
                    ParseValue::Value(node) => node,
                })
                .collect();
            Some(Node::Nonterm { pidx, nodes })
        })
    }

    /// Parse `ts`, calling `hook` for every reduction as it happens and
    /// returning the value `hook` produced for the start rule's production.
    /// Reductions are reported bottom-up: a production's children are
    /// reduced before the production itself. If `hook` returns `None` the
    /// parse stops immediately with [ParseError::Hook].
    pub fn parse_with<TokT: Token, V, F>(
        &self,
        ts: impl TokenStream<TokT>,
        mut hook: F,
    ) -> Result<V, ParseError<StorageT, TokT>>
    where
        F: FnMut(Reduction<StorageT, TokT, V>) -> Option<V>,
    {
        self.lr(ts, &mut hook, None)
    }

    /// As [Parser::parse_with], but additionally check `cancel` before
    /// every shift or reduce, ending the parse with [ParseError::Cancelled]
    /// as soon as the flag is observed set. The flag is typically stored by
    /// another thread; no guarantees are made about how many steps elapse
    /// between the store and the parser noticing it.
    pub fn parse_with_cancel<TokT: Token, V, F>(
        &self,
        ts: impl TokenStream<TokT>,
        mut hook: F,
        cancel: &AtomicBool,
    ) -> Result<V, ParseError<StorageT, TokT>>
    where
        F: FnMut(Reduction<StorageT, TokT, V>) -> Option<V>,
    {
        self.lr(ts, &mut hook, Some(cancel))
    }

    /// The grammar this parser was built from.
    pub fn grammar(&self) -> &Grammar<StorageT> {
        &self.grm
    }

    /// The state graph this parser's table was derived from.
    pub fn stategraph(&self) -> &StateGraph<StorageT> {
        &self.sgraph
    }

    /// The state table driving this parser.
    pub fn statetable(&self) -> &StateTable<StorageT> {
        &self.stable
    }

    /// The core LR driver. `pstack` holds state indices; `vstack` holds one
    /// entry fewer, the value of every symbol shifted or reduced so far.
    fn lr<TokT, TS, V, F>(
        &self,
        mut ts: TS,
        hook: &mut F,
        cancel: Option<&AtomicBool>,
    ) -> Result<V, ParseError<StorageT, TokT>>
    where
        TokT: Token,
        TS: TokenStream<TokT>,
        F: FnMut(Reduction<StorageT, TokT, V>) -> Option<V>,
    {
        let mut pstack = vec![self.sgraph.start_state()];
        let mut vstack: Vec<ParseValue<TokT, V>> = Vec::new();
        loop {
            if let Some(c) = cancel {
                if c.load(Ordering::Relaxed) {
                    return Err(ParseError::Cancelled);
                }
            }
            let stidx = *pstack.last().unwrap();
            let la_tidx = match ts.peek() {
                Some(tok) => self.token_kinds.get(tok.kind()).copied(),
                None => Some(self.grm.eof_token_idx()),
            };
            let la_tidx = match la_tidx {
                Some(tidx) => tidx,
                // A token kind the grammar doesn't reference can never be
                // shifted.
                None => return Err(self.syntax_error(stidx, ts.advance())),
            };

            match self.stable.action(stidx, la_tidx) {
                Action::Reduce(pidx) => {
                    let ridx = self.grm.prod_to_rule(pidx);
                    let pop_idx = pstack.len() - self.grm.prod(pidx).len();
                    let children = vstack.drain(pop_idx - 1..).collect::<Vec<_>>();
                    match hook(Reduction { pidx, children }) {
                        Some(v) => vstack.push(ParseValue::Value(v)),
                        None => return Err(ParseError::Hook { pidx }),
                    }

                    pstack.drain(pop_idx..);
                    let prior = *pstack.last().unwrap();
                    pstack.push(self.stable.goto(prior, ridx).unwrap());
                }
                Action::Shift(state_id) => {
                    // Shift actions are never defined on the EOF token, so
                    // there is a real token to consume here.
                    let token = ts.advance().unwrap();
                    vstack.push(ParseValue::Token(token));
                    pstack.push(state_id);
                }
                Action::Accept => {
                    debug_assert_eq!(la_tidx, self.grm.eof_token_idx());
                    debug_assert_eq!(vstack.len(), 1);
                    match vstack.pop() {
                        Some(ParseValue::Value(v)) => return Ok(v),
                        // Accept is only reachable after the start rule's
                        // production has been reduced.
                        _ => unreachable!(),
                    }
                }
                Action::Error => {
                    return Err(self.syntax_error(stidx, ts.advance()));
                }
            }
        }
    }

    fn syntax_error<TokT: Token>(
        &self,
        stidx: StIdx,
        token: Option<TokT>,
    ) -> ParseError<StorageT, TokT> {
        let expected = self
            .stable
            .state_actions(stidx)
            .map(|tidx| self.grm.token_name(tidx).unwrap_or("$").to_owned())
            .collect();
        ParseError::Syntax {
            stidx,
            token,
            expected,
        }
    }
}

/// Build a [Parser] from a [Grammar], optionally choosing the state table
/// construction algorithm.
pub struct ParserBuilder<StorageT = u32> {
    algorithm: Algorithm,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> ParserBuilder<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new() -> Self {
        ParserBuilder {
            algorithm: Algorithm::default(),
            phantom: PhantomData,
        }
    }

    /// Set the algorithm used to build this parser's states to `algorithm`.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Turn `grm` into a [Parser]. Grammars whose start rule can derive
    /// itself have an inherent accept/reduce conflict and are rejected.
    pub fn build(
        self,
        grm: Grammar<StorageT>,
    ) -> Result<Parser<StorageT>, AmbiguousGrammarError<StorageT>> {
        let (sgraph, stable) = from_grammar(&grm, self.algorithm)?;
        let token_kinds = grm
            .tokens_map()
            .iter()
            .map(|(&n, &tidx)| (n.to_owned(), tidx))
            .collect();
        Ok(Parser {
            grm,
            sgraph,
            stable,
            token_kinds,
        })
    }
}
