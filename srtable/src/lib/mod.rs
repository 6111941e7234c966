#![allow(clippy::new_without_default)]
#![forbid(unsafe_code)]

//! Builds LR state graphs and state tables from [`srgrammar`] grammars. Most
//! users only need [`from_grammar`], which turns a grammar into a
//! `(StateGraph, StateTable)` pair for the table construction
//! [`Algorithm`] of their choice; the parsing loop itself lives in a
//! separate crate.
//!
//! Conflicts between actions are resolved while the table is built:
//! shift/reduce conflicts are resolved in favour of the shift and
//! reduce/reduce conflicts in favour of the production with the lowest
//! index (i.e. the production declared earliest). The one conflict which
//! cannot be sensibly resolved is a reduce against the accept action, which
//! is reported as an [`AmbiguousGrammarError`].

use std::hash::Hash;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use srgrammar::Grammar;

mod itemset;
mod pager;
mod slr;
mod stategraph;
pub mod statetable;

pub use crate::stategraph::StateGraph;
pub use crate::statetable::{
    Action, AmbiguousGrammarError, AmbiguousGrammarErrorKind, StateTable,
};

pub(crate) type StIdxStorageT = u32;

/// StIdx is a wrapper for a state index. The biggest grammars we are aware
/// of have only a few thousand states, so a u32 is more than enough storage
/// in practice.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StIdx(StIdxStorageT);

impl StIdx {
    pub(crate) fn max_value() -> StIdx {
        StIdx(StIdxStorageT::max_value())
    }
}

impl From<StIdxStorageT> for StIdx {
    fn from(v: StIdxStorageT) -> Self {
        StIdx(v)
    }
}

impl From<usize> for StIdx {
    fn from(v: usize) -> Self {
        if v > StIdxStorageT::max_value() as usize {
            panic!("Overflow");
        }
        StIdx(v as StIdxStorageT)
    }
}

impl From<StIdx> for usize {
    fn from(st: StIdx) -> Self {
        st.0 as usize
    }
}

impl From<StIdx> for u32 {
    fn from(st: StIdx) -> Self {
        st.0
    }
}

/// The algorithm used to construct a state graph from a grammar.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Algorithm {
    /// SLR(1): states are the LR(0) collection, and completed items reduce
    /// on the FOLLOW set of their rule. Fast to build and small, at the cost
    /// of reporting conflicts on some grammars which a full LR(1)
    /// construction handles cleanly.
    Slr1,
    /// LR(1) using Pager's weak compatibility algorithm to merge states.
    /// Nearly as small as SLR(1) tables but with full LR(1)
    /// context-sensitivity.
    Lr1,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Slr1
    }
}

/// Create a `(StateGraph, StateTable)` pair for `grm`, building states with
/// `algorithm`.
pub fn from_grammar<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    algorithm: Algorithm,
) -> Result<(StateGraph<StorageT>, StateTable<StorageT>), AmbiguousGrammarError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let sg = match algorithm {
        Algorithm::Slr1 => slr::slr1_stategraph(grm),
        Algorithm::Lr1 => pager::pager_stategraph(grm),
    };
    let st = StateTable::new(grm, &sg)?;
    Ok((sg, st))
}
