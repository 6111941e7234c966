use std::{
    error::Error,
    fmt::{self, Debug},
    hash::Hash,
    marker::PhantomData,
};

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use packedvec::PackedVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use srgrammar::{Grammar, PIdx, RIdx, Symbol, TIdx};
use vob::{IterSetBits, Vob};

use crate::{StIdx, StIdxStorageT, stategraph::StateGraph};

/// The various different possible actions in a `StateTable`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action<StorageT> {
    /// Shift and move to the given state.
    Shift(StIdx),
    /// Reduce the given production.
    Reduce(PIdx<StorageT>),
    /// Accept the input.
    Accept,
    /// No valid action.
    Error,
}

/// The reasons a grammar can be rejected at table construction time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AmbiguousGrammarErrorKind {
    /// A state wants to both accept the input and reduce a user production
    /// when it sees the EOF token. The classic culprit is an infinitely
    /// recursive rule such as `D: D;`.
    AcceptReduceConflict,
}

/// Returned if a grammar's ambiguities can't be resolved by the fixed
/// shift-over-reduce / earliest-production policies. `pidx` is the user
/// production involved in the conflict.
#[derive(Debug)]
pub struct AmbiguousGrammarError<StorageT> {
    pub kind: AmbiguousGrammarErrorKind,
    pub pidx: PIdx<StorageT>,
}

impl<StorageT: Debug> Error for AmbiguousGrammarError<StorageT> {}

impl<StorageT> fmt::Display for AmbiguousGrammarError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            AmbiguousGrammarErrorKind::AcceptReduceConflict => {
                write!(f, "Accept/reduce conflict")
            }
        }
    }
}

/// A `StateTable` flattens a [`StateGraph`](crate::StateGraph) into the two
/// dense lookup tables an LR parser consults at runtime: `action` says what
/// to do in a given state upon seeing a given token, and `goto` which state
/// to move to after a reduction.
///
/// Conflicts between actions are resolved while the table is built:
/// shift/reduce conflicts in favour of the shift, reduce/reduce conflicts in
/// favour of the production declared earliest in the grammar. The number of
/// conflicts resolved this way is recorded in `shift_reduce` and
/// `reduce_reduce` so that callers can warn about (or reject) ambiguous
/// grammars if they want a stricter policy.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateTable<StorageT> {
    // For actions, we use a PackedVec, allowing us to store the table in
    // (long-term) memory as compactly as possible.
    actions: PackedVec<usize>,
    state_actions: Vob,
    gotos: Vec<StIdx>,
    rules_len: RIdx<StorageT>,
    tokens_len: TIdx<StorageT>,
    /// How many reduce/reduce conflicts were resolved while building this
    /// table?
    pub reduce_reduce: u64,
    /// How many shift/reduce conflicts were resolved while building this
    /// table?
    pub shift_reduce: u64,
    /// The state in which the input is accepted.
    pub final_state: StIdx,
}

// Action table entries are encoded as a 2 bit tag in the low bits with the
// shift state / reduce production in the bits above.
const SHIFT: usize = 1;
const REDUCE: usize = 2;
const ACCEPT: usize = 3;
const ERROR: usize = 0;

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(
        grm: &Grammar<StorageT>,
        sg: &StateGraph<StorageT>,
    ) -> Result<Self, AmbiguousGrammarError<StorageT>> {
        // The encoding scheme leaves 2 bits fewer than a usize for shift
        // and reduce payloads.
        assert!(usize::from(sg.all_states_len()) < (usize::MAX >> 2));
        assert!(usize::from(grm.prods_len()) < (usize::MAX >> 2));
        let mut actions: Vec<usize> =
            vec![0; usize::from(sg.all_states_len()) * usize::from(grm.tokens_len())];
        let mut state_actions = Vob::from_elem(
            false,
            usize::from(sg.all_states_len()) * usize::from(grm.tokens_len()),
        );
        // The goto table is a dense matrix of states * rules, with
        // `StIdx::max_value()` marking the absence of an entry.
        let mut gotos: Vec<StIdx> = vec![
            StIdx::max_value();
            usize::from(sg.all_states_len()) * usize::from(grm.rules_len())
        ];

        let mut reduce_reduce = 0; // How many reduce/reduce conflicts were resolved?
        let mut shift_reduce = 0; // How many shift/reduce conflicts were resolved?
        let mut final_state = None;

        for (stidx, state) in sg
            .iter_closed_states()
            .enumerate()
            // x goes from 0..states_len(), and we know the latter fits into
            // an StIdxStorageT, so the cast is safe.
            .map(|(x, y)| (StIdx(x as StIdxStorageT), y))
        {
            // Populate reduces and accepts. Shifts are populated below, so
            // a cell can only hold Error, Reduce, or Accept at this point.
            for (&(pidx, dot), ctx) in &state.items {
                if dot < grm.prod_len(pidx) {
                    continue;
                }
                for tidx in ctx.iter_set_bits(..) {
                    let off = actions_offset(grm.tokens_len(), stidx, TIdx(tidx.as_()));
                    state_actions.set(off, true);
                    match Self::decode(actions[off]) {
                        Action::Reduce(r_pidx) => {
                            if pidx == grm.start_prod() && tidx == usize::from(grm.eof_token_idx())
                            {
                                // r_pidx is necessarily a user production:
                                // reducing the start production is
                                // represented by Accept, never Reduce.
                                return Err(AmbiguousGrammarError {
                                    kind: AmbiguousGrammarErrorKind::AcceptReduceConflict,
                                    pidx: r_pidx,
                                });
                            }
                            // Reduce/reduce conflicts are resolved in
                            // favour of the production declared earliest in
                            // the grammar.
                            if pidx < r_pidx {
                                actions[off] = Self::encode(Action::Reduce(pidx));
                                reduce_reduce += 1;
                            } else if pidx != r_pidx {
                                reduce_reduce += 1;
                            }
                        }
                        Action::Accept => {
                            return Err(AmbiguousGrammarError {
                                kind: AmbiguousGrammarErrorKind::AcceptReduceConflict,
                                pidx,
                            });
                        }
                        Action::Error => {
                            if pidx == grm.start_prod() && tidx == usize::from(grm.eof_token_idx())
                            {
                                assert!(final_state.is_none());
                                final_state = Some(stidx);
                                actions[off] = Self::encode(Action::Accept);
                            } else {
                                actions[off] = Self::encode(Action::Reduce(pidx));
                            }
                        }
                        _ => panic!("Internal error"),
                    }
                }
            }

            // Populate shifts and gotos.
            for (&sym, ref_stidx) in sg.edges(stidx) {
                match sym {
                    Symbol::Rule(s_ridx) => {
                        let off =
                            usize::from(stidx) * usize::from(grm.rules_len()) + usize::from(s_ridx);
                        debug_assert!(gotos[off] == StIdx::max_value());
                        gotos[off] = *ref_stidx;
                    }
                    Symbol::Token(s_tidx) => {
                        let off = actions_offset(grm.tokens_len(), stidx, s_tidx);
                        state_actions.set(off, true);
                        match Self::decode(actions[off]) {
                            Action::Shift(x) => assert_eq!(*ref_stidx, x),
                            Action::Reduce(_) => {
                                // Shift/reduce conflicts are resolved in
                                // favour of the shift.
                                actions[off] = Self::encode(Action::Shift(*ref_stidx));
                                shift_reduce += 1;
                            }
                            Action::Accept => panic!("Internal error"),
                            Action::Error => {
                                actions[off] = Self::encode(Action::Shift(*ref_stidx));
                            }
                        }
                    }
                }
            }
        }
        assert!(final_state.is_some());

        Ok(StateTable {
            actions: PackedVec::<usize>::new(actions),
            state_actions,
            gotos,
            rules_len: grm.rules_len(),
            tokens_len: grm.tokens_len(),
            reduce_reduce,
            shift_reduce,
            final_state: final_state.unwrap(),
        })
    }

    fn decode(bits: usize) -> Action<StorageT> {
        let action = bits & 0b11;
        let val = bits >> 2;
        match action {
            SHIFT => {
                // Since val was originally stored in an StIdxStorageT, we
                // know it's safe to cast it back to an StIdxStorageT here.
                Action::Shift(StIdx(val as StIdxStorageT))
            }
            REDUCE => Action::Reduce(PIdx(val.as_())),
            ACCEPT => Action::Accept,
            ERROR => Action::Error,
            _ => unreachable!(),
        }
    }

    fn encode(action: Action<StorageT>) -> usize {
        match action {
            Action::Shift(stidx) => SHIFT | (usize::from(stidx) << 2),
            Action::Reduce(pidx) => REDUCE | (usize::from(pidx) << 2),
            Action::Accept => ACCEPT,
            Action::Error => ERROR,
        }
    }

    /// Return the action for `stidx` and `tidx`. Since every `(stidx,
    /// tidx)` pair has a cell in the table, this never fails: cells without
    /// a shift, reduce, or accept hold [`Action::Error`].
    pub fn action(&self, stidx: StIdx, tidx: TIdx<StorageT>) -> Action<StorageT> {
        let off = actions_offset(self.tokens_len, stidx, tidx);
        Self::decode(self.actions.get(off).unwrap())
    }

    /// Return an iterator over the indexes of all tokens which have a
    /// non-`Error` action in `stidx`.
    pub fn state_actions(&self, stidx: StIdx) -> StateActionsIterator<'_, StorageT> {
        let start = usize::from(stidx) * usize::from(self.tokens_len);
        let end = start + usize::from(self.tokens_len);
        StateActionsIterator {
            iter: self.state_actions.iter_set_bits(start..end),
            start,
            phantom: PhantomData,
        }
    }

    /// Return the goto state for `stidx` and `ridx`, or `None` if there
    /// isn't one.
    pub fn goto(&self, stidx: StIdx, ridx: RIdx<StorageT>) -> Option<StIdx> {
        let off = usize::from(stidx) * usize::from(self.rules_len) + usize::from(ridx);
        if self.gotos[off] == StIdx::max_value() {
            None
        } else {
            Some(self.gotos[off])
        }
    }
}

fn actions_offset<StorageT: PrimInt + Unsigned>(
    tokens_len: TIdx<StorageT>,
    stidx: StIdx,
    tidx: TIdx<StorageT>,
) -> usize {
    usize::from(stidx) * usize::from(tokens_len) + usize::from(tidx)
}

pub struct StateActionsIterator<'a, StorageT> {
    iter: IterSetBits<'a, usize>,
    start: usize,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Iterator for StateActionsIterator<'_, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    type Item = TIdx<StorageT>;

    fn next(&mut self) -> Option<TIdx<StorageT>> {
        // Since tokens_len fits into StorageT, by definition (i -
        // self.start) does too.
        self.iter.next().map(|i| TIdx((i - self.start).as_()))
    }
}
