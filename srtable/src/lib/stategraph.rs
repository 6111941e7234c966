use std::{collections::hash_map::HashMap, hash::Hash};

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use srgrammar::{Grammar, Symbol, TIdx};

use crate::{StIdx, StIdxStorageT, itemset::Itemset};

/// The complete set of LR states for a grammar, plus the transitions between
/// them.
#[derive(Debug)]
pub struct StateGraph<StorageT: Eq + Hash> {
    /// A vector of `(core_states, closed_states)` tuples.
    states: Vec<(Itemset<StorageT>, Itemset<StorageT>)>,
    start_state: StIdx,
    /// For each state in `states`, edges is a hashmap from symbols to state
    /// offsets.
    edges: Vec<HashMap<Symbol<StorageT>, StIdx>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(
        states: Vec<(Itemset<StorageT>, Itemset<StorageT>)>,
        start_state: StIdx,
        edges: Vec<HashMap<Symbol<StorageT>, StIdx>>,
    ) -> Self {
        // states.len() needs to fit into StIdxStorageT; edges.len() merely
        // needs to fit in a usize.
        assert!(StIdxStorageT::try_from(states.len()).is_ok());
        StateGraph {
            states,
            start_state,
            edges,
        }
    }

    /// Return this state graph's start state.
    pub fn start_state(&self) -> StIdx {
        self.start_state
    }

    /// Return an iterator which produces (in order from `0..all_states_len()`)
    /// all this graph's valid `StIdx`s.
    pub fn iter_stidxs(&self) -> impl Iterator<Item = StIdx> {
        // The cast is safe: the constructor checked that states.len() fits
        // within StIdxStorageT.
        (0..self.states.len()).map(|x| StIdx(x as StIdxStorageT))
    }

    /// Return the itemset for closed state `stidx`. Panics if `stidx` doesn't
    /// exist.
    pub fn closed_state(&self, stidx: StIdx) -> &Itemset<StorageT> {
        &self.states[usize::from(stidx)].1
    }

    /// Return an iterator over all closed states in this `StateGraph`.
    pub fn iter_closed_states(&self) -> impl Iterator<Item = &Itemset<StorageT>> {
        self.states.iter().map(|x| &x.1)
    }

    /// Return the itemset for core state `stidx`. Panics if `stidx` doesn't
    /// exist.
    pub fn core_state(&self, stidx: StIdx) -> &Itemset<StorageT> {
        &self.states[usize::from(stidx)].0
    }

    /// Return an iterator over all core states in this `StateGraph`.
    pub fn iter_core_states(&self) -> impl Iterator<Item = &Itemset<StorageT>> {
        self.states.iter().map(|x| &x.0)
    }

    /// How many states does this `StateGraph` contain? NB: By definition the
    /// `StateGraph` contains the same number of core and closed states.
    pub fn all_states_len(&self) -> StIdx {
        StIdx(self.states.len() as StIdxStorageT)
    }

    /// Return the state pointed to by `sym` from `stidx` or `None` otherwise.
    pub fn edge(&self, stidx: StIdx, sym: Symbol<StorageT>) -> Option<StIdx> {
        self.edges
            .get(usize::from(stidx))
            .and_then(|x| x.get(&sym))
            .cloned()
    }

    /// Return the edges for state `stidx`. Panics if `stidx` doesn't exist.
    pub fn edges(&self, stidx: StIdx) -> &HashMap<Symbol<StorageT>, StIdx> {
        &self.edges[usize::from(stidx)]
    }

    /// How many edges does this `StateGraph` contain?
    pub fn all_edges_len(&self) -> usize {
        self.edges.iter().fold(0, |a, x| a + x.len())
    }

    fn pp(&self, grm: &Grammar<StorageT>, core_states: bool) -> String {
        fn num_digits(i: StIdx) -> usize {
            if usize::from(i) == 0 {
                1
            } else {
                ((usize::from(i) as f64).log10() as usize) + 1
            }
        }

        fn fmt_sym<StorageT: 'static + PrimInt + Unsigned>(
            grm: &Grammar<StorageT>,
            sym: Symbol<StorageT>,
        ) -> String
        where
            usize: AsPrimitive<StorageT>,
        {
            match sym {
                Symbol::Rule(ridx) => grm.rule_name(ridx).to_string(),
                Symbol::Token(tidx) => format!("'{}'", grm.token_name(tidx).unwrap_or("")),
            }
        }

        let mut o = String::new();
        for (stidx, (core_st, closed_st)) in self.iter_stidxs().zip(self.states.iter()) {
            if stidx != self.start_state {
                o.push('\n');
            }
            let padding = num_digits(self.all_states_len()) - num_digits(stidx);
            o.push_str(&format!("{}:{}", usize::from(stidx), " ".repeat(padding)));

            let st = if core_states { core_st } else { closed_st };
            for (i, (&(pidx, dot), ctx)) in st.items.iter().enumerate() {
                let padding = if i == 0 {
                    0
                } else {
                    // Extra space to compensate for the ":" printed above.
                    o.push_str("\n ");
                    num_digits(self.all_states_len())
                };
                o.push_str(&format!(
                    "{} [{} ->",
                    " ".repeat(padding),
                    grm.rule_name(grm.prod_to_rule(pidx))
                ));
                for (i_sidx, i_ssym) in grm.prod(pidx).iter().enumerate() {
                    if i_sidx == usize::from(dot) {
                        o.push_str(" .");
                    }
                    o.push_str(&format!(" {}", fmt_sym(grm, *i_ssym)));
                }
                if usize::from(dot) == grm.prod(pidx).len() {
                    o.push_str(" .");
                }
                o.push_str(", {");
                let mut seen_b = false;
                for bidx in ctx.iter_set_bits(..) {
                    if seen_b {
                        o.push_str(", ");
                    } else {
                        seen_b = true;
                    }
                    // Since ctx is exactly tokens_len bits long, the as_ call
                    // is safe.
                    let tidx = TIdx(bidx.as_());
                    if tidx == grm.eof_token_idx() {
                        o.push_str("'$'");
                    } else {
                        o.push_str(&format!("'{}'", grm.token_name(tidx).unwrap()));
                    }
                }
                o.push_str("}]");
            }
            for (esym, e_stidx) in self.edges(stidx).iter() {
                o.push_str(&format!(
                    "\n{}{} -> {}",
                    " ".repeat(num_digits(self.all_states_len()) + 2),
                    fmt_sym(grm, *esym),
                    usize::from(*e_stidx)
                ));
            }
        }
        o
    }

    /// Return a pretty printed version of the core states, and all edges.
    pub fn pp_core_states(&self, grm: &Grammar<StorageT>) -> String {
        self.pp(grm, true)
    }

    /// Return a pretty printed version of the closed states, and all edges.
    pub fn pp_closed_states(&self, grm: &Grammar<StorageT>) -> String {
        self.pp(grm, false)
    }
}

#[cfg(test)]
use srgrammar::SIdx;

/// Check that the itemset `is` contains the item for production `prod_off`
/// of rule `nt` at position `dot`, with a context of exactly `la` (`"$"`
/// names the EOF token). Panics with a description of the mismatch if not.
#[cfg(test)]
pub fn state_exists<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    is: &Itemset<StorageT>,
    nt: &str,
    prod_off: usize,
    dot: SIdx<StorageT>,
    la: Vec<&str>,
) where
    usize: AsPrimitive<StorageT>,
{
    let ab_prod_off = grm.rule_to_prods(grm.rule_idx(nt).unwrap())[prod_off];
    let ctx = &is.items[&(ab_prod_off, dot)];
    for tidx in grm.iter_tidxs() {
        let bit = ctx[usize::from(tidx)];
        let mut found = false;
        for t in la.iter() {
            let off = if t == &"$" {
                grm.eof_token_idx()
            } else {
                grm.token_idx(t).unwrap()
            };
            if off == tidx {
                if !bit {
                    panic!(
                        "bit for token {}, dot {} is not set in production {} of {} when it should be",
                        t,
                        usize::from(dot),
                        prod_off,
                        nt
                    );
                }
                found = true;
                break;
            }
        }
        if !found && bit {
            panic!(
                "bit for token {}, dot {} is set in production {} of {} when it shouldn't be",
                grm.token_name(tidx).unwrap_or("$"),
                usize::from(dot),
                prod_off,
                nt
            );
        }
    }
}
