use std::{collections::hash_map::HashMap, hash::Hash};

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use srgrammar::{Grammar, SIdx, Symbol};
use vob::Vob;

use crate::{StIdx, StIdxStorageT, itemset::Itemset, stategraph::StateGraph};

/// Create a `StateGraph` from `grm` using the SLR(1) algorithm.
///
/// SLR(1) builds the LR(0) automaton and then approximates each completed
/// item's lookahead with the FOLLOW set of the rule being reduced. The
/// resulting graph is never bigger than the one Pager's algorithm produces,
/// and is often much smaller, but accepts fewer grammars: any token in
/// FOLLOW(R) forces a reduce of a completed `R` item, even in states a full
/// LR(1) builder can prove that token will never legitimately follow `R` in.
pub fn slr1_stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    // Phase 1: the LR(0) automaton. LR(0) items carry no lookahead, so two
    // states are mergeable exactly when their cores are equal. A sequential
    // worklist with equality matching thus builds the full graph in a
    // single pass: unlike Pager's algorithm there is no merging and hence
    // no reprocessing of already closed states, and every state created is
    // reachable.
    let mut closed_states = Vec::new();
    let mut core_states = Vec::new();
    let mut edges: Vec<HashMap<Symbol<StorageT>, StIdx>> = Vec::new();

    let start_state = StIdx(0);
    let mut state0 = Itemset::new(grm);
    let empty_ctx = Vob::from_elem(false, usize::from(grm.tokens_len()));
    state0.add(grm.start_prod(), SIdx(StorageT::zero()), &empty_ctx);
    core_states.push(state0);
    edges.push(HashMap::new());

    // We maintain two lists of which rules and tokens we've seen; when
    // processing a given state there's no point processing a rule or token
    // more than once.
    let mut seen_rules = Vob::from_elem(false, usize::from(grm.rules_len()));
    let mut seen_tokens = Vob::from_elem(false, usize::from(grm.tokens_len()));
    // new_states is used to separate out iterating over states vs. mutating
    // the state list.
    let mut new_states = Vec::new();
    // cnd_[rule|token]_states record which states a given symbol has already
    // produced an edge to, so the equality scan below only compares against
    // a handful of states rather than the whole graph.
    let mut cnd_rule_states: Vec<Vec<StIdx>> = vec![Vec::new(); usize::from(grm.rules_len())];
    let mut cnd_token_states: Vec<Vec<StIdx>> = vec![Vec::new(); usize::from(grm.tokens_len())];

    let mut state_i = 0;
    while state_i < core_states.len() {
        closed_states.push(core_states[state_i].close_lr0(grm));
        debug_assert_eq!(closed_states.len(), state_i + 1);
        {
            let cl_state = &closed_states[state_i];
            seen_rules.set_all(false);
            seen_tokens.set_all(false);
            for &(pidx, dot) in cl_state.items.keys() {
                if dot == grm.prod_len(pidx) {
                    continue;
                }
                let sym = grm.prod(pidx)[usize::from(dot)];
                match sym {
                    Symbol::Rule(s_ridx) => {
                        if seen_rules[usize::from(s_ridx)] {
                            continue;
                        }
                        seen_rules.set(usize::from(s_ridx), true);
                    }
                    Symbol::Token(s_tidx) => {
                        if seen_tokens[usize::from(s_tidx)] {
                            continue;
                        }
                        seen_tokens.set(usize::from(s_tidx), true);
                    }
                }
                let nstate = cl_state.goto(grm, &sym);
                new_states.push((sym, nstate));
            }
        }

        'a: for (sym, nstate) in new_states.drain(..) {
            let cnd_states = match sym {
                Symbol::Rule(s_ridx) => &mut cnd_rule_states[usize::from(s_ridx)],
                Symbol::Token(s_tidx) => &mut cnd_token_states[usize::from(s_tidx)],
            };
            for cnd in cnd_states.iter().cloned() {
                if core_states[usize::from(cnd)] == nstate {
                    edges[state_i].insert(sym, cnd);
                    continue 'a;
                }
            }
            assert!(core_states.len() <= StIdxStorageT::max_value() as usize);
            // The assert above guarantees that the cast below is safe.
            let stidx = StIdx(core_states.len() as StIdxStorageT);
            cnd_states.push(stidx);
            edges[state_i].insert(sym, stidx);
            edges.push(HashMap::new());
            core_states.push(nstate);
        }
        state_i += 1;
    }

    // Phase 2: lookaheads. A completed item "R: ... ." may be reduced on
    // exactly the tokens in FOLLOW(R), so fill each completed item's
    // context from the follow sets. Since FOLLOW of the start rule contains
    // the EOF token, this also gives the accepting item its EOF lookahead.
    // Non-completed items keep their empty contexts: nothing downstream
    // consults them.
    let follows = grm.follows();
    for st in core_states.iter_mut().chain(closed_states.iter_mut()) {
        for (&(pidx, dot), ctx) in &mut st.items {
            if dot == grm.prod_len(pidx) {
                ctx.or(follows.follows(grm.prod_to_rule(pidx)));
            }
        }
    }

    debug_assert_eq!(core_states.len(), closed_states.len());
    StateGraph::new(
        core_states.drain(..).zip(closed_states.drain(..)).collect(),
        start_state,
        edges,
    )
}

#[cfg(test)]
mod test {
    use super::slr1_stategraph;
    use crate::{StIdx, stategraph::state_exists};
    use srgrammar::{Grammar, GrammarBuilder, GrammarSymbol, SIdx, Symbol};

    fn rule(n: &str) -> GrammarSymbol {
        GrammarSymbol::rule(n)
    }

    fn token(n: &str) -> GrammarSymbol {
        GrammarSymbol::token(n)
    }

    // GrammarAST from p19 of www.cs.umd.edu/class/spring2014/cmsc430/lectures/lec07.pdf
    fn grammar_cmsc430() -> Grammar<u32> {
        GrammarBuilder::new()
            .start("Expr")
            .prod("Expr", vec![rule("Term"), token("-"), rule("Expr")])
            .prod("Expr", vec![rule("Term")])
            .prod("Term", vec![rule("Factor"), token("*"), rule("Term")])
            .prod("Term", vec![rule("Factor")])
            .prod("Factor", vec![token("id")])
            .build()
            .unwrap()
    }

    #[test]
    #[rustfmt::skip]
    fn test_lr0_graph() {
        let grm = grammar_cmsc430();
        let sg = slr1_stategraph(&grm);

        // The grammar is SLR(1), so the LR(0) automaton has the same states
        // as the LR(1) one on p20 of the lecture notes.
        assert_eq!(sg.all_states_len(), StIdx(9));
        assert_eq!(sg.all_edges_len(), 13);

        let s0 = sg.start_state();
        assert_eq!(sg.core_state(s0).items.len(), 1);
        assert_eq!(sg.closed_state(s0).items.len(), 6);
        let s1 = sg.edge(s0, Symbol::Rule(grm.rule_idx("Expr").unwrap())).unwrap();
        let s2 = sg.edge(s0, Symbol::Rule(grm.rule_idx("Term").unwrap())).unwrap();
        let s3 = sg.edge(s0, Symbol::Rule(grm.rule_idx("Factor").unwrap())).unwrap();
        let s4 = sg.edge(s0, Symbol::Token(grm.token_idx("id").unwrap())).unwrap();
        let s5 = sg.edge(s2, Symbol::Token(grm.token_idx("-").unwrap())).unwrap();
        let s6 = sg.edge(s3, Symbol::Token(grm.token_idx("*").unwrap())).unwrap();

        // The state after "Term '-' ." contains items for Expr, Term and
        // Factor, so its Expr successor is distinct from s1 but its Term,
        // Factor and 'id' successors loop back to the states reached from
        // s0: LR(0) states with equal cores are shared.
        let s7 = sg.edge(s5, Symbol::Rule(grm.rule_idx("Expr").unwrap())).unwrap();
        assert_ne!(s7, s1);
        assert_eq!(s2, sg.edge(s5, Symbol::Rule(grm.rule_idx("Term").unwrap())).unwrap());
        assert_eq!(s3, sg.edge(s5, Symbol::Rule(grm.rule_idx("Factor").unwrap())).unwrap());
        assert_eq!(s4, sg.edge(s5, Symbol::Token(grm.token_idx("id").unwrap())).unwrap());

        let s8 = sg.edge(s6, Symbol::Rule(grm.rule_idx("Term").unwrap())).unwrap();
        assert_ne!(s8, s2);
        assert_eq!(s3, sg.edge(s6, Symbol::Rule(grm.rule_idx("Factor").unwrap())).unwrap());
        assert_eq!(s4, sg.edge(s6, Symbol::Token(grm.token_idx("id").unwrap())).unwrap());
    }

    #[test]
    #[rustfmt::skip]
    fn test_follow_contexts() {
        // S: 'a' S 'b' | ;
        // FOLLOW(S) = {'b', '$'}
        let grm: Grammar<u32> = GrammarBuilder::new()
            .start("S")
            .prod("S", vec![token("a"), rule("S"), token("b")])
            .prod("S", vec![])
            .build()
            .unwrap();
        let sg = slr1_stategraph(&grm);

        // Non-completed items have no lookahead context; completed items
        // have exactly FOLLOW of the rule being reduced.
        state_exists(&grm, sg.closed_state(sg.start_state()), "^", 0, SIdx(0), vec![]);
        state_exists(&grm, sg.closed_state(sg.start_state()), "S", 0, SIdx(0), vec![]);
        state_exists(&grm, sg.closed_state(sg.start_state()), "S", 1, SIdx(0), vec!["b", "$"]);

        let s1 = sg.edge(sg.start_state(), Symbol::Token(grm.token_idx("a").unwrap())).unwrap();
        state_exists(&grm, sg.closed_state(s1), "S", 0, SIdx(1), vec![]);
        state_exists(&grm, sg.closed_state(s1), "S", 1, SIdx(0), vec!["b", "$"]);
        // 'a' loops back to the same state.
        assert_eq!(s1, sg.edge(s1, Symbol::Token(grm.token_idx("a").unwrap())).unwrap());

        let s2 = sg.edge(s1, Symbol::Rule(grm.rule_idx("S").unwrap())).unwrap();
        state_exists(&grm, sg.closed_state(s2), "S", 0, SIdx(2), vec![]);
        let s3 = sg.edge(s2, Symbol::Token(grm.token_idx("b").unwrap())).unwrap();
        state_exists(&grm, sg.closed_state(s3), "S", 0, SIdx(3), vec!["b", "$"]);

        // The accepting item gets its EOF lookahead from FOLLOW("^").
        let s4 = sg.edge(sg.start_state(), Symbol::Rule(grm.rule_idx("S").unwrap())).unwrap();
        state_exists(&grm, sg.closed_state(s4), "^", 0, SIdx(1), vec!["$"]);
    }
}
