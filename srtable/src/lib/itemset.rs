use std::collections::hash_map::{Entry, HashMap};
use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use srgrammar::{Firsts, Grammar, PIdx, SIdx, Symbol};
use vob::Vob;

/// The type of "context" (also known as "lookaheads"): a bitfield over a
/// grammar's tokens.
pub type Ctx = Vob;

/// A set of LR items `(production, dot position)`, each with a context.
/// `FnvHasher` is used deliberately: it has no per-process random seed, so
/// iterating over the items of two equally populated itemsets visits them in
/// the same order, which in turn keeps state numbering reproducible from one
/// run to the next.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Itemset<StorageT: Eq + Hash> {
    pub items: HashMap<(PIdx<StorageT>, SIdx<StorageT>), Ctx, BuildHasherDefault<FnvHasher>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Itemset<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a blank Itemset.
    pub fn new(_: &Grammar<StorageT>) -> Self {
        Itemset {
            items: HashMap::with_hasher(BuildHasherDefault::<FnvHasher>::default()),
        }
    }

    /// Add an item `(pidx, dot)` with context `ctx` to this itemset. Returns
    /// true if this led to any changes in the itemset.
    pub fn add(&mut self, pidx: PIdx<StorageT>, dot: SIdx<StorageT>, ctx: &Ctx) -> bool {
        match self.items.entry((pidx, dot)) {
            Entry::Occupied(mut e) => e.get_mut().or(ctx),
            Entry::Vacant(e) => {
                e.insert(ctx.clone());
                true
            }
        }
    }

    /// Create a new itemset which is a closed version of `self`, propagating
    /// contexts as the closure is computed.
    pub fn close(&self, grm: &Grammar<StorageT>, firsts: &Firsts<StorageT>) -> Self {
        let mut new_is = self.clone();

        // A naive todo set contains (pidx, dot) pairs, but searching such a
        // set for the next item to process is slow, and this function
        // dominates the cost of table construction. Two observations let us
        // do better:
        //   1) The initial todo set is exactly self.items.keys(), which we
        //      can iterate without copying anywhere.
        //   2) Every subsequently added item has dot 0, so the only
        //      information a later todo needs to record is a production
        //      index. A fixed-size bitfield holds those.
        // We thus drain the keys iterator first, then repeatedly scan the
        // bitfield until nothing new is added.
        let mut keys_iter = self.items.keys();
        let mut zero_todos = Vob::from_elem(false, usize::from(grm.prods_len()));
        let mut new_ctx = Vob::from_elem(false, usize::from(grm.tokens_len()));
        loop {
            let pidx;
            let dot;
            match keys_iter.next() {
                Some(&(x, y)) => {
                    pidx = x;
                    dot = y;
                }
                None => {
                    match zero_todos.iter_set_bits(..).next() {
                        Some(i) => pidx = PIdx(i.as_()),
                        None => break,
                    }
                    dot = SIdx(StorageT::zero());
                    zero_todos.set(usize::from(pidx), false);
                }
            }
            let prod = grm.prod(pidx);
            if usize::from(dot) == prod.len() {
                continue;
            }
            if let Symbol::Rule(s_ridx) = prod[usize::from(dot)] {
                // Compute the context of the rule after the dot: the FIRST
                // set of the remainder of the production or, if the
                // remainder can derive empty, this item's own context.
                new_ctx.set_all(false);
                let mut nullable = true;
                for sym in prod.iter().skip(usize::from(dot) + 1) {
                    match *sym {
                        Symbol::Token(s_tidx) => {
                            new_ctx.set(usize::from(s_tidx), true);
                            nullable = false;
                            break;
                        }
                        Symbol::Rule(nxt_ridx) => {
                            new_ctx.or(firsts.firsts(nxt_ridx));
                            if !firsts.is_epsilon_set(nxt_ridx) {
                                nullable = false;
                                break;
                            }
                        }
                    }
                }
                if nullable {
                    new_ctx.or(&new_is.items[&(pidx, dot)]);
                }

                for ref_pidx in grm.rule_to_prods(s_ridx).iter() {
                    if new_is.add(*ref_pidx, SIdx(StorageT::zero()), &new_ctx) {
                        zero_todos.set(usize::from(*ref_pidx), true);
                    }
                }
            }
        }
        new_is
    }

    /// Create a new itemset which is a closed version of `self`, leaving
    /// every added item's context empty. This is the LR(0) closure: contexts
    /// play no part in it and are filled in later from FOLLOW sets.
    pub fn close_lr0(&self, grm: &Grammar<StorageT>) -> Self {
        let mut new_is = self.clone();
        let empty_ctx = Vob::from_elem(false, usize::from(grm.tokens_len()));
        let mut keys_iter = self.items.keys();
        let mut zero_todos = Vob::from_elem(false, usize::from(grm.prods_len()));
        loop {
            let pidx;
            let dot;
            match keys_iter.next() {
                Some(&(x, y)) => {
                    pidx = x;
                    dot = y;
                }
                None => {
                    match zero_todos.iter_set_bits(..).next() {
                        Some(i) => pidx = PIdx(i.as_()),
                        None => break,
                    }
                    dot = SIdx(StorageT::zero());
                    zero_todos.set(usize::from(pidx), false);
                }
            }
            let prod = grm.prod(pidx);
            if usize::from(dot) == prod.len() {
                continue;
            }
            if let Symbol::Rule(s_ridx) = prod[usize::from(dot)] {
                for ref_pidx in grm.rule_to_prods(s_ridx).iter() {
                    if new_is.add(*ref_pidx, SIdx(StorageT::zero()), &empty_ctx) {
                        zero_todos.set(usize::from(*ref_pidx), true);
                    }
                }
            }
        }
        new_is
    }

    /// Create a new Itemset based on calculating the goto of `sym` on the
    /// current Itemset.
    pub fn goto(&self, grm: &Grammar<StorageT>, sym: &Symbol<StorageT>) -> Self {
        let mut newis = Itemset::new(grm);
        for (&(pidx, dot), ctx) in &self.items {
            let prod = grm.prod(pidx);
            if usize::from(dot) == prod.len() {
                continue;
            }
            if sym == &prod[usize::from(dot)] {
                newis.add(pidx, SIdx((usize::from(dot) + 1).as_()), ctx);
            }
        }
        newis
    }
}

#[cfg(test)]
mod test {
    use super::Itemset;
    use crate::stategraph::state_exists;
    use srgrammar::{Grammar, GrammarBuilder, GrammarSymbol, SIdx, Symbol};
    use vob::Vob;

    fn rule(n: &str) -> GrammarSymbol {
        GrammarSymbol::rule(n)
    }

    fn token(n: &str) -> GrammarSymbol {
        GrammarSymbol::token(n)
    }

    // From http://binarysculpting.com/2012/02/04/computing-lr1-closure/
    fn dragon_grammar() -> Grammar<u32> {
        GrammarBuilder::new()
            .start("S")
            .prod("S", vec![rule("L"), token("="), rule("R")])
            .prod("S", vec![rule("R")])
            .prod("L", vec![token("*"), rule("R")])
            .prod("L", vec![token("id")])
            .prod("R", vec![rule("L")])
            .build()
            .unwrap()
    }

    fn eof_ctx(grm: &Grammar<u32>) -> Vob {
        let mut la = Vob::from_elem(false, usize::from(grm.tokens_len()));
        la.set(usize::from(grm.eof_token_idx()), true);
        la
    }

    #[test]
    fn test_dragon_grammar() {
        let grm = dragon_grammar();
        let firsts = grm.firsts();

        let mut is = Itemset::new(&grm);
        is.add(grm.start_prod(), SIdx(0), &eof_ctx(&grm));
        let cls_is = is.close(&grm, &firsts);
        println!("{:?}", cls_is);
        assert_eq!(cls_is.items.len(), 6);
        state_exists(&grm, &cls_is, "^", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "S", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "S", 1, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "L", 0, SIdx(0), vec!["$", "="]);
        state_exists(&grm, &cls_is, "L", 1, SIdx(0), vec!["$", "="]);
        state_exists(&grm, &cls_is, "R", 0, SIdx(0), vec!["$"]);
    }

    fn eco_grammar() -> Grammar<u32> {
        GrammarBuilder::new()
            .start("S")
            .prod("S", vec![rule("S"), token("b")])
            .prod("S", vec![token("b"), rule("A"), token("a")])
            .prod("S", vec![token("a")])
            .prod("A", vec![token("a"), rule("S"), token("c")])
            .prod("A", vec![token("a")])
            .prod("A", vec![token("a"), rule("S"), token("b")])
            .prod("B", vec![rule("A"), rule("S")])
            .prod("C", vec![rule("D"), rule("A")])
            .prod("D", vec![token("d")])
            .prod("D", vec![])
            .prod("F", vec![rule("C"), rule("D"), token("f")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_closure1_ecogrm() {
        let grm = eco_grammar();
        let firsts = grm.firsts();
        let la = eof_ctx(&grm);

        let mut is = Itemset::new(&grm);
        is.add(grm.start_prod(), SIdx(0), &la);
        let mut cls_is = is.close(&grm, &firsts);

        state_exists(&grm, &cls_is, "^", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "S", 0, SIdx(0), vec!["b", "$"]);
        state_exists(&grm, &cls_is, "S", 1, SIdx(0), vec!["b", "$"]);
        state_exists(&grm, &cls_is, "S", 2, SIdx(0), vec!["b", "$"]);

        is = Itemset::new(&grm);
        is.add(grm.rule_to_prods(grm.rule_idx("F").unwrap())[0], SIdx(0), &la);
        cls_is = is.close(&grm, &firsts);
        state_exists(&grm, &cls_is, "F", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "C", 0, SIdx(0), vec!["d", "f"]);
        state_exists(&grm, &cls_is, "D", 0, SIdx(0), vec!["a"]);
        state_exists(&grm, &cls_is, "D", 1, SIdx(0), vec!["a"]);
    }

    // Grammar from 'LR(k) Analyse fuer Pragmatiker'
    // Z : S
    // S : Sb
    //     bAa
    // A : aSc
    //     a
    //     aSb
    fn grammar3() -> Grammar<u32> {
        GrammarBuilder::new()
            .start("S")
            .prod("S", vec![rule("S"), token("b")])
            .prod("S", vec![token("b"), rule("A"), token("a")])
            .prod("A", vec![token("a"), rule("S"), token("c")])
            .prod("A", vec![token("a")])
            .prod("A", vec![token("a"), rule("S"), token("b")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_closure1_grm3() {
        let grm = grammar3();
        let firsts = grm.firsts();

        let mut is = Itemset::new(&grm);
        is.add(grm.start_prod(), SIdx(0), &eof_ctx(&grm));
        let mut cls_is = is.close(&grm, &firsts);

        state_exists(&grm, &cls_is, "^", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "S", 0, SIdx(0), vec!["b", "$"]);
        state_exists(&grm, &cls_is, "S", 1, SIdx(0), vec!["b", "$"]);

        is = Itemset::new(&grm);
        let mut la = Vob::from_elem(false, usize::from(grm.tokens_len()));
        la.set(usize::from(grm.token_idx("b").unwrap()), true);
        la.set(usize::from(grm.eof_token_idx()), true);
        is.add(grm.rule_to_prods(grm.rule_idx("S").unwrap())[1], SIdx(1), &la);
        cls_is = is.close(&grm, &firsts);
        state_exists(&grm, &cls_is, "A", 0, SIdx(0), vec!["a"]);
        state_exists(&grm, &cls_is, "A", 1, SIdx(0), vec!["a"]);
        state_exists(&grm, &cls_is, "A", 2, SIdx(0), vec!["a"]);

        is = Itemset::new(&grm);
        la = Vob::from_elem(false, usize::from(grm.tokens_len()));
        la.set(usize::from(grm.token_idx("a").unwrap()), true);
        is.add(grm.rule_to_prods(grm.rule_idx("A").unwrap())[0], SIdx(1), &la);
        cls_is = is.close(&grm, &firsts);
        state_exists(&grm, &cls_is, "S", 0, SIdx(0), vec!["b", "c"]);
        state_exists(&grm, &cls_is, "S", 1, SIdx(0), vec!["b", "c"]);
    }

    #[test]
    fn test_close_lr0_has_empty_contexts() {
        let grm = dragon_grammar();

        let mut is = Itemset::new(&grm);
        is.add(grm.start_prod(), SIdx(0), &eof_ctx(&grm));
        let cls_is = is.close_lr0(&grm);
        // Same items as the LR(1) closure, but every context added by the
        // closure stays empty.
        assert_eq!(cls_is.items.len(), 6);
        state_exists(&grm, &cls_is, "^", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "S", 0, SIdx(0), vec![]);
        state_exists(&grm, &cls_is, "S", 1, SIdx(0), vec![]);
        state_exists(&grm, &cls_is, "L", 0, SIdx(0), vec![]);
        state_exists(&grm, &cls_is, "L", 1, SIdx(0), vec![]);
        state_exists(&grm, &cls_is, "R", 0, SIdx(0), vec![]);
    }

    #[test]
    fn test_goto1() {
        let grm = grammar3();
        let firsts = grm.firsts();

        let mut is = Itemset::new(&grm);
        is.add(grm.start_prod(), SIdx(0), &eof_ctx(&grm));
        let cls_is = is.close(&grm, &firsts);

        let goto1 = cls_is.goto(&grm, &Symbol::Rule(grm.rule_idx("S").unwrap()));
        state_exists(&grm, &goto1, "^", 0, SIdx(1), vec!["$"]);
        state_exists(&grm, &goto1, "S", 0, SIdx(1), vec!["$", "b"]);

        // follow 'b' from start set
        let goto2 = cls_is.goto(&grm, &Symbol::Token(grm.token_idx("b").unwrap()));
        state_exists(&grm, &goto2, "S", 1, SIdx(1), vec!["$", "b"]);

        // continue by following 'a' from last goto, after it's been closed
        let goto3 = goto2
            .close(&grm, &firsts)
            .goto(&grm, &Symbol::Token(grm.token_idx("a").unwrap()));
        state_exists(&grm, &goto3, "A", 1, SIdx(1), vec!["a"]);
        state_exists(&grm, &goto3, "A", 2, SIdx(1), vec!["a"]);
    }
}
