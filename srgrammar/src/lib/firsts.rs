use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{Grammar, RIdx, Symbol, TIdx};

/// `Firsts` stores all the FIRST sets for a given grammar. For example, for
/// the grammar:
/// ```text
///   S: A 'b';
///   A: 'a' | ;
/// ```
/// the following assertions (and only the following assertions) about the
/// FIRST sets are correct:
/// ```text
///   assert!(firsts.is_set(grm.rule_idx("S").unwrap(), grm.token_idx("a").unwrap()));
///   assert!(firsts.is_set(grm.rule_idx("S").unwrap(), grm.token_idx("b").unwrap()));
///   assert!(firsts.is_set(grm.rule_idx("A").unwrap(), grm.token_idx("a").unwrap()));
///   assert!(firsts.is_epsilon_set(grm.rule_idx("A").unwrap()));
/// ```
#[derive(Debug)]
pub struct Firsts<StorageT> {
    // Each rule's FIRST set is a bit vector over token indices; epsilons
    // tracks which rules can derive the empty string.
    firsts: Vec<Vob>,
    epsilons: Vob,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Firsts<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Generates and returns the FIRST sets for the given grammar.
    pub fn new(grm: &Grammar<StorageT>) -> Self {
        let mut firsts = Firsts {
            firsts: vec![
                Vob::from_elem(false, usize::from(grm.tokens_len()));
                usize::from(grm.rules_len())
            ],
            epsilons: Vob::from_elem(false, usize::from(grm.rules_len())),
            phantom: PhantomData,
        };

        // Loop until the sets reach a fixed point: each pass looks at every
        // production and pulls in whatever its leading symbols contribute,
        // which may have grown since the previous pass.
        loop {
            let mut changed = false;
            for ridx in grm.iter_rules() {
                for &pidx in grm.rule_to_prods(ridx).iter() {
                    let prod = grm.prod(pidx);
                    if prod.is_empty() {
                        // An epsilon production sets the rule's epsilon bit.
                        if !firsts.is_epsilon_set(ridx) {
                            firsts.epsilons.set(usize::from(ridx), true);
                            changed = true;
                        }
                        continue;
                    }
                    for (sidx, sym) in prod.iter().enumerate() {
                        match *sym {
                            Symbol::Token(s_tidx) => {
                                // A token starts the production: it belongs
                                // in FIRST, and nothing beyond it can.
                                if !firsts.set(ridx, s_tidx) {
                                    changed = true;
                                }
                                break;
                            }
                            Symbol::Rule(s_ridx) => {
                                // Union the referenced rule's FIRST set into
                                // ours.
                                for tidx in grm.iter_tidxs() {
                                    if firsts.is_set(s_ridx, tidx) && !firsts.set(ridx, tidx) {
                                        changed = true;
                                    }
                                }

                                // A trailing chain of epsilon-able rules
                                // makes the whole production epsilon-able.
                                if firsts.is_epsilon_set(s_ridx) && sidx == prod.len() - 1 {
                                    if !firsts.epsilons[usize::from(ridx)] {
                                        firsts.epsilons.set(usize::from(ridx), true);
                                        changed = true;
                                    }
                                }

                                // Only look past this rule if it can derive
                                // the empty string.
                                if !firsts.is_epsilon_set(s_ridx) {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            if !changed {
                return firsts;
            }
        }
    }

    /// Return the FIRST `Vob` for rule `ridx`.
    pub fn firsts(&self, ridx: RIdx<StorageT>) -> &Vob {
        &self.firsts[usize::from(ridx)]
    }

    /// Returns true if the token `tidx` is in the FIRST set for rule `ridx`.
    pub fn is_set(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.firsts[usize::from(ridx)][usize::from(tidx)]
    }

    /// Returns true if the rule `ridx` can derive the empty string.
    pub fn is_epsilon_set(&self, ridx: RIdx<StorageT>) -> bool {
        self.epsilons[usize::from(ridx)]
    }

    /// Ensures that the FIRST bit for token `tidx` of rule `ridx` is set.
    /// Returns true if it was already set, or false otherwise.
    pub fn set(&mut self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        let r = &mut self.firsts[usize::from(ridx)];
        if r[usize::from(tidx)] {
            true
        } else {
            r.set(usize::from(tidx), true);
            false
        }
    }
}
