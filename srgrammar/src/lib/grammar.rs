use std::{collections::HashMap, fmt};

use num_traits::{self, AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    GrammarBuilder, GrammarSymbol, MalformedGrammarError, MalformedGrammarErrorKind, PIdx, RIdx,
    SIdx, Symbol, TIdx,
    firsts::Firsts,
    follows::Follows,
};

const START_RULE: &str = "^";

/// An immutable, densely indexed grammar. See the [crate-level
/// documentation](../index.html) for the guarantees this struct makes about
/// rule, token, and production numbering.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar<StorageT = u32> {
    /// How many rules does this grammar have?
    rules_len: RIdx<StorageT>,
    /// A mapping from `RIdx` -> `String`.
    rule_names: Vec<String>,
    /// A mapping from `TIdx` -> `Option<String>`. Every token registered via
    /// the builder has a name; the reserved EOF token does not.
    token_names: Vec<Option<String>>,
    /// How many tokens does this grammar have?
    tokens_len: TIdx<StorageT>,
    /// The offset of the EOF token.
    eof_token_idx: TIdx<StorageT>,
    /// How many productions does this grammar have?
    prods_len: PIdx<StorageT>,
    /// Which production is the sole production of the start rule?
    start_prod: PIdx<StorageT>,
    /// A list of all productions.
    prods: Vec<Vec<Symbol<StorageT>>>,
    /// A mapping from rules to their productions. The order of rules is
    /// identical to that of `rule_names`; every rule has at least one
    /// production; productions are not necessarily stored sequentially.
    rules_prods: Vec<Vec<PIdx<StorageT>>>,
    /// A mapping from productions to their corresponding rule indices.
    prods_rules: Vec<RIdx<StorageT>>,
    /// Reachability diagnostics collected at construction time.
    warnings: Vec<GrammarWarning>,
}

// Internally, we assume that a grammar's start rule has a single production.
// Since we synthesise the start rule ourselves, this is a safe assumption.

impl<StorageT: 'static + PrimInt + Unsigned> Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Freeze a validated builder into a `Grammar`, synthesising a start
    /// rule (referred to as `^`, though the actual name is a fresh name
    /// guaranteed to be unique) that references the user's start rule, and
    /// appending the reserved EOF token.
    pub(crate) fn new(gb: GrammarBuilder) -> Result<Self, MalformedGrammarError> {
        // Check that StorageT is big enough to hold every RIdx/PIdx/SIdx/TIdx
        // value, remembering that one rule, one production, and one token are
        // added beyond what the builder holds. After these checks, idioms
        // like RIdx(x.as_()) are safe throughout.
        let max_idx = num_traits::cast::<_, usize>(StorageT::max_value()).unwrap_or(usize::MAX);
        if gb.rules.len() >= max_idx || gb.tokens.len() >= max_idx || gb.prods.len() >= max_idx {
            return Err(MalformedGrammarError {
                kind: MalformedGrammarErrorKind::TooManySymbols,
                name: None,
            });
        }
        for prod in &gb.prods {
            if prod.len() > max_idx {
                return Err(MalformedGrammarError {
                    kind: MalformedGrammarErrorKind::TooManySymbols,
                    name: None,
                });
            }
        }

        // Generate a guaranteed unique start rule name by extending the
        // candidate until it clashes with nothing (at worst this loops once
        // per rule in the grammar).
        let mut start_rule = START_RULE.to_string();
        while gb.rules.contains_key(&start_rule) {
            start_rule += START_RULE;
        }
        let mut rule_names: Vec<String> = Vec::with_capacity(gb.rules.len() + 1);
        rule_names.push(start_rule.clone());
        for k in gb.rules.keys() {
            rule_names.push(k.clone());
        }

        let mut rules_prods: Vec<Vec<PIdx<StorageT>>> = Vec::with_capacity(rule_names.len());
        let mut rule_map = HashMap::<String, RIdx<StorageT>>::new();
        for (i, v) in rule_names.iter().enumerate() {
            rules_prods.push(Vec::new());
            rule_map.insert(v.clone(), RIdx(i.as_()));
        }

        let mut token_names: Vec<Option<String>> = Vec::with_capacity(gb.tokens.len() + 1);
        for k in gb.tokens.iter() {
            token_names.push(Some(k.clone()));
        }
        let eof_token_idx = TIdx(token_names.len().as_());
        token_names.push(None);
        let mut token_map = HashMap::<String, TIdx<StorageT>>::new();
        for (i, v) in token_names.iter().enumerate() {
            if let Some(n) = v.as_ref() {
                token_map.insert(n.clone(), TIdx(i.as_()));
            }
        }

        // Builder production indices map 1:1 to grammar indices, so the
        // synthesised start production goes at the *end* of the list.
        let mut prods = vec![None; gb.prods.len()];
        let mut prods_rules = vec![None; gb.prods.len()];
        for (rule_name, pidxs) in &gb.rules {
            let ridx = rule_map[rule_name];
            for &pidx in pidxs {
                let body = gb.prods[pidx]
                    .iter()
                    .map(|sym| match sym {
                        GrammarSymbol::Rule(n) => Symbol::Rule(rule_map[n]),
                        GrammarSymbol::Token(n) => Symbol::Token(token_map[n]),
                    })
                    .collect::<Vec<_>>();
                prods[pidx] = Some(body);
                prods_rules[pidx] = Some(ridx);
                rules_prods[usize::from(ridx)].push(PIdx(pidx.as_()));
            }
        }
        let start_ridx = rule_map[&start_rule];
        let start_prod = PIdx(prods.len().as_());
        rules_prods[usize::from(start_ridx)].push(start_prod);
        prods.push(Some(vec![Symbol::Rule(rule_map[gb.start.as_ref().unwrap()])]));
        prods_rules.push(Some(start_ridx));

        let prods = prods
            .into_iter()
            .map(Option::unwrap)
            .collect::<Vec<Vec<Symbol<StorageT>>>>();
        let prods_rules = prods_rules
            .into_iter()
            .map(Option::unwrap)
            .collect::<Vec<RIdx<StorageT>>>();

        let warnings = reachability_warnings(
            &rule_names,
            &token_names,
            &prods,
            &rules_prods,
            usize::from(start_ridx),
        );

        Ok(Grammar {
            rules_len: RIdx(rule_names.len().as_()),
            rule_names,
            tokens_len: TIdx(token_names.len().as_()),
            eof_token_idx,
            token_names,
            prods_len: PIdx(prods.len().as_()),
            start_prod,
            prods,
            rules_prods,
            prods_rules,
            warnings,
        })
    }

    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> PIdx<StorageT> {
        self.prods_len
    }

    /// Return an iterator which produces (in order from `0..prods_len()`)
    /// all this grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx<StorageT>> {
        // as_ is safe: we only generate integers up to prods_len, which by
        // definition fit within StorageT.
        (0..usize::from(self.prods_len)).map(|x| PIdx(x.as_()))
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx`
    /// doesn't exist.
    pub fn prod(&self, pidx: PIdx<StorageT>) -> &[Symbol<StorageT>] {
        &self.prods[usize::from(pidx)]
    }

    /// How many symbols does production `pidx` have? Panics if `pidx`
    /// doesn't exist.
    pub fn prod_len(&self, pidx: PIdx<StorageT>) -> SIdx<StorageT> {
        SIdx(self.prods[usize::from(pidx)].len().as_())
    }

    /// Return the rule index of production `pidx`. Panics if `pidx` doesn't
    /// exist.
    pub fn prod_to_rule(&self, pidx: PIdx<StorageT>) -> RIdx<StorageT> {
        self.prods_rules[usize::from(pidx)]
    }

    /// Return the production index of the start rule's sole production.
    pub fn start_prod(&self) -> PIdx<StorageT> {
        self.start_prod
    }

    /// What is the index of the start rule? Note that this is the
    /// synthesised rule sitting "above" the rule passed to
    /// [`GrammarBuilder::start`].
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.prod_to_rule(self.start_prod)
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        self.rules_len
    }

    /// Return an iterator which produces (in order from `0..rules_len()`)
    /// all this grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx<StorageT>> {
        (0..usize::from(self.rules_len)).map(|x| RIdx(x.as_()))
    }

    /// Return the productions for rule `ridx`. Panics if `ridx` doesn't
    /// exist.
    pub fn rule_to_prods(&self, ridx: RIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name(&self, ridx: RIdx<StorageT>) -> &str {
        self.rule_names[usize::from(ridx)].as_str()
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_names
            .iter()
            .position(|x| x == n)
            // as_ is safe: rule_names is guaranteed to fit within StorageT.
            .map(|x| RIdx(x.as_()))
    }

    /// How many tokens does this grammar have, including the reserved EOF
    /// token?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        self.tokens_len
    }

    /// Return an iterator which produces (in order from `0..tokens_len()`)
    /// all this grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> {
        (0..usize::from(self.tokens_len)).map(|x| TIdx(x.as_()))
    }

    /// Return the index of the reserved EOF token.
    pub fn eof_token_idx(&self) -> TIdx<StorageT> {
        self.eof_token_idx
    }

    /// Return the name of token `tidx` (`None` is returned for the reserved
    /// EOF token). Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> Option<&str> {
        self.token_names[usize::from(tidx)].as_deref()
    }

    /// Return the index of the token named `n` or `None` if it doesn't
    /// exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_names
            .iter()
            .position(|x| x.as_deref() == Some(n))
            .map(|x| TIdx(x.as_()))
    }

    /// Returns a map from names to `TIdx`s of all tokens which a token
    /// stream can legally produce for this grammar.
    pub fn tokens_map(&self) -> HashMap<&str, TIdx<StorageT>> {
        let mut m = HashMap::with_capacity(usize::from(self.tokens_len) - 1);
        for tidx in self.iter_tidxs() {
            if let Some(n) = self.token_names[usize::from(tidx)].as_ref() {
                m.insert(&**n, tidx);
            }
        }
        m
    }

    /// Reachability diagnostics: rules which can never partake in a
    /// derivation from the start rule, and tokens referenced only from such
    /// rules. These are deliberately not errors.
    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.warnings
    }

    /// Returns the string representation of production `pidx`.
    pub fn pp_prod(&self, pidx: PIdx<StorageT>) -> String {
        let mut sprod = String::new();
        let ridx = self.prod_to_rule(pidx);
        sprod.push_str(self.rule_name(ridx));
        sprod.push(':');
        for sym in self.prod(pidx) {
            let s = match *sym {
                Symbol::Token(tidx) => self.token_name(tidx).unwrap(),
                Symbol::Rule(ridx) => self.rule_name(ridx),
            };
            sprod.push_str(&format!(" \"{}\"", s));
        }
        sprod
    }

    /// Return the FIRST sets of this grammar.
    pub fn firsts(&self) -> Firsts<StorageT> {
        Firsts::new(self)
    }

    /// Return the FOLLOW sets of this grammar.
    pub fn follows(&self) -> Follows<StorageT> {
        Follows::new(self)
    }
}

/// Walk the rule graph from the start rule, recording every rule reached and
/// every token referenced along the way; whatever is left over is warned
/// about.
fn reachability_warnings<StorageT: 'static + PrimInt + Unsigned>(
    rule_names: &[String],
    token_names: &[Option<String>],
    prods: &[Vec<Symbol<StorageT>>],
    rules_prods: &[Vec<PIdx<StorageT>>],
    start_ridx: usize,
) -> Vec<GrammarWarning>
where
    usize: AsPrimitive<StorageT>,
{
    let mut seen = vec![false; rule_names.len()];
    let mut todo = vec![false; rule_names.len()];
    let mut used_tokens = vec![false; token_names.len()];
    todo[start_ridx] = true;
    loop {
        let mut empty = true;
        for i in 0..todo.len() {
            if !todo[i] {
                continue;
            }
            seen[i] = true;
            todo[i] = false;
            empty = false;
            for pidx in &rules_prods[i] {
                for sym in &prods[usize::from(*pidx)] {
                    match *sym {
                        Symbol::Rule(s_ridx) => {
                            if !seen[usize::from(s_ridx)] {
                                todo[usize::from(s_ridx)] = true;
                            }
                        }
                        Symbol::Token(s_tidx) => {
                            used_tokens[usize::from(s_tidx)] = true;
                        }
                    }
                }
            }
        }
        if empty {
            break;
        }
    }

    let mut warnings = Vec::new();
    for (i, rule_seen) in seen.iter().enumerate() {
        if !rule_seen {
            warnings.push(GrammarWarning {
                kind: GrammarWarningKind::UnreachableRule,
                name: rule_names[i].clone(),
            });
        }
    }
    for (i, token_used) in used_tokens.iter().enumerate() {
        if let Some(name) = token_names[i].as_ref() {
            if !token_used {
                warnings.push(GrammarWarning {
                    kind: GrammarWarningKind::UnusedToken,
                    name: name.clone(),
                });
            }
        }
    }
    warnings
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GrammarWarningKind {
    UnreachableRule,
    UnusedToken,
}

/// A non-fatal observation about a grammar, collected while building it.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GrammarWarning {
    pub kind: GrammarWarningKind,
    pub name: String,
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            GrammarWarningKind::UnreachableRule => {
                write!(f, "Rule '{}' is not reachable from the start rule", self.name)
            }
            GrammarWarningKind::UnusedToken => {
                write!(f, "Token '{}' only appears in unreachable productions", self.name)
            }
        }
    }
}
