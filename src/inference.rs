use crate::bindings::Bindings;
use crate::error::{KbError, Result};
use crate::store::{FactId, Item, KnowledgeBase, RuleId};
use crate::term::{Rule, Statement, Term};
use crate::unify::{match_statement, unify, unify_both, Exclusions};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace, warn};
use std::borrow::Cow;

/// Forward and backward chaining over a [`KnowledgeBase`]
///
/// The engine holds no state of its own: every method works only on its
/// arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceEngine;

/// How one antecedent of a proved rule was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Premise {
    /// A fact already live in the store
    Fact(FactId),
    /// A statement proved through another rule
    Derived(Proof),
}

/// A backward chaining proof of one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// The stored rule the proof applies
    pub rule: RuleId,
    /// The proved statement
    pub conclusion: Statement,
    /// Premises in the order they discharged the rule's antecedents
    pub premises: Vec<Premise>,
}

impl InferenceEngine {
    /// Creates an engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Derives everything that follows from combining `fact` with `rule`.
    ///
    /// Each antecedent that matches `fact` gives one derivation. Under its
    /// bindings, every antecedent that becomes identical to `fact` is
    /// discharged; the others stay, instantiated. With nothing left the
    /// derivation is a fact (the instantiated consequent), otherwise a
    /// partially applied rule.
    #[must_use]
    pub fn fc_infer(&self, fact: &Statement, rule: &Rule) -> Vec<Item> {
        let rule = apart_from(fact, rule);
        let mut derived = IndexSet::new();

        for antecedent in &rule.lhs {
            let Some(bindings) = match_statement(antecedent, fact) else {
                continue;
            };
            let lhs = remaining(&rule, &bindings, fact);
            let rhs = bindings.instantiate(&rule.rhs);
            derived.insert(if lhs.is_empty() {
                Item::Fact(rhs)
            } else {
                Item::Rule(Rule { lhs, rhs })
            });
        }

        derived.into_iter().collect()
    }

    /// Searches the rules of `kb` for a proof of `goal`.
    ///
    /// Direct fact matches for `goal` itself are the caller's first step;
    /// this only looks at rules whose consequent unifies with it. The first
    /// rule, in store order, yielding a complete proof wins.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::SearchExhausted`] when no proof was found and some
    /// branch was cut at the configured depth limit.
    pub fn prove(&self, kb: &KnowledgeBase, goal: &Statement) -> Result<Option<Proof>> {
        let mut search = Search::new(kb);
        let proof = search.first_proof(goal, &Exclusions::new(), 0);

        match (proof, search.exhausted) {
            (Some(proof), _) => {
                debug!("Found proof of {goal} through {:?}", proof.rule);
                Ok(Some(proof))
            }
            (None, Some(depth)) => Err(KbError::SearchExhausted {
                goal: goal.clone(),
                depth,
            }),
            (None, None) => Ok(None),
        }
    }
}

/// Renames the rule's variables if the fact uses any of the same names.
fn apart_from<'r>(fact: &Statement, rule: &'r Rule) -> Cow<'r, Rule> {
    let fact_vars: IndexSet<&str> = fact.variables().collect();
    if !rule.variables().any(|var| fact_vars.contains(var)) {
        return Cow::Borrowed(rule);
    }

    let mut counter = 0usize;
    loop {
        let renamed = rule.rename_apart(&format!("'{counter}"));
        if !renamed.variables().any(|var| fact_vars.contains(var)) {
            return Cow::Owned(renamed);
        }
        counter += 1;
    }
}

/// Instantiated antecedents of `rule` minus those now equal to `discharged`.
fn remaining(rule: &Rule, bindings: &Bindings, discharged: &Statement) -> Vec<Statement> {
    rule.lhs
        .iter()
        .map(|stmt| bindings.instantiate(stmt))
        .filter(|stmt| stmt != discharged)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// The rule left once `satisfied` has discharged antecedents of `partial`.
fn advance(partial: &Rule, bindings: &Bindings, satisfied: &Statement) -> Rule {
    Rule {
        lhs: remaining(partial, bindings, satisfied),
        rhs: bindings.instantiate(&partial.rhs),
    }
}

/// Variables renamed by order of first appearance, so goals that differ only
/// in variable names compare equal.
fn canonical(goal: &Statement) -> Statement {
    let mut names: IndexMap<&str, usize> = IndexMap::new();
    let terms = goal.terms.iter().map(|term| match term {
        Term::Variable(var) => {
            let next = names.len();
            let idx = *names.entry(var.as_str()).or_insert(next);
            Term::Variable(format!("_{idx}"))
        }
        Term::Constant(_) => term.clone(),
    });
    Statement::new(goal.predicate.clone(), terms.collect::<Vec<_>>())
}

/// A rule instance proved down to its conclusion
#[derive(Debug)]
struct Step {
    conclusion: Statement,
    premises: Vec<Premise>,
}

/// Receives each proof of a goal in turn; `Some` ends the whole search.
type ProofSink<'k, 'a> = &'k mut dyn FnMut(&mut Search<'a>, Proof) -> Option<Proof>;

/// Receives each fully discharged rule instance in turn.
type StepSink<'k, 'a> = &'k mut dyn FnMut(&mut Search<'a>, Step) -> Option<Proof>;

/// State of one backward search
///
/// Proofs are handed to continuations rather than returned, so a caller
/// whose later antecedents fail simply returns `None` and the search moves
/// on to the next proof of the earlier one.
#[derive(Debug)]
struct Search<'a> {
    kb: &'a KnowledgeBase,
    max_depth: usize,
    trace: bool,
    next_suffix: usize,
    /// Goals currently being proved on this branch, canonicalised
    path: Vec<Statement>,
    exhausted: Option<usize>,
}

impl<'a> Search<'a> {
    fn new(kb: &'a KnowledgeBase) -> Self {
        let config = kb.config();
        Self {
            kb,
            max_depth: config.max_depth,
            trace: config.trace_inference,
            next_suffix: 0,
            path: Vec::new(),
            exhausted: None,
        }
    }

    fn cut(&mut self, depth: usize) -> bool {
        if depth <= self.max_depth {
            return false;
        }
        if self.exhausted.is_none() {
            warn!("Backward search reached depth limit {}", self.max_depth);
        }
        self.exhausted = Some(self.max_depth);
        true
    }

    /// First proof of `goal`, with no further constraint on it.
    fn first_proof(&mut self, goal: &Statement, used: &Exclusions, depth: usize) -> Option<Proof> {
        self.prove_rules(goal, used, depth, &mut |_, proof| Some(proof))
    }

    /// Feeds every proof of `goal` through a rule whose consequent unifies
    /// with it to `sink`, until `sink` accepts one.
    ///
    /// `depth` counts nested rule applications.
    fn prove_rules(
        &mut self,
        goal: &Statement,
        used: &Exclusions,
        depth: usize,
        sink: ProofSink<'_, 'a>,
    ) -> Option<Proof> {
        let key = canonical(goal);
        if self.cut(depth) || self.path.contains(&key) {
            return None;
        }
        self.path.push(key.clone());

        let kb = self.kb;
        let mut found = None;
        for (rule_id, rule) in kb.rule_entries() {
            self.next_suffix += 1;
            let renamed = rule.rename_apart(&format!("#{}", self.next_suffix));
            let Some(bindings) = unify_both(&renamed.rhs, goal) else {
                continue;
            };
            if self.trace {
                trace!("Trying {rule} for {goal}");
            }
            let partial = bindings.instantiate_rule(&renamed);
            found = self.bc_infer_step(&partial, used, depth, Vec::new(), &mut |search, step| {
                let proof = Proof {
                    rule: rule_id,
                    conclusion: step.conclusion,
                    premises: step.premises,
                };
                // The caller's remaining work is not part of this goal
                search.path.pop();
                let answer = sink(search, proof);
                search.path.push(key.clone());
                answer
            });
            if found.is_some() {
                break;
            }
        }

        self.path.pop();
        found
    }

    /// Proves the antecedents of `partial`, backtracking over candidate facts
    /// and over alternative proofs of derived antecedents.
    ///
    /// A fact match must bind at least one variable and may not bind any term
    /// in `used`; the terms it binds join `used` for the rest of the branch.
    fn bc_infer_step(
        &mut self,
        partial: &Rule,
        used: &Exclusions,
        depth: usize,
        premises: Vec<Premise>,
        sink: StepSink<'_, 'a>,
    ) -> Option<Proof> {
        if partial.lhs.iter().all(Statement::is_ground) {
            let mut premises = premises;
            premises.extend(self.check_facts(&partial.lhs, used, depth)?);
            return sink(
                self,
                Step {
                    conclusion: partial.rhs.clone(),
                    premises,
                },
            );
        }

        let kb = self.kb;
        for (fact_id, fact) in kb.fact_entries() {
            for antecedent in &partial.lhs {
                let Some(bindings) = unify(antecedent, fact, &Bindings::new(), used) else {
                    continue;
                };
                if bindings.is_empty() {
                    continue;
                }
                if self.trace {
                    trace!("{antecedent} matched {fact} with {bindings}");
                }
                let mut next_premises = premises.clone();
                next_premises.push(Premise::Fact(fact_id));
                let next = advance(partial, &bindings, fact);
                let found = self.discharge(&next, &bindings, used, depth, next_premises, &mut *sink);
                if found.is_some() {
                    return found;
                }
            }
        }

        // No stored fact completes the rule; derive an open antecedent instead
        for antecedent in partial.lhs.iter().filter(|stmt| !stmt.is_ground()) {
            let found = self.prove_rules(antecedent, used, depth + 1, &mut |search, proof| {
                let bindings = unify(antecedent, &proof.conclusion, &Bindings::new(), used)?;
                let next = advance(partial, &bindings, &proof.conclusion);
                let mut next_premises = premises.clone();
                next_premises.push(Premise::Derived(proof));
                search.discharge(&next, &bindings, used, depth, next_premises, &mut *sink)
            });
            if found.is_some() {
                return found;
            }
        }

        None
    }

    /// Continues with `next`, the rule left after one antecedent was
    /// satisfied under `bindings`.
    fn discharge(
        &mut self,
        next: &Rule,
        bindings: &Bindings,
        used: &Exclusions,
        depth: usize,
        premises: Vec<Premise>,
        sink: StepSink<'_, 'a>,
    ) -> Option<Proof> {
        if next.lhs.is_empty() {
            return sink(
                self,
                Step {
                    conclusion: next.rhs.clone(),
                    premises,
                },
            );
        }
        let mut used = used.clone();
        used.extend(bindings.values().cloned());
        self.bc_infer_step(next, &used, depth, premises, sink)
    }

    /// Every ground antecedent must be a live fact or provable through rules.
    fn check_facts(
        &mut self,
        antecedents: &[Statement],
        used: &Exclusions,
        depth: usize,
    ) -> Option<Vec<Premise>> {
        let mut seen = IndexSet::new();
        let mut premises = Vec::new();
        for antecedent in antecedents {
            if !seen.insert(antecedent) {
                continue;
            }
            if let Some(fact_id) = self.kb.fact_id(antecedent) {
                premises.push(Premise::Fact(fact_id));
                continue;
            }
            // A ground goal has one conclusion, so its first proof will do
            let proof = self.first_proof(antecedent, used, depth + 1)?;
            premises.push(Premise::Derived(proof));
        }
        Some(premises)
    }
}
