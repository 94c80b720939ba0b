use crate::bindings::Bindings;
use crate::config::{ChainingMode, KbConfig};
use crate::error::{KbError, Result};
use crate::explain::Explanation;
use crate::inference::{InferenceEngine, Premise, Proof};
use crate::term::{Rule, Statement};
use crate::unify::match_statement;
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;

/// Stable handle of a fact in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactId(usize);

impl FactId {
    /// Position in the fact arena
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable handle of a rule in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(usize);

impl RuleId {
    /// Position in the rule arena
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Either kind of node in the justification graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// A fact
    Fact(FactId),
    /// A rule
    Rule(RuleId),
}

/// One derivation path: the fact and the rule an item was inferred from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Justification {
    /// The premise fact
    pub fact: FactId,
    /// The premise rule
    pub rule: RuleId,
}

impl Justification {
    /// True if `node` is one of the two premises
    #[must_use]
    pub fn mentions(self, node: NodeId) -> bool {
        match node {
            NodeId::Fact(id) => self.fact == id,
            NodeId::Rule(id) => self.rule == id,
        }
    }
}

/// Truth maintenance bookkeeping shared by facts and rules
///
/// A node is live while it is asserted or has a justification whose
/// premises are themselves live without depending on the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Support {
    asserted: bool,
    supported_by: SmallVec<[Justification; 2]>,
    supports_facts: Vec<FactId>,
    supports_rules: Vec<RuleId>,
}

impl Support {
    fn new(justification: Option<Justification>) -> Self {
        Self {
            asserted: justification.is_none(),
            supported_by: justification.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Whether a caller asserted the node directly
    #[must_use]
    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    /// Every independent derivation of the node
    #[must_use]
    pub fn supported_by(&self) -> &[Justification] {
        &self.supported_by
    }

    /// Facts derived using this node as a premise
    #[must_use]
    pub fn supports_facts(&self) -> &[FactId] {
        &self.supports_facts
    }

    /// Rules derived using this node as a premise
    #[must_use]
    pub fn supports_rules(&self) -> &[RuleId] {
        &self.supports_rules
    }

    /// Direct assertion sets the flag; a derivation adds its justification.
    fn merge(&mut self, justification: Option<Justification>) {
        match justification {
            Some(justification) => {
                if !self.supported_by.contains(&justification) {
                    self.supported_by.push(justification);
                }
            }
            None => self.asserted = true,
        }
    }

    fn add_dependent(&mut self, node: NodeId) {
        match node {
            NodeId::Fact(id) if !self.supports_facts.contains(&id) => self.supports_facts.push(id),
            NodeId::Rule(id) if !self.supports_rules.contains(&id) => self.supports_rules.push(id),
            _ => {}
        }
    }

    fn dependents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.supports_facts
            .iter()
            .map(|&id| NodeId::Fact(id))
            .chain(self.supports_rules.iter().map(|&id| NodeId::Rule(id)))
    }
}

/// A fact held by the store
#[derive(Debug, Clone)]
pub struct FactNode {
    statement: Statement,
    support: Support,
}

impl FactNode {
    /// The believed statement
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Its justification bookkeeping
    #[must_use]
    pub fn support(&self) -> &Support {
        &self.support
    }
}

/// A rule held by the store
#[derive(Debug, Clone)]
pub struct RuleNode {
    rule: Rule,
    support: Support,
}

impl RuleNode {
    /// The believed rule
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Its justification bookkeeping
    #[must_use]
    pub fn support(&self) -> &Support {
        &self.support
    }
}

/// Something that can be asserted or retracted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item {
    /// A fact
    Fact(Statement),
    /// A rule
    Rule(Rule),
}

impl From<Statement> for Item {
    fn from(statement: Statement) -> Self {
        Self::Fact(statement)
    }
}

impl From<Rule> for Item {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(statement) => write!(f, "fact: {statement}"),
            Self::Rule(rule) => write!(f, "rule: {rule}"),
        }
    }
}

/// An item waiting to be added, with the derivation that produced it
#[derive(Debug)]
struct Pending {
    item: Item,
    justification: Option<Justification>,
}

type Agenda = VecDeque<Pending>;

/// A knowledge base of facts and rules with truth maintenance
///
/// Facts and rules live in arenas addressed by [`FactId`] / [`RuleId`];
/// removed slots are never reused. The hash indexes deduplicate by
/// structural equality and keep insertion order, which is the order
/// queries and searches visit the store.
#[derive(Debug)]
pub struct KnowledgeBase {
    config: KbConfig,
    engine: InferenceEngine,
    facts: Vec<Option<FactNode>>,
    rules: Vec<Option<RuleNode>>,
    fact_index: IndexMap<Statement, FactId>,
    rule_index: IndexMap<Rule, RuleId>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    /// Creates an empty knowledge base with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(KbConfig::default())
    }

    /// Creates an empty knowledge base
    #[must_use]
    pub fn with_config(config: KbConfig) -> Self {
        Self {
            config,
            engine: InferenceEngine::new(),
            facts: Vec::new(),
            rules: Vec::new(),
            fact_index: IndexMap::new(),
            rule_index: IndexMap::new(),
        }
    }

    /// The configuration the store was built with
    #[must_use]
    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    /// Adds a fact or rule.
    ///
    /// An item equal to a stored one only marks the stored one asserted.
    /// A new item is inserted and, in forward mode, chained against every
    /// stored item of the other kind; derivations are added the same way
    /// until nothing new follows.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::EmptyAntecedents`] for a rule without antecedents
    /// and [`KbError::UnboundConsequent`] for a rule whose consequent uses a
    /// variable no antecedent mentions.
    pub fn assert(&mut self, item: impl Into<Item>) -> Result<NodeId> {
        let item = item.into();
        debug!("Adding {item}");
        let mut agenda = Agenda::new();
        let node = match item {
            Item::Fact(statement) => NodeId::Fact(self.add_fact(statement, None, &mut agenda)),
            Item::Rule(rule) => {
                if rule.lhs.is_empty() {
                    return Err(KbError::EmptyAntecedents(rule.rhs));
                }
                if !rule.is_range_restricted() {
                    return Err(KbError::UnboundConsequent(rule));
                }
                NodeId::Rule(self.add_rule(rule, None, &mut agenda))
            }
        };
        self.drain(agenda);
        Ok(node)
    }

    /// Withdraws a directly asserted fact.
    ///
    /// A fact that can still be derived from asserted items only loses its
    /// asserted flag. Otherwise it is removed, and so is everything that can
    /// no longer be derived without it. Derivations that only lead back to
    /// the retracted fact through a cycle do not keep anything alive.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::RuleNotRetractable`] for rules and
    /// [`KbError::FactNotFound`] if no live fact equals the statement.
    pub fn retract(&mut self, item: impl Into<Item>) -> Result<()> {
        let statement = match item.into() {
            Item::Fact(statement) => statement,
            Item::Rule(rule) => return Err(KbError::RuleNotRetractable(rule)),
        };
        debug!("Retracting {statement}");

        let Some(&id) = self.fact_index.get(&statement) else {
            return Err(KbError::FactNotFound(statement));
        };
        let Some(support) = self.support_mut(NodeId::Fact(id)) else {
            return Err(KbError::FactNotFound(statement));
        };
        support.asserted = false;
        self.reground(NodeId::Fact(id));
        if self.fact_index.contains_key(&statement) {
            debug!("{statement} is still derived; cleared asserted flag only");
        }
        Ok(())
    }

    /// All bindings under which `query` matches a live fact, in store order.
    /// Performs no inference.
    #[must_use]
    pub fn query(&self, query: &Statement) -> Vec<Bindings> {
        self.fact_index
            .keys()
            .filter_map(|statement| match_statement(query, statement))
            .collect()
    }

    /// Answers `query`.
    ///
    /// Live facts are checked first: in forward mode every match is returned,
    /// in backward mode the first. Without a direct match the rules are
    /// searched backwards; the first proof found is recorded in the store,
    /// justified like a forward derivation, and its bindings returned. An
    /// empty result means "not entailed"; a single empty [`Bindings`] means
    /// "entailed, nothing to bind".
    ///
    /// # Errors
    ///
    /// Returns [`KbError::SearchExhausted`] if the search was cut at the depth
    /// limit without finding a proof.
    pub fn ask(&mut self, query: &Statement) -> Result<Vec<Bindings>> {
        debug!("Asking {query}");
        let direct: Vec<Bindings> = match self.config.mode {
            ChainingMode::Forward => self.query(query),
            ChainingMode::Backward => self
                .fact_index
                .keys()
                .find_map(|statement| match_statement(query, statement))
                .into_iter()
                .collect(),
        };
        if !direct.is_empty() {
            return Ok(direct);
        }

        let engine = self.engine;
        let Some(proof) = engine.prove(self, query)? else {
            debug!("{query} is not entailed");
            return Ok(Vec::new());
        };
        self.materialize(&proof)?;
        Ok(match_statement(query, &proof.conclusion).into_iter().collect())
    }

    /// Whether `query` is entailed.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::ask`].
    pub fn entails(&mut self, query: &Statement) -> Result<bool> {
        Ok(!self.ask(query)?.is_empty())
    }

    /// Asks `consequence` with `hypothesis` temporarily asserted.
    ///
    /// The hypothesis is retracted again afterwards unless it was already
    /// asserted, so the store ends up as it started apart from derivations
    /// that do not depend on the hypothesis.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::ask`].
    pub fn check_hypothesis(
        &mut self,
        hypothesis: Statement,
        consequence: &Statement,
    ) -> Result<Vec<Bindings>> {
        let already_asserted = self
            .find_fact(&hypothesis)
            .is_some_and(|node| node.support.is_asserted());
        if already_asserted {
            return self.ask(consequence);
        }

        debug!("Assuming {hypothesis}");
        self.assert(hypothesis.clone())?;
        let answer = self.ask(consequence);
        self.retract(hypothesis)?;
        answer
    }

    /// The support tree of a live fact
    #[must_use]
    pub fn explain(&self, statement: &Statement) -> Option<Explanation> {
        let id = self.fact_id(statement)?;
        Explanation::build(self, NodeId::Fact(id))
    }

    /// Handle of the live fact equal to `statement`
    #[must_use]
    pub fn fact_id(&self, statement: &Statement) -> Option<FactId> {
        self.fact_index.get(statement).copied()
    }

    /// Handle of the live rule equal to `rule`
    #[must_use]
    pub fn rule_id(&self, rule: &Rule) -> Option<RuleId> {
        self.rule_index.get(rule).copied()
    }

    /// A live fact by handle
    #[must_use]
    pub fn fact(&self, id: FactId) -> Option<&FactNode> {
        self.facts.get(id.0).and_then(Option::as_ref)
    }

    /// A live rule by handle
    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<&RuleNode> {
        self.rules.get(id.0).and_then(Option::as_ref)
    }

    /// The live fact equal to `statement`
    #[must_use]
    pub fn find_fact(&self, statement: &Statement) -> Option<&FactNode> {
        self.fact(self.fact_id(statement)?)
    }

    /// The live rule equal to `rule`
    #[must_use]
    pub fn find_rule(&self, rule: &Rule) -> Option<&RuleNode> {
        self.rule(self.rule_id(rule)?)
    }

    /// Bookkeeping of a live node
    #[must_use]
    pub fn support(&self, node: NodeId) -> Option<&Support> {
        match node {
            NodeId::Fact(id) => self.fact(id).map(FactNode::support),
            NodeId::Rule(id) => self.rule(id).map(RuleNode::support),
        }
    }

    /// Live facts in store order
    pub fn facts(&self) -> impl Iterator<Item = &FactNode> {
        self.fact_index.values().filter_map(|&id| self.fact(id))
    }

    /// Live rules in store order
    pub fn rules(&self) -> impl Iterator<Item = &RuleNode> {
        self.rule_index.values().filter_map(|&id| self.rule(id))
    }

    /// Number of live facts
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.fact_index.len()
    }

    /// Number of live rules
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_index.len()
    }

    /// True if the store holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fact_index.is_empty() && self.rule_index.is_empty()
    }

    pub(crate) fn fact_entries(&self) -> impl Iterator<Item = (FactId, &Statement)> {
        self.fact_index.iter().map(|(statement, &id)| (id, statement))
    }

    pub(crate) fn rule_entries(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rule_index.iter().map(|(rule, &id)| (id, rule))
    }

    fn drain(&mut self, mut agenda: Agenda) {
        while let Some(Pending {
            item,
            justification,
        }) = agenda.pop_front()
        {
            match item {
                Item::Fact(statement) => {
                    self.add_fact(statement, justification, &mut agenda);
                }
                Item::Rule(rule) => {
                    self.add_rule(rule, justification, &mut agenda);
                }
            }
        }
    }

    fn add_fact(
        &mut self,
        statement: Statement,
        justification: Option<Justification>,
        agenda: &mut Agenda,
    ) -> FactId {
        if let Some(&id) = self.fact_index.get(&statement) {
            self.merge(NodeId::Fact(id), justification);
            return id;
        }

        let id = FactId(self.facts.len());
        debug!("New fact {statement}");
        if self.config.mode == ChainingMode::Forward {
            for (rule, &rule_id) in &self.rule_index {
                if self.config.trace_inference {
                    trace!("Attempting to infer from {statement} and {rule}");
                }
                let justification = Justification { fact: id, rule: rule_id };
                agenda.extend(
                    self.engine
                        .fc_infer(&statement, rule)
                        .into_iter()
                        .map(|item| Pending {
                            item,
                            justification: Some(justification),
                        }),
                );
            }
        }

        self.facts.push(Some(FactNode {
            statement: statement.clone(),
            support: Support::new(justification),
        }));
        self.fact_index.insert(statement, id);
        if let Some(justification) = justification {
            self.link(justification, NodeId::Fact(id));
        }
        id
    }

    fn add_rule(
        &mut self,
        rule: Rule,
        justification: Option<Justification>,
        agenda: &mut Agenda,
    ) -> RuleId {
        if let Some(&id) = self.rule_index.get(&rule) {
            self.merge(NodeId::Rule(id), justification);
            return id;
        }

        let id = RuleId(self.rules.len());
        debug!("New rule {rule}");
        if self.config.mode == ChainingMode::Forward {
            for (statement, &fact_id) in &self.fact_index {
                if self.config.trace_inference {
                    trace!("Attempting to infer from {statement} and {rule}");
                }
                let justification = Justification { fact: fact_id, rule: id };
                agenda.extend(
                    self.engine
                        .fc_infer(statement, &rule)
                        .into_iter()
                        .map(|item| Pending {
                            item,
                            justification: Some(justification),
                        }),
                );
            }
        }

        self.rules.push(Some(RuleNode {
            rule: rule.clone(),
            support: Support::new(justification),
        }));
        self.rule_index.insert(rule, id);
        if let Some(justification) = justification {
            self.link(justification, NodeId::Rule(id));
        }
        id
    }

    /// Folds a repeated assertion or derivation into an existing node.
    fn merge(&mut self, node: NodeId, justification: Option<Justification>) {
        // An item rederived from itself gains no independent support
        if justification.is_some_and(|justification| justification.mentions(node)) {
            trace!("Ignoring self-justification of {node:?}");
            return;
        }
        if let Some(support) = self.support_mut(node) {
            support.merge(justification);
        }
        if let Some(justification) = justification {
            self.link(justification, node);
        }
    }

    /// Records `derived` as a dependent of both premises.
    fn link(&mut self, justification: Justification, derived: NodeId) {
        for premise in [
            NodeId::Fact(justification.fact),
            NodeId::Rule(justification.rule),
        ] {
            if let Some(support) = self.support_mut(premise) {
                support.add_dependent(derived);
            }
        }
    }

    fn support_mut(&mut self, node: NodeId) -> Option<&mut Support> {
        match node {
            NodeId::Fact(id) => self
                .facts
                .get_mut(id.0)
                .and_then(Option::as_mut)
                .map(|node| &mut node.support),
            NodeId::Rule(id) => self
                .rules
                .get_mut(id.0)
                .and_then(Option::as_mut)
                .map(|node| &mut node.support),
        }
    }

    /// Removes every node that lost its last well-founded support once
    /// `root` stopped being asserted.
    ///
    /// Only nodes downstream of `root` can be affected. Among those, a node
    /// stays if it is asserted or has a justification whose premises both
    /// stay, computed as a least fixed point.
    fn reground(&mut self, root: NodeId) {
        let mut affected = IndexSet::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let Some(support) = self.support(node) else {
                continue;
            };
            if affected.insert(node) {
                stack.extend(support.dependents());
            }
        }

        let mut grounded: IndexSet<NodeId> = IndexSet::new();
        loop {
            let before = grounded.len();
            for &node in &affected {
                if grounded.contains(&node) {
                    continue;
                }
                let Some(support) = self.support(node) else {
                    continue;
                };
                let holds = |premise: NodeId| {
                    self.support(premise).is_some()
                        && (!affected.contains(&premise) || grounded.contains(&premise))
                };
                let stays = support.asserted
                    || support.supported_by.iter().any(|justification| {
                        holds(NodeId::Fact(justification.fact))
                            && holds(NodeId::Rule(justification.rule))
                    });
                if stays {
                    grounded.insert(node);
                }
            }
            if grounded.len() == before {
                break;
            }
        }

        let doomed: Vec<NodeId> = affected
            .into_iter()
            .filter(|node| !grounded.contains(node))
            .collect();
        for &node in &doomed {
            self.take_node(node);
        }
        for &node in &grounded {
            if let Some(support) = self.support_mut(node) {
                support
                    .supported_by
                    .retain(|justification| !doomed.iter().any(|&dead| justification.mentions(dead)));
            }
        }
    }

    fn take_node(&mut self, node: NodeId) -> Option<Support> {
        match node {
            NodeId::Fact(id) => {
                let removed = self.facts.get_mut(id.0)?.take()?;
                self.fact_index.shift_remove(&removed.statement);
                debug!("Removed fact {}", removed.statement);
                Some(removed.support)
            }
            NodeId::Rule(id) => {
                let removed = self.rules.get_mut(id.0)?.take()?;
                self.rule_index.shift_remove(&removed.rule);
                debug!("Removed rule {}", removed.rule);
                Some(removed.support)
            }
        }
    }

    /// Records a backward proof as a chain of derivations.
    ///
    /// Sub-proofs are recorded first. Then each premise discharges its
    /// antecedent in turn: every intermediate rule instance and the final
    /// fact are justified by (premise, previous rule), exactly as forward
    /// chaining would have justified them.
    fn materialize(&mut self, proof: &Proof) -> Result<FactId> {
        let mut premises = Vec::with_capacity(proof.premises.len());
        for premise in &proof.premises {
            let id = match premise {
                Premise::Fact(id) => *id,
                Premise::Derived(sub) => self.materialize(sub)?,
            };
            let Some(node) = self.fact(id) else {
                return Err(KbError::FactNotFound(proof.conclusion.clone()));
            };
            premises.push((id, node.statement.clone()));
        }

        let mut open: IndexSet<Statement> =
            premises.iter().map(|(_, statement)| statement.clone()).collect();
        let mut rule = proof.rule;
        let mut agenda = Agenda::new();
        for (fact, statement) in premises {
            open.shift_remove(&statement);
            let justification = Some(Justification { fact, rule });
            if open.is_empty() {
                debug!("Proved {} by backward chaining", proof.conclusion);
                let id = self.add_fact(proof.conclusion.clone(), justification, &mut agenda);
                self.drain(agenda);
                return Ok(id);
            }
            let step = Rule {
                lhs: open.iter().cloned().collect(),
                rhs: proof.conclusion.clone(),
            };
            rule = self.add_rule(step, justification, &mut agenda);
        }

        self.drain(agenda);
        Err(KbError::FactNotFound(proof.conclusion.clone()))
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Knowledge Base:")?;
        for fact in self.facts() {
            writeln!(f, "{}", fact.statement)?;
        }
        for rule in self.rules() {
            writeln!(f, "{}", rule.rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn stmt(predicate: &str, symbols: &[&str]) -> Statement {
        Statement::from_symbols(predicate, symbols)
    }

    fn grandmother_rule() -> Rule {
        Rule::new(
            [
                stmt("motherof", &["?x", "?y"]),
                stmt("motherof", &["?y", "?z"]),
            ],
            stmt("grandmotherof", &["?x", "?z"]),
        )
    }

    fn family(config: KbConfig) -> KnowledgeBase {
        init_logging();
        let mut kb = KnowledgeBase::with_config(config);
        for (mother, child) in [("ada", "bing"), ("bing", "felix"), ("bing", "chen")] {
            kb.assert(stmt("motherof", &[mother, child]))
                .expect("facts are always accepted");
        }
        kb.assert(grandmother_rule()).expect("rule has antecedents");
        kb
    }

    fn answers(kb: &mut KnowledgeBase, query: &Statement, var: &str) -> Vec<Term> {
        kb.ask(query)
            .expect("search completes")
            .iter()
            .filter_map(|bindings| bindings.get(var).cloned())
            .collect()
    }

    #[test]
    fn test_forward_chaining_derives_all_answers() {
        let mut kb = family(KbConfig::default());
        let query = stmt("grandmotherof", &["ada", "?X"]);

        assert_eq!(
            answers(&mut kb, &query, "X"),
            vec![Term::constant("felix"), Term::constant("chen")]
        );
        let derived = kb
            .find_fact(&stmt("grandmotherof", &["ada", "felix"]))
            .expect("materialized by forward chaining");
        assert!(!derived.support().is_asserted());
        assert_eq!(
            derived.support().supported_by().len(),
            2,
            "derived once from each motherof fact"
        );
    }

    #[test]
    fn test_forward_chaining_order_independent() {
        // Rule first, facts afterwards
        let mut kb = KnowledgeBase::new();
        kb.assert(grandmother_rule()).expect("valid rule");
        kb.assert(stmt("motherof", &["bing", "felix"])).expect("fact");
        kb.assert(stmt("motherof", &["ada", "bing"])).expect("fact");

        assert_eq!(
            kb.query(&stmt("grandmotherof", &["ada", "?X"])).len(),
            1,
            "no duplicates however the derivation was reached"
        );
    }

    #[test]
    fn test_duplicate_assertion_is_deduplicated() {
        let mut kb = KnowledgeBase::new();
        let first = kb.assert(stmt("motherof", &["ada", "bing"])).expect("fact");
        let second = kb.assert(stmt("motherof", &["ada", "bing"])).expect("fact");

        assert_eq!(first, second);
        assert_eq!(kb.fact_count(), 1);
    }

    #[test]
    fn test_assertion_of_derived_fact_merges_support() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("q", &["?x"])], stmt("p", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("q", &["a"])).expect("fact");
        kb.assert(stmt("p", &["a"])).expect("fact");

        let node = kb.find_fact(&stmt("p", &["a"])).expect("live");
        assert!(node.support().is_asserted());
        assert_eq!(node.support().supported_by().len(), 1);
        assert_eq!(kb.fact_count(), 2);
    }

    #[test]
    fn test_retract_supported_fact_only_clears_asserted() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("q", &["?x"])], stmt("p", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("q", &["a"])).expect("fact");
        kb.assert(stmt("p", &["a"])).expect("fact");

        kb.retract(stmt("p", &["a"])).expect("p(a) is live");
        let node = kb.find_fact(&stmt("p", &["a"])).expect("still derived");
        assert!(!node.support().is_asserted());

        kb.retract(stmt("q", &["a"])).expect("q(a) is live");
        assert!(kb.find_fact(&stmt("p", &["a"])).is_none());
        assert_eq!(kb.fact_count(), 0);
    }

    #[test]
    fn test_retraction_cascade_removes_only_solely_supported_items() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("a", &["?x"])], stmt("c", &["?x"])))
            .expect("valid rule");
        kb.assert(Rule::new([stmt("b", &["?x"])], stmt("c", &["?x"])))
            .expect("valid rule");
        kb.assert(Rule::new([stmt("c", &["?x"])], stmt("d", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("a", &["1"])).expect("fact");
        kb.assert(stmt("b", &["1"])).expect("fact");

        kb.retract(stmt("a", &["1"])).expect("live");
        assert!(kb.find_fact(&stmt("c", &["1"])).is_some(), "b(1) still supports c(1)");
        assert!(kb.find_fact(&stmt("d", &["1"])).is_some());

        kb.retract(stmt("b", &["1"])).expect("live");
        assert!(kb.find_fact(&stmt("c", &["1"])).is_none());
        assert!(kb.find_fact(&stmt("d", &["1"])).is_none());
        assert_eq!(kb.rule_count(), 3, "asserted rules survive");
    }

    #[test]
    fn test_retraction_removes_derived_partial_rules() {
        let mut kb = family(KbConfig::default());
        let partial = Rule::new(
            [stmt("motherof", &["bing", "?z"])],
            stmt("grandmotherof", &["ada", "?z"]),
        );
        assert!(kb.find_rule(&partial).is_some());

        kb.retract(stmt("motherof", &["ada", "bing"])).expect("live");

        assert!(kb.find_rule(&partial).is_none());
        assert!(kb
            .ask(&stmt("grandmotherof", &["ada", "?X"]))
            .expect("search completes")
            .is_empty());
        assert!(kb.find_rule(&grandmother_rule()).is_some());
    }

    #[test]
    fn test_retract_errors() {
        let mut kb = family(KbConfig::default());

        assert!(matches!(
            kb.retract(grandmother_rule()),
            Err(KbError::RuleNotRetractable(_))
        ));
        assert!(matches!(
            kb.retract(stmt("motherof", &["zed", "ada"])),
            Err(KbError::FactNotFound(_))
        ));
        assert!(kb.find_rule(&grandmother_rule()).is_some());
    }

    #[test]
    fn test_rule_without_antecedents_is_rejected() {
        let mut kb = KnowledgeBase::new();
        let result = kb.assert(Rule::new([], stmt("p", &["a"])));
        assert!(matches!(result, Err(KbError::EmptyAntecedents(_))));
        assert!(kb.is_empty());
    }

    #[test]
    fn test_ground_query_distinguishes_zero_bindings_from_no_match() {
        let mut kb = family(KbConfig::default());

        let yes = kb.ask(&stmt("motherof", &["ada", "bing"])).expect("ok");
        assert_eq!(yes, vec![Bindings::new()]);

        let no = kb.ask(&stmt("motherof", &["felix", "ada"])).expect("ok");
        assert!(no.is_empty());
    }

    #[test]
    fn test_backward_mode_does_not_materialize_on_assert() {
        let kb = family(KbConfig::new().with_mode(ChainingMode::Backward));
        assert_eq!(kb.fact_count(), 3);
        assert_eq!(kb.rule_count(), 1);
        assert!(kb.query(&stmt("grandmotherof", &["?x", "?y"])).is_empty());
    }

    #[test]
    fn test_backward_mode_returns_first_proof_and_records_it() {
        let mut kb = family(KbConfig::new().with_mode(ChainingMode::Backward));
        let query = stmt("grandmotherof", &["ada", "?X"]);

        assert_eq!(answers(&mut kb, &query, "X"), vec![Term::constant("felix")]);

        let proved = kb
            .find_fact(&stmt("grandmotherof", &["ada", "felix"]))
            .expect("proof is recorded");
        assert!(!proved.support().is_asserted());
        assert_eq!(proved.support().supported_by().len(), 1);

        // Second ask hits the recorded fact directly and still returns one answer
        assert_eq!(answers(&mut kb, &query, "X"), vec![Term::constant("felix")]);
    }

    #[test]
    fn test_backward_proof_is_retracted_with_its_premise() {
        let mut kb = family(KbConfig::new().with_mode(ChainingMode::Backward));
        let query = stmt("grandmotherof", &["ada", "?X"]);
        assert!(kb.entails(&query).expect("search completes"));

        kb.retract(stmt("motherof", &["ada", "bing"])).expect("live");

        assert!(kb
            .find_fact(&stmt("grandmotherof", &["ada", "felix"]))
            .is_none());
        assert!(!kb.entails(&query).expect("search completes"));
        assert_eq!(kb.rule_count(), 1, "intermediate rule instance is gone");
    }

    #[test]
    fn test_backward_chaining_through_several_rules() {
        let mut kb = KnowledgeBase::with_config(KbConfig::new().with_mode(ChainingMode::Backward));
        kb.assert(Rule::new(
            [stmt("motherof", &["?x", "?y"])],
            stmt("parentof", &["?x", "?y"]),
        ))
        .expect("valid rule");
        kb.assert(Rule::new(
            [
                stmt("parentof", &["?x", "?y"]),
                stmt("parentof", &["?y", "?z"]),
            ],
            stmt("grandparentof", &["?x", "?z"]),
        ))
        .expect("valid rule");
        kb.assert(stmt("motherof", &["ada", "bing"])).expect("fact");
        kb.assert(stmt("motherof", &["bing", "felix"])).expect("fact");

        assert_eq!(
            answers(&mut kb, &stmt("grandparentof", &["ada", "?Z"]), "Z"),
            vec![Term::constant("felix")]
        );
        assert!(kb.find_fact(&stmt("parentof", &["ada", "bing"])).is_some());
    }

    #[test]
    fn test_backward_search_terminates_on_cyclic_connectivity() {
        let mut kb = KnowledgeBase::with_config(KbConfig::new().with_mode(ChainingMode::Backward));
        kb.assert(Rule::new(
            [
                stmt("connected", &["?x", "?y"]),
                stmt("connected", &["?y", "?z"]),
            ],
            stmt("connected", &["?x", "?z"]),
        ))
        .expect("valid rule");
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "a")] {
            kb.assert(stmt("connected", &[from, to])).expect("fact");
        }

        assert!(kb.entails(&stmt("connected", &["a", "c"])).expect("terminates"));
        assert!(!kb.entails(&stmt("connected", &["a", "d"])).expect("terminates"));
    }

    #[test]
    fn test_search_exhausted_is_reported() {
        // s(a) needs three nested rule applications: s <- r <- q <- p
        let mut kb = KnowledgeBase::with_config(
            KbConfig::new()
                .with_mode(ChainingMode::Backward)
                .with_max_depth(1),
        );
        for (from, to) in [("p", "q"), ("q", "r"), ("r", "s")] {
            kb.assert(Rule::new([stmt(from, &["?x"])], stmt(to, &["?x"])))
                .expect("valid rule");
        }
        kb.assert(stmt("p", &["a"])).expect("fact");

        let result = kb.ask(&stmt("s", &["a"]));
        assert!(matches!(
            result,
            Err(KbError::SearchExhausted { depth: 1, .. })
        ));
    }

    fn chain(mode: ChainingMode, edges: usize) -> KnowledgeBase {
        let mut kb = KnowledgeBase::with_config(KbConfig::new().with_mode(mode));
        kb.assert(Rule::new([stmt("edge", &["?x", "?y"])], stmt("path", &["?x", "?y"])))
            .expect("valid rule");
        kb.assert(Rule::new(
            [stmt("path", &["?x", "?y"]), stmt("edge", &["?y", "?z"])],
            stmt("path", &["?x", "?z"]),
        ))
        .expect("valid rule");
        for i in 0..edges {
            let from = format!("n{i}");
            let to = format!("n{}", i + 1);
            kb.assert(stmt("edge", &[from.as_str(), to.as_str()]))
                .expect("fact");
        }
        kb
    }

    #[test]
    fn test_depth_counts_rule_applications() {
        init_logging();
        let mut kb = chain(ChainingMode::Backward, 30);

        assert!(kb.entails(&stmt("path", &["n0", "n30"])).expect("within depth limit"));
        assert!(kb.find_fact(&stmt("path", &["n0", "n15"])).is_some());
    }

    #[test]
    fn test_backward_search_tries_later_proofs_of_a_derived_antecedent() {
        // p(a, ?y) is first proved with y = b, which has no q; y = c does
        let build = |mode| {
            let mut kb = KnowledgeBase::with_config(KbConfig::new().with_mode(mode));
            kb.assert(Rule::new([stmt("e", &["?x", "?y"])], stmt("p", &["?x", "?y"])))
                .expect("valid rule");
            kb.assert(Rule::new([stmt("f", &["?y"])], stmt("q", &["?y"])))
                .expect("valid rule");
            kb.assert(Rule::new(
                [stmt("p", &["?x", "?y"]), stmt("q", &["?y"])],
                stmt("r", &["?x"]),
            ))
            .expect("valid rule");
            for fact in [
                stmt("e", &["a", "b"]),
                stmt("e", &["a", "c"]),
                stmt("f", &["d"]),
                stmt("f", &["c"]),
            ] {
                kb.assert(fact).expect("fact");
            }
            kb
        };

        let mut forward = build(ChainingMode::Forward);
        let mut backward = build(ChainingMode::Backward);
        assert!(forward.entails(&stmt("r", &["a"])).expect("terminates"));
        assert!(backward.entails(&stmt("r", &["a"])).expect("terminates"));
        assert!(backward.find_fact(&stmt("q", &["c"])).is_some());
        assert!(backward.find_fact(&stmt("q", &["b"])).is_none());
    }

    #[test]
    fn test_retraction_ignores_support_that_cycles_back() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("p", &["?x"])], stmt("q", &["?x"])))
            .expect("valid rule");
        kb.assert(Rule::new([stmt("q", &["?x"])], stmt("p", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("p", &["a"])).expect("fact");
        assert_eq!(
            kb.find_fact(&stmt("p", &["a"])).expect("live").support().supported_by().len(),
            1,
            "p(a) is rederived from q(a)"
        );

        kb.retract(stmt("p", &["a"])).expect("live");

        assert!(kb.find_fact(&stmt("p", &["a"])).is_none());
        assert!(kb.find_fact(&stmt("q", &["a"])).is_none());
        assert!(!kb.entails(&stmt("p", &["a"])).expect("terminates"));
        assert_eq!(kb.rule_count(), 2);
    }

    #[test]
    fn test_retraction_keeps_cycle_with_outside_support() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("p", &["?x"])], stmt("q", &["?x"])))
            .expect("valid rule");
        kb.assert(Rule::new([stmt("q", &["?x"])], stmt("p", &["?x"])))
            .expect("valid rule");
        kb.assert(Rule::new([stmt("s", &["?x"])], stmt("q", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("p", &["a"])).expect("fact");
        kb.assert(stmt("s", &["a"])).expect("fact");

        kb.retract(stmt("p", &["a"])).expect("live");
        let p = kb.find_fact(&stmt("p", &["a"])).expect("still follows from s(a)");
        assert!(!p.support().is_asserted());
        assert!(kb.find_fact(&stmt("q", &["a"])).is_some());

        kb.retract(stmt("s", &["a"])).expect("live");
        assert_eq!(kb.fact_count(), 0);
    }

    #[test]
    fn test_rule_with_unbound_consequent_is_rejected() {
        let mut kb = KnowledgeBase::new();
        let result = kb.assert(Rule::new([stmt("p", &["?x"])], stmt("q", &["?x", "?z"])));
        assert!(matches!(result, Err(KbError::UnboundConsequent(_))));
        assert!(kb.is_empty());
    }

    #[test]
    fn test_self_derivation_adds_no_support() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("p", &["?x"])], stmt("p", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("p", &["a"])).expect("fact");

        let node = kb.find_fact(&stmt("p", &["a"])).expect("live");
        assert!(node.support().supported_by().is_empty());

        kb.retract(stmt("p", &["a"])).expect("live");
        assert_eq!(kb.fact_count(), 0);
    }

    #[test]
    fn test_check_hypothesis_restores_store() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new(
            [stmt("bomb", &["?c"]), stmt("safe", &["?c"])],
            stmt("violation", &["?c"]),
        ))
        .expect("valid rule");
        kb.assert(stmt("safe", &["c12"])).expect("fact");
        let facts_before = kb.fact_count();
        let rules_before = kb.rule_count();

        let answer = kb
            .check_hypothesis(stmt("bomb", &["c12"]), &stmt("violation", &["c12"]))
            .expect("search completes");
        assert_eq!(answer, vec![Bindings::new()]);
        assert_eq!(kb.fact_count(), facts_before);
        assert_eq!(kb.rule_count(), rules_before);

        let answer = kb
            .check_hypothesis(stmt("bomb", &["c13"]), &stmt("violation", &["c13"]))
            .expect("search completes");
        assert!(answer.is_empty());
    }

    #[test]
    fn test_explain_and_display() {
        let mut kb = KnowledgeBase::new();
        kb.assert(stmt("a", &["1"])).expect("fact");
        kb.assert(Rule::new([stmt("a", &["?x"])], stmt("c", &["?x"])))
            .expect("valid rule");

        let explanation = kb.explain(&stmt("c", &["1"])).expect("c(1) is live");
        assert_eq!(
            explanation.to_string(),
            "Support for (c 1)\n support option\n  Support for (a 1) (asserted)\n  \
             Support for ((a ?x)) -> (c ?x) (asserted)\n"
        );
        assert_eq!(explanation.asserted_facts(), vec![&stmt("a", &["1"])]);
        assert!(kb.explain(&stmt("c", &["2"])).is_none());

        assert_eq!(
            kb.to_string(),
            "Knowledge Base:\n(a 1)\n(c 1)\n((a ?x)) -> (c ?x)\n"
        );
    }

    #[test]
    fn test_explain_cuts_circular_support() {
        let mut kb = KnowledgeBase::new();
        kb.assert(Rule::new([stmt("p", &["?x"])], stmt("q", &["?x"])))
            .expect("valid rule");
        kb.assert(Rule::new([stmt("q", &["?x"])], stmt("p", &["?x"])))
            .expect("valid rule");
        kb.assert(stmt("p", &["a"])).expect("fact");

        // p(a) is now also derived from q(a), which is derived from p(a)
        let explanation = kb.explain(&stmt("p", &["a"])).expect("live");
        assert_eq!(explanation.options.len(), 1);
        let q = &explanation.options[0].fact;
        assert_eq!(q.claim, crate::explain::Claim::Fact(stmt("q", &["a"])));
        assert!(q.options[0].fact.circular);
    }
}
