use crate::store::{KnowledgeBase, NodeId};
use crate::term::{Rule, Statement};
use std::fmt;

/// The fact or rule an [`Explanation`] is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// A fact
    Fact(Statement),
    /// A rule
    Rule(Rule),
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(statement) => write!(f, "{statement}"),
            Self::Rule(rule) => write!(f, "{rule}"),
        }
    }
}

/// Why the store believes a fact or rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    /// What is believed
    pub claim: Claim,
    /// Asserted directly by a caller
    pub asserted: bool,
    /// One entry per independent derivation
    pub options: Vec<SupportOption>,
    /// Already being explained further up; its options are not repeated
    pub circular: bool,
}

/// One derivation: the premise fact and premise rule, each explained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportOption {
    /// Explanation of the premise fact
    pub fact: Explanation,
    /// Explanation of the premise rule
    pub rule: Explanation,
}

impl Explanation {
    pub(crate) fn build(kb: &KnowledgeBase, node: NodeId) -> Option<Self> {
        let mut path = Vec::new();
        Self::build_node(kb, node, &mut path)
    }

    fn build_node(kb: &KnowledgeBase, node: NodeId, path: &mut Vec<NodeId>) -> Option<Self> {
        let claim = match node {
            NodeId::Fact(id) => Claim::Fact(kb.fact(id)?.statement().clone()),
            NodeId::Rule(id) => Claim::Rule(kb.rule(id)?.rule().clone()),
        };
        let support = kb.support(node)?;
        if path.contains(&node) {
            return Some(Self {
                claim,
                asserted: support.is_asserted(),
                options: Vec::new(),
                circular: true,
            });
        }

        path.push(node);
        let options = support
            .supported_by()
            .iter()
            .filter_map(|justification| {
                Some(SupportOption {
                    fact: Self::build_node(kb, NodeId::Fact(justification.fact), path)?,
                    rule: Self::build_node(kb, NodeId::Rule(justification.rule), path)?,
                })
            })
            .collect();
        path.pop();

        Some(Self {
            claim,
            asserted: support.is_asserted(),
            options,
            circular: false,
        })
    }

    /// Asserted facts this explanation ultimately rests on, without repeats
    #[must_use]
    pub fn asserted_facts(&self) -> Vec<&Statement> {
        let mut found = Vec::new();
        self.collect_asserted(&mut found);
        found
    }

    fn collect_asserted<'a>(&'a self, found: &mut Vec<&'a Statement>) {
        if let (Claim::Fact(statement), true) = (&self.claim, self.asserted) {
            if !found.contains(&statement) {
                found.push(statement);
            }
        }
        for option in &self.options {
            option.fact.collect_asserted(found);
            option.rule.collect_asserted(found);
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:indent$}Support for {}", "", self.claim)?;
        if self.asserted {
            f.write_str(" (asserted)")?;
        }
        if self.circular {
            f.write_str(" (circular)")?;
        }
        writeln!(f)?;
        for option in &self.options {
            writeln!(f, "{:width$}support option", "", width = indent + 1)?;
            option.fact.write_indented(f, indent + 2)?;
            option.rule.write_indented(f, indent + 2)?;
        }
        Ok(())
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
