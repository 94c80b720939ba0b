use crate::term::{Rule, Statement, Term};
use indexmap::IndexMap;
use std::fmt;

/// Variable bindings produced by a successful match
///
/// Absence of a match is `None` at the call sites; an empty `Bindings` is a
/// match that needed no substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bindings {
    bindings: IndexMap<String, Term>,
}

impl Bindings {
    /// Creates an empty binding set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `var` (name without the `?` marker) to `term`, replacing any
    /// previous value.
    pub fn bind(&mut self, var: impl Into<String>, term: Term) {
        self.bindings.insert(var.into(), term);
    }

    /// Returns the term bound to `var`
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// Returns true if `var` is bound
    #[must_use]
    pub fn contains(&self, var: &str) -> bool {
        self.bindings.contains_key(var)
    }

    /// Number of bound variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates bindings in the order they were made
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(var, term)| (var.as_str(), term))
    }

    /// The terms variables are bound to
    pub fn values(&self) -> impl Iterator<Item = &Term> {
        self.bindings.values()
    }

    /// Extends `self` with `other`.
    ///
    /// Existing bindings are kept; when one of them points at a variable
    /// that `other` binds, it is resolved through `other`. Bindings of
    /// `other` for variables `self` leaves free are added.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        let mut composed: IndexMap<String, Term> = self
            .bindings
            .iter()
            .map(|(var, term)| (var.clone(), other.apply(term)))
            .collect();
        for (var, term) in &other.bindings {
            composed
                .entry(var.clone())
                .or_insert_with(|| term.clone());
        }
        Self { bindings: composed }
    }

    /// Substitutes a single term
    #[must_use]
    pub fn apply(&self, term: &Term) -> Term {
        match term {
            Term::Variable(var) => self.bindings.get(var).unwrap_or(term).clone(),
            Term::Constant(_) => term.clone(),
        }
    }

    /// Replaces every bound variable in `statement`; unbound variables pass
    /// through unchanged.
    #[must_use]
    pub fn instantiate(&self, statement: &Statement) -> Statement {
        Statement {
            predicate: statement.predicate.clone(),
            terms: statement.terms.iter().map(|term| self.apply(term)).collect(),
        }
    }

    /// Instantiates every antecedent and the consequent of `rule`
    #[must_use]
    pub fn instantiate_rule(&self, rule: &Rule) -> Rule {
        Rule {
            lhs: rule.lhs.iter().map(|stmt| self.instantiate(stmt)).collect(),
            rhs: self.instantiate(&rule.rhs),
        }
    }
}

/// Free-function form of [`Bindings::instantiate`]
#[must_use]
pub fn instantiate(statement: &Statement, bindings: &Bindings) -> Statement {
    bindings.instantiate(statement)
}

impl FromIterator<(String, Term)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, Term)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (var, term)) in self.bindings.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "?{var} : {term}")?;
        }
        Ok(())
    }
}
