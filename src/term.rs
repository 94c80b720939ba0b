use indexmap::IndexSet;
use smallvec::SmallVec;
use std::fmt;

/// Leading marker that distinguishes variable symbols from constants.
pub const VARIABLE_MARKER: char = '?';

/// A term in a statement
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Term {
    /// A variable that can be bound to another term (e.g., `?x`)
    Variable(String),
    /// An opaque constant symbol (e.g., `ada`, `c34`)
    Constant(String),
}

impl Term {
    /// Creates a variable term; `name` is given without the `?` marker.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Creates a constant term.
    pub fn constant(name: impl Into<String>) -> Self {
        Self::Constant(name.into())
    }

    /// Turns an already-tokenised symbol into a term: `?x` is a variable,
    /// anything else is a constant.
    #[must_use]
    pub fn parse_symbol(symbol: &str) -> Self {
        match symbol.strip_prefix(VARIABLE_MARKER) {
            Some(name) => Self::var(name),
            None => Self::constant(symbol),
        }
    }

    /// Returns true for variables.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "{VARIABLE_MARKER}{name}"),
            Self::Constant(name) => f.write_str(name),
        }
    }
}

/// Argument list of a statement. Most predicates are small.
pub type Terms = SmallVec<[Term; 3]>;

/// A predicate applied to an ordered list of terms (e.g., `(motherof ada ?x)`)
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statement {
    /// The predicate symbol (e.g., `"motherof"`)
    pub predicate: String,
    /// The arguments, in order
    pub terms: Terms,
}

impl Statement {
    /// Creates a statement from a predicate and its terms.
    pub fn new(predicate: impl Into<String>, terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            predicate: predicate.into(),
            terms: terms.into_iter().collect(),
        }
    }

    /// Creates a statement from tokenised symbols, see [`Term::parse_symbol`].
    ///
    /// ```rust
    /// use microkb::{Statement, Term};
    ///
    /// let stmt = Statement::from_symbols("motherof", &["ada", "?x"]);
    /// assert_eq!(stmt.terms[1], Term::var("x"));
    /// assert_eq!(stmt.to_string(), "(motherof ada ?x)");
    /// ```
    pub fn from_symbols(predicate: impl Into<String>, symbols: &[&str]) -> Self {
        Self::new(predicate, symbols.iter().map(|s| Term::parse_symbol(s)))
    }

    /// Number of arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// True when no argument is a variable.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        !self.terms.iter().any(Term::is_variable)
    }

    /// Names of the variables occurring in this statement, in order of
    /// appearance (repeats included).
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|term| match term {
            Term::Variable(name) => Some(name.as_str()),
            Term::Constant(_) => None,
        })
    }

    /// Appends `suffix` to every variable name.
    #[must_use]
    pub fn rename_variables(&self, suffix: &str) -> Self {
        Self {
            predicate: self.predicate.clone(),
            terms: self
                .terms
                .iter()
                .map(|term| match term {
                    Term::Variable(name) => Term::Variable(format!("{name}{suffix}")),
                    Term::Constant(_) => term.clone(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for term in &self.terms {
            write!(f, " {term}")?;
        }
        f.write_str(")")
    }
}

/// A rule (e.g., `((motherof ?x ?y) (motherof ?y ?z)) -> (grandmotherof ?x ?z)`)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rule {
    /// The antecedents, all of which must hold
    pub lhs: Vec<Statement>,
    /// The consequent
    pub rhs: Statement,
}

impl Rule {
    /// Creates a rule from its antecedents and consequent.
    pub fn new(lhs: impl IntoIterator<Item = Statement>, rhs: Statement) -> Self {
        Self {
            lhs: lhs.into_iter().collect(),
            rhs,
        }
    }

    /// Names of all variables in the rule, antecedents first.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.lhs
            .iter()
            .chain(std::iter::once(&self.rhs))
            .flat_map(Statement::variables)
    }

    /// True if every variable of the consequent appears in some antecedent,
    /// so a complete match of the antecedents grounds it as far as the
    /// matched facts are ground.
    #[must_use]
    pub fn is_range_restricted(&self) -> bool {
        let bound: IndexSet<&str> = self.lhs.iter().flat_map(Statement::variables).collect();
        self.rhs.variables().all(|var| bound.contains(var))
    }

    /// Renames every variable of the rule apart by appending `suffix`.
    #[must_use]
    pub fn rename_apart(&self, suffix: &str) -> Self {
        Self {
            lhs: self
                .lhs
                .iter()
                .map(|stmt| stmt.rename_variables(suffix))
                .collect(),
            rhs: self.rhs.rename_variables(suffix),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, stmt) in self.lhs.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{stmt}")?;
        }
        write!(f, ") -> {}", self.rhs)
    }
}
