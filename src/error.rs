use crate::term::{Rule, Statement};
use thiserror::Error;

/// Errors reported by the knowledge base
#[derive(Debug, Error)]
pub enum KbError {
    /// Retraction named a statement with no live fact in the store
    #[error("fact not found: {0}")]
    FactNotFound(Statement),

    /// Rules can only disappear through a retraction cascade
    #[error("rules cannot be retracted directly: {0}")]
    RuleNotRetractable(Rule),

    /// A rule needs at least one antecedent
    #[error("rule concluding {0} has no antecedents")]
    EmptyAntecedents(Statement),

    /// The consequent uses a variable that no antecedent can bind
    #[error("rule {0} concludes a variable its antecedents never bind")]
    UnboundConsequent(Rule),

    /// Backward search hit the depth limit and found no proof
    #[error("search exhausted at depth {depth} while proving {goal}")]
    SearchExhausted {
        /// The query being answered
        goal: Statement,
        /// The depth limit that cut the search
        depth: usize,
    },

    /// Configuration could not be deserialized
    #[cfg(feature = "serde")]
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T, E = KbError> = std::result::Result<T, E>;
