//! # Microkb
//!
//! A small rule-based knowledge base with truth maintenance.
//!
//! ## Features
//!
//! - Forward chaining of every assertion to a fixed point
//! - Backward chaining proof search with termination guards
//! - Justification tracking, so retracting a premise removes exactly the
//!   beliefs that depended on it alone
//!
//! ## Example
//!
//! ```rust
//! use microkb::{KnowledgeBase, Rule, Statement, Term};
//!
//! let mut kb = KnowledgeBase::new();
//! kb.assert(Statement::from_symbols("motherof", &["ada", "bing"])).unwrap();
//! kb.assert(Statement::from_symbols("motherof", &["bing", "felix"])).unwrap();
//! kb.assert(Rule::new(
//!     [
//!         Statement::from_symbols("motherof", &["?x", "?y"]),
//!         Statement::from_symbols("motherof", &["?y", "?z"]),
//!     ],
//!     Statement::from_symbols("grandmotherof", &["?x", "?z"]),
//! ))
//! .unwrap();
//!
//! let query = Statement::from_symbols("grandmotherof", &["ada", "?X"]);
//! let answers = kb.ask(&query).unwrap();
//! assert_eq!(answers[0].get("X"), Some(&Term::constant("felix")));
//!
//! kb.retract(Statement::from_symbols("motherof", &["ada", "bing"])).unwrap();
//! assert!(kb.ask(&query).unwrap().is_empty());
//! ```

/// Variable bindings and instantiation.
pub mod bindings;
/// Store configuration.
pub mod config;
/// Error type.
pub mod error;
/// Justification trees.
pub mod explain;
/// Forward and backward chaining.
pub mod inference;
/// Knowledge base store.
pub mod store;
/// Terms, statements and rules.
pub mod term;
/// Statement matching.
pub mod unify;

/// Sharing one store between async tasks.
#[cfg(feature = "async")]
pub mod shared;

pub use bindings::{instantiate, Bindings};
pub use config::{ChainingMode, KbConfig};
pub use error::{KbError, Result};
pub use explain::{Claim, Explanation, SupportOption};
pub use inference::{InferenceEngine, Premise, Proof};
#[cfg(feature = "async")]
pub use shared::SharedKnowledgeBase;
pub use store::{
    FactId, FactNode, Item, Justification, KnowledgeBase, NodeId, RuleId, RuleNode, Support,
};
pub use term::{Rule, Statement, Term};
pub use unify::{match_statement, unify, unify_both, Exclusions};
