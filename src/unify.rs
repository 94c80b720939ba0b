use crate::bindings::Bindings;
use crate::term::{Statement, Term};
use indexmap::IndexSet;

/// Terms a variable may not be newly bound to during a match.
pub type Exclusions = IndexSet<Term>;

/// Matches `pattern` against `candidate`, extending `bindings`.
///
/// Only variables of `pattern` are bound. A variable already bound must
/// agree with the candidate term at its position; a free variable is bound
/// to the candidate term unless that term is in `excluded`. Constants must
/// be identical. Returns `None` on any mismatch; `bindings` is never
/// modified.
#[must_use]
pub fn unify(
    pattern: &Statement,
    candidate: &Statement,
    bindings: &Bindings,
    excluded: &Exclusions,
) -> Option<Bindings> {
    if pattern.predicate != candidate.predicate || pattern.arity() != candidate.arity() {
        return None;
    }

    let mut new_bindings = bindings.clone();

    pattern
        .terms
        .iter()
        .zip(&candidate.terms)
        .try_for_each(|(term, value)| match term {
            Term::Constant(_) => (term == value).then_some(()).ok_or(()),
            Term::Variable(var) => {
                if let Some(bound) = new_bindings.get(var) {
                    (bound == value).then_some(()).ok_or(())
                } else if excluded.contains(value) {
                    Err(())
                } else {
                    new_bindings.bind(var.clone(), value.clone());
                    Ok(())
                }
            }
        })
        .ok()?;

    Some(new_bindings)
}

/// [`unify`] with no prior bindings and no exclusions.
#[must_use]
pub fn match_statement(pattern: &Statement, candidate: &Statement) -> Option<Bindings> {
    unify(pattern, candidate, &Bindings::new(), &Exclusions::new())
}

/// Two-way unification of statements whose variables are disjoint.
///
/// Variables on either side may be bound; the returned bindings are fully
/// resolved, so instantiating either statement with them yields the same
/// common instance.
#[must_use]
pub fn unify_both(left: &Statement, right: &Statement) -> Option<Bindings> {
    if left.predicate != right.predicate || left.arity() != right.arity() {
        return None;
    }

    let mut bindings = Bindings::new();
    for (left_term, right_term) in left.terms.iter().zip(&right.terms) {
        let left_term = resolve(&bindings, left_term);
        let right_term = resolve(&bindings, right_term);
        if left_term == right_term {
            continue;
        }
        match (left_term, right_term) {
            (Term::Variable(var), term) | (term, Term::Variable(var)) => bindings.bind(var, term),
            _ => return None,
        }
    }

    Some(
        bindings
            .iter()
            .map(|(var, term)| (var.to_string(), resolve(&bindings, term)))
            .collect(),
    )
}

/// Follows variable-to-variable chains until a free variable or a constant.
fn resolve(bindings: &Bindings, term: &Term) -> Term {
    let mut current = term.clone();
    while let Term::Variable(var) = &current {
        match bindings.get(var) {
            Some(next) => current = next.clone(),
            None => break,
        }
    }
    current
}
