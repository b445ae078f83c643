//! Structural checks over an [`InformationState`].
//!
//! Run by the engine after every `integrate` and `select` when
//! `DmeConfig::check_invariants` is set. A violation always indicates a rule
//! or domain bug, never a user error.

use std::collections::BTreeMap;

use crate::domain::Domain;
use crate::error::InvariantError;
use crate::state::InformationState;

/// Check every invariant, returning the first violation.
pub fn check(state: &InformationState, domain: &Domain) -> Result<(), InvariantError> {
    check_no_duplicates(state)?;
    check_qud_depth(state)?;
    check_unique_commitments(state)?;
    check_dependencies(state, domain)
}

/// A question lives in at most one of issues, QUD, or the commitments.
pub fn check_no_duplicates(state: &InformationState) -> Result<(), InvariantError> {
    let shared = state.shared();
    let issues = &state.private().issues;

    for (i, q) in issues.iter().enumerate() {
        let repeated = issues[..i].iter().any(|p| p.base() == q.base());
        if repeated || state.on_qud(q) || shared.is_committed(&q.predicate_key()) {
            return Err(InvariantError::DuplicateQuestion {
                question: q.to_string(),
            });
        }
    }
    for q in &shared.qud {
        if shared.is_committed(&q.predicate_key()) {
            return Err(InvariantError::DuplicateQuestion {
                question: q.to_string(),
            });
        }
    }
    Ok(())
}

/// QUD holds at most an original question plus its clarification.
pub fn check_qud_depth(state: &InformationState) -> Result<(), InvariantError> {
    let qud = &state.shared().qud;
    match qud.as_slice() {
        [] | [_] => Ok(()),
        [original, top] if top.is_clarification() && top.base() == original => Ok(()),
        _ => Err(InvariantError::QudDepth { depth: qud.len() }),
    }
}

/// No predicate carries two committed values.
pub fn check_unique_commitments(state: &InformationState) -> Result<(), InvariantError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &state.shared().commitments {
        *counts.entry(p.predicate.as_str()).or_default() += 1;
    }
    match counts.into_iter().find(|(_, n)| *n > 1) {
        Some((predicate, count)) => Err(InvariantError::ConflictingCommitments {
            predicate: predicate.to_string(),
            count,
        }),
        None => Ok(()),
    }
}

/// Nothing is under discussion before its prerequisites are committed.
pub fn check_dependencies(state: &InformationState, domain: &Domain) -> Result<(), InvariantError> {
    for q in state.shared().qud.iter().filter(|q| !q.is_clarification()) {
        if let Some(missing) = domain
            .prerequisites(q)
            .into_iter()
            .find(|p| !state.shared().is_committed(p))
        {
            return Err(InvariantError::UnmetDependency {
                question: q.to_string(),
                prerequisite: missing.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PredicateDef;
    use crate::question::{Proposition, Question};

    fn domain() -> Domain {
        Domain::builder("t")
            .predicate("start", PredicateDef::new(1, ["text"], ""))
            .predicate("length", PredicateDef::new(1, ["text"], ""))
            .depends("length", "start")
            .build()
            .unwrap()
    }

    #[test]
    fn empty_state_is_valid() {
        assert!(check(&InformationState::new(), &domain()).is_ok());
    }

    #[test]
    fn duplicate_between_issues_and_qud() {
        let mut s = InformationState::new();
        s.private_mut().issues.push(Question::wh("start"));
        s.shared_mut().qud.push(Question::wh("start"));
        assert!(matches!(
            check_no_duplicates(&s),
            Err(InvariantError::DuplicateQuestion { .. })
        ));
    }

    #[test]
    fn resolved_question_left_in_issues() {
        let mut s = InformationState::new();
        s.private_mut().issues.push(Question::wh("start"));
        s.shared_mut().commit(Proposition::new("start", "monday"));
        assert!(check_no_duplicates(&s).is_err());
    }

    #[test]
    fn qud_depth_allows_only_clarification() {
        let mut s = InformationState::new();
        let q = Question::wh("start");
        s.shared_mut().qud.extend([q.clone(), q.clarify()]);
        assert!(check_qud_depth(&s).is_ok());

        s.shared_mut().qud = vec![q.clone(), Question::wh("length")];
        assert!(matches!(
            check_qud_depth(&s),
            Err(InvariantError::QudDepth { depth: 2 })
        ));

        s.shared_mut().qud = vec![q.clone(), q.clarify(), q.clarify()];
        assert!(check_qud_depth(&s).is_err());
    }

    #[test]
    fn conflicting_commitments() {
        let mut s = InformationState::new();
        // Bypass `commit` to construct the broken state directly.
        s.shared_mut()
            .commitments
            .extend([Proposition::new("start", "a"), Proposition::new("start", "b")]);
        assert!(matches!(
            check_unique_commitments(&s),
            Err(InvariantError::ConflictingCommitments { count: 2, .. })
        ));
    }

    #[test]
    fn dependent_on_qud_without_prerequisite() {
        let d = domain();
        let mut s = InformationState::new();
        s.shared_mut().qud.push(Question::wh("length"));
        assert!(matches!(
            check_dependencies(&s, &d),
            Err(InvariantError::UnmetDependency { prerequisite, .. }) if prerequisite == "start"
        ));

        s.shared_mut().commit(Proposition::new("start", "monday"));
        assert!(check(&s, &d).is_ok());
    }
}
