//! What to do with an answer that does not resolve the question in focus.

use std::fmt;

use crate::config::ClarificationStrategy;
use crate::question::{Answer, Question};

/// Outcome of consulting a [`ClarificationPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClarificationAction {
    /// Push a clarification question above the original.
    Clarify,
    /// Re-ask the original question without a clarification.
    Reprompt,
    /// Drop the answer and leave the state as it is.
    Ignore,
}

/// Details about the rejected answer handed to the policy.
#[derive(Debug, Clone, Copy)]
pub struct UnresolvedAnswer<'a> {
    pub question: &'a Question,
    pub answer: &'a Answer,
    /// Whether the answer at least has the shape the question expects.
    pub relevant: bool,
    /// Failed attempts already recorded for this question.
    pub attempts: i64,
}

/// Pluggable reaction to non-resolving answers.
pub trait ClarificationPolicy: fmt::Debug + Send + Sync {
    fn decide(&self, unresolved: &UnresolvedAnswer<'_>) -> ClarificationAction;
}

/// Clarify every non-resolving answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysClarify;

impl ClarificationPolicy for AlwaysClarify {
    fn decide(&self, _: &UnresolvedAnswer<'_>) -> ClarificationAction {
        ClarificationAction::Clarify
    }
}

/// Clarify answers of the right shape, re-ask the question for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepromptRelevant;

impl ClarificationPolicy for RepromptRelevant {
    fn decide(&self, unresolved: &UnresolvedAnswer<'_>) -> ClarificationAction {
        if unresolved.relevant {
            ClarificationAction::Clarify
        } else {
            ClarificationAction::Reprompt
        }
    }
}

/// The built-in policy for a configured strategy.
pub fn policy_for(strategy: ClarificationStrategy) -> Box<dyn ClarificationPolicy> {
    match strategy {
        ClarificationStrategy::AlwaysClarify => Box::new(AlwaysClarify),
        ClarificationStrategy::RepromptRelevant => Box::new(RepromptRelevant),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies() {
        let q = Question::yes_no("renewable");
        let a = Answer::new("purple");
        let unresolved = UnresolvedAnswer {
            question: &q,
            answer: &a,
            relevant: false,
            attempts: 0,
        };
        assert_eq!(
            policy_for(ClarificationStrategy::AlwaysClarify).decide(&unresolved),
            ClarificationAction::Clarify
        );
        assert_eq!(
            policy_for(ClarificationStrategy::RepromptRelevant).decide(&unresolved),
            ClarificationAction::Reprompt
        );
        let relevant = UnresolvedAnswer {
            relevant: true,
            ..unresolved
        };
        assert_eq!(RepromptRelevant.decide(&relevant), ClarificationAction::Clarify);
    }
}
