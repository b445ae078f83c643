//! Task plans: ordered information-gathering subgoals.
//!
//! A `Plan` is produced once by a domain plan-builder and never
//! re-synthesized. Only the `status` of its subplans changes as questions
//! are answered (or reopened by belief revision).

use serde::{Deserialize, Serialize};

use crate::question::Question;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// Status of an individual subplan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubplanStatus {
    /// Not yet satisfied.
    Pending,
    /// Satisfied by a commitment (or, for `Raise`/`Bind`, executed).
    Completed,
}

/// What a subplan asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanAction {
    /// Find out the answer: the question is accommodated and raised.
    Findout(Question),
    /// Raise the question once without insisting on an answer.
    Raise(Question),
    /// Bind a variable if the user volunteers it; never asked.
    Bind(String),
}

impl PlanAction {
    /// The question this action is about. `Bind` maps to a Wh-question over
    /// the variable's predicate.
    pub fn question(&self) -> Question {
        match self {
            Self::Findout(q) | Self::Raise(q) => q.clone(),
            Self::Bind(variable) => Question::wh(variable.clone()),
        }
    }
}

/// A single step in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subplan {
    pub action: PlanAction,
    pub status: SubplanStatus,
}

impl Subplan {
    pub fn findout(question: Question) -> Self {
        Self::pending(PlanAction::Findout(question))
    }

    pub fn raise(question: Question) -> Self {
        Self::pending(PlanAction::Raise(question))
    }

    pub fn bind(variable: impl Into<String>) -> Self {
        Self::pending(PlanAction::Bind(variable.into()))
    }

    fn pending(action: PlanAction) -> Self {
        Self {
            action,
            status: SubplanStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SubplanStatus::Pending
    }

    /// Whether this subplan concerns the same predicate as `question`.
    pub fn concerns(&self, question: &Question) -> bool {
        self.action.question().predicate_key() == question.base().predicate_key()
    }
}

/// Step-N-of-M progress through a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// An ordered sequence of subgoals for completing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_type: String,
    pub subplans: Vec<Subplan>,
}

impl Plan {
    pub fn new(plan_type: impl Into<String>, subplans: Vec<Subplan>) -> Self {
        Self {
            plan_type: plan_type.into(),
            subplans,
        }
    }

    /// Questions of pending `Findout` subplans, in declaration order.
    pub fn pending_findouts(&self) -> impl Iterator<Item = &Question> {
        self.subplans.iter().filter_map(|s| match (&s.action, s.status) {
            (PlanAction::Findout(q), SubplanStatus::Pending) => Some(q),
            _ => None,
        })
    }

    /// The first pending `Raise` or `Bind` subplan.
    pub fn next_executable(&self) -> Option<usize> {
        self.subplans.iter().position(|s| {
            s.is_pending() && matches!(s.action, PlanAction::Raise(_) | PlanAction::Bind(_))
        })
    }

    /// Questions of pending `Bind` subplans.
    pub fn pending_binds(&self) -> impl Iterator<Item = Question> + '_ {
        self.subplans.iter().filter_map(|s| match (&s.action, s.status) {
            (PlanAction::Bind(_), SubplanStatus::Pending) => Some(s.action.question()),
            _ => None,
        })
    }

    /// Mark the subplan concerning `question` as completed.
    /// Returns whether a subplan was found.
    pub fn complete(&mut self, question: &Question) -> bool {
        self.set_status(question, SubplanStatus::Completed)
    }

    /// Put the subplan concerning `question` back to pending.
    pub fn reopen(&mut self, question: &Question) -> bool {
        self.set_status(question, SubplanStatus::Pending)
    }

    fn set_status(&mut self, question: &Question, status: SubplanStatus) -> bool {
        match self.subplans.iter_mut().find(|s| s.concerns(question)) {
            Some(step) => {
                step.status = status;
                true
            }
            None => false,
        }
    }

    /// Declaration index of the subplan concerning `question`.
    pub fn position_of(&self, question: &Question) -> Option<usize> {
        self.subplans.iter().position(|s| s.concerns(question))
    }

    /// The question the plan declares for a predicate key.
    pub fn question_for(&self, predicate: &str) -> Option<Question> {
        self.subplans
            .iter()
            .map(|s| s.action.question())
            .find(|q| q.predicate_key() == predicate)
    }

    /// Whether every subplan has completed.
    pub fn is_complete(&self) -> bool {
        self.subplans.iter().all(|s| !s.is_pending())
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.subplans.iter().filter(|s| !s.is_pending()).count(),
            total: self.subplans.len(),
        }
    }
}
