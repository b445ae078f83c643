//! The information state threaded through the update loop.
//!
//! Partitions sit behind `Arc` and are copied on write with
//! `Arc::make_mut`: cloning a state is two reference-count bumps, and a
//! rule that only touches `shared` leaves `private` physically shared with
//! the state it came from. No update ever mutates a state another holder
//! can observe.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::moves::{DialogueMove, Speaker};
use crate::plan::Plan;
use crate::question::{Proposition, Question, Value};

// ── Partitions ───────────────────────────────────────────────────────────

/// Information only the system holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateState {
    /// Active plans; at most one in practice.
    pub plan: Vec<Plan>,
    /// Moves staged for the next system turn.
    pub agenda: VecDeque<DialogueMove>,
    /// Accommodated questions not yet raised, in raising order.
    pub issues: Vec<Question>,
    /// Scratch notes for generation-time phrasing.
    pub beliefs: BTreeMap<String, Value>,
}

/// Information both parties are taken to share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    /// Questions under discussion; the last element is the top.
    pub qud: Vec<Question>,
    /// Grounded propositions.
    pub commitments: BTreeSet<Proposition>,
}

impl SharedState {
    /// The question currently in focus.
    pub fn qud_top(&self) -> Option<&Question> {
        self.qud.last()
    }

    /// The committed value for `predicate`, if any.
    pub fn committed(&self, predicate: &str) -> Option<&Proposition> {
        self.commitments.iter().find(|p| p.predicate == predicate)
    }

    pub fn is_committed(&self, predicate: &str) -> bool {
        self.committed(predicate).is_some()
    }

    /// Commit a proposition, replacing any value held for the same predicate.
    pub fn commit(&mut self, prop: Proposition) {
        self.retract(&prop.predicate);
        self.commitments.insert(prop);
    }

    /// Remove every commitment for `predicate`, returning what was removed.
    pub fn retract(&mut self, predicate: &str) -> Option<Proposition> {
        let old = self.committed(predicate).cloned();
        self.commitments.retain(|p| p.predicate != predicate);
        old
    }
}

/// Whether the dialogue is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    Active,
    Done,
}

/// Turn-taking bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub speaker: Speaker,
    pub next_speaker: Speaker,
    pub dialogue_state: DialogueState,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            speaker: Speaker::User,
            next_speaker: Speaker::System,
            dialogue_state: DialogueState::Active,
        }
    }
}

// ── InformationState ─────────────────────────────────────────────────────

/// The complete dialogue state for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationState {
    private: Arc<PrivateState>,
    shared: Arc<SharedState>,
    control: ControlState,
}

impl InformationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn private(&self) -> &PrivateState {
        &self.private
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn control(&self) -> &ControlState {
        &self.control
    }

    /// Copy-on-write access to the private partition.
    pub fn private_mut(&mut self) -> &mut PrivateState {
        Arc::make_mut(&mut self.private)
    }

    /// Copy-on-write access to the shared partition.
    pub fn shared_mut(&mut self) -> &mut SharedState {
        Arc::make_mut(&mut self.shared)
    }

    pub fn control_mut(&mut self) -> &mut ControlState {
        &mut self.control
    }

    /// Whether two states share the same private partition allocation.
    pub fn shares_private_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.private, &other.private)
    }

    /// Whether two states share the same shared partition allocation.
    pub fn shares_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ── Convenience reads ────────────────────────────────────────────────

    pub fn qud_top(&self) -> Option<&Question> {
        self.shared.qud_top()
    }

    pub fn active_plan(&self) -> Option<&Plan> {
        self.private.plan.first()
    }

    pub fn is_done(&self) -> bool {
        self.control.dialogue_state == DialogueState::Done
    }

    /// Whether `question` (or the question it clarifies) is under discussion.
    pub fn on_qud(&self, question: &Question) -> bool {
        self.shared.qud.iter().any(|q| q.base() == question.base())
    }

    pub fn in_issues(&self, question: &Question) -> bool {
        self.private.issues.iter().any(|q| q.base() == question.base())
    }

    /// The question the active plan declares for `predicate`.
    pub fn plan_question(&self, predicate: &str) -> Option<Question> {
        self.active_plan().and_then(|p| p.question_for(predicate))
    }

    // ── Convenience writes ───────────────────────────────────────────────

    /// Insert a question into `issues` at its plan declaration position
    /// (questions the plan does not know go last). No-op if already present.
    pub fn accommodate(&mut self, question: Question) {
        if self.in_issues(&question) {
            return;
        }
        let rank = |q: &Question, plan: Option<&Plan>| {
            plan.and_then(|p| p.position_of(q)).unwrap_or(usize::MAX)
        };
        let plan = self.private.plan.first().cloned();
        let new_rank = rank(&question, plan.as_ref());
        let issues = &mut self.private_mut().issues;
        let at = issues
            .iter()
            .position(|q| rank(q, plan.as_ref()) > new_rank)
            .unwrap_or(issues.len());
        issues.insert(at, question);
    }

    /// Remove a question (matched by base) from `issues`.
    pub fn drop_issue(&mut self, question: &Question) -> bool {
        if !self.in_issues(question) {
            return false;
        }
        self.private_mut()
            .issues
            .retain(|q| q.base() != question.base());
        true
    }

    /// Take `question` (and any clarification of it) off QUD and drop staged
    /// asks about it.
    pub fn withdraw(&mut self, question: &Question) {
        let base = question.base().clone();
        if self.on_qud(&base) {
            self.shared_mut().qud.retain(|q| q.base() != &base);
        }
        let staged = |m: &DialogueMove| m.as_question().is_some_and(|q| q.base() == &base);
        if self.private.agenda.iter().any(staged) {
            self.private_mut().agenda.retain(|m| !staged(m));
        }
    }

    /// Mark the subplan concerning `question` completed in every active plan.
    pub fn complete_subplan(&mut self, question: &Question) {
        if self.private.plan.iter().any(|p| p.position_of(question).is_some()) {
            for plan in &mut self.private_mut().plan {
                plan.complete(question);
            }
        }
    }

    /// Put the subplan concerning `question` back to pending.
    pub fn reopen_subplan(&mut self, question: &Question) {
        if self.private.plan.iter().any(|p| p.position_of(question).is_some()) {
            for plan in &mut self.private_mut().plan {
                plan.reopen(question);
            }
        }
    }

    /// Stage a move for the next system turn unless it is already staged.
    pub fn stage(&mut self, mv: DialogueMove) {
        if !self.private.agenda.contains(&mv) {
            self.private_mut().agenda.push_back(mv);
        }
    }

    pub fn set_belief(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.private_mut().beliefs.insert(key.into(), value.into());
    }

    pub fn clear_belief(&mut self, key: &str) {
        if self.private.beliefs.contains_key(key) {
            self.private_mut().beliefs.remove(key);
        }
    }
}
