//! Update rules and the rule set bound to a domain.
//!
//! Rules are plain data: a name, a phase, a rank, and two function
//! pointers. Each phase declares its rules in one ordered list; the rank of
//! a rule in that list is its priority and lower ranks are tried first.
//! The [`engine::RuleEngine`] applies the first applicable rule, re-checks
//! every precondition, and repeats until the phase settles.

pub mod engine;
pub mod integration;
pub mod interpretation;
pub mod policy;
pub mod selection;

use std::fmt;

use crate::config::DmeConfig;
use crate::domain::Domain;
use crate::error::DmeResult;
use crate::invariants;
use crate::moves::{DialogueMove, Speaker};
use crate::question::Answer;
use crate::state::InformationState;

use self::engine::{PhaseOutcome, RuleEngine};
use self::policy::{AlwaysClarify, ClarificationPolicy};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The update phase a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Contextual reading of an incoming move (ellipsis, task classification).
    Interpretation,
    /// Absorbing a move into the information state.
    Integration,
    /// Choosing the next system move.
    Selection,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interpretation => write!(f, "interpretation"),
            Self::Integration => write!(f, "integration"),
            Self::Selection => write!(f, "selection"),
        }
    }
}

// ---------------------------------------------------------------------------
// Turn context
// ---------------------------------------------------------------------------

/// Per-cycle context threaded alongside the information state.
///
/// Nothing here outlives one `integrate` or `select` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    /// The move being integrated. Rules clear it once it is fully handled.
    pub pending: Option<DialogueMove>,
    /// Predicates whose commitments were retracted during this cycle.
    pub retracted: Vec<String>,
    /// Predicates retracted because the pending answer offered a new value.
    pub revised: Vec<String>,
    /// The move chosen by the selection phase.
    pub output: Option<DialogueMove>,
}

impl Turn {
    pub fn with_pending(mv: DialogueMove) -> Self {
        Self {
            pending: Some(mv),
            ..Self::default()
        }
    }

    /// The pending move's answer, if the user is answering.
    pub fn user_answer(&self) -> Option<&Answer> {
        self.pending
            .as_ref()
            .filter(|m| m.speaker == Speaker::User)
            .and_then(DialogueMove::as_answer)
    }

    pub fn is_revised(&self, predicate: &str) -> bool {
        self.revised.iter().any(|p| p == predicate)
    }
}

/// Everything a rule may look at.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub domain: &'a Domain,
    pub policy: &'a dyn ClarificationPolicy,
    pub state: &'a InformationState,
    pub turn: &'a Turn,
}

impl RuleContext<'_> {
    /// Owned copies to build a transition from. State partitions stay
    /// shared until a rule writes to them.
    pub fn begin(&self) -> (InformationState, Turn) {
        (self.state.clone(), self.turn.clone())
    }
}

/// Result of applying one rule effect.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: InformationState,
    pub turn: Turn,
}

impl Transition {
    pub fn new(state: InformationState, turn: Turn) -> Self {
        Self { state, turn }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

pub type Precondition = fn(&RuleContext<'_>) -> bool;
pub type Effect = fn(&RuleContext<'_>) -> DmeResult<Transition>;

/// A named update rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub phase: Phase,
    /// Rank within the phase list; lower is tried first.
    pub priority: usize,
    pub precondition: Precondition,
    pub effect: Effect,
}

impl Rule {
    pub fn new(name: &'static str, phase: Phase, precondition: Precondition, effect: Effect) -> Self {
        Self {
            name,
            phase,
            priority: 0,
            precondition,
            effect,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Assign ranks in list order.
fn ranked(mut rules: Vec<Rule>) -> Vec<Rule> {
    for (rank, rule) in rules.iter_mut().enumerate() {
        rule.priority = rank;
    }
    rules
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// The complete, ordered rule registration bound to one domain.
pub struct RuleSet {
    domain: Domain,
    policy: Box<dyn ClarificationPolicy>,
    interpretation: Vec<Rule>,
    integration: Vec<Rule>,
    selection: Vec<Rule>,
    engine: RuleEngine,
    check_invariants: bool,
}

/// Build the rule set for `domain` with default limits and the
/// always-clarify policy.
pub fn register_rules(domain: Domain) -> RuleSet {
    let defaults = DmeConfig::default();
    RuleSet {
        domain,
        policy: Box::new(AlwaysClarify),
        interpretation: ranked(interpretation::rules()),
        integration: ranked(integration::rules()),
        selection: ranked(selection::rules()),
        engine: RuleEngine::new(defaults.max_rule_steps),
        check_invariants: defaults.check_invariants,
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("domain", &self.domain.name())
            .field("policy", &self.policy)
            .field("interpretation", &self.interpretation.len())
            .field("integration", &self.integration.len())
            .field("selection", &self.selection.len())
            .finish()
    }
}

impl RuleSet {
    pub fn with_policy(mut self, policy: Box<dyn ClarificationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Apply step limits and invariant checking from `config`.
    pub fn configured(mut self, config: &DmeConfig) -> Self {
        self.engine = RuleEngine::new(config.max_rule_steps);
        self.check_invariants = config.check_invariants;
        self
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn policy(&self) -> &dyn ClarificationPolicy {
        self.policy.as_ref()
    }

    /// Rules of one phase in evaluation order.
    pub fn rules(&self, phase: Phase) -> &[Rule] {
        match phase {
            Phase::Interpretation => &self.interpretation,
            Phase::Integration => &self.integration,
            Phase::Selection => &self.selection,
        }
    }

    /// Run one phase to its fixpoint.
    pub fn apply(&self, phase: Phase, state: InformationState, turn: Turn) -> DmeResult<PhaseOutcome> {
        self.engine.run(
            phase,
            self.rules(phase),
            &self.domain,
            self.policy(),
            state,
            turn,
        )
    }

    /// Interpret `mv` in context and integrate it. `state` is left untouched.
    pub fn integrate(&self, state: &InformationState, mv: DialogueMove) -> DmeResult<InformationState> {
        let mut next = state.clone();
        let control = next.control_mut();
        control.speaker = mv.speaker;
        control.next_speaker = mv.speaker.other();

        let interpreted = self.apply(Phase::Interpretation, next, Turn::with_pending(mv))?;
        let integrated = self.apply(Phase::Integration, interpreted.state, interpreted.turn)?;
        self.verify(&integrated.state)?;
        Ok(integrated.state)
    }

    /// Choose the next system move, if any. `state` is left untouched.
    pub fn select(&self, state: &InformationState) -> DmeResult<(InformationState, Option<DialogueMove>)> {
        if state.is_done() {
            return Ok((state.clone(), None));
        }
        let outcome = self.apply(Phase::Selection, state.clone(), Turn::default())?;
        self.verify(&outcome.state)?;
        Ok((outcome.state, outcome.turn.output))
    }

    fn verify(&self, state: &InformationState) -> DmeResult<()> {
        if !self.check_invariants {
            return Ok(());
        }
        invariants::check(state, &self.domain).map_err(|e| {
            tracing::warn!(error = %e, "dme: invariant violated");
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_list_order() {
        let domain = Domain::builder("empty").build().unwrap();
        let set = register_rules(domain);
        for phase in [Phase::Interpretation, Phase::Integration, Phase::Selection] {
            let rules = set.rules(phase);
            assert!(!rules.is_empty());
            for (i, rule) in rules.iter().enumerate() {
                assert_eq!(rule.priority, i);
                assert_eq!(rule.phase, phase, "{} registered in wrong phase", rule.name);
            }
        }
        let names: Vec<_> = set.rules(Phase::Integration).iter().map(|r| r.name).collect();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("form-task-plan") < pos("accommodate-plan-issues"));
        assert!(pos("clarify-unresolved-answer") < pos("retract-incompatible-commitment"));
        assert!(pos("cascade-dependent-retraction") < pos("integrate-answer"));

        let names: Vec<_> = set.rules(Phase::Selection).iter().map(|r| r.name).collect();
        assert_eq!(names[0], "raise-prerequisite");
        assert_eq!(names[1], "raise-accommodated");
        assert_eq!(names.last(), Some(&"report-plan-complete"));
    }

    #[test]
    fn turn_user_answer_ignores_system_moves() {
        let turn = Turn::with_pending(DialogueMove::answer(Answer::new("x"), Speaker::System));
        assert!(turn.user_answer().is_none());
        let turn = Turn::with_pending(DialogueMove::user_answer("x"));
        assert!(turn.user_answer().is_some());
    }
}
