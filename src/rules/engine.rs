//! First-applicable rule engine.
//!
//! One evaluation step applies exactly one rule: the first, in rank order,
//! whose precondition holds. A phase runs steps until no rule applies, or,
//! for selection, until a move has been chosen.

use crate::domain::Domain;
use crate::error::{DmeResult, RuleError};
use crate::state::InformationState;

use super::policy::ClarificationPolicy;
use super::{Phase, Rule, RuleContext, Transition, Turn};

/// What a phase run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub state: InformationState,
    pub turn: Turn,
    /// Names of the rules applied, in order.
    pub fired: Vec<&'static str>,
}

/// Applies rules of a phase to a fixpoint.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine {
    max_steps: usize,
}

impl RuleEngine {
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// The first rule whose precondition holds.
    pub fn first_applicable<'r>(&self, rules: &'r [Rule], ctx: &RuleContext<'_>) -> Option<&'r Rule> {
        rules.iter().find(|r| (r.precondition)(ctx))
    }

    /// Apply a single rule. `Ok(None)` means no rule applies.
    pub fn step(&self, rules: &[Rule], ctx: &RuleContext<'_>) -> DmeResult<Option<(&'static str, Transition)>> {
        self.first_applicable(rules, ctx)
            .map(|rule| apply(rule, ctx).map(|t| (rule.name, t)))
            .transpose()
    }

    /// Run `phase` until it settles.
    pub fn run(
        &self,
        phase: Phase,
        rules: &[Rule],
        domain: &Domain,
        policy: &dyn ClarificationPolicy,
        state: InformationState,
        turn: Turn,
    ) -> DmeResult<PhaseOutcome> {
        let mut state = state;
        let mut turn = turn;
        let mut fired = Vec::new();

        loop {
            if phase == Phase::Selection && turn.output.is_some() {
                break;
            }
            let ctx = RuleContext {
                domain,
                policy,
                state: &state,
                turn: &turn,
            };
            let Some(rule) = self.first_applicable(rules, &ctx) else {
                break;
            };
            if fired.len() >= self.max_steps {
                return Err(RuleError::NoFixpoint {
                    phase: phase.to_string(),
                    steps: fired.len(),
                }
                .into());
            }
            let next = apply(rule, &ctx)?;
            tracing::debug!(rule = rule.name, %phase, step = fired.len(), "dme: applied rule");
            fired.push(rule.name);
            state = next.state;
            turn = next.turn;
        }

        Ok(PhaseOutcome { state, turn, fired })
    }
}

fn apply(rule: &Rule, ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    (rule.effect)(ctx).map_err(|e| {
        RuleError::EffectFailed {
            rule: rule.name.to_string(),
            source: Box::new(e),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{DmeError, DomainError};
    use crate::question::Value;
    use crate::rules::policy::AlwaysClarify;

    fn domain() -> Domain {
        Domain::builder("t").build().unwrap()
    }

    fn below_three(ctx: &RuleContext<'_>) -> bool {
        ctx.state.private().beliefs.len() < 3
    }

    fn add_belief(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
        let (mut state, turn) = ctx.begin();
        let n = state.private().beliefs.len();
        state.set_belief(format!("b{n}"), Value::Number(n as i64));
        Ok(Transition::new(state, turn))
    }

    fn always(_: &RuleContext<'_>) -> bool {
        true
    }

    fn never(_: &RuleContext<'_>) -> bool {
        false
    }

    fn fail(_: &RuleContext<'_>) -> DmeResult<Transition> {
        Err(DomainError::UnknownTask { task: "x".into() }.into())
    }

    fn unchanged(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
        let (state, turn) = ctx.begin();
        Ok(Transition::new(state, turn))
    }

    fn run(rules: &[Rule], max_steps: usize) -> DmeResult<PhaseOutcome> {
        RuleEngine::new(max_steps).run(
            Phase::Integration,
            rules,
            &domain(),
            &AlwaysClarify,
            InformationState::new(),
            Turn::default(),
        )
    }

    #[test]
    fn runs_to_fixpoint_one_rule_per_step() {
        let rules = [
            Rule::new("never", Phase::Integration, never, fail),
            Rule::new("add", Phase::Integration, below_three, add_belief),
        ];
        let out = run(&rules, 10).unwrap();
        assert_eq!(out.fired, vec!["add", "add", "add"]);
        assert_eq!(out.state.private().beliefs.len(), 3);
    }

    #[test]
    fn no_applicable_rule_is_a_noop() {
        let rules = [Rule::new("never", Phase::Integration, never, fail)];
        let out = run(&rules, 10).unwrap();
        assert!(out.fired.is_empty());
        assert_eq!(out.state, InformationState::new());
    }

    #[test]
    fn first_applicable_wins() {
        let rules = [
            Rule::new("first", Phase::Integration, below_three, add_belief),
            Rule::new("second", Phase::Integration, always, fail),
        ];
        let engine = RuleEngine::new(10);
        let d = domain();
        let state = InformationState::new();
        let turn = Turn::default();
        let ctx = RuleContext {
            domain: &d,
            policy: &AlwaysClarify,
            state: &state,
            turn: &turn,
        };
        assert_eq!(engine.first_applicable(&rules, &ctx).map(|r| r.name), Some("first"));
    }

    #[test]
    fn effect_failure_names_the_rule() {
        let rules = [Rule::new("boom", Phase::Integration, always, fail)];
        let err = run(&rules, 10).unwrap_err();
        match err {
            DmeError::Rule(RuleError::EffectFailed { rule, source }) => {
                assert_eq!(rule, "boom");
                assert!(matches!(*source, DmeError::Domain(DomainError::UnknownTask { .. })));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn step_cap_stops_before_the_next_effect() {
        static APPLIED: AtomicUsize = AtomicUsize::new(0);

        fn counted(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
            APPLIED.fetch_add(1, Ordering::SeqCst);
            unchanged(ctx)
        }

        let rules = [Rule::new("counted", Phase::Integration, always, counted)];
        let err = run(&rules, 4).unwrap_err();
        assert!(matches!(
            err,
            DmeError::Rule(RuleError::NoFixpoint { steps: 4, .. })
        ));
        assert_eq!(APPLIED.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn endless_phase_is_reported() {
        let rules = [Rule::new("spin", Phase::Integration, always, unchanged)];
        let err = run(&rules, 5).unwrap_err();
        assert!(matches!(
            err,
            DmeError::Rule(RuleError::NoFixpoint { steps: 5, .. })
        ));
    }
}
