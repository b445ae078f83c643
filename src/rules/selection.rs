//! Selection rules: decide what the system says next.
//!
//! Questions are surfaced one at a time. Nothing is raised while QUD holds a
//! question, and a question is never raised ahead of its prerequisites.

use crate::error::DmeResult;
use crate::moves::{DialogueMove, MoveContent, MoveType, Speaker};
use crate::plan::{PlanAction, SubplanStatus};
use crate::question::Question;
use crate::state::InformationState;

use super::integration::is_bind;
use super::{Effect, Phase, Precondition, Rule, RuleContext, Transition};

/// Selection rules in evaluation order.
pub fn rules() -> Vec<Rule> {
    let rule = |name: &'static str, pre: Precondition, eff: Effect| {
        Rule::new(name, Phase::Selection, pre, eff)
    };
    vec![
        rule("raise-prerequisite", head_issue_blocked, raise_prerequisite),
        rule("raise-accommodated", head_issue_ready, raise_head_issue),
        rule("execute-plan-step", plan_step_executable, execute_plan_step),
        rule("select-from-agenda", agenda_nonempty, select_from_agenda),
        rule("report-plan-complete", plan_finished, report_completion),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn idle(ctx: &RuleContext<'_>) -> bool {
    ctx.turn.output.is_none()
}

fn question_for(ctx: &RuleContext<'_>, predicate: &str) -> Question {
    ctx.state
        .plan_question(predicate)
        .unwrap_or_else(|| ctx.domain.question_for(predicate))
}

/// Where the active plan declares a predicate; undeclared ones sort last.
fn plan_rank(state: &InformationState, predicate: &str) -> usize {
    state
        .active_plan()
        .and_then(|plan| {
            plan.subplans
                .iter()
                .position(|s| s.action.question().predicate_key() == predicate)
        })
        .unwrap_or(usize::MAX)
}

/// Uncommitted prerequisites of `question`, in plan declaration order with
/// ties broken by domain declaration order. Bind variables are only ever
/// volunteered, so an unfilled one does not hold anything back.
fn unmet_prerequisites(ctx: &RuleContext<'_>, question: &Question) -> Vec<String> {
    let mut unmet: Vec<(usize, usize, &str)> = ctx
        .domain
        .prerequisites(question)
        .into_iter()
        .enumerate()
        .filter(|(_, p)| !ctx.state.shared().is_committed(p))
        .filter(|(_, p)| !is_bind(ctx.state, &question_for(ctx, p)))
        .map(|(i, p)| (plan_rank(ctx.state, p), i, p))
        .collect();
    unmet.sort();
    unmet.into_iter().map(|(_, _, p)| p.to_string()).collect()
}

/// Follow unmet prerequisites down from `head` to one that can be raised now.
fn deepest_prerequisite(ctx: &RuleContext<'_>, head: &Question) -> Option<Question> {
    let mut visited = vec![head.predicate_key()];
    let mut current = unmet_prerequisites(ctx, head).into_iter().next()?;
    loop {
        visited.push(current.clone());
        let question = question_for(ctx, &current);
        match unmet_prerequisites(ctx, &question)
            .into_iter()
            .find(|p| !visited.contains(p))
        {
            Some(next) => current = next,
            None => return Some(question),
        }
    }
}

fn raise(state: &mut InformationState, question: Question) {
    state.drop_issue(&question);
    state.stage(DialogueMove::ask(question.clone(), Speaker::System));
    state.shared_mut().qud.push(question);
}

// ---------------------------------------------------------------------------
// raise-prerequisite
// ---------------------------------------------------------------------------

fn head_issue_blocked(ctx: &RuleContext<'_>) -> bool {
    idle(ctx)
        && ctx.state.shared().qud.is_empty()
        && ctx
            .state
            .private()
            .issues
            .first()
            .is_some_and(|head| !unmet_prerequisites(ctx, head).is_empty())
}

fn raise_prerequisite(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, turn) = ctx.begin();
    let prerequisite = ctx
        .state
        .private()
        .issues
        .first()
        .and_then(|head| deepest_prerequisite(ctx, head));
    if let Some(question) = prerequisite {
        tracing::debug!(%question, "dme: raising prerequisite first");
        raise(&mut state, question);
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// raise-accommodated
// ---------------------------------------------------------------------------

fn head_issue_ready(ctx: &RuleContext<'_>) -> bool {
    idle(ctx)
        && ctx.state.shared().qud.is_empty()
        && ctx
            .state
            .private()
            .issues
            .first()
            .is_some_and(|head| unmet_prerequisites(ctx, head).is_empty())
}

fn raise_head_issue(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, turn) = ctx.begin();
    if let Some(head) = ctx.state.private().issues.first().cloned() {
        raise(&mut state, head);
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// execute-plan-step
// ---------------------------------------------------------------------------

fn plan_step_executable(ctx: &RuleContext<'_>) -> bool {
    let private = ctx.state.private();
    idle(ctx)
        && ctx.state.shared().qud.is_empty()
        && private.issues.is_empty()
        && private.agenda.is_empty()
        && ctx
            .state
            .active_plan()
            .is_some_and(|p| p.next_executable().is_some())
}

fn execute_plan_step(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, turn) = ctx.begin();
    let Some((index, action)) = ctx
        .state
        .active_plan()
        .and_then(|p| p.next_executable().map(|i| (i, p.subplans[i].action.clone())))
    else {
        return Ok(Transition::new(state, turn));
    };

    if let PlanAction::Raise(question) = action {
        if !state.shared().is_committed(&question.predicate_key()) {
            if unmet_prerequisites(ctx, &question).is_empty() {
                raise(&mut state, question);
            } else {
                // Let the issue rules order it behind its prerequisites.
                state.accommodate(question);
            }
        }
    }
    if let Some(plan) = state.private_mut().plan.first_mut() {
        plan.subplans[index].status = SubplanStatus::Completed;
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// select-from-agenda
// ---------------------------------------------------------------------------

fn agenda_nonempty(ctx: &RuleContext<'_>) -> bool {
    idle(ctx) && !ctx.state.private().agenda.is_empty()
}

fn select_from_agenda(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    turn.output = state.private_mut().agenda.pop_front();
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// report-plan-complete
// ---------------------------------------------------------------------------

fn plan_finished(ctx: &RuleContext<'_>) -> bool {
    let private = ctx.state.private();
    idle(ctx)
        && private.agenda.is_empty()
        && private.issues.is_empty()
        && ctx.state.shared().qud.is_empty()
        && ctx.state.active_plan().is_some_and(|p| p.is_complete())
}

fn report_completion(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    if state.private().plan.is_empty() {
        return Ok(Transition::new(state, turn));
    }
    let plan = state.private_mut().plan.remove(0);
    let commitments: Vec<_> = state.shared().commitments.iter().cloned().collect();
    tracing::info!(
        plan_type = %plan.plan_type,
        commitments = commitments.len(),
        "dme: plan complete"
    );
    turn.output = Some(DialogueMove::new(
        MoveType::Assert,
        MoveContent::Completion {
            plan_type: plan.plan_type,
            commitments,
        },
        Speaker::System,
    ));
    Ok(Transition::new(state, turn))
}
