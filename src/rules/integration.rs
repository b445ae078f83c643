//! Integration rules: absorb one move into the information state.
//!
//! The pending move lives in [`Turn::pending`]. Every rule that fully
//! handles the move consumes it, so the phase always settles. Belief
//! revision leaves the move pending on purpose: the answer is still
//! integrated afterwards, against the revised state.

use crate::domain::PlanContext;
use crate::error::DmeResult;
use crate::moves::{DialogueMove, MoveContent, MoveType, Speaker};
use crate::plan::PlanAction;
use crate::question::{Answer, Proposition, Question, Value};
use crate::state::{DialogueState, InformationState};

use super::policy::{ClarificationAction, UnresolvedAnswer};
use super::{Effect, Phase, Precondition, Rule, RuleContext, Transition, Turn};

/// Belief key holding the last rejected answer.
pub const CLARIFICATION_ANSWER: &str = "clarification.answer";
/// Belief key counting rejected answers for the question in focus.
pub const CLARIFICATION_ATTEMPTS: &str = "clarification.attempts";
/// Prefix for the replacement value offered by a revision.
pub const REVISION_PREFIX: &str = "revision.";

/// Integration rules in evaluation order.
pub fn rules() -> Vec<Rule> {
    let rule = |name: &'static str, pre: Precondition, eff: Effect| {
        Rule::new(name, Phase::Integration, pre, eff)
    };
    vec![
        rule("integrate-quit", pending_quit, end_dialogue),
        rule("form-task-plan", task_request_without_plan, form_plan),
        rule("accommodate-plan-issues", plan_has_unaccommodated, accommodate_plan),
        rule("clarify-unresolved-answer", answer_unresolved, clarify_answer),
        rule("retract-incompatible-commitment", answer_revises_commitment, retract_commitment),
        rule("cascade-dependent-retraction", dependents_are_stale, cascade_retraction),
        rule("integrate-answer", pending_user_answer, integrate_answer),
        rule("integrate-greet", pending_user_greet, greet_back),
        rule("integrate-user-question", pending_user_question, answer_user_question),
        rule("integrate-own-move", own_ask_not_on_qud, push_own_question),
        rule("ignore-unhandled-move", anything_pending, consume),
    ]
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn pending<'a>(ctx: &RuleContext<'a>) -> Option<&'a DialogueMove> {
    ctx.turn.pending.as_ref()
}

fn pending_from(ctx: &RuleContext<'_>, speaker: Speaker, move_type: MoveType) -> bool {
    pending(ctx).is_some_and(|m| m.speaker == speaker && m.move_type == move_type)
}

/// The question for a predicate: as the plan declares it, else the domain default.
fn question_for(ctx: &RuleContext<'_>, predicate: &str) -> Question {
    ctx.state
        .plan_question(predicate)
        .unwrap_or_else(|| ctx.domain.question_for(predicate))
}

pub(super) fn is_bind(state: &InformationState, question: &Question) -> bool {
    state.active_plan().is_some_and(|plan| {
        plan.subplans
            .iter()
            .any(|s| matches!(s.action, PlanAction::Bind(_)) && s.concerns(question))
    })
}

/// Pending `Bind` questions that nothing has filled yet.
fn open_binds(state: &InformationState) -> Vec<Question> {
    state
        .active_plan()
        .map(|plan| {
            plan.pending_binds()
                .filter(|q| !state.shared().is_committed(&q.predicate_key()))
                .collect()
        })
        .unwrap_or_default()
}

/// Issues still open for volunteered answers this turn.
fn open_issues<'a>(state: &'a InformationState, turn: &'a Turn) -> impl Iterator<Item = &'a Question> {
    state
        .private()
        .issues
        .iter()
        .filter(|q| !turn.is_revised(&q.predicate_key()))
}

/// Committed predicates the answer offers an incompatible value for.
fn revision_candidates(ctx: &RuleContext<'_>, answer: &Answer) -> Vec<(String, Value, Value)> {
    ctx.state
        .shared()
        .commitments
        .iter()
        .filter(|p| !ctx.turn.is_revised(&p.predicate))
        .filter_map(|p| {
            let question = question_for(ctx, &p.predicate);
            let new = ctx.domain.resolve_value(answer, &question)?;
            ctx.domain
                .incompatible(&p.predicate, &p.value, &new)
                .then(|| (p.predicate.clone(), p.value.clone(), new))
        })
        .collect()
}

/// Commit `value` as the answer to `question` and close everything about it.
fn commit(state: &mut InformationState, question: &Question, value: Value) {
    let predicate = question.predicate_key();
    state.clear_belief(&format!("{REVISION_PREFIX}{predicate}"));
    state.shared_mut().commit(Proposition::new(predicate, value));
    state.drop_issue(question);
    state.withdraw(question);
    state.complete_subplan(question);
}

/// Put a retracted question back into play.
fn reaccommodate(state: &mut InformationState, question: Question) {
    state.withdraw(&question);
    state.reopen_subplan(&question);
    if !is_bind(state, &question) {
        state.accommodate(question);
    }
}

fn clear_clarification(state: &mut InformationState) {
    state.clear_belief(CLARIFICATION_ANSWER);
    state.clear_belief(CLARIFICATION_ATTEMPTS);
}

fn anything_pending(ctx: &RuleContext<'_>) -> bool {
    ctx.turn.pending.is_some()
}

fn consume(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (state, mut turn) = ctx.begin();
    if let Some(mv) = turn.pending.take() {
        tracing::debug!(%mv, "dme: move left unhandled");
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// integrate-quit
// ---------------------------------------------------------------------------

fn pending_quit(ctx: &RuleContext<'_>) -> bool {
    pending(ctx).is_some_and(|m| m.move_type == MoveType::Quit)
}

fn end_dialogue(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    let by = turn.pending.take().map(|m| m.speaker);
    state.control_mut().dialogue_state = DialogueState::Done;
    tracing::info!(by = ?by, "dme: dialogue finished");
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// form-task-plan
// ---------------------------------------------------------------------------

fn task_request_without_plan(ctx: &RuleContext<'_>) -> bool {
    ctx.state.active_plan().is_none()
        && pending(ctx).is_some_and(|m| m.speaker == Speaker::User && m.move_type.is_task_request())
}

fn form_plan(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    let plan_ctx = match turn.pending.take().map(|m| m.content) {
        Some(MoveContent::Task(task)) => PlanContext {
            task,
            utterance: None,
        },
        // Unclassified text: the builder lookup names what could not be found.
        Some(MoveContent::Text(text)) => PlanContext {
            task: text.trim().to_lowercase(),
            utterance: Some(text),
        },
        _ => PlanContext {
            task: String::new(),
            utterance: None,
        },
    };
    let plan = ctx.domain.build_plan(&plan_ctx)?;
    tracing::info!(
        task = %plan_ctx.task,
        plan_type = %plan.plan_type,
        steps = plan.subplans.len(),
        "dme: formed plan"
    );
    state.private_mut().plan.push(plan);
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// accommodate-plan-issues
// ---------------------------------------------------------------------------

fn unaccommodated(state: &InformationState) -> Vec<Question> {
    let Some(plan) = state.active_plan() else {
        return Vec::new();
    };
    plan.pending_findouts()
        .filter(|q| {
            !state.in_issues(q)
                && !state.on_qud(q)
                && !state.shared().is_committed(&q.predicate_key())
        })
        .cloned()
        .collect()
}

/// Pending findouts a new plan shares with facts already agreed on.
fn already_committed(state: &InformationState) -> Vec<Question> {
    let Some(plan) = state.active_plan() else {
        return Vec::new();
    };
    plan.pending_findouts()
        .filter(|q| state.shared().is_committed(&q.predicate_key()))
        .cloned()
        .collect()
}

fn plan_has_unaccommodated(ctx: &RuleContext<'_>) -> bool {
    !unaccommodated(ctx.state).is_empty() || !already_committed(ctx.state).is_empty()
}

fn accommodate_plan(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, turn) = ctx.begin();
    for question in already_committed(ctx.state) {
        tracing::debug!(%question, "dme: plan step already settled");
        state.complete_subplan(&question);
    }
    for question in unaccommodated(ctx.state) {
        state.accommodate(question);
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// clarify-unresolved-answer
// ---------------------------------------------------------------------------

fn answer_unresolved(ctx: &RuleContext<'_>) -> bool {
    let (Some(answer), Some(top)) = (ctx.turn.user_answer(), ctx.state.qud_top()) else {
        return false;
    };
    ctx.turn.revised.is_empty()
        && !ctx.domain.resolves(answer, top)
        && !open_issues(ctx.state, ctx.turn).any(|q| ctx.domain.resolves(answer, q))
        && !open_binds(ctx.state).iter().any(|q| ctx.domain.resolves(answer, q))
        && revision_candidates(ctx, answer).is_empty()
}

fn clarify_answer(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    let (Some(answer), Some(top)) = (ctx.turn.user_answer(), ctx.state.qud_top()) else {
        return Ok(Transition::new(state, turn));
    };
    let attempts = match ctx.state.private().beliefs.get(CLARIFICATION_ATTEMPTS) {
        Some(Value::Number(n)) => *n,
        _ => 0,
    };
    let action = ctx.policy.decide(&UnresolvedAnswer {
        question: top.base(),
        answer,
        relevant: ctx.domain.relevant(answer, top),
        attempts,
    });
    tracing::debug!(question = %top, answer = %answer.content, ?action, "dme: answer did not resolve question");

    let reask = match action {
        ClarificationAction::Clarify => {
            let clarification = top.clarify();
            // A second failure re-asks the clarification already in focus.
            if !top.is_clarification() {
                state.shared_mut().qud.push(clarification.clone());
            }
            Some(clarification)
        }
        ClarificationAction::Reprompt => Some(top.clone()),
        ClarificationAction::Ignore => None,
    };
    if let Some(question) = reask {
        state.stage(DialogueMove::ask(question, Speaker::System));
        state.set_belief(CLARIFICATION_ANSWER, answer.content.clone());
        state.set_belief(CLARIFICATION_ATTEMPTS, Value::Number(attempts + 1));
    }
    turn.pending = None;
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// retract-incompatible-commitment
// ---------------------------------------------------------------------------

fn answer_revises_commitment(ctx: &RuleContext<'_>) -> bool {
    ctx.turn
        .user_answer()
        .is_some_and(|a| !revision_candidates(ctx, a).is_empty())
}

fn retract_commitment(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    let Some((predicate, old, new)) = ctx
        .turn
        .user_answer()
        .and_then(|a| revision_candidates(ctx, a).into_iter().next())
    else {
        return Ok(Transition::new(state, turn));
    };

    let question = question_for(ctx, &predicate);
    state.shared_mut().retract(&predicate);
    reaccommodate(&mut state, question);
    state.set_belief(format!("{REVISION_PREFIX}{predicate}"), new.clone());
    tracing::info!(%predicate, %old, %new, "dme: retracted commitment");

    turn.retracted.push(predicate.clone());
    turn.revised.push(predicate);
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// cascade-dependent-retraction
// ---------------------------------------------------------------------------

/// Dependents of this turn's retractions that are still committed or raised.
fn stale_dependents(ctx: &RuleContext<'_>) -> Vec<String> {
    let mut stale: Vec<String> = Vec::new();
    for retracted in &ctx.turn.retracted {
        for dependent in ctx.domain.dependents(retracted) {
            let raised = ctx.state.on_qud(&question_for(ctx, dependent));
            let committed = ctx.state.shared().is_committed(dependent);
            if (raised || committed) && !stale.iter().any(|s| s == dependent) {
                stale.push(dependent.to_string());
            }
        }
    }
    stale
}

fn dependents_are_stale(ctx: &RuleContext<'_>) -> bool {
    !stale_dependents(ctx).is_empty()
}

fn cascade_retraction(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    for predicate in stale_dependents(ctx) {
        let question = question_for(ctx, &predicate);
        if state.on_qud(&question) {
            clear_clarification(&mut state);
        }
        let old = state.shared_mut().retract(&predicate);
        reaccommodate(&mut state, question);
        tracing::info!(
            %predicate,
            old = ?old.map(|p| p.value),
            "dme: re-accommodated dependent question"
        );
        turn.retracted.push(predicate);
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// integrate-answer
// ---------------------------------------------------------------------------

fn pending_user_answer(ctx: &RuleContext<'_>) -> bool {
    ctx.turn.user_answer().is_some()
}

fn integrate_answer(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    let Some(answer) = ctx.turn.user_answer() else {
        return Ok(Transition::new(state, turn));
    };

    // Each value fragment is claimed once: the question in focus first, then
    // accommodated issues and open binds in order.
    let top = ctx.state.qud_top().cloned();
    let top_value = top
        .as_ref()
        .and_then(|q| ctx.domain.resolve_value(answer, q));
    let mut claimed: Vec<Value> = top_value.iter().cloned().collect();
    let mut volunteered: Vec<(Question, Value)> = Vec::new();

    let candidates: Vec<Question> = open_issues(ctx.state, ctx.turn)
        .cloned()
        .chain(open_binds(ctx.state))
        .collect();
    for question in candidates {
        if let Some(value) = ctx.domain.resolve_value(answer, &question) {
            if !claimed.contains(&value) {
                claimed.push(value.clone());
                volunteered.push((question, value));
            }
        }
    }

    let matched_issue = !volunteered.is_empty();
    for (question, value) in volunteered {
        tracing::debug!(%question, %value, "dme: volunteered answer");
        commit(&mut state, &question, value);
    }

    match (top, top_value) {
        (Some(top), Some(value)) => {
            // Pops the clarification and the original together.
            commit(&mut state, top.base(), value);
            clear_clarification(&mut state);
        }
        (Some(top), None) if matched_issue || !ctx.turn.revised.is_empty() => {
            state.stage(DialogueMove::ask(top, Speaker::System));
        }
        _ => {}
    }

    turn.pending = None;
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// integrate-greet
// ---------------------------------------------------------------------------

fn pending_user_greet(ctx: &RuleContext<'_>) -> bool {
    pending_from(ctx, Speaker::User, MoveType::Greet)
}

fn greet_back(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    state.stage(DialogueMove::greet(Speaker::System));
    turn.pending = None;
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// integrate-user-question
// ---------------------------------------------------------------------------

fn pending_user_question(ctx: &RuleContext<'_>) -> bool {
    pending_from(ctx, Speaker::User, MoveType::Ask)
        && pending(ctx).and_then(DialogueMove::as_question).is_some()
}

fn answer_user_question(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    if let Some(question) = turn.pending.take().as_ref().and_then(DialogueMove::as_question) {
        let question = question.base().clone();
        let reply = match state.shared().committed(&question.predicate_key()) {
            Some(p) => DialogueMove::answer(Answer::to(question, p.value.clone()), Speaker::System),
            // Nothing committed yet: report that the value is unknown.
            None => DialogueMove::new(
                MoveType::Assert,
                MoveContent::Question(question),
                Speaker::System,
            ),
        };
        state.stage(reply);
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// integrate-own-move
// ---------------------------------------------------------------------------

fn own_ask_not_on_qud(ctx: &RuleContext<'_>) -> bool {
    pending_from(ctx, Speaker::System, MoveType::Ask)
        && pending(ctx)
            .and_then(DialogueMove::as_question)
            .is_some_and(|q| !ctx.state.on_qud(q))
}

fn push_own_question(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (mut state, mut turn) = ctx.begin();
    if let Some(question) = turn.pending.take().and_then(|m| match m.content {
        MoveContent::Question(q) => Some(q),
        _ => None,
    }) {
        state.drop_issue(&question);
        state.shared_mut().qud.push(question);
    }
    Ok(Transition::new(state, turn))
}
