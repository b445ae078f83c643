//! Interpretation rules: read an incoming move against the current state.
//!
//! The NLU collaborator classifies utterances without looking at the
//! dialogue. These rules add what only the dialogue context can supply.

use crate::error::DmeResult;
use crate::moves::{MoveContent, Speaker};

use super::{Phase, Rule, RuleContext, Transition};

/// Interpretation rules in evaluation order.
pub fn rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "bind-elliptical-answer",
            Phase::Interpretation,
            unbound_answer_with_focus,
            bind_to_focus,
        ),
        Rule::new(
            "classify-task",
            Phase::Interpretation,
            classifiable_request,
            classify_request,
        ),
    ]
}

// ---------------------------------------------------------------------------
// bind-elliptical-answer
// ---------------------------------------------------------------------------

/// A bare answer ("3 years") while a question is in focus.
fn unbound_answer_with_focus(ctx: &RuleContext<'_>) -> bool {
    ctx.state.qud_top().is_some()
        && ctx
            .turn
            .user_answer()
            .is_some_and(|a| a.question_ref.is_none())
}

fn bind_to_focus(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let (state, mut turn) = ctx.begin();
    let top = state.qud_top().cloned();
    if let Some(MoveContent::Answer(answer)) = turn.pending.as_mut().map(|m| &mut m.content) {
        answer.question_ref = top;
    }
    Ok(Transition::new(state, turn))
}

// ---------------------------------------------------------------------------
// classify-task
// ---------------------------------------------------------------------------

fn request_text<'a>(ctx: &RuleContext<'a>) -> Option<&'a str> {
    let mv = ctx.turn.pending.as_ref()?;
    if mv.speaker != Speaker::User || !mv.move_type.is_task_request() {
        return None;
    }
    match &mv.content {
        MoveContent::Text(text) => Some(text),
        _ => None,
    }
}

fn classifiable_request(ctx: &RuleContext<'_>) -> bool {
    request_text(ctx).is_some_and(|t| ctx.domain.classify_task(t).is_some())
}

fn classify_request(ctx: &RuleContext<'_>) -> DmeResult<Transition> {
    let task = request_text(ctx).and_then(|t| ctx.domain.classify_task(t));
    let (state, mut turn) = ctx.begin();
    if let (Some(task), Some(mv)) = (task, turn.pending.as_mut()) {
        tracing::debug!(%task, "dme: classified request");
        mv.content = MoveContent::Task(task);
    }
    Ok(Transition::new(state, turn))
}
