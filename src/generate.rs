//! The NLG boundary: what a generator sees, and a template realizer.
//!
//! A [`GenerationContext`] carries the selected move plus the slice of the
//! information state a plan-aware generator needs. It serializes to JSON so
//! an LLM-backed generator can put it straight into a prompt.

use serde::Serialize;

use crate::domain::Domain;
use crate::error::SessionError;
use crate::moves::{DialogueMove, MoveContent, MoveType};
use crate::plan::Progress;
use crate::question::{Question, Value};
use crate::rules::integration::{CLARIFICATION_ANSWER, CLARIFICATION_ATTEMPTS, REVISION_PREFIX};
use crate::state::InformationState;

// ── Collaborator trait ───────────────────────────────────────────────────

/// Realizes a selected move as text.
///
/// Implementations backed by remote services own their retries and
/// timeouts; an `Err` here ends the turn.
pub trait Generator {
    fn generate(&mut self, ctx: &GenerationContext) -> Result<String, SessionError>;
}

// ── Context ──────────────────────────────────────────────────────────────

/// The question a move is about, as a generator needs to phrase it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionInfo {
    pub question: Question,
    pub predicate: String,
    pub description: String,
    /// Closed set of acceptable answers; empty for free input.
    pub allowed_values: Vec<String>,
}

/// The answer that was just rejected for the question in focus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClarificationNote {
    pub rejected: Value,
    pub attempts: i64,
}

/// A value the user offered in place of a committed one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionNote {
    pub predicate: String,
    pub description: String,
    pub value: Value,
}

/// Everything handed to a [`Generator`] for one move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationContext {
    #[serde(rename = "move")]
    pub dialogue_move: DialogueMove,
    pub plan_type: Option<String>,
    pub progress: Option<Progress>,
    pub question: Option<QuestionInfo>,
    pub clarification: Option<ClarificationNote>,
    pub revisions: Vec<RevisionNote>,
}

impl GenerationContext {
    pub fn build(domain: &Domain, state: &InformationState, mv: &DialogueMove) -> Self {
        let plan = state.active_plan();
        let question = match &mv.content {
            MoveContent::Question(q) => Some(q),
            MoveContent::Answer(a) => a.question_ref.as_ref(),
            _ => None,
        }
        .map(|q| question_info(domain, q));

        let beliefs = &state.private().beliefs;
        let clarification = match (mv.move_type, beliefs.get(CLARIFICATION_ANSWER)) {
            (MoveType::Ask, Some(rejected)) => Some(ClarificationNote {
                rejected: rejected.clone(),
                attempts: match beliefs.get(CLARIFICATION_ATTEMPTS) {
                    Some(Value::Number(n)) => *n,
                    _ => 1,
                },
            }),
            _ => None,
        };

        let revisions = beliefs
            .iter()
            .filter_map(|(key, value)| {
                let predicate = key.strip_prefix(REVISION_PREFIX)?;
                Some(RevisionNote {
                    predicate: predicate.to_string(),
                    description: domain.describe(&Question::wh(predicate)),
                    value: value.clone(),
                })
            })
            .collect();

        Self {
            dialogue_move: mv.clone(),
            plan_type: plan.map(|p| p.plan_type.clone()),
            progress: plan.map(|p| p.progress()),
            question,
            clarification,
            revisions,
        }
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string_pretty(self).map_err(|e| SessionError::Generator {
            message: format!("failed to serialize generation context: {e}"),
        })
    }
}

fn question_info(domain: &Domain, question: &Question) -> QuestionInfo {
    let base = question.base();
    let predicate = base.predicate_key();
    let allowed_values = match base {
        Question::Wh { predicate, .. } => domain
            .sort_of(predicate)
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
        Question::YesNo { .. } => vec!["yes".into(), "no".into()],
        Question::Alternatives { alternatives } => alternatives.clone(),
        Question::Clarification { .. } => Vec::new(),
    };
    QuestionInfo {
        question: question.clone(),
        description: domain.describe(base),
        predicate,
        allowed_values,
    }
}

// ── Template generator ───────────────────────────────────────────────────

/// Fixed English templates. Useful for tests and as a fallback when no
/// model-backed generator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl Generator for TemplateGenerator {
    fn generate(&mut self, ctx: &GenerationContext) -> Result<String, SessionError> {
        Ok(realize(ctx))
    }
}

/// Realize a move with the built-in templates.
pub fn realize(ctx: &GenerationContext) -> String {
    let mv = &ctx.dialogue_move;
    match (&mv.move_type, &mv.content) {
        (MoveType::Greet, _) => "Hello! What would you like to do?".into(),
        (MoveType::Quit, _) => "Goodbye.".into(),
        (MoveType::Ask, MoveContent::Question(_)) => realize_ask(ctx),
        (_, MoveContent::Answer(a)) => match &ctx.question {
            Some(info) => format!("{} is {}.", capitalize(&info.description), a.content),
            None => a.content.to_string(),
        },
        (_, MoveContent::Completion { plan_type, commitments }) => {
            let facts: Vec<_> = commitments
                .iter()
                .map(|p| format!("{}: {}", p.predicate.replace('_', " "), p.value))
                .collect();
            format!(
                "All set for {}. {}.",
                plan_type.replace('_', " "),
                facts.join("; ")
            )
        }
        (MoveType::Assert, MoveContent::Question(_)) => match &ctx.question {
            Some(info) => format!("I don't know {} yet.", info.description),
            None => "I don't know that yet.".into(),
        },
        (_, MoveContent::Text(t)) => t.clone(),
        _ => mv.to_string(),
    }
}

fn realize_ask(ctx: &GenerationContext) -> String {
    let Some(info) = &ctx.question else {
        return ctx.dialogue_move.to_string();
    };
    let mut out = String::new();
    if let Some(p) = ctx.progress {
        out.push_str(&format!("[{}/{}] ", (p.completed + 1).min(p.total), p.total));
    }
    for rev in &ctx.revisions {
        out.push_str(&format!("Noted: {} may now be {}. ", rev.description, rev.value));
    }
    if let Some(note) = &ctx.clarification {
        out.push_str(&format!(
            "Sorry, \"{}\" doesn't work as {}. ",
            note.rejected, info.description
        ));
    }
    match info.question.base() {
        Question::YesNo { .. } => {
            out.push_str(&format!("Should {} hold? (yes/no)", info.description));
        }
        Question::Alternatives { alternatives } => {
            out.push_str(&format!("Which would you like: {}?", alternatives.join(" or ")));
        }
        _ => {
            out.push_str(&format!("Please tell me {}.", info.description));
            if !info.allowed_values.is_empty() {
                out.push_str(&format!(" Options: {}.", info.allowed_values.join(", ")));
            }
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Speaker;
    use crate::plan::{Plan, Subplan};
    use crate::question::{Answer, Proposition};

    fn nda() -> Domain {
        Domain::bundled("nda").unwrap()
    }

    fn state_with_plan() -> InformationState {
        let mut state = InformationState::new();
        state.private_mut().plan.push(Plan::new(
            "draft_nda",
            vec![
                Subplan::findout(Question::wh("parties")),
                Subplan::findout(Question::wh("governing_law")),
            ],
        ));
        state
    }

    #[test]
    fn ask_with_progress_and_options() {
        let domain = nda();
        let mut state = state_with_plan();
        state.complete_subplan(&Question::wh("parties"));
        let mv = DialogueMove::ask(Question::wh("governing_law"), Speaker::System);
        let ctx = GenerationContext::build(&domain, &state, &mv);

        assert_eq!(ctx.plan_type.as_deref(), Some("draft_nda"));
        assert_eq!(ctx.progress, Some(Progress { completed: 1, total: 2 }));
        let info = ctx.question.as_ref().unwrap();
        assert_eq!(info.allowed_values.len(), 8);

        let text = realize(&ctx);
        assert!(text.starts_with("[2/2] Please tell me the state whose law governs"));
        assert!(text.contains("Options: California"));
    }

    #[test]
    fn clarification_mentions_rejected_answer() {
        let domain = nda();
        let mut state = state_with_plan();
        state.set_belief(CLARIFICATION_ANSWER, "blue");
        state.set_belief(CLARIFICATION_ATTEMPTS, Value::Number(1));
        let mv = DialogueMove::ask(Question::wh("parties").clarify(), Speaker::System);
        let ctx = GenerationContext::build(&domain, &state, &mv);
        assert_eq!(
            ctx.clarification,
            Some(ClarificationNote {
                rejected: Value::from("blue"),
                attempts: 1
            })
        );
        let text = realize(&ctx);
        assert!(text.contains("\"blue\" doesn't work as the parties to the agreement"));
    }

    #[test]
    fn revision_notes_are_collected() {
        let domain = nda();
        let mut state = state_with_plan();
        state.set_belief("revision.effective_date", "February 1, 2025");
        let mv = DialogueMove::ask(Question::wh("effective_date"), Speaker::System);
        let ctx = GenerationContext::build(&domain, &state, &mv);
        assert_eq!(ctx.revisions.len(), 1);
        assert_eq!(ctx.revisions[0].description, "the effective date");
        assert!(realize(&ctx).contains("Noted: the effective date may now be February 1, 2025."));
    }

    #[test]
    fn answers_completion_and_unknown() {
        let domain = nda();
        let state = InformationState::new();

        let answer = DialogueMove::answer(Answer::to(Question::wh("duration"), "3 years"), Speaker::System);
        let text = realize(&GenerationContext::build(&domain, &state, &answer));
        assert_eq!(text, "How long the confidentiality obligations last is 3 years.");

        let unknown = DialogueMove::new(
            MoveType::Assert,
            MoveContent::Question(Question::wh("duration")),
            Speaker::System,
        );
        let text = realize(&GenerationContext::build(&domain, &state, &unknown));
        assert_eq!(text, "I don't know how long the confidentiality obligations last yet.");

        let done = DialogueMove::new(
            MoveType::Assert,
            MoveContent::Completion {
                plan_type: "draft_nda".into(),
                commitments: vec![Proposition::new("nda_type", "mutual")],
            },
            Speaker::System,
        );
        let text = realize(&GenerationContext::build(&domain, &state, &done));
        assert_eq!(text, "All set for draft nda. nda type: mutual.");
    }

    #[test]
    fn context_serializes_to_json() {
        let domain = nda();
        let mv = DialogueMove::ask(Question::wh("nda_type"), Speaker::System);
        let ctx = GenerationContext::build(&domain, &state_with_plan(), &mv);
        let json: serde_json::Value = serde_json::from_str(&ctx.to_json().unwrap()).unwrap();
        assert_eq!(json["plan_type"], "draft_nda");
        assert_eq!(json["move"]["move_type"], "ask");
        assert_eq!(json["question"]["allowed_values"][0], "mutual");
    }
}
