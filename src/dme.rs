//! The dialogue move engine: interpret, integrate, select, generate.
//!
//! The engine owns its rule registrations and configuration, never a
//! dialogue state. Every call takes a state by reference and hands back a
//! new one, so any number of sessions can share one engine.

use crate::config::DmeConfig;
use crate::domain::Domain;
use crate::error::DmeResult;
use crate::generate::{GenerationContext, Generator};
use crate::moves::DialogueMove;
use crate::rules::policy::policy_for;
use crate::rules::{register_rules, RuleSet};
use crate::session::Interpreter;
use crate::state::InformationState;

/// Stateless orchestration of the four update phases.
#[derive(Debug)]
pub struct DialogueMoveEngine {
    rules: RuleSet,
    config: DmeConfig,
}

impl DialogueMoveEngine {
    /// Register the standard rules for `domain` with the configured policy.
    pub fn new(domain: Domain, config: DmeConfig) -> Self {
        let rules = register_rules(domain)
            .with_policy(policy_for(config.clarification))
            .configured(&config);
        Self { rules, config }
    }

    /// Wrap an existing rule set, keeping its policy.
    pub fn from_rules(rules: RuleSet, config: DmeConfig) -> Self {
        Self {
            rules: rules.configured(&config),
            config,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn domain(&self) -> &Domain {
        self.rules.domain()
    }

    pub fn config(&self) -> &DmeConfig {
        &self.config
    }

    /// Ask the NLU collaborator to classify an utterance.
    pub fn interpret<I>(&self, interpreter: &mut I, utterance: &str, state: &InformationState) -> DmeResult<Vec<DialogueMove>>
    where
        I: Interpreter + ?Sized,
    {
        interpreter.interpret(utterance, state).map_err(|e| {
            tracing::warn!(error = %e, "dme: interpreter failed");
            e.into()
        })
    }

    /// Integrate one move.
    pub fn integrate(&self, state: &InformationState, mv: DialogueMove) -> DmeResult<InformationState> {
        self.rules.integrate(state, mv)
    }

    /// Integrate moves in order, stopping early once the dialogue is over.
    pub fn integrate_all<M>(&self, state: &InformationState, moves: M) -> DmeResult<InformationState>
    where
        M: IntoIterator<Item = DialogueMove>,
    {
        let mut state = state.clone();
        for mv in moves {
            if state.is_done() {
                break;
            }
            state = self.integrate(&state, mv)?;
        }
        Ok(state)
    }

    /// Select the next system move.
    pub fn select(&self, state: &InformationState) -> DmeResult<(InformationState, Option<DialogueMove>)> {
        self.rules.select(state)
    }

    pub fn generation_context(&self, state: &InformationState, mv: &DialogueMove) -> GenerationContext {
        GenerationContext::build(self.domain(), state, mv)
    }

    /// Ask the NLG collaborator to realize a selected move.
    pub fn generate<G>(&self, generator: &mut G, state: &InformationState, mv: &DialogueMove) -> DmeResult<String>
    where
        G: Generator + ?Sized,
    {
        let ctx = self.generation_context(state, mv);
        generator.generate(&ctx).map_err(|e| {
            tracing::warn!(error = %e, "dme: generator failed");
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClarificationStrategy;
    use crate::error::{DmeError, SessionError};
    use crate::generate::TemplateGenerator;
    use crate::moves::Speaker;
    use crate::question::Question;

    fn engine(config: DmeConfig) -> DialogueMoveEngine {
        DialogueMoveEngine::new(Domain::bundled("nda").unwrap(), config)
    }

    #[test]
    fn integrate_all_stops_at_quit() {
        let dme = engine(DmeConfig::default());
        let state = dme
            .integrate_all(
                &InformationState::new(),
                [
                    DialogueMove::request("draft NDA"),
                    DialogueMove::quit(Speaker::User),
                    DialogueMove::request("draft NDA"),
                ],
            )
            .unwrap();
        assert!(state.is_done());
        assert_eq!(state.private().plan.len(), 1);
    }

    #[test]
    fn configured_policy_is_used() {
        let config = DmeConfig::default().with_clarification(ClarificationStrategy::RepromptRelevant);
        let dme = engine(config);
        let state = dme
            .integrate(&InformationState::new(), DialogueMove::request("draft NDA"))
            .unwrap();
        let (state, _) = dme.select(&state).unwrap();
        let state = dme.integrate(&state, DialogueMove::user_answer(false)).unwrap();
        assert_eq!(state.shared().qud, vec![Question::wh("parties")]);
    }

    #[test]
    fn generate_uses_context() {
        let dme = engine(DmeConfig::default());
        let state = dme
            .integrate(&InformationState::new(), DialogueMove::request("draft NDA"))
            .unwrap();
        let (state, mv) = dme.select(&state).unwrap();
        let text = dme
            .generate(&mut TemplateGenerator, &state, &mv.unwrap())
            .unwrap();
        assert_eq!(text, "[1/5] Please tell me the parties to the agreement.");
    }

    struct Broken;

    impl Interpreter for Broken {
        fn interpret(&mut self, _: &str, _: &InformationState) -> Result<Vec<DialogueMove>, SessionError> {
            Err(SessionError::Interpreter {
                message: "model unavailable".into(),
            })
        }
    }

    #[test]
    fn interpreter_errors_propagate() {
        let dme = engine(DmeConfig::default());
        let err = dme
            .interpret(&mut Broken, "hi", &InformationState::new())
            .unwrap_err();
        assert!(matches!(
            err,
            DmeError::Session(SessionError::Interpreter { .. })
        ));
    }
}
