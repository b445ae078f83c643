//! Control-loop tests: a scripted interpreter, the template generator, and
//! domain/config files loaded from disk.

use std::io::Write;
use std::sync::Arc;

use ibis_dme::error::SessionError;
use ibis_dme::{
    ClarificationStrategy, DialogueMove, DialogueMoveEngine, DialogueSession, DmeConfig, DmeError,
    Domain, InformationState, Interpreter, LoopState, Speaker, TemplateGenerator, Value,
};

const PIZZA_TOML: &str = r#"
[domain]
name = "pizza"

[predicates.extra_cheese]
arg_types = ["bool"]
description = "extra cheese"

[predicates.address]
arg_types = ["text"]
description = "the delivery address"

[tasks.pizza]
keywords = ["pizza"]
plan_type = "pizza_order"

[[tasks.pizza.subplans]]
action = "findout"
kind = "alt"
alternatives = ["small", "large"]

[[tasks.pizza.subplans]]
action = "findout"
kind = "yn"
proposition = "extra_cheese"

[[tasks.pizza.subplans]]
action = "findout"
predicate = "address"
"#;

/// Keyword-based stand-in for a model-backed interpreter.
#[derive(Debug, Default)]
struct ScriptedInterpreter {
    calls: usize,
}

impl Interpreter for ScriptedInterpreter {
    fn interpret(&mut self, utterance: &str, _state: &InformationState) -> Result<Vec<DialogueMove>, SessionError> {
        self.calls += 1;
        let lower = utterance.to_lowercase();
        Ok(if lower == "bye" {
            vec![DialogueMove::quit(Speaker::User)]
        } else if lower.contains("pizza") || lower.contains("nda") {
            vec![DialogueMove::request(utterance)]
        } else {
            vec![DialogueMove::user_answer(utterance)]
        })
    }
}

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn pizza_session(config: DmeConfig) -> DialogueSession<ScriptedInterpreter, TemplateGenerator> {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_file(&dir, "pizza.toml", PIZZA_TOML);
    let domain = Domain::load(&path).unwrap();
    let engine = Arc::new(DialogueMoveEngine::new(domain, config));
    DialogueSession::new(engine, ScriptedInterpreter::default(), TemplateGenerator)
}

#[test]
fn pizza_order_from_domain_file() {
    let mut session = pizza_session(DmeConfig::default());
    let said = session
        .run(["I want a pizza", "large", "yes", "1 Main Street"])
        .unwrap();

    assert_eq!(said[0], "Hello! What would you like to do?");
    assert_eq!(said[1], "[1/3] Which would you like: small or large?");
    assert_eq!(said[2], "[2/3] Should extra cheese hold? (yes/no)");
    assert_eq!(said[3], "[3/3] Please tell me the delivery address.");
    assert!(said[4].starts_with("All set for pizza order."));
    assert!(said[4].contains("extra cheese: yes"));
    assert_eq!(said.len(), 5);

    let shared = session.state().shared();
    assert_eq!(shared.committed("extra_cheese").map(|p| &p.value), Some(&Value::Bool(true)));
    assert_eq!(
        shared.committed("address").map(|p| &p.value),
        Some(&Value::from("1 Main Street"))
    );
    assert_eq!(session.loop_state(), LoopState::AwaitingInput);
}

#[test]
fn transcript_alternates_speakers() {
    let mut session = pizza_session(DmeConfig::default());
    session.run(["I want a pizza", "small"]).unwrap();

    let speakers: Vec<_> = session.transcript().iter().map(|e| e.speaker).collect();
    assert_eq!(
        speakers,
        vec![
            Speaker::System,
            Speaker::User,
            Speaker::System,
            Speaker::User,
            Speaker::System,
        ]
    );
    assert_eq!(session.transcript()[3].text, "small");
    assert_eq!(session.transcript()[3].moves, vec![DialogueMove::user_answer("small")]);

    let json = serde_json::to_value(session.transcript()).unwrap();
    assert_eq!(json[0]["speaker"], "System");
}

#[test]
fn config_file_selects_reprompt_policy() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "dme.toml",
        "clarification = \"reprompt-relevant\"\nmax_system_moves = 4\n",
    );
    let config = DmeConfig::load(&path).unwrap();
    assert_eq!(config.clarification, ClarificationStrategy::RepromptRelevant);
    assert_eq!(config.max_system_moves, 4);
    assert_eq!(config.max_rule_steps, 64);

    let mut session = pizza_session(config);
    session.run(["pizza please", "large"]).unwrap();

    // Not a yes/no answer at all: the question is asked again as is.
    let said = session.respond("purple").unwrap();
    assert_eq!(said.len(), 1);
    assert!(said[0].contains("Sorry, \"purple\" doesn't work as extra cheese."));
    assert!(said[0].ends_with("Should extra cheese hold? (yes/no)"));
    assert_eq!(session.state().shared().qud.len(), 1);

    // The default policy stacks a clarification instead.
    let mut session = pizza_session(DmeConfig::default());
    session.run(["pizza please", "large", "purple"]).unwrap();
    assert_eq!(session.state().shared().qud.len(), 2);
}

#[test]
fn quit_ends_the_session() {
    let mut session = pizza_session(DmeConfig::default());
    let said = session.run(["I want a pizza", "bye", "large"]).unwrap();
    assert_eq!(said.len(), 2);
    assert!(session.is_done());
    assert_eq!(session.loop_state(), LoopState::Done);
    assert!(matches!(
        session.respond("hello?"),
        Err(DmeError::Session(SessionError::Finished))
    ));
}

#[test]
fn sessions_share_one_engine() {
    let engine = Arc::new(DialogueMoveEngine::new(
        Domain::bundled("nda").unwrap(),
        DmeConfig::default(),
    ));
    let mut a = DialogueSession::new(engine.clone(), ScriptedInterpreter::default(), TemplateGenerator);
    let mut b = DialogueSession::new(engine, ScriptedInterpreter::default(), TemplateGenerator);

    a.run(["draft an NDA", "Acme Corp and Smith Inc"]).unwrap();
    b.run(["draft an NDA"]).unwrap();

    assert_eq!(a.state().shared().commitments.len(), 1);
    assert!(b.state().shared().commitments.is_empty());
    assert_eq!(b.state().qud_top(), Some(&ibis_dme::Question::wh("parties")));
}

#[test]
fn missing_domain_file_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = Domain::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}
