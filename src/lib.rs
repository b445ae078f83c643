// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ibis-dme
//!
//! An issue-based dialogue manager: a rule engine that tracks a multi-turn
//! conversation as an information state and decides, turn by turn, what the
//! system should ask or say next.
//!
//! ## Architecture
//!
//! - **Information state** (`state`): private plan/agenda/issues/beliefs,
//!   shared QUD and commitments, copy-on-write between turns
//! - **Domain** (`domain`): sorts, predicates, dependencies and plan
//!   builders, built in code or loaded from TOML
//! - **Update rules** (`rules`): ordered interpretation, integration and
//!   selection rules run to a fixpoint by the rule engine
//! - **Engine** (`dme`): the interpret / integrate / select / generate cycle
//! - **Session** (`session`): the control loop around NLU and NLG collaborators
//!
//! ## Library usage
//!
//! ```no_run
//! use ibis_dme::{DialogueMove, DialogueMoveEngine, DmeConfig, Domain, InformationState};
//!
//! let engine = DialogueMoveEngine::new(Domain::bundled("nda").unwrap(), DmeConfig::default());
//! let state = engine
//!     .integrate(&InformationState::new(), DialogueMove::request("draft an NDA"))
//!     .unwrap();
//! let (state, next) = engine.select(&state).unwrap();
//! assert!(next.is_some());
//! assert_eq!(state.shared().qud.len(), 1);
//! ```

pub mod config;
pub mod dme;
pub mod domain;
pub mod error;
pub mod generate;
pub mod invariants;
pub mod moves;
pub mod plan;
pub mod question;
pub mod rules;
pub mod session;
pub mod state;

pub use config::{ClarificationStrategy, DmeConfig};
pub use dme::DialogueMoveEngine;
pub use domain::{Domain, DomainBuilder, PlanContext, PredicateDef};
pub use error::{DmeError, DmeResult};
pub use generate::{GenerationContext, Generator, TemplateGenerator};
pub use moves::{DialogueMove, MoveContent, MoveType, Speaker};
pub use plan::{Plan, PlanAction, Progress, Subplan, SubplanStatus};
pub use question::{Answer, Proposition, Question, Value};
pub use rules::{register_rules, RuleSet};
pub use session::{DialogueSession, Interpreter, LoopState, TranscriptEntry};
pub use state::{DialogueState, InformationState};
