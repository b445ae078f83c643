//! The control loop: one dialogue session driven turn by turn.
//!
//! A [`DialogueSession`] owns one information state and wires the engine to
//! its two collaborators. The user side goes through an [`Interpreter`];
//! the system side keeps selecting, realizing, and integrating its own moves
//! until selection has nothing more to say.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dme::DialogueMoveEngine;
use crate::error::{DmeResult, SessionError};
use crate::generate::Generator;
use crate::moves::{DialogueMove, Speaker};
use crate::state::InformationState;

// ── Collaborator trait ───────────────────────────────────────────────────

/// Classifies an utterance into dialogue moves (NLU).
///
/// The state is read-only context; interpreters never update it. Retries
/// and timeouts for remote models belong in the implementation.
pub trait Interpreter {
    fn interpret(&mut self, utterance: &str, state: &InformationState) -> Result<Vec<DialogueMove>, SessionError>;
}

impl<F> Interpreter for F
where
    F: FnMut(&str, &InformationState) -> Result<Vec<DialogueMove>, SessionError>,
{
    fn interpret(&mut self, utterance: &str, state: &InformationState) -> Result<Vec<DialogueMove>, SessionError> {
        self(utterance, state)
    }
}

// ── LoopState ────────────────────────────────────────────────────────────

/// Where the control loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopState {
    #[default]
    AwaitingInput,
    Selecting,
    Generating,
    Done,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingInput => write!(f, "awaiting-input"),
            Self::Selecting => write!(f, "selecting"),
            Self::Generating => write!(f, "generating"),
            Self::Done => write!(f, "done"),
        }
    }
}

// ── Transcript ───────────────────────────────────────────────────────────

/// One utterance and the moves it carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub moves: Vec<DialogueMove>,
}

// ── DialogueSession ──────────────────────────────────────────────────────

/// A single dialogue between one user and the system.
pub struct DialogueSession<I, G> {
    engine: Arc<DialogueMoveEngine>,
    interpreter: I,
    generator: G,
    state: InformationState,
    loop_state: LoopState,
    transcript: Vec<TranscriptEntry>,
    started: bool,
}

impl<I: Interpreter, G: Generator> DialogueSession<I, G> {
    pub fn new(engine: Arc<DialogueMoveEngine>, interpreter: I, generator: G) -> Self {
        Self {
            engine,
            interpreter,
            generator,
            state: InformationState::new(),
            loop_state: LoopState::AwaitingInput,
            transcript: Vec::new(),
            started: false,
        }
    }

    pub fn state(&self) -> &InformationState {
        &self.state
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn engine(&self) -> &DialogueMoveEngine {
        &self.engine
    }

    pub fn is_done(&self) -> bool {
        self.loop_state == LoopState::Done
    }

    /// Greet the user. Calling it again is a no-op.
    pub fn start(&mut self) -> DmeResult<Vec<String>> {
        if self.started {
            return Ok(Vec::new());
        }
        self.started = true;
        self.state.stage(DialogueMove::greet(Speaker::System));
        tracing::info!("dme: session started");
        self.system_turn()
    }

    /// Take one user utterance and return what the system says back.
    ///
    /// The moves of one utterance are integrated together: if any of them
    /// fails, none is kept.
    pub fn respond(&mut self, utterance: &str) -> DmeResult<Vec<String>> {
        if self.is_done() {
            return Err(SessionError::Finished.into());
        }
        let moves = self
            .engine
            .interpret(&mut self.interpreter, utterance, &self.state)?;
        tracing::debug!(moves = moves.len(), "dme: interpreted utterance");

        let next = self.engine.integrate_all(&self.state, moves.iter().cloned())?;
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::User,
            text: utterance.to_string(),
            moves,
        });
        self.state = next;
        self.system_turn()
    }

    /// Start if needed, then feed `inputs` until they run out or the
    /// dialogue ends. Returns everything the system said.
    pub fn run<S, It>(&mut self, inputs: It) -> DmeResult<Vec<String>>
    where
        S: AsRef<str>,
        It: IntoIterator<Item = S>,
    {
        let mut said = self.start()?;
        for input in inputs {
            if self.is_done() {
                break;
            }
            said.extend(self.respond(input.as_ref())?);
        }
        Ok(said)
    }

    /// Select, realize, and integrate system moves until selection is idle.
    fn system_turn(&mut self) -> DmeResult<Vec<String>> {
        let result = self.system_moves();
        self.loop_state = if self.state.is_done() {
            LoopState::Done
        } else {
            LoopState::AwaitingInput
        };
        result
    }

    fn system_moves(&mut self) -> DmeResult<Vec<String>> {
        let limit = self.engine.config().max_system_moves;
        let mut said = Vec::new();
        while !self.state.is_done() {
            self.loop_state = LoopState::Selecting;
            let (selected, mv) = self.engine.select(&self.state)?;
            let Some(mv) = mv else {
                self.state = selected;
                break;
            };
            if said.len() >= limit {
                tracing::warn!(moves = said.len(), "dme: selection did not yield");
                return Err(SessionError::RunawaySelection { moves: said.len() }.into());
            }

            self.loop_state = LoopState::Generating;
            let text = self.engine.generate(&mut self.generator, &selected, &mv)?;
            self.state = self.engine.integrate(&selected, mv.clone())?;
            tracing::debug!(%mv, "dme: system move");
            self.transcript.push(TranscriptEntry {
                speaker: Speaker::System,
                text: text.clone(),
                moves: vec![mv],
            });
            said.push(text);
        }
        Ok(said)
    }
}

impl<I, G> std::fmt::Debug for DialogueSession<I, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueSession")
            .field("loop_state", &self.loop_state)
            .field("turns", &self.transcript.len())
            .field("started", &self.started)
            .finish()
    }
}
