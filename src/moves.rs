//! Dialogue moves exchanged between the engine and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::question::{Answer, Proposition, Question};

// ── Speaker ──────────────────────────────────────────────────────────────

/// Who produced a dialogue move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The human user.
    User,
    /// The dialogue system.
    System,
}

impl Speaker {
    /// The other party.
    pub fn other(self) -> Self {
        match self {
            Self::User => Self::System,
            Self::System => Self::User,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::System => write!(f, "system"),
        }
    }
}

// ── MoveType ─────────────────────────────────────────────────────────────

/// The illocutionary type of a move, as classified by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveType {
    Ask,
    Answer,
    Request,
    Command,
    Assert,
    Greet,
    Quit,
}

impl MoveType {
    /// Parse from a string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ask" | "question" => Some(Self::Ask),
            "answer" => Some(Self::Answer),
            "request" => Some(Self::Request),
            "command" => Some(Self::Command),
            "assert" | "inform" => Some(Self::Assert),
            "greet" | "greeting" => Some(Self::Greet),
            "quit" | "bye" => Some(Self::Quit),
            _ => None,
        }
    }

    /// Whether this move asks the system to carry out a task.
    pub fn is_task_request(self) -> bool {
        matches!(self, Self::Request | Self::Command)
    }
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ask => "ask",
            Self::Answer => "answer",
            Self::Request => "request",
            Self::Command => "command",
            Self::Assert => "assert",
            Self::Greet => "greet",
            Self::Quit => "quit",
        };
        write!(f, "{s}")
    }
}

// ── MoveContent ──────────────────────────────────────────────────────────

/// Parsed payload of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveContent {
    Empty,
    /// Unstructured text (requests before classification, assertions).
    Text(String),
    /// A request already classified to a domain task name.
    Task(String),
    Question(Question),
    Answer(Answer),
    /// A system report that the active plan has been carried out.
    Completion {
        plan_type: String,
        commitments: Vec<Proposition>,
    },
}

// ── DialogueMove ─────────────────────────────────────────────────────────

/// A single classified dialogue move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueMove {
    pub move_type: MoveType,
    pub content: MoveContent,
    pub speaker: Speaker,
}

impl DialogueMove {
    pub fn new(move_type: MoveType, content: MoveContent, speaker: Speaker) -> Self {
        Self {
            move_type,
            content,
            speaker,
        }
    }

    pub fn ask(question: Question, speaker: Speaker) -> Self {
        Self::new(MoveType::Ask, MoveContent::Question(question), speaker)
    }

    pub fn answer(answer: Answer, speaker: Speaker) -> Self {
        Self::new(MoveType::Answer, MoveContent::Answer(answer), speaker)
    }

    /// A user answer with no explicit question reference.
    pub fn user_answer(content: impl Into<crate::question::Value>) -> Self {
        Self::answer(Answer::new(content), Speaker::User)
    }

    pub fn request(text: impl Into<String>) -> Self {
        Self::new(MoveType::Request, MoveContent::Text(text.into()), Speaker::User)
    }

    pub fn assert(text: impl Into<String>, speaker: Speaker) -> Self {
        Self::new(MoveType::Assert, MoveContent::Text(text.into()), speaker)
    }

    pub fn greet(speaker: Speaker) -> Self {
        Self::new(MoveType::Greet, MoveContent::Empty, speaker)
    }

    pub fn quit(speaker: Speaker) -> Self {
        Self::new(MoveType::Quit, MoveContent::Empty, speaker)
    }

    /// The answer carried by this move, if it is an answer move.
    pub fn as_answer(&self) -> Option<&Answer> {
        match (&self.move_type, &self.content) {
            (MoveType::Answer, MoveContent::Answer(a)) => Some(a),
            _ => None,
        }
    }

    /// The question carried by this move, if any.
    pub fn as_question(&self) -> Option<&Question> {
        match &self.content {
            MoveContent::Question(q) => Some(q),
            _ => None,
        }
    }
}

impl fmt::Display for DialogueMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            MoveContent::Empty => write!(f, "{}:{}", self.speaker, self.move_type),
            MoveContent::Text(t) | MoveContent::Task(t) => {
                write!(f, "{}:{}({t})", self.speaker, self.move_type)
            }
            MoveContent::Question(q) => write!(f, "{}:{}({q})", self.speaker, self.move_type),
            MoveContent::Answer(a) => {
                write!(f, "{}:{}({})", self.speaker, self.move_type, a.content)
            }
            MoveContent::Completion { plan_type, .. } => {
                write!(f, "{}:{}(done {plan_type})", self.speaker, self.move_type)
            }
        }
    }
}
