//! Questions, answers, and the propositions they ground.
//!
//! A `Question` is a closed union over the three question shapes the
//! dialogue manager knows about, plus a `Clarification` wrapper that the
//! engine synthesizes when an answer fails to resolve the question in focus.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Value ────────────────────────────────────────────────────────────────

/// A value carried by an answer or a committed proposition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Bool(bool),
    Number(i64),
}

impl Value {
    /// Borrow the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read a yes/no value: either a real boolean or a text token like "yes".
    pub fn as_polarity(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_lowercase().as_str() {
                "yes" | "y" | "yeah" | "yep" | "true" | "correct" | "sure" => Some(true),
                "no" | "n" | "nope" | "false" | "incorrect" => Some(false),
                _ => None,
            },
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

// ── Question ─────────────────────────────────────────────────────────────

/// A question that can be accommodated, raised, and resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Question {
    /// `?x.predicate(x)`: asks for the value of a predicate.
    Wh { variable: String, predicate: String },
    /// `?proposition`: asks whether a proposition holds.
    YesNo { proposition: String },
    /// Asks the user to pick one of an ordered list of alternatives.
    Alternatives { alternatives: Vec<String> },
    /// Engine-synthesized follow-up to a question whose answer was rejected.
    Clarification { original: Box<Question> },
}

impl Question {
    /// Wh-question over `predicate` with the conventional variable `x`.
    pub fn wh(predicate: impl Into<String>) -> Self {
        Self::Wh {
            variable: "x".into(),
            predicate: predicate.into(),
        }
    }

    pub fn yes_no(proposition: impl Into<String>) -> Self {
        Self::YesNo {
            proposition: proposition.into(),
        }
    }

    pub fn alternatives<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Alternatives {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }

    /// Wrap `self` in a clarification question.
    pub fn clarify(&self) -> Self {
        Self::Clarification {
            original: Box::new(self.base().clone()),
        }
    }

    /// The question a clarification refers to, or `self`.
    pub fn base(&self) -> &Question {
        match self {
            Self::Clarification { original } => original.base(),
            other => other,
        }
    }

    pub fn is_clarification(&self) -> bool {
        matches!(self, Self::Clarification { .. })
    }

    /// The key under which an answer to this question is committed.
    pub fn predicate_key(&self) -> String {
        match self {
            Self::Wh { predicate, .. } => predicate.clone(),
            Self::YesNo { proposition } => proposition.clone(),
            Self::Alternatives { alternatives } => alternatives.join("|"),
            Self::Clarification { original } => original.predicate_key(),
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wh {
                variable,
                predicate,
            } => write!(f, "?{variable}.{predicate}({variable})"),
            Self::YesNo { proposition } => write!(f, "?{proposition}"),
            Self::Alternatives { alternatives } => write!(f, "?{{{}}}", alternatives.join(", ")),
            Self::Clarification { original } => write!(f, "clarify({original})"),
        }
    }
}

// ── Answer ───────────────────────────────────────────────────────────────

/// Content offered by a speaker, optionally tied to the question it answers.
///
/// `question_ref` is set for direct responses and absent for volunteered
/// information until the interpretation phase binds it to the question in
/// focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub content: Value,
    pub question_ref: Option<Question>,
}

impl Answer {
    pub fn new(content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
            question_ref: None,
        }
    }

    /// A direct response to `question`.
    pub fn to(question: Question, content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
            question_ref: Some(question),
        }
    }

    /// Whether this answer is explicitly addressed to `question`
    /// (clarifications and their originals count as the same question).
    pub fn addresses(&self, question: &Question) -> bool {
        self.question_ref
            .as_ref()
            .is_some_and(|q| q.base() == question.base())
    }
}

// ── Proposition ──────────────────────────────────────────────────────────

/// A resolved `(predicate, value)` pair held in the commitment set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Proposition {
    pub predicate: String,
    pub value: Value,
}

impl Proposition {
    pub fn new(predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    /// Canonical string key, e.g. `duration(3 years)`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Proposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.value)
    }
}
