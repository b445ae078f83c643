//! Rich diagnostic error types for the dialogue manager.
//!
//! Only configuration, invariant, and collaborator failures cross the
//! engine boundary. Answers that fail to resolve a question and questions
//! with unmet prerequisites are ordinary dialogue states handled by the
//! rules and never appear here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the dialogue manager.
#[derive(Debug, Error, Diagnostic)]
pub enum DmeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invariant(#[from] InvariantError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DomainError {
    #[error("no plan builder registered for task \"{task}\"")]
    #[diagnostic(
        code(dme::domain::unknown_task),
        help(
            "The request was classified to a task the domain does not define. \
             Register a plan builder with `DomainBuilder::task` or add a \
             `[tasks.{task}]` table to the domain file."
        )
    )]
    UnknownTask { task: String },

    #[error("predicate \"{predicate}\" is not declared")]
    #[diagnostic(
        code(dme::domain::unknown_predicate),
        help("Declare the predicate before referring to it in a dependency or plan.")
    )]
    UnknownPredicate { predicate: String },

    #[error("predicate \"{predicate}\" depends on itself through its prerequisites")]
    #[diagnostic(
        code(dme::domain::cyclic_dependency),
        help("Dependencies must form a DAG. Remove one of the `depends` edges on the cycle.")
    )]
    CyclicDependency { predicate: String },

    #[error("invalid pattern for predicate \"{predicate}\": {message}")]
    #[diagnostic(
        code(dme::domain::invalid_pattern),
        help("Patterns use `regex` crate syntax. The first capture group, if any, is the value.")
    )]
    InvalidPattern { predicate: String, message: String },

    #[error("failed to parse domain: {message}")]
    #[diagnostic(
        code(dme::domain::parse),
        help("Check the TOML syntax of the domain file.")
    )]
    Parse { message: String },

    #[error("failed to read domain file: {path}")]
    #[diagnostic(code(dme::domain::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no bundled domain named \"{name}\"")]
    #[diagnostic(
        code(dme::domain::not_bundled),
        help("Bundled domains: nda. Load other domains with `Domain::load`.")
    )]
    NotBundled { name: String },
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("rule \"{rule}\" failed although its precondition held")]
    #[diagnostic(
        code(dme::rule::effect_failed),
        help(
            "Rule effects are total once their precondition holds, so this is \
             a domain authoring bug. See the inner error for the cause."
        )
    )]
    EffectFailed {
        rule: String,
        #[source]
        source: Box<DmeError>,
    },

    #[error("{phase} phase did not settle after {steps} rule applications")]
    #[diagnostic(
        code(dme::rule::no_fixpoint),
        help(
            "Some rule keeps its precondition true after firing. Raise \
             `max_rule_steps` only if the dialogue genuinely needs more steps."
        )
    )]
    NoFixpoint { phase: String, steps: usize },
}

// ---------------------------------------------------------------------------
// Invariant errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InvariantError {
    #[error("question {question} is held in more than one of issues, QUD, commitments")]
    #[diagnostic(
        code(dme::invariant::duplicate_question),
        help("A question must be accommodated, under discussion, or resolved, never two at once.")
    )]
    DuplicateQuestion { question: String },

    #[error("QUD holds {depth} questions")]
    #[diagnostic(
        code(dme::invariant::qud_depth),
        help("Only a clarification may sit above the question it clarifies.")
    )]
    QudDepth { depth: usize },

    #[error("predicate \"{predicate}\" has {count} committed values")]
    #[diagnostic(
        code(dme::invariant::conflicting_commitments),
        help("Belief revision must retract the old value before committing a new one.")
    )]
    ConflictingCommitments { predicate: String, count: usize },

    #[error("question {question} is under discussion before its prerequisite \"{prerequisite}\"")]
    #[diagnostic(
        code(dme::invariant::unmet_dependency),
        help("Dependent questions are only raised once their prerequisite is committed.")
    )]
    UnmetDependency {
        question: String,
        prerequisite: String,
    },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("interpreter failed: {message}")]
    #[diagnostic(
        code(dme::session::interpreter),
        help("The NLU collaborator could not classify the utterance. Retries belong in the adapter.")
    )]
    Interpreter { message: String },

    #[error("generator failed: {message}")]
    #[diagnostic(
        code(dme::session::generator),
        help("The NLG collaborator could not realize the move. Retries belong in the adapter.")
    )]
    Generator { message: String },

    #[error("system produced {moves} moves in one turn without yielding")]
    #[diagnostic(
        code(dme::session::runaway_selection),
        help("Check that agenda entries are consumed, or raise `max_system_moves`.")
    )]
    RunawaySelection { moves: usize },

    #[error("dialogue has already finished")]
    #[diagnostic(
        code(dme::session::finished),
        help("Start a new session to continue talking.")
    )]
    Finished,
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(code(dme::config::read), help("Ensure the config file exists and is readable."))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(dme::config::parse),
        help("Check the TOML syntax and field names of the engine config.")
    )]
    Parse { message: String },
}

/// Convenience alias for dialogue manager operations.
pub type DmeResult<T> = std::result::Result<T, DmeError>;
