//! Domain model: predicates, sorts, plan builders, and the four semantic
//! operations the update rules consult.
//!
//! A `Domain` is pure data plus pure functions. It is built once, either
//! programmatically through [`DomainBuilder`] or from TOML through
//! [`Domain::from_toml_str`], and then shared read-only by the rule set.

pub mod bundled;
pub mod spec;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::plan::Plan;
use crate::question::{Answer, Question, Value};

/// Result type for domain operations.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Builds a plan for a task. Called once per accepted request.
pub type PlanBuilder = Arc<dyn Fn(&PlanContext) -> Plan + Send + Sync>;

/// Domain override for `incompatible(predicate, old, new)`.
pub type Incompatibility = Arc<dyn Fn(&str, &Value, &Value) -> bool + Send + Sync>;

// ── Definitions ──────────────────────────────────────────────────────────

/// Declaration of a domain predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDef {
    #[serde(default = "default_arity")]
    pub arity: usize,
    /// Argument types. A first argument type naming a declared sort makes
    /// answers subject to sort membership.
    #[serde(default)]
    pub arg_types: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Optional `regex` used to recognize and extract a value from free text.
    #[serde(default)]
    pub pattern: Option<String>,
}

fn default_arity() -> usize {
    1
}

impl PredicateDef {
    pub fn new<I, S>(arity: usize, arg_types: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            arity,
            arg_types: arg_types.into_iter().map(Into::into).collect(),
            description: description.into(),
            pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// What a plan builder gets to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    /// The classified task name.
    pub task: String,
    /// The request text, when the request carried one.
    pub utterance: Option<String>,
}

struct TaskDef {
    keywords: Vec<String>,
    builder: PlanBuilder,
}

// ── Domain ───────────────────────────────────────────────────────────────

/// A task domain bound into the rule set.
#[derive(Clone)]
pub struct Domain {
    name: String,
    predicates: BTreeMap<String, PredicateDef>,
    patterns: BTreeMap<String, Regex>,
    sorts: BTreeMap<String, Vec<String>>,
    /// `(dependent, prerequisite)` pairs in declaration order.
    dependencies: Vec<(String, String)>,
    tasks: BTreeMap<String, Arc<TaskDef>>,
    incompatible: Option<Incompatibility>,
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.name)
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .field("sorts", &self.sorts.keys().collect::<Vec<_>>())
            .field("dependencies", &self.dependencies)
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Domain {
    pub fn builder(name: impl Into<String>) -> DomainBuilder {
        DomainBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateDef> {
        self.predicates.get(name)
    }

    pub fn predicates(&self) -> impl Iterator<Item = (&str, &PredicateDef)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn sort(&self, name: &str) -> Option<&[String]> {
        self.sorts.get(name).map(Vec::as_slice)
    }

    /// The sort a predicate's value must belong to, if any.
    pub fn sort_of(&self, predicate: &str) -> Option<&[String]> {
        let def = self.predicates.get(predicate)?;
        let first = def.arg_types.first()?;
        self.sort(first)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Human-readable description of the predicate behind a question.
    pub fn describe(&self, question: &Question) -> String {
        let key = question.predicate_key();
        match self.predicates.get(&key) {
            Some(def) if !def.description.is_empty() => def.description.clone(),
            _ => key.replace('_', " "),
        }
    }

    // ── Tasks ────────────────────────────────────────────────────────────

    /// Classify request text to a task name: an exact task name wins,
    /// otherwise the first task (by name) with a keyword in the text.
    pub fn classify_task(&self, text: &str) -> Option<String> {
        let lower = text.trim().to_lowercase();
        if self.tasks.contains_key(&lower) {
            return Some(lower);
        }
        self.tasks
            .iter()
            .find(|(_, def)| {
                def.keywords
                    .iter()
                    .any(|k| contains_word(&lower, &k.to_lowercase()))
            })
            .map(|(name, _)| name.clone())
    }

    /// Build the plan for `ctx.task`.
    pub fn build_plan(&self, ctx: &PlanContext) -> DomainResult<Plan> {
        let def = self
            .tasks
            .get(&ctx.task)
            .ok_or_else(|| DomainError::UnknownTask {
                task: ctx.task.clone(),
            })?;
        Ok((def.builder)(ctx))
    }

    // ── Semantic operations ──────────────────────────────────────────────

    /// Whether `answer` resolves `question`.
    ///
    /// Checks structural compatibility first, then sort membership or the
    /// predicate's pattern. A mismatch is `false`, never an error.
    pub fn resolves(&self, answer: &Answer, question: &Question) -> bool {
        self.resolve_value(answer, question).is_some()
    }

    /// The value `answer` commits for `question`, if it resolves it.
    pub fn resolve_value(&self, answer: &Answer, question: &Question) -> Option<Value> {
        match question {
            Question::Clarification { original } => self.resolve_value(answer, original),
            Question::Wh { predicate, .. } => self.resolve_wh(answer, question, predicate),
            // A bare yes/no cannot be attributed to a proposition by itself.
            Question::YesNo { .. } => {
                if !answer.addresses(question) {
                    return None;
                }
                answer.content.as_polarity().map(Value::Bool)
            }
            Question::Alternatives { alternatives } => {
                let text = answer.content.as_text()?;
                match_member(alternatives, text).map(|m| Value::Text(m.clone()))
            }
        }
    }

    fn resolve_wh(&self, answer: &Answer, question: &Question, predicate: &str) -> Option<Value> {
        let text = match &answer.content {
            Value::Text(t) => t.trim(),
            Value::Number(n) => {
                let free = self.sort_of(predicate).is_none() && !self.patterns.contains_key(predicate);
                return (free && answer.addresses(question)).then_some(Value::Number(*n));
            }
            Value::Bool(_) => return None,
        };
        if text.is_empty() {
            return None;
        }
        if let Some(members) = self.sort_of(predicate) {
            return match_member(members, text).map(|m| Value::Text(m.clone()));
        }
        if let Some(re) = self.patterns.get(predicate) {
            let caps = re.captures(text)?;
            let found = caps.get(1).or_else(|| caps.get(0))?.as_str().trim();
            return (!found.is_empty()).then(|| Value::Text(found.to_string()));
        }
        // Free-text predicates accept anything said in reply to them.
        answer
            .addresses(question)
            .then(|| Value::Text(text.to_string()))
    }

    /// Whether `answer` has the right shape for `question`, regardless of
    /// whether its value is acceptable.
    pub fn relevant(&self, answer: &Answer, question: &Question) -> bool {
        match question {
            Question::Clarification { original } => self.relevant(answer, original),
            Question::Wh { .. } => match &answer.content {
                Value::Text(t) => !t.trim().is_empty(),
                Value::Number(_) => true,
                Value::Bool(_) => false,
            },
            Question::YesNo { .. } => answer.content.as_polarity().is_some(),
            Question::Alternatives { .. } => answer
                .content
                .as_text()
                .is_some_and(|t| !t.trim().is_empty()),
        }
    }

    /// Static lookup: does `dependent` depend on `prerequisite`?
    pub fn depends(&self, dependent: &Question, prerequisite: &Question) -> bool {
        let d = dependent.predicate_key();
        let p = prerequisite.predicate_key();
        self.dependencies.iter().any(|(dd, pp)| *dd == d && *pp == p)
    }

    /// Prerequisite predicates of `question`, in declaration order.
    pub fn prerequisites(&self, question: &Question) -> Vec<&str> {
        let key = question.predicate_key();
        self.dependencies
            .iter()
            .filter(|(d, _)| *d == key)
            .map(|(_, p)| p.as_str())
            .collect()
    }

    /// Predicates that directly depend on `predicate`, in declaration order.
    pub fn dependents(&self, predicate: &str) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(_, p)| p == predicate)
            .map(|(d, _)| d.as_str())
            .collect()
    }

    /// Whether a newly offered value conflicts with the committed one.
    /// Defaults to structural inequality.
    pub fn incompatible(&self, predicate: &str, old: &Value, new: &Value) -> bool {
        match &self.incompatible {
            Some(f) => f(predicate, old, new),
            None => old != new,
        }
    }

    /// The default question for a predicate.
    pub fn question_for(&self, predicate: &str) -> Question {
        Question::wh(predicate)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Programmatic construction of a [`Domain`].
pub struct DomainBuilder {
    name: String,
    predicates: BTreeMap<String, PredicateDef>,
    sorts: BTreeMap<String, Vec<String>>,
    dependencies: Vec<(String, String)>,
    tasks: BTreeMap<String, Arc<TaskDef>>,
    incompatible: Option<Incompatibility>,
}

impl DomainBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicates: BTreeMap::new(),
            sorts: BTreeMap::new(),
            dependencies: Vec::new(),
            tasks: BTreeMap::new(),
            incompatible: None,
        }
    }

    pub fn sort<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sorts
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    pub fn predicate(mut self, name: impl Into<String>, def: PredicateDef) -> Self {
        self.predicates.insert(name.into(), def);
        self
    }

    /// Declare that `dependent` can only be raised once `prerequisite` is committed.
    pub fn depends(mut self, dependent: impl Into<String>, prerequisite: impl Into<String>) -> Self {
        self.dependencies
            .push((dependent.into(), prerequisite.into()));
        self
    }

    /// Register a task with its classifier keywords and plan builder.
    pub fn task<I, S, F>(mut self, name: impl Into<String>, keywords: I, builder: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&PlanContext) -> Plan + Send + Sync + 'static,
    {
        self.tasks.insert(
            name.into(),
            Arc::new(TaskDef {
                keywords: keywords.into_iter().map(Into::into).collect(),
                builder: Arc::new(builder),
            }),
        );
        self
    }

    /// Override the default structural-inequality `incompatible`.
    pub fn incompatibility<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.incompatible = Some(Arc::new(f));
        self
    }

    /// Compile patterns and validate the dependency table.
    pub fn build(self) -> DomainResult<Domain> {
        let mut patterns = BTreeMap::new();
        for (name, def) in &self.predicates {
            if let Some(p) = &def.pattern {
                let re = Regex::new(p).map_err(|e| DomainError::InvalidPattern {
                    predicate: name.clone(),
                    message: e.to_string(),
                })?;
                patterns.insert(name.clone(), re);
            }
        }

        for (dependent, prerequisite) in &self.dependencies {
            for predicate in [dependent, prerequisite] {
                if !self.predicates.contains_key(predicate) {
                    return Err(DomainError::UnknownPredicate {
                        predicate: predicate.clone(),
                    });
                }
            }
        }

        if let Some(predicate) = find_cycle(&self.dependencies) {
            return Err(DomainError::CyclicDependency { predicate });
        }

        tracing::debug!(
            domain = %self.name,
            predicates = self.predicates.len(),
            tasks = self.tasks.len(),
            "built domain"
        );

        Ok(Domain {
            name: self.name,
            predicates: self.predicates,
            patterns,
            sorts: self.sorts,
            dependencies: self.dependencies,
            tasks: self.tasks,
            incompatible: self.incompatible,
        })
    }
}

/// A predicate lying on a dependency cycle, if there is one.
fn find_cycle(dependencies: &[(String, String)]) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        dependencies: &'a [(String, String)],
        marks: &mut BTreeMap<&'a str, Mark>,
    ) -> Option<String> {
        match marks.get(node) {
            Some(Mark::Active) => return Some(node.to_string()),
            Some(Mark::Done) => return None,
            None => {}
        }
        marks.insert(node, Mark::Active);
        for (_, prerequisite) in dependencies.iter().filter(|(d, _)| d == node) {
            if let Some(found) = visit(prerequisite, dependencies, marks) {
                return Some(found);
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    dependencies
        .iter()
        .find_map(|(dependent, _)| visit(dependent, dependencies, &mut marks))
}

// ── Matching helpers ─────────────────────────────────────────────────────

/// Find the member `text` names: an exact (case-insensitive) match, or the
/// single member that occurs in `text` as a whole word. Several distinct
/// members in one text is ambiguous and matches nothing.
fn match_member<'a>(members: &'a [String], text: &str) -> Option<&'a String> {
    let lower = text.trim().to_lowercase();
    if let Some(m) = members.iter().find(|m| m.to_lowercase() == lower) {
        return Some(m);
    }
    let mut hits = members
        .iter()
        .filter(|m| contains_word(&lower, &m.to_lowercase()));
    let first = hits.next()?;
    if hits.next().is_some() { None } else { Some(first) }
}

/// Whether `needle` occurs in `haystack` delimited by non-alphanumerics.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
