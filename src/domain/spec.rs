//! TOML domain files.
//!
//! A domain file declares sorts, predicates, the dependency table, and one
//! plan template per task:
//!
//! ```toml
//! [domain]
//! name = "nda"
//!
//! [sorts]
//! us_state = ["California", "New York"]
//!
//! [predicates.governing_law]
//! arg_types = ["us_state"]
//! description = "the governing law"
//!
//! [[dependencies]]
//! dependent = "duration"
//! prerequisite = "effective_date"
//!
//! [tasks.nda]
//! keywords = ["nda", "non-disclosure"]
//! plan_type = "draft_nda"
//!
//! [[tasks.nda.subplans]]
//! action = "findout"
//! predicate = "governing_law"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::{Domain, DomainResult, PredicateDef};
use crate::error::DomainError;
use crate::plan::{Plan, Subplan};
use crate::question::Question;

// ── TOML deserialization helpers ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DomainToml {
    domain: DomainMeta,
    #[serde(default)]
    sorts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    predicates: BTreeMap<String, PredicateDef>,
    #[serde(default)]
    dependencies: Vec<DependencyToml>,
    #[serde(default)]
    tasks: BTreeMap<String, TaskToml>,
}

#[derive(Debug, Deserialize)]
struct DomainMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DependencyToml {
    dependent: String,
    prerequisite: String,
}

#[derive(Debug, Deserialize)]
struct TaskToml {
    #[serde(default)]
    keywords: Vec<String>,
    plan_type: Option<String>,
    #[serde(default)]
    subplans: Vec<SubplanToml>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActionKind {
    Findout,
    Raise,
    Bind,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum QuestionKind {
    #[default]
    Wh,
    #[serde(alias = "yes_no")]
    Yn,
    #[serde(alias = "alternatives")]
    Alt,
}

#[derive(Debug, Deserialize)]
struct SubplanToml {
    action: ActionKind,
    #[serde(default)]
    kind: QuestionKind,
    predicate: Option<String>,
    #[serde(default = "default_variable")]
    variable: String,
    proposition: Option<String>,
    alternatives: Option<Vec<String>>,
}

fn default_variable() -> String {
    "x".into()
}

impl SubplanToml {
    fn question(&self, task: &str) -> DomainResult<Question> {
        let missing = |field: &str| DomainError::Parse {
            message: format!("task \"{task}\": {:?} subplan needs `{field}`", self.kind),
        };
        Ok(match self.kind {
            QuestionKind::Wh => Question::Wh {
                variable: self.variable.clone(),
                predicate: self.predicate.clone().ok_or_else(|| missing("predicate"))?,
            },
            QuestionKind::Yn => {
                Question::yes_no(self.proposition.clone().ok_or_else(|| missing("proposition"))?)
            }
            QuestionKind::Alt => {
                Question::alternatives(self.alternatives.clone().ok_or_else(|| missing("alternatives"))?)
            }
        })
    }

    fn to_subplan(&self, task: &str) -> DomainResult<Subplan> {
        Ok(match self.action {
            ActionKind::Findout => Subplan::findout(self.question(task)?),
            ActionKind::Raise => Subplan::raise(self.question(task)?),
            ActionKind::Bind => {
                let variable = self.predicate.clone().ok_or_else(|| DomainError::Parse {
                    message: format!("task \"{task}\": bind subplan needs `predicate`"),
                })?;
                Subplan::bind(variable)
            }
        })
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

impl Domain {
    /// Parse a domain from TOML text.
    pub fn from_toml_str(toml_str: &str) -> DomainResult<Self> {
        let parsed: DomainToml = toml::from_str(toml_str).map_err(|e| DomainError::Parse {
            message: e.to_string(),
        })?;

        let mut builder = Domain::builder(parsed.domain.name);
        for (name, members) in parsed.sorts {
            builder = builder.sort(name, members);
        }
        for (name, def) in parsed.predicates {
            builder = builder.predicate(name, def);
        }
        for dep in parsed.dependencies {
            builder = builder.depends(dep.dependent, dep.prerequisite);
        }
        for (name, task) in parsed.tasks {
            let subplans = task
                .subplans
                .iter()
                .map(|s| s.to_subplan(&name))
                .collect::<DomainResult<Vec<_>>>()?;
            let plan_type = task.plan_type.unwrap_or_else(|| name.clone());
            builder = builder.task(name, task.keywords, move |_| {
                Plan::new(plan_type.clone(), subplans.clone())
            });
        }
        builder.build()
    }

    /// Load a domain from a TOML file.
    pub fn load(path: &Path) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DomainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
