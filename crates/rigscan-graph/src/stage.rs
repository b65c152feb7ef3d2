//! Stage and router traits, and the values they exchange with the executor.

use rigscan_core::SharedState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a typed stage hands back to the executor.
#[derive(Clone, Debug)]
pub enum StageOutcome {
    /// The stage produced a new state; the executor adopts it.
    Updated(SharedState),
    /// The stage could not run; the executor records the reason and keeps
    /// the previous state.
    Failed(String),
}

impl StageOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// A named unit of work. Implement this for structs holding collaborators,
/// or register a closure directly.
pub trait Stage: Send + Sync {
    fn run(&self, state: &SharedState) -> StageOutcome;
}

impl<F> Stage for F
where
    F: Fn(&SharedState) -> StageOutcome + Send + Sync,
{
    fn run(&self, state: &SharedState) -> StageOutcome {
        self(state)
    }
}

/// Legacy stage that returns a loosely typed field map instead of a state.
/// Its output goes through [`crate::reconcile`].
pub trait LooseStage: Send + Sync {
    fn run(&self, state: &SharedState) -> serde_json::Value;
}

impl<F> LooseStage for F
where
    F: Fn(&SharedState) -> serde_json::Value + Send + Sync,
{
    fn run(&self, state: &SharedState) -> serde_json::Value {
        self(state)
    }
}

/// Destination of an edge.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Stage(String),
    End,
}

impl Target {
    pub fn stage(name: impl Into<String>) -> Self {
        Self::Stage(name.into())
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Stage(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Stage(name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(name) => write!(f, "{}", name),
            Self::End => write!(f, "END"),
        }
    }
}

/// A router's decision: a label looked up in the edge mapping, plus an
/// optional warning the executor appends to the state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub label: String,
    pub warning: Option<String>,
}

impl Route {
    pub fn to(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

impl From<&str> for Route {
    fn from(label: &str) -> Self {
        Self::to(label)
    }
}

/// Decision function of a conditional edge.
pub trait Router: Send + Sync {
    fn route(&self, state: &SharedState) -> Route;
}

impl<F> Router for F
where
    F: Fn(&SharedState) -> Route + Send + Sync,
{
    fn route(&self, state: &SharedState) -> Route {
        self(state)
    }
}
