//! Graph builder.
//!
//! Registration mirrors the legacy workflow API: stages are keyed by name
//! (last write wins), edges point at names that may not exist yet, and the
//! builder is compiled into an immutable [`CompiledGraph`]. Permissive mode
//! keeps that laziness: a dangling name only halts the run when it is
//! reached. Strict mode rejects duplicates and dangling names up front.

use crate::executor::CompiledGraph;
use crate::stage::{LooseStage, Router, Stage, Target};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_MAX_STEPS: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no entry point")]
    MissingEntry,

    #[error("entry point '{0}' is not a registered stage")]
    UnknownEntry(String),

    #[error("stage '{0}' registered more than once")]
    DuplicateStage(String),

    #[error("edge from '{from}' targets unregistered stage '{to}'")]
    UnknownTarget { from: String, to: String },

    #[error("edge registered on unknown stage '{0}'")]
    UnknownSource(String),

    #[error("step limit must be at least 1")]
    InvalidStepLimit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Validate lazily; unknown names halt the run when reached and
    /// unrecognized loose output is discarded silently.
    #[default]
    Permissive,
    /// Validate every name at compile time and record unrecognized loose
    /// output as a stage failure.
    Strict,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GraphConfig {
    /// Hard ceiling on executed steps per run.
    pub max_steps: usize,
    pub mode: CompileMode,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            mode: CompileMode::Permissive,
        }
    }
}

impl GraphConfig {
    pub fn strict() -> Self {
        Self {
            mode: CompileMode::Strict,
            ..Self::default()
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

#[derive(Clone)]
pub(crate) enum StageEntry {
    Typed(Arc<dyn Stage>),
    Loose(Arc<dyn LooseStage>),
}

#[derive(Clone)]
pub(crate) struct ConditionalEdge {
    pub(crate) router: Arc<dyn Router>,
    pub(crate) mapping: HashMap<String, Target>,
}

/// Mutable registry of stages and edges.
#[derive(Default)]
pub struct StateGraph {
    stages: HashMap<String, StageEntry>,
    duplicates: Vec<String>,
    edges: HashMap<String, Vec<Target>>,
    conditional: HashMap<String, ConditionalEdge>,
    entry: Option<String>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed stage. Re-registering a name replaces the stage.
    pub fn add_stage(&mut self, name: impl Into<String>, stage: impl Stage + 'static) -> &mut Self {
        self.insert(name.into(), StageEntry::Typed(Arc::new(stage)));
        self
    }

    /// Register a legacy stage whose output is reconciled from a field map.
    pub fn add_loose_stage(
        &mut self,
        name: impl Into<String>,
        stage: impl LooseStage + 'static,
    ) -> &mut Self {
        self.insert(name.into(), StageEntry::Loose(Arc::new(stage)));
        self
    }

    pub fn set_entry(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    /// Plain edge. Only the first edge registered on a source is followed.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<Target>) -> &mut Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Conditional edge. Takes precedence over plain edges on the same source;
    /// registering a second one on the same source replaces the first.
    pub fn add_conditional_edge<L, T>(
        &mut self,
        from: impl Into<String>,
        router: impl Router + 'static,
        mapping: impl IntoIterator<Item = (L, T)>,
    ) -> &mut Self
    where
        L: Into<String>,
        T: Into<Target>,
    {
        let mapping = mapping
            .into_iter()
            .map(|(label, target)| (label.into(), target.into()))
            .collect();
        self.conditional.insert(
            from.into(),
            ConditionalEdge {
                router: Arc::new(router),
                mapping,
            },
        );
        self
    }

    pub fn contains_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Compile in permissive mode with the default step ceiling.
    pub fn compile(&self) -> Result<CompiledGraph, GraphError> {
        self.compile_with(GraphConfig::default())
    }

    /// Compile into an executor. The builder is left untouched, so compiling
    /// again produces an executor with the same transitions.
    pub fn compile_with(&self, config: GraphConfig) -> Result<CompiledGraph, GraphError> {
        let entry = self.entry.clone().ok_or(GraphError::MissingEntry)?;
        if config.max_steps == 0 {
            return Err(GraphError::InvalidStepLimit);
        }
        if config.mode == CompileMode::Strict {
            self.validate(&entry)?;
        }
        Ok(CompiledGraph::new(
            self.stages.clone(),
            self.edges.clone(),
            self.conditional.clone(),
            entry,
            config,
        ))
    }

    fn insert(&mut self, name: String, entry: StageEntry) {
        if self.stages.insert(name.clone(), entry).is_some() {
            tracing::debug!(stage = %name, "stage re-registered, last registration wins");
            self.duplicates.push(name);
        }
    }

    fn validate(&self, entry: &str) -> Result<(), GraphError> {
        if let Some(name) = self.duplicates.first() {
            return Err(GraphError::DuplicateStage(name.clone()));
        }
        if !self.stages.contains_key(entry) {
            return Err(GraphError::UnknownEntry(entry.to_string()));
        }

        let sources: BTreeSet<&String> = self.edges.keys().chain(self.conditional.keys()).collect();
        for from in sources {
            if !self.stages.contains_key(from) {
                return Err(GraphError::UnknownSource(from.clone()));
            }
            let plain = self.edges.get(from).into_iter().flatten();
            let mut labelled: Vec<&Target> = self
                .conditional
                .get(from)
                .map(|c| c.mapping.values().collect())
                .unwrap_or_default();
            labelled.sort_by_key(|t| t.to_string());
            for target in plain.chain(labelled) {
                if let Target::Stage(to) = target {
                    if !self.stages.contains_key(to) {
                        return Err(GraphError::UnknownTarget {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{Route, StageOutcome};
    use rigscan_core::SharedState;

    fn noop(state: &SharedState) -> StageOutcome {
        StageOutcome::Updated(state.clone())
    }

    #[test]
    fn compile_requires_entry() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop);
        assert_eq!(g.compile().err(), Some(GraphError::MissingEntry));
    }

    #[test]
    fn permissive_accepts_dangling_names() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop).set_entry("a").add_edge("a", "ghost");
        assert!(g.compile().is_ok());
    }

    #[test]
    fn strict_rejects_dangling_target() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop).set_entry("a").add_edge("a", "ghost");
        let err = g.compile_with(GraphConfig::strict()).err();
        assert_eq!(
            err,
            Some(GraphError::UnknownTarget {
                from: "a".into(),
                to: "ghost".into()
            })
        );
    }

    #[test]
    fn strict_rejects_duplicates() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop).add_stage("a", noop).set_entry("a");
        assert!(g.compile().is_ok());
        assert_eq!(
            g.compile_with(GraphConfig::strict()).err(),
            Some(GraphError::DuplicateStage("a".into()))
        );
    }

    #[test]
    fn strict_rejects_unknown_entry_and_source() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop).set_entry("b");
        assert_eq!(
            g.compile_with(GraphConfig::strict()).err(),
            Some(GraphError::UnknownEntry("b".into()))
        );

        let mut g = StateGraph::new();
        g.add_stage("a", noop).set_entry("a").add_edge("z", Target::End);
        assert_eq!(
            g.compile_with(GraphConfig::strict()).err(),
            Some(GraphError::UnknownSource("z".into()))
        );
    }

    #[test]
    fn strict_checks_conditional_targets() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop).set_entry("a").add_conditional_edge(
            "a",
            |_: &SharedState| Route::to("go"),
            [("go", Target::stage("missing")), ("stop", Target::End)],
        );
        assert!(matches!(
            g.compile_with(GraphConfig::strict()),
            Err(GraphError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn zero_step_limit_is_rejected() {
        let mut g = StateGraph::new();
        g.add_stage("a", noop).set_entry("a");
        assert_eq!(
            g.compile_with(GraphConfig::default().with_max_steps(0)).err(),
            Some(GraphError::InvalidStepLimit)
        );
    }
}
