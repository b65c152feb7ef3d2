//! Executor - walks a compiled graph one stage at a time.
//!
//! Per step: look up the stage, run it behind a panic guard, fold its output
//! into the state, then resolve the outgoing edge. The run always returns a
//! state; stage failures end up in `errors`, never as a panic or `Err`.

use crate::graph::{CompileMode, ConditionalEdge, GraphConfig, StageEntry};
use crate::reconcile::{reconcile, Reconciled};
use crate::stage::{StageOutcome, Target};
use crate::trace::{HaltReason, RunTrace, StepRecord, StepStatus};
use rigscan_core::SharedState;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable, cheaply cloneable executable form of a [`crate::StateGraph`].
#[derive(Clone)]
pub struct CompiledGraph {
    stages: Arc<HashMap<String, StageEntry>>,
    edges: Arc<HashMap<String, Vec<Target>>>,
    conditional: Arc<HashMap<String, ConditionalEdge>>,
    entry: String,
    config: GraphConfig,
}

impl CompiledGraph {
    pub(crate) fn new(
        stages: HashMap<String, StageEntry>,
        edges: HashMap<String, Vec<Target>>,
        conditional: HashMap<String, ConditionalEdge>,
        entry: String,
        config: GraphConfig,
    ) -> Self {
        Self {
            stages: Arc::new(stages),
            edges: Arc::new(edges),
            conditional: Arc::new(conditional),
            entry,
            config,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn stage_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stages.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Run to completion and return the final state.
    pub fn invoke(&self, state: SharedState) -> SharedState {
        self.run(state).state
    }

    /// Async calling convention over [`Self::invoke`]. There are no
    /// suspension points: the whole run happens on the first poll.
    pub async fn invoke_async(&self, state: SharedState) -> SharedState {
        self.invoke(state)
    }

    /// Run to completion and return the final state with its step history.
    pub fn run(&self, initial: SharedState) -> RunTrace {
        let mut state = initial;
        let mut steps = Vec::new();
        let mut current = Target::Stage(self.entry.clone());

        let halt = loop {
            let name = match &current {
                Target::End => break HaltReason::End,
                Target::Stage(name) => name.clone(),
            };

            let Some(entry) = self.stages.get(&name) else {
                debug!(stage = %name, "no stage registered under this name, halting");
                break HaltReason::MissingStage { stage: name };
            };

            if steps.len() >= self.config.max_steps {
                warn!(stage = %name, max_steps = self.config.max_steps, "step limit reached");
                state.record_warning(format!(
                    "step limit of {} reached before stage '{}'",
                    self.config.max_steps, name
                ));
                break HaltReason::StepLimit {
                    max_steps: self.config.max_steps,
                };
            }

            let step = steps.len() + 1;
            info!(stage = %name, step, "executing stage");
            let status = self.apply(&name, entry, &mut state);

            let resolved = self.next_target(&name, &mut state);
            let (label, next) = match &resolved {
                Ok((label, next)) => (label.clone(), Some(next.clone())),
                Err(_) => (None, None),
            };
            steps.push(StepRecord {
                step,
                stage: name,
                status,
                label,
                next,
                errors: state.errors.len(),
                warnings: state.warnings.len(),
            });

            match resolved {
                Ok((_, next)) => current = next,
                Err(halt) => break halt,
            }
        };

        info!(
            session = %state.session_id,
            steps = steps.len(),
            halt = %halt,
            errors = state.errors.len(),
            warnings = state.warnings.len(),
            "run finished"
        );
        RunTrace { state, steps, halt }
    }

    fn apply(&self, name: &str, entry: &StageEntry, state: &mut SharedState) -> StepStatus {
        match entry {
            StageEntry::Typed(stage) => match guarded(|| stage.run(state)) {
                Ok(StageOutcome::Updated(next)) => adopt(state, next),
                Ok(StageOutcome::Failed(reason)) | Err(reason) => record_failure(name, &reason, state),
            },
            StageEntry::Loose(stage) => match guarded(|| stage.run(state)) {
                Ok(output) => match reconcile(state, output) {
                    Reconciled::Adopted(next) | Reconciled::Merged(next) => adopt(state, next),
                    Reconciled::Unrecognized(reason) => match self.config.mode {
                        CompileMode::Strict => {
                            record_failure(name, &format!("unrecognized output: {}", reason), state)
                        }
                        CompileMode::Permissive => {
                            warn!(stage = %name, %reason, "discarding unrecognized stage output");
                            StepStatus::Discarded
                        }
                    },
                },
                Err(reason) => record_failure(name, &reason, state),
            },
        }
    }

    /// Resolve the edge out of `name`: a conditional edge wins over plain
    /// edges, and only the first plain edge is honored.
    fn next_target(
        &self,
        name: &str,
        state: &mut SharedState,
    ) -> Result<(Option<String>, Target), HaltReason> {
        if let Some(edge) = self.conditional.get(name) {
            let route = match guarded(|| edge.router.route(state)) {
                Ok(route) => route,
                Err(reason) => {
                    warn!(stage = %name, %reason, "router failed");
                    state.record_error(format!("router of stage '{}' failed: {}", name, reason));
                    return Err(HaltReason::RouterFailed {
                        stage: name.to_string(),
                    });
                }
            };
            if let Some(warning) = route.warning {
                state.record_warning(warning);
            }
            return match edge.mapping.get(&route.label) {
                Some(target) => {
                    debug!(stage = %name, label = %route.label, next = %target, "routed");
                    Ok((Some(route.label), target.clone()))
                }
                None => Err(HaltReason::UnknownLabel {
                    stage: name.to_string(),
                    label: route.label,
                }),
            };
        }

        match self.edges.get(name).and_then(|targets| targets.first()) {
            Some(target) => Ok((None, target.clone())),
            None => Err(HaltReason::NoEdge {
                stage: name.to_string(),
            }),
        }
    }
}

fn adopt(state: &mut SharedState, mut next: SharedState) -> StepStatus {
    next.carry_diagnostics_from(state);
    *state = next;
    StepStatus::Updated
}

fn record_failure(name: &str, reason: &str, state: &mut SharedState) -> StepStatus {
    warn!(stage = %name, %reason, "stage failed");
    state.record_error(format!("stage '{}' failed: {}", name, reason));
    StepStatus::Failed
}

fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".to_string()
    }
}
