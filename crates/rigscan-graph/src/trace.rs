//! Run trace - structured record of every step an executor took.

use crate::stage::Target;
use rigscan_core::SharedState;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The stage's output was adopted.
    Updated,
    /// The stage failed; the previous state was kept and an error recorded.
    Failed,
    /// Loose output was not understood and dropped.
    Discarded,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated => write!(f, "updated"),
            Self::Failed => write!(f, "failed"),
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub stage: String,
    pub status: StepStatus,
    /// Router label, when the stage had a conditional edge.
    pub label: Option<String>,
    /// Where the run went next; `None` when it halted here.
    pub next: Option<Target>,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum HaltReason {
    /// An edge pointed at END.
    End,
    /// The current name has no registered stage.
    MissingStage { stage: String },
    /// The router returned a label absent from its mapping.
    UnknownLabel { stage: String, label: String },
    /// The stage has no outgoing edge.
    NoEdge { stage: String },
    /// The router panicked.
    RouterFailed { stage: String },
    /// The step ceiling was reached.
    StepLimit { max_steps: usize },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, "end"),
            Self::MissingStage { stage } => write!(f, "no stage named '{}'", stage),
            Self::UnknownLabel { stage, label } => {
                write!(f, "router of '{}' returned unmapped label '{}'", stage, label)
            }
            Self::NoEdge { stage } => write!(f, "no edge out of '{}'", stage),
            Self::RouterFailed { stage } => write!(f, "router of '{}' failed", stage),
            Self::StepLimit { max_steps } => write!(f, "step limit of {} reached", max_steps),
        }
    }
}

/// Final state of a run together with its step history.
#[derive(Clone, Debug)]
pub struct RunTrace {
    pub state: SharedState,
    pub steps: Vec<StepRecord>,
    pub halt: HaltReason,
}

impl RunTrace {
    /// Stage names in execution order.
    pub fn visited(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.stage.as_str()).collect()
    }

    /// (stage, next) pairs; comparing these across runs compares transition
    /// behaviour independently of stage output.
    pub fn transitions(&self) -> Vec<(String, Option<Target>)> {
        self.steps
            .iter()
            .map(|s| (s.stage.clone(), s.next.clone()))
            .collect()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn completed(&self) -> bool {
        self.halt == HaltReason::End
    }
}
