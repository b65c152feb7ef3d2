//! rigscan-graph - stage graph builder and executor.
//!
//! A graph threads one `SharedState` through named stages. Transitions are
//! either plain edges or routers that pick a label from the current state.
//! The executor is strictly sequential and bounded by a step ceiling.

pub mod executor;
pub mod graph;
pub mod reconcile;
pub mod stage;
pub mod trace;

pub use executor::CompiledGraph;
pub use graph::{CompileMode, GraphConfig, GraphError, StateGraph, DEFAULT_MAX_STEPS};
pub use reconcile::{reconcile, Reconciled};
pub use stage::{LooseStage, Route, Router, Stage, StageOutcome, Target};
pub use trace::{HaltReason, RunTrace, StepRecord, StepStatus};
