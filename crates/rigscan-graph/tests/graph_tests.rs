//! Tests for rigscan-graph: routing, failure capture, reconciliation, step ceiling

use rigscan_core::SharedState;
use rigscan_graph::*;
use serde_json::json;

fn state() -> SharedState {
    SharedState::new("PLT-TEST", "deck")
}

fn mark(name: &'static str) -> impl Fn(&SharedState) -> StageOutcome + Send + Sync {
    move |s: &SharedState| {
        let mut next = s.clone();
        next.mark_stage(name);
        next.advisory.insert(name.to_string(), json!(true));
        StageOutcome::Updated(next)
    }
}

fn always_panics(_: &SharedState) -> StageOutcome {
    panic!("sensor bus offline")
}

// ===========================================================================
// Linear and conditional routing
// ===========================================================================

#[test]
fn linear_graph_visits_every_stage() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a"))
        .add_stage("b", mark("b"))
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", Target::End);
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.visited(), vec!["a", "b"]);
    assert_eq!(trace.halt, HaltReason::End);
    assert_eq!(trace.state.current_stage, "b");
}

#[test]
fn conditional_edge_picks_mapped_target() {
    let mut g = StateGraph::new();
    g.add_stage("check", mark("check"))
        .add_stage("yes", mark("yes"))
        .add_stage("no", mark("no"))
        .set_entry("check")
        .add_conditional_edge(
            "check",
            |s: &SharedState| Route::to(if s.platform_id.ends_with("TEST") { "y" } else { "n" }),
            [("y", Target::stage("yes")), ("n", Target::stage("no"))],
        )
        .add_edge("yes", Target::End)
        .add_edge("no", Target::End);
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.visited(), vec!["check", "yes"]);
    assert_eq!(trace.steps[0].label.as_deref(), Some("y"));
}

#[test]
fn router_warning_is_recorded() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a")).set_entry("a").add_conditional_edge(
        "a",
        |_: &SharedState| Route::to("stop").with_warning("nothing to analyze"),
        [("stop", Target::End)],
    );
    let out = g.compile().unwrap().invoke(state());
    assert_eq!(out.warnings, vec!["nothing to analyze"]);
}

#[test]
fn unknown_label_halts() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a"))
        .add_stage("b", mark("b"))
        .set_entry("a")
        .add_conditional_edge("a", |_: &SharedState| Route::to("maybe"), [("go", "b")])
        .add_edge("a", "b");
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.visited(), vec!["a"]);
    assert_eq!(
        trace.halt,
        HaltReason::UnknownLabel {
            stage: "a".into(),
            label: "maybe".into()
        }
    );
}

#[test]
fn only_first_plain_edge_is_followed() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a"))
        .add_stage("b", mark("b"))
        .add_stage("c", mark("c"))
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("a", "c")
        .add_edge("b", Target::End)
        .add_edge("c", Target::End);
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.visited(), vec!["a", "b"]);
    assert!(!trace.state.advisory.contains_key("c"));
}

#[test]
fn missing_stage_halts_with_state_unchanged() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a")).set_entry("a").add_edge("a", "ghost");
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.halt, HaltReason::MissingStage { stage: "ghost".into() });
    assert!(trace.state.errors.is_empty());
}

#[test]
fn stage_without_edges_halts() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a")).set_entry("a");
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.halt, HaltReason::NoEdge { stage: "a".into() });
}

#[test]
fn last_registration_wins() {
    let mut g = StateGraph::new();
    g.add_stage("a", |_: &SharedState| StageOutcome::failed("old"))
        .add_stage("a", mark("a"))
        .set_entry("a")
        .add_edge("a", Target::End);
    let out = g.compile().unwrap().invoke(state());
    assert!(out.errors.is_empty());
    assert_eq!(out.current_stage, "a");
}

// ===========================================================================
// Failure capture
// ===========================================================================

#[test]
fn panicking_stage_records_exactly_one_error() {
    let mut g = StateGraph::new();
    g.add_stage("faulty", always_panics)
        .set_entry("faulty")
        .add_edge("faulty", Target::End);
    let before = state();
    let trace = g.compile().unwrap().run(before.clone());
    assert!(trace.completed());
    assert_eq!(trace.state.errors.len(), 1);
    assert!(trace.state.errors[0].contains("faulty"));
    assert!(trace.state.errors[0].contains("sensor bus offline"));
    assert_eq!(trace.steps[0].status, StepStatus::Failed);
    // everything except the error list is the pre-step state
    let mut expected = before;
    expected.errors = trace.state.errors.clone();
    assert_eq!(trace.state, expected);
}

#[test]
fn failed_outcome_keeps_previous_state() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a"))
        .add_stage("b", |_: &SharedState| StageOutcome::failed("no data"))
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", Target::End);
    let out = g.compile().unwrap().invoke(state());
    assert_eq!(out.current_stage, "a");
    assert_eq!(out.errors, vec!["stage 'b' failed: no data"]);
}

#[test]
fn panicking_router_records_error_and_halts() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a")).set_entry("a").add_conditional_edge(
        "a",
        |_: &SharedState| -> Route { panic!("bad router") },
        [("x", Target::End)],
    );
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.halt, HaltReason::RouterFailed { stage: "a".into() });
    assert_eq!(trace.state.errors.len(), 1);
}

#[test]
fn stage_cannot_shrink_diagnostics() {
    let mut g = StateGraph::new();
    g.add_stage("a", |s: &SharedState| {
        let mut next = s.clone();
        next.record_error("first");
        StageOutcome::Updated(next)
    })
    .add_stage("b", |s: &SharedState| {
        let mut next = s.clone();
        next.errors.clear();
        next.warnings.clear();
        StageOutcome::Updated(next)
    })
    .set_entry("a")
    .add_edge("a", "b")
    .add_edge("b", Target::End);
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.state.errors, vec!["first"]);
    let counts: Vec<usize> = trace.steps.iter().map(|s| s.errors).collect();
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));
}

// ===========================================================================
// Loose stages
// ===========================================================================

#[test]
fn malformed_loose_output_leaves_state_unchanged() {
    let mut g = StateGraph::new();
    g.add_loose_stage("legacy", |_: &SharedState| json!("definitely not a state"))
        .set_entry("legacy")
        .add_edge("legacy", Target::End);
    let before = state();
    let trace = g.compile().unwrap().run(before.clone());
    assert_eq!(trace.state, before);
    assert_eq!(
        serde_json::to_vec(&trace.state).unwrap(),
        serde_json::to_vec(&before).unwrap()
    );
    assert_eq!(trace.steps[0].status, StepStatus::Discarded);
}

#[test]
fn malformed_loose_output_is_an_error_in_strict_mode() {
    let mut g = StateGraph::new();
    g.add_loose_stage("legacy", |_: &SharedState| json!(17))
        .set_entry("legacy")
        .add_edge("legacy", Target::End);
    let out = g.compile_with(GraphConfig::strict()).unwrap().invoke(state());
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].starts_with("stage 'legacy' failed: unrecognized output"));
}

#[test]
fn loose_field_map_is_merged() {
    let mut g = StateGraph::new();
    g.add_loose_stage("legacy", |_: &SharedState| {
        json!({ "current_stage": "legacy", "warnings": ["merged"] })
    })
    .set_entry("legacy")
    .add_edge("legacy", Target::End);
    let before = state();
    let out = g.compile().unwrap().invoke(before.clone());
    assert_eq!(out.current_stage, "legacy");
    assert_eq!(out.warnings, vec!["merged"]);
    assert_eq!(out.session_id, before.session_id);
}

#[test]
fn loose_full_state_is_adopted() {
    let mut g = StateGraph::new();
    g.add_loose_stage("legacy", |s: &SharedState| {
        let mut next = s.clone();
        next.inspection_area = "moonpool".into();
        serde_json::to_value(next).unwrap()
    })
    .set_entry("legacy")
    .add_edge("legacy", Target::End);
    let out = g.compile().unwrap().invoke(state());
    assert_eq!(out.inspection_area, "moonpool");
}

// ===========================================================================
// Step ceiling and compilation
// ===========================================================================

#[test]
fn self_loop_halts_at_step_ceiling() {
    let mut g = StateGraph::new();
    g.add_stage("spin", mark("spin"))
        .set_entry("spin")
        .add_edge("spin", "spin");
    let trace = g.compile().unwrap().run(state());
    assert_eq!(trace.step_count(), DEFAULT_MAX_STEPS);
    assert_eq!(trace.halt, HaltReason::StepLimit { max_steps: 20 });
    assert_eq!(trace.state.warnings.len(), 1);
}

#[test]
fn conditional_retry_loop_respects_configured_ceiling() {
    let mut g = StateGraph::new();
    g.add_stage("analysis", mark("analysis"))
        .set_entry("analysis")
        .add_conditional_edge(
            "analysis",
            |_: &SharedState| Route::to("retry"),
            [("retry", Target::stage("analysis")), ("end", Target::End)],
        );
    let graph = g.compile_with(GraphConfig::default().with_max_steps(5)).unwrap();
    let trace = graph.run(state());
    assert_eq!(trace.step_count(), 5);
    assert!(!trace.completed());
}

#[test]
fn compiling_twice_gives_identical_transitions() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a"))
        .add_stage("b", mark("b"))
        .set_entry("a")
        .add_conditional_edge(
            "a",
            |s: &SharedState| Route::to(if s.errors.is_empty() { "ok" } else { "stop" }),
            [("ok", Target::stage("b")), ("stop", Target::End)],
        )
        .add_edge("b", Target::End);
    let first = g.compile().unwrap();
    let second = g.compile().unwrap();
    let input = state();
    let t1 = first.run(input.clone());
    let t2 = second.run(input);
    assert_eq!(t1.transitions(), t2.transitions());
    assert_eq!(t1.halt, t2.halt);
    assert_eq!(first.stage_names(), second.stage_names());
}

#[tokio::test]
async fn async_invoke_matches_blocking_invoke() {
    let mut g = StateGraph::new();
    g.add_stage("a", mark("a"))
        .add_stage("b", mark("b"))
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", Target::End);
    let graph = g.compile().unwrap();
    let input = state();
    let blocking = graph.invoke(input.clone());
    let awaited = graph.invoke_async(input).await;
    assert_eq!(blocking.current_stage, awaited.current_stage);
    assert_eq!(blocking.advisory, awaited.advisory);
    assert_eq!(blocking.errors, awaited.errors);
}
