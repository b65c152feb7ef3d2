//! Reconciliation of loose stage output into the canonical state shape.

use rigscan_core::SharedState;
use serde_json::Value;

/// Result of reconciling a loose stage's output against the previous state.
#[derive(Clone, Debug)]
pub enum Reconciled {
    /// The output was a complete state on its own.
    Adopted(SharedState),
    /// Recognized fields were merged over the previous state.
    Merged(SharedState),
    /// Nothing usable; the caller keeps the previous state.
    Unrecognized(String),
}

/// Interpret `output` as a state or as a partial field map.
///
/// A complete state is adopted as is. Otherwise every top-level key that
/// names a state field replaces that field; unknown keys are ignored. The
/// merge is all-or-nothing: if the combined fields do not form a valid state
/// the output is reported as unrecognized.
pub fn reconcile(previous: &SharedState, output: Value) -> Reconciled {
    let fields = match output {
        Value::Object(fields) => fields,
        other => return Reconciled::Unrecognized(format!("expected a field map, got {}", kind_of(&other))),
    };

    if let Ok(state) = serde_json::from_value::<SharedState>(Value::Object(fields.clone())) {
        return Reconciled::Adopted(state);
    }

    let mut base = match serde_json::to_value(previous) {
        Ok(Value::Object(base)) => base,
        Ok(_) | Err(_) => return Reconciled::Unrecognized("previous state is not a field map".into()),
    };

    let mut recognized = 0usize;
    for (key, value) in fields {
        if let Some(slot) = base.get_mut(&key) {
            *slot = value;
            recognized += 1;
        }
    }
    if recognized == 0 {
        return Reconciled::Unrecognized("no recognized state fields".into());
    }

    match serde_json::from_value(Value::Object(base)) {
        Ok(state) => Reconciled::Merged(state),
        Err(e) => Reconciled::Unrecognized(format!("merged fields do not form a valid state: {}", e)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn complete_state_is_adopted() {
        let prev = SharedState::new("p", "a");
        let mut next = prev.clone();
        next.current_stage = "elsewhere".into();
        let value = serde_json::to_value(&next).unwrap();
        match reconcile(&prev, value) {
            Reconciled::Adopted(s) => assert_eq!(s.current_stage, "elsewhere"),
            other => panic!("expected adopted, got {:?}", other),
        }
    }

    #[test]
    fn partial_map_is_merged() {
        let prev = SharedState::new("p", "a");
        let out = json!({ "current_stage": "patched", "not_a_field": 1 });
        match reconcile(&prev, out) {
            Reconciled::Merged(s) => {
                assert_eq!(s.current_stage, "patched");
                assert_eq!(s.session_id, prev.session_id);
            }
            other => panic!("expected merged, got {:?}", other),
        }
    }

    #[test]
    fn scalars_and_unknown_maps_are_unrecognized() {
        let prev = SharedState::new("p", "a");
        assert!(matches!(reconcile(&prev, json!(42)), Reconciled::Unrecognized(_)));
        assert!(matches!(reconcile(&prev, json!(["x"])), Reconciled::Unrecognized(_)));
        assert!(matches!(reconcile(&prev, json!({ "bogus": true })), Reconciled::Unrecognized(_)));
    }

    #[test]
    fn ill_typed_merge_is_unrecognized() {
        let prev = SharedState::new("p", "a");
        let out = json!({ "findings": "not a list" });
        assert!(matches!(reconcile(&prev, out), Reconciled::Unrecognized(_)));
    }
}
