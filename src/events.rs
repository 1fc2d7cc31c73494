use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

pub const MODEL_STATUS: &str = "model-status";
pub const PAGE_LOADED: &str = "page-loaded";
pub const CLASSIFICATION_PROGRESS: &str = "classification-progress";
pub const PAGE_COMPLETE: &str = "page-complete";
pub const ALERT: &str = "alert";

/// Receives UI notifications. Delivery is fire-and-forget.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

impl<F> EventSink for F
where
    F: Fn(&str, Value) + Send + Sync,
{
    fn emit(&self, event: &str, payload: Value) {
        self(event, payload)
    }
}

/// Writes events to the log; alerts go out at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &str, payload: Value) {
        if event == ALERT {
            warn!(event = event, payload = %payload, "ui event");
        } else {
            info!(event = event, payload = %payload, "ui event");
        }
    }
}

pub fn emit<S: EventSink + ?Sized, T: Serialize>(sink: &S, event: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit(event, value),
        Err(e) => warn!("Dropping {} event: {}", event, e),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_serialized_payload() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &str, payload: Value| seen.lock().unwrap().push((event.to_string(), payload));
        emit(&sink, ALERT, &serde_json::json!({ "message": "hi" }));
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen[0].0, "alert");
        assert_eq!(seen[0].1["message"], "hi");
    }
}
