//! SSE plumbing: the question endpoint's `start/delta/final/error/end`
//! grammar (built per-request in `handlers::question`) and the ambient
//! `/api/events` feed of ingestion/job lifecycle events, broadcast to every
//! connected client from a single `tokio::sync::broadcast` channel owned by
//! `AppState`.

use axum::response::sse::Event;
use serde_json::Value;

/// Wraps a JSON payload as one SSE data frame for the question stream.
pub fn json_event(payload: Value) -> Event {
    Event::default().data(payload.to_string())
}

/// Application-level events fanned out on `/api/events`. Generalizes the
/// teacher's dashboard `AppEvent` (molecule-docking progress) to the
/// ingestion/job lifecycle this system actually has.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    IngestionStatusChanged { source_type: String, source_id: String, status: String },
    JobStatusChanged { job_id: uuid::Uuid, status: String },
}

pub type EventSender = tokio::sync::broadcast::Sender<AppEvent>;

pub fn channel() -> (EventSender, tokio::sync::broadcast::Receiver<AppEvent>) {
    tokio::sync::broadcast::channel(256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_event_carries_the_payload_as_its_data_frame() {
        let event = json_event(json!({"type": "start"}));
        assert!(format!("{event:?}").contains("start"));
    }

    #[tokio::test]
    async fn app_event_is_broadcastable_to_multiple_subscribers() {
        let (tx, mut rx1) = channel();
        let mut rx2 = tx.subscribe();
        tx.send(AppEvent::JobStatusChanged { job_id: uuid::Uuid::nil(), status: "succeeded".into() }).unwrap();
        assert!(matches!(rx1.recv().await.unwrap(), AppEvent::JobStatusChanged { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), AppEvent::JobStatusChanged { .. }));
    }
}
