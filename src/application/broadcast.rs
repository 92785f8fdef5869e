// Outbound fan-out shared by the aggregator and the command router
use serde::Serialize;

pub trait Broadcast: Send + Sync {
    /// Deliver one already-serialized payload to every live client
    fn broadcast_text(&self, text: String);
}

/// Serialize once and hand the text to the sink
pub fn broadcast_json<T: Serialize + ?Sized>(sink: &dyn Broadcast, payload: &T) {
    match serde_json::to_string(payload) {
        Ok(text) => sink.broadcast_text(text),
        Err(e) => tracing::error!("Failed to serialize broadcast payload: {}", e),
    }
}
