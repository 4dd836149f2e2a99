//! Reload signals broadcast to connected development clients

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An ephemeral notification for development clients.
///
/// Serialized as tagged JSON on the wire. Signals are broadcast to the
/// clients connected at send time; nothing is queued for late joiners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadSignal {
    /// Instruct clients to reload the current page
    Reload,

    /// Push updated content without a full page reload (style changes only)
    Inject { path: String, content: String },
}

/// Fan-out point connecting pipeline stages and watch bindings to the
/// dev server's client connections
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadSignal>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        ReloadHub { tx }
    }

    /// Broadcast a signal to all current subscribers. Dropped silently when
    /// no client is connected.
    pub fn send(&self, signal: ReloadSignal) {
        let _ = self.tx.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers_is_dropped() {
        let hub = ReloadHub::new();
        hub.send(ReloadSignal::Reload);
        // Nothing to assert beyond "does not panic": the signal is gone.
    }

    #[tokio::test]
    async fn test_subscribers_receive_signals() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        hub.send(ReloadSignal::Reload);
        assert_eq!(rx.recv().await.unwrap(), ReloadSignal::Reload);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&ReloadSignal::Reload).unwrap();
        assert_eq!(json, r#"{"type":"reload"}"#);

        let json = serde_json::to_string(&ReloadSignal::Inject {
            path: "/assets/styles/main.css".to_string(),
            content: "body{}".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"inject""#));
        assert!(json.contains(r#""path":"/assets/styles/main.css""#));
    }

    #[tokio::test]
    async fn test_no_replay_for_late_joiners() {
        let hub = ReloadHub::new();
        let mut early = hub.subscribe();
        hub.send(ReloadSignal::Reload);
        let mut late = hub.subscribe();

        assert_eq!(early.recv().await.unwrap(), ReloadSignal::Reload);
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
