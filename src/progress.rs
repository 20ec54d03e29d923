use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Pipeline phase reported by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Parsing,
    Indexing,
    Completed,
    Failed,
}

/// A progress snapshot for one file's pipeline run
///
/// `current`/`total` are pages during parsing and chunks during indexing.
/// Events are advisory: consumers may drop them without affecting the
/// pipeline outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseProgress {
    pub file_name: String,
    pub current: u64,
    pub total: u64,
    pub percentage: u8,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ParseProgress {
    pub fn new(
        file_name: &str,
        current: u64,
        total: u64,
        status: ProgressStatus,
        message: Option<String>,
    ) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((current * 100) / total).min(100) as u8
        };
        Self {
            file_name: file_name.to_string(),
            current,
            total,
            percentage,
            status,
            message,
        }
    }
}

/// Push-style progress event channel
///
/// Wraps an unbounded sender so the pipeline never blocks on a slow
/// consumer. A disabled sink drops every event; send errors (receiver
/// gone) are ignored for the same reason.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ParseProgress>>,
}

impl ProgressSink {
    /// Create a sink and the receiver that consumes its events
    pub fn channel() -> (Self, UnboundedReceiver<ParseProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Create a sink that drops all events
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit a progress snapshot
    pub fn emit(&self, progress: ParseProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(progress);
        }
    }

    /// Convenience for emitting a snapshot from parts
    pub fn report(
        &self,
        file_name: &str,
        current: u64,
        total: u64,
        status: ProgressStatus,
        message: Option<String>,
    ) {
        self.emit(ParseProgress::new(file_name, current, total, status, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_derivation() {
        let p = ParseProgress::new("a.pdf", 50, 200, ProgressStatus::Parsing, None);
        assert_eq!(p.percentage, 25);
        let p = ParseProgress::new("a.pdf", 0, 0, ProgressStatus::Failed, None);
        assert_eq!(p.percentage, 0);
        let p = ParseProgress::new("a.pdf", 7, 7, ProgressStatus::Completed, None);
        assert_eq!(p.percentage, 100);
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.report("a.pdf", 1, 10, ProgressStatus::Parsing, None);
        sink.report("a.pdf", 5, 10, ProgressStatus::Parsing, None);
        sink.report("a.pdf", 10, 10, ProgressStatus::Completed, Some("done".to_string()));
        drop(sink);

        let mut currents = Vec::new();
        while let Some(p) = rx.recv().await {
            currents.push(p.current);
        }
        assert_eq!(currents, vec![1, 5, 10]);
    }

    #[test]
    fn test_disabled_sink_is_noop() {
        let sink = ProgressSink::disabled();
        // Must not panic or block
        sink.report("a.pdf", 1, 10, ProgressStatus::Parsing, None);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_ignored() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.report("a.pdf", 1, 10, ProgressStatus::Parsing, None);
    }

    #[test]
    fn test_serde_wire_shape() {
        let p = ParseProgress::new("a.pdf", 3, 4, ProgressStatus::Indexing, None);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["fileName"], "a.pdf");
        assert_eq!(json["status"], "indexing");
        assert_eq!(json["percentage"], 75);
        assert!(json.get("message").is_none());
    }
}
