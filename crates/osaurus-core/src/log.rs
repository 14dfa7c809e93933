use std::time::Duration;

use tokio::sync::watch;

/// One tool invocation observed while serving a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallLogEntry {
    pub name: String,
    /// JSON-encoded arguments as received
    pub arguments: String,
    /// Tool output, when the gateway executed the tool itself
    pub result: Option<String>,
    pub duration: Option<Duration>,
    pub is_error: bool,
}

impl ToolCallLogEntry {
    /// Entry for a tool the model asked for but the client will execute
    pub fn requested(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
            result: None,
            duration: None,
            is_error: false,
        }
    }
}

/// Chat-specific fields of an access log record
///
/// Handlers attach this to the response extensions; the dispatcher merges it
/// into the record it emits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatLogDetails {
    pub model: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub tool_calls: Vec<ToolCallLogEntry>,
    pub finish_reason: Option<String>,
}

/// Chat details for a streamed response, available once the stream ends
///
/// The stream driver publishes exactly once; if it is dropped first (client
/// went away) the receiver observes a closed channel.
#[derive(Debug, Clone)]
pub struct PendingChatLog(pub watch::Receiver<Option<ChatLogDetails>>);

impl PendingChatLog {
    /// Create the publishing half and the extension value
    pub fn channel() -> (watch::Sender<Option<ChatLogDetails>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self(rx))
    }

    /// Wait for the driver to publish, returning `None` if it never did
    pub async fn wait(mut self) -> Option<ChatLogDetails> {
        loop {
            if let Some(details) = self.0.borrow_and_update().clone() {
                return Some(details);
            }
            if self.0.changed().await.is_err() {
                return self.0.borrow().clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_log_resolves_after_publish() {
        let (tx, pending) = PendingChatLog::channel();
        let handle = tokio::spawn(pending.wait());

        tx.send_replace(Some(ChatLogDetails {
            model: "m".to_owned(),
            finish_reason: Some("stop".to_owned()),
            ..ChatLogDetails::default()
        }));

        let details = handle.await.unwrap().unwrap();
        assert_eq!(details.model, "m");
    }

    #[tokio::test]
    async fn pending_log_is_none_when_driver_drops() {
        let (tx, pending) = PendingChatLog::channel();
        drop(tx);
        assert!(pending.wait().await.is_none());
    }
}
