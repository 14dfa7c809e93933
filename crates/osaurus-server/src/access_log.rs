//! Per-request access log delivery
//!
//! The dispatcher never waits on logging. Records go through a bounded
//! channel to a background task that hands them to an [`AccessLogSink`];
//! when the channel is full the record is dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use osaurus_config::AccessLogConfig;
use osaurus_core::ChatLogDetails;
use tokio::sync::mpsc;

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogRecord {
    pub method: Method,
    /// Normalized path the request was routed on
    pub path: String,
    pub user_agent: Option<String>,
    pub status: StatusCode,
    pub latency: Duration,
    pub request_body: Bytes,
    /// Empty for streamed responses
    pub response_body: Bytes,
    /// Present on chat routes
    pub chat: Option<ChatLogDetails>,
}

impl AccessLogRecord {
    pub fn new(method: Method, path: String, user_agent: Option<String>) -> Self {
        Self {
            method,
            path,
            user_agent,
            status: StatusCode::OK,
            latency: Duration::ZERO,
            request_body: Bytes::new(),
            response_body: Bytes::new(),
            chat: None,
        }
    }
}

/// Destination for access log records
pub trait AccessLogSink: Send + Sync {
    fn record(&self, record: AccessLogRecord);
}

/// Emits each record as a `tracing` event on the `osaurus::access` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AccessLogSink for TracingSink {
    fn record(&self, record: AccessLogRecord) {
        let latency_ms = u64::try_from(record.latency.as_millis()).unwrap_or(u64::MAX);
        let chat = record.chat.as_ref();

        tracing::info!(
            target: "osaurus::access",
            method = %record.method,
            path = %record.path,
            status = record.status.as_u16(),
            latency_ms,
            user_agent = record.user_agent.as_deref().unwrap_or_default(),
            request_bytes = record.request_body.len(),
            response_bytes = record.response_body.len(),
            model = chat.map(|c| c.model.as_str()),
            prompt_tokens = chat.and_then(|c| c.prompt_tokens),
            completion_tokens = chat.and_then(|c| c.completion_tokens),
            finish_reason = chat.and_then(|c| c.finish_reason.as_deref()),
            tool_calls = chat.map_or(0, |c| c.tool_calls.len()),
            "request served"
        );

        for call in chat.map(|c| c.tool_calls.as_slice()).unwrap_or_default() {
            tracing::debug!(
                target: "osaurus::access",
                tool = %call.name,
                arguments = %call.arguments,
                is_error = call.is_error,
                "tool call"
            );
        }

        tracing::trace!(
            target: "osaurus::access",
            request_body = %String::from_utf8_lossy(&record.request_body),
            response_body = %String::from_utf8_lossy(&record.response_body),
            "request bodies"
        );
    }
}

/// Sending half of the access log channel
///
/// Cloned into every request; [`AccessLog::submit`] never blocks.
#[derive(Clone)]
pub struct AccessLog {
    sender: Option<mpsc::Sender<AccessLogRecord>>,
    dropped: Arc<AtomicU64>,
}

impl AccessLog {
    /// Start the delivery task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: &AccessLogConfig, sink: Arc<dyn AccessLogSink>) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let (sender, mut receiver) = mpsc::channel::<AccessLogRecord>(config.capacity.max(1));

        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                sink.record(record);
            }
        });

        Self {
            sender: Some(sender),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn disabled() -> Self {
        Self {
            sender: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue a record, dropping it if the channel is full
    pub fn submit(&self, record: AccessLogRecord) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(record) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::debug!(dropped, "access log channel full, record dropped");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::debug!(dropped, "access log task stopped, record dropped");
                }
            }
        }
    }

    /// Records discarded because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Sink that keeps every record for inspection
    #[derive(Default)]
    pub(crate) struct CollectingSink {
        pub(crate) records: Mutex<Vec<AccessLogRecord>>,
    }

    impl AccessLogSink for CollectingSink {
        fn record(&self, record: AccessLogRecord) {
            self.records.lock().unwrap().push(record);
        }
    }

    impl CollectingSink {
        /// Wait until at least `count` records arrived
        pub(crate) async fn wait_for(&self, count: usize) -> Vec<AccessLogRecord> {
            for _ in 0..200 {
                {
                    let records = self.records.lock().unwrap();
                    if records.len() >= count {
                        return records.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("expected {count} access log records");
        }
    }
}
