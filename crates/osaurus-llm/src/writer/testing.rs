//! Sink that fails the test on any contract violation

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;

use super::{FrameSink, WriterError};

#[derive(Debug, Default)]
pub struct Recorded {
    pub head: Option<HeaderMap>,
    pub frames: Vec<String>,
    /// Number of frames sent through `close`
    pub terminal_frames: usize,
    pub closed: bool,
}

impl Recorded {
    pub fn body(&self) -> String {
        self.frames.concat()
    }

    /// JSON payloads of every SSE `data:` line, `[DONE]` excluded
    pub fn sse_payloads(&self) -> Vec<serde_json::Value> {
        self.body()
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .filter(|data| *data != "[DONE]")
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    /// SSE `event:` names in order
    pub fn sse_events(&self) -> Vec<String> {
        self.body()
            .lines()
            .filter_map(|line| line.strip_prefix("event: "))
            .map(str::to_owned)
            .collect()
    }
}

/// Panics on a second head, on writes before the head and on anything after close
#[derive(Clone, Default)]
pub struct StrictSink {
    pub recorded: Arc<Mutex<Recorded>>,
}

impl StrictSink {
    pub fn boxed(&self) -> Box<dyn FrameSink> {
        Box::new(self.clone())
    }

    pub fn snapshot(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

#[async_trait]
impl FrameSink for StrictSink {
    async fn send_head(&mut self, headers: HeaderMap) -> Result<(), WriterError> {
        let mut recorded = self.recorded.lock().unwrap();
        assert!(recorded.head.is_none(), "headers written twice");
        assert!(!recorded.closed, "headers after close");
        recorded.head = Some(headers);
        Ok(())
    }

    async fn send(&mut self, frame: Bytes) -> Result<(), WriterError> {
        let mut recorded = self.recorded.lock().unwrap();
        assert!(recorded.head.is_some(), "frame before headers");
        assert!(!recorded.closed, "frame after terminal frame");
        recorded.frames.push(String::from_utf8(frame.to_vec()).unwrap());
        Ok(())
    }

    async fn close(&mut self, last: Option<Bytes>) -> Result<(), WriterError> {
        let mut recorded = self.recorded.lock().unwrap();
        assert!(!recorded.closed, "closed twice");
        if let Some(frame) = last {
            recorded.frames.push(String::from_utf8(frame.to_vec()).unwrap());
            recorded.terminal_frames += 1;
        }
        recorded.closed = true;
        Ok(())
    }

    async fn closed(&self) {
        std::future::pending::<()>().await;
    }
}
