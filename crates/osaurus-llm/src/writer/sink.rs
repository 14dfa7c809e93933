use std::convert::Infallible;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::sync::{mpsc, oneshot};

use super::WriterError;

/// Frames in flight between a writer task and the HTTP body
const FRAME_BUFFER: usize = 32;

/// Where a writer's bytes go
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_head(&mut self, headers: HeaderMap) -> Result<(), WriterError>;

    async fn send(&mut self, frame: Bytes) -> Result<(), WriterError>;

    /// Send an optional last frame and end the body
    async fn close(&mut self, last: Option<Bytes>) -> Result<(), WriterError>;

    /// Resolves once the receiving side is gone
    async fn closed(&self);
}

/// Sink feeding a [`StreamingBody`] over channels
///
/// A dropped body (client disconnect) turns every later send into
/// [`WriterError::Disconnected`].
pub struct ChannelSink {
    head: Option<oneshot::Sender<HeaderMap>>,
    frames: Option<mpsc::Sender<Bytes>>,
}

/// Receiving half: becomes the HTTP response once headers arrive
pub struct StreamingBody {
    head: oneshot::Receiver<HeaderMap>,
    frames: mpsc::Receiver<Bytes>,
}

pub fn channel() -> (ChannelSink, StreamingBody) {
    let (head_tx, head_rx) = oneshot::channel();
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);

    (
        ChannelSink {
            head: Some(head_tx),
            frames: Some(frames_tx),
        },
        StreamingBody {
            head: head_rx,
            frames: frames_rx,
        },
    )
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_head(&mut self, headers: HeaderMap) -> Result<(), WriterError> {
        self.head
            .take()
            .ok_or(WriterError::Disconnected)?
            .send(headers)
            .map_err(|_| WriterError::Disconnected)
    }

    async fn send(&mut self, frame: Bytes) -> Result<(), WriterError> {
        let frames = self.frames.as_ref().ok_or(WriterError::Disconnected)?;
        frames.send(frame).await.map_err(|_| WriterError::Disconnected)
    }

    async fn close(&mut self, last: Option<Bytes>) -> Result<(), WriterError> {
        let frames = self.frames.take().ok_or(WriterError::Disconnected)?;
        if let Some(frame) = last {
            frames.send(frame).await.map_err(|_| WriterError::Disconnected)?;
        }
        Ok(())
    }

    async fn closed(&self) {
        match &self.frames {
            Some(frames) => frames.closed().await,
            None => std::future::pending::<()>().await,
        }
    }
}

impl StreamingBody {
    /// Wait for the writer's head and stream its frames as the body
    ///
    /// If the writer dies before sending headers the client gets a 500.
    pub async fn into_response(self) -> Response {
        let Ok(headers) = self.head.await else {
            tracing::error!("stream writer exited before sending headers");
            return (StatusCode::INTERNAL_SERVER_ERROR, "stream failed to start").into_response();
        };

        let body = futures_util::stream::unfold(self.frames, |mut frames| async move {
            let frame = frames.recv().await?;
            Some((Ok::<_, Infallible>(frame), frames))
        });

        let mut response = Response::new(Body::from_stream(body));
        *response.headers_mut() = headers;
        response
    }
}
