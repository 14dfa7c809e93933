//! The request dispatcher
//!
//! Runs in front of the route table: normalizes the path, computes CORS
//! headers, answers `OPTIONS` and `HEAD` itself, buffers the body, hands the
//! request to the routes with a [`RequestContext`], then finishes the response
//! and queues one access log record.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use osaurus_core::{ChatLogDetails, PendingChatLog, RequestContext};
use tower::ServiceExt;

use crate::access_log::{AccessLog, AccessLogRecord};
use crate::cors::CorsPolicy;
use crate::normalize::normalize_path;

/// Everything the dispatcher needs, cloned per request
#[derive(Clone)]
pub(crate) struct Dispatcher {
    pub(crate) routes: Router,
    pub(crate) cors: Arc<CorsPolicy>,
    pub(crate) body_limit: usize,
    pub(crate) access_log: AccessLog,
}

impl Dispatcher {
    /// Wrap the dispatcher around its route table
    pub(crate) fn into_router(self) -> Router {
        Router::new().fallback(dispatch).with_state(self)
    }
}

async fn dispatch(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    let started = Instant::now();
    let (mut parts, body) = request.into_parts();

    let path = normalize_path(parts.uri.path());
    let preflight = parts.method == Method::OPTIONS;
    let cors_headers = dispatcher.cors.evaluate(&parts.headers, preflight);

    let user_agent = parts
        .headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let mut record = AccessLogRecord::new(parts.method.clone(), path.clone(), user_agent);

    let response = if preflight || parts.method == Method::HEAD {
        StatusCode::NO_CONTENT.into_response()
    } else {
        match buffer_body(body, &parts.headers, dispatcher.body_limit).await {
            Ok(bytes) => {
                record.request_body = bytes.clone();

                let context = RequestContext::from_headers(path.clone(), &parts.headers, cors_headers.clone());
                parts.uri = rewrite_uri(&parts.uri, &path);
                parts.extensions.insert(context);

                let request = Request::from_parts(parts, Body::from(bytes));
                match dispatcher.routes.oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }
            Err(response) => response,
        }
    };

    finish(response, &cors_headers, record, started, &dispatcher.access_log).await
}

/// Collect the request body, answering 413 past `limit`
async fn buffer_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes, Response> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if declared.is_some_and(|length| length > u64::try_from(limit).unwrap_or(u64::MAX)) {
        return Err(payload_too_large(limit));
    }

    to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, "failed to read request body");
        payload_too_large(limit)
    })
}

fn payload_too_large(limit: usize) -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds {limit} bytes"),
    )
        .into_response()
}

/// Replace the path of `uri`, keeping its query
fn rewrite_uri(uri: &Uri, path: &str) -> Uri {
    if uri.path() == path {
        return uri.clone();
    }

    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_owned(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = PathAndQuery::try_from(path_and_query).ok();

    Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
}

/// Attach CORS and `Connection: close`, then queue the access log record
async fn finish(
    mut response: Response,
    cors_headers: &HeaderMap,
    mut record: AccessLogRecord,
    started: Instant,
    access_log: &AccessLog,
) -> Response {
    let headers = response.headers_mut();
    for (name, value) in cors_headers {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    record.status = response.status();
    record.chat = response.extensions_mut().remove::<ChatLogDetails>();
    let pending = response.extensions_mut().remove::<PendingChatLog>();

    if !access_log.is_enabled() {
        return response;
    }

    if let Some(pending) = pending {
        let access_log = access_log.clone();
        tokio::spawn(async move {
            record.chat = pending.wait().await;
            record.latency = started.elapsed();
            access_log.submit(record);
        });
        return response;
    }

    if is_streaming(&response) {
        record.latency = started.elapsed();
        access_log.submit(record);
        return response;
    }

    let (parts, body) = response.into_parts();
    let response = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            record.response_body = bytes.clone();
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to buffer response body");
            record.status = StatusCode::INTERNAL_SERVER_ERROR;
            Response::from_parts(parts, Body::empty())
        }
    };

    record.latency = started.elapsed();
    access_log.submit(record);

    response
}

fn is_streaming(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream") || v.starts_with("application/x-ndjson"))
}
