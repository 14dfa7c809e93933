use std::time::Instant;

use http::HeaderMap;

/// Header naming the agent whose memory should be injected into chat requests
pub const AGENT_ID_HEADER: &str = "x-osaurus-agent-id";

/// Per-request context computed once by the dispatcher
///
/// Inserted into request extensions before routing and handed to handlers by
/// value, so no handler captures connection state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Path after `/v1`, `/api` and `/v1/api` prefixes were stripped
    pub normalized_path: String,
    /// CORS headers computed for this request (possibly empty)
    pub cors_headers: HeaderMap,
    /// Agent id from [`AGENT_ID_HEADER`], when present and non-empty
    pub agent_id: Option<String>,
    /// Client `Accept` header asked for `text/event-stream`
    pub accepts_event_stream: bool,
    /// When the request head was received
    pub started: Instant,
}

impl RequestContext {
    /// Build the context from the request head
    pub fn from_headers(normalized_path: String, headers: &HeaderMap, cors_headers: HeaderMap) -> Self {
        let agent_id = headers
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        let accepts_event_stream = headers
            .get_all(http::header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("text/event-stream"));

        Self {
            normalized_path,
            cors_headers,
            agent_id,
            accepts_event_stream,
            started: Instant::now(),
        }
    }

    /// Context for requests that never went through the dispatcher
    pub fn empty() -> Self {
        Self::from_headers("/".to_owned(), &HeaderMap::new(), HeaderMap::new())
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn empty_context_has_no_agent() {
        let ctx = RequestContext::empty();
        assert!(ctx.agent_id.is_none());
        assert!(!ctx.accepts_event_stream);
        assert!(ctx.cors_headers.is_empty());
    }

    #[test]
    fn reads_agent_and_accept_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AGENT_ID_HEADER, HeaderValue::from_static(" agent-7 "));
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("text/event-stream"));

        let ctx = RequestContext::from_headers("/chat".to_owned(), &headers, HeaderMap::new());
        assert_eq!(ctx.agent_id.as_deref(), Some("agent-7"));
        assert!(ctx.accepts_event_stream);
    }

    #[test]
    fn blank_agent_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AGENT_ID_HEADER, HeaderValue::from_static("   "));

        let ctx = RequestContext::from_headers("/chat".to_owned(), &headers, HeaderMap::new());
        assert!(ctx.agent_id.is_none());
    }
}
