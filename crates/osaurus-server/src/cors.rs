use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue};
use osaurus_config::{AllowList, CorsConfig};

const DEFAULT_METHODS: &str = "GET, POST, OPTIONS, HEAD";
const DEFAULT_HEADERS: &str = "Content-Type, Authorization";
const MAX_AGE_SECONDS: &str = "600";

/// Computes CORS response headers from the configured allow-list
///
/// Never fails: a request that is not allowed simply gets no CORS headers and
/// the browser blocks the response.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: AllowList,
}

impl CorsPolicy {
    pub const fn new(allowed_origins: AllowList) -> Self {
        Self { allowed_origins }
    }

    pub fn from_config(config: &CorsConfig) -> Self {
        Self::new(config.allowed_origins.clone())
    }

    /// Headers to attach to the response for a request with `request_headers`
    pub fn evaluate(&self, request_headers: &HeaderMap, preflight: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if self.allowed_origins.is_disabled() {
            return headers;
        }

        if self.allowed_origins == AllowList::Any {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else {
            let Some(origin) = self.allowed_origin(request_headers) else {
                return headers;
            };
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }

        if preflight {
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                echoed_list(request_headers.get(ACCESS_CONTROL_REQUEST_METHOD), DEFAULT_METHODS),
            );
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                echoed_list(request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS), DEFAULT_HEADERS),
            );
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECONDS));
        }

        headers
    }

    fn allowed_origin(&self, request_headers: &HeaderMap) -> Option<HeaderValue> {
        let value = request_headers.get(ORIGIN)?;
        let origin = value.to_str().ok()?;

        if origin.contains(['\r', '\n']) || !self.allowed_origins.contains(origin) {
            return None;
        }

        Some(value.clone())
    }
}

/// Sanitized copy of a requested method or header list, or `default`
fn echoed_list(requested: Option<&HeaderValue>, default: &'static str) -> HeaderValue {
    requested
        .and_then(|value| value.to_str().ok())
        .map(sanitize_list)
        .filter(|list| !list.is_empty())
        .and_then(|list| HeaderValue::from_str(&list).ok())
        .unwrap_or_else(|| HeaderValue::from_static(default))
}

/// Keep RFC 7230 token characters, normalize separators, drop empty entries
fn sanitize_list(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| is_token_char(*c) || *c == ',' || *c == ' ')
        .collect();

    kept.split(',')
        .map(|entry| entry.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|entry| !entry.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

const fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}
