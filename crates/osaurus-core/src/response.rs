use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use serde::Serialize;

/// Content type of every JSON body the gateway writes
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serialize `body` into a complete JSON response
///
/// The body is fully buffered, so the response carries an exact `Content-Length`.
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            response
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode response: {e}")).into_response(),
    }
}

/// `{"error":{"type","message"}}` body used by routes without a vendor error shape
pub fn json_error(status: StatusCode, error_type: &str, message: &str) -> Response {
    json_response(
        status,
        &serde_json::json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_charset_content_type() {
        let response = json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_CONTENT_TYPE);
    }

    #[test]
    fn error_body_keeps_status() {
        let response = json_error(StatusCode::BAD_REQUEST, "invalid_request_error", "bad");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
