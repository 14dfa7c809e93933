mod harness;

use harness::config::ConfigBuilder;
use harness::engine::ScriptedEngine;
use harness::server::TestServer;

async fn server(origins: &[&str]) -> TestServer {
    TestServer::start(
        ConfigBuilder::new().with_origins(origins).build(),
        ScriptedEngine::text(&["hi"]),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn preflight_from_unlisted_origin_gets_no_cors_headers() {
    let server = server(&["https://app.example"]).await;

    let resp = server
        .client()
        .request(reqwest::Method::OPTIONS, server.url("/messages"))
        .header("origin", "https://evil.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert!(
        resp.headers()
            .keys()
            .all(|name| !name.as_str().starts_with("access-control-allow"))
    );
}

#[tokio::test]
async fn preflight_from_listed_origin_echoes_request() {
    let server = server(&["https://app.example"]).await;

    let resp = server
        .client()
        .request(reqwest::Method::OPTIONS, server.url("/v1/chat/completions"))
        .header("origin", "https://app.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type, x-osaurus-agent-id")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 204);
    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], "https://app.example");
    assert_eq!(headers["vary"], "Origin");
    assert_eq!(headers["access-control-allow-methods"], "POST");
    assert_eq!(headers["access-control-allow-headers"], "content-type, x-osaurus-agent-id");
    assert_eq!(headers["access-control-max-age"], "600");
}

#[tokio::test]
async fn wildcard_applies_to_simple_and_streaming_responses() {
    let server = server(&["*"]).await;

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert_eq!(resp.headers()["connection"], "close");
}

#[tokio::test]
async fn disabled_cors_emits_nothing() {
    let server = server(&[]).await;

    let resp = server
        .client()
        .get(server.url("/health"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();

    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
