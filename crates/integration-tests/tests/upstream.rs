//! The default engine and transcriber against mock backends

mod harness;

use harness::config::ConfigBuilder;
use harness::server::TestServer;
use harness::upstream::MockUpstream;
use harness::{sse_data, sse_events};
use serde_json::{Value, json};

fn weather_tool() -> Value {
    json!([{
        "type": "function",
        "function": {
            "name": "get_weather",
            "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}
        }
    }])
}

#[tokio::test]
async fn upstream_completion_passes_through() {
    let mock = MockUpstream::start().await.unwrap();
    let config = ConfigBuilder::new().with_engine(&mock.base_url()).build();
    let server = TestServer::start_from_config(config).await.unwrap();

    let body: Value = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({"model": "test-model", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["choices"][0]["message"]["content"], "Hello from upstream");
    assert_eq!(body["usage"]["prompt_tokens"], 10);
    assert_eq!(mock.completion_count(), 1);
}

#[tokio::test]
async fn upstream_stream_is_rewritten_for_anthropic_clients() {
    let mock = MockUpstream::start().await.unwrap();
    let config = ConfigBuilder::new().with_engine(&mock.base_url()).build();
    let server = TestServer::start_from_config(config).await.unwrap();

    let text = server
        .client()
        .post(server.url("/v1/messages"))
        .json(&json!({
            "model": "test-model",
            "max_tokens": 32,
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let deltas: String = sse_data(&text)
        .iter()
        .map(|d| serde_json::from_str::<Value>(d).unwrap())
        .filter_map(|p| p["delta"]["text"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(deltas, "Hello from upstream");
    assert_eq!(sse_events(&text).last().map(String::as_str), Some("message_stop"));
}

#[tokio::test]
async fn upstream_streamed_tool_call_becomes_openai_tool_frames() {
    let mock = MockUpstream::start().await.unwrap();
    let config = ConfigBuilder::new().with_engine(&mock.base_url()).build();
    let server = TestServer::start_from_config(config).await.unwrap();

    let text = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&json!({
            "model": "test-model",
            "stream": true,
            "tools": weather_tool(),
            "messages": [{"role": "user", "content": "weather in Paris?"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let chunks: Vec<Value> = sse_data(&text)
        .iter()
        .filter(|d| d.as_str() != "[DONE]")
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();

    let arguments: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["tool_calls"].as_array())
        .flatten()
        .filter_map(|call| call["function"]["arguments"].as_str())
        .collect();
    assert_eq!(arguments, r#"{"city":"Paris"}"#);
    assert!(
        chunks
            .iter()
            .any(|c| c["choices"][0]["finish_reason"] == "tool_calls")
    );
}

#[tokio::test]
async fn transcription_round_trips_through_whisper_backend() {
    let mock = MockUpstream::start().await.unwrap();
    let config = ConfigBuilder::new().with_stt(&mock.base_url()).build();
    let server = TestServer::start_from_config(config).await.unwrap();

    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(vec![0u8, 1, 2, 3, 255])
                .file_name("clip.wav")
                .mime_str("audio/wav")
                .unwrap(),
        )
        .text("model", "whisper-1")
        .text("response_format", "verbose_json");

    let resp = server
        .client()
        .post(server.url("/v1/audio/transcriptions"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["text"], "hello from whisper");
    assert_eq!(body["language"], "en");
    assert_eq!(body["segments"].as_array().unwrap().len(), 1);
    assert_eq!(mock.transcription_count(), 1);
}

#[tokio::test]
async fn transcription_text_format_is_plain() {
    let mock = MockUpstream::start().await.unwrap();
    let config = ConfigBuilder::new().with_stt(&mock.base_url()).build();
    let server = TestServer::start_from_config(config).await.unwrap();

    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(b"RIFF".to_vec()).file_name("a.wav"))
        .text("response_format", "text");

    let resp = server
        .client()
        .post(server.url("/audio/transcriptions"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap().trim(), "hello from whisper");
}

#[tokio::test]
async fn transcription_without_file_is_400() {
    let mock = MockUpstream::start().await.unwrap();
    let config = ConfigBuilder::new().with_stt(&mock.base_url()).build();
    let server = TestServer::start_from_config(config).await.unwrap();

    let form = reqwest::multipart::Form::new().text("model", "whisper-1");

    let resp = server
        .client()
        .post(server.url("/audio/transcriptions"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(mock.transcription_count(), 0);
}
