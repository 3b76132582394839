//! End-to-end pipeline tests: chat completion SSE in, framed sentence
//! events out, with real HTTP round trips against mock upstreams.

use echois_llm::{ChatRequest, ChatProvider, LlmConfig, OpenAiProvider};
use echois_speech::{OpenAiTtsEngine, TtsConfig};
use echois_stream::{EventSink, PipelineConfig, StreamOrchestrator};
use std::sync::Arc;

fn provider_for(url: &str) -> OpenAiProvider {
    OpenAiProvider::new(LlmConfig {
        base_url: url.to_string(),
        api_key: Some("test-key".to_string()),
        ..LlmConfig::default()
    })
    .unwrap()
}

fn tts_for(url: &str) -> Arc<OpenAiTtsEngine> {
    Arc::new(
        OpenAiTtsEngine::new(TtsConfig {
            endpoint: url.to_string(),
            api_key: Some("test-key".to_string()),
            ..TtsConfig::default()
        })
        .unwrap(),
    )
}

fn sse_body(deltas: &[&str], with_done: bool) -> String {
    let mut body = String::new();
    for delta in deltas {
        let chunk = serde_json::json!({
            "choices": [{ "delta": { "content": delta } }]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    if with_done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

async fn run_pipeline(chat_body: &str, tts_status: usize) -> Vec<String> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(chat_body)
        .create_async()
        .await;
    server
        .mock("POST", "/v1/audio/speech")
        .with_status(tts_status)
        .with_body(if tts_status == 200 {
            &b"MP3!"[..]
        } else {
            &b"upstream broke"[..]
        })
        .expect_at_least(0)
        .create_async()
        .await;

    let provider = provider_for(&server.url());
    let (sink, mut rx) = EventSink::channel(64);
    let orchestrator =
        StreamOrchestrator::new(tts_for(&server.url()), sink, PipelineConfig::default());

    let request = ChatRequest::new(vec![echois_core::ChatMessage::user("Hi")]);
    let upstream = provider.chat_stream(request).await;
    orchestrator.run(upstream).await;

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

fn message_payloads(frames: &[String]) -> Vec<serde_json::Value> {
    frames
        .iter()
        .filter(|f| f.starts_with("event: message"))
        .map(|f| {
            let data = f.lines().nth(1).unwrap().strip_prefix("data: ").unwrap();
            serde_json::from_str(data).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_sentences_arrive_in_order_with_audio() {
    let body = sse_body(&["Hello", " world.", " How", " are you?"], true);
    let frames = run_pipeline(&body, 200).await;

    let messages = message_payloads(&frames);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "Hello world.");
    assert_eq!(messages[1]["text"], "How are you?");
    for message in &messages {
        assert!(message["audio"].is_string());
    }
    assert_eq!(*frames.last().unwrap(), "data: {\"text\":\"DONE\"}\n\n");
}

#[tokio::test]
async fn test_done_sentinel_flushes_incomplete_sentence() {
    let body = sse_body(&["Great job"], true);
    let frames = run_pipeline(&body, 200).await;

    let messages = message_payloads(&frames);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "Great job");
    assert_eq!(*frames.last().unwrap(), "data: {\"text\":\"DONE\"}\n\n");
}

#[tokio::test]
async fn test_natural_end_without_sentinel() {
    let body = sse_body(&["One.", " Two."], false);
    let frames = run_pipeline(&body, 200).await;

    assert_eq!(message_payloads(&frames).len(), 2);
    assert_eq!(
        *frames.last().unwrap(),
        "event: end\ndata: {\"done\":true}\n\n"
    );
}

#[tokio::test]
async fn test_tts_outage_degrades_to_text_only() {
    let body = sse_body(&["Good morning.", " Nice day."], true);
    let frames = run_pipeline(&body, 500).await;

    let messages = message_payloads(&frames);
    assert_eq!(messages.len(), 2);
    for message in &messages {
        assert!(message["text"].is_string());
        assert!(message.get("audio").is_none());
    }
    // Degraded audio must not affect completion.
    assert_eq!(*frames.last().unwrap(), "data: {\"text\":\"DONE\"}\n\n");
}

#[tokio::test]
async fn test_upstream_rejection_yields_single_error_frame() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"bad key"}}"#)
        .create_async()
        .await;

    let provider = provider_for(&server.url());
    let (sink, mut rx) = EventSink::channel(8);
    let orchestrator =
        StreamOrchestrator::new(tts_for(&server.url()), sink, PipelineConfig::default());

    let request = ChatRequest::new(vec![echois_core::ChatMessage::user("Hi")]);
    let upstream = provider.chat_stream(request).await;
    orchestrator.run(upstream).await;

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    assert_eq!(frames.len(), 1);
    assert!(frames[0].starts_with("event: error"));
}

#[tokio::test]
async fn test_full_width_japanese_segmentation() {
    let body = sse_body(&["こんにちは。", "元気", "ですか？"], true);
    let frames = run_pipeline(&body, 200).await;

    let messages = message_payloads(&frames);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "こんにちは。");
    assert_eq!(messages[1]["text"], "元気ですか？");
}
