use std::sync::Arc;
use std::time::Duration;

use aibridge_ai_services::{
    EdgeTtsSynthesizer, FailoverGenerator, HttpSettings, OllamaChat, OpenAiChat, WhisperTranscriber,
};
use aibridge_codec_core::encode_wav;
use aibridge_session_core::services::{
    ChatMessage, ResponseGenerator, ServiceError, SpeechSynthesizer, Transcriber,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens here
const DEAD_URL: &str = "http://127.0.0.1:1";

fn settings() -> HttpSettings {
    HttpSettings::default().with_timeout(Duration::from_secs(5))
}

fn prompt() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("Be brief."),
        ChatMessage::user("What is the capital of France?"),
    ]
}

#[tokio::test]
async fn test_whisper_uploads_wav_and_trims_the_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer gsk_test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(" Hello there.\n"))
        .expect(1)
        .mount(&server)
        .await;

    let transcriber = WhisperTranscriber::new(
        format!("{}/openai/v1/audio/transcriptions", server.uri()),
        Some("gsk_test".to_string()),
        "whisper-large-v3",
        settings(),
    )
    .unwrap();

    let text = transcriber.transcribe(&[1000; 1600], 16000).await.unwrap();
    assert_eq!(text, "Hello there.");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("whisper-large-v3"));
    assert!(body.contains("name=\"response_format\""));
    assert!(body.contains("filename=\"audio.wav\""));
    assert!(body.contains("RIFF"));
}

#[tokio::test]
async fn test_whisper_without_key_is_not_configured() {
    let transcriber =
        WhisperTranscriber::new(DEAD_URL, None, "whisper-large-v3", settings()).unwrap();
    let err = transcriber.transcribe(&[1000; 160], 16000).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotConfigured(_)));
}

#[tokio::test]
async fn test_ollama_chat_sends_history_without_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.1",
            "stream": false,
            "options": { "num_predict": 256 },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1",
            "message": { "role": "assistant", "content": "  Paris.  " },
            "done": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OllamaChat::new(server.uri(), "llama3.1", settings()).unwrap();
    let reply = chat.generate(&prompt()).await.unwrap();
    assert_eq!(reply.text, "Paris.");
    assert_eq!(reply.provider, "ollama");

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["messages"][1]["role"], "user");
}

#[tokio::test]
async fn test_ollama_server_error_counts_as_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
        .mount(&server)
        .await;

    let chat = OllamaChat::new(server.uri(), "llama3.1", settings()).unwrap();
    let err = chat.generate(&prompt()).await.unwrap_err();
    match &err {
        ServiceError::Status { status, body } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "loading model");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    let chat = OllamaChat::new(DEAD_URL, "llama3.1", settings()).unwrap();
    assert!(!chat.is_available().await);
    let err = chat.generate(&prompt()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unreachable(_)), "{err:?}");
}

#[tokio::test]
async fn test_openai_chat_reads_the_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk_test"))
        .and(body_partial_json(json!({ "model": "llama-3.1-8b-instant" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "It is Paris." } }
            ]
        })))
        .mount(&server)
        .await;

    let chat = OpenAiChat::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("gsk_test".to_string()),
        "llama-3.1-8b-instant",
        settings(),
    )
    .unwrap();
    let reply = chat.generate(&prompt()).await.unwrap();
    assert_eq!(reply.text, "It is Paris.");
    assert_eq!(reply.provider, "groq");
}

#[tokio::test]
async fn test_failover_reaches_groq_when_ollama_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "content": "Paris." } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let primary = OllamaChat::new(DEAD_URL, "llama3.1", settings()).unwrap();
    let secondary = OpenAiChat::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("gsk_test".to_string()),
        "llama-3.1-8b-instant",
        settings(),
    )
    .unwrap();
    let generator = FailoverGenerator::new(Arc::new(primary)).with_secondary(Arc::new(secondary));

    let reply = generator.generate(&prompt()).await.unwrap();
    assert_eq!(reply.provider, "groq");
}

#[tokio::test]
async fn test_tts_requests_wav_and_returns_it() {
    let wav = encode_wav(&[0; 160], 24000).unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({
            "input": "Hello!",
            "voice": "en-US-GuyNeural",
            "response_format": "wav",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav.to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let tts = EdgeTtsSynthesizer::new(server.uri(), Some("key".to_string()), settings()).unwrap();
    let audio = tts.synthesize(" Hello! ", "en-US-GuyNeural").await.unwrap();
    assert_eq!(audio, wav);
}

#[tokio::test]
async fn test_tts_rejects_non_wav_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3\x04mp3 data".to_vec()))
        .mount(&server)
        .await;

    let tts = EdgeTtsSynthesizer::new(server.uri(), None, settings()).unwrap();
    let err = tts.synthesize("Hello", "en-US-GuyNeural").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_tts_refuses_empty_text() {
    let tts = EdgeTtsSynthesizer::new(DEAD_URL, None, settings()).unwrap();
    assert!(matches!(
        tts.synthesize("   ", "en-US-GuyNeural").await,
        Err(ServiceError::Audio(_))
    ));
}
