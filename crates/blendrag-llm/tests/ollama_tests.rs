use std::time::Duration;

use blendrag_core::traits::Generator;
use blendrag_llm::OllamaGenerator;
use mockito::Matcher;
use serde_json::json;

#[tokio::test]
async fn generate_posts_non_streaming_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "tiny",
            "prompt": "say hi",
            "stream": false,
            "options": { "num_predict": 32 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"model":"tiny","response":"hi there","done":true}"#)
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "tiny", Duration::from_secs(5)).unwrap();
    let out = generator.generate("say hi", 32, 0.2).await.expect("generate");
    assert_eq!(out, "hi there");
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(503)
        .expect(4)
        .create_async()
        .await;

    let generator = OllamaGenerator::new(format!("{}/", server.url()), "tiny", Duration::from_secs(5)).unwrap();
    let err = generator.generate("x", 8, 0.0).await.unwrap_err();
    assert!(err.to_string().contains("Ollama request failed"), "{err}");
    mock.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(404)
        .with_body(r#"{"error":"model not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "missing", Duration::from_secs(5)).unwrap();
    assert!(generator.generate("x", 8, 0.0).await.is_err());
    mock.assert_async().await;
}

#[test]
fn empty_base_url_is_rejected() {
    assert!(OllamaGenerator::new("", "tiny", Duration::from_secs(1)).is_err());
}
