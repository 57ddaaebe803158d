use competitorlens::llm::analyzer::analyze_competitor_text;
use competitorlens::llm::remote::RemoteLlmProvider;
use competitorlens::llm::{LlmProvider, LlmRequest, Sentiment};
use competitorlens::LensError;
use common::LlmConfig;
use mockito::Matcher;

fn completion(content: &str) -> String {
    serde_json::json!({
        "model": "gpt-4o-mini",
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150 }
    })
    .to_string()
}

#[tokio::test]
async fn test_remote_provider_with_mock() {
    let mut server = mockito::Server::new_async().await;

    // Mock successful OpenAI response
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer fake-api-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("This is a test response"))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o-mini");

    let request = LlmRequest {
        prompt: "Test prompt".to_string(),
        max_tokens: Some(100),
        temperature: Some(0.7),
        timeout_seconds: Some(10),
        response_schema: None,
    };

    let response = provider.generate(request).await.expect("generate");

    assert_eq!(response.content, "This is a test response");
    assert_eq!(response.usage.prompt_tokens, 100);
    assert_eq!(response.usage.completion_tokens, 50);
    assert_eq!(response.usage.total_tokens, 150);
    assert_eq!(response.model, "gpt-4o-mini");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_error_handling() {
    let mut server = mockito::Server::new_async().await;

    // Mock API error
    let mock = server
        .mock("POST", "/")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o-mini");

    let result = provider.generate(LlmRequest::default()).await;

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("429"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_timeout() {
    let mut server = mockito::Server::new_async().await;

    // Mock slow response
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o-mini");

    let request = LlmRequest {
        prompt: "Test".to_string(),
        timeout_seconds: Some(1), // 1 second timeout
        ..Default::default()
    };

    let result = provider.generate(request).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("timed out"));
}

#[tokio::test]
async fn test_analyzer_declares_schema_and_parses_result() {
    let mut server = mockito::Server::new_async().await;

    let content = r#"{
        "companyName": "Acme",
        "summary": "Acme 为中小企业提供铁砧。",
        "coreFeatures": ["重型铁砧", "终身保修"],
        "targetAudience": ["中小企业"],
        "sellingPoints": ["最重的铁砧"],
        "pricingModel": "定制报价",
        "sentiment": "Positive"
    }"#;

    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "qwen-turbo",
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "competitor_analysis" }
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(content))
        .create_async()
        .await;

    let config = LlmConfig {
        api_url: server.url(),
        model: "qwen-turbo".to_string(),
        ..Default::default()
    };
    let provider = RemoteLlmProvider::new(&config.api_url, "fake-api-key", &config.model);

    let result = analyze_competitor_text(&provider, &config, "Acme anvils page")
        .await
        .expect("analysis");

    assert_eq!(result.company_name, "Acme");
    assert_eq!(result.core_features.len(), 2);
    assert_eq!(result.pricing_model.as_deref(), Some("定制报价"));
    assert_eq!(result.sentiment, Some(Sentiment::Positive));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_analyzer_empty_model_output() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(""))
        .create_async()
        .await;

    let config = LlmConfig {
        api_url: server.url(),
        ..Default::default()
    };
    let provider = RemoteLlmProvider::new(&config.api_url, "fake-api-key", &config.model);

    let err = analyze_competitor_text(&provider, &config, "some text")
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::ModelResponse(_)));
    assert!(err.to_string().contains("请稍后重试"));
}
