// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// LLM 提取集成测试
///
/// 真实 HTTP 适配器对接 wiremock 服务端
use crate::integration::helpers::{model_config, MODEL_ID};
use scrapeflow::config::settings::{CacheSettings, LlmSettings};
use scrapeflow::domain::models::llm::{AgentStatus, ModelConfig, ProviderKind};
use scrapeflow::domain::models::scrape_outcome::BLOCK_SEPARATOR;
use scrapeflow::domain::services::extraction_service::{ExtractionRequest, ExtractionService};
use scrapeflow::infrastructure::cache::cache_service::CacheService;
use scrapeflow::infrastructure::cache::cache_store::MemoryCacheStore;
use scrapeflow::infrastructure::llm::HttpProviderFactory;
use scrapeflow::infrastructure::repositories::memory::InMemoryModelConfigRepository;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(model: ModelConfig) -> ExtractionService {
    let cache = CacheService::new(Arc::new(MemoryCacheStore::new()), CacheSettings::default());
    ExtractionService::new(
        Arc::new(InMemoryModelConfigRepository::new().with_model(model)),
        Arc::new(HttpProviderFactory::new(&LlmSettings::default()).unwrap()),
        cache,
        LlmSettings::default(),
    )
}

fn openai_model(server: &MockServer) -> ModelConfig {
    ModelConfig {
        base_url: Some(server.uri()),
        api_key: Some("sk-test".into()),
        ..model_config()
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

fn request(content: String) -> ExtractionRequest {
    ExtractionRequest {
        content,
        user_prompt: "extract products".into(),
        model_id: MODEL_ID.into(),
        use_cache: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fenced_json_response_is_parsed_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Here you go:\n```json\n{\"items\": [{\"name\": \"Widget\", \"price\": 5}]}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let extraction = service(openai_model(&server));
    let first = extraction.extract(&request("Widget | $5".into())).await;
    assert_eq!(first.status, AgentStatus::Success);
    assert_eq!(
        first.extracted_items,
        Some(vec![json!({"name": "Widget", "price": 5})])
    );
    assert_eq!(first.usage.total_tokens, 15);
    assert_eq!(first.model_name.as_deref(), Some("Mock Model"));
    assert!(!first.cached);

    let second = extraction.extract(&request("Widget | $5".into())).await;
    assert!(second.cached);
    assert_eq!(second.extracted_items, first.extracted_items);
}

#[tokio::test]
async fn test_parallel_chunks_are_merged_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("[{\"name\": \"row\"}]")),
        )
        .expect(3)
        .mount(&server)
        .await;

    let content = ["A | 1", "B | 2", "C | 3"].join(BLOCK_SEPARATOR);
    let extraction = service(openai_model(&server));
    let result = extraction
        .extract(&ExtractionRequest {
            parallel_batch_size: Some(1),
            use_cache: false,
            ..request(content)
        })
        .await;

    assert_eq!(result.status, AgentStatus::Success);
    assert_eq!(result.extracted_items.as_ref().map(Vec::len), Some(3));
    assert_eq!(result.usage.prompt_tokens, 30);
    let info = result.parallel_info.unwrap();
    assert_eq!(info.total_chunks, 3);
    assert_eq!(info.batch_size, 1);
    let indexes: Vec<usize> = info.chunks.iter().map(|c| c.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_provider_error_fails_agent_without_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let result = service(openai_model(&server))
        .extract(&request("Widget | $5".into()))
        .await;
    assert_eq!(result.status, AgentStatus::Failed);
    assert!(result.error.unwrap().contains("500"));
    assert!(result.extracted_items.is_none());
}

#[tokio::test]
async fn test_ollama_adapter_reports_eval_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "{\"data\": [{\"id\": 1}, {\"id\": 2}]}" },
            "prompt_eval_count": 40,
            "eval_count": 9,
            "done": true
        })))
        .mount(&server)
        .await;

    let model = ModelConfig {
        provider: ProviderKind::Ollama,
        base_url: Some(server.uri()),
        ..model_config()
    };
    let result = service(model).extract(&request("rows".into())).await;
    assert_eq!(result.status, AgentStatus::Success);
    assert_eq!(result.extracted_items.as_ref().map(Vec::len), Some(2));
    assert_eq!(result.usage.prompt_tokens, 40);
    assert_eq!(result.usage.completion_tokens, 9);
}

#[tokio::test]
async fn test_unknown_model_fails_fast() {
    let server = MockServer::start().await;
    let result = service(openai_model(&server))
        .extract(&ExtractionRequest {
            model_id: "missing".into(),
            ..request("Widget".into())
        })
        .await;
    assert_eq!(result.status, AgentStatus::Failed);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
