// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 完整工作流端到端测试
///
/// 从提交任务到工作节点写回结果，覆盖缓存命中、AI 提取与失败重试
use crate::integration::helpers::{Backend, MockScraperEngine, TestNode, MODEL_ID};
use scrapeflow::application::usecases::submit_task::SubmitRequest;
use scrapeflow::domain::models::llm::AgentStatus;
use scrapeflow::domain::models::scrape_params::ScrapeParams;
use scrapeflow::domain::models::task::{CacheConfig, TaskStatus};
use serde_json::json;
use std::sync::Arc;

fn request(url: &str) -> SubmitRequest {
    SubmitRequest::new(
        url,
        ScrapeParams {
            timeout: 5_000,
            ..Default::default()
        },
    )
}

fn agent_request(url: &str) -> SubmitRequest {
    SubmitRequest::new(
        url,
        ScrapeParams {
            timeout: 5_000,
            agent_enabled: true,
            agent_model_id: Some(MODEL_ID.into()),
            agent_prompt: Some("list every product".into()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_identical_submission_is_served_from_render_cache() {
    let backend = Backend::in_memory();
    let node = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-e2e");
    let submitter = backend.submitter();

    let first = submitter
        .submit_and_await(request("https://shop.test/catalog"))
        .await
        .unwrap();
    assert_eq!(first.status, TaskStatus::Success);
    assert!(!first.cached);
    assert_eq!(first.node_id.as_deref(), Some("node-e2e"));
    assert!(first.result.is_some());

    let second = submitter
        .submit_and_await(request("https://shop.test/catalog"))
        .await
        .unwrap();
    assert_eq!(second.status, TaskStatus::Success);
    assert!(second.cached);
    assert!(second.html_cached);
    // 缓存命中的同步提交不经过工作节点
    assert!(second.node_id.is_none());
    assert_eq!(
        second.result.unwrap().visual_content,
        first.result.unwrap().visual_content
    );
    assert_eq!(node.engine.navigations(), 1);

    node.shutdown().await;
}

#[tokio::test]
async fn test_disabled_cache_always_navigates() {
    let backend = Backend::in_memory();
    let node = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-e2e");
    let submitter = backend.submitter();

    for _ in 0..2 {
        let mut req = request("https://shop.test/live");
        req.cache = CacheConfig {
            enabled: false,
            ttl: None,
        };
        let task = submitter.submit_and_await(req).await.unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert!(!task.cached);
    }
    assert_eq!(node.engine.navigations(), 2);

    node.shutdown().await;
}

#[tokio::test]
async fn test_agent_result_is_reused_through_extraction_cache() {
    let backend = Backend::in_memory();
    let node = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-e2e");
    let submitter = backend.submitter();

    let first = submitter
        .submit_and_await(agent_request("https://shop.test/catalog"))
        .await
        .unwrap();
    let agent = first.result.unwrap().agent_result.unwrap();
    assert_eq!(agent.status, AgentStatus::Success);
    assert_eq!(agent.extracted_items, Some(vec![json!({"name": "Widget"})]));
    assert!(!agent.cached);
    assert!(!first.agent_cached);

    let second = submitter
        .submit_and_await(agent_request("https://shop.test/catalog"))
        .await
        .unwrap();
    assert!(second.cached);
    assert!(second.agent_cached);
    let agent = second.result.unwrap().agent_result.unwrap();
    assert!(agent.cached);
    assert_eq!(agent.extracted_items, Some(vec![json!({"name": "Widget"})]));

    assert_eq!(backend.provider.calls(), 1);
    assert_eq!(node.engine.navigations(), 1);

    node.shutdown().await;
}

#[tokio::test]
async fn test_failed_task_can_be_retried() {
    let backend = Backend::in_memory();
    let engine = Arc::new(MockScraperEngine::new());
    engine.fail_on("https://flaky.test/");
    let node = TestNode::spawn(&backend, engine.clone(), "node-e2e");
    let submitter = backend.submitter();

    let failed = submitter
        .submit_and_await(request("https://flaky.test/"))
        .await
        .unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    let error = failed.error.unwrap();
    assert_eq!(error.kind.as_deref(), Some("NavigationError"));
    assert!(error.message.contains("ERR_NAME_NOT_RESOLVED"));

    engine.recover("https://flaky.test/");
    let retried = submitter.retry(failed.id, None).await.unwrap();
    assert_eq!(retried.status, TaskStatus::Pending);

    let done = submitter
        .await_terminal(failed.id, std::time::Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Success);
    assert!(done.error.is_none());
    assert_eq!(engine.navigations(), 2);

    node.shutdown().await;
}

#[tokio::test]
async fn test_batch_submission_completes_every_task() {
    let backend = Backend::in_memory();
    let node = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-e2e");
    let submitter = backend.submitter();

    let outcomes = submitter
        .submit_batch(vec![
            request("https://a.test/"),
            request("not a url"),
            request("https://b.test/"),
        ])
        .await;
    assert!(outcomes[1].is_err());

    for outcome in [&outcomes[0], &outcomes[2]] {
        let id = *outcome.as_ref().unwrap();
        let task = submitter
            .await_terminal(id, std::time::Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Success);
    }

    node.shutdown().await;
}
