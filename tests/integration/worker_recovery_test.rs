// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作节点生命周期测试
///
/// 心跳、空闲检查以及停止时的任务回收
use crate::integration::helpers::{wait_until, Backend, MockScraperEngine, TestNode};
use scrapeflow::application::usecases::submit_task::SubmitRequest;
use scrapeflow::domain::models::scrape_params::ScrapeParams;
use scrapeflow::domain::models::task::{TaskStatus, NODE_STOPPED_MESSAGE};
use scrapeflow::domain::repositories::node_repository::NodeRepository;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn request(url: &str) -> SubmitRequest {
    SubmitRequest::new(url, ScrapeParams::default())
}

#[tokio::test]
async fn test_stopped_node_hands_in_flight_tasks_to_another_node() {
    let backend = Backend::in_memory();
    let stuck = Arc::new(MockScraperEngine::gated());
    let first = TestNode::spawn(&backend, stuck.clone(), "node-a");
    let submitter = backend.submitter();

    let a = submitter.submit(request("https://a.test/")).await.unwrap();
    let b = submitter.submit(request("https://b.test/")).await.unwrap();
    wait_until(|| stuck.navigations() == 2).await;

    for id in [a.id, b.id] {
        let task = backend.tasks.find_one(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.node_id.as_deref(), Some("node-a"));
    }

    let browser = first.browser.clone();
    first.shutdown().await;

    for id in [a.id, b.id] {
        let task = backend.tasks.find_one(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.node_id.is_none());
        assert_eq!(task.error.unwrap().message, NODE_STOPPED_MESSAGE);
    }
    assert!(browser.closed.load(Ordering::SeqCst));
    assert_eq!(backend.node_status("node-a").await.as_deref(), Some("stopped"));
    assert_eq!(backend.queue.len(), 2);

    // 被放弃的抓取完成后不得覆盖重置后的状态
    stuck.release(2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let task = backend.tasks.find_one(a.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let second = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-b");
    for id in [a.id, b.id] {
        let task = submitter
            .await_terminal(id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.node_id.as_deref(), Some("node-b"));
        assert!(task.error.is_none());
    }
    wait_until(|| backend.queue.unacked_len() == 0).await;

    second.shutdown().await;
}

#[tokio::test]
async fn test_running_node_heartbeats_and_checks_idle_browser() {
    let backend = Backend::in_memory();
    let node = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-hb");

    let mut registered = None;
    for _ in 0..100 {
        if let Some(found) = backend.nodes.find("node-hb").await.unwrap() {
            registered = Some(found);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let registered = registered.expect("node never registered");
    assert_eq!(registered.status.to_string(), "running");

    let browser = node.browser.clone();
    wait_until(|| browser.idle_checks.load(Ordering::SeqCst) >= 1).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let refreshed = backend.nodes.find("node-hb").await.unwrap().unwrap();
    assert!(refreshed.last_seen > registered.last_seen);
    assert_eq!(refreshed.started_at, registered.started_at);

    node.shutdown().await;
    assert_eq!(backend.node_status("node-hb").await.as_deref(), Some("stopped"));
}

#[tokio::test]
async fn test_deleted_task_is_skipped_by_worker() {
    let backend = Backend::in_memory();
    let engine = Arc::new(MockScraperEngine::new());
    let submitter = backend.submitter();

    let doomed = submitter.submit(request("https://gone.test/")).await.unwrap();
    backend.tasks.delete_many(&[doomed.id]).await.unwrap();
    let kept = submitter.submit(request("https://kept.test/")).await.unwrap();

    let node = TestNode::spawn(&backend, engine.clone(), "node-skip");
    let done = submitter
        .await_terminal(kept.id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Success);
    assert_eq!(engine.navigations(), 1);

    node.shutdown().await;
}
