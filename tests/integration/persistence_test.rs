// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基于 SQLite 的持久化集成测试
///
/// 工作节点通过 sea-orm 仓库读写任务记录
use crate::integration::helpers::{Backend, MockScraperEngine, TestNode};
use migration::{Migrator, MigratorTrait};
use scrapeflow::application::usecases::submit_task::SubmitRequest;
use scrapeflow::domain::models::scrape_params::ScrapeParams;
use scrapeflow::domain::models::task::TaskStatus;
use scrapeflow::domain::repositories::node_repository::NodeRepository;
use scrapeflow::domain::repositories::task_repository::TaskRepository;
use scrapeflow::infrastructure::repositories::node_repo_impl::NodeRepositoryImpl;
use scrapeflow::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

async fn sqlite() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    Arc::new(db)
}

#[tokio::test]
async fn test_worker_persists_results_through_sea_orm() {
    let db = sqlite().await;
    let tasks = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let backend = Backend::with_tasks(tasks.clone());
    let node = TestNode::spawn(&backend, Arc::new(MockScraperEngine::new()), "node-sql");
    let submitter = backend.submitter();

    let request = SubmitRequest::new(
        "https://shop.test/catalog",
        ScrapeParams {
            timeout: 5_000,
            ..Default::default()
        },
    );
    let first = submitter.submit_and_await(request.clone()).await.unwrap();
    assert_eq!(first.status, TaskStatus::Success);
    let result = first.result.unwrap();
    assert_eq!(result.metadata.status_code, Some(200));
    assert!(result.visual_content.starts_with("Widget | $5"));
    assert!(first.completed_at.is_some());

    let second = submitter.submit_and_await(request).await.unwrap();
    assert!(second.cached);
    assert_eq!(tasks.count(Some(TaskStatus::Success)).await.unwrap(), 2);

    node.shutdown().await;
}

#[tokio::test]
async fn test_node_records_round_trip() {
    let repo = NodeRepositoryImpl::new(sqlite().await);
    repo.heartbeat("node-db").await.unwrap();
    let started = repo.find("node-db").await.unwrap().unwrap();
    assert_eq!(started.status.to_string(), "running");

    repo.heartbeat("node-db").await.unwrap();
    repo.mark_stopped("node-db").await.unwrap();
    let stopped = repo.find("node-db").await.unwrap().unwrap();
    assert_eq!(stopped.status.to_string(), "stopped");
    assert!(repo.find("node-unknown").await.unwrap().is_none());
}
