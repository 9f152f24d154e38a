// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// Redis 队列与缓存在同一个库上的行为
///
/// 使用进程内 RESP 服务器，不依赖 Docker
use crate::integration::helpers::FakeRedis;
use scrapeflow::config::settings::CacheSettings;
use scrapeflow::domain::models::scrape_params::ScrapeParams;
use scrapeflow::domain::models::task::{CacheConfig, QueueMessage, Task};
use scrapeflow::infrastructure::cache::cache_service::CacheService;
use scrapeflow::infrastructure::cache::redis_client::RedisClient;
use scrapeflow::queue::task_queue::{RedisTaskQueue, TaskQueue};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const QUEUE_KEY: &str = "scrapeflow:tasks";

fn message(path: &str, priority: i32) -> QueueMessage {
    Task::new(
        format!("https://example.com/{}", path),
        ScrapeParams::default(),
        CacheConfig::default(),
        priority,
    )
    .to_message()
}

fn client(server: &FakeRedis) -> RedisClient {
    RedisClient::new(&server.url()).unwrap()
}

#[tokio::test]
async fn test_consume_on_empty_queue_waits_then_returns_none() {
    let server = FakeRedis::start().await;
    let queue = RedisTaskQueue::new(client(&server), QUEUE_KEY);

    let started = Instant::now();
    let delivery = queue.consume("node-1").await.unwrap();

    assert!(delivery.is_none());
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_message_published_while_consumer_blocks_is_delivered() {
    let server = FakeRedis::start().await;
    let queue = RedisTaskQueue::new(client(&server), QUEUE_KEY);
    let consumer = queue.clone();
    let waiting = tokio::spawn(async move { consumer.consume("node-1").await });

    tokio::time::sleep(Duration::from_millis(700)).await;
    let sent = message("late", 1);
    queue.publish(&sent).await.unwrap();

    let delivery = waiting.await.unwrap().unwrap().unwrap();
    assert_eq!(delivery.message.task_id, sent.task_id);
    assert_eq!(server.list_len(&queue.processing_key("node-1")), 1);
}

#[tokio::test]
async fn test_priority_ack_and_requeue() {
    let server = FakeRedis::start().await;
    let queue = RedisTaskQueue::new(client(&server), QUEUE_KEY);

    let normal = message("normal", 1);
    let urgent = message("urgent", 3);
    queue.publish(&normal).await.unwrap();
    queue.publish(&urgent).await.unwrap();

    let first = queue.consume("n1").await.unwrap().unwrap();
    assert_eq!(first.message.task_id, urgent.task_id);
    queue.ack("n1", &first).await.unwrap();

    let second = queue.consume("n1").await.unwrap().unwrap();
    assert_eq!(second.message.task_id, normal.task_id);
    assert_eq!(server.list_len(&queue.processing_key("n1")), 1);

    assert_eq!(queue.requeue_unacked("n1").await.unwrap(), 1);
    assert_eq!(server.list_len(&queue.processing_key("n1")), 0);
    let again = queue.consume("n2").await.unwrap().unwrap();
    assert_eq!(again.message.task_id, normal.task_id);
}

#[tokio::test]
async fn test_cache_clear_keeps_queued_tasks() {
    let server = FakeRedis::start().await;
    let redis = client(&server);
    let queue = RedisTaskQueue::new(redis.clone(), QUEUE_KEY);
    let cache = CacheService::new(Arc::new(redis), CacheSettings::default());

    assert!(cache.set("html:page", &json!({"html": "<p>"}), None).await);
    assert!(cache.set("llm:rows", &json!([1, 2]), None).await);
    let in_flight = message("in-flight", 1);
    queue.publish(&in_flight).await.unwrap();
    let queued = message("queued", 1);
    queue.publish(&queued).await.unwrap();
    let taken = queue.consume("n1").await.unwrap().unwrap();
    assert_eq!(taken.message.task_id, in_flight.task_id);

    assert!(cache.clear().await);

    assert!(!server.has_key("html:page"));
    assert!(!server.has_key("llm:rows"));
    assert_eq!(server.list_len(&queue.processing_key("n1")), 1);
    let delivery = queue.consume("n2").await.unwrap().unwrap();
    assert_eq!(delivery.message.task_id, queued.task_id);
}
