// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// Redis 集成测试
///
/// 需要本地 Docker，默认忽略
use scrapeflow::config::settings::CacheSettings;
use scrapeflow::infrastructure::cache::cache_service::CacheService;
use scrapeflow::infrastructure::cache::redis_client::RedisClient;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::GenericImage;

#[tokio::test]
#[ignore = "requires docker"]
async fn test_redis_cache_entries_expire() {
    let node = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .unwrap();
    let port = node.get_host_port_ipv4(6379).await.unwrap();
    let client = RedisClient::new(&format!("redis://127.0.0.1:{}", port)).unwrap();
    let cache = CacheService::new(Arc::new(client), CacheSettings::default());

    assert!(cache.set("html:k", &json!({"v": 1}), Some(1)).await);
    assert_eq!(cache.get::<Value>("html:k").await, Some(json!({"v": 1})));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(cache.get::<Value>("html:k").await, None);

    assert!(cache.set("llm:k", &1, None).await);
    assert!(cache.clear().await);
    assert_eq!(cache.get::<i32>("llm:k").await, None);
}
