// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::infrastructure::cache::cache_store::CacheStore;
use crate::utils::errors::CacheError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, AsyncConnectionConfig};
use std::time::Duration;
use tracing::debug;

/// 阻塞命令的响应超时在阻塞时长之外额外等待的时间
const BLOCKING_RESPONSE_MARGIN: Duration = Duration::from_secs(2);

/// 清空缓存时每批扫描的键数
const SCAN_BATCH: usize = 200;

/// 缓存使用的键前缀；队列等其他数据不在其中
pub const CACHE_KEY_PATTERNS: [&str; 2] = ["html:*", "llm:*"];

/// Redis客户端
///
/// 提供对Redis数据库的异步操作接口，同时作为缓存存储和任务队列的底层连接
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(CacheError)` - URL 无效
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// 获取多路复用连接
    pub async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// 获取用于阻塞命令的连接
    ///
    /// 默认连接的响应超时短于服务端阻塞时长，这里按阻塞时长放宽
    ///
    /// # 参数
    ///
    /// * `block` - 命令在服务端最长阻塞的时间
    pub async fn blocking_connection(
        &self,
        block: Duration,
    ) -> Result<MultiplexedConnection, redis::RedisError> {
        let config = AsyncConnectionConfig::new()
            .set_response_timeout(Some(block + BLOCKING_RESPONSE_MARGIN));
        self.client
            .get_multiplexed_async_connection_with_config(&config)
            .await
    }

    /// 删除匹配模式的全部键
    ///
    /// # 返回值
    ///
    /// 删除的键数
    pub async fn delete_matching(&self, pattern: &str) -> Result<usize, redis::RedisError> {
        let mut con = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut deleted = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut con)
                .await?;
            if !keys.is_empty() {
                deleted += con.del::<_, usize>(&keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(deleted)
    }
}

#[async_trait]
impl CacheStore for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut con = self.connection().await?;
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), CacheError> {
        let mut con = self.connection().await?;
        con.set_ex::<_, _, ()>(key, value, ttl_secs.max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut con = self.connection().await?;
        con.del::<_, ()>(key).await?;
        Ok(())
    }

    /// 只删除缓存键，同库中的任务队列保持不变
    async fn flushdb(&self) -> Result<(), CacheError> {
        let mut deleted = 0;
        for pattern in CACHE_KEY_PATTERNS {
            deleted += self.delete_matching(pattern).await?;
        }
        debug!("Cleared {} cache entries", deleted);
        Ok(())
    }
}
