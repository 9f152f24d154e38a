// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::QueueMessage;
use crate::infrastructure::cache::redis_client::RedisClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// 阻塞出队的等待时间
const CONSUME_BLOCK: Duration = Duration::from_secs(1);

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 投递失败
    #[error("Publish failed: {0}")]
    Publish(String),

    /// 出队失败
    #[error("Consume failed: {0}")]
    Consume(String),

    /// 确认失败
    #[error("Ack failed: {0}")]
    Ack(String),

    /// 消息无法编解码
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 一次投递
///
/// `receipt` 用于确认，确认前消息保留在节点的处理中列表
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: QueueMessage,
    pub receipt: String,
}

/// 任务队列特质
///
/// 至少一次投递：未确认的消息可被重新放回队列
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 投递消息，优先级大于1的消息会被下一个取走
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// 为指定节点取一条消息，短暂等待后没有消息则返回 `None`
    async fn consume(&self, node_id: &str) -> Result<Option<Delivery>, QueueError>;

    /// 确认消息已处理完毕
    async fn ack(&self, node_id: &str, delivery: &Delivery) -> Result<(), QueueError>;

    /// 把节点所有未确认的消息放回队列
    ///
    /// # 返回值
    ///
    /// 放回的消息数
    async fn requeue_unacked(&self, node_id: &str) -> Result<usize, QueueError>;
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError> {
        (**self).publish(message).await
    }

    async fn consume(&self, node_id: &str) -> Result<Option<Delivery>, QueueError> {
        (**self).consume(node_id).await
    }

    async fn ack(&self, node_id: &str, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(node_id, delivery).await
    }

    async fn requeue_unacked(&self, node_id: &str) -> Result<usize, QueueError> {
        (**self).requeue_unacked(node_id).await
    }
}

/// Redis 可靠列表队列
///
/// 出队用 BLMOVE 把消息从主队列移到节点的处理中列表，确认时再从处理中列表删除
#[derive(Clone)]
pub struct RedisTaskQueue {
    client: RedisClient,
    queue_key: String,
}

impl RedisTaskQueue {
    /// 创建Redis任务队列
    ///
    /// # 参数
    ///
    /// * `client` - Redis客户端
    /// * `queue_key` - 主队列键名
    pub fn new(client: RedisClient, queue_key: impl Into<String>) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
        }
    }

    /// 节点处理中列表的键名
    pub fn processing_key(&self, node_id: &str) -> String {
        format!("{}:processing:{}", self.queue_key, node_id)
    }
}

/// 优先级大于1的消息插到出队端
pub fn push_command(priority: i32) -> &'static str {
    if priority > 1 {
        "RPUSH"
    } else {
        "LPUSH"
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_string(message)?;
        let mut con = self
            .client
            .connection()
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        redis::cmd(push_command(message.priority))
            .arg(&self.queue_key)
            .arg(payload)
            .query_async::<()>(&mut con)
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        debug!("Published task {} to {}", message.task_id, self.queue_key);
        Ok(())
    }

    async fn consume(&self, node_id: &str) -> Result<Option<Delivery>, QueueError> {
        let processing = self.processing_key(node_id);
        let mut con = self
            .client
            .blocking_connection(CONSUME_BLOCK)
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;
        let payload: Option<String> = redis::cmd("BLMOVE")
            .arg(&self.queue_key)
            .arg(&processing)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(CONSUME_BLOCK.as_secs_f64())
            .query_async(&mut con)
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<QueueMessage>(&payload) {
            Ok(message) => Ok(Some(Delivery {
                message,
                receipt: payload,
            })),
            Err(e) => {
                warn!("Dropping undecodable queue message: {}", e);
                redis::cmd("LREM")
                    .arg(&processing)
                    .arg(1)
                    .arg(&payload)
                    .query_async::<()>(&mut con)
                    .await
                    .map_err(|e| QueueError::Ack(e.to_string()))?;
                Err(QueueError::Serialization(e))
            }
        }
    }

    async fn ack(&self, node_id: &str, delivery: &Delivery) -> Result<(), QueueError> {
        let mut con = self
            .client
            .connection()
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))?;
        redis::cmd("LREM")
            .arg(self.processing_key(node_id))
            .arg(1)
            .arg(&delivery.receipt)
            .query_async::<()>(&mut con)
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))?;
        Ok(())
    }

    async fn requeue_unacked(&self, node_id: &str) -> Result<usize, QueueError> {
        let processing = self.processing_key(node_id);
        let mut con = self
            .client
            .connection()
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        let mut moved = 0;
        loop {
            let payload: Option<String> = redis::cmd("LMOVE")
                .arg(&processing)
                .arg(&self.queue_key)
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut con)
                .await
                .map_err(|e| QueueError::Publish(e.to_string()))?;
            if payload.is_none() {
                break;
            }
            moved += 1;
        }
        Ok(moved)
    }
}
