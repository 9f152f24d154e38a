// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::QueueMessage;
use crate::queue::task_queue::{Delivery, QueueError, TaskQueue};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

const CONSUME_WAIT: Duration = Duration::from_secs(1);

/// 进程内任务队列
///
/// 用于测试和单进程运行，语义与 Redis 队列一致
#[derive(Default)]
pub struct InMemoryTaskQueue {
    ready: Mutex<VecDeque<QueueMessage>>,
    notify: Notify,
    /// receipt -> (node_id, message)
    unacked: DashMap<String, (String, QueueMessage)>,
    fail_publish: AtomicBool,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的投递全部失败，用于模拟消息中间件故障
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// 等待出队的消息数
    pub fn len(&self) -> usize {
        self.ready.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已出队未确认的消息数
    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    fn pop(&self) -> Option<QueueMessage> {
        self.ready.lock().pop_front()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(QueueError::Publish("broker unavailable".into()));
        }
        {
            let mut ready = self.ready.lock();
            if message.priority > 1 {
                ready.push_front(message.clone());
            } else {
                ready.push_back(message.clone());
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn consume(&self, node_id: &str) -> Result<Option<Delivery>, QueueError> {
        let message = match self.pop() {
            Some(message) => Some(message),
            None => {
                let _ = tokio::time::timeout(CONSUME_WAIT, self.notify.notified()).await;
                self.pop()
            }
        };

        Ok(message.map(|message| {
            let receipt = Uuid::new_v4().to_string();
            self.unacked
                .insert(receipt.clone(), (node_id.to_string(), message.clone()));
            Delivery { message, receipt }
        }))
    }

    async fn ack(&self, _node_id: &str, delivery: &Delivery) -> Result<(), QueueError> {
        self.unacked.remove(&delivery.receipt);
        Ok(())
    }

    async fn requeue_unacked(&self, node_id: &str) -> Result<usize, QueueError> {
        let receipts: Vec<String> = self
            .unacked
            .iter()
            .filter(|entry| entry.value().0 == node_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut moved = 0;
        for receipt in receipts {
            if let Some((_, (_, message))) = self.unacked.remove(&receipt) {
                self.ready.lock().push_front(message);
                moved += 1;
            }
        }
        if moved > 0 {
            self.notify.notify_waiters();
        }
        Ok(moved)
    }
}
