// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 缓存层错误类型
///
/// 只在缓存存储内部流转，缓存服务对外一律视为未命中
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Store(err.to_string())
    }
}

/// LLM 调用错误类型
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model is disabled: {0}")]
    ModelDisabled(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider request timed out after {0}s")]
    Timeout(u64),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid model configuration: {0}")]
    Config(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Repository error: {0}")]
    Repository(#[from] crate::domain::repositories::task_repository::RepositoryError),

    #[error("Queue error: {0}")]
    Queue(#[from] crate::queue::task_queue::QueueError),

    #[error("Engine error: {0}")]
    Engine(#[from] crate::engines::traits::EngineError),
}
