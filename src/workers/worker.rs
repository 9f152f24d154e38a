// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use async_trait::async_trait;

/// Worker trait定义
///
/// 由工作管理器驱动的后台工作器
#[async_trait]
pub trait Worker: Send + Sync {
    /// 运行工作器，直到 `stop` 被调用后返回
    async fn run(&self) -> Result<(), WorkerError>;

    /// 停止工作器并回收其持有的任务与资源
    async fn stop(&self);

    /// 获取工作器名称
    fn name(&self) -> &str;
}
