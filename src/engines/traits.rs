// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_outcome::ScrapeOutcome;
use crate::domain::models::scrape_params::ScrapeParams;
use async_trait::async_trait;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 浏览器启动、连接或通信失败
    #[error("Browser error: {0}")]
    Browser(String),
    /// 导航失败
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 超时
    #[error("Timeout: {0}")]
    Timeout(String),
    /// 隔离上下文创建失败
    #[error("Context error: {0}")]
    Context(String),
    /// 页面脚本执行失败
    #[error("Script error: {0}")]
    Script(String),
}

impl EngineError {
    /// 写入任务错误的类型名
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Browser(_) => "BrowserError",
            EngineError::Navigation(_) => "NavigationError",
            EngineError::Timeout(_) => "TimeoutError",
            EngineError::Context(_) => "ContextError",
            EngineError::Script(_) => "ScriptError",
        }
    }
}

impl From<chromiumoxide::error::CdpError> for EngineError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        EngineError::Browser(err.to_string())
    }
}

/// 抓取引擎特质
///
/// 唯一的对外入口，生产抓取和代理连通性检测都走这里
#[async_trait]
pub trait ScraperEngine: Send + Sync {
    /// 执行抓取
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `params` - 抓取参数
    /// * `node_id` - 执行节点
    ///
    /// # 返回值
    ///
    /// 结构化的抓取结果，失败也以 `ScrapeOutcome::Failed` 返回
    async fn scrape(&self, url: &str, params: &ScrapeParams, node_id: &str) -> ScrapeOutcome;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
