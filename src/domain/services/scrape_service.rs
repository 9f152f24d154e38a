// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::llm::AgentResult;
use crate::domain::models::scrape_outcome::{ScrapeOutcome, ScrapeResult};
use crate::domain::models::scrape_params::{ProxyConfig, ScrapeParams, WaitUntil};
use crate::domain::models::task::CacheConfig;
use crate::domain::services::extraction_service::{ExtractionRequest, ExtractionService};
use crate::engines::skills::SkillEngine;
use crate::engines::traits::ScraperEngine;
use crate::infrastructure::cache::cache_service::CacheService;
use std::sync::Arc;
use tracing::{debug, info};

/// 代理连通性检测的导航超时（毫秒）
pub const PROXY_CHECK_TIMEOUT_MS: u64 = 15_000;

/// 抓取服务
///
/// 在抓取引擎之上叠加渲染缓存和 AI 提取
#[derive(Clone)]
pub struct ScrapeService {
    engine: Arc<dyn ScraperEngine>,
    extraction: ExtractionService,
    skills: SkillEngine,
    cache: CacheService,
}

impl ScrapeService {
    /// 创建抓取服务
    ///
    /// # 参数
    ///
    /// * `engine` - 抓取引擎
    /// * `extraction` - AI 提取服务
    /// * `skills` - 技能引擎，用于生成提示词中的技能描述
    /// * `cache` - 缓存服务
    pub fn new(
        engine: Arc<dyn ScraperEngine>,
        extraction: ExtractionService,
        skills: SkillEngine,
        cache: CacheService,
    ) -> Self {
        Self {
            engine,
            extraction,
            skills,
            cache,
        }
    }

    /// 从渲染缓存完成任务
    ///
    /// 命中时不做导航，只在需要时重新执行 AI 提取（提取本身仍走提取缓存）
    ///
    /// # 返回值
    ///
    /// 命中时返回 `html_cached = true` 的结果，缓存关闭或未命中时返回 `None`
    pub async fn complete_from_cache(
        &self,
        url: &str,
        params: &ScrapeParams,
        cache: &CacheConfig,
    ) -> Option<ScrapeResult> {
        if !cache.enabled {
            return None;
        }
        let mut result = self.cache.get_render(url, params).await?;
        info!("Render cache hit for {}", url);
        result.html_cached = true;

        if params.agent_requested() {
            let agent = self.run_agent(&result, params, cache).await;
            result.agent_cached = agent.cached;
            result.agent_result = Some(agent);
        }
        Some(result)
    }

    /// 执行完整抓取
    ///
    /// 抓取成功后按需执行 AI 提取；缓存开启、视觉提取成功且 AI 提取未失败时
    /// 写入渲染缓存
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `params` - 抓取参数
    /// * `node_id` - 执行节点
    /// * `cache` - 任务的缓存策略
    pub async fn scrape(
        &self,
        url: &str,
        params: &ScrapeParams,
        node_id: &str,
        cache: &CacheConfig,
    ) -> ScrapeOutcome {
        let mut result = match self.engine.scrape(url, params, node_id).await {
            ScrapeOutcome::Success(result) => result,
            failed => return failed,
        };

        if params.agent_requested() {
            let agent = self.run_agent(&result, params, cache).await;
            result.agent_cached = agent.cached;
            result.agent_result = Some(agent);
        }

        let agent_failed = result
            .agent_result
            .as_ref()
            .is_some_and(AgentResult::is_failed);
        if cache.enabled && !result.visual_extraction_failed && !agent_failed {
            self.cache
                .set_render(url, params, &result.render_only(), cache.ttl)
                .await;
        } else {
            debug!("Skipping render cache for {}", url);
        }

        ScrapeOutcome::Success(result)
    }

    /// 通过代理做一次短超时的抓取，用于检测代理连通性
    pub async fn test_proxy(&self, proxy: ProxyConfig, url: &str, node_id: &str) -> ScrapeOutcome {
        let params = ScrapeParams {
            proxy: Some(proxy),
            timeout: PROXY_CHECK_TIMEOUT_MS,
            wait_for: WaitUntil::DomContentLoaded,
            wait_time: 0,
            ..Default::default()
        };
        self.engine.scrape(url, &params, node_id).await
    }

    async fn run_agent(
        &self,
        result: &ScrapeResult,
        params: &ScrapeParams,
        cache: &CacheConfig,
    ) -> AgentResult {
        let request = ExtractionRequest {
            content: result.agent_content(),
            screenshot: result.screenshot.clone(),
            user_prompt: params.agent_prompt.clone().unwrap_or_default(),
            system_prompt: params.agent_system_prompt.clone(),
            model_id: params.agent_model_id.clone().unwrap_or_default(),
            skills: self.skills.describe(&params.interaction_steps).await,
            parallel_batch_size: params
                .agent_parallel_enabled
                .then(|| params.agent_parallel_batch_size.max(1)),
            use_cache: cache.enabled,
            cache_ttl: cache.ttl,
        };
        self.extraction.extract(&request).await
    }
}
