// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LlmSettings;
use crate::domain::models::llm::{
    AgentResult, AgentStatus, ChunkInfo, ModelConfig, ParallelInfo, TokenUsage,
};
use crate::domain::models::scrape_outcome::BLOCK_SEPARATOR;
use crate::domain::repositories::model_config_repository::ModelConfigRepository;
use crate::domain::services::llm_service::{AgentInput, LlmAgent};
use crate::infrastructure::cache::cache_service::CacheService;
use crate::infrastructure::llm::{ChatProvider, ProviderFactory};
use crate::utils::errors::LlmError;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// 提取请求
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub content: String,
    pub screenshot: Option<String>,
    pub user_prompt: String,
    pub system_prompt: Option<String>,
    pub model_id: String,
    /// 抓取时用到的技能描述
    pub skills: Vec<String>,
    /// 设置时按该批大小分块并行提取
    pub parallel_batch_size: Option<usize>,
    /// 是否读写提取缓存
    pub use_cache: bool,
    pub cache_ttl: Option<u64>,
}

/// LLM 提取编排服务
///
/// 负责模型解析、提取缓存和分块并行提取
#[derive(Clone)]
pub struct ExtractionService {
    models: Arc<dyn ModelConfigRepository>,
    providers: Arc<dyn ProviderFactory>,
    cache: CacheService,
    agent: LlmAgent,
    settings: LlmSettings,
}

impl ExtractionService {
    /// 创建提取服务
    ///
    /// # 参数
    ///
    /// * `models` - 模型配置仓库
    /// * `providers` - 供应商工厂
    /// * `cache` - 缓存服务
    /// * `settings` - LLM 配置
    pub fn new(
        models: Arc<dyn ModelConfigRepository>,
        providers: Arc<dyn ProviderFactory>,
        cache: CacheService,
        settings: LlmSettings,
    ) -> Self {
        Self {
            models,
            providers,
            cache,
            agent: LlmAgent::new(settings.clone()),
            settings,
        }
    }

    /// 执行一次提取
    ///
    /// 模型不存在或被禁用时立即返回失败结果，不会调用供应商
    pub async fn extract(&self, request: &ExtractionRequest) -> AgentResult {
        let pending = || {
            AgentResult::pending(
                &request.model_id,
                &request.user_prompt,
                request.system_prompt.as_deref(),
            )
        };

        let model = match self.resolve_model(&request.model_id).await {
            Ok(model) => model,
            Err(e) => {
                warn!("Cannot run extraction: {}", e);
                return pending().fail(e.to_string());
            }
        };

        let provider = match self.providers.provider_for(&model) {
            Ok(provider) => provider,
            Err(e) => {
                warn!("Cannot create provider for model {}: {}", model.id, e);
                let mut result = pending().fail(e.to_string());
                result.model_name = Some(model.name);
                return result;
            }
        };

        let chunks = request
            .parallel_batch_size
            .map(|size| (size, split_chunks(&request.content, size)))
            .filter(|(_, chunks)| !chunks.is_empty());

        match chunks {
            Some((batch_size, chunks)) => {
                self.extract_parallel(&model, provider, request, chunks, batch_size)
                    .await
            }
            None => {
                self.extract_cached(
                    &model,
                    provider.as_ref(),
                    request,
                    &request.content,
                    request.screenshot.as_deref(),
                )
                .await
            }
        }
    }

    async fn resolve_model(&self, model_id: &str) -> Result<ModelConfig, LlmError> {
        let model = self
            .models
            .find_by_id(model_id)
            .await
            .map_err(|e| LlmError::Repository(e.to_string()))?
            .ok_or_else(|| LlmError::ModelNotFound(model_id.to_string()))?;

        if !model.is_enabled {
            return Err(LlmError::ModelDisabled(model_id.to_string()));
        }
        Ok(model)
    }

    /// 先查提取缓存，未命中再调用模型；只缓存成功的结果
    async fn extract_cached(
        &self,
        model: &ModelConfig,
        provider: &dyn ChatProvider,
        request: &ExtractionRequest,
        content: &str,
        screenshot: Option<&str>,
    ) -> AgentResult {
        let key = CacheService::extraction_key(
            &CacheService::content_hash(content),
            &model.id,
            &request.user_prompt,
            request.system_prompt.as_deref(),
        );

        if request.use_cache {
            if let Some(mut hit) = self.cache.get_extraction(&key).await {
                debug!("Extraction cache hit for model {}", model.id);
                hit.cached = true;
                return hit;
            }
        }

        let result = self
            .agent
            .run(
                model,
                provider,
                AgentInput {
                    content,
                    screenshot,
                    user_prompt: &request.user_prompt,
                    system_prompt: request.system_prompt.as_deref(),
                    skills: &request.skills,
                },
            )
            .await;

        if request.use_cache && result.status == AgentStatus::Success {
            self.cache
                .set_extraction(&key, &result, request.cache_ttl)
                .await;
        }
        result
    }

    async fn extract_parallel(
        &self,
        model: &ModelConfig,
        provider: Arc<dyn ChatProvider>,
        request: &ExtractionRequest,
        chunks: Vec<String>,
        batch_size: usize,
    ) -> AgentResult {
        info!(
            "Parallel extraction with model {}: {} chunks of up to {} items",
            model.id,
            chunks.len(),
            batch_size
        );

        let provider = provider.as_ref();
        let limit = Semaphore::new(self.settings.max_parallel_chunks.max(1));
        let limit = &limit;
        // join_all 按输入顺序返回结果
        let results = join_all(chunks.iter().map(|chunk| async move {
            let _permit = limit.acquire().await;
            self.extract_cached(model, provider, request, chunk, None)
                .await
        }))
        .await;

        merge_chunk_results(model, request, results, batch_size)
    }
}

/// 把视觉内容切成若干批
///
/// 优先按容器分隔符切分，只有一段时按行切分
pub fn split_chunks(content: &str, batch_size: usize) -> Vec<String> {
    let mut items: Vec<&str> = content
        .split(BLOCK_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();
    let joiner = if items.len() > 1 {
        BLOCK_SEPARATOR
    } else {
        items = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        "\n"
    };

    items
        .chunks(batch_size.max(1))
        .map(|batch| batch.join(joiner))
        .collect()
}

/// 合并各分块的提取结果
///
/// 记录按分块顺序拼接，用量求和，耗时取最大值；
/// 只有全部分块失败时整体才算失败
pub fn merge_chunk_results(
    model: &ModelConfig,
    request: &ExtractionRequest,
    results: Vec<AgentResult>,
    batch_size: usize,
) -> AgentResult {
    let mut merged = AgentResult::pending(
        &model.id,
        &request.user_prompt,
        request.system_prompt.as_deref(),
    );
    merged.model_name = Some(model.name.clone());

    let mut items = Vec::new();
    let mut usage = TokenUsage::default();
    let mut processing_time: f64 = 0.0;
    let mut chunk_infos = Vec::with_capacity(results.len());
    let mut last_error = None;

    for (index, result) in results.into_iter().enumerate() {
        usage += result.usage;
        processing_time = processing_time.max(result.processing_time);

        let item_count = result.extracted_items.as_ref().map_or(0, Vec::len);
        if result.status == AgentStatus::Success {
            items.extend(result.extracted_items.unwrap_or_default());
        } else {
            last_error = result.error.clone();
        }

        chunk_infos.push(ChunkInfo {
            index,
            status: result.status,
            item_count,
            cached: result.cached,
            error: result.error,
        });
    }

    let total_chunks = chunk_infos.len();
    let cache_hits = chunk_infos.iter().filter(|c| c.cached).count();
    let all_failed = total_chunks > 0
        && chunk_infos
            .iter()
            .all(|c| c.status == AgentStatus::Failed);

    merged.extracted_items = Some(items);
    merged.usage = usage;
    merged.processing_time = processing_time;
    merged.cached = total_chunks > 0 && cache_hits == total_chunks;
    merged.parallel_info = Some(ParallelInfo {
        total_chunks,
        batch_size,
        cache_hits,
        chunks: chunk_infos,
    });

    if all_failed {
        let reason = last_error.unwrap_or_else(|| "unknown error".to_string());
        merged.fail(format!("All {} chunks failed: {}", total_chunks, reason))
    } else {
        merged.status = AgentStatus::Success;
        merged.completed_at = Some(Utc::now().into());
        merged
    }
}
