// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::CacheSettings;
use crate::domain::models::llm::AgentResult;
use crate::domain::models::scrape_outcome::ScrapeResult;
use crate::domain::models::scrape_params::ScrapeParams;
use crate::infrastructure::cache::cache_store::CacheStore;
use crate::infrastructure::metrics;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

const RENDER_KEYSPACE: &str = "render";
const EXTRACTION_KEYSPACE: &str = "extraction";

/// 缓存服务
///
/// 在同一个存储上提供两个互不相交的键空间：渲染缓存与提取缓存。
/// 存取失败只记录日志，对调用方表现为未命中。
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
}

impl CacheService {
    /// 创建缓存服务
    ///
    /// # 参数
    ///
    /// * `store` - 底层键值存储
    /// * `settings` - 缓存配置
    pub fn new(store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self { store, settings }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// 渲染缓存键
    ///
    /// 由 URL 和剔除 AI 字段后的参数决定
    pub fn render_key(url: &str, params: &ScrapeParams) -> String {
        let input = json!({ "url": url, "params": params.render_fields() });
        format!("html:{}", hash_json(&input))
    }

    /// 提取缓存键
    ///
    /// 由内容哈希、模型ID和提示词对决定
    pub fn extraction_key(
        content_hash: &str,
        model_id: &str,
        user_prompt: &str,
        system_prompt: Option<&str>,
    ) -> String {
        let input = json!({
            "content_hash": content_hash,
            "model_id": model_id,
            "prompt": user_prompt,
            "system_prompt": system_prompt,
        });
        format!("llm:{}", hash_json(&input))
    }

    /// 规范化文本内容的哈希
    pub fn content_hash(content: &str) -> String {
        hex::encode(Sha256::digest(content.as_bytes()))
    }

    /// 读取渲染缓存
    pub async fn get_render(&self, url: &str, params: &ScrapeParams) -> Option<ScrapeResult> {
        let hit = self.get(&Self::render_key(url, params)).await;
        metrics::record_cache_lookup(RENDER_KEYSPACE, hit.is_some());
        hit
    }

    /// 写入渲染缓存
    pub async fn set_render(
        &self,
        url: &str,
        params: &ScrapeParams,
        result: &ScrapeResult,
        ttl: Option<u64>,
    ) -> bool {
        self.set(&Self::render_key(url, params), result, ttl).await
    }

    /// 读取提取缓存
    pub async fn get_extraction(&self, key: &str) -> Option<AgentResult> {
        let hit = self.get(key).await;
        metrics::record_cache_lookup(EXTRACTION_KEYSPACE, hit.is_some());
        hit
    }

    /// 写入提取缓存
    pub async fn set_extraction(&self, key: &str, result: &AgentResult, ttl: Option<u64>) -> bool {
        self.set(key, result, ttl).await
    }

    /// 读取并反序列化
    ///
    /// 缓存关闭、未命中、存储错误或反序列化失败都返回 `None`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.settings.enabled {
            return None;
        }

        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Cache entry {} could not be decoded: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache get failed for {}: {}", key, e);
                None
            }
        }
    }

    /// 序列化并写入，`ttl` 为空时使用默认过期时间
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        if !self.settings.enabled {
            return false;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache value for {} could not be encoded: {}", key, e);
                return false;
            }
        };

        let ttl = ttl.unwrap_or(self.settings.default_ttl_secs);
        match self.store.setex(key, ttl, &raw).await {
            Ok(()) => {
                debug!("Cache set: {} (ttl {}s)", key, ttl);
                true
            }
            Err(e) => {
                warn!("Cache set failed for {}: {}", key, e);
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache delete failed for {}: {}", key, e);
                false
            }
        }
    }

    /// 清空渲染缓存与提取缓存
    pub async fn clear(&self) -> bool {
        match self.store.flushdb().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache clear failed: {}", e);
                false
            }
        }
    }
}

/// 键排序后的 JSON 文本的 SHA-256
fn hash_json(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
