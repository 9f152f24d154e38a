// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_outcome::InterceptedResponse;
use crate::domain::models::scrape_params::{ProxyConfig, ScrapeParams};
use crate::engines::traits::EngineError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams, EventAuthRequired, EventRequestPaused,
    FailRequestParams, GetResponseBodyParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 把通配符模式转换为从 URL 开头匹配的正则
///
/// 只有 `*` 是通配符，其余字符按字面匹配
pub fn pattern_to_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("^{}", body)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Invalid intercept pattern {}: {}", pattern, e);
            None
        }
    }
}

/// 请求拦截规则
#[derive(Debug, Clone, Default)]
pub struct InterceptRules {
    patterns: Vec<(String, Regex)>,
    continue_after_intercept: bool,
    block_images: bool,
    block_media: bool,
    credentials: Option<(String, String)>,
}

impl InterceptRules {
    pub fn from_params(params: &ScrapeParams) -> Self {
        Self {
            patterns: params
                .intercept_apis
                .iter()
                .filter_map(|p| pattern_to_regex(p).map(|re| (p.clone(), re)))
                .collect(),
            continue_after_intercept: params.intercept_continue,
            block_images: params.block_images,
            block_media: params.block_media,
            credentials: params.proxy.as_ref().and_then(proxy_credentials),
        }
    }

    /// 第一个匹配 URL 的原始模式
    pub fn matching_pattern(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(url))
            .map(|(pattern, _)| pattern.as_str())
    }

    /// 是否拦截该类型的资源
    ///
    /// 图片对应 `block_images`，媒体、字体和样式表对应 `block_media`
    pub fn should_block(&self, resource_type: &ResourceType) -> bool {
        match resource_type {
            ResourceType::Image => self.block_images,
            ResourceType::Media | ResourceType::Font | ResourceType::Stylesheet => {
                self.block_media
            }
            _ => false,
        }
    }

    fn blocks_resources(&self) -> bool {
        self.block_images || self.block_media
    }

    fn captures_responses(&self) -> bool {
        !self.patterns.is_empty()
    }

    /// 是否需要启用 Fetch 拦截
    pub fn is_active(&self) -> bool {
        self.blocks_resources() || self.captures_responses() || self.credentials.is_some()
    }

    fn request_patterns(&self) -> Vec<RequestPattern> {
        let mut patterns = Vec::new();
        if self.blocks_resources() || self.credentials.is_some() {
            patterns.push(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            );
        }
        if self.captures_responses() {
            patterns.push(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Response)
                    .build(),
            );
        }
        patterns
    }
}

fn proxy_credentials(proxy: &ProxyConfig) -> Option<(String, String)> {
    let username = proxy.username.clone().filter(|u| !u.is_empty())?;
    Some((username, proxy.password.clone().unwrap_or_default()))
}

type Captured = Arc<Mutex<BTreeMap<String, Vec<InterceptedResponse>>>>;

/// 已安装的拦截器
///
/// 丢弃前需调用 `stop`，否则后台任务会随页面关闭自然结束
#[derive(Default)]
pub struct Interception {
    captured: Captured,
    tasks: Vec<JoinHandle<()>>,
}

impl Interception {
    /// 在页面上安装拦截规则
    ///
    /// 规则为空时不启用 Fetch 域
    pub async fn install(page: &Page, rules: InterceptRules) -> Result<Self, EngineError> {
        let mut interception = Self::default();
        if !rules.is_active() {
            return Ok(interception);
        }

        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let rules = Arc::new(rules);

        if let Some((username, password)) = rules.credentials.clone() {
            let mut auth = page.event_listener::<EventAuthRequired>().await?;
            let auth_page = page.clone();
            interception.tasks.push(tokio::spawn(async move {
                while let Some(event) = auth.next().await {
                    let response = AuthChallengeResponse::builder()
                        .response(AuthChallengeResponseResponse::ProvideCredentials)
                        .username(username.clone())
                        .password(password.clone())
                        .build();
                    let Ok(response) = response else {
                        continue;
                    };
                    if let Err(e) = auth_page
                        .execute(ContinueWithAuthParams::new(event.request_id.clone(), response))
                        .await
                    {
                        debug!("Failed to answer proxy auth challenge: {}", e);
                    }
                }
            }));
        }

        let handler_page = page.clone();
        let captured = interception.captured.clone();
        let handler_rules = rules.clone();
        interception.tasks.push(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                handle_paused(&handler_page, &handler_rules, &captured, &event).await;
            }
        }));

        page.execute(
            EnableParams::builder()
                .patterns(rules.request_patterns())
                .handle_auth_requests(rules.credentials.is_some())
                .build(),
        )
        .await?;

        Ok(interception)
    }

    /// 已捕获的接口响应
    pub fn captured(&self) -> BTreeMap<String, Vec<InterceptedResponse>> {
        self.captured.lock().clone()
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Interception {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_paused(page: &Page, rules: &InterceptRules, captured: &Captured, event: &EventRequestPaused) {
    let id = event.request_id.clone();
    let at_response = event.response_status_code.is_some() || event.response_error_reason.is_some();

    let abort = if at_response {
        match rules.matching_pattern(&event.request.url) {
            Some(pattern) => {
                match capture_response(page, event).await {
                    Ok(response) => {
                        debug!("Intercepted {} for pattern {}", response.url, pattern);
                        captured
                            .lock()
                            .entry(pattern.to_string())
                            .or_default()
                            .push(response);
                    }
                    Err(e) => warn!("Failed to read intercepted response body: {}", e),
                }
                !rules.continue_after_intercept
            }
            None => false,
        }
    } else {
        rules.should_block(&event.resource_type)
    };

    let result = if abort {
        let reason = if at_response {
            ErrorReason::Aborted
        } else {
            ErrorReason::BlockedByClient
        };
        page.execute(FailRequestParams::new(id, reason)).await.map(|_| ())
    } else {
        page.execute(ContinueRequestParams::new(id)).await.map(|_| ())
    };

    if let Err(e) = result {
        debug!("Failed to resume request {}: {}", event.request.url, e);
    }
}

async fn capture_response(page: &Page, event: &EventRequestPaused) -> Result<InterceptedResponse, EngineError> {
    let body = page
        .execute(GetResponseBodyParams::new(event.request_id.clone()))
        .await?
        .result;

    let text = if body.base64_encoded {
        BASE64
            .decode(body.body.as_bytes())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|e| EngineError::Script(e.to_string()))?
    } else {
        body.body
    };

    let headers = event
        .response_headers
        .iter()
        .flatten()
        .map(|h| (h.name.clone(), h.value.clone()))
        .collect();

    Ok(InterceptedResponse {
        url: event.request.url.clone(),
        method: event.request.method.clone(),
        status: event.response_status_code.unwrap_or(0),
        headers,
        body: parse_body(text),
    })
}

/// 能解析为 JSON 时返回 JSON，否则返回原始文本
pub fn parse_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
