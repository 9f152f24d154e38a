// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ScraperSettings;
use crate::domain::models::scrape_outcome::{
    PageMetadata, ScrapeFailure, ScrapeOutcome, ScrapeResult,
};
use crate::domain::models::scrape_params::{ScrapeParams, WaitUntil};
use crate::domain::models::task::TaskError;
use crate::engines::browser_manager::{BrowserManager, ContextOptions};
use crate::engines::interception::{InterceptRules, Interception};
use crate::engines::skills::SkillEngine;
use crate::engines::traits::{EngineError, ScraperEngine};
use crate::engines::visual_extractor::{self, EXTRACTION_FAILED_TEXT};
use crate::infrastructure::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 导航超时后仍视为可用的最小页面长度
const MIN_PARTIAL_CONTENT_LEN: usize = 200;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// 资源数量保持不变多久视为网络空闲
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

const STATUS_CODE_JS: &str = "(() => { const nav = performance.getEntriesByType('navigation')[0]; return nav && nav.responseStatus ? nav.responseStatus : 200; })()";
const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

/// 执行页面脚本并按值返回结果
///
/// 返回 Promise 的表达式会等待其完成
pub(crate) async fn evaluate(page: &Page, expression: &str) -> Result<Value, EngineError> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(EngineError::Script)?;
    let result = page
        .evaluate_expression(params)
        .await
        .map_err(|e| EngineError::Script(e.to_string()))?;
    Ok(result.value().cloned().unwrap_or(Value::Null))
}

async fn settle_network(page: &Page) -> Result<(), EngineError> {
    let mut last_count = evaluate(page, RESOURCE_COUNT_JS).await?;
    let mut quiet_since = tokio::time::Instant::now();
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let count = evaluate(page, RESOURCE_COUNT_JS).await?;
        if count != last_count {
            last_count = count;
            quiet_since = tokio::time::Instant::now();
        } else if quiet_since.elapsed() >= NETWORK_QUIET_WINDOW {
            return Ok(());
        }
    }
}

/// 尽力等待网络空闲，超时或出错都直接返回
pub(crate) async fn wait_for_network_idle(page: &Page, timeout: Duration) {
    match tokio::time::timeout(timeout, settle_network(page)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Network idle check failed: {}", e),
        Err(_) => debug!("Network did not go idle within {:?}", timeout),
    }
}

async fn wait_for_ready_state(page: &Page, wait_for: WaitUntil) -> Result<(), EngineError> {
    loop {
        let state = evaluate(page, "document.readyState").await?;
        let ready = match (wait_for, state.as_str()) {
            (WaitUntil::DomContentLoaded, Some("interactive" | "complete")) => true,
            (_, Some("complete")) => true,
            _ => false,
        };
        if ready {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    if wait_for == WaitUntil::NetworkIdle {
        settle_network(page).await?;
    }
    Ok(())
}

/// 浏览器抓取引擎
///
/// 每次抓取使用一个独立的浏览器上下文，结束后总会释放
pub struct BrowserEngine {
    manager: Arc<BrowserManager>,
    skills: SkillEngine,
    settings: ScraperSettings,
}

impl BrowserEngine {
    /// 创建浏览器抓取引擎
    ///
    /// # 参数
    ///
    /// * `manager` - 浏览器资源管理器
    /// * `skills` - 技能执行引擎
    /// * `settings` - 抓取配置
    pub fn new(manager: Arc<BrowserManager>, skills: SkillEngine, settings: ScraperSettings) -> Self {
        Self {
            manager,
            skills,
            settings,
        }
    }

    fn context_options(&self, params: &ScrapeParams) -> ContextOptions {
        ContextOptions {
            user_agent: params
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| self.settings.user_agent.clone()),
            proxy_server: params.proxy.as_ref().map(|p| p.server.clone()),
            viewport: params.viewport,
            stealth: params.stealth,
        }
    }

    async fn navigate(&self, page: &Page, url: &str, params: &ScrapeParams) -> Result<(), EngineError> {
        let navigation = tokio::time::timeout(Duration::from_millis(params.timeout), async {
            let response = page.execute(NavigateParams::new(url)).await?;
            if let Some(error) = response.result.error_text.clone() {
                return Err(EngineError::Navigation(error));
            }
            wait_for_ready_state(page, params.wait_for).await
        })
        .await;

        match navigation {
            Ok(result) => result,
            Err(_) => {
                let partial = page.content().await.map(|c| c.len()).unwrap_or(0);
                if partial > MIN_PARTIAL_CONTENT_LEN {
                    warn!(
                        "Navigation to {} timed out after {}ms, continuing with partial content",
                        url, params.timeout
                    );
                    Ok(())
                } else {
                    Err(EngineError::Timeout(format!(
                        "Navigation to {} timed out after {}ms",
                        url, params.timeout
                    )))
                }
            }
        }
    }

    async fn wait_for_selector(&self, page: &Page, selector: &str, timeout_ms: u64) {
        let script = format!("document.querySelector({}) !== null", serde_json::json!(selector));
        let found = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            loop {
                if let Ok(Value::Bool(true)) = evaluate(page, &script).await {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        if found.is_err() {
            warn!("Selector {} did not appear within {}ms", selector, timeout_ms);
        }
    }

    async fn screenshot(&self, page: &Page, full_page: bool) -> Option<String> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        match page.screenshot(params).await {
            Ok(bytes) => Some(BASE64.encode(bytes)),
            Err(e) => {
                warn!("Screenshot failed: {}", e);
                None
            }
        }
    }

    async fn run(
        &self,
        page: &Page,
        url: &str,
        params: &ScrapeParams,
        started: Instant,
        interception: &mut Interception,
    ) -> Result<ScrapeResult, EngineError> {
        *interception = Interception::install(page, InterceptRules::from_params(params)).await?;

        self.navigate(page, url, params).await?;

        if let Some(selector) = params.wait_for_selector.as_deref().filter(|s| !s.trim().is_empty()) {
            self.wait_for_selector(page, selector, params.timeout).await;
        }
        if params.wait_time > 0 {
            tokio::time::sleep(Duration::from_millis(params.wait_time)).await;
        }

        let skill_results = self.skills.run_steps(page, &params.interaction_steps).await;
        if params.interaction_steps.iter().any(|step| !step.is_scoping()) {
            wait_for_network_idle(
                page,
                Duration::from_millis(self.settings.network_idle_timeout_ms),
            )
            .await;
        }

        let html = page.content().await?;
        let actual_url = page.url().await?;
        let title = page.get_title().await.ok().flatten();
        let status_code = evaluate(page, STATUS_CODE_JS)
            .await
            .ok()
            .and_then(|v| v.as_i64())
            .unwrap_or(200);
        let load_time = started.elapsed().as_secs_f64();

        let screenshot = if params.screenshot {
            self.screenshot(page, params.is_fullscreen).await
        } else {
            None
        };

        let (visual_content, visual_extraction_failed) = match visual_extractor::extract(
            page,
            &params.container_selectors(),
            &params.exclude_selectors(),
        )
        .await
        {
            Ok(text) => (text, false),
            Err(e) => {
                warn!("Visual extraction failed for {}: {}", url, e);
                (format!("{}: {}", EXTRACTION_FAILED_TEXT, e), true)
            }
        };

        Ok(ScrapeResult {
            html,
            screenshot,
            metadata: PageMetadata {
                title,
                url: url.to_string(),
                actual_url,
                status_code: Some(status_code),
                load_time,
                timestamp: Utc::now().into(),
            },
            intercepted_apis: BTreeMap::new(),
            skill_results,
            visual_content,
            visual_extraction_failed,
            agent_result: None,
            html_cached: false,
            agent_cached: false,
        })
    }
}

/// 把引擎错误转换为带部分元数据的失败结果
pub fn failure_outcome(url: &str, started: Instant, error: &EngineError) -> ScrapeOutcome {
    ScrapeOutcome::Failed(ScrapeFailure {
        error: TaskError::with_kind(error.to_string(), error.kind()),
        metadata: PageMetadata {
            title: None,
            url: url.to_string(),
            actual_url: None,
            status_code: None,
            load_time: started.elapsed().as_secs_f64(),
            timestamp: Utc::now().into(),
        },
        intercepted_apis: BTreeMap::new(),
    })
}

#[async_trait]
impl ScraperEngine for BrowserEngine {
    async fn scrape(&self, url: &str, params: &ScrapeParams, node_id: &str) -> ScrapeOutcome {
        let started = Instant::now();
        info!("Scraping {} on node {}", url, node_id);

        let context = match self.manager.new_isolated_context(&self.context_options(params)).await {
            Ok(context) => context,
            Err(e) => return failure_outcome(url, started, &e),
        };

        let mut interception = Interception::default();
        let result = self
            .run(&context.page, url, params, started, &mut interception)
            .await;
        let captured = interception.captured();
        interception.stop();
        self.manager.release(context).await;
        metrics::record_scrape_duration(started.elapsed());

        match result {
            Ok(mut result) => {
                result.intercepted_apis = captured;
                ScrapeOutcome::Success(Box::new(result))
            }
            Err(e) => {
                warn!("Scrape of {} failed: {}", url, e);
                let mut outcome = failure_outcome(url, started, &e);
                if let ScrapeOutcome::Failed(failure) = &mut outcome {
                    failure.intercepted_apis = captured;
                }
                outcome
            }
        }
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
