// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use scrapeflow::domain::models::scrape_outcome::{
    PageMetadata, ScrapeFailure, ScrapeOutcome, ScrapeResult, BLOCK_SEPARATOR,
};
use scrapeflow::domain::models::scrape_params::ScrapeParams;
use scrapeflow::domain::models::task::TaskError;
use scrapeflow::engines::traits::ScraperEngine;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// 不启动浏览器的抓取引擎
///
/// 每次调用都视为一次导航；可以让指定 URL 失败，或在放行前一直阻塞
#[derive(Default)]
pub struct MockScraperEngine {
    navigations: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    gate: Option<Semaphore>,
}

impl MockScraperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 导航会一直阻塞直到 `release` 被调用
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_on(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn recover(&self, url: &str) {
        self.failing.lock().remove(url);
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

fn metadata(url: &str) -> PageMetadata {
    PageMetadata {
        title: Some("Catalog".into()),
        url: url.into(),
        actual_url: Some(url.into()),
        status_code: Some(200),
        load_time: 0.05,
        timestamp: Utc::now().into(),
    }
}

#[async_trait]
impl ScraperEngine for MockScraperEngine {
    async fn scrape(&self, url: &str, _params: &ScrapeParams, _node_id: &str) -> ScrapeOutcome {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }

        if self.failing.lock().contains(url) {
            return ScrapeOutcome::Failed(ScrapeFailure {
                error: TaskError::with_kind("net::ERR_NAME_NOT_RESOLVED", "NavigationError"),
                metadata: metadata(url),
                intercepted_apis: BTreeMap::new(),
            });
        }

        let visual_content = ["Widget | $5", "Gadget | $7", "Gizmo | $9"].join(BLOCK_SEPARATOR);
        ScrapeOutcome::Success(Box::new(ScrapeResult {
            html: "<html><body><ul><li>Widget</li></ul></body></html>".into(),
            screenshot: None,
            metadata: metadata(url),
            intercepted_apis: BTreeMap::new(),
            skill_results: BTreeMap::new(),
            visual_content,
            visual_extraction_failed: false,
            agent_result: None,
            html_cached: false,
            agent_cached: false,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
