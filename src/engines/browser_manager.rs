// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::BrowserSettings;
use crate::domain::models::scrape_params::Viewport;
use crate::engines::traits::EngineError;
use crate::infrastructure::metrics;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 隐藏自动化特征的注入脚本
pub const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// 浏览器生命周期接口
///
/// 工作节点只依赖这个接口驱动空闲回收与关闭
#[async_trait]
pub trait BrowserLifecycle: Send + Sync {
    /// 空闲超时时关闭浏览器，返回是否关闭
    async fn evict_if_idle(&self) -> bool;

    /// 关闭浏览器进程
    async fn close(&self);
}

/// 单个任务的隔离上下文选项
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub user_agent: String,
    pub proxy_server: Option<String>,
    pub viewport: Viewport,
    pub stealth: bool,
}

/// 隔离的浏览器上下文及其页面
pub struct IsolatedContext {
    pub page: Page,
    pub context_id: BrowserContextId,
}

struct RunningBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

/// 浏览器资源管理器
///
/// 持有共享的浏览器进程，按需懒启动，空闲超时后关闭，下次使用时重新启动
pub struct BrowserManager {
    settings: BrowserSettings,
    running: Mutex<Option<RunningBrowser>>,
    last_used: parking_lot::Mutex<Instant>,
    active_contexts: AtomicUsize,
    launches: AtomicUsize,
}

/// 是否应当回收浏览器
///
/// 仍有上下文在使用时从不回收
pub fn should_evict(last_used: Instant, now: Instant, idle_timeout: Duration, active: usize) -> bool {
    active == 0 && now.saturating_duration_since(last_used) >= idle_timeout
}

impl BrowserManager {
    /// 创建管理器，不会立即启动浏览器
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(None),
            last_used: parking_lot::Mutex::new(Instant::now()),
            active_contexts: AtomicUsize::new(0),
            launches: AtomicUsize::new(0),
        }
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    /// 获取共享的浏览器句柄
    ///
    /// 首次调用或被回收后会启动（或连接）浏览器
    pub async fn acquire(&self) -> Result<Arc<Browser>, EngineError> {
        let mut running = self.running.lock().await;
        self.touch();

        if let Some(current) = running.as_ref() {
            if !current.handler.is_finished() {
                return Ok(current.browser.clone());
            }
            warn!("Browser event loop has exited, relaunching");
        }

        let (browser, mut handler) = match &self.settings.remote_debugging_url {
            Some(url) => {
                info!("Connecting to remote Chrome instance at: {}", url);
                Browser::connect(url)
                    .await
                    .map_err(|e| EngineError::Browser(format!("Failed to connect to remote Chrome: {}", e)))?
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(Duration::from_secs(self.settings.request_timeout_secs))
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage");
                if !self.settings.headless {
                    builder = builder.with_head();
                }
                let config = builder.build().map_err(EngineError::Browser)?;
                Browser::launch(config).await?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        if self.launches.fetch_add(1, Ordering::SeqCst) > 0 {
            metrics::record_browser_restart();
        }
        info!("Browser started");

        let browser = Arc::new(browser);
        *running = Some(RunningBrowser {
            browser: browser.clone(),
            handler,
        });
        Ok(browser)
    }

    /// 为单个任务创建隔离上下文
    ///
    /// 用户代理、代理和视口只作用于该上下文，创建失败只影响当前任务
    ///
    /// # 参数
    ///
    /// * `options` - 上下文选项
    pub async fn new_isolated_context(
        &self,
        options: &ContextOptions,
    ) -> Result<IsolatedContext, EngineError> {
        let browser = self.acquire().await?;

        let mut context_params = CreateBrowserContextParams::builder().dispose_on_detach(true);
        if let Some(proxy) = &options.proxy_server {
            context_params = context_params.proxy_server(proxy.clone());
        }
        let context_id = browser
            .execute(context_params.build())
            .await
            .map_err(|e| EngineError::Context(e.to_string()))?
            .result
            .browser_context_id;

        self.active_contexts.fetch_add(1, Ordering::SeqCst);
        let context = IsolatedContext {
            page: match self.open_page(&browser, &context_id, options).await {
                Ok(page) => page,
                Err(e) => {
                    self.dispose(&browser, context_id).await;
                    return Err(e);
                }
            },
            context_id,
        };
        debug!("Opened isolated context {:?}", context.context_id);
        Ok(context)
    }

    async fn open_page(
        &self,
        browser: &Browser,
        context_id: &BrowserContextId,
        options: &ContextOptions,
    ) -> Result<Page, EngineError> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(EngineError::Context)?;
        let page = browser
            .new_page(target)
            .await
            .map_err(|e| EngineError::Context(e.to_string()))?;

        page.set_user_agent(options.user_agent.as_str())
            .await
            .map_err(|e| EngineError::Context(e.to_string()))?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            options.viewport.width as i64,
            options.viewport.height as i64,
            1.0,
            false,
        ))
        .await
        .map_err(|e| EngineError::Context(e.to_string()))?;

        if options.stealth {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                .await
                .map_err(|e| EngineError::Context(e.to_string()))?;
        }
        Ok(page)
    }

    /// 释放上下文，错误只记录日志
    pub async fn release(&self, context: IsolatedContext) {
        let IsolatedContext { page, context_id } = context;
        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }

        let browser = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| running.browser.clone());
        if let Some(browser) = browser {
            self.dispose(&browser, context_id).await;
        } else {
            self.active_contexts.fetch_sub(1, Ordering::SeqCst);
        }
        self.touch();
    }

    async fn dispose(&self, browser: &Browser, context_id: BrowserContextId) {
        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            debug!("Failed to dispose browser context: {}", e);
        }
        self.active_contexts.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active_contexts(&self) -> usize {
        self.active_contexts.load(Ordering::SeqCst)
    }

    async fn shutdown(&self, running: RunningBrowser) {
        // 远程实例只断开连接
        if self.settings.remote_debugging_url.is_none() {
            if let Err(e) = running.browser.execute(CloseParams::default()).await {
                debug!("Browser close command failed: {}", e);
            }
        }
        running.handler.abort();
    }
}

#[async_trait]
impl BrowserLifecycle for BrowserManager {
    async fn evict_if_idle(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_none() {
            return false;
        }

        let idle_timeout = Duration::from_secs(self.settings.idle_timeout_secs);
        let last_used = *self.last_used.lock();
        if !should_evict(last_used, Instant::now(), idle_timeout, self.active_contexts()) {
            return false;
        }

        if let Some(current) = running.take() {
            info!(
                "Browser idle for more than {}s, closing",
                self.settings.idle_timeout_secs
            );
            self.shutdown(current).await;
        }
        true
    }

    async fn close(&self) {
        if let Some(current) = self.running.lock().await.take() {
            info!("Closing browser");
            self.shutdown(current).await;
        }
    }
}
