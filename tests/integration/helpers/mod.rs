// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 集成测试共享的节点装配与模拟组件

pub mod fake_redis;
pub mod mock_engine;
pub mod mock_provider;

pub use fake_redis::FakeRedis;
pub use mock_engine::MockScraperEngine;
pub use mock_provider::{MockChatProvider, MockProviderFactory};

use scrapeflow::application::usecases::submit_task::TaskSubmitter;
use scrapeflow::config::settings::{CacheSettings, LlmSettings, SubmitSettings, WorkerSettings};
use scrapeflow::domain::models::llm::{ModelConfig, ProviderKind};
use scrapeflow::domain::repositories::node_repository::NodeRepository;
use scrapeflow::domain::repositories::task_repository::TaskRepository;
use scrapeflow::domain::services::extraction_service::ExtractionService;
use scrapeflow::domain::services::scrape_service::ScrapeService;
use scrapeflow::engines::browser_manager::BrowserLifecycle;
use scrapeflow::engines::skills::SkillEngine;
use scrapeflow::infrastructure::cache::cache_service::CacheService;
use scrapeflow::infrastructure::cache::cache_store::{CacheStore, MemoryCacheStore};
use scrapeflow::infrastructure::repositories::memory::{
    InMemoryModelConfigRepository, InMemoryNodeRepository, InMemorySkillRepository,
    InMemoryTaskRepository,
};
use scrapeflow::queue::memory_queue::InMemoryTaskQueue;
use scrapeflow::utils::errors::WorkerError;
use scrapeflow::workers::scrape_worker::ScrapeWorker;
use scrapeflow::workers::Worker;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const MODEL_ID: &str = "model-1";

pub fn model_config() -> ModelConfig {
    ModelConfig {
        id: MODEL_ID.into(),
        name: "Mock Model".into(),
        provider: ProviderKind::OpenAi,
        base_url: None,
        api_key: None,
        model: "mock".into(),
        temperature: 0.0,
        max_tokens: 1024,
        supports_vision: false,
        supports_stream: false,
        max_retries: 1,
        is_default: true,
        is_enabled: true,
    }
}

/// 记录关闭次数的浏览器
#[derive(Default)]
pub struct StubBrowser {
    pub closed: AtomicBool,
    pub idle_checks: AtomicUsize,
}

#[async_trait::async_trait]
impl BrowserLifecycle for StubBrowser {
    async fn evict_if_idle(&self) -> bool {
        self.idle_checks.fetch_add(1, Ordering::SeqCst);
        false
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// 多个节点共享的存储：任务、节点、队列与缓存
#[derive(Clone)]
pub struct Backend {
    pub tasks: Arc<dyn TaskRepository>,
    pub nodes: Arc<InMemoryNodeRepository>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub cache_store: Arc<dyn CacheStore>,
    pub provider: Arc<MockChatProvider>,
}

impl Backend {
    pub fn in_memory() -> Self {
        Self::with_tasks(Arc::new(InMemoryTaskRepository::new()))
    }

    pub fn with_tasks(tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            tasks,
            nodes: Arc::new(InMemoryNodeRepository::new()),
            queue: Arc::new(InMemoryTaskQueue::new()),
            cache_store: Arc::new(MemoryCacheStore::new()),
            provider: Arc::new(MockChatProvider::items(r#"{"items":[{"name":"Widget"}]}"#)),
        }
    }

    pub fn cache(&self) -> CacheService {
        CacheService::new(self.cache_store.clone(), CacheSettings::default())
    }

    pub fn submitter(&self) -> TaskSubmitter {
        TaskSubmitter::new(
            self.tasks.clone(),
            self.queue.clone(),
            SubmitSettings {
                poll_interval_ms: 20,
            },
        )
        .with_cache(self.cache())
    }

    pub async fn node_status(&self, node_id: &str) -> Option<String> {
        self.nodes
            .find(node_id)
            .await
            .unwrap()
            .map(|node| node.status.to_string())
    }
}

/// 一个正在运行的工作节点
pub struct TestNode {
    pub worker: Arc<ScrapeWorker>,
    pub engine: Arc<MockScraperEngine>,
    pub browser: Arc<StubBrowser>,
    run: JoinHandle<Result<(), WorkerError>>,
}

impl TestNode {
    /// 装配并启动节点
    pub fn spawn(backend: &Backend, engine: Arc<MockScraperEngine>, node_id: &str) -> Self {
        let cache = backend.cache();
        let extraction = ExtractionService::new(
            Arc::new(InMemoryModelConfigRepository::new().with_model(model_config())),
            Arc::new(MockProviderFactory::new(backend.provider.clone())),
            cache.clone(),
            LlmSettings::default(),
        );
        let scraper = ScrapeService::new(
            engine.clone(),
            extraction,
            SkillEngine::new(Arc::new(InMemorySkillRepository::new())),
            cache,
        );
        let browser = Arc::new(StubBrowser::default());

        let worker = Arc::new(ScrapeWorker::new(
            backend.tasks.clone(),
            backend.nodes.clone(),
            backend.queue.clone(),
            scraper,
            browser.clone(),
            WorkerSettings {
                node_id: Some(node_id.to_string()),
                prefetch: 4,
                heartbeat_interval_secs: 1,
                idle_check_interval_secs: 1,
            },
        ));

        let runner = worker.clone();
        let run = tokio::spawn(async move { runner.run().await });

        Self {
            worker,
            engine,
            browser,
            run,
        }
    }

    /// 停止节点并等待消费循环退出
    pub async fn shutdown(self) {
        self.worker.stop().await;
        tokio::time::timeout(Duration::from_secs(5), self.run)
            .await
            .expect("worker did not exit")
            .expect("worker panicked")
            .expect("worker returned an error");
    }
}

/// 轮询直到条件成立
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
