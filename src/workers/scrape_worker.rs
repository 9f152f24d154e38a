// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WorkerSettings;
use crate::domain::models::scrape_outcome::ScrapeOutcome;
use crate::domain::models::task::{QueueMessage, TaskError, TaskUpdate, NODE_STOPPED_MESSAGE};
use crate::domain::repositories::node_repository::NodeRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::services::scrape_service::ScrapeService;
use crate::engines::browser_manager::BrowserLifecycle;
use crate::infrastructure::metrics;
use crate::queue::task_queue::{Delivery, QueueError, TaskQueue};
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 抓取工作节点
///
/// 从队列领取任务并执行抓取，同时维护心跳与浏览器空闲回收。
/// 停止时把仍在处理中的任务重置为待处理，交给其他节点重新领取。
#[derive(Clone)]
pub struct ScrapeWorker {
    node_id: String,
    tasks: Arc<dyn TaskRepository>,
    nodes: Arc<dyn NodeRepository>,
    queue: Arc<dyn TaskQueue>,
    scraper: ScrapeService,
    browser: Arc<dyn BrowserLifecycle>,
    settings: WorkerSettings,
    running: Arc<AtomicBool>,
    /// 正在处理的任务
    active: Arc<Mutex<HashSet<Uuid>>>,
    /// 并发上限，等于预取数
    slots: Arc<Semaphore>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ScrapeWorker {
    /// 创建工作节点
    ///
    /// # 参数
    ///
    /// * `tasks` - 任务仓库
    /// * `nodes` - 节点仓库
    /// * `queue` - 任务队列
    /// * `scraper` - 抓取服务
    /// * `browser` - 浏览器生命周期
    /// * `settings` - 节点配置，未设置节点ID时自动生成
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        nodes: Arc<dyn NodeRepository>,
        queue: Arc<dyn TaskQueue>,
        scraper: ScrapeService,
        browser: Arc<dyn BrowserLifecycle>,
        settings: WorkerSettings,
    ) -> Self {
        let node_id = settings
            .node_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("node-{}", Uuid::new_v4().simple()));
        let prefetch = settings.prefetch.max(1);

        Self {
            node_id,
            tasks,
            nodes,
            queue,
            scraper,
            browser,
            settings,
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(HashSet::new())),
            slots: Arc::new(Semaphore::new(prefetch)),
            background: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 当前在处理中的任务数
    pub fn in_flight(&self) -> usize {
        self.active.lock().len()
    }

    /// 停止工作节点
    ///
    /// 在处理中的任务被重置为待处理并清除节点，未确认的消息放回队列，
    /// 随后关闭浏览器并把节点标记为已停止。各步骤失败只记录日志。
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Worker {} stopping...", self.node_id);

        for handle in self.background.lock().drain(..) {
            handle.abort();
        }

        let in_flight: Vec<Uuid> = self.active.lock().drain().collect();
        if !in_flight.is_empty() {
            info!(
                "Worker {} has {} active tasks. Resetting status...",
                self.node_id,
                in_flight.len()
            );
            match self
                .tasks
                .reset_to_pending(&in_flight, TaskError::new(NODE_STOPPED_MESSAGE))
                .await
            {
                Ok(count) => info!("Successfully reset {} tasks to pending", count),
                Err(e) => error!("Error resetting active tasks: {}", e),
            }
        }

        self.requeue_unacked().await;

        self.browser.close().await;
        info!("Worker {} closed browser", self.node_id);

        if let Err(e) = self.nodes.mark_stopped(&self.node_id).await {
            error!("Error updating stop status for {}: {}", self.node_id, e);
        }
        info!("Worker {} stopped", self.node_id);
    }

    async fn requeue_unacked(&self) {
        match self.queue.requeue_unacked(&self.node_id).await {
            Ok(0) => {}
            Ok(count) => info!("Returned {} unacknowledged messages to the queue", count),
            Err(e) => error!("Error requeueing messages for {}: {}", self.node_id, e),
        }
    }

    async fn heartbeat_loop(self) {
        let mut ticker = interval(Duration::from_secs(
            self.settings.heartbeat_interval_secs.max(1),
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 启动时已经写过一次
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.is_running() {
                break;
            }
            if let Err(e) = self.nodes.heartbeat(&self.node_id).await {
                error!("Heartbeat error for {}: {}", self.node_id, e);
            }
        }
    }

    async fn idle_check_loop(self) {
        let mut ticker = interval(Duration::from_secs(
            self.settings.idle_check_interval_secs.max(1),
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.is_running() {
                break;
            }
            if self.browser.evict_if_idle().await {
                info!("Closed idle browser on {}", self.node_id);
            }
        }
    }

    async fn consume_loop(&self) {
        while self.is_running() {
            let permit = match self.slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            match self.queue.consume(&self.node_id).await {
                Ok(Some(_)) if !self.is_running() => break,
                Ok(Some(delivery)) => {
                    let worker = self.clone();
                    tokio::spawn(async move {
                        worker.handle_delivery(delivery).await;
                        drop(permit);
                    });
                }
                Ok(None) => {}
                Err(QueueError::Serialization(e)) => {
                    warn!("Dropped undecodable queue message: {}", e);
                }
                Err(e) => {
                    error!("Error consuming from queue: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let task_id = delivery.message.task_id;

        if let Err(e) = self.process_task(&delivery.message).await {
            if self.is_running() {
                error!("Task {} error: {}", task_id, e);
                self.record_failure(task_id, TaskError::with_kind(e.to_string(), "WorkerError"))
                    .await;
            } else {
                warn!("Task {} error after worker stop: {}", task_id, e);
            }
        }

        // 停止后的消息留给回收流程放回队列
        if !self.is_running() {
            return;
        }
        if let Err(e) = self.queue.ack(&self.node_id, &delivery).await {
            warn!("Failed to acknowledge task {}: {}", task_id, e);
        }
    }

    /// 处理单个任务
    ///
    /// 任务记录已删除时直接跳过；渲染缓存命中时不再抓取
    #[instrument(skip(self, message), fields(task_id = %message.task_id, url = %message.url))]
    async fn process_task(&self, message: &QueueMessage) -> Result<(), WorkerError> {
        if self.tasks.find_one(message.task_id).await?.is_none() {
            warn!("Task not found in database, it may have been deleted. Skipping.");
            return Ok(());
        }

        info!("Processing task");
        self.active.lock().insert(message.task_id);
        let result = self.execute(message).await;
        self.active.lock().remove(&message.task_id);
        result
    }

    async fn execute(&self, message: &QueueMessage) -> Result<(), WorkerError> {
        let task_id = message.task_id;
        self.tasks
            .update(task_id, TaskUpdate::processing(&self.node_id))
            .await?;

        let cached = self
            .scraper
            .complete_from_cache(&message.url, &message.params, &message.cache)
            .await;

        let (update, status) = match cached {
            Some(result) => {
                info!("Task hit render cache, skipping scrape");
                (TaskUpdate::success(result, true), "success")
            }
            None => {
                let outcome = self
                    .scraper
                    .scrape(&message.url, &message.params, &self.node_id, &message.cache)
                    .await;
                match outcome {
                    ScrapeOutcome::Success(result) => {
                        (TaskUpdate::success(*result, false), "success")
                    }
                    ScrapeOutcome::Failed(failure) => {
                        warn!("Scrape failed: {}", failure.error.message);
                        (TaskUpdate::failed(failure.error), "failed")
                    }
                }
            }
        };

        if !self.is_running() {
            warn!("Worker stopped during task, result will be ignored");
            return Ok(());
        }

        // 停止流程可能已把任务重置，此时不再写回
        match self
            .tasks
            .update_if_owned(task_id, &self.node_id, update)
            .await?
        {
            Some(_) => {
                metrics::record_task(status);
                info!("Task finished with status {}", status);
            }
            None => warn!("Task was reset or reassigned before its result was written, result discarded"),
        }
        Ok(())
    }

    async fn record_failure(&self, task_id: Uuid, error: TaskError) {
        match self.tasks.update(task_id, TaskUpdate::failed(error)).await {
            Ok(_) => metrics::record_task("failed"),
            Err(e) => error!("Failed to record failure for task {}: {}", task_id, e),
        }
    }
}

#[async_trait]
impl Worker for ScrapeWorker {
    /// 运行直到 `stop` 被调用
    async fn run(&self) -> Result<(), WorkerError> {
        self.running.store(true, Ordering::SeqCst);
        self.nodes.heartbeat(&self.node_id).await?;
        info!(
            "Worker {} started (prefetch {})",
            self.node_id, self.settings.prefetch
        );

        {
            let mut background = self.background.lock();
            background.push(tokio::spawn(self.clone().heartbeat_loop()));
            background.push(tokio::spawn(self.clone().idle_check_loop()));
        }

        self.consume_loop().await;

        // 停止期间才领取到的消息
        self.requeue_unacked().await;
        info!("Worker {} consume loop exited", self.node_id);
        Ok(())
    }

    async fn stop(&self) {
        ScrapeWorker::stop(self).await
    }

    fn name(&self) -> &str {
        &self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{CacheSettings, LlmSettings};
    use crate::domain::models::llm::{ModelConfig, ProviderKind};
    use crate::domain::models::node::NodeStatus;
    use crate::domain::models::scrape_outcome::{PageMetadata, ScrapeFailure, ScrapeResult};
    use crate::domain::models::scrape_params::ScrapeParams;
    use crate::domain::models::task::{CacheConfig, Task, TaskStatus};
    use crate::domain::repositories::task_repository::RepositoryError;
    use crate::domain::services::extraction_service::ExtractionService;
    use crate::engines::skills::SkillEngine;
    use crate::engines::traits::ScraperEngine;
    use crate::infrastructure::cache::cache_service::CacheService;
    use crate::infrastructure::cache::cache_store::MemoryCacheStore;
    use crate::infrastructure::llm::{ChatProvider, ProviderFactory};
    use crate::infrastructure::repositories::memory::{
        InMemoryModelConfigRepository, InMemoryNodeRepository, InMemorySkillRepository,
        InMemoryTaskRepository,
    };
    use crate::queue::memory_queue::InMemoryTaskQueue;
    use crate::utils::errors::LlmError;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// 可选地在导航处阻塞的引擎
    struct GatedEngine {
        started: AtomicUsize,
        gate: Option<Semaphore>,
        fail: bool,
    }

    impl GatedEngine {
        fn open() -> Self {
            Self {
                started: AtomicUsize::new(0),
                gate: None,
                fail: false,
            }
        }

        fn closed() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::open()
            }
        }
    }

    fn metadata(url: &str) -> PageMetadata {
        PageMetadata {
            title: Some("Page".into()),
            url: url.into(),
            actual_url: Some(url.into()),
            status_code: Some(200),
            load_time: 0.2,
            timestamp: Utc::now().into(),
        }
    }

    #[async_trait]
    impl ScraperEngine for GatedEngine {
        async fn scrape(&self, url: &str, _params: &ScrapeParams, _node_id: &str) -> ScrapeOutcome {
            self.started.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            if self.fail {
                return ScrapeOutcome::Failed(ScrapeFailure {
                    error: TaskError::with_kind("net::ERR_CONNECTION_REFUSED", "NavigationError"),
                    metadata: metadata(url),
                    intercepted_apis: BTreeMap::new(),
                });
            }
            ScrapeOutcome::Success(Box::new(ScrapeResult {
                html: "<html><body>Row</body></html>".into(),
                screenshot: None,
                metadata: metadata(url),
                intercepted_apis: BTreeMap::new(),
                skill_results: BTreeMap::new(),
                visual_content: "Row".into(),
                visual_extraction_failed: false,
                agent_result: None,
                html_cached: false,
                agent_cached: false,
            }))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[derive(Default)]
    struct StubBrowser {
        closed: AtomicBool,
    }

    #[async_trait]
    impl BrowserLifecycle for StubBrowser {
        async fn evict_if_idle(&self) -> bool {
            false
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct NoProviders;

    impl ProviderFactory for NoProviders {
        fn provider_for(&self, config: &ModelConfig) -> Result<Arc<dyn ChatProvider>, LlmError> {
            Err(LlmError::Config(format!("no provider for {}", config.id)))
        }
    }

    struct Fixture {
        tasks: Arc<dyn TaskRepository>,
        nodes: Arc<InMemoryNodeRepository>,
        queue: Arc<InMemoryTaskQueue>,
        browser: Arc<StubBrowser>,
        worker: ScrapeWorker,
    }

    fn fixture(engine: Arc<GatedEngine>) -> Fixture {
        fixture_with(engine, Arc::new(InMemoryTaskRepository::new()))
    }

    fn fixture_with(engine: Arc<GatedEngine>, tasks: Arc<dyn TaskRepository>) -> Fixture {
        let nodes = Arc::new(InMemoryNodeRepository::new());
        let queue = Arc::new(InMemoryTaskQueue::new());
        let browser = Arc::new(StubBrowser::default());

        let cache = CacheService::new(Arc::new(MemoryCacheStore::new()), CacheSettings::default());
        let extraction = ExtractionService::new(
            Arc::new(InMemoryModelConfigRepository::new().with_model(ModelConfig {
                id: "m1".into(),
                name: "m1".into(),
                provider: ProviderKind::OpenAi,
                base_url: None,
                api_key: None,
                model: "gpt".into(),
                temperature: 0.0,
                max_tokens: 256,
                supports_vision: false,
                supports_stream: false,
                max_retries: 1,
                is_default: true,
                is_enabled: true,
            })),
            Arc::new(NoProviders),
            cache.clone(),
            LlmSettings::default(),
        );
        let scraper = ScrapeService::new(
            engine,
            extraction,
            SkillEngine::new(Arc::new(InMemorySkillRepository::new())),
            cache,
        );

        let worker = ScrapeWorker::new(
            tasks.clone(),
            nodes.clone(),
            queue.clone(),
            scraper,
            browser.clone(),
            WorkerSettings {
                node_id: Some("node-test".into()),
                prefetch: 5,
                heartbeat_interval_secs: 10,
                idle_check_interval_secs: 30,
            },
        );

        Fixture {
            tasks,
            nodes,
            queue,
            browser,
            worker,
        }
    }

    async fn enqueue(fx: &Fixture, url: &str, cache: CacheConfig) -> Task {
        let task = Task::new(url.into(), ScrapeParams::default(), cache, 1);
        fx.tasks.insert(&task).await.unwrap();
        fx.queue.publish(&task.to_message()).await.unwrap();
        task
    }

    async fn deliver(fx: &Fixture) {
        let delivery = fx.queue.consume("node-test").await.unwrap().unwrap();
        fx.worker.handle_delivery(delivery).await;
    }

    #[tokio::test]
    async fn test_successful_task_is_persisted_and_acked() {
        let engine = Arc::new(GatedEngine::open());
        let fx = fixture(engine.clone());
        fx.worker.running.store(true, Ordering::SeqCst);
        let task = enqueue(&fx, "https://a.test", CacheConfig::default()).await;

        deliver(&fx).await;

        let stored = fx.tasks.find_one(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Success);
        assert_eq!(stored.node_id.as_deref(), Some("node-test"));
        assert!(!stored.cached);
        assert_eq!(stored.result.unwrap().visual_content, "Row");
        assert_eq!(fx.queue.unacked_len(), 0);
        assert_eq!(fx.worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_second_identical_task_is_served_from_cache() {
        let engine = Arc::new(GatedEngine::open());
        let fx = fixture(engine.clone());
        fx.worker.running.store(true, Ordering::SeqCst);

        enqueue(&fx, "https://a.test", CacheConfig::default()).await;
        deliver(&fx).await;
        let second = enqueue(&fx, "https://a.test", CacheConfig::default()).await;
        deliver(&fx).await;

        let stored = fx.tasks.find_one(second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Success);
        assert!(stored.cached);
        assert!(stored.html_cached);
        assert_eq!(engine.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scrape_failure_is_recorded() {
        let engine = Arc::new(GatedEngine {
            fail: true,
            ..GatedEngine::open()
        });
        let fx = fixture(engine);
        fx.worker.running.store(true, Ordering::SeqCst);
        let task = enqueue(&fx, "https://down.test", CacheConfig::default()).await;

        deliver(&fx).await;

        let stored = fx.tasks.find_one(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        let error = stored.error.unwrap();
        assert_eq!(error.kind.as_deref(), Some("NavigationError"));
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_deleted_task_is_skipped() {
        let engine = Arc::new(GatedEngine::open());
        let fx = fixture(engine.clone());
        fx.worker.running.store(true, Ordering::SeqCst);
        let task = enqueue(&fx, "https://gone.test", CacheConfig::default()).await;
        fx.tasks.delete_many(&[task.id]).await.unwrap();

        deliver(&fx).await;

        assert_eq!(engine.started.load(Ordering::SeqCst), 0);
        assert_eq!(fx.queue.unacked_len(), 0);
    }

    #[tokio::test]
    async fn test_stop_resets_in_flight_tasks_to_pending() {
        let engine = Arc::new(GatedEngine::closed());
        let fx = fixture(engine.clone());
        let a = enqueue(&fx, "https://a.test", CacheConfig::default()).await;
        let b = enqueue(&fx, "https://b.test", CacheConfig::default()).await;

        let worker = fx.worker.clone();
        let run = tokio::spawn(async move { worker.run().await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while engine.started.load(Ordering::SeqCst) < 2 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(fx.worker.in_flight(), 2);

        fx.worker.stop().await;

        for id in [a.id, b.id] {
            let task = fx.tasks.find_one(id).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Pending);
            assert!(task.node_id.is_none());
            assert_eq!(task.error.unwrap().message, NODE_STOPPED_MESSAGE);
        }
        assert!(fx.browser.closed.load(Ordering::SeqCst));
        let node = fx.nodes.find("node-test").await.unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Stopped);

        // 放行被阻塞的抓取，结果不得写回
        if let Some(gate) = &engine.gate {
            gate.add_permits(2);
        }
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        sleep(Duration::from_millis(50)).await;

        for id in [a.id, b.id] {
            let task = fx.tasks.find_one(id).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Pending);
        }
        assert_eq!(fx.queue.len(), 2);
    }

    /// 终态写入前等待放行的任务仓库
    struct HeldWrites {
        inner: InMemoryTaskRepository,
        entered: Notify,
        gate: Semaphore,
    }

    impl HeldWrites {
        fn new() -> Self {
            Self {
                inner: InMemoryTaskRepository::new(),
                entered: Notify::new(),
                gate: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskRepository for HeldWrites {
        async fn insert(&self, task: &Task) -> Result<Task, RepositoryError> {
            self.inner.insert(task).await
        }

        async fn find_one(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
            self.inner.find_one(id).await
        }

        async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Task>, RepositoryError> {
            self.inner.find_many(ids).await
        }

        async fn update(&self, id: Uuid, update: TaskUpdate) -> Result<Task, RepositoryError> {
            self.inner.update(id, update).await
        }

        async fn update_if_owned(
            &self,
            id: Uuid,
            node_id: &str,
            update: TaskUpdate,
        ) -> Result<Option<Task>, RepositoryError> {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await;
            self.inner.update_if_owned(id, node_id, update).await
        }

        async fn reset_to_pending(
            &self,
            ids: &[Uuid],
            error: TaskError,
        ) -> Result<u64, RepositoryError> {
            self.inner.reset_to_pending(ids, error).await
        }

        async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
            self.inner.delete_many(ids).await
        }

        async fn count(&self, status: Option<TaskStatus>) -> Result<u64, RepositoryError> {
            self.inner.count(status).await
        }
    }

    #[tokio::test]
    async fn test_stop_during_result_write_keeps_task_pending() {
        let held = Arc::new(HeldWrites::new());
        let fx = fixture_with(Arc::new(GatedEngine::open()), held.clone());
        fx.worker.running.store(true, Ordering::SeqCst);
        let task = enqueue(&fx, "https://a.test", CacheConfig::default()).await;

        let delivery = fx.queue.consume("node-test").await.unwrap().unwrap();
        let worker = fx.worker.clone();
        let handling = tokio::spawn(async move { worker.handle_delivery(delivery).await });

        // 结果已产生、尚未写入时停止
        tokio::time::timeout(Duration::from_secs(5), held.entered.notified())
            .await
            .unwrap();
        fx.worker.stop().await;
        held.gate.add_permits(1);
        handling.await.unwrap();

        let stored = fx.tasks.find_one(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert!(stored.node_id.is_none());
        assert!(stored.result.is_none());
        assert_eq!(stored.error.unwrap().message, NODE_STOPPED_MESSAGE);
        assert_eq!(fx.queue.len(), 1);
        assert_eq!(fx.queue.unacked_len(), 0);
    }

    #[test]
    fn test_node_id_is_generated_when_missing() {
        let fx = fixture(Arc::new(GatedEngine::open()));
        assert_eq!(fx.worker.node_id(), "node-test");

        let generated = ScrapeWorker::new(
            fx.tasks.clone(),
            fx.nodes.clone(),
            fx.queue.clone(),
            fx.worker.scraper.clone(),
            fx.browser.clone(),
            WorkerSettings {
                node_id: None,
                prefetch: 0,
                heartbeat_interval_secs: 1,
                idle_check_interval_secs: 1,
            },
        );
        assert!(generated.node_id().starts_with("node-"));
        assert_eq!(generated.slots.available_permits(), 1);
    }
}
