// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scrapeflow::config::settings::Settings;
use scrapeflow::domain::services::extraction_service::ExtractionService;
use scrapeflow::domain::services::scrape_service::ScrapeService;
use scrapeflow::engines::browser_engine::BrowserEngine;
use scrapeflow::engines::browser_manager::BrowserManager;
use scrapeflow::engines::skills::SkillEngine;
use scrapeflow::infrastructure::cache::cache_service::CacheService;
use scrapeflow::infrastructure::cache::redis_client::RedisClient;
use scrapeflow::infrastructure::database::connection;
use scrapeflow::infrastructure::llm::HttpProviderFactory;
use scrapeflow::infrastructure::metrics;
use scrapeflow::infrastructure::repositories::model_config_repo_impl::ModelConfigRepositoryImpl;
use scrapeflow::infrastructure::repositories::node_repo_impl::NodeRepositoryImpl;
use scrapeflow::infrastructure::repositories::skill_repo_impl::SkillRepositoryImpl;
use scrapeflow::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use scrapeflow::queue::task_queue::RedisTaskQueue;
use scrapeflow::utils::telemetry;
use scrapeflow::workers::manager::WorkerManager;
use scrapeflow::workers::scrape_worker::ScrapeWorker;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 工作节点入口：初始化各组件，消费任务直到收到关闭信号
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting scrapeflow worker node...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    if settings.metrics.enabled {
        metrics::init_metrics(&settings.metrics.listen_addr);
    }

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize Redis Client
    let redis_client = RedisClient::new(&settings.redis.url)?;
    info!("Redis client initialized");

    // 5. Initialize Components
    let tasks = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let nodes = Arc::new(NodeRepositoryImpl::new(db.clone()));
    let models = Arc::new(ModelConfigRepositoryImpl::new(db.clone()));
    let skill_store = Arc::new(SkillRepositoryImpl::new(db.clone()));
    let queue = Arc::new(RedisTaskQueue::new(
        redis_client.clone(),
        settings.redis.queue_key.clone(),
    ));

    let cache = CacheService::new(Arc::new(redis_client), settings.cache.clone());
    let skills = SkillEngine::new(skill_store);
    let browser = Arc::new(BrowserManager::new(settings.browser.clone()));
    let engine = Arc::new(BrowserEngine::new(
        browser.clone(),
        skills.clone(),
        settings.scraper.clone(),
    ));
    let extraction = ExtractionService::new(
        models,
        Arc::new(HttpProviderFactory::new(&settings.llm)?),
        cache.clone(),
        settings.llm.clone(),
    );
    let scraper = ScrapeService::new(engine, extraction, skills, cache);

    // 6. Start Worker
    let worker = Arc::new(ScrapeWorker::new(
        tasks,
        nodes,
        queue,
        scraper,
        browser,
        settings.worker.clone(),
    ));
    info!("Worker node id: {}", worker.node_id());

    let mut manager = WorkerManager::new(Duration::from_secs(10));
    manager.start(worker);
    manager.wait_for_shutdown().await;

    Ok(())
}
