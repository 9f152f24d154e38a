// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 工作管理器
///
/// 启动工作器，收到关闭信号后依次停止并等待它们退出
pub struct WorkerManager {
    workers: Vec<Arc<dyn Worker>>,
    handles: Vec<JoinHandle<Result<(), WorkerError>>>,
    shutdown_grace: Duration,
}

impl WorkerManager {
    /// # 参数
    ///
    /// * `shutdown_grace` - 停止后等待每个工作器退出的时间，超时则强制中止
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            workers: Vec::new(),
            handles: Vec::new(),
            shutdown_grace,
        }
    }

    /// 启动一个工作器
    pub fn start(&mut self, worker: Arc<dyn Worker>) {
        info!("Starting worker {}", worker.name());
        let runner = worker.clone();
        self.handles
            .push(tokio::spawn(async move { runner.run().await }));
        self.workers.push(worker);
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown().await;
    }

    /// 停止全部工作器
    pub async fn shutdown(&mut self) {
        info!("Shutting down workers...");
        for worker in &self.workers {
            worker.stop().await;
        }

        for (worker, mut handle) in self.workers.drain(..).zip(self.handles.drain(..)) {
            match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Worker {} exited with error: {}", worker.name(), e),
                Ok(Err(e)) => error!("Worker {} panicked: {}", worker.name(), e),
                Err(_) => {
                    warn!("Worker {} did not exit in time, aborting", worker.name());
                    handle.abort();
                }
            }
        }

        info!("Workers shut down successfully");
    }
}
