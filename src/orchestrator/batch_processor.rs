//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责断点续跑和并发调度。
//!
//! ## 核心功能
//!
//! 1. **加载输入**：读取 JSONL 数据集（可限制行数）
//! 2. **断点计算**：扫描输出文件，跳过已完成的索引
//! 3. **并发控制**：使用 Semaphore 限制在途请求数，先拿许可再提交任务
//! 4. **失败隔离**：单条记录的错误或 panic 只影响它自己，下次运行会重试
//! 5. **增量写入**：每条结果完成后立即追加，写完才释放许可
//! 6. **全局统计**：进度条 + 最终成功/失败统计

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::clients::{build_backend, ResponseBackend};
use crate::config::Config;
use crate::error::{AppResult, RecordError};
use crate::models::{load_work_items, ItemIndex, WorkItem};
use crate::services::{CheckpointStore, RecordWriter};
use crate::utils::logging::{log_run_plan, log_startup, print_final_stats};
use crate::workflow::RecordFlow;

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<RecordFlow>,
    show_progress: bool,
}

impl App {
    /// 按配置选择推理服务并初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        let backend = build_backend(config.backend_config(), config.api)?;
        Self::with_backend(config, backend)
    }

    /// 使用指定的推理服务初始化应用
    pub fn with_backend(config: Config, backend: Arc<dyn ResponseBackend>) -> AppResult<Self> {
        let flow = RecordFlow::new(&config, backend)?;
        Ok(Self {
            config,
            flow: Arc::new(flow),
            show_progress: true,
        })
    }

    /// 是否显示进度条
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<RunStats> {
        log_startup(&self.config);
        let started = Instant::now();

        let items =
            load_work_items(&self.config.raw_path, self.config.max_lines, self.config.profile)
                .await?;
        let total = items.len();

        let checkpoint = CheckpointStore::scan(&self.config.output_path).await?;
        let pending: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| !checkpoint.contains(&item.index))
            .collect();

        log_run_plan(total, checkpoint.len(), pending.len());

        if pending.is_empty() {
            info!("✓ 没有待处理的记录，程序结束");
            return Ok(RunStats::default());
        }

        let writer = Arc::new(RecordWriter::open(&self.config.output_path).await?);
        let stats = self.process_pending(pending, writer).await?;

        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            started.elapsed(),
            &self.config.output_path,
        );

        Ok(stats)
    }

    /// 并发处理所有待处理记录
    ///
    /// 结果按完成顺序写入，不保证与输入顺序一致。
    pub async fn process_pending(
        &self,
        pending: Vec<WorkItem>,
        writer: Arc<RecordWriter>,
    ) -> AppResult<RunStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let progress = self.progress_bar(pending.len() as u64);
        let mut stats = RunStats {
            total: pending.len(),
            ..Default::default()
        };
        let mut tasks = JoinSet::new();

        for item in pending {
            // 先拿许可再 spawn，在途任务数不会超过 max_workers
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = self.flow.clone();
            let writer = writer.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(process_one(&flow, &writer, &item))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(RecordError::Panicked {
                            message: panic_message(panic.as_ref()),
                        }
                        .into())
                    });
                progress.inc(1);
                (item.index, outcome)
            });

            while let Some(joined) = tasks.try_join_next() {
                stats.tally(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            stats.tally(joined);
        }

        progress.finish_with_message("完成");
        Ok(stats)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(total);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} 处理中 [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        progress
    }
}

/// 单条记录：转换 → 追加写入
async fn process_one(flow: &RecordFlow, writer: &RecordWriter, item: &WorkItem) -> AppResult<()> {
    let record = flow.run(item).await?;
    writer.append(&record).await?;
    debug!("[记录 {}] ✓ 已写入", item.index);
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}

/// 处理统计
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    /// 本次失败的索引，下次运行会重试
    pub failed_indices: Vec<ItemIndex>,
}

impl RunStats {
    fn tally(&mut self, joined: Result<(ItemIndex, AppResult<()>), JoinError>) {
        match joined {
            Ok((_, Ok(()))) => self.success += 1,
            Ok((index, Err(e))) => {
                error!("[记录 {}] ❌ 处理失败: {}", index, e);
                self.failed += 1;
                self.failed_indices.push(index);
            }
            Err(e) => {
                error!("任务执行失败: {}", e);
                self.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "未知 panic");
    }

    #[test]
    fn test_tally() {
        let mut stats = RunStats::default();
        stats.tally(Ok((ItemIndex::Number(0), Ok(()))));
        stats.tally(Ok((
            ItemIndex::Number(1),
            Err(AppError::from(RecordError::Panicked {
                message: "x".to_string(),
            })),
        )));
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failed_indices, vec![ItemIndex::Number(1)]);
    }
}
