//! # Collect Responses
//!
//! 把 JSONL 数据集中的题目批量发送给本地推理服务，并把结果追加写回磁盘。
//! 支持断点续跑：中断后重新运行只会处理尚未完成的记录。
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 推理服务能力，一个 trait 两种协议
//! - `ResponsesClient` - 非流式 /v1/responses
//! - `ChatStreamClient` - 流式 /v1/chat/completions
//!
//! ### ② 业务能力层（Services）
//! - `CheckpointStore` - 扫描输出文件，得到已完成索引
//! - `LabelExtractor` - 选项字母抽取
//! - `RecordWriter` - 追加写入结果
//!
//! ### ③ 流程层（Workflow）
//! - `RecordFlow` - 一条记录的处理流程（prompt → 推理 → 组装）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 断点计算、并发调度、统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{build_backend, BackendConfig, ResponseBackend};
pub use config::{CliArgs, Config};
pub use error::{AppError, AppResult};
pub use models::{ItemIndex, Prompt, Turn, WorkItem};
pub use orchestrator::{App, RunStats};
pub use workflow::RecordFlow;
