//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责断点续跑和并发调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<WorkItem>)
//!     ↓
//! workflow::RecordFlow (处理单条记录)
//!     ↓
//! services (能力层：checkpoint / label / writer)
//!     ↓
//! clients (推理服务：responses / chat-stream)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有 Semaphore、写入器和进度条
//! 2. **向下依赖**：编排层 → workflow → services → clients
//! 3. **无业务逻辑**：只做调度和统计，不做具体记录转换

pub mod batch_processor;

// 重新导出主要类型
pub use batch_processor::{App, RunStats};
