//! # 批量处理模块
//!
//! 对目录中的全部图样做并行分析。
//!
//! `FileCollector` 按 glob 收集图样（排除掩码文件），
//! `BatchRunner` 在 rayon 线程池中逐个运行流水线，
//! 成功结果按输入顺序保留，供后续全局聚类使用。
//!
//! ## 依赖关系
//! - 被 `commands/phase.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchRunner, ProcessResult};
