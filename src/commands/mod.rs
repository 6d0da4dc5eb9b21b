//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `phaser/`, `utils/`
//! - 子模块: spectrum, analyze, phase, report

pub mod analyze;
pub mod phase;
pub mod report;
pub mod spectrum;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Spectrum(args) => spectrum::execute(args),
        Commands::Analyze(args) => analyze::execute(args),
        Commands::Phase(args) => phase::execute(args),
    }
}
