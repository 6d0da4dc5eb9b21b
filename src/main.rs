//! # rheedscope - RHEED 图样周期性分析工具
//!
//! 从 RHEED 衍射图样的条纹投影中检测周期峰族，跨图样聚类周期间距，
//! 并估计每张图样中各周期（相）的相对强度。
//!
//! ## 子命令
//! - `spectrum` - 单条一维光谱的周期峰族分析
//! - `analyze`  - 单张带掩码图样的分段流水线
//! - `phase`    - 目录批量分析、全局聚类与强度表
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/     (图样、光谱、配置加载)
//!   │     ├── batch/       (文件收集与并行处理)
//!   │     └── phaser/      (分割、聚类、强度归属)
//!   │           ├── periodicity/ (峰间距与峰族)
//!   │           ├── models/      (光谱、图样、区域)
//!   │           └── numeric/     (找峰、滤波、最小二乘、DBSCAN)
//!   ├── utils/      (终端输出与进度条)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod numeric;
mod parsers;
mod periodicity;
mod phaser;
mod utils;

use clap::Parser;
use cli::Cli;
use env_logger::Env;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
