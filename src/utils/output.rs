//! # 美化输出工具
//!
//! 统一的终端状态行样式，以及分析警告、运行摘要的输出。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored` crate

use crate::error::AnalysisWarning;

use colored::Colorize;

pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印 `key: value` 形式的摘要行
pub fn print_field(key: &str, value: impl std::fmt::Display) {
    println!("  {:<18} {}", format!("{}:", key).dimmed(), value);
}

/// 逐条打印分析警告，`source` 为所属图样或文件名
pub fn print_analysis_warnings(source: &str, warnings: &[AnalysisWarning]) {
    for w in warnings {
        print_warning(&format!("{}: {}", source, w));
    }
}
