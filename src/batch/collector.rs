//! # 图样文件收集器
//!
//! 根据输入路径、包含模式与排除模式收集待分析的图样文件。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（`*`、`?`），逗号分隔多模式
//! - 排除模式（如与图样同目录存放的 `*_mask.png`）
//! - 结果按路径排序，保证批量输出顺序稳定
//!
//! ## 依赖关系
//! - 被 `commands/phase.rs` 调用
//! - 使用 `walkdir` 遍历目录

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 默认图样模式
pub const DEFAULT_PATTERNS: &str = "*.png,*.tif,*.tiff,*.txt,*.csv,*.dat";

fn split_patterns(pattern: &str) -> Vec<String> {
    pattern
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 文件收集器
pub struct FileCollector {
    input: PathBuf,
    patterns: Vec<String>,
    excludes: Vec<String>,
    recursive: bool,
}

impl FileCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: split_patterns(DEFAULT_PATTERNS),
            excludes: Vec::new(),
            recursive: false,
        }
    }

    /// 设置包含模式（逗号分隔），为空时保留默认模式
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        let patterns = split_patterns(pattern);
        if !patterns.is_empty() {
            self.patterns = patterns;
        }
        self
    }

    /// 设置排除模式（逗号分隔）
    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.excludes = split_patterns(pattern);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件，按路径排序
    pub fn collect(&self) -> Vec<PathBuf> {
        if self.input.is_file() {
            return vec![self.input.clone()];
        }
        if !self.input.is_dir() {
            return vec![];
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.accepts(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        log::debug!("collected {} files under {}", files.len(), self.input.display());
        files
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let included = self.patterns.iter().any(|p| glob_match(p, filename));
        let excluded = self.excludes.iter().any(|p| glob_match(p, filename));
        included && !excluded
    }
}

/// 简单 glob 匹配（支持 * 和 ? 通配符）
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();

    let mut p = 0;
    let mut t = 0;
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
