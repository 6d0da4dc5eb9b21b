//! # 统一错误处理模块
//!
//! 定义 rheedscope 的所有错误类型，使用 `thiserror` 派生。
//!
//! 错误分两类：
//! - `RheedError`：契约违背或 I/O 失败，直接返回给调用方并终止当前图样的处理
//! - `AnalysisWarning`：可恢复的数据状况（奇异基线、拟合失败、掩码拼接失败），
//!   记录日志并累积在所属对象上，处理继续进行
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - `numeric/least_squares.rs` 的 `FitError` 通过 `#[from]` 并入

use crate::numeric::least_squares::FitError;
use thiserror::Error;

/// rheedscope 统一错误类型
#[derive(Error, Debug)]
pub enum RheedError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to decode image: {path}")]
    ImageError {
        path: String,
        #[source]
        source: image::ImageError,
    },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 契约违背（外部协作者给出的数据不满足前置条件）
    // ─────────────────────────────────────────────────────────────
    #[error("Length mismatch: {what} ({left} vs {right})")]
    LengthMismatch {
        what: String,
        left: usize,
        right: usize,
    },

    #[error("Invalid peak indices: {0}")]
    InvalidPeakIndices(String),

    #[error("Shape mismatch: {what} expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Coordinates must be strictly increasing")]
    UnorderedCoordinates,

    #[error("Stage '{stage}' requires '{requires}' to run first")]
    NotReady {
        stage: &'static str,
        requires: &'static str,
    },

    // ─────────────────────────────────────────────────────────────
    // 数值错误（调用方通常将其降级为警告）
    // ─────────────────────────────────────────────────────────────
    #[error("Singular linear system in {0}")]
    SingularMatrix(String),

    #[error("Curve fit failed: {0}")]
    Fit(#[from] FitError),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid range format: {0}")]
    InvalidRange(String),

    // ─────────────────────────────────────────────────────────────
    // CSV / JSON 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RheedError>;

/// 可恢复的分析警告
///
/// 每条警告在产生时通过 `log::warn!` 输出，同时保存在图样的警告列表中。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisWarning {
    #[error("background removal skipped for region {region}: {reason}")]
    SingularBaseline { region: usize, reason: String },

    #[error("mixture fit failed at region {region}, split region by initial guess: {reason}")]
    MixtureFitFallback { region: usize, reason: String },

    #[error("failed to register region {region} to the mask of label {label}: {reason}")]
    MaskComposition {
        region: usize,
        label: i32,
        reason: String,
    },
}

impl AnalysisWarning {
    /// 输出日志并返回自身，便于 `warnings.push(w.emit())`
    pub fn emit(self) -> Self {
        log::warn!("{}", self);
        self
    }
}
