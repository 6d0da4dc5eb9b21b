//! # 批量执行器
//!
//! 并行处理文件列表，收集每个文件的输出。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代（线程数 0 表示使用全部 CPU）
//! - 进度条显示
//! - 成功输出按输入顺序保留，失败与跳过汇总报告
//!
//! ## 依赖关系
//! - 被 `commands/phase.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;

/// 单个文件处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult<T> {
    Success(T),
    /// 跳过（附原因）
    Skipped(String),
    /// 处理失败 (文件路径, 错误信息)
    Failed(String, String),
}

/// 批量处理结果
#[derive(Debug)]
pub struct BatchResult<T> {
    /// 成功输出，与输入顺序一致
    pub outputs: Vec<(PathBuf, T)>,
    pub skipped: Vec<(PathBuf, String)>,
    pub failures: Vec<(String, String)>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    pub fn merge(&mut self, path: PathBuf, result: ProcessResult<T>) {
        match result {
            ProcessResult::Success(out) => self.outputs.push((path, out)),
            ProcessResult::Skipped(reason) => self.skipped.push((path, reason)),
            ProcessResult::Failed(path, err) => self.failures.push((path, err)),
        }
    }

    pub fn success(&self) -> usize {
        self.outputs.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.outputs.len() + self.skipped.len() + self.failures.len()
    }
}

/// 批量执行器
pub struct BatchRunner {
    jobs: usize,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self {
            jobs,
            show_progress: true,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理文件列表
    pub fn run<T, F>(&self, files: Vec<PathBuf>, processor: F) -> BatchResult<T>
    where
        T: Send,
        F: Fn(&PathBuf) -> ProcessResult<T> + Sync + Send,
    {
        let pb = self
            .show_progress
            .then(|| progress::create_progress_bar(files.len() as u64, "Analyzing"));

        let work = || -> Vec<ProcessResult<T>> {
            files
                .par_iter()
                .map(|file| {
                    let result = processor(file);
                    if let Some(pb) = &pb {
                        pb.inc(1);
                    }
                    result
                })
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool.install(work),
            Err(e) => {
                log::warn!("failed to build a {}-thread pool ({}), using the global pool", self.jobs, e);
                work()
            }
        };

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let mut batch = BatchResult::default();
        for (path, result) in files.into_iter().zip(results) {
            batch.merge(path, result);
        }
        batch
    }
}
