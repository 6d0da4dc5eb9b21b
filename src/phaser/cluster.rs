//! # 跨图样周期聚类
//!
//! 收集多张图样中每个周期（峰组或峰族的平均间距），做一维密度聚类，
//! 再按簇均值升序重编号：标签 0 为间距最小的簇。噪声标签保持为 `NOISE_LABEL`。
//!
//! ## 流程
//! 1. `run_cluster`: 收集周期 → （可选）换算为倒空间间距 → 聚类 → 写回各图样
//! 2. `get_intensity_map`: 并行计算各图样的峰组强度，汇总为强度表
//!
//! ## 依赖关系
//! - 使用 `numeric/dbscan.rs`、`phaser/mask.rs`
//! - 使用 `rayon` 并行计算各图样强度
//! - 被 `commands/phase.rs` 和 `phaser/export.rs` 使用

use crate::error::{Result, RheedError};
use crate::numeric::dbscan::{Dbscan, DensityClustering, NOISE};
use crate::phaser::intensity::{percent_of, GroupIntensity};
use crate::phaser::mask::MaskedPattern;
use crate::phaser::mixture::MixtureConfig;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 离群周期的标签
pub const NOISE_LABEL: i32 = NOISE;

/// 聚类配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub eps: f64,
    pub min_samples: usize,
    /// 聚类前将像素间距换算为倒空间间距
    pub convert_dist: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps: 3.0,
            min_samples: 1,
            convert_dist: false,
        }
    }
}

impl ClusterConfig {
    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn convert_dist(mut self, convert_dist: bool) -> Self {
        self.convert_dist = convert_dist;
        self
    }
}

/// 簇均值
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterMean {
    pub label: i32,
    pub mean: f64,
    pub members: usize,
}

/// 按簇均值重编号的聚类器
#[derive(Debug, Clone)]
pub struct DistanceClusterer<C = Dbscan> {
    model: C,
    means: Vec<ClusterMean>,
}

impl DistanceClusterer<Dbscan> {
    pub fn dbscan(eps: f64, min_samples: usize) -> Self {
        Self::new(Dbscan::new(eps, min_samples))
    }
}

impl<C: DensityClustering> DistanceClusterer<C> {
    pub fn new(model: C) -> Self {
        Self {
            model,
            means: Vec::new(),
        }
    }

    /// 聚类并重编号，返回与输入一一对应的标签
    pub fn fit_predict(&mut self, dists: &[f64]) -> Vec<i32> {
        let raw = self.model.fit_predict(dists);

        let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
        for (&label, &d) in raw.iter().zip(dists) {
            if label != NOISE_LABEL {
                let entry = sums.entry(label).or_insert((0.0, 0));
                entry.0 += d;
                entry.1 += 1;
            }
        }

        let mut order: Vec<(i32, f64, usize)> = sums
            .into_iter()
            .map(|(label, (sum, n))| (label, sum / n as f64, n))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mapping: BTreeMap<i32, i32> = order
            .iter()
            .enumerate()
            .map(|(new, &(old, _, _))| (old, new as i32))
            .collect();

        self.means = order
            .iter()
            .enumerate()
            .map(|(new, &(_, mean, members))| ClusterMean {
                label: new as i32,
                mean,
                members,
            })
            .collect();

        raw.iter()
            .map(|l| mapping.get(l).copied().unwrap_or(NOISE_LABEL))
            .collect()
    }

    /// 最近一次聚类的簇均值（不含噪声），按标签升序
    pub fn means(&self) -> &[ClusterMean] {
        &self.means
    }
}

/// 一个参与聚类的周期样本
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseSample {
    pub pattern: usize,
    pub candidate: usize,
    pub dist: f64,
    pub label: i32,
}

/// 图样 × 标签 的相对强度表
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntensityMap {
    pub labels: Vec<i32>,
    pub rows: Vec<IntensityRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityRow {
    pub pattern: String,
    /// 与 `IntensityMap::labels` 对齐
    pub percents: Vec<f64>,
}

/// 跨图样周期聚类
#[derive(Debug, Clone, Default)]
pub struct PeriodicityPhaser {
    config: ClusterConfig,
    overlapping: bool,
    samples: Vec<PhaseSample>,
    means: Vec<ClusterMean>,
}

impl PeriodicityPhaser {
    /// `overlapping` 为真时对全部峰族聚类，否则只用互斥峰组
    pub fn new(config: ClusterConfig, overlapping: bool) -> Self {
        Self {
            config,
            overlapping,
            ..Default::default()
        }
    }

    pub fn samples(&self) -> &[PhaseSample] {
        &self.samples
    }

    /// 对所有图样的周期做全局聚类，并把标签写回各图样
    pub fn run_cluster(&mut self, patterns: &mut [MaskedPattern]) -> Result<&[ClusterMean]> {
        let mut candidates = Vec::with_capacity(patterns.len());
        let mut samples = Vec::new();

        for (pi, pattern) in patterns.iter().enumerate() {
            let cands = pattern.cluster_candidates(self.overlapping)?;
            for (ci, cand) in cands.iter().enumerate() {
                let dist = if self.config.convert_dist {
                    let config = pattern.pattern().config().ok_or_else(|| {
                        RheedError::InvalidArgument(format!(
                            "pattern '{}' has no acquisition config for distance conversion",
                            pattern.name()
                        ))
                    })?;
                    config.hdist_to_g(cand.avg_dist)
                } else {
                    cand.avg_dist
                };
                samples.push(PhaseSample {
                    pattern: pi,
                    candidate: ci,
                    dist,
                    label: NOISE_LABEL,
                });
            }
            candidates.push(cands);
        }

        let dists: Vec<f64> = samples.iter().map(|s| s.dist).collect();
        let mut clusterer = DistanceClusterer::dbscan(self.config.eps, self.config.min_samples);
        let labels = clusterer.fit_predict(&dists);
        for (s, label) in samples.iter_mut().zip(&labels) {
            s.label = *label;
        }

        for ((pi, pattern), cands) in patterns.iter_mut().enumerate().zip(candidates) {
            let pattern_labels: Vec<i32> = samples
                .iter()
                .filter(|s| s.pattern == pi)
                .map(|s| s.label)
                .collect();
            pattern.set_cluster_labels(cands, &pattern_labels)?;
        }

        log::info!(
            "clustered {} periodicities from {} patterns into {} clusters",
            samples.len(),
            patterns.len(),
            clusterer.means().len()
        );

        self.samples = samples;
        self.means = clusterer.means().to_vec();
        Ok(self.means.as_slice())
    }

    /// 并行计算各图样的峰组强度，汇总为强度表
    pub fn get_intensity_map(&self, patterns: &mut [MaskedPattern], config: &MixtureConfig) -> Result<IntensityMap> {
        let tables: Vec<Vec<GroupIntensity>> = patterns
            .par_iter_mut()
            .map(|p| p.get_group_intensity(config).map(<[GroupIntensity]>::to_vec))
            .collect::<Result<_>>()?;

        let mut labels: Vec<i32> = patterns.iter().flat_map(MaskedPattern::cluster_labels).collect();
        labels.sort_unstable();
        labels.dedup();

        let rows = patterns
            .iter()
            .zip(&tables)
            .map(|(p, table)| IntensityRow {
                pattern: p.name().to_string(),
                percents: labels.iter().map(|&l| percent_of(table, l)).collect(),
            })
            .collect();

        Ok(IntensityMap { labels, rows })
    }
}
