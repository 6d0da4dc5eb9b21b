//! # 周期峰族搜索
//!
//! 在一条光谱（或一个图样的全部展平峰）中寻找等间距的峰族。
//!
//! ## 算法概述
//! 1. 选取离中心目标最近的峰作为原点，超出 `abs_tolerant` 则无结果
//! 2. 以极化距离矩阵的中心行作为各峰相对原点的有符号距离
//! 3. 按近到远、左右交替的顺序以每个邻峰的距离提出间距假设：
//!    - 构建网格，残差 `< min(tolerant·dist, abs_tolerant)` 的峰入选
//!    - 命中的网格倍数需连续（间隙不超过 `allow_discontinue`）且至少 2 个
//!    - 接受后将入选峰两两标记为已处理，之后不再以这些峰对提出假设
//!
//! 结果与输入顺序相关，但对相同输入可复现。
//!
//! ## 依赖关系
//! - 使用 `periodicity/distance.rs` 的几何工具
//! - 被 `models/spectrum.rs` 和 `phaser/mask.rs` 调用

use super::distance::{distance_matrix, find_center_peak, CenterPeak, Grid, NeighborOrder};
use crate::error::{Result, RheedError};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 周期搜索参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConfig {
    /// 相对容差（乘以假设间距）
    pub tolerant: f64,
    /// 绝对容差，同时也是中心峰的最大偏离和最小可用间距
    pub abs_tolerant: f64,
    /// 族内允许缺失的连续网格数
    pub allow_discontinue: usize,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            tolerant: 0.01,
            abs_tolerant: 10.0,
            allow_discontinue: 1,
        }
    }
}

impl DistanceConfig {
    pub fn tolerant(mut self, tolerant: f64) -> Self {
        self.tolerant = tolerant;
        self
    }

    pub fn abs_tolerant(mut self, abs_tolerant: f64) -> Self {
        self.abs_tolerant = abs_tolerant;
        self
    }

    pub fn allow_discontinue(mut self, allow_discontinue: usize) -> Self {
        self.allow_discontinue = allow_discontinue;
        self
    }
}

/// 一个等间距峰族
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakFamily {
    /// 成员峰在峰列表中的索引（升序）
    pub peaks_family: Vec<usize>,
    /// 细化后的间距
    pub avg_dist: f64,
    /// 成员相对细化间距的平均绝对偏差
    pub avg_err: f64,
}

impl PeakFamily {
    pub fn len(&self) -> usize {
        self.peaks_family.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks_family.is_empty()
    }
}

/// 已被接受的峰族占用的峰对
#[derive(Debug, Default)]
struct VisitedPairs {
    pairs: HashSet<(usize, usize)>,
}

impl VisitedPairs {
    fn contains(&self, a: usize, b: usize) -> bool {
        self.pairs.contains(&(a.min(b), a.max(b)))
    }

    /// 将成员两两标记（含自身对）
    fn mark_all(&mut self, members: &[usize]) {
        for (k, &a) in members.iter().enumerate() {
            for &b in &members[k..] {
                self.pairs.insert((a.min(b), a.max(b)));
            }
        }
    }
}

/// 间距假设的判定结果
#[derive(Debug, Clone, PartialEq)]
enum Hypothesis {
    Accepted(PeakFamily),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rejection {
    TooCloseToCenter,
    EmptyGrid,
    Discontinuous,
    TooFewMultiples,
}

/// 单次周期搜索
struct FamilySearch<'a> {
    center: CenterPeak,
    /// 各峰相对中心峰的有符号距离
    center_nbr_dist: Vec<f64>,
    grid_min: f64,
    grid_max: f64,
    config: &'a DistanceConfig,
}

impl FamilySearch<'_> {
    fn evaluate(&self, j: usize) -> Hypothesis {
        let dist = self.center_nbr_dist[j].abs();
        if !(dist > self.config.abs_tolerant && dist > 0.0) {
            return Hypothesis::Rejected(Rejection::TooCloseToCenter);
        }

        let grid = Grid::new(self.grid_min, self.grid_max, self.center.position, dist);
        if grid.is_empty() {
            return Hypothesis::Rejected(Rejection::EmptyGrid);
        }

        let tol = (self.config.tolerant * dist).min(self.config.abs_tolerant);

        // (峰索引, 命中的网格倍数)
        let matched: Vec<(usize, i64)> = self
            .center_nbr_dist
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| {
                let (k, residual) = grid.nearest(d)?;
                (residual < tol).then_some((i, k))
            })
            .collect();

        let mut multiples: Vec<i64> = matched.iter().map(|&(_, k)| k).collect();
        multiples.sort_unstable();
        multiples.dedup();

        let max_step = self.config.allow_discontinue as i64 + 1;
        if multiples.windows(2).any(|w| w[1] - w[0] > max_step) {
            return Hypothesis::Rejected(Rejection::Discontinuous);
        }
        if multiples.len() < 2 {
            return Hypothesis::Rejected(Rejection::TooFewMultiples);
        }

        let spacings: Vec<f64> = matched
            .iter()
            .filter(|&&(_, k)| k != 0)
            .map(|&(i, k)| self.center_nbr_dist[i] / k as f64)
            .collect();
        let avg_dist = spacings.iter().sum::<f64>() / spacings.len() as f64;
        let avg_err =
            spacings.iter().map(|s| (s - avg_dist).abs()).sum::<f64>() / spacings.len() as f64;

        Hypothesis::Accepted(PeakFamily {
            peaks_family: matched.into_iter().map(|(i, _)| i).collect(),
            avg_dist,
            avg_err,
        })
    }
}

/// 以中心峰为原点搜索等间距峰族
///
/// `positions` 为峰位置（非降序），`center_target` 为中心目标坐标，
/// 网格限制在 `[grid_min, grid_max]` 内。找不到中心峰时返回空列表。
pub fn analyze_peaks_distance_cent(
    positions: &[f64],
    center_target: f64,
    grid_min: f64,
    grid_max: f64,
    config: &DistanceConfig,
) -> Result<Vec<PeakFamily>> {
    validate_positions(positions)?;

    let Some(center) = find_center_peak(positions, center_target, config.abs_tolerant) else {
        log::debug!(
            "no peak within {} of center {}, skipping periodicity search",
            config.abs_tolerant,
            center_target
        );
        return Ok(Vec::new());
    };

    let polar = distance_matrix(positions, true);
    let search = FamilySearch {
        center,
        center_nbr_dist: polar.row(center.index).to_vec(),
        grid_min,
        grid_max,
        config,
    };

    let mut visited = VisitedPairs::default();
    let mut families = Vec::new();

    for j in NeighborOrder::new(center.index, positions.len()) {
        if visited.contains(center.index, j) {
            continue;
        }
        match search.evaluate(j) {
            Hypothesis::Accepted(family) => {
                log::debug!(
                    "accepted family of {} peaks with spacing {:.3}",
                    family.len(),
                    family.avg_dist
                );
                visited.mark_all(&family.peaks_family);
                families.push(family);
            }
            Hypothesis::Rejected(reason) => {
                log::trace!("hypothesis from peak {} rejected: {:?}", j, reason);
            }
        }
    }

    Ok(families)
}

fn validate_positions(positions: &[f64]) -> Result<()> {
    if positions.iter().any(|p| !p.is_finite()) {
        return Err(RheedError::InvalidPeakIndices(
            "peak positions must be finite".to_string(),
        ));
    }
    if positions.windows(2).any(|w| w[1] < w[0]) {
        return Err(RheedError::InvalidPeakIndices(
            "peak positions must be sorted in ascending order".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(positions: &[f64], config: &DistanceConfig) -> Vec<PeakFamily> {
        analyze_peaks_distance_cent(positions, 60.0, 0.0, 120.0, config).unwrap()
    }

    #[test]
    fn test_no_center_peak_gives_empty_result() {
        let cfg = DistanceConfig::default().abs_tolerant(15.0);
        let families = run(&[10.0, 20.0, 30.0, 40.0, 100.0], &cfg);
        assert!(families.is_empty());
    }

    #[test]
    fn test_evenly_spaced_family() {
        let cfg = DistanceConfig::default().abs_tolerant(5.0);
        let families = run(&[40.0, 50.0, 60.0, 70.0, 80.0], &cfg);
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].peaks_family, vec![0, 1, 2, 3, 4]);
        assert!((families[0].avg_dist - 10.0).abs() < 1e-12);
        assert!(families[0].avg_err.abs() < 1e-12);
    }

    #[test]
    fn test_spacing_at_abs_tolerance_is_skipped() {
        // dist = 10 不大于 abs_tolerant = 10，只能由 dist = 20 构成族
        let families = run(&[40.0, 50.0, 60.0, 70.0, 80.0], &DistanceConfig::default());
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].peaks_family, vec![0, 2, 4]);
        assert!((families[0].avg_dist - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_refined_spacing_and_error() {
        let cfg = DistanceConfig::default().tolerant(0.1).abs_tolerant(5.0);
        let families = run(&[39.5, 50.0, 60.0, 70.5, 80.0], &cfg);
        assert_eq!(families.len(), 1);
        let fam = &families[0];
        assert_eq!(fam.peaks_family, vec![0, 1, 2, 3, 4]);
        // 各成员的间距估计: 10.25, 10, 10.5, 10
        assert!((fam.avg_dist - 10.1875).abs() < 1e-12);
        assert!((fam.avg_err - 0.1875).abs() < 1e-12);
    }

    #[test]
    fn test_two_interleaved_families() {
        let cfg = DistanceConfig::default().abs_tolerant(5.0);
        let positions = [24.0, 36.0, 42.0, 48.0, 60.0, 72.0, 78.0, 84.0, 96.0];
        let families = run(&positions, &cfg);
        assert!(families.len() >= 2);
        let spacings: Vec<f64> = families.iter().map(|f| f.avg_dist).collect();
        assert!(spacings.iter().any(|d| (d - 12.0).abs() < 1e-9));
        assert!(spacings.iter().any(|d| (d - 18.0).abs() < 1e-9));
    }

    #[test]
    fn test_discontinuity_rejected() {
        // 以 10 为间距时命中倍数 0, 1, 4：间隙 3 超过 allow_discontinue + 1
        let cfg = DistanceConfig::default().abs_tolerant(5.0);
        let families = run(&[60.0, 70.0, 100.0], &cfg);
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].peaks_family, vec![0, 2]);
        assert!((families[0].avg_dist - 40.0).abs() < 1e-12);

        let families = run(&[60.0, 70.0, 100.0], &cfg.allow_discontinue(2));
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].peaks_family, vec![0, 1, 2]);
        assert!((families[0].avg_dist - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_families_have_at_least_two_multiples() {
        let cfg = DistanceConfig::default().abs_tolerant(4.0);
        let positions = [3.0, 17.0, 29.0, 41.0, 47.0, 58.0, 61.0, 77.0, 90.0, 95.0, 113.0];
        let c = find_center_peak(&positions, 60.0, 4.0).unwrap().position;
        for fam in run(&positions, &cfg) {
            let mut ks: Vec<i64> = fam
                .peaks_family
                .iter()
                .map(|&i| ((positions[i] - c) / fam.avg_dist).round() as i64)
                .collect();
            ks.sort_unstable();
            ks.dedup();
            assert!(ks.len() >= 2);
        }
    }

    #[test]
    fn test_unsorted_positions_rejected() {
        let err = analyze_peaks_distance_cent(&[50.0, 40.0], 60.0, 0.0, 120.0, &DistanceConfig::default());
        assert!(matches!(err, Err(RheedError::InvalidPeakIndices(_))));
    }

    #[test]
    fn test_visited_pairs() {
        let mut v = VisitedPairs::default();
        v.mark_all(&[1, 4, 6]);
        assert!(v.contains(4, 1));
        assert!(v.contains(6, 4));
        assert!(v.contains(4, 4));
        assert!(!v.contains(1, 2));
    }
}
