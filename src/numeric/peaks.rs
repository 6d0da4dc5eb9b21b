//! # 一维峰值查找
//!
//! 与常见信号处理库的 `find_peaks` 语义一致：
//! 1. 寻找局部极大值（平台峰取中点）
//! 2. 依次按 height、threshold、prominence 过滤
//!
//! 返回的峰索引严格递增，且均位于 `0..len` 范围内。
//!
//! ## 依赖关系
//! - 被 `models/spectrum.rs` 调用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 峰值查找参数，`None` 表示不过滤
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakFindConfig {
    /// 最小峰高
    pub height: Option<f64>,
    /// 与相邻采样点的最小竖直距离
    pub threshold: Option<f64>,
    /// 最小突出度
    pub prominence: Option<f64>,
}

impl Default for PeakFindConfig {
    fn default() -> Self {
        Self {
            height: Some(0.001),
            threshold: Some(0.001),
            prominence: Some(0.10),
        }
    }
}

impl PeakFindConfig {
    pub fn height(mut self, height: Option<f64>) -> Self {
        self.height = height;
        self
    }

    pub fn threshold(mut self, threshold: Option<f64>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn prominence(mut self, prominence: Option<f64>) -> Self {
        self.prominence = prominence;
        self
    }
}

/// 峰属性，每个字段与返回的峰索引一一对应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakProperties {
    pub peak_heights: Vec<f64>,
    pub left_thresholds: Vec<f64>,
    pub right_thresholds: Vec<f64>,
    pub prominences: Vec<f64>,
    pub left_bases: Vec<usize>,
    pub right_bases: Vec<usize>,
}

impl PeakProperties {
    fn retain(&mut self, keep: &[bool]) {
        fn filter<T: Copy>(values: &mut Vec<T>, keep: &[bool]) {
            let mut it = keep.iter();
            values.retain(|_| *it.next().unwrap_or(&false));
        }
        filter(&mut self.peak_heights, keep);
        filter(&mut self.left_thresholds, keep);
        filter(&mut self.right_thresholds, keep);
        filter(&mut self.prominences, keep);
        filter(&mut self.left_bases, keep);
        filter(&mut self.right_bases, keep);
    }
}

/// 查找峰值
pub fn find_peaks(x: &[f64], config: &PeakFindConfig) -> (Vec<usize>, PeakProperties) {
    let mut peaks = local_maxima(x);

    let mut props = PeakProperties {
        peak_heights: peaks.iter().map(|&p| x[p]).collect(),
        left_thresholds: peaks.iter().map(|&p| x[p] - x[p - 1]).collect(),
        right_thresholds: peaks.iter().map(|&p| x[p] - x[p + 1]).collect(),
        ..Default::default()
    };
    let (prominences, left_bases, right_bases) = peak_prominences(x, &peaks);
    props.prominences = prominences;
    props.left_bases = left_bases;
    props.right_bases = right_bases;

    if let Some(hmin) = config.height {
        let keep: Vec<bool> = props.peak_heights.iter().map(|&h| h >= hmin).collect();
        apply(&mut peaks, &mut props, &keep);
    }

    if let Some(tmin) = config.threshold {
        let keep: Vec<bool> = props
            .left_thresholds
            .iter()
            .zip(&props.right_thresholds)
            .map(|(l, r)| l.min(*r) >= tmin)
            .collect();
        apply(&mut peaks, &mut props, &keep);
    }

    if let Some(pmin) = config.prominence {
        let keep: Vec<bool> = props.prominences.iter().map(|&p| p >= pmin).collect();
        apply(&mut peaks, &mut props, &keep);
    }

    (peaks, props)
}

fn apply(peaks: &mut Vec<usize>, props: &mut PeakProperties, keep: &[bool]) {
    let mut it = keep.iter();
    peaks.retain(|_| *it.next().unwrap_or(&false));
    props.retain(keep);
}

/// 局部极大值（平台峰取中点，边界点不算峰）
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut midpoints = Vec::new();
    if x.len() < 3 {
        return midpoints;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                midpoints.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    midpoints
}

/// 计算每个峰的突出度及左右基点
fn peak_prominences(x: &[f64], peaks: &[usize]) -> (Vec<f64>, Vec<usize>, Vec<usize>) {
    let mut prominences = Vec::with_capacity(peaks.len());
    let mut left_bases = Vec::with_capacity(peaks.len());
    let mut right_bases = Vec::with_capacity(peaks.len());

    for &peak in peaks {
        let height = x[peak];

        let mut left_min = height;
        let mut left_base = peak;
        let mut i = peak as isize;
        while i >= 0 && x[i as usize] <= height {
            if x[i as usize] < left_min {
                left_min = x[i as usize];
                left_base = i as usize;
            }
            i -= 1;
        }

        let mut right_min = height;
        let mut right_base = peak;
        let mut j = peak;
        while j < x.len() && x[j] <= height {
            if x[j] < right_min {
                right_min = x[j];
                right_base = j;
            }
            j += 1;
        }

        prominences.push(height - left_min.max(right_min));
        left_bases.push(left_base);
        right_bases.push(right_base);
    }

    (prominences, left_bases, right_bases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_filter() -> PeakFindConfig {
        PeakFindConfig {
            height: None,
            threshold: None,
            prominence: None,
        }
    }

    #[test]
    fn test_local_maxima_simple() {
        let data = vec![0.0, 1.0, 0.5, 3.0, 0.2, 2.0, 0.1];
        let (peaks, props) = find_peaks(&data, &no_filter());
        assert_eq!(peaks, vec![1, 3, 5]);
        assert_eq!(props.peak_heights, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_plateau_takes_midpoint() {
        let data = vec![0.0, 1.0, 1.0, 1.0, 0.0];
        let (peaks, _) = find_peaks(&data, &no_filter());
        assert_eq!(peaks, vec![2]);
    }

    #[test]
    fn test_edges_are_not_peaks() {
        let data = vec![5.0, 1.0, 0.0, 1.0, 5.0];
        let (peaks, _) = find_peaks(&data, &no_filter());
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_prominence() {
        let data = vec![0.0, 1.0, 0.5, 3.0, 0.2, 2.0, 0.1];
        let (_, props) = find_peaks(&data, &no_filter());
        // 峰 1: 左侧最低 0.0，右侧在遇到 3.0 前最低 0.5
        assert!((props.prominences[0] - 0.5).abs() < 1e-12);
        assert!((props.prominences[1] - 2.9).abs() < 1e-12);
        assert!((props.prominences[2] - 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_filters() {
        let data = vec![0.0, 1.0, 0.5, 3.0, 0.2, 2.0, 0.1];
        let cfg = no_filter().height(Some(1.5));
        let (peaks, props) = find_peaks(&data, &cfg);
        assert_eq!(peaks, vec![3, 5]);
        assert_eq!(props.prominences.len(), 2);

        let cfg = no_filter().prominence(Some(1.0));
        let (peaks, _) = find_peaks(&data, &cfg);
        assert_eq!(peaks, vec![3, 5]);

        let cfg = no_filter().threshold(Some(0.6));
        let (peaks, _) = find_peaks(&data, &cfg);
        assert_eq!(peaks, vec![3, 5]);
    }

    #[test]
    fn test_short_input() {
        let (peaks, props) = find_peaks(&[1.0, 2.0], &PeakFindConfig::default());
        assert!(peaks.is_empty());
        assert!(props.prominences.is_empty());
    }
}
