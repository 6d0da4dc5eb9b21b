//! # 一维 DBSCAN 密度聚类
//!
//! - 邻域包含点自身，距离 `<= eps` 视为邻居
//! - 邻域大小 `>= min_samples` 的点为核心点
//! - 无法从任何核心点到达的点标记为 `NOISE`
//!
//! 簇编号按首次发现顺序从 0 开始；调用方如需按簇均值排序应自行重编号。
//!
//! ## 依赖关系
//! - 被 `phaser/cluster.rs` 调用
//! - 无外部模块依赖

use std::collections::VecDeque;

/// 噪声点标签
pub const NOISE: i32 = -1;

/// 一维密度聚类接口
pub trait DensityClustering {
    /// 为每个输入值分配一个标签，`NOISE` 表示离群点
    fn fit_predict(&self, values: &[f64]) -> Vec<i32>;
}

/// DBSCAN 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    pub eps: f64,
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    fn neighbors(&self, values: &[f64], i: usize) -> Vec<usize> {
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| (*v - values[i]).abs() <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(3.0, 1)
    }
}

impl DensityClustering for Dbscan {
    fn fit_predict(&self, values: &[f64]) -> Vec<i32> {
        let n = values.len();
        let mut labels = vec![NOISE; n];
        let mut visited = vec![false; n];

        let neighborhoods: Vec<Vec<usize>> = (0..n).map(|i| self.neighbors(values, i)).collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|nb| nb.len() >= self.min_samples)
            .collect();

        let mut cluster = 0;
        for start in 0..n {
            if visited[start] || !is_core[start] {
                continue;
            }

            let mut queue = VecDeque::from([start]);
            visited[start] = true;
            while let Some(p) = queue.pop_front() {
                labels[p] = cluster;
                if !is_core[p] {
                    continue;
                }
                for &q in &neighborhoods[p] {
                    if !visited[q] {
                        visited[q] = true;
                        queue.push_back(q);
                    } else if labels[q] == NOISE {
                        labels[q] = cluster;
                    }
                }
            }
            cluster += 1;
        }

        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_clusters() {
        let values = vec![10.0, 10.5, 11.0, 30.0, 30.2];
        let labels = Dbscan::new(1.0, 2).fit_predict(&values);
        assert_eq!(labels, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_noise() {
        let values = vec![1.0, 1.2, 50.0];
        let labels = Dbscan::new(0.5, 2).fit_predict(&values);
        assert_eq!(labels, vec![0, 0, NOISE]);
    }

    #[test]
    fn test_min_samples_one_has_no_noise() {
        let values = vec![1.0, 20.0, 40.0];
        let labels = Dbscan::new(3.0, 1).fit_predict(&values);
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_chain_through_core_points() {
        // 相邻间距 2.5 < eps，整条链连成一个簇
        let values = vec![0.0, 2.5, 5.0, 7.5, 10.0];
        let labels = Dbscan::new(3.0, 2).fit_predict(&values);
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // 3.5 只有 2 个邻居（自身和 2.0），不是核心点，但可由 2.0 到达
        let values = vec![0.0, 1.0, 2.0, 3.5];
        let labels = Dbscan::new(1.5, 3).fit_predict(&values);
        assert_eq!(labels, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(Dbscan::default().fit_predict(&[]).is_empty());
    }
}
