//! # 峰间距几何
//!
//! 周期族搜索所需的基础几何量：
//! - 峰间距离（压缩下三角列表或完整矩阵，完整矩阵可极化为 `d[i,j] = -d[j,i]`）
//! - 中心峰选择
//! - 近到远、左右交替的邻峰访问顺序
//! - 以中心峰为原点、给定间距的等差网格
//!
//! ## 依赖关系
//! - 被 `periodicity/family.rs` 和 `models/spectrum.rs` 使用
//! - 使用 `ndarray` 存储距离矩阵

use ndarray::Array2;

/// 压缩形式的峰间距离：按行遍历严格下三角 `(i, j), j < i`
pub fn condensed_distances(positions: &[f64]) -> Vec<f64> {
    let n = positions.len();
    let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in 0..i {
            out.push((positions[i] - positions[j]).abs());
        }
    }
    out
}

/// 完整峰间距离矩阵
///
/// `polar` 为真时下三角取负，`d[i,j]` 表示从峰 `i` 指向峰 `j` 的有符号距离
/// （对已排序的位置即 `positions[j] - positions[i]`）。
pub fn distance_matrix(positions: &[f64], polar: bool) -> Array2<f64> {
    let n = positions.len();
    Array2::from_shape_fn((n, n), |(i, j)| {
        let d = (positions[i] - positions[j]).abs();
        if polar && j < i {
            -d
        } else {
            d
        }
    })
}

/// 中心峰
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterPeak {
    /// 在峰列表中的索引
    pub index: usize,
    /// 峰位置
    pub position: f64,
    /// 到中心目标的绝对距离
    pub offset: f64,
}

/// 选择离 `target` 最近的峰作为中心峰
///
/// 最近距离超过 `abs_tolerant` 时返回 `None`；距离相同时取索引较小者。
pub fn find_center_peak(positions: &[f64], target: f64, abs_tolerant: f64) -> Option<CenterPeak> {
    let (index, offset) = positions
        .iter()
        .map(|p| (p - target).abs())
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((i, d)),
        })?;

    if offset > abs_tolerant {
        return None;
    }
    Some(CenterPeak {
        index,
        position: positions[index],
        offset,
    })
}

/// 所有距 `target` 严格小于 `abs_tolerant` 的峰索引
pub fn center_peak_indices(positions: &[f64], target: f64, abs_tolerant: f64) -> Vec<usize> {
    positions
        .iter()
        .enumerate()
        .filter(|(_, p)| (*p - target).abs() < abs_tolerant)
        .map(|(i, _)| i)
        .collect()
}

/// 中心峰两侧的邻峰访问顺序
///
/// 依次产出 `c-1, c+1, c-2, c+2, ...`，一侧耗尽后继续另一侧直至末端。
#[derive(Debug, Clone)]
pub struct NeighborOrder {
    center: usize,
    len: usize,
    level: usize,
    right_next: bool,
}

impl NeighborOrder {
    pub fn new(center: usize, len: usize) -> Self {
        Self {
            center,
            len,
            level: 1,
            right_next: false,
        }
    }
}

impl Iterator for NeighborOrder {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            let left_done = self.level > self.center;
            let right_done = self.center + self.level >= self.len;
            if left_done && right_done {
                return None;
            }

            if !self.right_next {
                self.right_next = true;
                if !left_done {
                    return Some(self.center - self.level);
                }
            } else {
                self.right_next = false;
                self.level += 1;
                if !right_done {
                    return Some(self.center + self.level - 1);
                }
            }
        }
    }
}

/// 以中心峰为原点的等差网格
///
/// 只包含满足 `start < center + k·dist <= end` 的整数倍 `k`。
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    dist: f64,
    k_min: i64,
    k_max: i64,
}

impl Grid {
    /// 在 `[start, end]` 内创建间距为 `dist` 的网格
    pub fn new(start: f64, end: f64, center: f64, dist: f64) -> Self {
        let k_min = ((start - center) / dist).floor() as i64 + 1;
        let k_max = ((end - center) / dist).floor() as i64;
        Self { dist, k_min, k_max }
    }

    pub fn is_empty(&self) -> bool {
        self.k_max < self.k_min
    }

    /// 离有符号偏移 `offset` 最近的网格倍数及残差，等距时取较小倍数
    pub fn nearest(&self, offset: f64) -> Option<(i64, f64)> {
        if self.is_empty() || !offset.is_finite() {
            return None;
        }
        let lower = (offset / self.dist).floor() as i64;
        let k = if (offset - lower as f64 * self.dist).abs()
            <= ((lower + 1) as f64 * self.dist - offset).abs()
        {
            lower
        } else {
            lower + 1
        };
        let k = k.clamp(self.k_min, self.k_max);
        Some((k, (offset - k as f64 * self.dist).abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condensed_distances() {
        let d = condensed_distances(&[0.0, 3.0, 10.0]);
        assert_eq!(d, vec![3.0, 10.0, 7.0]);
    }

    #[test]
    fn test_polar_matrix_is_antisymmetric() {
        let positions = [10.0, 25.0, 40.0, 70.0];
        let m = distance_matrix(&positions, true);
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(m[[i, j]], -m[[j, i]]);
                assert_eq!(m[[i, j]], positions[j] - positions[i]);
            }
        }
        let plain = distance_matrix(&positions, false);
        assert!(plain.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_center_peak_selection() {
        let positions = [40.0, 50.0, 60.0, 70.0, 80.0];
        let c = find_center_peak(&positions, 60.0, 10.0).unwrap();
        assert_eq!(c.index, 2);
        assert_eq!(c.offset, 0.0);
    }

    #[test]
    fn test_center_peak_too_far() {
        let positions = [10.0, 20.0, 30.0, 40.0, 100.0];
        assert!(find_center_peak(&positions, 60.0, 15.0).is_none());
        assert_eq!(find_center_peak(&positions, 60.0, 20.0).unwrap().index, 3);
        assert!(find_center_peak(&[], 60.0, 15.0).is_none());
    }

    #[test]
    fn test_center_peak_indices() {
        let positions = [48.0, 55.0, 60.0, 66.0, 90.0];
        assert_eq!(center_peak_indices(&positions, 60.0, 6.0), vec![1, 2]);
        assert_eq!(center_peak_indices(&positions, 60.0, 6.5), vec![1, 2, 3]);
    }

    #[test]
    fn test_neighbor_order() {
        let order: Vec<usize> = NeighborOrder::new(3, 5).collect();
        assert_eq!(order, vec![2, 4, 1, 0]);

        let order: Vec<usize> = NeighborOrder::new(1, 6).collect();
        assert_eq!(order, vec![0, 2, 3, 4, 5]);

        let order: Vec<usize> = NeighborOrder::new(0, 1).collect();
        assert!(order.is_empty());
    }

    #[test]
    fn test_grid_bounds() {
        // 倍数范围 [-5, 6]，起点本身不在网格上
        let grid = Grid::new(0.0, 120.0, 60.0, 10.0);
        assert_eq!(grid.nearest(-1000.0), Some((-5, 950.0)));
        assert_eq!(grid.nearest(1000.0), Some((6, 940.0)));

        let empty = Grid::new(0.0, 5.0, 60.0, 10.0);
        assert!(empty.is_empty());
        assert_eq!(empty.nearest(0.0), None);
    }

    #[test]
    fn test_grid_nearest() {
        let grid = Grid::new(0.0, 120.0, 60.0, 10.0);
        assert_eq!(grid.nearest(19.0), Some((2, 1.0)));
        assert_eq!(grid.nearest(-21.0), Some((-2, 1.0)));
        // 等距取较小倍数
        assert_eq!(grid.nearest(15.0), Some((1, 5.0)));
        // 超出范围时夹到边界
        assert_eq!(grid.nearest(-80.0), Some((-5, 30.0)));
    }
}
