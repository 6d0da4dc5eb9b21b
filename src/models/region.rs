//! # 区域数据模型
//!
//! 分割后的连通像素区域：包围盒、局部掩码及几何属性。
//!
//! ## 依赖关系
//! - 由 `phaser/segment.rs` 创建
//! - 被 `models/spectrum.rs` (CollapseSpectrum)、`phaser/mask.rs`、`phaser/intensity.rs` 使用

use ndarray::Array2;
use serde::Serialize;

/// 包围盒 `[min_row, max_row) × [min_col, max_col)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BBox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl BBox {
    pub fn new(min_row: usize, min_col: usize, max_row: usize, max_col: usize) -> Self {
        Self {
            min_row,
            min_col,
            max_row,
            max_col,
        }
    }

    pub fn height(&self) -> usize {
        self.max_row.saturating_sub(self.min_row)
    }

    pub fn width(&self) -> usize {
        self.max_col.saturating_sub(self.min_col)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// 像素是否位于包围盒内
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.min_row..self.max_row).contains(&row) && (self.min_col..self.max_col).contains(&col)
    }

    /// 包围盒是否完全落在 `(rows, cols)` 的图样内
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.min_row < self.max_row
            && self.min_col < self.max_col
            && self.max_row <= rows
            && self.max_col <= cols
    }
}

/// 连通区域
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// 区域编号（分割时的扫描顺序，从 0 开始）
    pub id: usize,
    pub bbox: BBox,
    /// 包围盒内的局部掩码，形状等于 `bbox.shape()`
    pub mask: Array2<bool>,
    /// 像素数
    pub area: usize,
    /// 几何质心 (row, col)
    pub centroid: (f64, f64),
    /// 强度加权质心，仅在分割时提供强度图才存在
    pub weighted_centroid: Option<(f64, f64)>,
}

impl Region {
    /// 全局像素 `(row, col)` 是否属于该区域
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.bbox.contains(row, col)
            && self
                .mask
                .get((row - self.bbox.min_row, col - self.bbox.min_col))
                .copied()
                .unwrap_or(false)
    }

    /// 优先使用强度加权质心
    pub fn center(&self) -> (f64, f64) {
        self.weighted_centroid.unwrap_or(self.centroid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bbox_geometry() {
        let b = BBox::new(2, 3, 5, 9);
        assert_eq!(b.shape(), (3, 6));
        assert!(b.contains(2, 3));
        assert!(!b.contains(5, 3));
        assert!(b.fits(5, 9));
        assert!(!b.fits(4, 9));
    }

    #[test]
    fn test_region_contains() {
        let region = Region {
            id: 0,
            bbox: BBox::new(1, 1, 3, 3),
            mask: array![[true, false], [true, true]],
            area: 3,
            centroid: (1.67, 1.33),
            weighted_centroid: None,
        };
        assert!(region.contains(1, 1));
        assert!(!region.contains(1, 2));
        assert!(region.contains(2, 2));
        assert!(!region.contains(0, 0));
        assert_eq!(region.center(), (1.67, 1.33));
    }
}
