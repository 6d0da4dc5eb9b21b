//! # 连通区域分割
//!
//! 对二值掩码做 8 连通标记，生成 `Region` 列表。
//! 区域编号按光栅扫描时首个像素出现的顺序分配。
//!
//! ## 依赖关系
//! - 使用 `models/region.rs`
//! - 被 `phaser/mask.rs` 调用

use crate::error::{Result, RheedError};
use crate::models::region::{BBox, Region};

use ndarray::{s, Array2};
use std::collections::VecDeque;

const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// 标记连通区域
///
/// 提供 `intensity` 时同时计算强度加权质心，其形状必须与掩码一致。
pub fn label_regions(mask: &Array2<bool>, intensity: Option<&Array2<f64>>) -> Result<Vec<Region>> {
    if let Some(img) = intensity {
        if img.dim() != mask.dim() {
            return Err(RheedError::ShapeMismatch {
                what: "intensity image".to_string(),
                expected: mask.dim(),
                actual: img.dim(),
            });
        }
    }

    let (rows, cols) = mask.dim();
    let mut labels: Array2<usize> = Array2::zeros((rows, cols));
    let mut regions = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if !mask[[r, c]] || labels[[r, c]] != 0 {
                continue;
            }
            let label = regions.len() + 1;
            let pixels = flood_fill(mask, &mut labels, (r, c), label);
            regions.push(build_region(regions.len(), &pixels, &labels, label, intensity));
        }
    }

    log::debug!("labelled {} connected regions", regions.len());
    Ok(regions)
}

fn flood_fill(
    mask: &Array2<bool>,
    labels: &mut Array2<usize>,
    seed: (usize, usize),
    label: usize,
) -> Vec<(usize, usize)> {
    let (rows, cols) = mask.dim();
    let mut pixels = Vec::new();
    let mut queue = VecDeque::from([seed]);
    labels[seed] = label;

    while let Some((r, c)) = queue.pop_front() {
        pixels.push((r, c));
        for (dr, dc) in NEIGHBORS {
            let nr = r as isize + dr;
            let nc = c as isize + dc;
            if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                continue;
            }
            let next = (nr as usize, nc as usize);
            if mask[next] && labels[next] == 0 {
                labels[next] = label;
                queue.push_back(next);
            }
        }
    }
    pixels
}

fn build_region(
    id: usize,
    pixels: &[(usize, usize)],
    labels: &Array2<usize>,
    label: usize,
    intensity: Option<&Array2<f64>>,
) -> Region {
    let min_row = pixels.iter().map(|p| p.0).min().unwrap_or(0);
    let max_row = pixels.iter().map(|p| p.0).max().unwrap_or(0) + 1;
    let min_col = pixels.iter().map(|p| p.1).min().unwrap_or(0);
    let max_col = pixels.iter().map(|p| p.1).max().unwrap_or(0) + 1;
    let bbox = BBox::new(min_row, min_col, max_row, max_col);

    let local = labels
        .slice(s![min_row..max_row, min_col..max_col])
        .mapv(|l| l == label);

    let area = pixels.len();
    let n = area as f64;
    let centroid = (
        pixels.iter().map(|p| p.0 as f64).sum::<f64>() / n,
        pixels.iter().map(|p| p.1 as f64).sum::<f64>() / n,
    );

    let weighted_centroid = intensity.and_then(|img| {
        let total: f64 = pixels.iter().map(|&p| img[p]).sum();
        if total == 0.0 || !total.is_finite() {
            return None;
        }
        Some((
            pixels.iter().map(|&p| p.0 as f64 * img[p]).sum::<f64>() / total,
            pixels.iter().map(|&p| p.1 as f64 * img[p]).sum::<f64>() / total,
        ))
    });

    Region {
        id,
        bbox,
        mask: local,
        area,
        centroid,
        weighted_centroid,
    }
}

/// 保留面积不小于 `min_area` 的区域，并重新编号
pub fn filter_regions(regions: Vec<Region>, min_area: usize) -> Vec<Region> {
    regions
        .into_iter()
        .filter(|r| r.area >= min_area)
        .enumerate()
        .map(|(id, mut r)| {
            r.id = id;
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn mask() -> Array2<bool> {
        array![
            [true, true, false, false, false],
            [false, true, false, false, true],
            [false, false, true, false, true],
            [false, false, false, false, false],
            [true, false, false, false, false]
        ]
    }

    #[test]
    fn test_eight_connectivity() {
        let regions = label_regions(&mask(), None).unwrap();
        assert_eq!(regions.len(), 3);

        // 对角相连的 (0,0),(0,1),(1,1),(2,2) 为同一区域
        assert_eq!(regions[0].area, 4);
        assert_eq!(regions[0].bbox, BBox::new(0, 0, 3, 3));
        assert!(regions[0].contains(2, 2));
        assert!(!regions[0].contains(1, 0));

        assert_eq!(regions[1].area, 2);
        assert_eq!(regions[1].bbox, BBox::new(1, 4, 3, 5));
        assert_eq!(regions[2].bbox, BBox::new(4, 0, 5, 1));
    }

    #[test]
    fn test_centroids() {
        let intensity = Array2::from_shape_fn((5, 5), |(r, _)| if r == 2 { 3.0 } else { 1.0 });
        let regions = label_regions(&mask(), Some(&intensity)).unwrap();
        let r = &regions[1];
        assert_eq!(r.centroid, (1.5, 4.0));
        let (wr, wc) = r.weighted_centroid.unwrap();
        assert!((wr - 1.75).abs() < 1e-12);
        assert!((wc - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_filter_regions_reindexes() {
        let regions = label_regions(&mask(), None).unwrap();
        let kept = filter_regions(regions, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].id, 1);
        assert_eq!(kept[1].area, 2);
    }

    #[test]
    fn test_intensity_shape_checked() {
        let err = label_regions(&mask(), Some(&Array2::zeros((2, 2))));
        assert!(matches!(err, Err(RheedError::ShapeMismatch { .. })));
    }
}
