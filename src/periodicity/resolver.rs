//! # 峰组划分
//!
//! 将可能相互重叠的峰族转换为互斥的峰组划分：
//! 按间距从小到大贪心接受峰族，`exclusive` 时拒绝与已接受峰族共享成员的峰族，
//! 最后将未被认领的峰收集为一个间距为 `LEFTOVER_DIST` 的剩余组。
//!
//! ## 依赖关系
//! - 使用 `periodicity/family.rs` 的 `PeakFamily`
//! - 被 `models/spectrum.rs`、`phaser/mask.rs` 和 `commands/` 使用

use super::family::PeakFamily;
use crate::error::{Result, RheedError};

use serde::Serialize;

/// 剩余组的间距标记值
///
/// 与聚类的离群标签是不同的概念，二者不会合并。
pub const LEFTOVER_DIST: f64 = -1.0;

/// 划分中的一个峰组
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakGroup {
    /// 成员峰索引（升序）
    pub members: Vec<usize>,
    /// 峰组间距，剩余组为 `LEFTOVER_DIST`
    pub avg_dist: f64,
    /// 来源峰族在输入列表中的索引，剩余组为 `None`
    pub family: Option<usize>,
}

impl PeakGroup {
    pub fn is_leftover(&self) -> bool {
        self.family.is_none()
    }
}

/// 峰组划分
///
/// 返回按间距升序排列的峰组，剩余组（可能为空）总在最后。
pub fn get_peaks_group(
    families: &[PeakFamily],
    n_peaks: usize,
    exclusive: bool,
) -> Result<Vec<PeakGroup>> {
    for (fi, family) in families.iter().enumerate() {
        if let Some(&bad) = family.peaks_family.iter().find(|&&p| p >= n_peaks) {
            return Err(RheedError::InvalidPeakIndices(format!(
                "family {} refers to peak {} but only {} peaks exist",
                fi, bad, n_peaks
            )));
        }
    }

    let mut order: Vec<usize> = (0..families.len())
        .filter(|&i| families[i].avg_dist.is_finite())
        .collect();
    order.sort_by(|&a, &b| families[a].avg_dist.total_cmp(&families[b].avg_dist));

    let mut claimed = vec![false; n_peaks];
    let mut groups = Vec::with_capacity(order.len() + 1);

    for fi in order {
        let family = &families[fi];
        if exclusive && family.peaks_family.iter().any(|&p| claimed[p]) {
            log::trace!(
                "family {} (spacing {:.3}) overlaps a tighter family, dropped",
                fi,
                family.avg_dist
            );
            continue;
        }
        for &p in &family.peaks_family {
            claimed[p] = true;
        }
        groups.push(PeakGroup {
            members: family.peaks_family.clone(),
            avg_dist: family.avg_dist,
            family: Some(fi),
        });
    }

    groups.push(PeakGroup {
        members: (0..n_peaks).filter(|&p| !claimed[p]).collect(),
        avg_dist: LEFTOVER_DIST,
        family: None,
    });

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn fam(members: &[usize], avg_dist: f64) -> PeakFamily {
        PeakFamily {
            peaks_family: members.to_vec(),
            avg_dist,
            avg_err: 0.0,
        }
    }

    #[test]
    fn test_exclusive_prefers_smaller_spacing() {
        let families = vec![fam(&[0, 2, 4], 20.0), fam(&[0, 1, 2, 3, 4], 10.0), fam(&[5, 6], 30.0)];
        let groups = get_peaks_group(&families, 8, true).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].members, vec![0, 1, 2, 3, 4]);
        assert_eq!(groups[0].family, Some(1));
        assert_eq!(groups[1].members, vec![5, 6]);
        assert_eq!(groups[2].members, vec![7]);
        assert!(groups[2].is_leftover());
        assert_eq!(groups[2].avg_dist, LEFTOVER_DIST);
    }

    #[test]
    fn test_non_exclusive_keeps_overlaps() {
        let families = vec![fam(&[0, 2, 4], 20.0), fam(&[0, 1, 2, 3, 4], 10.0)];
        let groups = get_peaks_group(&families, 5, false).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].avg_dist, 10.0);
        assert_eq!(groups[1].avg_dist, 20.0);
        assert!(groups[2].members.is_empty());
    }

    #[test]
    fn test_non_finite_distances_dropped() {
        let families = vec![fam(&[0, 1], f64::INFINITY), fam(&[1, 2], f64::NAN)];
        let groups = get_peaks_group(&families, 3, true).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn test_partition_covers_all_peaks() {
        let families = vec![
            fam(&[1, 3, 5, 7], 12.0),
            fam(&[0, 3, 6], 18.0),
            fam(&[2, 4, 6, 8], 11.5),
            fam(&[0, 9], 40.0),
        ];
        let groups = get_peaks_group(&families, 11, true).unwrap();

        let mut seen = BTreeSet::new();
        for g in groups.iter().filter(|g| !g.is_leftover()) {
            for &m in &g.members {
                assert!(seen.insert(m), "peak {} claimed twice", m);
            }
        }
        let leftover = groups.last().unwrap();
        assert!(leftover.is_leftover());
        for &m in &leftover.members {
            assert!(seen.insert(m));
        }
        assert_eq!(seen, (0..11).collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_out_of_range_member_is_error() {
        let families = vec![fam(&[0, 5], 10.0)];
        let err = get_peaks_group(&families, 3, true);
        assert!(matches!(err, Err(RheedError::InvalidPeakIndices(_))));
    }
}
