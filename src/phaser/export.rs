//! # 结果导出
//!
//! 将聚类与周期分析结果导出为 CSV。
//!
//! ## 支持表格
//! - 簇均值: label, mean_dist, members
//! - 聚类样本: pattern, candidate, dist, label
//! - 强度表: pattern, 每个标签一列相对强度
//! - 峰族: family, avg_dist, avg_err, size, members, positions
//! - 峰组: group, avg_dist, leftover, members, positions
//!
//! 每个表格都有写入任意 `Write` 的 `write_*` 版本和写入文件的 `*_to_csv` 版本。
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{Result, RheedError};
use crate::periodicity::{PeakFamily, PeakGroup};
use crate::phaser::cluster::{ClusterMean, IntensityMap, PhaseSample};

use std::io::Write;
use std::path::Path;

fn join_members(members: &[usize]) -> String {
    members
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

fn join_positions(members: &[usize], positions: &[f64]) -> String {
    members
        .iter()
        .filter_map(|&m| positions.get(m))
        .map(|p| format!("{:.2}", p))
        .collect::<Vec<_>>()
        .join(";")
}

fn flush<W: Write>(wtr: &mut csv::Writer<W>, path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| RheedError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

// ─────────────────────────────────────────────────────────────
// 簇均值
// ─────────────────────────────────────────────────────────────

pub fn write_cluster_means<W: Write>(wtr: &mut csv::Writer<W>, means: &[ClusterMean]) -> Result<()> {
    wtr.write_record(["label", "mean_dist", "members"])?;
    for m in means {
        wtr.write_record([m.label.to_string(), format!("{:.6}", m.mean), m.members.to_string()])?;
    }
    Ok(())
}

pub fn cluster_means_to_csv(means: &[ClusterMean], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_cluster_means(&mut wtr, means)?;
    flush(&mut wtr, output_path)
}

/// `names[s.pattern]` 为样本所属图样名，越界时写下标
pub fn write_samples<W: Write>(wtr: &mut csv::Writer<W>, samples: &[PhaseSample], names: &[&str]) -> Result<()> {
    wtr.write_record(["pattern", "candidate", "dist", "label"])?;
    for s in samples {
        let pattern = names
            .get(s.pattern)
            .map_or_else(|| s.pattern.to_string(), |n| n.to_string());
        wtr.write_record([
            pattern,
            s.candidate.to_string(),
            format!("{:.6}", s.dist),
            s.label.to_string(),
        ])?;
    }
    Ok(())
}

pub fn samples_to_csv(samples: &[PhaseSample], names: &[&str], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_samples(&mut wtr, samples, names)?;
    flush(&mut wtr, output_path)
}

// ─────────────────────────────────────────────────────────────
// 强度表
// ─────────────────────────────────────────────────────────────

pub fn write_intensity_map<W: Write>(wtr: &mut csv::Writer<W>, map: &IntensityMap) -> Result<()> {
    let header: Vec<String> = std::iter::once("pattern".to_string())
        .chain(map.labels.iter().map(|l| format!("label_{}", l)))
        .collect();
    wtr.write_record(&header)?;

    for row in &map.rows {
        let record: Vec<String> = std::iter::once(row.pattern.clone())
            .chain(row.percents.iter().map(|p| format!("{:.6}", p)))
            .collect();
        wtr.write_record(&record)?;
    }
    Ok(())
}

pub fn intensity_map_to_csv(map: &IntensityMap, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_intensity_map(&mut wtr, map)?;
    flush(&mut wtr, output_path)
}

// ─────────────────────────────────────────────────────────────
// 峰族与峰组
// ─────────────────────────────────────────────────────────────

/// `positions` 为峰族成员下标所指向的峰位
pub fn write_families<W: Write>(
    wtr: &mut csv::Writer<W>,
    families: &[PeakFamily],
    positions: &[f64],
) -> Result<()> {
    wtr.write_record(["family", "avg_dist", "avg_err", "size", "members", "positions"])?;
    for (i, f) in families.iter().enumerate() {
        wtr.write_record([
            i.to_string(),
            format!("{:.4}", f.avg_dist),
            format!("{:.4}", f.avg_err),
            f.len().to_string(),
            join_members(&f.peaks_family),
            join_positions(&f.peaks_family, positions),
        ])?;
    }
    Ok(())
}

pub fn families_to_csv(families: &[PeakFamily], positions: &[f64], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_families(&mut wtr, families, positions)?;
    flush(&mut wtr, output_path)
}

pub fn write_groups<W: Write>(wtr: &mut csv::Writer<W>, groups: &[PeakGroup], positions: &[f64]) -> Result<()> {
    wtr.write_record(["group", "avg_dist", "leftover", "members", "positions"])?;
    for (i, g) in groups.iter().enumerate() {
        wtr.write_record([
            i.to_string(),
            format!("{:.4}", g.avg_dist),
            g.is_leftover().to_string(),
            join_members(&g.members),
            join_positions(&g.members, positions),
        ])?;
    }
    Ok(())
}

pub fn groups_to_csv(groups: &[PeakGroup], positions: &[f64], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_groups(&mut wtr, groups, positions)?;
    flush(&mut wtr, output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periodicity::LEFTOVER_DIST;
    use crate::phaser::cluster::IntensityRow;

    fn render(f: impl FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<()>) -> String {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        f(&mut wtr).unwrap();
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_cluster_means() {
        let means = vec![
            ClusterMean {
                label: 0,
                mean: 10.1,
                members: 2,
            },
            ClusterMean {
                label: 1,
                mean: 25.05,
                members: 2,
            },
        ];
        let out = render(|w| write_cluster_means(w, &means));
        assert_eq!(out, "label,mean_dist,members\n0,10.100000,2\n1,25.050000,2\n");
    }

    #[test]
    fn test_samples() {
        let samples = vec![
            PhaseSample {
                pattern: 0,
                candidate: 1,
                dist: 10.5,
                label: 0,
            },
            PhaseSample {
                pattern: 3,
                candidate: 0,
                dist: 40.0,
                label: -1,
            },
        ];
        let out = render(|w| write_samples(w, &samples, &["run_01"]));
        assert_eq!(
            out,
            "pattern,candidate,dist,label\nrun_01,1,10.500000,0\n3,0,40.000000,-1\n"
        );
    }

    #[test]
    fn test_intensity_map() {
        let map = IntensityMap {
            labels: vec![-1, 0],
            rows: vec![IntensityRow {
                pattern: "a.png".to_string(),
                percents: vec![0.25, 0.75],
            }],
        };
        let out = render(|w| write_intensity_map(w, &map));
        assert_eq!(out, "pattern,label_-1,label_0\na.png,0.250000,0.750000\n");
    }

    #[test]
    fn test_families_and_groups() {
        let families = vec![PeakFamily {
            peaks_family: vec![0, 2],
            avg_dist: 20.0,
            avg_err: 0.0,
        }];
        let positions = [30.0, 40.0, 50.0];
        let out = render(|w| write_families(w, &families, &positions));
        assert_eq!(
            out,
            "family,avg_dist,avg_err,size,members,positions\n0,20.0000,0.0000,2,0;2,30.00;50.00\n"
        );

        let groups = vec![PeakGroup {
            members: vec![1],
            avg_dist: LEFTOVER_DIST,
            family: None,
        }];
        let out = render(|w| write_groups(w, &groups, &positions));
        assert_eq!(out, "group,avg_dist,leftover,members,positions\n0,-1.0000,true,1,40.00\n");
    }

    #[test]
    fn test_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("means.csv");
        cluster_means_to_csv(&[], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "label,mean_dist,members\n");
    }
}
