//! # 终端报表
//!
//! 各子命令共用的表格输出：峰表、峰间距矩阵、峰族表、峰组表、区域表、
//! 混合模型分量表、簇均值表与强度表。
//!
//! ## 依赖关系
//! - 被 `commands/spectrum.rs`、`commands/analyze.rs`、`commands/phase.rs` 使用
//! - 使用 `tabled` 渲染表格

use crate::error::Result;
use crate::models::{PeakDistances, Region, Spectrum};
use crate::numeric::peaks::PeakProperties;
use crate::periodicity::{PeakFamily, PeakGroup};
use crate::phaser::{ClusterMean, FitQuality, IntensityMap, MixtureConfig, MixtureModel, NOISE_LABEL};
use crate::utils::output;

use ndarray::Array2;
use tabled::builder::Builder;
use tabled::{Table, Tabled};

fn join_positions(members: &[usize], positions: &[f64]) -> String {
    members
        .iter()
        .filter_map(|&m| positions.get(m))
        .map(|p| format!("{:.1}", p))
        .collect::<Vec<_>>()
        .join(", ")
}

fn label_name(label: i32) -> String {
    if label == NOISE_LABEL {
        "noise".to_string()
    } else {
        label.to_string()
    }
}

// ─────────────────────────────────────────────────────────────
// 峰、峰族、峰组
// ─────────────────────────────────────────────────────────────

pub fn print_peak_table(title: &str, peaks: &[usize], positions: &[f64], props: &PeakProperties) {
    #[derive(Tabled)]
    struct PeakRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Sample")]
        sample: usize,
        #[tabled(rename = "Position")]
        position: String,
        #[tabled(rename = "Height")]
        height: String,
        #[tabled(rename = "Prominence")]
        prominence: String,
    }

    let fmt = |v: Option<&f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
    let rows: Vec<PeakRow> = peaks
        .iter()
        .zip(positions)
        .enumerate()
        .map(|(i, (&p, &pos))| PeakRow {
            index: i,
            sample: p,
            position: format!("{:.2}", pos),
            height: fmt(props.peak_heights.get(i)),
            prominence: fmt(props.prominences.get(i)),
        })
        .collect();

    if !rows.is_empty() {
        output::print_header(title);
        println!("{}", Table::new(&rows));
    }
}

/// 最小峰间距，少于两个峰时为 None
pub fn min_spacing(distances: &PeakDistances) -> Option<f64> {
    match distances {
        PeakDistances::Condensed(d) => d.iter().copied().reduce(f64::min),
        PeakDistances::Full(m) => m
            .indexed_iter()
            .filter(|((i, j), _)| i != j)
            .map(|(_, d)| d.abs())
            .reduce(f64::min),
    }
}

/// 行列均以峰位标注
pub fn print_distance_matrix(matrix: &Array2<f64>, positions: &[f64]) {
    if matrix.is_empty() {
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(std::iter::once(String::new()).chain(positions.iter().map(|p| format!("{:.1}", p))));
    for (row, p) in matrix.rows().into_iter().zip(positions) {
        builder.push_record(std::iter::once(format!("{:.1}", p)).chain(row.iter().map(|d| format!("{:.2}", d))));
    }

    output::print_header("Peak Distances");
    println!("{}", builder.build());
}

pub fn print_family_table(families: &[PeakFamily], positions: &[f64]) {
    #[derive(Tabled)]
    struct FamilyRow {
        #[tabled(rename = "Family")]
        index: usize,
        #[tabled(rename = "Avg dist")]
        avg_dist: String,
        #[tabled(rename = "Avg err")]
        avg_err: String,
        #[tabled(rename = "Peaks")]
        size: usize,
        #[tabled(rename = "Positions")]
        positions: String,
    }

    let rows: Vec<FamilyRow> = families
        .iter()
        .enumerate()
        .map(|(i, f)| FamilyRow {
            index: i,
            avg_dist: format!("{:.3}", f.avg_dist),
            avg_err: format!("{:.3}", f.avg_err),
            size: f.len(),
            positions: join_positions(&f.peaks_family, positions),
        })
        .collect();

    output::print_header(&format!("Periodic Families ({})", rows.len()));
    if rows.is_empty() {
        output::print_info("No periodic family detected");
    } else {
        println!("{}", Table::new(&rows));
    }
}

pub fn print_group_table(groups: &[PeakGroup], positions: &[f64]) {
    #[derive(Tabled)]
    struct GroupRow {
        #[tabled(rename = "Group")]
        index: usize,
        #[tabled(rename = "Avg dist")]
        avg_dist: String,
        #[tabled(rename = "Family")]
        family: String,
        #[tabled(rename = "Positions")]
        positions: String,
    }

    let rows: Vec<GroupRow> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| !g.members.is_empty())
        .map(|(i, g)| GroupRow {
            index: i,
            avg_dist: if g.is_leftover() {
                "leftover".to_string()
            } else {
                format!("{:.3}", g.avg_dist)
            },
            family: g.family.map_or_else(|| "-".to_string(), |f| f.to_string()),
            positions: join_positions(&g.members, positions),
        })
        .collect();

    if !rows.is_empty() {
        output::print_header("Peak Groups");
        println!("{}", Table::new(&rows));
    }
}

// ─────────────────────────────────────────────────────────────
// 区域
// ─────────────────────────────────────────────────────────────

/// `region_peaks[i]` 为第 i 个区域投影光谱上的峰坐标
pub fn print_region_table(regions: &[Region], region_positions: &[Vec<f64>]) {
    #[derive(Tabled)]
    struct RegionRow {
        #[tabled(rename = "Region")]
        id: usize,
        #[tabled(rename = "BBox (r0,c0,r1,c1)")]
        bbox: String,
        #[tabled(rename = "Area")]
        area: usize,
        #[tabled(rename = "Center (r,c)")]
        center: String,
        #[tabled(rename = "Peaks")]
        peaks: String,
    }

    let rows: Vec<RegionRow> = regions
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (row, col) = r.center();
            RegionRow {
                id: r.id,
                bbox: format!(
                    "{},{},{},{}",
                    r.bbox.min_row, r.bbox.min_col, r.bbox.max_row, r.bbox.max_col
                ),
                area: r.area,
                center: format!("{:.1}, {:.1}", row, col),
                peaks: region_positions
                    .get(i)
                    .map(|ps| ps.iter().map(|p| format!("{:.1}", p)).collect::<Vec<_>>().join(", "))
                    .unwrap_or_default(),
            }
        })
        .collect();

    output::print_header(&format!("Regions ({})", rows.len()));
    println!("{}", Table::new(&rows));
}

// ─────────────────────────────────────────────────────────────
// 混合模型分解
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Ok,
    Suspicious,
    /// 拟合失败，使用初始猜测
    Fallback,
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitStatus::Ok => write!(f, "ok"),
            FitStatus::Suspicious => write!(f, "suspicious"),
            FitStatus::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decomposition {
    /// 所属区域，一维光谱为 None
    pub region: Option<usize>,
    pub model: MixtureModel,
    pub status: FitStatus,
}

/// 以全部峰为分量拟合混合模型；拟合失败时保留初始猜测
pub fn decompose(
    spectrum: &Spectrum,
    peaks: &[usize],
    config: &MixtureConfig,
    quality: &FitQuality,
) -> Result<(MixtureModel, FitStatus)> {
    let guess = MixtureModel::guess(spectrum, peaks, config.shape, config.guess, config.background_degree)?;
    match guess.fit(spectrum, &config.fit) {
        Ok(fit) if fit.is_suspicious(quality) => Ok((fit.model, FitStatus::Suspicious)),
        Ok(fit) => Ok((fit.model, FitStatus::Ok)),
        Err(e) => {
            log::debug!("mixture fit failed ({}), keeping the initial guess", e);
            Ok((guess, FitStatus::Fallback))
        }
    }
}

pub fn print_component_table(decompositions: &[Decomposition]) {
    #[derive(Tabled)]
    struct ComponentRow {
        #[tabled(rename = "Region")]
        region: String,
        #[tabled(rename = "k")]
        k: usize,
        #[tabled(rename = "Shape")]
        shape: &'static str,
        #[tabled(rename = "Center")]
        center: String,
        #[tabled(rename = "Height")]
        height: String,
        #[tabled(rename = "FWHM")]
        fwhm: String,
        #[tabled(rename = "Area")]
        area: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<ComponentRow> = decompositions
        .iter()
        .flat_map(|d| {
            d.model.components.iter().enumerate().map(move |(k, c)| ComponentRow {
                region: d.region.map_or_else(|| "-".to_string(), |r| r.to_string()),
                k,
                shape: d.model.shape.name(),
                center: format!("{:.2}", c.center),
                height: format!("{:.4}", c.height),
                fwhm: format!("{:.2}", d.model.shape.fwhm_from_width(c.width)),
                area: format!("{:.4}", d.model.shape.area(c.height, c.width)),
                status: d.status.to_string(),
            })
        })
        .collect();

    if !rows.is_empty() {
        output::print_header("Mixture Decomposition");
        println!("{}", Table::new(&rows));
    }
}

// ─────────────────────────────────────────────────────────────
// 聚类结果
// ─────────────────────────────────────────────────────────────

pub fn print_cluster_table(means: &[ClusterMean], unit: &str) {
    #[derive(Tabled)]
    struct ClusterRow {
        #[tabled(rename = "Label")]
        label: i32,
        #[tabled(rename = "Mean dist")]
        mean: String,
        #[tabled(rename = "Members")]
        members: usize,
    }

    let rows: Vec<ClusterRow> = means
        .iter()
        .map(|m| ClusterRow {
            label: m.label,
            mean: format!("{:.4} {}", m.mean, unit),
            members: m.members,
        })
        .collect();

    output::print_header(&format!("Periodicity Clusters ({})", rows.len()));
    if rows.is_empty() {
        output::print_info("No cluster formed");
    } else {
        println!("{}", Table::new(&rows));
    }
}

/// 强度表的列随标签数变化，使用 `Builder` 动态构建
pub fn print_intensity_table(map: &IntensityMap) {
    if map.rows.is_empty() || map.labels.is_empty() {
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(std::iter::once("Pattern".to_string()).chain(map.labels.iter().map(|&l| label_name(l))));
    for row in &map.rows {
        builder.push_record(
            std::iter::once(row.pattern.clone()).chain(row.percents.iter().map(|p| format!("{:.1}%", p * 100.0))),
        );
    }

    output::print_header("Relative Group Intensity");
    println!("{}", builder.build());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::least_squares::FitConfig;
    use std::time::Duration;

    fn two_peaks() -> (Spectrum, Vec<usize>) {
        let values: Vec<f64> = (0..80)
            .map(|i| {
                let x = i as f64;
                (-(x - 30.0).powi(2) / 18.0).exp() + 0.5 * (-(x - 50.0).powi(2) / 18.0).exp()
            })
            .collect();
        (Spectrum::from_values(values), vec![30, 50])
    }

    #[test]
    fn test_decompose_ok() {
        let (spectrum, peaks) = two_peaks();
        let quality = FitQuality {
            allow_missing_errors: true,
            ..Default::default()
        };
        let (model, status) = decompose(&spectrum, &peaks, &MixtureConfig::default(), &quality).unwrap();
        assert_ne!(status, FitStatus::Fallback);
        assert_eq!(model.components.len(), 2);
        assert!((model.components[0].center - 30.0).abs() < 0.1);
        assert!((model.components[1].center - 50.0).abs() < 0.1);
    }

    #[test]
    fn test_decompose_fallback_keeps_guess() {
        let (spectrum, peaks) = two_peaks();
        let config = MixtureConfig {
            fit: FitConfig::default().timeout(Some(Duration::ZERO)),
            ..Default::default()
        };
        let (model, status) = decompose(&spectrum, &peaks, &config, &FitQuality::default()).unwrap();
        assert_eq!(status, FitStatus::Fallback);
        assert_eq!(model.components[0].center, 30.0);
    }

    #[test]
    fn test_decompose_without_peaks() {
        let (spectrum, _) = two_peaks();
        assert!(decompose(&spectrum, &[], &MixtureConfig::default(), &FitQuality::default()).is_err());
    }

    #[test]
    fn test_min_spacing() {
        let (spectrum, _) = two_peaks();
        let peaks = [10, 30, 35];
        let condensed = spectrum.peak_distances(&peaks, false, false).unwrap();
        assert_eq!(min_spacing(&condensed), Some(5.0));
        let full = spectrum.peak_distances(&peaks, true, true).unwrap();
        assert_eq!(min_spacing(&full), Some(5.0));

        let single = spectrum.peak_distances(&[30], false, false).unwrap();
        assert_eq!(min_spacing(&single), None);
    }

    #[test]
    fn test_label_name() {
        assert_eq!(label_name(NOISE_LABEL), "noise");
        assert_eq!(label_name(2), "2");
    }
}
