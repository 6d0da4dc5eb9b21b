//! # analyze 子命令实现
//!
//! 对单张图样运行完整的分段流水线并打印各阶段结果。
//! 图样加载与流水线配置也供 `phase` 子命令复用。
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 AnalyzeArgs
//! - 使用 `parsers/` 加载图样、掩码与采集配置
//! - 使用 `phaser/mask.rs` 的 `MaskedPattern`

use crate::cli::analyze::AnalyzeArgs;
use crate::cli::common::{parse_crop, CleanArgs, DistanceArgs, PatternArgs, PeakArgs, ScaleArg};
use crate::commands::report::{self, Decomposition};
use crate::error::{Result, RheedError};
use crate::models::{CollapseDirection, Pattern};
use crate::numeric::peaks::PeakFindConfig;
use crate::parsers;
use crate::periodicity::DistanceConfig;
use crate::phaser::{export, CleanConfig, FitQuality, MaskedPattern};
use crate::utils::output;

use std::fs;
use std::path::Path;

/// 单张图样流水线的全部参数
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub min_area: usize,
    pub direction: CollapseDirection,
    pub clean: CleanConfig,
    pub peaks: PeakFindConfig,
    pub distance: DistanceConfig,
    /// 互斥峰组划分
    pub exclusive: bool,
}

impl PipelineConfig {
    pub fn from_args(pattern: &PatternArgs, clean: &CleanArgs, peaks: &PeakArgs, distance: &DistanceArgs) -> Self {
        Self {
            min_area: pattern.min_area,
            direction: pattern.direction.into(),
            clean: clean.to_config(),
            peaks: peaks.to_config(),
            distance: distance.to_config(),
            exclusive: !distance.overlapping,
        }
    }

    /// 分割 → 投影 → 清洗 → 找峰 → 峰族 → 峰组
    pub fn run(&self, pattern: &mut MaskedPattern) -> Result<()> {
        pattern.get_regions(true)?;
        pattern.filter_regions(self.min_area)?;
        pattern.get_regions_collapse(self.direction)?;
        pattern.clean_collapse(&self.clean)?;
        pattern.fit_collapse_peaks(&self.peaks)?;
        let n_families = pattern.analyze_peaks_distance_cent(&self.distance)?.len();
        pattern.resolve_groups(self.exclusive)?;

        log::debug!(
            "{}: {} regions, {} peaks, {} families",
            pattern.name(),
            pattern.regions().map_or(0, <[_]>::len),
            pattern.flat_peaks().map_or(0, <[_]>::len),
            n_families
        );
        Ok(())
    }
}

/// 加载图样并组装 `MaskedPattern`
///
/// 掩码优先取自 `mask` 文件，否则按 `--mask-threshold` 由（缩放后的）图样生成。
pub fn load_masked_pattern(input: &Path, mask: Option<&Path>, opts: &PatternArgs) -> Result<MaskedPattern> {
    let mut pattern = Pattern::new(parsers::load_pattern_pixels(input)?);

    if let Some(path) = &opts.config {
        pattern = pattern.with_config(parsers::load_config(path)?);
    }
    if let Some(path) = &opts.aoi {
        pattern = pattern.with_aoi(parsers::load_mask(path)?)?;
    }

    match opts.scale {
        ScaleArg::None => {}
        ScaleArg::MinMax => {
            pattern.min_max_scale();
        }
        ScaleArg::Standard => {
            pattern.standard_norm();
        }
        ScaleArg::MeanClip => {
            pattern.mean_clip();
        }
    }

    let mask = match (mask, opts.mask_threshold) {
        (Some(path), _) => parsers::load_mask(path)?,
        (None, Some(threshold)) => parsers::threshold_mask(pattern.pixels(), threshold),
        (None, None) => {
            return Err(RheedError::InvalidArgument(format!(
                "no mask for '{}': pass a mask file or --mask-threshold",
                input.display()
            )))
        }
    };

    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pattern".to_string());

    let mut masked = MaskedPattern::new(name, pattern, mask)?;
    if let Some(crop) = &opts.crop {
        let (sx, sy, ex, ey) = parse_crop(crop)?;
        masked.crop(sx, sy, ex, ey)?;
    }
    Ok(masked)
}

/// 执行单图样分析
pub fn execute(args: AnalyzeArgs) -> Result<()> {
    output::print_header("RHEED Pattern Analysis");
    output::print_info(&format!("Pattern: '{}'", args.input.display()));

    let mut pattern = load_masked_pattern(&args.input, args.mask.as_deref(), &args.pattern)?;
    let (h, w) = pattern.pattern().dim();
    output::print_field("Shape", format!("{} x {}", h, w));
    output::print_field("Mask pixels", pattern.mask().iter().filter(|&&m| m).count());

    let pipeline = PipelineConfig::from_args(&args.pattern, &args.clean, &args.peaks, &args.distance);
    pipeline.run(&mut pattern)?;

    let regions = pattern.regions().unwrap_or_default();
    let collapses = pattern.collapses().unwrap_or_default();
    let region_peaks = pattern.region_peaks().unwrap_or_default();

    let region_positions = collapses
        .iter()
        .zip(region_peaks)
        .map(|(cs, peaks)| cs.peak_positions(peaks))
        .collect::<Result<Vec<_>>>()?;
    report::print_region_table(regions, &region_positions);

    let (mid_row, mid_col) = (h / 2, w / 2);
    if let Some(top) = pattern.top_region() {
        output::print_field("Top region", top.id);
    }
    if let Some(closest) = pattern.closest_region(mid_row as f64, mid_col as f64) {
        output::print_field("Closest to center", closest.id);
    }
    match pattern.region_within(mid_row, mid_col) {
        Some(r) => output::print_field("Region at center", r.id),
        None => output::print_field("Region at center", "-"),
    }

    let positions: Vec<f64> = pattern
        .flat_peaks()
        .unwrap_or_default()
        .iter()
        .map(|p| p.position)
        .collect();
    let families = pattern.families().unwrap_or_default();
    let groups = pattern.groups().unwrap_or_default();

    report::print_family_table(families, &positions);
    report::print_group_table(groups, &positions);

    if !pattern.center_peaks().is_empty() {
        let center: Vec<String> = pattern
            .center_peaks()
            .iter()
            .filter_map(|&i| positions.get(i))
            .map(|p| format!("{:.1}", p))
            .collect();
        output::print_field("Center peaks", center.join(", "));
    }

    if args.decompose {
        let config = args.fit.to_config()?;
        let quality = FitQuality::default();
        let mut decompositions = Vec::new();
        for ((region, cs), peaks) in regions.iter().zip(collapses).zip(region_peaks) {
            if peaks.len() < 2 {
                continue;
            }
            let (model, status) = report::decompose(cs, peaks, &config, &quality)?;
            decompositions.push(Decomposition {
                region: Some(region.id),
                model,
                status,
            });
        }
        report::print_component_table(&decompositions);
    }

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir).map_err(|e| RheedError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;
        export::families_to_csv(families, &positions, &dir.join(format!("{}_families.csv", pattern.name())))?;
        export::groups_to_csv(groups, &positions, &dir.join(format!("{}_groups.csv", pattern.name())))?;
        output::print_success(&format!("Tables written to '{}'", dir.display()));
    }

    output::print_analysis_warnings(pattern.name(), pattern.warnings());
    output::print_done("Pattern analysis complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::DirectionArg;
    use std::io::Write;

    fn pattern_args() -> PatternArgs {
        PatternArgs {
            config: None,
            aoi: None,
            scale: ScaleArg::None,
            crop: None,
            mask_threshold: Some(0.5),
            min_area: 1,
            direction: DirectionArg::Horizontal,
        }
    }

    fn write_grid(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("run_01.txt");
        let mut f = fs::File::create(&path).unwrap();
        for _ in 0..4 {
            writeln!(f, "0 1 1 0 0 2 2 0").unwrap();
        }
        path
    }

    #[test]
    fn test_load_with_threshold_mask() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path());

        let pattern = load_masked_pattern(&path, None, &pattern_args()).unwrap();
        assert_eq!(pattern.name(), "run_01");
        assert_eq!(pattern.pattern().dim(), (4, 8));
        assert_eq!(pattern.mask().iter().filter(|&&m| m).count(), 16);
    }

    #[test]
    fn test_load_requires_mask() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path());
        let opts = PatternArgs {
            mask_threshold: None,
            ..pattern_args()
        };
        assert!(matches!(
            load_masked_pattern(&path, None, &opts),
            Err(RheedError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_with_crop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path());
        let opts = PatternArgs {
            crop: Some("0,4,4,8".to_string()),
            ..pattern_args()
        };
        let pattern = load_masked_pattern(&path, None, &opts).unwrap();
        assert_eq!(pattern.pattern().dim(), (4, 4));
        assert_eq!(pattern.mask().iter().filter(|&&m| m).count(), 8);
    }

    #[test]
    fn test_pipeline_finds_regions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path());
        let mut pattern = load_masked_pattern(&path, None, &pattern_args()).unwrap();

        let config = PipelineConfig {
            min_area: 1,
            direction: CollapseDirection::Horizontal,
            clean: CleanConfig::default().smooth(false).remove_background(false),
            peaks: PeakFindConfig::default(),
            distance: DistanceConfig::default(),
            exclusive: true,
        };
        config.run(&mut pattern).unwrap();
        assert_eq!(pattern.regions().unwrap().len(), 2);
        assert!(pattern.groups().is_some());
    }
}
