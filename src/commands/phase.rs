//! # phase 子命令实现
//!
//! 批量分析目录中的 RHEED 图样，跨图样聚类周期间距，
//! 并计算每张图样中各簇峰组的相对强度。
//!
//! ## 流程
//! 1. 收集图样文件，按 `<stem><mask_suffix>.<ext>` 匹配掩码
//! 2. 并行运行单图样流水线（rayon）
//! 3. 全局聚类 → 强度归属
//! 4. 打印并导出簇均值表、聚类样本表、强度表与各图样峰族表
//!
//! ## 依赖关系
//! - 使用 `cli/phase.rs` 定义的 PhaseArgs
//! - 使用 `batch/` 模块进行批量处理
//! - 使用 `commands/analyze.rs` 的图样加载与流水线
//! - 使用 `phaser/cluster.rs` 与 `phaser/export.rs`

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::phase::PhaseArgs;
use crate::commands::analyze::{load_masked_pattern, PipelineConfig};
use crate::commands::report;
use crate::error::{Result, RheedError};
use crate::parsers;
use crate::phaser::cluster::PhaseSample;
use crate::phaser::{export, ClusterMean, IntensityMap, MaskedPattern, PeriodicityPhaser};
use crate::utils::{output, progress};

use std::fs;
use std::path::{Path, PathBuf};

/// `run.png` + `_mask` → `run_mask.png`
fn mask_path(file: &Path, suffix: &str) -> PathBuf {
    let stem = file.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match file.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    file.with_file_name(name)
}

/// 执行批量相位分析
pub fn execute(args: PhaseArgs) -> Result<()> {
    output::print_header("RHEED Periodicity Phasing");

    if !args.input.is_dir() {
        return Err(RheedError::FileNotFound {
            path: args.input.display().to_string(),
        });
    }

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)
        .with_exclude(&args.exclude)
        .recursive(args.recursive)
        .collect();

    if files.is_empty() {
        return Err(RheedError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }
    output::print_info(&format!("Found {} pattern files", files.len()));

    // 提前校验拟合参数
    let fit_config = args.fit.to_config()?;
    let pipeline = PipelineConfig::from_args(&args.pattern_opts, &args.clean, &args.peaks, &args.distance);

    let runner = BatchRunner::new(args.jobs).show_progress(!args.no_progress);
    output::print_info(&format!("Using {} parallel jobs", runner.jobs()));
    let result = runner.run(files, |file| process_pattern(file, &args, &pipeline));

    output::print_success(&format!(
        "Pipeline complete: {}/{} success, {} skipped, {} failed",
        result.success(),
        result.total(),
        result.skipped.len(),
        result.failed()
    ));

    for (path, reason) in result.skipped.iter().take(10) {
        output::print_warning(&format!("  skipped {}: {}", path.display(), reason));
    }
    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > 10 {
            output::print_warning(&format!("  ... and {} more", result.failures.len() - 10));
        }
    }

    let mut patterns: Vec<MaskedPattern> = result.outputs.into_iter().map(|(_, p)| p).collect();
    if patterns.is_empty() {
        output::print_warning("No pattern survived the pipeline, nothing to cluster");
        return Ok(());
    }

    let spinner = progress::create_spinner("Clustering periodicities");
    let mut phaser = PeriodicityPhaser::new(args.cluster.to_config(), args.distance.overlapping);
    let phased = (|| -> Result<(Vec<ClusterMean>, IntensityMap)> {
        let means = phaser.run_cluster(&mut patterns)?.to_vec();
        spinner.set_message("Attributing group intensity");
        let map = phaser.get_intensity_map(&mut patterns, &fit_config)?;
        Ok((means, map))
    })();
    spinner.finish_and_clear();
    let (means, map) = phased?;

    let unit = if args.cluster.convert_dist { "nm^-1" } else { "px" };
    report::print_cluster_table(&means, unit);
    report::print_intensity_table(&map);

    write_outputs(&args.output, &patterns, phaser.samples(), &means, &map)?;
    output::print_success(&format!("Tables written to '{}'", args.output.display()));

    let n_warnings: usize = patterns.iter().map(|p| p.warnings().len()).sum();
    if n_warnings > 0 {
        output::print_header(&format!("Warnings ({})", n_warnings));
        for p in &patterns {
            output::print_analysis_warnings(p.name(), p.warnings());
        }
    }

    output::print_done(&format!("Phased {} patterns into {} clusters", patterns.len(), means.len()));
    Ok(())
}

/// 处理批量模式中的单个图样
fn process_pattern(file: &PathBuf, args: &PhaseArgs, pipeline: &PipelineConfig) -> ProcessResult<MaskedPattern> {
    if !parsers::is_pattern_file(file) {
        return ProcessResult::Skipped("unsupported file format".to_string());
    }
    let mask = mask_path(file, &args.mask_suffix);
    let mask = if mask.exists() {
        Some(mask)
    } else if args.pattern_opts.mask_threshold.is_some() {
        None
    } else {
        return ProcessResult::Skipped(format!("mask '{}' not found", mask.display()));
    };

    let analyzed = load_masked_pattern(file, mask.as_deref(), &args.pattern_opts).and_then(|mut pattern| {
        pipeline.run(&mut pattern)?;
        Ok(pattern)
    });

    match analyzed {
        Ok(pattern) => ProcessResult::Success(pattern),
        Err(e) => ProcessResult::Failed(file.display().to_string(), e.to_string()),
    }
}

fn write_outputs(
    dir: &Path,
    patterns: &[MaskedPattern],
    samples: &[PhaseSample],
    means: &[ClusterMean],
    map: &IntensityMap,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| RheedError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })?;

    export::cluster_means_to_csv(means, &dir.join("cluster_means.csv"))?;
    let names: Vec<&str> = patterns.iter().map(MaskedPattern::name).collect();
    export::samples_to_csv(samples, &names, &dir.join("periodicities.csv"))?;
    export::intensity_map_to_csv(map, &dir.join("intensity_map.csv"))?;

    for pattern in patterns {
        let (Some(families), Some(flat)) = (pattern.families(), pattern.flat_peaks()) else {
            continue;
        };
        let positions: Vec<f64> = flat.iter().map(|p| p.position).collect();
        export::families_to_csv(families, &positions, &dir.join(format!("{}_families.csv", pattern.name())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_path() {
        assert_eq!(
            mask_path(Path::new("runs/a/run_01.png"), "_mask"),
            PathBuf::from("runs/a/run_01_mask.png")
        );
        assert_eq!(mask_path(Path::new("grid"), "_m"), PathBuf::from("grid_m"));
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("phase");
        let means = vec![ClusterMean {
            label: 0,
            mean: 10.0,
            members: 3,
        }];
        write_outputs(&out, &[], &[], &means, &IntensityMap::default()).unwrap();

        assert!(out.join("cluster_means.csv").exists());
        assert_eq!(
            fs::read_to_string(out.join("periodicities.csv")).unwrap(),
            "pattern,candidate,dist,label\n"
        );
        assert_eq!(fs::read_to_string(out.join("intensity_map.csv")).unwrap(), "pattern\n");
    }
}
