//! # spectrum 子命令实现
//!
//! 对单条一维光谱执行：清洗 → 找峰 → 周期峰族检测 → 峰组划分，
//! 可选混合模型分解与 CSV 导出。
//!
//! ## 依赖关系
//! - 使用 `cli/spectrum.rs` 定义的 SpectrumArgs
//! - 使用 `parsers/spectrum.rs` 读取光谱
//! - 使用 `periodicity/` 与 `phaser/export.rs`

use crate::cli::spectrum::SpectrumArgs;
use crate::commands::report::{self, Decomposition};
use crate::error::{AnalysisWarning, Result, RheedError};
use crate::models::PeakDistances;
use crate::parsers;
use crate::periodicity;
use crate::phaser::{export, FitQuality};
use crate::utils::output;

use std::fs;

/// 执行光谱分析
pub fn execute(args: SpectrumArgs) -> Result<()> {
    output::print_header("Spectrum Periodicity Analysis");
    output::print_info(&format!("Reading '{}'", args.input.display()));

    let mut spectrum = parsers::parse_spectrum_file(&args.input)?;
    output::print_field("Samples", spectrum.len());

    if let Some(trunc) = args.fill_truncated {
        spectrum.fill_truncated(trunc);
    }

    if !args.raw {
        let clean = args.clean.to_config();
        if let Some(reason) = clean.apply(&mut spectrum)? {
            output::print_warning(&AnalysisWarning::SingularBaseline { region: 0, reason }.to_string());
        }
    }

    let (peaks, props) = spectrum.find_peaks(&args.peaks.to_config());
    if peaks.is_empty() {
        output::print_warning("No peak found, nothing to analyze");
        return Ok(());
    }
    let positions = spectrum.peak_positions(&peaks)?;
    report::print_peak_table(&format!("Peaks ({})", peaks.len()), &peaks, &positions, &props);
    if args.distance_matrix {
        if let PeakDistances::Full(matrix) = spectrum.peak_distances(&peaks, true, true)? {
            report::print_distance_matrix(&matrix, &positions);
        }
    }

    let families = spectrum.analyze_peaks_distance_cent(&peaks, &args.distance.to_config())?;
    let groups = periodicity::get_peaks_group(&families, peaks.len(), !args.distance.overlapping)?;

    report::print_family_table(&families, &positions);
    report::print_group_table(&groups, &positions);

    output::print_header("Summary");
    output::print_field("Peaks", peaks.len());
    output::print_field("Families", families.len());
    if let Some(min) = report::min_spacing(&spectrum.peak_distances(&peaks, false, false)?) {
        output::print_field("Min spacing", format!("{:.3}", min));
    }
    output::print_field("Integrated", format!("{:.4}", spectrum.integrated_intensity()));

    if args.decompose {
        let quality = FitQuality {
            max_relative_error_pct: args.max_rel_err,
            max_fwhm: args.max_fwhm,
            ..Default::default()
        };
        let (model, status) = report::decompose(&spectrum, &peaks, &args.fit.to_config()?, &quality)?;
        report::print_component_table(&[Decomposition {
            region: None,
            model,
            status,
        }]);
    }

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir).map_err(|e| RheedError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;
        export::families_to_csv(&families, &positions, &dir.join("families.csv"))?;
        export::groups_to_csv(&groups, &positions, &dir.join("groups.csv"))?;
        output::print_success(&format!("Tables written to '{}'", dir.display()));
    }

    output::print_done("Spectrum analysis complete");
    Ok(())
}
