//! # 掩码图样分析流水线
//!
//! `MaskedPattern` 将一张 RHEED 图样与其二值掩码绑定，按阶段推进：
//!
//! ```text
//! get_regions → filter_regions → get_regions_collapse → clean_collapse
//!   → fit_collapse_peaks → analyze_peaks_distance_cent → resolve_groups
//!   → (全局聚类) set_cluster_labels → get_group_intensity
//! ```
//!
//! 每个阶段的结果保存在对象上；前置阶段未完成时返回 `NotReady`，
//! 重新运行上游阶段会清空所有下游结果。
//!
//! ## 依赖关系
//! - 使用 `phaser/segment.rs`、`periodicity/`、`phaser/intensity.rs`
//! - 被 `phaser/cluster.rs` 和 `commands/` 使用

use crate::error::{AnalysisWarning, Result, RheedError};
use crate::models::pattern::Pattern;
use crate::models::region::Region;
use crate::models::spectrum::{CollapseDirection, CollapseSpectrum, Spectrum};
use crate::numeric::peaks::PeakFindConfig;
use crate::periodicity::distance::center_peak_indices;
use crate::periodicity::{self, get_peaks_group, DistanceConfig, PeakFamily, PeakGroup};
use crate::phaser::intensity::{Attribution, GroupIntensity, LabeledFamily, MixtureCache};
use crate::phaser::mixture::MixtureConfig;
use crate::phaser::segment;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// 投影光谱清洗配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanConfig {
    pub smooth: bool,
    pub sigma: f64,
    pub remove_background: bool,
    /// 背景拟合时首尾各取的采样数
    pub background_n: usize,
    pub normalize: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            smooth: true,
            sigma: 1.0,
            remove_background: true,
            background_n: 2,
            normalize: true,
        }
    }
}

impl CleanConfig {
    pub fn smooth(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn remove_background(mut self, remove_background: bool) -> Self {
        self.remove_background = remove_background;
        self
    }

    pub fn background_n(mut self, background_n: usize) -> Self {
        self.background_n = background_n;
        self
    }

    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// 依次扣背景、归一化、平滑
    ///
    /// 背景拟合奇异时跳过扣背景并返回原因，其余步骤照常进行。
    pub fn apply(&self, spectrum: &mut Spectrum) -> Result<Option<String>> {
        let mut skipped = None;
        if self.remove_background {
            match spectrum.remove_background(self.background_n) {
                Ok(_) => {}
                Err(RheedError::SingularMatrix(reason)) => skipped = Some(reason),
                Err(e) => return Err(e),
            }
        }
        if self.normalize {
            spectrum.normalize();
        }
        if self.smooth {
            spectrum.smooth(self.sigma);
        }
        Ok(skipped)
    }
}

/// 图样级扁平峰
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlatPeak {
    /// 图样坐标
    pub position: f64,
    /// 所属区域编号
    pub region: usize,
    /// 在该区域峰列表中的序号
    pub local: usize,
}

/// 待聚类的周期：成员为扁平峰下标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Periodicity {
    pub members: Vec<usize>,
    pub avg_dist: f64,
}

/// 带掩码的 RHEED 图样
#[derive(Debug, Clone)]
pub struct MaskedPattern {
    name: String,
    pattern: Pattern,
    mask: Array2<bool>,

    regions: Option<Vec<Region>>,
    collapses: Option<Vec<CollapseSpectrum>>,
    region_peaks: Option<Vec<Vec<usize>>>,
    flat_peaks: Option<Vec<FlatPeak>>,
    center_peaks: Vec<usize>,
    families: Option<Vec<PeakFamily>>,
    groups: Option<Vec<PeakGroup>>,
    labeled: Option<Vec<LabeledFamily>>,
    intensity: Option<Vec<GroupIntensity>>,

    warnings: Vec<AnalysisWarning>,
}

fn not_ready(stage: &'static str, requires: &'static str) -> RheedError {
    RheedError::NotReady { stage, requires }
}

impl MaskedPattern {
    pub fn new(name: impl Into<String>, pattern: Pattern, mask: Array2<bool>) -> Result<Self> {
        if mask.dim() != pattern.dim() {
            return Err(RheedError::ShapeMismatch {
                what: "pattern mask".to_string(),
                expected: pattern.dim(),
                actual: mask.dim(),
            });
        }
        Ok(Self {
            name: name.into(),
            pattern,
            mask,
            regions: None,
            collapses: None,
            region_peaks: None,
            flat_peaks: None,
            center_peaks: Vec::new(),
            families: None,
            groups: None,
            labeled: None,
            intensity: None,
            warnings: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn warnings(&self) -> &[AnalysisWarning] {
        &self.warnings
    }

    /// 清空 `regions` 及其下游的全部结果
    fn reset_from_regions(&mut self) {
        self.regions = None;
        self.reset_from_collapses();
    }

    fn reset_from_collapses(&mut self) {
        self.collapses = None;
        self.clear_clean_warnings();
        self.reset_from_peaks();
    }

    fn reset_from_peaks(&mut self) {
        self.region_peaks = None;
        self.reset_from_families();
    }

    fn reset_from_families(&mut self) {
        self.flat_peaks = None;
        self.center_peaks.clear();
        self.families = None;
        self.groups = None;
        self.labeled = None;
        self.reset_intensity();
    }

    /// 清洗阶段的警告随投影光谱一起失效
    fn clear_clean_warnings(&mut self) {
        self.warnings
            .retain(|w| !matches!(w, AnalysisWarning::SingularBaseline { .. }));
    }

    /// 清空强度结果及强度阶段产生的警告
    fn reset_intensity(&mut self) {
        self.intensity = None;
        self.warnings
            .retain(|w| matches!(w, AnalysisWarning::SingularBaseline { .. }));
    }

    /// 裁剪图样与掩码，清空所有阶段结果
    pub fn crop(&mut self, sx: usize, sy: usize, ex: usize, ey: usize) -> Result<&mut Self> {
        self.pattern.crop(sx, sy, ex, ey)?;
        self.mask = self.mask.slice(ndarray::s![sx..ex, sy..ey]).to_owned();
        self.reset_from_regions();
        Ok(self)
    }

    pub fn cropped(&self, sx: usize, sy: usize, ex: usize, ey: usize) -> Result<Self> {
        let pattern = self.pattern.cropped(sx, sy, ex, ey)?;
        let mask = self.mask.slice(ndarray::s![sx..ex, sy..ey]).to_owned();
        Self::new(self.name.clone(), pattern, mask)
    }

    // ─────────────────────────────────────────────────────────────
    // 区域
    // ─────────────────────────────────────────────────────────────

    /// 标记掩码中的连通区域
    pub fn get_regions(&mut self, with_intensity: bool) -> Result<&[Region]> {
        let intensity = with_intensity.then(|| self.pattern.pixels());
        let regions = segment::label_regions(&self.mask, intensity)?;
        self.reset_from_regions();
        Ok(self.regions.insert(regions).as_slice())
    }

    /// 去除面积过小的区域
    pub fn filter_regions(&mut self, min_area: usize) -> Result<&[Region]> {
        let regions = self
            .regions
            .take()
            .ok_or_else(|| not_ready("filter_regions", "get_regions"))?;
        let kept = segment::filter_regions(regions, min_area);
        log::debug!("{}: {} regions with area >= {}", self.name, kept.len(), min_area);
        self.reset_from_regions();
        Ok(self.regions.insert(kept).as_slice())
    }

    pub fn regions(&self) -> Option<&[Region]> {
        self.regions.as_deref()
    }

    /// 单个区域的投影光谱
    pub fn get_region_collapse(&self, region: &Region, direction: CollapseDirection) -> Result<CollapseSpectrum> {
        CollapseSpectrum::collapse(self.pattern.pixels(), region.bbox, direction)
    }

    /// 全部区域的投影光谱
    pub fn get_regions_collapse(&mut self, direction: CollapseDirection) -> Result<&[CollapseSpectrum]> {
        let regions = self
            .regions
            .as_deref()
            .ok_or_else(|| not_ready("get_regions_collapse", "get_regions"))?;
        let collapses = regions
            .iter()
            .map(|r| self.get_region_collapse(r, direction))
            .collect::<Result<Vec<_>>>()?;
        self.reset_from_collapses();
        Ok(self.collapses.insert(collapses).as_slice())
    }

    pub fn collapses(&self) -> Option<&[CollapseSpectrum]> {
        self.collapses.as_deref()
    }

    /// 投影光谱清洗：扣背景 → 归一化 → 平滑
    ///
    /// 背景拟合奇异时记录警告并跳过该区域的扣背景。
    pub fn clean_collapse(&mut self, config: &CleanConfig) -> Result<&mut Self> {
        let collapses = self
            .collapses
            .as_mut()
            .ok_or_else(|| not_ready("clean_collapse", "get_regions_collapse"))?;

        self.warnings
            .retain(|w| !matches!(w, AnalysisWarning::SingularBaseline { .. }));
        for (region, cs) in collapses.iter_mut().enumerate() {
            if let Some(reason) = config.apply(cs)? {
                self.warnings
                    .push(AnalysisWarning::SingularBaseline { region, reason }.emit());
            }
        }
        self.reset_from_peaks();
        Ok(self)
    }

    /// 在每条投影光谱上查找峰
    pub fn fit_collapse_peaks(&mut self, config: &PeakFindConfig) -> Result<&[Vec<usize>]> {
        let collapses = self
            .collapses
            .as_deref()
            .ok_or_else(|| not_ready("fit_collapse_peaks", "get_regions_collapse"))?;
        let peaks: Vec<Vec<usize>> = collapses.iter().map(|cs| cs.find_peaks(config).0).collect();
        log::debug!(
            "{}: {} peaks over {} regions",
            self.name,
            peaks.iter().map(Vec::len).sum::<usize>(),
            peaks.len()
        );
        self.reset_from_peaks();
        Ok(self.region_peaks.insert(peaks).as_slice())
    }

    pub fn region_peaks(&self) -> Option<&[Vec<usize>]> {
        self.region_peaks.as_deref()
    }

    // ─────────────────────────────────────────────────────────────
    // 周期性
    // ─────────────────────────────────────────────────────────────

    /// 将各区域的峰展平并按位置排序
    fn flatten_peaks(collapses: &[CollapseSpectrum], region_peaks: &[Vec<usize>]) -> Result<Vec<FlatPeak>> {
        let mut flat = Vec::new();
        for (region, (cs, peaks)) in collapses.iter().zip(region_peaks).enumerate() {
            let positions = cs.peak_positions(peaks)?;
            flat.extend(positions.into_iter().enumerate().map(|(local, position)| FlatPeak {
                position,
                region,
                local,
            }));
        }
        flat.sort_by(|a, b| a.position.total_cmp(&b.position));
        Ok(flat)
    }

    /// 图样级周期峰族分析
    ///
    /// 中心目标为图样宽度的一半（整除），网格范围 `[0, width]`。
    pub fn analyze_peaks_distance_cent(&mut self, config: &DistanceConfig) -> Result<&[PeakFamily]> {
        let collapses = self
            .collapses
            .as_deref()
            .ok_or_else(|| not_ready("analyze_peaks_distance_cent", "get_regions_collapse"))?;
        let region_peaks = self
            .region_peaks
            .as_deref()
            .ok_or_else(|| not_ready("analyze_peaks_distance_cent", "fit_collapse_peaks"))?;

        let flat = Self::flatten_peaks(collapses, region_peaks)?;
        let positions: Vec<f64> = flat.iter().map(|p| p.position).collect();
        let width = self.pattern.width();
        let target = (width / 2) as f64;

        let families =
            periodicity::analyze_peaks_distance_cent(&positions, target, 0.0, width as f64, config)?;
        let center = center_peak_indices(&positions, target, config.abs_tolerant);
        log::debug!(
            "{}: {} families from {} peaks ({} center peaks)",
            self.name,
            families.len(),
            flat.len(),
            center.len()
        );

        self.reset_from_families();
        self.flat_peaks = Some(flat);
        self.center_peaks = center;
        Ok(self.families.insert(families).as_slice())
    }

    pub fn flat_peaks(&self) -> Option<&[FlatPeak]> {
        self.flat_peaks.as_deref()
    }

    pub fn center_peaks(&self) -> &[usize] {
        &self.center_peaks
    }

    pub fn families(&self) -> Option<&[PeakFamily]> {
        self.families.as_deref()
    }

    /// 将重叠峰族划分为峰组
    pub fn resolve_groups(&mut self, exclusive: bool) -> Result<&[PeakGroup]> {
        let families = self
            .families
            .as_deref()
            .ok_or_else(|| not_ready("resolve_groups", "analyze_peaks_distance_cent"))?;
        let n_peaks = self.flat_peaks.as_ref().map_or(0, Vec::len);
        let groups = get_peaks_group(families, n_peaks, exclusive)?;
        self.labeled = None;
        self.reset_intensity();
        Ok(self.groups.insert(groups).as_slice())
    }

    pub fn groups(&self) -> Option<&[PeakGroup]> {
        self.groups.as_deref()
    }

    // ─────────────────────────────────────────────────────────────
    // 全局聚类与强度
    // ─────────────────────────────────────────────────────────────

    /// 参与全局聚类的周期
    ///
    /// 默认取非剩余峰组；`overlapping` 为真时取全部峰族。
    pub fn cluster_candidates(&self, overlapping: bool) -> Result<Vec<Periodicity>> {
        if overlapping {
            let families = self
                .families
                .as_deref()
                .ok_or_else(|| not_ready("cluster_candidates", "analyze_peaks_distance_cent"))?;
            Ok(families
                .iter()
                .map(|f| Periodicity {
                    members: f.peaks_family.clone(),
                    avg_dist: f.avg_dist,
                })
                .collect())
        } else {
            let groups = self
                .groups
                .as_deref()
                .ok_or_else(|| not_ready("cluster_candidates", "resolve_groups"))?;
            Ok(groups
                .iter()
                .filter(|g| !g.is_leftover())
                .map(|g| Periodicity {
                    members: g.members.clone(),
                    avg_dist: g.avg_dist,
                })
                .collect())
        }
    }

    /// 写入全局聚类标签，`labels` 与 `candidates` 一一对应
    pub fn set_cluster_labels(&mut self, candidates: Vec<Periodicity>, labels: &[i32]) -> Result<()> {
        if candidates.len() != labels.len() {
            return Err(RheedError::LengthMismatch {
                what: "cluster labels vs candidates".to_string(),
                left: labels.len(),
                right: candidates.len(),
            });
        }
        let labeled = candidates
            .into_iter()
            .zip(labels)
            .map(|(c, &label)| LabeledFamily {
                label,
                members: c.members,
                avg_dist: c.avg_dist,
            })
            .collect();
        self.labeled = Some(labeled);
        self.reset_intensity();
        Ok(())
    }

    /// 图样中出现的全局标签（升序去重）
    pub fn cluster_labels(&self) -> Vec<i32> {
        let mut labels: Vec<i32> = self
            .labeled
            .iter()
            .flatten()
            .map(|f| f.label)
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// 计算每个全局标签的强度与占比
    pub fn get_group_intensity(&mut self, config: &MixtureConfig) -> Result<&[GroupIntensity]> {
        let stage = "get_group_intensity";
        let labeled = self
            .labeled
            .as_deref()
            .ok_or_else(|| not_ready(stage, "set_cluster_labels"))?;
        self.warnings
            .retain(|w| matches!(w, AnalysisWarning::SingularBaseline { .. }));
        let attribution = Attribution {
            pixels: self.pattern.pixels(),
            regions: self.regions.as_deref().ok_or_else(|| not_ready(stage, "get_regions"))?,
            collapses: self
                .collapses
                .as_deref()
                .ok_or_else(|| not_ready(stage, "get_regions_collapse"))?,
            region_peaks: self
                .region_peaks
                .as_deref()
                .ok_or_else(|| not_ready(stage, "fit_collapse_peaks"))?,
            flat_peaks: self
                .flat_peaks
                .as_deref()
                .ok_or_else(|| not_ready(stage, "analyze_peaks_distance_cent"))?,
            center_peaks: &self.center_peaks,
        };

        let mut cache = MixtureCache::new();
        let mut warnings = Vec::new();
        let table = attribution.group_intensity(labeled, config, &mut cache, &mut warnings)?;
        log::debug!("{}: {} regions decomposed by mixture fit", self.name, cache.len());
        self.warnings.extend(warnings);
        Ok(self.intensity.insert(table).as_slice())
    }

    pub fn group_intensity(&self) -> Option<&[GroupIntensity]> {
        self.intensity.as_deref()
    }

    // ─────────────────────────────────────────────────────────────
    // 区域查找
    // ─────────────────────────────────────────────────────────────

    /// 质心最靠上的区域
    pub fn top_region(&self) -> Option<&Region> {
        self.regions
            .as_deref()?
            .iter()
            .min_by(|a, b| a.centroid.0.total_cmp(&b.centroid.0))
    }

    /// 质心（优先强度加权质心）离 `(row, col)` 最近的区域
    pub fn closest_region(&self, row: f64, col: f64) -> Option<&Region> {
        let dist = |r: &Region| {
            let (cr, cc) = r.center();
            (cr - row).hypot(cc - col)
        };
        self.regions
            .as_deref()?
            .iter()
            .min_by(|a, b| dist(a).total_cmp(&dist(b)))
    }

    /// 掩码包含 `(row, col)` 的第一个区域
    pub fn region_within(&self, row: usize, col: usize) -> Option<&Region> {
        self.regions.as_deref()?.iter().find(|r| r.contains(row, col))
    }
}
