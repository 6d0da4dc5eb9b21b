//! # 峰组强度归属
//!
//! 将全局聚类标签映射回图样像素，计算每个标签的积分强度与相对占比。
//!
//! ## 归属规则
//! - 中心峰被所有峰族共享，不参与归属
//! - 区域只贡献一个峰：整块区域掩码并入该标签
//! - 区域贡献多个峰：对区域光谱拟合混合模型（每区域一次，结果缓存），
//!   以对应分量的 `center ± |width|` 截取包围盒子窗口，再并入区域掩码；
//!   拟合失败时退回初始猜测并给出警告
//! - 子窗口拼接失败时跳过该区域并给出警告
//!
//! 相对占比 = 标签强度 / 图样内全部标签强度之和；总和为 0 时占比为 0。
//!
//! ## 依赖关系
//! - 使用 `phaser/mixture.rs` 分解重叠峰
//! - 被 `phaser/mask.rs` 调用

use crate::error::{AnalysisWarning, Result, RheedError};
use crate::models::region::Region;
use crate::models::spectrum::{CollapseDirection, CollapseSpectrum};
use crate::phaser::mask::FlatPeak;
use crate::phaser::mixture::{MixtureConfig, MixtureModel};

use ndarray::{s, Array2, Zip};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// 单个标签在图样中的强度
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupIntensity {
    pub label: i32,
    pub intensity: f64,
    pub percent: f64,
}

/// 在强度表中查找标签的相对占比，缺失时为 0
pub fn percent_of(table: &[GroupIntensity], label: i32) -> f64 {
    table
        .iter()
        .find(|g| g.label == label)
        .map_or(0.0, |g| g.percent)
}

/// 带全局标签的峰族，成员为扁平峰下标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledFamily {
    pub label: i32,
    pub members: Vec<usize>,
    pub avg_dist: f64,
}

/// 区域混合模型缓存，键为区域编号
#[derive(Debug, Default)]
pub struct MixtureCache {
    models: HashMap<usize, MixtureModel>,
}

impl MixtureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已拟合的区域数
    pub fn len(&self) -> usize {
        self.models.len()
    }

    fn get_or_fit(
        &mut self,
        region: usize,
        collapse: &CollapseSpectrum,
        peaks: &[usize],
        config: &MixtureConfig,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Result<&MixtureModel> {
        if !self.models.contains_key(&region) {
            let guess = MixtureModel::guess(
                collapse,
                peaks,
                config.shape,
                config.guess,
                config.background_degree,
            )?;
            let model = match guess.fit(collapse, &config.fit) {
                Ok(fit) => fit.model,
                Err(e) => {
                    warnings.push(
                        AnalysisWarning::MixtureFitFallback {
                            region,
                            reason: e.to_string(),
                        }
                        .emit(),
                    );
                    guess
                }
            };
            self.models.insert(region, model);
        }
        self.models
            .get(&region)
            .ok_or_else(|| RheedError::Other(format!("mixture cache miss for region {}", region)))
    }
}

/// 单个图样的归属输入
#[derive(Debug, Clone, Copy)]
pub struct Attribution<'a> {
    pub pixels: &'a Array2<f64>,
    pub regions: &'a [Region],
    /// 与 `regions` 一一对应
    pub collapses: &'a [CollapseSpectrum],
    /// 每个区域光谱上的峰下标
    pub region_peaks: &'a [Vec<usize>],
    pub flat_peaks: &'a [FlatPeak],
    /// 中心峰的扁平下标
    pub center_peaks: &'a [usize],
}

impl Attribution<'_> {
    fn check(&self) -> Result<()> {
        if self.collapses.len() != self.regions.len() {
            return Err(RheedError::LengthMismatch {
                what: "collapses vs regions".to_string(),
                left: self.collapses.len(),
                right: self.regions.len(),
            });
        }
        if self.region_peaks.len() != self.regions.len() {
            return Err(RheedError::LengthMismatch {
                what: "region peaks vs regions".to_string(),
                left: self.region_peaks.len(),
                right: self.regions.len(),
            });
        }
        if let Some((i, cs)) = self
            .collapses
            .iter()
            .enumerate()
            .find(|(i, cs)| cs.bbox() != self.regions[*i].bbox)
        {
            return Err(RheedError::InvalidArgument(format!(
                "collapse {} covers {:?} but its region covers {:?}",
                i,
                cs.bbox(),
                self.regions[i].bbox
            )));
        }
        if let Some(bad) = self
            .flat_peaks
            .iter()
            .find(|fp| fp.region >= self.regions.len() || fp.local >= self.region_peaks[fp.region].len())
        {
            return Err(RheedError::InvalidPeakIndices(format!(
                "flat peak refers to region {} local {}",
                bad.region, bad.local
            )));
        }
        Ok(())
    }

    /// 计算每个标签的强度与占比，按标签升序输出
    pub fn group_intensity(
        &self,
        families: &[LabeledFamily],
        config: &MixtureConfig,
        cache: &mut MixtureCache,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Result<Vec<GroupIntensity>> {
        self.check()?;

        let labels: BTreeSet<i32> = families.iter().map(|f| f.label).collect();
        let mut table = Vec::with_capacity(labels.len());

        for label in labels {
            let mut mask = Array2::from_elem(self.pixels.dim(), false);
            for family in families.iter().filter(|f| f.label == label) {
                for &member in &family.members {
                    if self.center_peaks.contains(&member) {
                        continue;
                    }
                    let flat = self.flat_peaks.get(member).ok_or_else(|| {
                        RheedError::InvalidPeakIndices(format!(
                            "family member {} out of range ({} flat peaks)",
                            member,
                            self.flat_peaks.len()
                        ))
                    })?;
                    self.register(&mut mask, flat, label, config, cache, warnings)?;
                }
            }

            let intensity = Zip::from(self.pixels)
                .and(&mask)
                .fold(0.0, |acc, &p, &m| if m { acc + p } else { acc });
            table.push(GroupIntensity {
                label,
                intensity,
                percent: 0.0,
            });
        }

        let total: f64 = table.iter().map(|g| g.intensity).sum();
        if total != 0.0 {
            for g in &mut table {
                g.percent = g.intensity / total;
            }
        }
        Ok(table)
    }

    /// 将一个峰的区域（或其子窗口）并入标签掩码
    fn register(
        &self,
        mask: &mut Array2<bool>,
        flat: &FlatPeak,
        label: i32,
        config: &MixtureConfig,
        cache: &mut MixtureCache,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Result<()> {
        let region = &self.regions[flat.region];
        let peaks = &self.region_peaks[flat.region];
        let bbox = region.bbox;

        let skip = |reason: String, warnings: &mut Vec<AnalysisWarning>| {
            warnings.push(
                AnalysisWarning::MaskComposition {
                    region: flat.region,
                    label,
                    reason,
                }
                .emit(),
            );
        };

        if region.mask.dim() != bbox.shape() || !bbox.fits(mask.nrows(), mask.ncols()) {
            skip(
                format!("region mask {:?} does not match bbox {:?}", region.mask.dim(), bbox),
                warnings,
            );
            return Ok(());
        }

        if peaks.len() == 1 {
            let mut dst = mask.slice_mut(s![bbox.min_row..bbox.max_row, bbox.min_col..bbox.max_col]);
            Zip::from(&mut dst).and(&region.mask).for_each(|d, &m| *d |= m);
            return Ok(());
        }

        let collapse = &self.collapses[flat.region];
        let model = cache.get_or_fit(flat.region, collapse, peaks, config, warnings)?;
        let Some((win_lo, win_hi)) = model.component_window(flat.local) else {
            skip(format!("no mixture component for local peak {}", flat.local), warnings);
            return Ok(());
        };
        if !win_lo.is_finite() || !win_hi.is_finite() {
            skip("non-finite mixture component".to_string(), warnings);
            return Ok(());
        }

        let (axis_min, axis_max) = match collapse.direction() {
            CollapseDirection::Horizontal => (bbox.min_col, bbox.max_col),
            CollapseDirection::Vertical => (bbox.min_row, bbox.max_row),
        };
        let lo = (win_lo.trunc() as i64).max(axis_min as i64);
        let hi = (win_hi.trunc() as i64).min(axis_max as i64);
        if lo >= hi {
            skip(format!("empty sub-window [{}, {})", lo, hi), warnings);
            return Ok(());
        }
        let (lo, hi) = (lo as usize, hi as usize);
        let (a, b) = (lo - axis_min, hi - axis_min);

        match collapse.direction() {
            CollapseDirection::Horizontal => {
                let mut dst = mask.slice_mut(s![bbox.min_row..bbox.max_row, lo..hi]);
                let src = region.mask.slice(s![.., a..b]);
                Zip::from(&mut dst).and(&src).for_each(|d, &m| *d |= m);
            }
            CollapseDirection::Vertical => {
                let mut dst = mask.slice_mut(s![lo..hi, bbox.min_col..bbox.max_col]);
                let src = region.mask.slice(s![a..b, ..]);
                Zip::from(&mut dst).and(&src).for_each(|d, &m| *d |= m);
            }
        }
        Ok(())
    }
}
