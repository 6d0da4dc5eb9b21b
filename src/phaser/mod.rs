//! # 图样相位分析模块
//!
//! 从带掩码的 RHEED 图样出发，完成区域分割、投影光谱周期分析、
//! 跨图样周期聚类与峰组强度归属。
//!
//! ## 子模块
//! - `segment`: 连通区域标记
//! - `mask`: `MaskedPattern` 分阶段流水线
//! - `mixture`: 峰形混合模型
//! - `intensity`: 峰组强度归属
//! - `cluster`: 跨图样聚类
//! - `export`: CSV 导出
//!
//! ## 依赖关系
//! - 使用 `models/`、`numeric/`、`periodicity/`
//! - 被 `commands/` 使用

pub mod cluster;
pub mod export;
pub mod intensity;
pub mod mask;
pub mod mixture;
pub mod segment;

pub use cluster::{ClusterMean, IntensityMap, PeriodicityPhaser, NOISE_LABEL};
pub use mask::{CleanConfig, MaskedPattern};
pub use mixture::{FitQuality, MixtureConfig, MixtureModel};
