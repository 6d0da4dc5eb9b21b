//! # 周期性分析模块
//!
//! 单条光谱内的周期峰族检测与峰组划分：
//! - `distance`: 峰间距离、中心峰、邻峰顺序与网格
//! - `family`: 以中心峰为原点的周期峰族搜索
//! - `resolver`: 将重叠峰族转换为互斥峰组
//!
//! ## 依赖关系
//! - 被 `models/spectrum.rs` 和 `phaser/` 使用
//! - 子模块: distance, family, resolver

pub mod distance;
pub mod family;
pub mod resolver;

pub use family::{analyze_peaks_distance_cent, DistanceConfig, PeakFamily};
pub use resolver::{get_peaks_group, PeakGroup, LEFTOVER_DIST};
