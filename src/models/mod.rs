//! # 数据模型模块
//!
//! 定义光谱、区域、图样与采集配置的数据模型。
//!
//! ## 依赖关系
//! - 被 `phaser/`、`parsers/` 和 `commands/` 使用
//! - 子模块: config, pattern, region, spectrum

pub mod config;
pub mod pattern;
pub mod region;
pub mod spectrum;

pub use pattern::Pattern;
pub use region::Region;
pub use spectrum::{CollapseDirection, PeakDistances, Spectrum};
