//! # 数值协作者模块
//!
//! 周期性分析所依赖的"黑盒"数值例程，按约定接口实现：
//! - `peaks`: 一维峰值查找（height / threshold / prominence 过滤）
//! - `filter`: 高斯平滑与二次插值
//! - `least_squares`: 线性最小二乘与带超时的 Levenberg-Marquardt 非线性拟合
//! - `dbscan`: 一维密度聚类，保留 `NOISE` 标签
//!
//! ## 依赖关系
//! - 被 `models/`, `periodicity/`, `phaser/` 使用
//! - 使用 `nalgebra` 求解线性方程组

pub mod dbscan;
pub mod filter;
pub mod least_squares;
pub mod peaks;
