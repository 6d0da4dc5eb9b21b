//! # RHEED 采集几何配置
//!
//! 保存实验几何参数，并提供像素水平距离到倒空间间距的换算。
//!
//! ## 依赖关系
//! - 被 `models/pattern.rs`、`phaser/cluster.rs` 和 `parsers/config.rs` 使用
//! - 使用 `serde` 进行 JSON (反)序列化

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// RHEED 实验配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RheedConfig {
    /// 样品到 CCD 的距离 (mm)
    pub sub_ccd_dist: f64,
    /// 像素尺寸 (mm/pixel)
    pub pixel_real: f64,
    /// CCD 宽度 (mm)
    pub ccd_cam_width: f64,
    /// CCD 高度 (mm)
    pub ccd_cam_height: f64,
    /// 最大强度
    pub max_intensity: f64,
    /// 电子波长 (mm)
    pub wave_length: f64,
}

impl RheedConfig {
    /// 将水平像素距离换算为倒空间间距 dG (nm⁻¹)
    ///
    /// `real = pixel_real·d`, `k0 = 2π/λ`, `dG = k0 / sqrt((L/real)² + 1) · 1e-6`
    pub fn hdist_to_g(&self, dist: f64) -> f64 {
        let real_dist = self.pixel_real * dist;
        let k0 = 2.0 * PI / self.wave_length;
        let r = (self.sub_ccd_dist / real_dist).powi(2);
        k0 / (r + 1.0).sqrt() * 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RheedConfig {
        RheedConfig {
            sub_ccd_dist: 400.0,
            pixel_real: 0.1,
            ccd_cam_width: 80.0,
            ccd_cam_height: 60.0,
            max_intensity: 255.0,
            wave_length: 1.0e-8,
        }
    }

    #[test]
    fn test_hdist_to_g() {
        let cfg = config();
        // real = 4 mm, r = 10000, k0 = 2π·1e8
        let expected = 2.0 * PI * 1e8 / (10001.0_f64).sqrt() * 1e-6;
        assert!((cfg.hdist_to_g(40.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_hdist_to_g_is_monotonic() {
        let cfg = config();
        let a = cfg.hdist_to_g(10.0);
        let b = cfg.hdist_to_g(20.0);
        let c = cfg.hdist_to_g(40.0);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "sub_ccd_dist": 400, "pixel_real": 0.1, "ccd_cam_width": 80,
            "ccd_cam_height": 60, "max_intensity": 255, "wave_length": 1e-8
        }"#;
        let cfg: RheedConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg, config());
    }
}
