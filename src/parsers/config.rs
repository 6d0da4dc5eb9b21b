//! # 采集配置解析器
//!
//! 从 JSON 文件读取 `RheedConfig`：
//!
//! ```json
//! {"sub_ccd_dist": 280.0, "pixel_real": 0.0536, "ccd_cam_width": 34.8,
//!  "ccd_cam_height": 26.1, "max_intensity": 4095.0, "wave_length": 8.59e-12}
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `serde_json` 反序列化

use crate::error::{Result, RheedError};
use crate::models::config::RheedConfig;

use std::fs;
use std::path::Path;

/// 读取采集配置
pub fn load_config(path: &Path) -> Result<RheedConfig> {
    if !path.exists() {
        return Err(RheedError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| RheedError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: RheedConfig = serde_json::from_str(&content)?;
    log::debug!("loaded acquisition config from {}", path.display());
    Ok(config)
}
