//! # 分隔文本网格解析器
//!
//! 解析以空白、逗号、分号或制表符分隔的二维数值网格（图样或掩码）。
//!
//! ## 格式说明
//! ```text
//! # comment
//! 0.0  0.1  0.3
//! 0.2, 0.8, 1.0
//! ```
//! - `#` 开头的行与空行被忽略
//! - 所有数据行的列数必须一致
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 和 `parsers/spectrum.rs` 使用
//! - 使用 `ndarray` 存储网格

use crate::error::{Result, RheedError};

use ndarray::Array2;
use std::fs;
use std::path::Path;

/// 拆分一行中的数值字段
pub(crate) fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|s| !s.is_empty())
}

/// 数据行：去除注释与空行
pub(crate) fn data_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

/// 解析网格文件
pub fn parse_grid_file(path: &Path) -> Result<Array2<f64>> {
    let content = fs::read_to_string(path).map_err(|e| RheedError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_grid_content(&content, &path.display().to_string())
}

/// 从字符串内容解析网格
pub fn parse_grid_content(content: &str, name: &str) -> Result<Array2<f64>> {
    let parse_error = |reason: String| RheedError::ParseError {
        format: "grid".to_string(),
        path: name.to_string(),
        reason,
    };

    let mut values = Vec::new();
    let mut cols = None;
    let mut rows = 0;

    for (lineno, line) in data_lines(content) {
        let row = split_fields(line)
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| parse_error(format!("line {}: {}", lineno, e)))?;

        match cols {
            None => cols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(parse_error(format!(
                    "line {} has {} columns, expected {}",
                    lineno,
                    row.len(),
                    n
                )));
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    let cols = cols.ok_or_else(|| parse_error("no data rows".to_string()))?;
    Array2::from_shape_vec((rows, cols), values).map_err(|e| parse_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_delimiters() {
        let content = "# pattern\n\n1 2 3\n4,5,6\n7;8\t9\n";
        let grid = parse_grid_content(content, "test").unwrap();
        assert_eq!(grid.dim(), (3, 3));
        assert_eq!(grid[[1, 2]], 6.0);
        assert_eq!(grid[[2, 1]], 8.0);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = parse_grid_content("1 2 3\n4 5\n", "ragged");
        assert!(matches!(err, Err(RheedError::ParseError { .. })));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = parse_grid_content("1 x\n", "bad").unwrap_err();
        assert!(err.to_string().contains("grid"));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(parse_grid_content("# nothing\n", "empty").is_err());
    }
}
