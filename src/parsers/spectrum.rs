//! # 一维光谱解析器
//!
//! 解析两列（坐标、强度）或单列（强度，坐标取采样序号）的分隔文本。
//! 列分隔规则与 `parsers/grid.rs` 一致，多余的列被忽略。
//!
//! ## 依赖关系
//! - 被 `commands/spectrum.rs` 使用
//! - 使用 `models/spectrum.rs`

use crate::error::{Result, RheedError};
use crate::models::spectrum::Spectrum;
use crate::parsers::grid::{data_lines, split_fields};

use std::fs;
use std::path::Path;

/// 解析光谱文件
pub fn parse_spectrum_file(path: &Path) -> Result<Spectrum> {
    let content = fs::read_to_string(path).map_err(|e| RheedError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_spectrum_content(&content, &path.display().to_string())
}

/// 从字符串内容解析光谱
pub fn parse_spectrum_content(content: &str, name: &str) -> Result<Spectrum> {
    let parse_error = |reason: String| RheedError::ParseError {
        format: "spectrum".to_string(),
        path: name.to_string(),
        reason,
    };

    let mut ws = Vec::new();
    let mut spec = Vec::new();
    let mut single_column = None;

    for (lineno, line) in data_lines(content) {
        let fields = split_fields(line)
            .take(2)
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| parse_error(format!("line {}: {}", lineno, e)))?;

        let single = fields.len() == 1;
        if *single_column.get_or_insert(single) != single {
            return Err(parse_error(format!("line {} changes the column count", lineno)));
        }
        match fields.as_slice() {
            [y] => spec.push(*y),
            [x, y] => {
                ws.push(*x);
                spec.push(*y);
            }
            _ => {}
        }
    }

    if spec.is_empty() {
        return Err(parse_error("no data rows".to_string()));
    }
    if single_column == Some(true) {
        Ok(Spectrum::from_values(spec))
    } else {
        Spectrum::new(ws, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_two_columns() {
        let s = parse_spectrum_content("# ws spec\n0.5, 1\n1.0, 3\n1.5, 2\n", "s").unwrap();
        assert_eq!(s.ws(), &[0.5, 1.0, 1.5]);
        assert_eq!(s.spec(), &[1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_single_column_uses_index() {
        let s = parse_spectrum_content("4\n5\n6\n", "s").unwrap();
        assert_eq!(s.ws(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_unordered_coordinates_rejected() {
        let err = parse_spectrum_content("1 1\n0 2\n", "s");
        assert!(matches!(err, Err(RheedError::UnorderedCoordinates)));
    }

    #[test]
    fn test_mixed_columns_rejected() {
        assert!(parse_spectrum_content("1 1\n2\n", "s").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0\t0.0\n1\t1.0\n2\t0.0").unwrap();
        let s = parse_spectrum_file(file.path()).unwrap();
        assert_eq!(s.len(), 3);
    }
}
