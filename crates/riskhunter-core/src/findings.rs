//! 命中记录与单文件扫描结果
use serde::Serialize;
use std::path::PathBuf;

use crate::diagnostics::Diagnostic;

/// 单次命中（不可变，所有权依次移交给调度器与聚合器）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub rule_name: String,
    pub file_path: PathBuf,
    /// 1 起始
    pub line_number: usize,
    pub snippet: String,
}

/// 报告中的输出项：`{"file": ..., "line": ..., "snippet": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct OutputItem<'a> {
    pub file: std::borrow::Cow<'a, str>,
    pub line: usize,
    pub snippet: &'a str,
}

impl MatchRecord {
    pub fn output_item(&self) -> OutputItem<'_> {
        OutputItem {
            file: self.file_path.to_string_lossy(),
            line: self.line_number,
            snippet: &self.snippet,
        }
    }
}

impl Serialize for MatchRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.output_item().serialize(serializer)
    }
}

/// 单文件扫描结果：要么得到命中列表，要么带原因跳过
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Scanned(Vec<MatchRecord>),
    Skipped(Diagnostic),
}

/// 调度器回传的单文件结果
#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

impl FileResult {
    pub fn match_count(&self) -> usize {
        match &self.outcome {
            FileOutcome::Scanned(records) => records.len(),
            FileOutcome::Skipped(_) => 0,
        }
    }
}

/// 稳定排序：文件路径（按字节字典序）→ 行号；同一行内保持扫描时的命中顺序
pub(crate) fn sort_records_stable(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| {
        a.file_path
            .as_os_str()
            .cmp(b.file_path.as_os_str())
            .then(a.line_number.cmp(&b.line_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, line: usize, snippet: &str) -> MatchRecord {
        MatchRecord {
            rule_name: "r".into(),
            file_path: PathBuf::from(path),
            line_number: line,
            snippet: snippet.into(),
        }
    }

    #[test]
    fn sorts_by_path_then_line_keeping_in_line_order() {
        let mut v = vec![
            rec("/src/b.cpp", 5, "x"),
            rec("/src/a.cpp", 9, "y"),
            rec("/src/a.cpp", 2, "first"),
            rec("/src/a.cpp", 2, "second"),
        ];
        sort_records_stable(&mut v);
        let got: Vec<_> = v.iter().map(|r| (r.file_path.to_str().unwrap(), r.line_number, r.snippet.as_str())).collect();
        assert_eq!(
            got,
            [
                ("/src/a.cpp", 2, "first"),
                ("/src/a.cpp", 2, "second"),
                ("/src/a.cpp", 9, "y"),
                ("/src/b.cpp", 5, "x"),
            ]
        );
    }

    #[test]
    fn serializes_to_output_shape() {
        let json = serde_json::to_string(&rec("/src/a.cpp", 3, "STRCPY(")).unwrap();
        assert_eq!(json, r#"{"file":"/src/a.cpp","line":3,"snippet":"STRCPY("}"#);
    }
}
