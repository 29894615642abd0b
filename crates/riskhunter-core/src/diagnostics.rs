//! 非致命诊断与单次运行的诊断收集器
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 单文件的非致命问题，随报告一起返回，由上层决定是否告警
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// 二进制或非 UTF-8 内容
    SkippedBinaryFile { path: PathBuf },
    /// 读取失败（权限不足、运行中被删除等）
    ScanError { path: PathBuf, reason: String },
}

impl Diagnostic {
    pub fn path(&self) -> &Path {
        match self {
            Diagnostic::SkippedBinaryFile { path } => path,
            Diagnostic::ScanError { path, .. } => path,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedBinaryFile { path } => {
                write!(f, "skipped binary file: {}", path.display())
            }
            Diagnostic::ScanError { path, reason } => {
                write!(f, "failed to scan {}: {}", path.display(), reason)
            }
        }
    }
}

/// 单次运行内的诊断收集器
///
/// 每次运行新建一个，显式传给调度器；记录时即写日志，`finish` 时按路径排序后交出。
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    items: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        warn!(path = %diagnostic.path().display(), "{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(mut self) -> Vec<Diagnostic> {
        self.items.sort_by(|a, b| a.path().as_os_str().cmp(b.path().as_os_str()));
        self.items
    }
}
