//! 目标文件收集：递归遍历 + 扩展名白名单 + 目录黑名单
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::diagnostics::Diagnostic;
use crate::error::ScanError;

/// 收集结果：目标文件 + 遍历中无法进入的路径（以诊断形式交给调用方）
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub files: HashSet<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct FileCollector {
    /// 已归一化：去掉前导 `.`
    extensions: Vec<String>,
    exclude_dirs: HashSet<String>,
}

impl FileCollector {
    pub fn new<E, S, D, T>(extensions: E, exclude_dirs: D) -> Self
    where
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
        D: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            exclude_dirs: exclude_dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        let extensions = config.file_extensions.as_deref().unwrap_or_default();
        Self::new(extensions, config.exclude_dirs.iter().cloned())
    }

    /// 收集 `root` 下的目标文件（绝对路径，无序）
    ///
    /// - `root` 为文件时直接返回该文件，不再做扩展名过滤
    /// - 不跟随符号链接
    /// - 被排除的目录整棵剪掉，不再下探
    /// - 无法读取的子目录不会中断遍历，记为 `Diagnostic::ScanError`
    pub fn collect(&self, root: &Path) -> Result<Collected, ScanError> {
        let md = match std::fs::metadata(root) {
            Ok(md) => md,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::PathNotFound(root.to_path_buf()))
            }
            Err(source) => return Err(ScanError::Io { path: root.to_path_buf(), source }),
        };
        let root = root
            .canonicalize()
            .map_err(|source| ScanError::Io { path: root.to_path_buf(), source })?;

        let mut out = Collected::default();
        if md.is_file() {
            out.files.insert(root);
            return Ok(out);
        }

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && self.is_excluded(e.file_name())));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    let path = err.path().unwrap_or(root.as_path()).to_path_buf();
                    out.diagnostics.push(walk_diagnostic(path, &err));
                    continue;
                }
            };
            if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                out.files.insert(entry.into_path());
            }
        }
        Ok(out)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn is_excluded(&self, name: &OsStr) -> bool {
        name.to_str().is_some_and(|n| self.exclude_dirs.contains(n))
    }
}

fn walk_diagnostic(path: PathBuf, err: &dyn std::fmt::Display) -> Diagnostic {
    Diagnostic::ScanError { path, reason: err.to_string() }
}
