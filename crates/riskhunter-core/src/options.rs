//! 运行选项与统计信息（模块）

/// 大文件阈值默认值（字节）。超过阈值的文件优先派发，但仍整文件扫描。
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 1024 * 1024; // 1 MiB
/// 命中片段默认最大字符数
pub const DEFAULT_MAX_SNIPPET_CHARS: usize = 200;

/// 扫描选项（与规则配置分离，属于单次运行的参数）
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// worker 数：None 表示自动（等于 CPU 核数）
    pub concurrency: Option<usize>,
    /// 大文件阈值（字节），仅影响派发顺序
    pub large_file_threshold: u64,
    /// 片段截断长度（字符数）
    pub max_snippet_chars: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: None,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            max_snippet_chars: DEFAULT_MAX_SNIPPET_CHARS,
        }
    }
}

impl ScanOptions {
    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = Some(workers);
        self
    }

    /// 实际 worker 数，至少为 1
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// 扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub files_discovered: usize,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub matches_total: usize,
}
