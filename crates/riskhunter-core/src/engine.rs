//! 单文件扫描引擎
//!
//! `ScanEngine` 定义"如何编译规则、如何扫描一个文件"；默认实现为基于 `regex` 的
//! `RegexEngine`。引擎是 `(target, rules)` 的纯函数，不持有任何可变共享状态，
//! 因此可以被所有 worker 以只读引用共享。
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::diagnostics::Diagnostic;
use crate::error::ConfigError;
use crate::findings::{FileOutcome, MatchRecord};
use crate::options::ScanOptions;
use crate::rules::RuleSet;

/// 待扫描文件：路径 + 大小；内容在扫描时才读取，且只读一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    path: PathBuf,
    size: u64,
}

impl ScanTarget {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self { path: path.into(), size }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        // 大小来自派发时的元数据，可能已过期，缓冲区交给 read_to_end 自行增长
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// 扫描引擎的可替换接口
pub trait ScanEngine: Send + Sync {
    fn compile_rules(config: &ScanConfig, options: &ScanOptions) -> Result<Self, ConfigError>
    where
        Self: Sized;

    fn rule_set(&self) -> &RuleSet;

    /// 消费一个目标并给出结果；任何单文件失败都以 `FileOutcome::Skipped` 返回
    fn scan(&self, target: ScanTarget) -> FileOutcome;
}

/// 默认引擎：整文件按 UTF-8 解码后逐规则做正则匹配
#[derive(Debug, Clone)]
pub struct RegexEngine {
    rules: RuleSet,
    max_snippet_chars: usize,
}

impl RegexEngine {
    pub fn new(rules: RuleSet, max_snippet_chars: usize) -> Self {
        Self { rules, max_snippet_chars }
    }

    /// 对已解码文本执行全部启用规则
    /// - 每个非空命中产出一条记录，零宽命中忽略
    /// - 规则按声明顺序，规则内按出现顺序
    pub fn scan_text(&self, path: &Path, text: &str) -> Vec<MatchRecord> {
        let mut lines: Option<LineIndex> = None;
        let mut records = Vec::new();

        for rule in self.rules.enabled() {
            for m in rule.pattern().find_iter(text) {
                if m.end() <= m.start() {
                    continue;
                }
                let index = lines.get_or_insert_with(|| LineIndex::new(text));
                records.push(MatchRecord {
                    rule_name: rule.name().to_string(),
                    file_path: path.to_path_buf(),
                    line_number: index.line_of(m.start()),
                    snippet: truncate_chars(m.as_str(), self.max_snippet_chars),
                });
            }
        }

        records
    }
}

impl ScanEngine for RegexEngine {
    fn compile_rules(config: &ScanConfig, options: &ScanOptions) -> Result<Self, ConfigError> {
        Ok(Self::new(RuleSet::compile(config)?, options.max_snippet_chars))
    }

    fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    fn scan(&self, target: ScanTarget) -> FileOutcome {
        let read = target.read();
        let path = target.path;
        let buf = match read {
            Ok(buf) => buf,
            Err(e) => return FileOutcome::Skipped(Diagnostic::ScanError { path, reason: e.to_string() }),
        };

        if is_probably_binary(&buf) {
            return FileOutcome::Skipped(Diagnostic::SkippedBinaryFile { path });
        }
        let text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(_) => return FileOutcome::Skipped(Diagnostic::SkippedBinaryFile { path }),
        };

        FileOutcome::Scanned(self.scan_text(&path, &text))
    }
}

/// 换行符偏移表，用于把字节偏移换算成 1 起始的行号
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let newlines = text.bytes().enumerate().filter(|&(_, b)| b == b'\n').map(|(i, _)| i).collect();
        Self { newlines }
    }

    /// 行号 = 偏移之前的换行数 + 1
    fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }
}

/// 包含 NUL 字节即视为二进制（UTF-8 文本中不会出现）
fn is_probably_binary(buf: &[u8]) -> bool {
    buf.contains(&0)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}
