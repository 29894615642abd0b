//! 规则驱动的词法风险扫描库
//!
//! 设计要点：
//! - 规则来自配置，编译为不可变 `RuleSet`，在所有 worker 间只读共享。
//! - 单个文件不可读或是二进制文件只会产生诊断（`Diagnostic`），绝不会中断整次运行。
//! - 报告按规则声明顺序输出，命中按 文件路径 → 行号 排序；与并发度、完成顺序无关。
//! - 仅做文本/词法匹配，不做语法树解析或跨文件分析。

mod cancel;
mod collector;
mod config;
mod coordinator;
mod diagnostics;
mod engine;
mod error;
mod findings;
mod options;
mod report;
mod rules;
mod scan;

pub use cancel::CancellationToken;
pub use collector::{Collected, FileCollector};
pub use config::{RuleConfig, RuleTable, ScanConfig};
pub use coordinator::{CoordinatorOutput, RunStatus, ScanCoordinator};
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use engine::{RegexEngine, ScanEngine, ScanTarget};
pub use error::{ConfigError, ScanError};
pub use findings::{FileOutcome, FileResult, MatchRecord, OutputItem};
pub use options::{ScanOptions, ScanStats, DEFAULT_LARGE_FILE_THRESHOLD, DEFAULT_MAX_SNIPPET_CHARS};
pub use report::{aggregate, Report, ReportEntry};
pub use rules::{Category, Rule, RuleSet};
pub use scan::{run, ScanOutcome, Scanner};
