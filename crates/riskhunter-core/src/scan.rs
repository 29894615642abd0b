//! 扫描主流程：配置 → 规则集 → 收集文件 → 并行扫描 → 聚合报告
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::cancel::CancellationToken;
use crate::collector::FileCollector;
use crate::config::ScanConfig;
use crate::coordinator::{RunStatus, ScanCoordinator};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::engine::{RegexEngine, ScanEngine};
use crate::error::ScanError;
use crate::options::{ScanOptions, ScanStats};
use crate::report::Report;

/// 一次运行的最终结果
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed { report: Report, diagnostics: Vec<Diagnostic>, stats: ScanStats },
    /// 收到取消请求；已扫描的部分结果被丢弃，只保留诊断与统计
    Cancelled { diagnostics: Vec<Diagnostic>, stats: ScanStats },
}

impl ScanOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            ScanOutcome::Completed { .. } => RunStatus::Completed,
            ScanOutcome::Cancelled { .. } => RunStatus::Cancelled,
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            ScanOutcome::Completed { report, .. } => Some(report),
            ScanOutcome::Cancelled { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ScanOutcome::Completed { diagnostics, .. } | ScanOutcome::Cancelled { diagnostics, .. } => diagnostics,
        }
    }

    pub fn stats(&self) -> &ScanStats {
        match self {
            ScanOutcome::Completed { stats, .. } | ScanOutcome::Cancelled { stats, .. } => stats,
        }
    }
}

/// 扫描器：编译好的引擎 + 文件收集策略 + 运行选项
///
/// 规则在构造时编译，非法配置在任何文件被读取之前就会失败。
pub struct Scanner<E: ScanEngine = RegexEngine> {
    engine: E,
    collector: FileCollector,
    options: ScanOptions,
    cancel: CancellationToken,
}

impl Scanner<RegexEngine> {
    pub fn new(config: &ScanConfig, options: ScanOptions) -> Result<Self, ScanError> {
        Self::with_engine(config, options)
    }
}

impl<E: ScanEngine> Scanner<E> {
    pub fn with_engine(config: &ScanConfig, options: ScanOptions) -> Result<Self, ScanError> {
        let engine = E::compile_rules(config, &options)?;
        Ok(Self {
            engine,
            collector: FileCollector::from_config(config),
            options,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 克隆出的令牌可在其他线程（例如信号处理）中调用 `cancel`
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(&self, root: &Path) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();
        let collected = self.collector.collect(root)?;
        info!(
            root = %root.display(),
            files = collected.files.len(),
            rules = self.engine.rule_set().len(),
            "starting scan"
        );

        // 诊断收集器与本次运行同生命周期；遍历阶段丢失的目录也要记进去
        let mut sink = DiagnosticSink::new();
        for diag in collected.diagnostics {
            sink.record(diag);
        }
        let output = ScanCoordinator::new(&self.options)
            .with_cancellation(self.cancel.clone())
            .run(collected.files, &self.engine, &mut sink)?;
        let diagnostics = sink.finish();
        let stats = output.stats;

        info!(
            files_scanned = stats.files_scanned,
            files_skipped = stats.files_skipped,
            matches = stats.matches_total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = ?output.status,
            "scan finished"
        );

        Ok(match output.report {
            Some(report) if output.status == RunStatus::Completed => ScanOutcome::Completed { report, diagnostics, stats },
            _ => ScanOutcome::Cancelled { diagnostics, stats },
        })
    }
}

/// 便捷入口：`run(root, config) -> (Report, Diagnostics)`
///
/// 配置错误与根路径不存在会在启动任何 worker 之前直接返回。
pub fn run(root: &Path, config: &ScanConfig, options: &ScanOptions) -> Result<ScanOutcome, ScanError> {
    Scanner::new(config, options.clone())?.run(root)
}
