//! 并行调度：固定大小的 worker 池从共享队列拉取文件
//!
//! - 工作队列是 crossbeam 的 MPMC 通道，worker 主动拉取，天然均衡大小不一的文件
//! - 结果经有界通道回到调用线程，按文件序号暂存，最后交给聚合器统一排序
//! - 规则集是唯一跨线程共享的对象，且只读
use crossbeam_channel as channel;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::engine::{ScanEngine, ScanTarget};
use crate::error::ScanError;
use crate::findings::{FileOutcome, FileResult};
use crate::options::{ScanOptions, ScanStats};
use crate::report::{aggregate, Report};

/// 结果通道容量
const RESULT_CHANNEL_CAP: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// 调度结果；被取消时不产出报告（部分结果直接丢弃）
#[derive(Debug, Clone)]
pub struct CoordinatorOutput {
    pub status: RunStatus,
    pub report: Option<Report>,
    pub stats: ScanStats,
}

#[derive(Debug, Clone)]
pub struct ScanCoordinator {
    concurrency: usize,
    large_file_threshold: u64,
    cancel: CancellationToken,
}

impl ScanCoordinator {
    pub fn new(options: &ScanOptions) -> Self {
        Self {
            concurrency: options.effective_concurrency(),
            large_file_threshold: options.large_file_threshold,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 扫描给定文件集合
    ///
    /// 单文件失败只会记录到 `sink`，不会中断运行；只有线程池创建失败才返回错误。
    pub fn run<E, I>(&self, files: I, engine: &E, sink: &mut DiagnosticSink) -> Result<CoordinatorOutput, ScanError>
    where
        E: ScanEngine,
        I: IntoIterator<Item = PathBuf>,
    {
        // 序号按路径排序分配，保证后续暂存顺序与调度无关
        let mut paths: Vec<PathBuf> = files.into_iter().collect();
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        paths.dedup();

        let mut stats = ScanStats { files_discovered: paths.len(), ..ScanStats::default() };
        let mut results: BTreeMap<usize, FileResult> = BTreeMap::new();
        let mut targets: Vec<(usize, ScanTarget)> = Vec::with_capacity(paths.len());

        for (idx, path) in paths.into_iter().enumerate() {
            match ScanTarget::from_path(&path) {
                Ok(t) => targets.push((idx, t)),
                Err(e) => {
                    let diag = Diagnostic::ScanError { path: path.clone(), reason: e.to_string() };
                    sink.record(diag.clone());
                    results.insert(idx, FileResult { path, outcome: FileOutcome::Skipped(diag) });
                }
            }
        }

        let targets = self.dispatch_order(targets);
        let workers = self.concurrency.min(targets.len()).max(1);
        info!(files = stats.files_discovered, workers, "dispatching scan");

        let (work_tx, work_rx) = channel::unbounded::<(usize, ScanTarget)>();
        for item in targets {
            // 接收端尚在，发送不会失败
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("riskhunter-worker-{i}"))
            .build()?;
        let (res_tx, res_rx) = channel::bounded::<(usize, FileResult)>(RESULT_CHANNEL_CAP);
        let cancel = &self.cancel;

        std::thread::scope(|s| {
            s.spawn(move || {
                pool.scope(|ps| {
                    for _ in 0..workers {
                        let work_rx = work_rx.clone();
                        let res_tx = res_tx.clone();
                        ps.spawn(move |_| worker_loop(engine, &work_rx, &res_tx, cancel));
                    }
                });
                // 所有 Sender 在此被丢弃，接收端随之结束
            });

            while let Ok((idx, result)) = res_rx.recv() {
                if let FileOutcome::Skipped(diag) = &result.outcome {
                    sink.record(diag.clone());
                }
                results.insert(idx, result);
            }
        });

        for r in results.values() {
            match &r.outcome {
                FileOutcome::Scanned(records) => {
                    stats.files_scanned += 1;
                    stats.matches_total += records.len();
                }
                FileOutcome::Skipped(_) => stats.files_skipped += 1,
            }
        }

        if self.cancel.is_cancelled() {
            info!(files_scanned = stats.files_scanned, "scan cancelled, discarding partial results");
            return Ok(CoordinatorOutput { status: RunStatus::Cancelled, report: None, stats });
        }

        let report = aggregate(results.into_values(), engine.rule_set());
        Ok(CoordinatorOutput { status: RunStatus::Completed, report: Some(report), stats })
    }

    /// 派发顺序：超过阈值的大文件先走（按大小降序），其余按路径顺序
    fn dispatch_order(&self, mut targets: Vec<(usize, ScanTarget)>) -> Vec<(usize, ScanTarget)> {
        let threshold = self.large_file_threshold;
        targets.sort_by(|(ia, a), (ib, b)| {
            let large_a = a.size() > threshold;
            let large_b = b.size() > threshold;
            large_b
                .cmp(&large_a)
                .then_with(|| if large_a && large_b { b.size().cmp(&a.size()) } else { std::cmp::Ordering::Equal })
                .then(ia.cmp(ib))
        });
        let large = targets.iter().take_while(|(_, t)| t.size() > threshold).count();
        if large > 0 {
            debug!(large, threshold, "large files scheduled first");
        }
        targets
    }
}

/// worker 主循环：取消后不再拉取新文件，手头的文件照常扫完
fn worker_loop<E: ScanEngine>(
    engine: &E,
    work: &channel::Receiver<(usize, ScanTarget)>,
    results: &channel::Sender<(usize, FileResult)>,
    cancel: &CancellationToken,
) {
    while !cancel.is_cancelled() {
        let (idx, target) = match work.recv() {
            Ok(item) => item,
            Err(_) => break,
        };
        let path = target.path().to_path_buf();
        let outcome = engine.scan(target);
        if results.send((idx, FileResult { path, outcome })).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, ScanConfig};
    use crate::engine::RegexEngine;
    use crate::rules::RuleSet;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn engine() -> RegexEngine {
        let cfg = ScanConfig::new(["cpp"]).with_rule("gets", RuleConfig::new(r"gets\s*\("));
        RegexEngine::new(RuleSet::compile(&cfg).unwrap(), 200)
    }

    fn write_files(dir: &TempDir, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let p = dir.path().join(format!("f{i:03}.cpp"));
                fs::write(&p, format!("{}gets(buf);\n", "\n".repeat(i % 7))).unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn output_is_identical_across_worker_counts() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 40);
        let e = engine();

        let mut outputs = Vec::new();
        for workers in [1, 2, 4, 8] {
            let coord = ScanCoordinator::new(&ScanOptions::default().with_concurrency(workers));
            let mut sink = DiagnosticSink::new();
            let out = coord.run(files.iter().rev().cloned(), &e, &mut sink).unwrap();
            assert_eq!(out.status, RunStatus::Completed);
            assert_eq!(out.stats.files_scanned, 40);
            assert_eq!(out.stats.matches_total, 40);
            outputs.push(serde_json::to_string(&out.report.unwrap()).unwrap());
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn missing_file_becomes_diagnostic() {
        let dir = TempDir::new().unwrap();
        let mut files = write_files(&dir, 3);
        files.push(dir.path().join("vanished.cpp"));

        let mut sink = DiagnosticSink::new();
        let out = ScanCoordinator::new(&ScanOptions::default().with_concurrency(2))
            .run(files, &engine(), &mut sink)
            .unwrap();
        assert_eq!(out.stats.files_discovered, 4);
        assert_eq!(out.stats.files_skipped, 1);
        assert_eq!(out.report.unwrap().total_matches(), 3);
        let diags = sink.finish();
        assert!(matches!(diags.as_slice(), [Diagnostic::ScanError { .. }]));
    }

    #[test]
    fn cancelled_before_start_reports_no_results() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 10);
        let token = CancellationToken::new();
        token.cancel();

        let mut sink = DiagnosticSink::new();
        let out = ScanCoordinator::new(&ScanOptions::default())
            .with_cancellation(token)
            .run(files, &engine(), &mut sink)
            .unwrap();
        assert_eq!(out.status, RunStatus::Cancelled);
        assert!(out.report.is_none());
        assert_eq!(out.stats.files_scanned, 0);
    }

    /// 第一次扫描时触发取消的引擎，用来模拟运行中途收到中断
    struct CancelOnFirstScan {
        inner: RegexEngine,
        token: CancellationToken,
        scans: AtomicUsize,
    }

    impl ScanEngine for CancelOnFirstScan {
        fn compile_rules(config: &ScanConfig, options: &ScanOptions) -> Result<Self, crate::error::ConfigError> {
            Ok(Self {
                inner: RegexEngine::compile_rules(config, options)?,
                token: CancellationToken::new(),
                scans: AtomicUsize::new(0),
            })
        }

        fn rule_set(&self) -> &RuleSet {
            self.inner.rule_set()
        }

        fn scan(&self, target: ScanTarget) -> FileOutcome {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.token.cancel();
            self.inner.scan(target)
        }
    }

    #[test]
    fn cancelled_mid_run_stops_pulling_work() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 50);
        let token = CancellationToken::new();
        let e = CancelOnFirstScan { inner: engine(), token: token.clone(), scans: AtomicUsize::new(0) };

        let mut sink = DiagnosticSink::new();
        let out = ScanCoordinator::new(&ScanOptions::default().with_concurrency(4))
            .with_cancellation(token)
            .run(files, &e, &mut sink)
            .unwrap();

        assert_eq!(out.status, RunStatus::Cancelled);
        assert!(out.report.is_none());
        assert_eq!(out.stats.files_discovered, 50);
        // 每个 worker 最多扫完手头的一个文件
        assert!(out.stats.files_scanned <= 4);
        assert!(out.stats.files_scanned < out.stats.files_discovered);
        assert_eq!(e.scans.load(Ordering::SeqCst), out.stats.files_scanned);
        assert!(sink.is_empty());
    }

    #[test]
    fn empty_file_set_completes() {
        let mut sink = DiagnosticSink::new();
        let out = ScanCoordinator::new(&ScanOptions::default())
            .run(Vec::new(), &engine(), &mut sink)
            .unwrap();
        assert_eq!(out.status, RunStatus::Completed);
        let report = out.report.unwrap();
        assert_eq!(report.rule_names().collect::<Vec<_>>(), ["gets"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn large_files_are_dispatched_first() {
        let coord = ScanCoordinator::new(&ScanOptions { large_file_threshold: 100, ..ScanOptions::default() });
        let targets = vec![
            (0, ScanTarget::new("/a", 10)),
            (1, ScanTarget::new("/b", 500)),
            (2, ScanTarget::new("/c", 20)),
            (3, ScanTarget::new("/d", 900)),
        ];
        let order: Vec<_> = coord.dispatch_order(targets).into_iter().map(|(i, _)| i).collect();
        assert_eq!(order, [3, 1, 0, 2]);
    }
}
