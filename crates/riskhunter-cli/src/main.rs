use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use riskhunter_core::{
    CancellationToken, Report, RuleSet, ScanConfig, ScanOptions, ScanOutcome, Scanner, DEFAULT_LARGE_FILE_THRESHOLD,
    DEFAULT_MAX_SNIPPET_CHARS,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "riskhunter", version, about = "源码词法风险模式扫描")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描文件或目录，输出按规则聚合的 JSON 报告
    Scan {
        /// 扫描根路径（文件或目录）
        #[arg(long)]
        input: PathBuf,

        /// 规则配置（.toml 或 .json），缺省使用内置规则
        #[arg(long)]
        config: Option<PathBuf>,

        /// 报告输出文件；缺省打印到 stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// worker 数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 大文件阈值（字节），超过的文件优先调度
        #[arg(long, default_value_t = DEFAULT_LARGE_FILE_THRESHOLD)]
        large_file_threshold: u64,

        /// 命中片段最大字符数
        #[arg(long, default_value_t = DEFAULT_MAX_SNIPPET_CHARS)]
        snippet_chars: usize,
    },
    /// 列出配置中的规则
    Rules {
        /// 规则配置（.toml 或 .json），缺省使用内置规则
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, config, output, threads, large_file_threshold, snippet_chars } => {
            let cfg = load_config(config.as_deref())?;
            let opts = ScanOptions {
                concurrency: parse_threads(&threads)?,
                large_file_threshold,
                max_snippet_chars: snippet_chars,
            };
            let scanner = Scanner::new(&cfg, opts).context("invalid rule configuration")?;
            // Ctrl-C：worker 不再领取新文件，本次运行以非零状态退出且不写报告
            ctrlc::set_handler(interrupt_handler(scanner.cancellation())).context("install interrupt handler")?;
            let outcome = scanner.run(&input).with_context(|| format!("scan of {} failed", input.display()))?;

            let report = completed_report(&outcome)?;
            let json = report.to_json_pretty().context("serialize report")?;
            match output {
                Some(path) => {
                    // 以缓冲方式打开输出文件
                    let mut out = BufWriter::new(File::create(&path).context("create output file")?);
                    out.write_all(json.as_bytes())?;
                    out.write_all(b"\n")?;
                    out.flush().context("flush output file")?;
                    info!(output = %path.display(), "report written");
                }
                None => println!("{json}"),
            }

            let stats = outcome.stats();
            info!(
                files_scanned = stats.files_scanned,
                files_skipped = stats.files_skipped,
                matches = stats.matches_total,
                diagnostics = outcome.diagnostics().len(),
                "done"
            );
            for (category, count) in report.counts_by_category() {
                let category = category.map(|c| c.as_str()).unwrap_or("-");
                info!(category, matches = count, "matches by category");
            }
        }
        Commands::Rules { config } => {
            let cfg = load_config(config.as_deref())?;
            let rules = RuleSet::compile(&cfg).context("invalid rule configuration")?;
            for rule in rules.rules() {
                let category = rule.category().map(|c| c.as_str()).unwrap_or("-");
                let state = if rule.is_enabled() { "on" } else { "off" };
                println!("{:<28} {:<12} {:<4} {}", rule.name(), category, state, rule.pattern().as_str());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(p) => ScanConfig::from_path(p).with_context(|| format!("load config {}", p.display())),
        None => ScanConfig::builtin().context("load builtin rules"),
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写 stderr，stdout 留给报告
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn interrupt_handler(token: CancellationToken) -> impl Fn() + Send + 'static {
    move || {
        eprintln!("interrupted, stopping scan...");
        token.cancel();
    }
}

/// 只有完整结束的运行才有报告
fn completed_report(outcome: &ScanOutcome) -> Result<&Report> {
    match outcome {
        ScanOutcome::Completed { report, .. } => Ok(report),
        ScanOutcome::Cancelled { .. } => bail!("scan cancelled, no report written"),
    }
}

/// 解析线程参数："auto" 表示自动
fn parse_threads(s: &str) -> Result<Option<usize>> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(Some(n)),
        _ => bail!("invalid --threads value `{s}` (expected \"auto\" or a positive integer)"),
    }
}
