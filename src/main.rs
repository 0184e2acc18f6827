use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mseed_extract::core::{parse_epoch, Epoch, IndexRow};
use mseed_extract::{ExtractError, ExtractionReport, Extractor, ExtractorConfig, PathRewriteConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 按时间窗口从 miniSEED 归档中抽取数据
#[derive(Parser, Debug)]
#[command(name = "mseed-extract")]
#[command(version, about, long_about = None)]
struct Args {
    /// 索引行 JSON 数组文件
    #[arg(long)]
    rows: PathBuf,

    /// 覆盖所有行的请求起始时间（epoch 秒或 ISO-8601）
    #[arg(long, value_parser = epoch_arg, requires = "end")]
    start: Option<Epoch>,

    #[arg(long, value_parser = epoch_arg, requires = "start")]
    end: Option<Epoch>,

    /// 输出文件，缺省写 stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件，缺省 <config_dir>/mseed-extract/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// 单请求字节上限，0 不限制
    #[arg(long)]
    request_limit: Option<u64>,

    /// 数据文件路径改写
    #[arg(long, num_args = 2, value_names = ["PATTERN", "REPLACEMENT"])]
    dp_replace: Option<Vec<String>>,
}

fn epoch_arg(s: &str) -> Result<Epoch, String> {
    parse_epoch(s).ok_or_else(|| format!("not an epoch or ISO-8601 time: {s}"))
}

const EXIT_NO_DATA: u8 = 2;
const EXIT_LIMIT: u8 = 3;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(report) => {
            info!("Extraction finished\n{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<ExtractError>() {
                Some(ExtractError::NoData) => ExitCode::from(EXIT_NO_DATA),
                Some(ExtractError::RequestLimitExceeded { .. }) => ExitCode::from(EXIT_LIMIT),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExtractionReport> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::load_default()?,
    };
    if let Some(limit) = args.request_limit {
        config.request_limit = limit;
    }
    if let Some([pattern, replacement]) = args.dp_replace.as_deref() {
        config.path_rewrite = Some(PathRewriteConfig {
            pattern: pattern.clone(),
            replacement: replacement.clone(),
        });
    }

    let extractor = Extractor::new(&config)?;

    let text = std::fs::read_to_string(&args.rows)
        .with_context(|| format!("Failed to read index rows from {}", args.rows.display()))?;
    let rows: Vec<IndexRow> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse index rows in {}", args.rows.display()))?;
    info!("Loaded {} index rows", rows.len());

    let stream = match (args.start, args.end) {
        (Some(start), Some(end)) => extractor.extract_window(start, end, rows)?,
        _ => extractor.extract(rows)?,
    };
    info!("Validated request: {} bytes planned", stream.planned_bytes());

    let report = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output {}", path.display()))?;
            let mut sink = BufWriter::new(file);
            let report = stream.write_to(&mut sink)?;
            sink.flush()
                .with_context(|| format!("Failed to flush output {}", path.display()))?;
            report
        }
        None => {
            let stdout = std::io::stdout();
            let mut sink = BufWriter::new(stdout.lock());
            stream.write_to(&mut sink)?
        }
    };
    Ok(report)
}
