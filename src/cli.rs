use crate::{
    config::Config,
    pipeline, stats, store, trend,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "termsift")]
#[command(about = "Offline batch pipeline enriching e-commerce search terms with AI labels and trend filtering")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./termsift.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print effective endpoint and batch configuration as JSON.
    Doctor {},
    /// Step 0: drop growing-trend and single-word search terms.
    TrendFilter {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        slope_threshold: Option<f64>,
    },
    /// Step 1: label each search term with its brand (or "no").
    Brand {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Discard any previous progress and start over.
        #[arg(long)]
        fresh: bool,
    },
    /// Step 2: rate unbranded products on the viability axes.
    Validate {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fresh: bool,
    },
    /// Run brand identification then product validation.
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fresh: bool,
    },
    /// Show saved progress and a partial-results preview for a stage.
    Status {
        /// Stage to inspect: "brand" or "validate".
        #[arg(long)]
        stage: String,
    },
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::TrendFilter {
            input,
            output,
            slope_threshold,
        } => trend_filter(&cfg, input.as_deref(), output.as_deref(), *slope_threshold),
        Command::Brand { input, fresh } => {
            let input = resolve_input(&cfg, input.as_deref());
            pipeline::run_brand_stage(&cfg, &input, *fresh).await?;
            Ok(())
        }
        Command::Validate { input, fresh } => {
            let input = input.clone().unwrap_or_else(|| {
                Path::new(&cfg.paths.csv_folder).join(&cfg.output.no_brand_filename)
            });
            pipeline::run_validate_stage(&cfg, &input, *fresh).await?;
            Ok(())
        }
        Command::Run { input, fresh } => {
            let input = resolve_input(&cfg, input.as_deref());
            pipeline::run_pipeline(&cfg, &input, *fresh).await
        }
        Command::Status { stage } => status(&cfg, stage),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("termsift.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("termsift.example.toml"))
    }
}

fn resolve_input(cfg: &Config, user: Option<&Path>) -> PathBuf {
    user.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.input_csv))
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = resolve_log_path(cfg) {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.csv_folder).join("termsift.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let api_key_present = std::env::var(&cfg.openai.api_key_env)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let diag = serde_json::json!({
        "model": cfg.openai.model,
        "base_url": cfg.openai.base_url,
        "api_key_env": cfg.openai.api_key_env,
        "api_key_present": api_key_present,
        "batch_size": cfg.batch.size,
        "inter_batch_delay_seconds": cfg.batch.inter_batch_delay_seconds,
        "max_retries": cfg.retry.max_retries,
        "input_csv": cfg.paths.input_csv,
        "input_csv_exists": Path::new(&cfg.paths.input_csv).exists(),
    });
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn trend_filter(
    cfg: &Config,
    input: Option<&Path>,
    output: Option<&Path>,
    slope_threshold: Option<f64>,
) -> Result<()> {
    let input = resolve_input(cfg, input);
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        Path::new(&cfg.paths.csv_folder).join(&cfg.output.trend_filtered_filename)
    });
    let threshold = slope_threshold.unwrap_or(cfg.trend.slope_threshold);

    let stats = trend::filter_by_declining_trends(cfg, &input, &output, threshold)?;

    if cfg.trend.write_stats_json {
        let stats_path =
            Path::new(&cfg.paths.csv_folder).join(&cfg.output.trend_stats_filename);
        std::fs::write(&stats_path, serde_json::to_string_pretty(&stats)?)
            .with_context(|| format!("writing trend stats: {}", stats_path.display()))?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "input": input,
                "output": output,
                "total": stats.total_products,
                "kept": stats.kept_products.len(),
                "filtered_out": stats.filtered_out_products.len(),
            }))?
        );
    }
    Ok(())
}

fn status(cfg: &Config, stage: &str) -> Result<()> {
    let stage_id = match stage {
        "brand" => "brand_identifier",
        "validate" => "product_validator",
        other => return Err(anyhow!("unknown stage: {other} (expected brand or validate)")),
    };

    let store = store::StageStore::new(Path::new(&cfg.paths.work_dir), stage_id);
    let mut scratch = stats::StageStats::new();

    match store.load_progress(&mut scratch) {
        None => println!("no in-flight work for {stage_id}"),
        Some(p) => {
            let pct = if p.total_items > 0 {
                p.processed_count as f64 / p.total_items as f64 * 100.0
            } else {
                0.0
            };
            println!("progress for {stage_id}:");
            println!("  current batch:   {}", p.current_batch);
            println!(
                "  processed:       {}/{} ({pct:.1}%)",
                p.processed_count, p.total_items
            );
            println!("  speed:           {:.1} items/minute", p.processing_speed);
            println!("  eta:             {}", p.eta);
            println!("  memory:          {:.1} MB", p.memory_usage_mb);
            println!("  rate limit hits: {}", p.rate_limit_occurrences);
            println!("  total wait:      {:.1}s", p.total_wait_time);
            println!("  last update:     {}", p.last_update);
            if p.error_counts.total() > 0 {
                println!(
                    "  errors:          rate_limit={} network={} auth={} parsing={} file_system={}",
                    p.error_counts.rate_limit,
                    p.error_counts.network,
                    p.error_counts.auth,
                    p.error_counts.parsing,
                    p.error_counts.file_system
                );
            }
        }
    }

    preview_partial(store.partial_path())
}

fn preview_partial(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    println!("partial results preview (first 5 rows):");
    for record in reader.records().take(5) {
        let record = record?;
        let line: Vec<&str> = record.iter().collect();
        println!("  {}", line.join(", "));
    }
    Ok(())
}
