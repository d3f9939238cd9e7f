use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use medallion::{
    config::PipelineConfig,
    diagnostics::TracingSink,
    pipeline::{run_stage, RunOptions, Stage, StageReport},
    store::FsLayerStore,
};
use std::{env, path::PathBuf, sync::Arc, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

struct Args {
    config: Option<PathBuf>,
    stages: Vec<Stage>,
}

fn parse_args() -> Result<Args> {
    let mut config = None;
    let mut stages = Stage::ALL.to_vec();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                config = Some(PathBuf::from(path));
            }
            "--stage" => {
                let name = args.next().ok_or_else(|| anyhow!("--stage needs a name"))?;
                stages = if name == "all" {
                    Stage::ALL.to_vec()
                } else {
                    vec![name.parse().map_err(|e: String| anyhow!(e))?]
                };
            }
            "-h" | "--help" => {
                println!("Usage: medallion [--config <FILE>] [--stage <ingest|clean|aggregate|all>]");
                std::process::exit(0);
            }
            other => bail!("unexpected argument `{}`", other),
        }
    }
    Ok(Args { config, stages })
}

/// Run one stage on the blocking pool, retrying retryable failures.
async fn run_with_retries(
    stage: Stage,
    store: Arc<FsLayerStore>,
    opts: Arc<RunOptions>,
    retries: u32,
    delay: Duration,
) -> Result<StageReport> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking({
            let store = Arc::clone(&store);
            let opts = Arc::clone(&opts);
            move || run_stage(stage, store.as_ref(), &TracingSink, &opts)
        })
        .await
        .context("stage task panicked")?;

        match outcome {
            Ok(report) => {
                info!(
                    stage = stage.as_str(),
                    layer = stage.output().as_str(),
                    attempt,
                    rows_in = report.rows_in,
                    rows_out = report.rows_out,
                    elapsed = ?start.elapsed(),
                    "stage complete"
                );
                return Ok(report);
            }
            Err(e) if e.is_retryable() && attempt <= retries => {
                warn!(
                    stage = stage.as_str(),
                    attempt,
                    "stage failed, retrying in {:?}: {}",
                    delay,
                    e
                );
                sleep(delay).await;
            }
            Err(e) => {
                error!(stage = stage.as_str(), attempt, "stage failed: {}", e);
                return Err(anyhow::Error::new(e).context(format!("stage `{}` failed", stage)));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configuration ────────────────────────────────────────────
    let args = parse_args()?;
    let cfg = PipelineConfig::load(args.config.as_deref())?;
    let as_of = cfg.as_of.unwrap_or_else(|| Local::now().date_naive());
    info!(
        raw = %cfg.raw_path.display(),
        layers = %cfg.layer_dir.display(),
        format = ?cfg.format,
        %as_of,
        "startup"
    );

    let store = Arc::new(FsLayerStore::new(&cfg.layer_dir, cfg.format)?);
    let opts = Arc::new(RunOptions {
        raw_path: cfg.raw_path.clone(),
        as_of,
        sample_rows: cfg.sample_rows,
    });
    let delay = Duration::from_secs(cfg.retry_delay_secs);

    // ─── 3) stages, strictly in order ────────────────────────────────
    let start = Instant::now();
    for stage in args.stages {
        run_with_retries(stage, Arc::clone(&store), Arc::clone(&opts), cfg.retries, delay).await?;
    }

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
