mod rate_counter;

use anyhow::{Context, Result};
use mtcnn_data::{Batch, Config, Prefetcher};
use rate_counter::RateCounter;
use std::{env, path::PathBuf};
use structopt::StructOpt;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, StructOpt)]
/// Prefetch MTCNN training batches and report the throughput
struct Args {
    #[structopt(long, default_value = "prefetch.json5")]
    /// configuration file
    pub config_file: PathBuf,
    #[structopt(long)]
    /// stop after this number of batches
    pub batches: Option<u64>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse arguments
    let Args {
        config_file,
        batches,
    } = Args::from_args();
    let config = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    info!(
        "{}",
        serde_json::to_string(&config).context("failed to serialize the config")?
    );

    let prefetcher = tokio::task::spawn_blocking(move || Prefetcher::new(&config))
        .await?
        .context("failed to start the prefetcher")?;
    info!(
        "batch_size={} element_shape={} outputs={:?}",
        prefetcher.batch_size(),
        prefetcher.element_shape(),
        prefetcher.outputs()
    );

    let result = consume(&prefetcher, batches).await;

    tokio::task::spawn_blocking(move || prefetcher.shutdown())
        .await?
        .context("failed to stop the prefetcher")?;
    result
}

async fn consume(prefetcher: &Prefetcher, limit: Option<u64>) -> Result<()> {
    let mut rate_counter = RateCounter::with_second_interval();
    let mut count = 0u64;

    loop {
        if limit.map(|limit| count >= limit).unwrap_or(false) {
            break;
        }

        let batch = tokio::select! {
            batch = prefetcher.next_batch_async() => batch?,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                break;
            }
        };
        if count == 0 {
            log_layout(&batch);
        }

        count += 1;
        rate_counter.add(batch.batch_size() as f64);
        if let Some(rate) = rate_counter.rate() {
            info!(
                "{:.2} items/s, {} batches, offset {}, {} ready",
                rate,
                count,
                prefetcher.stats().offset(),
                prefetcher.ready_len()
            );
        }

        prefetcher.release(batch);
    }

    info!("consumed {} batches", count);
    Ok(())
}

fn log_layout(batch: &Batch) {
    info!("data: {:?}", batch.data().shape());
    if let Some(label) = batch.label() {
        info!("label: {:?}", label.shape());
    }
    if let Some(roi) = batch.roi() {
        info!("roi: {:?}", roi.shape());
    }
    if let Some(pts) = batch.pts() {
        info!("pts: {:?}", pts.shape());
    }
}
