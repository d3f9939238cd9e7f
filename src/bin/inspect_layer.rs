use anyhow::{anyhow, bail, Result};
use medallion::{
    config::PipelineConfig,
    process::{stats::describe, utils::render_head},
    store::{FsLayerStore, Layer, LayerStore},
};
use std::{env, path::PathBuf, process::exit};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn run() -> Result<()> {
    let mut layer: Option<Layer> = None;
    let mut config: Option<PathBuf> = None;
    let mut rows = 10usize;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--config needs a path"))?,
                ));
            }
            "--rows" => {
                rows = args
                    .next()
                    .ok_or_else(|| anyhow!("--rows needs a number"))?
                    .parse()?;
            }
            other if layer.is_none() => {
                layer = Some(other.parse().map_err(|e: String| anyhow!(e))?);
            }
            other => bail!("unexpected argument `{}`", other),
        }
    }
    let Some(layer) = layer else {
        eprintln!(
            "Usage: inspect_layer <ingested|cleaned|aggregated> [--config <FILE>] [--rows <N>]"
        );
        exit(1);
    };

    let cfg = PipelineConfig::load(config.as_deref())?;
    let store = FsLayerStore::new(&cfg.layer_dir, cfg.format)?;
    inspect_layer(&store, layer, rows)
}

/// Print schema, size and a few rows of one stored layer.
fn inspect_layer(store: &FsLayerStore, layer: Layer, rows: usize) -> Result<()> {
    let path = store.path_for(layer);
    let batch = store.read(layer)?;

    println!("=== Layer: {} ({}) ===", layer, path.display());
    println!("Format:               {:?}", store.format());
    println!("Total rows:           {}", batch.num_rows());
    match store.size_bytes(layer) {
        Some(bytes) => println!("File-size on disk:    {} bytes", bytes),
        None => println!("File-size on disk:    <unknown>"),
    }
    println!();

    println!("=== Columns ===");
    for field in batch.schema().fields() {
        println!(
            "- {:<30} | {:<10} | nullable: {}",
            field.name(),
            format!("{:?}", field.data_type()),
            field.is_nullable()
        );
    }
    println!();

    let stats = describe(&batch);
    if !stats.is_empty() {
        println!("=== Numeric columns ===");
        for s in &stats {
            println!(
                "- {:<30} | count {} | mean {:.3} | min {} | max {}",
                s.column, s.count, s.mean, s.min, s.max
            );
        }
        println!();
    }

    println!("=== First {} rows ===", rows.min(batch.num_rows()));
    println!("{}", render_head(&batch, rows)?);
    Ok(())
}
