// src/store/mod.rs

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StageResult;

pub mod csv;
pub mod fs;
pub mod memory;
pub mod parquet_io;

pub use fs::FsLayerStore;
pub use memory::MemoryLayerStore;

/// One managed snapshot in the pipeline. Also known as bronze, silver, gold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Ingested,
    Cleaned,
    Aggregated,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Ingested, Layer::Cleaned, Layer::Aggregated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Ingested => "ingested",
            Layer::Cleaned => "cleaned",
            Layer::Aggregated => "aggregated",
        }
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingested" | "bronze" => Ok(Layer::Ingested),
            "cleaned" | "silver" => Ok(Layer::Cleaned),
            "aggregated" | "gold" => Ok(Layer::Aggregated),
            other => Err(format!("unknown layer `{}`", other)),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk encoding used by [`FsLayerStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerFormat {
    /// Delimited text. Every column reads back as UTF-8.
    #[default]
    Csv,
    /// Typed columns, Snappy compressed.
    Parquet,
}

impl LayerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LayerFormat::Csv => "csv",
            LayerFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for LayerFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(LayerFormat::Csv),
            "parquet" => Ok(LayerFormat::Parquet),
            other => Err(format!("unknown layer format `{}`", other)),
        }
    }
}

/// Whole-table storage keyed by layer. A write replaces the layer; readers
/// never observe a partially written layer.
pub trait LayerStore: Send + Sync {
    fn read(&self, layer: Layer) -> StageResult<RecordBatch>;

    fn write(&self, layer: Layer, batch: &RecordBatch) -> StageResult<()>;

    fn exists(&self, layer: Layer) -> bool;

    /// Size of the stored layer, for stores that can tell.
    fn size_bytes(&self, _layer: Layer) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_names_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(layer.as_str().parse::<Layer>().unwrap(), layer);
        }
        assert_eq!("Silver".parse::<Layer>().unwrap(), Layer::Cleaned);
        assert!("platinum".parse::<Layer>().is_err());
    }

    #[test]
    fn format_from_str() {
        assert_eq!("PARQUET".parse::<LayerFormat>().unwrap(), LayerFormat::Parquet);
        assert_eq!(LayerFormat::default().extension(), "csv");
    }
}
