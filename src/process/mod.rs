// src/process/mod.rs
//
// The three transforms: raw -> ingested -> cleaned -> aggregated.

pub mod aggregate;
pub mod clean;
pub mod date_parser;
pub mod ingest;
pub mod stats;
pub mod utils;

pub use aggregate::{aggregate, aggregate_batch};
pub use clean::{clean, clean_batch, CleanOptions};
pub use ingest::{ingest, ingest_batch};
