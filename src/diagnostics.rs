// src/diagnostics.rs

use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::pipeline::Stage;
use crate::process::stats::ColumnStats;
use crate::store::Layer;

/// Why rows left the working set during cleaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NullField,
    InvalidDate,
}

/// Observations a stage reports while it runs. None of these are part of the
/// data written to a layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    RowCount {
        stage: Stage,
        rows: usize,
    },
    Sample {
        stage: Stage,
        label: String,
        table: String,
    },
    Statistics {
        stage: Stage,
        columns: Vec<ColumnStats>,
    },
    Dropped {
        stage: Stage,
        reason: DropReason,
        rows: usize,
    },
    Repaired {
        stage: Stage,
        emails: usize,
    },
    Written {
        stage: Stage,
        layer: Layer,
        rows: usize,
        bytes: Option<u64>,
    },
    Table {
        stage: Stage,
        table: String,
    },
}

pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: Diagnostic);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: Diagnostic) {
        match event {
            Diagnostic::RowCount { stage, rows } => {
                info!(stage = stage.as_str(), rows, "row count");
            }
            Diagnostic::Sample {
                stage,
                label,
                table,
            } => {
                info!(stage = stage.as_str(), "{}:\n{}", label, table);
            }
            Diagnostic::Statistics { stage, columns } => match serde_json::to_string(&columns) {
                Ok(json) => info!(stage = stage.as_str(), stats = %json, "descriptive statistics"),
                Err(e) => warn!(stage = stage.as_str(), "could not serialise statistics: {}", e),
            },
            Diagnostic::Dropped {
                stage,
                reason,
                rows,
            } => {
                info!(stage = stage.as_str(), reason = ?reason, rows, "dropped rows");
            }
            Diagnostic::Repaired { stage, emails } => {
                info!(stage = stage.as_str(), emails, "repaired emails");
            }
            Diagnostic::Written {
                stage,
                layer,
                rows,
                bytes,
            } => {
                info!(stage = stage.as_str(), layer = %layer, rows, bytes = ?bytes, "layer written");
            }
            Diagnostic::Table { stage, table } => {
                info!(stage = stage.as_str(), "result table:\n{}", table);
            }
        }
    }
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().unwrap().clone()
    }

    /// Total rows dropped for `reason`.
    pub fn dropped(&self, reason: DropReason) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Diagnostic::Dropped {
                    reason: r, rows, ..
                } if *r == reason => Some(*rows),
                _ => None,
            })
            .sum()
    }
}

impl DiagnosticsSink for CollectingSink {
    fn record(&self, event: Diagnostic) {
        self.events.lock().unwrap().push(event);
    }
}
