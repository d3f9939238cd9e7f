// src/store/memory.rs

use arrow::record_batch::RecordBatch;
use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use super::{Layer, LayerStore};
use crate::error::{StageError, StageResult};

/// Layers held in memory. Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayerStore {
    layers: Arc<Mutex<HashMap<Layer, RecordBatch>>>,
}

impl MemoryLayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayerStore for MemoryLayerStore {
    fn read(&self, layer: Layer) -> StageResult<RecordBatch> {
        self.layers
            .lock()
            .unwrap()
            .get(&layer)
            .cloned()
            .ok_or_else(|| {
                StageError::source_unavailable(
                    format!("layer `{}`", layer),
                    io::Error::new(io::ErrorKind::NotFound, "layer has not been written"),
                )
            })
    }

    fn write(&self, layer: Layer, batch: &RecordBatch) -> StageResult<()> {
        self.layers.lock().unwrap().insert(layer, batch.clone());
        Ok(())
    }

    fn exists(&self, layer: Layer) -> bool {
        self.layers.lock().unwrap().contains_key(&layer)
    }

    fn size_bytes(&self, layer: Layer) -> Option<u64> {
        self.layers
            .lock()
            .unwrap()
            .get(&layer)
            .map(|b| b.get_array_memory_size() as u64)
    }
}
