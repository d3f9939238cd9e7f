// src/config.rs

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::store::LayerFormat;

/// Runtime settings for the runner binaries. Library stages take their
/// inputs as arguments and never read this directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub raw_path: PathBuf,
    pub layer_dir: PathBuf,
    pub format: LayerFormat,
    /// Extra attempts for a stage that failed with a retryable error.
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub sample_rows: usize,
    /// Pin the date ages are computed against; today when unset.
    pub as_of: Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/raw_data.csv"),
            layer_dir: PathBuf::from("data/layers"),
            format: LayerFormat::Csv,
            retries: 1,
            retry_delay_secs: 5,
            sample_rows: 3,
            as_of: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the YAML file at `path` (if any), then `MEDALLION_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MEDALLION_RAW_PATH") {
            self.raw_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MEDALLION_LAYER_DIR") {
            self.layer_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MEDALLION_FORMAT") {
            self.format = v.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(v) = lookup("MEDALLION_RETRIES") {
            self.retries = v
                .trim()
                .parse()
                .with_context(|| format!("MEDALLION_RETRIES={:?}", v))?;
        }
        if let Some(v) = lookup("MEDALLION_RETRY_DELAY_SECS") {
            self.retry_delay_secs = v
                .trim()
                .parse()
                .with_context(|| format!("MEDALLION_RETRY_DELAY_SECS={:?}", v))?;
        }
        if let Some(v) = lookup("MEDALLION_SAMPLE_ROWS") {
            self.sample_rows = v
                .trim()
                .parse()
                .with_context(|| format!("MEDALLION_SAMPLE_ROWS={:?}", v))?;
        }
        if let Some(v) = lookup("MEDALLION_AS_OF") {
            let date = NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .with_context(|| format!("MEDALLION_AS_OF={:?}", v))?;
            self.as_of = Some(date);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_fills_missing_keys_with_defaults() {
        let cfg = PipelineConfig::from_yaml(
            "layer_dir: /tmp/layers\nformat: parquet\nas_of: 2024-06-14\n",
        )
        .unwrap();
        assert_eq!(cfg.layer_dir, PathBuf::from("/tmp/layers"));
        assert_eq!(cfg.format, LayerFormat::Parquet);
        assert_eq!(cfg.as_of, NaiveDate::from_ymd_opt(2024, 6, 14));
        assert_eq!(cfg.retries, 1);
        assert_eq!(cfg.sample_rows, 3);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(PipelineConfig::from_yaml("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_yaml("retires: 3\n").is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            ("MEDALLION_RETRIES", "3"),
            ("MEDALLION_FORMAT", "csv"),
            ("MEDALLION_AS_OF", "2024-01-31"),
        ]
        .into_iter()
        .collect();
        let mut cfg = PipelineConfig::from_yaml("format: parquet\nretries: 0\n").unwrap();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.format, LayerFormat::Csv);
        assert_eq!(cfg.as_of, NaiveDate::from_ymd_opt(2024, 1, 31));
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut cfg = PipelineConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "MEDALLION_SAMPLE_ROWS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MEDALLION_SAMPLE_ROWS"));
    }
}
