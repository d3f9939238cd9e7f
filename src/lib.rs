pub mod config;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod store;

pub use error::{StageError, StageResult};
pub use pipeline::{run_all, run_stage, RunOptions, Stage, StageReport};
