//! Run orchestration: module registry, sequential execution with artifact
//! threading, progress reporting, and table aggregation for the output sink.

pub mod aggregate;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod run;

pub use aggregate::{aggregate_tables, RUN_SUMMARY_TABLE};
pub use error::PipelineError;
pub use orchestrator::Orchestrator;
pub use progress::ProgressListener;
pub use registry::{ModuleInfo, ModuleRegistry, RegistryBuilder};
pub use run::{classify_run, ModuleProgress, PipelineRun, PipelineStatus, RunRequest};
