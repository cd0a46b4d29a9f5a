//! Shared contract for the labor-market intelligence pipeline.
//!
//! Everything the orchestrator, the collectors, and the output sink agree on
//! lives here: configuration, the module contract (`Collector`), the table
//! model, input schemas with generic validation, the `OutputSink` seam, and
//! the retry and token-cache primitives used by every HTTP client.

pub mod app_config;
pub mod collector;
pub mod config;
pub mod error;
pub mod inputs;
pub mod module;
pub mod retry;
pub mod sink;
pub mod table;
pub mod token;

pub use app_config::{AppConfig, Environment, GoogleCredentials, LightcastCredentials};
pub use collector::{Availability, Collector};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, SinkError};
pub use inputs::{
    resolve_inputs, validate_fields, FieldError, FieldKind, FieldSpec, InputValue, ModuleInputs,
    RawInputs, ValidationResult,
};
pub use module::{
    ModuleKind, ModuleResult, ModuleStatus, UnknownModule, UpstreamArtifacts,
    REUSE_FROM_JOBS_FIELD, REUSE_FROM_TRENDS_FIELD, SKILLS_SUMMARY_TABLE, SKILL_COLUMN,
    TERM_COLUMN, TRENDS_SUMMARY_TABLE,
};
pub use retry::{retry_with_backoff, Retriable, RetryPolicy};
pub use sink::{OutputInfo, OutputRequest, OutputSink, SharingMode};
pub use table::{truncate_chars, Cell, Table, TableSet, MAX_TABLE_NAME_LEN};
pub use token::{AccessToken, TokenCache};
