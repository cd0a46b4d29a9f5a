use async_trait::async_trait;
use serde::Serialize;

use crate::inputs::{validate_fields, FieldSpec, ModuleInputs, RawInputs, ValidationResult};
use crate::module::{ModuleKind, ModuleResult, UpstreamArtifacts};

/// Whether a collector has the credentials it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    pub reason: Option<String>,
}

impl Availability {
    #[must_use]
    pub fn ready() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn missing(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// One pluggable data-collection unit.
///
/// `execute` reports every data-fetching problem inside the returned
/// [`ModuleResult`]; it has no error channel. Implementations must be safe to
/// share across concurrent runs.
#[async_trait]
pub trait Collector: Send + Sync {
    fn kind(&self) -> ModuleKind;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Declared input fields, in display order.
    fn input_fields(&self) -> &[FieldSpec];

    /// Checks caller inputs. The default runs the generic field validator;
    /// collectors with cross-field rules extend it.
    fn validate(&self, raw: &RawInputs) -> ValidationResult {
        validate_fields(self.input_fields(), raw)
    }

    fn availability(&self) -> Availability;

    async fn execute(&self, inputs: &ModuleInputs, upstream: &UpstreamArtifacts) -> ModuleResult;
}
