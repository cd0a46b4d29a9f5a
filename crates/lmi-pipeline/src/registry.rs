//! The set of collectors a process can run, built once at startup.

use std::sync::Arc;

use lmi_core::{AppConfig, Collector, ModuleKind};
use serde::Serialize;

use crate::error::PipelineError;

/// Listing entry for one registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub available: bool,
    pub unavailability_reason: Option<String>,
}

/// Collectors keyed by kind and kept in canonical order.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.collectors.iter().map(|c| c.kind()))
            .finish()
    }
}

impl ModuleRegistry {
    /// Builds the four production collectors.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Collectors`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let mut builder = Self::builder();
        for collector in lmi_collectors::build_collectors(config)? {
            builder = builder.register(collector);
        }
        Ok(builder.build())
    }

    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, kind: ModuleKind) -> Option<&Arc<dyn Collector>> {
        self.collectors.iter().find(|c| c.kind() == kind)
    }

    /// Registered collectors in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Collector>> {
        self.collectors.iter()
    }

    #[must_use]
    pub fn available_modules(&self) -> Vec<ModuleInfo> {
        self.collectors
            .iter()
            .map(|c| {
                let availability = c.availability();
                ModuleInfo {
                    name: c.kind().as_str(),
                    display_name: c.display_name(),
                    description: c.description(),
                    available: availability.available,
                    unavailability_reason: availability.reason,
                }
            })
            .collect()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    collectors: Vec<Arc<dyn Collector>>,
}

impl RegistryBuilder {
    /// Adds a collector, replacing any earlier one of the same kind.
    #[must_use]
    pub fn register(mut self, collector: Arc<dyn Collector>) -> Self {
        let kind = collector.kind();
        self.collectors.retain(|c| c.kind() != kind);
        self.collectors.push(collector);
        self
    }

    #[must_use]
    pub fn build(mut self) -> ModuleRegistry {
        self.collectors.sort_by_key(|c| c.kind());
        ModuleRegistry {
            collectors: self.collectors,
        }
    }
}
