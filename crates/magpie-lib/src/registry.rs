//! Configuration-driven model registry
//!
//! Models are made available in two steps:
//! 1. A [`ModelCatalog`] maps string references to typed constructors. This is
//!    the explicit registration table; nothing is resolved by reflection.
//! 2. [`ModelRegistry::load`] resolves the references listed in configuration
//!    against the catalog, once, at startup.
//!
//! The registry is immutable after loading and is shared behind `Arc`.

use crate::config::{ModelSettings, ModelsConfig};
use crate::contract::{build_boxed, Model, ModelDefinition, ModelFactory};
use crate::error::ConfigurationError;
use crate::models::{ModelDescriptor, ModelGroup, ModelSummary};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Catalog entry for one model type
#[derive(Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub group: ModelGroup,
    factory: ModelFactory,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// Table of model types that configuration may refer to
#[derive(Debug, Default, Clone)]
pub struct ModelCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

/// Name no model may take, since it is the key of the errors envelope
pub const RESERVED_NAME: &str = "errors";

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model type under a reference string
    pub fn register<M: ModelDefinition>(
        &mut self,
        reference: impl Into<String>,
    ) -> Result<&mut Self, ConfigurationError> {
        let reference = reference.into();
        // result maps key failures under this name
        if M::NAME == RESERVED_NAME {
            return Err(ConfigurationError::ReservedName {
                reference,
                name: RESERVED_NAME,
            });
        }
        if self.entries.contains_key(&reference) {
            return Err(ConfigurationError::DuplicateReference(reference));
        }

        self.entries.insert(
            reference,
            CatalogEntry {
                name: M::NAME,
                description: M::DESCRIPTION,
                group: M::GROUP,
                factory: build_boxed::<M>,
            },
        );
        Ok(self)
    }

    pub fn get(&self, reference: &str) -> Option<&CatalogEntry> {
        self.entries.get(reference)
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A loaded model: descriptor, settings and constructor
#[derive(Clone)]
pub struct RegisteredModel {
    pub descriptor: ModelDescriptor,
    settings: Arc<ModelSettings>,
    factory: ModelFactory,
}

impl RegisteredModel {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Build a fresh instance from the configured settings
    pub fn instantiate(&self) -> anyhow::Result<Box<dyn Model>> {
        (self.factory)(&self.settings)
    }
}

impl std::fmt::Debug for RegisteredModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModel")
            .field("descriptor", &self.descriptor)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Read-only mapping from model group to its loaded models
#[derive(Debug, Default)]
pub struct ModelRegistry {
    groups: BTreeMap<ModelGroup, Vec<RegisteredModel>>,
}

impl ModelRegistry {
    /// Load every configured group. Any error aborts the whole load.
    pub fn load(config: &ModelsConfig, catalog: &ModelCatalog) -> Result<Self, ConfigurationError> {
        let mut groups = BTreeMap::new();
        for (group, _) in config.groups() {
            let models = Self::load_group(config, catalog, group)?;
            info!(group = %group, models = models.len(), "Loaded model group");
            groups.insert(group, models);
        }
        Ok(Self { groups })
    }

    /// Resolve the models configured for one group, in configuration order
    pub fn load_group(
        config: &ModelsConfig,
        catalog: &ModelCatalog,
        group: ModelGroup,
    ) -> Result<Vec<RegisteredModel>, ConfigurationError> {
        let Some(group_config) = config.group(group) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut models = Vec::with_capacity(group_config.models.len());

        for reference in &group_config.models {
            let entry = catalog
                .get(reference)
                .ok_or_else(|| ConfigurationError::UnknownReference {
                    group,
                    reference: reference.clone(),
                })?;

            if entry.group != group {
                return Err(ConfigurationError::WrongGroup {
                    reference: reference.clone(),
                    expected: group,
                    actual: entry.group,
                });
            }

            if !seen.insert(entry.name) {
                return Err(ConfigurationError::DuplicateName {
                    group,
                    name: entry.name.to_string(),
                });
            }

            let settings = group_config
                .config
                .get(entry.name)
                .cloned()
                .unwrap_or(ModelSettings::Null);

            models.push(RegisteredModel {
                descriptor: ModelDescriptor {
                    name: entry.name.to_string(),
                    description: entry.description.to_string(),
                    reference: reference.clone(),
                },
                settings: Arc::new(settings),
                factory: entry.factory,
            });
        }

        for name in group_config.config.keys() {
            if !seen.contains(name.as_str()) {
                warn!(group = %group, model = %name, "Ignoring settings for unconfigured model");
            }
        }

        Ok(models)
    }

    /// Loaded models of a group, in registry order
    pub fn models(&self, group: ModelGroup) -> &[RegisteredModel] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, group: ModelGroup, name: &str) -> Option<&RegisteredModel> {
        self.models(group).iter().find(|m| m.name() == name)
    }

    pub fn descriptors(&self, group: ModelGroup) -> impl Iterator<Item = &ModelDescriptor> {
        self.models(group).iter().map(|m| &m.descriptor)
    }

    /// Name and description of every model in the group
    pub fn summaries(&self, group: ModelGroup) -> Vec<ModelSummary> {
        self.descriptors(group).map(ModelSummary::from).collect()
    }

    /// Total number of loaded models across groups
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
