// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node model factories and type compatibility metadata.
//!
//! A registry is built once by the host (usually from a family constructor
//! such as [`create_calculator_registry`](crate::models::calculator::create_calculator_registry))
//! and injected into every [`Graph`](crate::Graph) that uses it.

use crate::config::RegistrySettings;
use crate::data_type::{DataType, ExactMatch, PortValue, TypeCompatibility};
use crate::model::NodeModel;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Factory producing fresh model instances
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn NodeModel> + Send + Sync>;

/// Conversion applied to a token crossing a connection between two types
pub type TypeConverter = Arc<dyn Fn(PortValue) -> PortValue + Send + Sync>;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Key already registered and overwriting is disabled
    #[error("Model already registered: {0}")]
    DuplicateRegistration(String),

    /// No factory for the key
    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

struct RegisteredModel {
    factory: ModelFactory,
    category: String,
}

/// Node model factories keyed by type key, plus type converters
pub struct DataTypeRegistry {
    settings: RegistrySettings,
    models: IndexMap<String, RegisteredModel>,
    converters: IndexMap<(String, String), TypeConverter>,
    compatibility: Box<dyn TypeCompatibility>,
}

impl DataTypeRegistry {
    /// Create a new empty registry with default settings
    pub fn new() -> Self {
        Self::with_settings(RegistrySettings::default())
    }

    /// Create a new empty registry
    pub fn with_settings(settings: RegistrySettings) -> Self {
        Self {
            settings,
            models: IndexMap::new(),
            converters: IndexMap::new(),
            compatibility: Box::new(ExactMatch),
        }
    }

    /// Settings in effect
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Register a model factory without a category
    pub fn register<F>(&mut self, type_key: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn NodeModel> + Send + Sync + 'static,
    {
        self.register_model(type_key, "", factory)
    }

    /// Register a model factory under a palette category
    pub fn register_model<F>(
        &mut self,
        type_key: impl Into<String>,
        category: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn NodeModel> + Send + Sync + 'static,
    {
        let type_key = type_key.into();
        let entry = RegisteredModel {
            factory: Arc::new(factory),
            category: category.into(),
        };

        if self.models.contains_key(&type_key) {
            if !self.settings.allow_overwrite {
                return Err(RegistryError::DuplicateRegistration(type_key));
            }
            tracing::debug!(type_key = %type_key, "replacing registered model");
            // Replacing keeps the palette position
            if let Some(slot) = self.models.get_mut(&type_key) {
                *slot = entry;
            }
            return Ok(());
        }

        tracing::debug!(type_key = %type_key, category = %entry.category, "registered model");
        self.models.insert(type_key, entry);
        Ok(())
    }

    /// Instantiate a model by key
    pub fn create(&self, type_key: &str) -> Result<Box<dyn NodeModel>, RegistryError> {
        self.models
            .get(type_key)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| RegistryError::UnknownModel(type_key.to_string()))
    }

    /// Whether a key is registered
    pub fn contains(&self, type_key: &str) -> bool {
        self.models.contains_key(type_key)
    }

    /// All registered keys, in registration order
    pub fn all_registered(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Category of a registered key
    pub fn category(&self, type_key: &str) -> Option<&str> {
        self.models.get(type_key).map(|entry| entry.category.as_str())
    }

    /// Distinct categories, in first-registration order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = IndexSet::new();
        for entry in self.models.values() {
            seen.insert(entry.category.as_str());
        }
        seen.into_iter().collect()
    }

    /// Keys registered under a category
    pub fn models_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.models
            .iter()
            .filter(move |(_, entry)| entry.category == category)
            .map(|(key, _)| key.as_str())
    }

    /// Allow outputs of `output` type to feed inputs of `input` type.
    ///
    /// Tokens crossing such a connection are passed through `converter`
    /// before the input sees them.
    pub fn register_type_converter<F>(&mut self, output: &DataType, input: &DataType, converter: F)
    where
        F: Fn(PortValue) -> PortValue + Send + Sync + 'static,
    {
        tracing::debug!(output = %output.id, input = %input.id, "registered type converter");
        self.converters
            .insert((output.id.clone(), input.id.clone()), Arc::new(converter));
    }

    /// Whether a converter is registered for the directed pair
    pub fn has_type_converter(&self, output: &DataType, input: &DataType) -> bool {
        self.type_converter(output, input).is_some()
    }

    /// Converter registered for the directed pair
    pub fn type_converter(&self, output: &DataType, input: &DataType) -> Option<&TypeConverter> {
        self.converters.get(&(output.id.clone(), input.id.clone()))
    }

    /// Token as an input of type `input` receives it from an output of type
    /// `output`. Tokens pass unchanged when no converter is registered.
    pub fn convert(&self, output: &DataType, input: &DataType, value: PortValue) -> PortValue {
        if output.same_kind(input) {
            return value;
        }
        match self.type_converter(output, input) {
            Some(converter) => converter(value),
            None => value,
        }
    }

    /// Replace the family compatibility predicate (exact match by default).
    ///
    /// The predicate is decisive: it may refuse pairs with the same id.
    /// Registered converters still admit their pairs.
    pub fn set_compatibility(&mut self, compatibility: impl TypeCompatibility + 'static) {
        self.compatibility = Box::new(compatibility);
    }
}

impl TypeCompatibility for DataTypeRegistry {
    fn is_compatible(&self, output: &DataType, input: &DataType) -> bool {
        self.compatibility.is_compatible(output, input) || self.has_type_converter(output, input)
    }
}

impl Default for DataTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTypeRegistry")
            .field("settings", &self.settings)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
