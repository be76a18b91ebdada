//! Registry of device models.

use indexmap::IndexMap;
use log::debug;

use super::{Model, vendors};
use crate::device::{Credentials, Device};
use crate::error::ModelError;

/// Registry for device models.
///
/// Built once at startup and handed to whatever needs to create devices.
/// There is no global instance.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, Model>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: IndexMap::new(),
        }
    }

    /// Registry preloaded with the built-in models.
    pub fn with_builtin_models() -> Self {
        let mut registry = Self::new();
        for model in vendors::builtin() {
            // Built-in names are distinct
            let _ = registry.register(model);
        }
        registry
    }

    /// Register a model. Names are unique.
    pub fn register(&mut self, model: Model) -> Result<(), ModelError> {
        if self.models.contains_key(model.name()) {
            return Err(ModelError::AlreadyRegistered {
                name: model.name().to_string(),
            });
        }
        debug!("model registry: registered '{}'", model.name());
        self.models.insert(model.name().to_string(), model);
        Ok(())
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Check if a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered model names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Create a device of `model`, copying the model's attributes by value.
    pub fn create_device(
        &self,
        model: &str,
        id: impl Into<String>,
        host_port: impl Into<String>,
        transports: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Device, ModelError> {
        let template = self.get(model).ok_or_else(|| ModelError::UnknownModel {
            name: model.to_string(),
        })?;
        Ok(Device::new(
            template.name(),
            id,
            host_port,
            transports,
            credentials,
            template.attributes().clone(),
        ))
    }
}
