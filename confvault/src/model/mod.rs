//! Device class templates.
//!
//! A [`Model`] names a class of device (`cisco-ios`, `linux`, ...) and
//! carries the default [`Attributes`] every device of that class starts
//! from. Models are registered once in a [`ModelRegistry`] and never change
//! afterwards.

mod attributes;
mod registry;
pub mod vendors;

pub use attributes::Attributes;
pub use registry::ModelRegistry;

/// Immutable device class template.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    attributes: Attributes,
}

impl Model {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default attributes copied into every device of this model.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}
