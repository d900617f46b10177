//! Receiver registry.

use crate::{descriptor::ReceiverDescriptor, ConfigurationError, UnknownReceiver};
use std::collections::BTreeMap;
use tracing::info;

/// All receivers known to the process, keyed by name.
///
/// Built once at startup. After that it is only read, so it can be shared
/// across threads (for example behind an `Arc`) without locking.
#[derive(Debug, Clone, Default)]
pub struct ReceiverRegistry {
    receivers: BTreeMap<String, ReceiverDescriptor>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, stopping at the first invalid one.
    ///
    /// # Errors
    ///
    /// See [`ReceiverRegistry::register`].
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ReceiverDescriptor>,
    ) -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Validate and add a descriptor.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::DuplicateReceiver`] if the name is taken
    /// - any error from [`ReceiverDescriptor::validate`]
    pub fn register(
        &mut self,
        descriptor: ReceiverDescriptor,
    ) -> Result<&mut Self, ConfigurationError> {
        let name = descriptor.name().to_string();
        if self.receivers.contains_key(&name) {
            return Err(ConfigurationError::DuplicateReceiver { name });
        }
        descriptor.validate()?;

        info!(
            receiver = %name,
            body_encoding = %descriptor.body_encoding(),
            signature = descriptor.signature().label(),
            "receiver registered"
        );
        self.receivers.insert(name, descriptor);
        Ok(self)
    }

    /// Find the descriptor registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReceiver`] when nothing is registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<&ReceiverDescriptor, UnknownReceiver> {
        self.receivers.get(name).ok_or_else(|| UnknownReceiver {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.receivers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.receivers.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ReceiverDescriptor> {
        self.receivers.values()
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
