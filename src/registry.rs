//! Attribute dictionary: allocates an id for every attribute name within its
//! kind and resolves names back to ids for the loader.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::{
    classify::{AttributeKind, Classification},
    store::{AttributeId, EavStore, StoreError},
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} attribute '{name}' is not registered")]
    NotFound { name: String, kind: AttributeKind },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// In-process view of the attribute dictionaries. Registration writes through
/// to the store; lookups never touch it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    ids: HashMap<(AttributeKind, String), AttributeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry with every attribute already persisted.
    pub fn from_store(store: &EavStore) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for kind in [AttributeKind::String, AttributeKind::Numeric] {
            for (id, name) in store.attributes(kind)? {
                registry.ids.insert((kind, name), id);
            }
        }
        Ok(registry)
    }

    /// Idempotent: registering a known name returns its existing id.
    pub fn register(
        &mut self,
        store: &EavStore,
        name: &str,
        kind: AttributeKind,
    ) -> Result<AttributeId, RegistryError> {
        if let Some(id) = self.ids.get(&(kind, name.to_string())) {
            return Ok(*id);
        }
        let id = store.upsert_attribute(kind, name)?;
        debug!("Registered {kind} attribute '{name}' as {id}");
        self.ids.insert((kind, name.to_string()), id);
        Ok(id)
    }

    pub fn register_all(
        &mut self,
        store: &EavStore,
        classification: &Classification,
    ) -> Result<usize, RegistryError> {
        for column in classification.columns() {
            self.register(store, &column.name, column.kind)?;
        }
        Ok(classification.columns().len())
    }

    pub fn lookup(&self, name: &str, kind: AttributeKind) -> Result<AttributeId, RegistryError> {
        self.ids
            .get(&(kind, name.to_string()))
            .copied()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                kind,
            })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_across_registries() {
        let store = EavStore::open_in_memory().unwrap();
        let mut registry = Registry::new();
        let first = registry
            .register(&store, "customer", AttributeKind::String)
            .unwrap();
        let again = registry
            .register(&store, "customer", AttributeKind::String)
            .unwrap();
        assert_eq!(first, again);

        let mut fresh = Registry::new();
        assert_eq!(
            fresh
                .register(&store, "customer", AttributeKind::String)
                .unwrap(),
            first
        );
        assert_eq!(store.table_counts().unwrap().string_attributes, 1);
    }

    #[test]
    fn lookup_is_scoped_by_kind() {
        let store = EavStore::open_in_memory().unwrap();
        let mut registry = Registry::new();
        registry
            .register(&store, "viscosity", AttributeKind::Numeric)
            .unwrap();
        assert!(registry.lookup("viscosity", AttributeKind::Numeric).is_ok());
        let err = registry
            .lookup("viscosity", AttributeKind::String)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::NotFound { ref name, kind: AttributeKind::String } if name == "viscosity"
        ));
        assert_eq!(err.to_string(), "string attribute 'viscosity' is not registered");
    }

    #[test]
    fn from_store_sees_persisted_attributes() {
        let store = EavStore::open_in_memory().unwrap();
        store
            .upsert_attribute(AttributeKind::Numeric, "roughness")
            .unwrap();
        let registry = Registry::from_store(&store).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("roughness", AttributeKind::Numeric).is_ok());
    }
}
