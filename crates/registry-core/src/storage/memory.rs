use crate::{
    domain::{Registry, RegistryId},
    storage::{RegistryStore, StoreError},
};

/// A store that keeps registries in memory for the lifetime of a session.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    registries: Vec<Registry>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registries: Vec::new(),
        }
    }

    fn position(&self, id: RegistryId) -> Option<usize> {
        self.registries.iter().position(|r| r.id() == id)
    }
}

impl RegistryStore for InMemoryStore {
    fn get(&self, id: RegistryId) -> Result<Option<Registry>, StoreError> {
        Ok(self.position(id).map(|i| self.registries[i].clone()))
    }

    fn list(&self) -> Result<Vec<Registry>, StoreError> {
        Ok(self.registries.clone())
    }

    fn save(&mut self, registry: &Registry) -> Result<(), StoreError> {
        match self.position(registry.id()) {
            Some(i) => self.registries[i] = registry.clone(),
            None => self.registries.push(registry.clone()),
        }
        Ok(())
    }

    fn delete(&mut self, id: RegistryId) -> Result<bool, StoreError> {
        Ok(self
            .position(id)
            .map(|i| self.registries.remove(i))
            .is_some())
    }
}
