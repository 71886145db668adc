//! Migration Registry - static manifest of migration descriptors
//!
//! Descriptors are kept ordered by version, whatever order they were
//! registered in.

use std::collections::BTreeMap;

use crate::definitions::MigrationDescriptor;
use crate::error::{MigrationError, MigrationResult};

#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, MigrationDescriptor>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, failing on the first invalid or duplicate version
    pub fn from_descriptors<I>(descriptors: I) -> MigrationResult<Self>
    where
        I: IntoIterator<Item = MigrationDescriptor>,
    {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Add a descriptor. Version 0 is reserved for "nothing applied".
    pub fn register(&mut self, descriptor: MigrationDescriptor) -> MigrationResult<&mut Self> {
        if descriptor.version == 0 {
            return Err(MigrationError::InvalidVersion {
                version: descriptor.version,
                name: descriptor.name,
            });
        }

        if let Some(existing) = self.migrations.get(&descriptor.version) {
            return Err(MigrationError::DuplicateVersion {
                version: descriptor.version,
                existing: existing.name.clone(),
                duplicate: descriptor.name,
            });
        }

        self.migrations.insert(descriptor.version, descriptor);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, version: u32) -> Option<&MigrationDescriptor> {
        self.migrations.get(&version)
    }

    /// All descriptors, ascending by version
    pub fn iter(&self) -> impl Iterator<Item = &MigrationDescriptor> {
        self.migrations.values()
    }

    /// Highest registered version, 0 when empty
    pub fn max_version(&self) -> u32 {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    /// Descriptors with `version > current`, ascending
    pub fn pending(&self, current: u32) -> Vec<&MigrationDescriptor> {
        self.migrations
            .range(current.saturating_add(1)..)
            .map(|(_, descriptor)| descriptor)
            .collect()
    }

    /// Descriptors with `target < version <= current`, descending
    pub fn rollback_plan(&self, target: u32, current: u32) -> Vec<&MigrationDescriptor> {
        if target >= current {
            return Vec::new();
        }
        self.migrations
            .range(target + 1..=current)
            .rev()
            .map(|(_, descriptor)| descriptor)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{MigrationContext, Transform};
    use async_trait::async_trait;
    use estate_docstore::DocumentStore;

    struct Noop;

    #[async_trait]
    impl Transform for Noop {
        async fn run(
            &self,
            _db: &dyn DocumentStore,
            _ctx: &MigrationContext,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn descriptor(version: u32, name: &str) -> MigrationDescriptor {
        MigrationDescriptor::new(version, name, Noop)
    }

    #[test]
    fn test_orders_by_version_not_registration() {
        let registry = MigrationRegistry::from_descriptors(vec![
            descriptor(1, "a"),
            descriptor(3, "c"),
            descriptor(2, "b"),
        ])
        .unwrap();

        let order: Vec<u32> = registry.iter().map(|m| m.version).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(registry.max_version(), 3);
    }

    #[test]
    fn test_rejects_duplicate_versions() {
        let result =
            MigrationRegistry::from_descriptors(vec![descriptor(2, "b"), descriptor(2, "b_again")]);

        match result {
            Err(MigrationError::DuplicateVersion {
                version,
                existing,
                duplicate,
            }) => {
                assert_eq!(version, 2);
                assert_eq!(existing, "b");
                assert_eq!(duplicate, "b_again");
            }
            other => panic!("Expected DuplicateVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_version_zero() {
        let mut registry = MigrationRegistry::new();
        assert!(matches!(
            registry.register(descriptor(0, "bootstrap")),
            Err(MigrationError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_pending_and_rollback_plan() {
        let registry = MigrationRegistry::from_descriptors((1..=5).map(|v| descriptor(v, "m")))
            .unwrap();

        let pending: Vec<u32> = registry.pending(2).iter().map(|m| m.version).collect();
        assert_eq!(pending, vec![3, 4, 5]);
        assert!(registry.pending(5).is_empty());

        let plan: Vec<u32> = registry.rollback_plan(1, 4).iter().map(|m| m.version).collect();
        assert_eq!(plan, vec![4, 3, 2]);
        assert!(registry.rollback_plan(4, 4).is_empty());
    }

    #[test]
    fn test_empty_registry() {
        let registry = MigrationRegistry::new();
        assert_eq!(registry.max_version(), 0);
        assert!(registry.pending(0).is_empty());
    }
}
