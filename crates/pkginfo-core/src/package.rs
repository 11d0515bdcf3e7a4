//! Installed package records and their registry

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::identity::Uid;

/// Arena index of a package inside a [`PackageRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageId(pub usize);

/// Fields fixed when the `<package>` record is first read
#[derive(Debug, Clone, Serialize)]
pub struct PackageCore {
    /// 1-based first-seen order
    pub sequence_id: u32,
    pub name: String,
    pub install_path: String,
    pub flags: u32,
    pub owner: Uid,
}

/// Fields an `<updated-package>` record may change after construction
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageState {
    /// Install location recorded by an update patch
    pub original_path: Option<String>,
    pub permissions: BTreeSet<String>,
}

/// A single installed package
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    core: PackageCore,
    state: PackageState,
}

impl Package {
    pub fn new(core: PackageCore) -> Self {
        Self {
            core,
            state: PackageState::default(),
        }
    }

    pub fn core(&self) -> &PackageCore {
        &self.core
    }

    pub fn sequence_id(&self) -> u32 {
        self.core.sequence_id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn install_path(&self) -> &str {
        &self.core.install_path
    }

    pub fn original_path(&self) -> Option<&str> {
        self.state.original_path.as_deref()
    }

    pub fn flags(&self) -> u32 {
        self.core.flags
    }

    pub fn owner(&self) -> Uid {
        self.core.owner
    }

    /// Permissions declared by this package, sorted
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.state.permissions
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.state.permissions.contains(name)
    }

    /// Mutable patch state; only the aggregation passes write through this
    pub(crate) fn state_mut(&mut self) -> &mut PackageState {
        &mut self.state
    }
}

/// Package arena plus a name index
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageRegistry {
    packages: Vec<Package>,
    by_name: HashMap<String, PackageId>,
    next_sequence: u32,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next 1-based sequence id; every constructed record consumes one
    pub(crate) fn allocate_sequence(&mut self) -> u32 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Register a package under its name.
    ///
    /// A second record with an already registered name replaces the first in
    /// place (same arena slot). The displaced record is returned so the
    /// caller can unlink it from its owner.
    pub(crate) fn insert(&mut self, package: Package) -> (PackageId, Option<Package>) {
        match self.by_name.get(package.name()) {
            Some(&id) => {
                let old = std::mem::replace(&mut self.packages[id.0], package);
                (id, Some(old))
            }
            None => {
                let id = PackageId(self.packages.len());
                self.by_name.insert(package.name().to_string(), id);
                self.packages.push(package);
                (id, None)
            }
        }
    }

    pub fn get(&self, id: PackageId) -> Option<&Package> {
        self.packages.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: PackageId) -> Option<&mut Package> {
        self.packages.get_mut(id.0)
    }

    pub fn id_of(&self, name: &str) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Package> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    /// Packages in ascending sequence id order.
    ///
    /// A replaced record keeps its arena slot but carries a newer sequence
    /// id, so arena order alone is not enough.
    pub fn iter(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        let mut entries: Vec<_> = self
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId(i), p))
            .collect();
        entries.sort_by_key(|(_, p)| p.sequence_id());
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(registry: &mut PackageRegistry, name: &str, owner: u32) -> Package {
        Package::new(PackageCore {
            sequence_id: registry.allocate_sequence(),
            name: name.to_string(),
            install_path: format!("/data/app/{}", name),
            flags: 0,
            owner: Uid(owner),
        })
    }

    #[test]
    fn test_sequence_ids_are_one_based() {
        let mut registry = PackageRegistry::new();
        let a = package(&mut registry, "com.a", 10001);
        let b = package(&mut registry, "com.b", 10002);
        assert_eq!(a.sequence_id(), 1);
        assert_eq!(b.sequence_id(), 2);
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = PackageRegistry::new();
        let a = package(&mut registry, "com.a", 10001);
        let (id, displaced) = registry.insert(a);
        assert!(displaced.is_none());
        assert_eq!(registry.id_of("com.a"), Some(id));
        assert_eq!(registry.by_name("com.a").unwrap().owner(), Uid(10001));
        assert!(registry.by_name("com.b").is_none());
    }

    #[test]
    fn test_duplicate_name_replaces_in_place() {
        let mut registry = PackageRegistry::new();
        let first = package(&mut registry, "com.a", 10001);
        let second = package(&mut registry, "com.a", 10002);

        let (id1, _) = registry.insert(first);
        let (id2, displaced) = registry.insert(second);

        assert_eq!(id1, id2);
        assert_eq!(registry.len(), 1);
        assert_eq!(displaced.unwrap().owner(), Uid(10001));

        let live = registry.by_name("com.a").unwrap();
        assert_eq!(live.owner(), Uid(10002));
        assert_eq!(live.sequence_id(), 2);
    }

    #[test]
    fn test_iter_follows_sequence_after_replacement() {
        let mut registry = PackageRegistry::new();
        for (name, owner) in [("com.a", 10001), ("com.b", 10002), ("com.a", 10003)] {
            let p = package(&mut registry, name, owner);
            registry.insert(p);
        }

        let order: Vec<_> = registry
            .iter()
            .map(|(_, p)| (p.name(), p.sequence_id()))
            .collect();
        assert_eq!(order, vec![("com.b", 2), ("com.a", 3)]);
    }

    #[test]
    fn test_state_is_separate_from_core() {
        let mut registry = PackageRegistry::new();
        let a = package(&mut registry, "com.a", 10001);
        let (id, _) = registry.insert(a);

        let state = registry.get_mut(id).unwrap().state_mut();
        state.original_path = Some("/system/app/A.apk".to_string());
        state.permissions.insert("B".to_string());
        state.permissions.insert("A".to_string());

        let p = registry.get(id).unwrap();
        assert_eq!(p.install_path(), "/data/app/com.a");
        assert_eq!(p.original_path(), Some("/system/app/A.apk"));
        let perms: Vec<_> = p.permissions().iter().map(String::as_str).collect();
        assert_eq!(perms, vec!["A", "B"]);
    }
}
