//! Owner identities (numeric user ids) and their registry

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::package::PackageId;

/// Display name reserved for the kernel/root owner
pub const KERNEL_NAME: &str = "kernel/root";

/// Numeric owner id as found in `userId` / `sharedUserId` attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl Uid {
    /// The kernel/root owner, always present after aggregation
    pub const KERNEL: Uid = Uid(0);

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// An owner identity, possibly shared by several packages
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    uid: Uid,
    /// Name from an explicit `shared-user` declaration
    declared_name: Option<String>,
    /// Name of the first package assigned to this identity
    inferred_name: Option<String>,
    packages: Vec<PackageId>,
    permissions: BTreeSet<String>,
}

impl Identity {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            declared_name: None,
            inferred_name: None,
            packages: Vec::new(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Resolved display name: declared, then inferred
    pub fn name(&self) -> Option<&str> {
        self.declared_name
            .as_deref()
            .or(self.inferred_name.as_deref())
    }

    pub fn declared_name(&self) -> Option<&str> {
        self.declared_name.as_deref()
    }

    /// `name(uid)` when a name is known, otherwise the bare uid
    pub fn full_name(&self) -> String {
        match self.name() {
            Some(name) => format!("{}({})", name, self.uid),
            None => self.uid.to_string(),
        }
    }

    /// Packages owned by this identity, in discovery order
    pub fn packages(&self) -> &[PackageId] {
        &self.packages
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Permissions held directly by this identity, sorted
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    pub(crate) fn declare_name(&mut self, name: impl Into<String>) {
        self.declared_name = Some(name.into());
    }

    /// Link a package and infer the display name from it if none is known yet
    pub(crate) fn add_package(&mut self, id: PackageId, package_name: &str) {
        self.packages.push(id);
        if self.inferred_name.is_none() {
            self.inferred_name = Some(package_name.to_string());
        }
    }

    pub(crate) fn remove_package(&mut self, id: PackageId) {
        self.packages.retain(|p| *p != id);
    }

    pub(crate) fn permissions_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.permissions
    }
}

/// All identities seen during one aggregation run, ordered by uid
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityRegistry {
    identities: BTreeMap<Uid, Identity>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an identity, creating an unnamed one if it was never referenced
    pub fn get_or_create(&mut self, uid: Uid) -> &mut Identity {
        self.identities
            .entry(uid)
            .or_insert_with(|| Identity::new(uid))
    }

    /// Read-only lookup; never creates
    pub fn get(&self, uid: Uid) -> Option<&Identity> {
        self.identities.get(&uid)
    }

    pub(crate) fn get_mut(&mut self, uid: Uid) -> Option<&mut Identity> {
        self.identities.get_mut(&uid)
    }

    /// Identities in ascending uid order
    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let mut identity = Identity::new(Uid(10001));
        assert_eq!(identity.full_name(), "10001");

        identity.declare_name("app");
        assert_eq!(identity.full_name(), "app(10001)");
    }

    #[test]
    fn test_declared_name_beats_inferred() {
        let mut identity = Identity::new(Uid(1000));
        identity.add_package(PackageId(0), "com.android.settings");
        assert_eq!(identity.name(), Some("com.android.settings"));

        identity.declare_name("android.uid.system");
        assert_eq!(identity.name(), Some("android.uid.system"));

        // A later package does not replace either slot
        identity.add_package(PackageId(1), "com.android.providers.settings");
        assert_eq!(identity.name(), Some("android.uid.system"));
        assert_eq!(identity.packages(), &[PackageId(0), PackageId(1)]);
    }

    #[test]
    fn test_inferred_from_first_package_only() {
        let mut identity = Identity::new(Uid(10050));
        identity.add_package(PackageId(3), "com.first");
        identity.add_package(PackageId(4), "com.second");
        assert_eq!(identity.full_name(), "com.first(10050)");
    }

    #[test]
    fn test_remove_package() {
        let mut identity = Identity::new(Uid(10001));
        identity.add_package(PackageId(0), "a");
        identity.add_package(PackageId(1), "b");
        identity.remove_package(PackageId(0));
        assert_eq!(identity.packages(), &[PackageId(1)]);
    }

    #[test]
    fn test_registry_get_does_not_create() {
        let mut registry = IdentityRegistry::new();
        assert!(registry.get(Uid(5)).is_none());
        assert!(registry.is_empty());

        registry.get_or_create(Uid(5)).declare_name("five");
        registry.get_or_create(Uid(5));
        registry.get_or_create(Uid(2));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(Uid(5)).unwrap().name(), Some("five"));

        let order: Vec<_> = registry.iter().map(|i| i.uid()).collect();
        assert_eq!(order, vec![Uid(2), Uid(5)]);
    }
}
