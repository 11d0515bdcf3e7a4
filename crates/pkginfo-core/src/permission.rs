//! Permission index and the shared `<perms>` collection routine

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::identity::Uid;
use crate::xml::XmlNode;

/// Tag of the permission group nested in `shared-user`/`package` records
pub const PERMS_TAG: &str = "perms";
/// Tag of a single permission inside the group
pub const ITEM_TAG: &str = "item";

/// Permission name to the distinct identities credited with it
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionIndex {
    entries: BTreeMap<String, Vec<Uid>>,
}

impl PermissionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `uid` with `permission`. Returns false if it was already credited.
    pub fn grant(&mut self, permission: &str, uid: Uid) -> bool {
        let holders = self.entries.entry(permission.to_string()).or_default();
        if holders.contains(&uid) {
            false
        } else {
            holders.push(uid);
            true
        }
    }

    /// Identities holding `permission`, in the order they were first credited
    pub fn holders(&self, permission: &str) -> &[Uid] {
        self.entries
            .get(permission)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Permission names in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in lexicographic name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Uid])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read the `<perms>` block of `node` into `target`, crediting `credited` in
/// the index for each permission.
///
/// Nodes without a permission block leave `target` untouched. Returns the
/// number of items read.
pub fn collect_permissions(
    target: &mut BTreeSet<String>,
    credited: Uid,
    node: &XmlNode,
    index: &mut PermissionIndex,
) -> usize {
    let Some(perms) = node.child(PERMS_TAG) else {
        return 0;
    };

    let mut count = 0;
    for item in perms.children(ITEM_TAG) {
        let Some(permission) = item.attr("name") else {
            debug!(owner = %credited, "Skipping permission item without a name");
            continue;
        };
        target.insert(permission.to_string());
        index.grant(permission, credited);
        count += 1;
    }
    count
}
