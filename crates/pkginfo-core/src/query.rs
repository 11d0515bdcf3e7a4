//! Read-only views over a built [`PackageDatabase`] for report projections

use crate::database::{Anchor, PackageDatabase};
use crate::identity::{Identity, Uid};
use crate::package::Package;

/// One line of a permission listing
#[derive(Debug, Clone, Copy)]
pub struct Grant<'a> {
    pub identity: &'a Identity,
    /// The owned package that declares the permission, or `None` for an
    /// identity that owns no packages and holds it directly
    pub package: Option<&'a Package>,
}

/// A permission together with every grant line for it
#[derive(Debug, Clone)]
pub struct PermissionGrants<'a> {
    pub name: &'a str,
    pub holders: Vec<&'a Identity>,
    pub grants: Vec<Grant<'a>>,
}

impl PackageDatabase {
    /// True if no package was registered
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All packages in sequence id order
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().map(|(_, p)| p)
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.by_name(name)
    }

    /// All identities ordered by uid
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    pub fn identity(&self, uid: Uid) -> Option<&Identity> {
        self.identities.get(uid)
    }

    pub fn package_owner(&self, package: &Package) -> Option<&Identity> {
        self.identities.get(package.owner())
    }

    /// Packages owned by `identity`, in the order they were discovered
    pub fn owned_packages<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> impl Iterator<Item = &'a Package> + 'a {
        identity
            .packages()
            .iter()
            .filter_map(move |id| self.packages.get(*id))
    }

    /// Permission names, sorted
    pub fn permission_names(&self) -> impl Iterator<Item = &str> {
        self.permissions.names()
    }

    /// Identities credited with `permission`, in the order they were credited
    pub fn permission_holders(&self, permission: &str) -> Vec<&Identity> {
        self.permissions
            .holders(permission)
            .iter()
            .filter_map(|uid| self.identities.get(*uid))
            .collect()
    }

    /// Grant lines for one permission.
    ///
    /// A holder that owns no packages contributes a single direct line.
    /// Any other holder contributes one line per owned package that declares
    /// the permission, and none if no owned package declares it.
    pub fn permission_grants<'a>(&'a self, permission: &'a str) -> PermissionGrants<'a> {
        let holders = self.permission_holders(permission);
        let mut grants = Vec::new();

        for &identity in &holders {
            if identity.package_count() == 0 {
                grants.push(Grant {
                    identity,
                    package: None,
                });
                continue;
            }
            grants.extend(
                self.owned_packages(identity)
                    .filter(|p| p.has_permission(permission))
                    .map(move |package| Grant {
                        identity,
                        package: Some(package),
                    }),
            );
        }

        PermissionGrants {
            name: permission,
            holders,
            grants,
        }
    }

    /// Grant listings for every permission, sorted by name
    pub fn all_permission_grants(&self) -> impl Iterator<Item = PermissionGrants<'_>> {
        self.permissions
            .names()
            .map(move |name| self.permission_grants(name))
    }

    /// Report anchor of an identity; `None` in, `None` out
    pub fn anchor(&self, uid: Option<Uid>) -> Option<&Anchor> {
        uid.and_then(|uid| self.anchors.get(&uid))
    }

    /// Anchor of the identity owning `package`
    pub fn package_anchor(&self, package: &Package) -> Option<&Anchor> {
        self.anchor(Some(package.owner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KERNEL_NAME;

    const DOCUMENT: &str = r#"<packages>
        <shared-user name="android.uid.system" userId="1000">
            <perms>
                <item name="android.permission.REBOOT" />
                <item name="android.permission.INTERNET" />
            </perms>
        </shared-user>
        <shared-user name="android.uid.nfc" userId="1027">
            <perms><item name="android.permission.NFC" /></perms>
        </shared-user>
        <package name="com.android.settings" codePath="/system/app/Settings.apk" sharedUserId="1000" />
        <package name="android" codePath="/system/framework/framework-res.apk" sharedUserId="1000" flags="0x81" />
        <package name="com.browser" codePath="/data/app/browser-1.apk" userId="10040">
            <perms>
                <item name="android.permission.INTERNET" />
                <item name="android.permission.CAMERA" />
            </perms>
        </package>
        <package name="com.browser.helper" codePath="/data/app/helper.apk" userId="10040" />
    </packages>"#;

    fn database() -> PackageDatabase {
        PackageDatabase::load_section(Some(DOCUMENT)).database
    }

    #[test]
    fn test_identities_sorted_by_uid() {
        let db = database();
        let uids: Vec<_> = db.identities().map(|i| i.uid().as_u32()).collect();
        assert_eq!(uids, vec![0, 1000, 1027, 10040]);
        assert_eq!(db.identity(Uid::KERNEL).unwrap().name(), Some(KERNEL_NAME));
    }

    #[test]
    fn test_every_package_owned_exactly_once() {
        let db = database();
        assert_eq!(db.packages().count(), 4);
        for package in db.packages() {
            let owner = db.package_owner(package).unwrap();
            let hits = db
                .owned_packages(owner)
                .filter(|p| p.name() == package.name())
                .count();
            assert_eq!(hits, 1, "{} owned {} times", package.name(), hits);
        }
    }

    #[test]
    fn test_permission_names_sorted() {
        let db = database();
        let names: Vec<_> = db.permission_names().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_grants_for_shared_permission() {
        let db = database();
        let grants = db.permission_grants("android.permission.INTERNET");

        let holders: Vec<_> = grants.holders.iter().map(|i| i.uid()).collect();
        assert_eq!(holders, vec![Uid(1000), Uid(10040)]);

        // 1000 owns packages but none declares it, so it gets no line; only
        // com.browser among 10040's packages declares it
        assert_eq!(grants.grants.len(), 1);
        assert_eq!(grants.grants[0].identity.uid(), Uid(10040));
        assert_eq!(grants.grants[0].package.unwrap().name(), "com.browser");
    }

    #[test]
    fn test_no_direct_line_for_identity_with_packages() {
        let xml = r#"<packages>
            <shared-user name="app" userId="10001">
                <perms><item name="NET" /></perms>
            </shared-user>
            <package name="com.x" codePath="/data/app/x" sharedUserId="10001" />
        </packages>"#;
        let db = PackageDatabase::load_section(Some(xml)).database;
        let grants = db.permission_grants("NET");

        assert_eq!(grants.holders.len(), 1);
        assert!(grants.grants.is_empty());
    }

    #[test]
    fn test_grants_for_identity_without_packages() {
        let db = database();
        let grants = db.permission_grants("android.permission.NFC");
        assert_eq!(grants.grants.len(), 1);
        assert_eq!(grants.grants[0].identity.full_name(), "android.uid.nfc(1027)");
        assert!(grants.grants[0].package.is_none());
    }

    #[test]
    fn test_unknown_permission_has_no_grants() {
        let db = database();
        let grants = db.permission_grants("android.permission.UNKNOWN");
        assert!(grants.holders.is_empty());
        assert!(grants.grants.is_empty());
    }

    #[test]
    fn test_all_permission_grants_covers_index() {
        let db = database();
        let names: Vec<_> = db.all_permission_grants().map(|g| g.name).collect();
        assert_eq!(names, db.permission_names().collect::<Vec<_>>());
    }

    #[test]
    fn test_anchor_resolution() {
        let db = database();
        assert!(db.anchor(None).is_none());
        assert!(db.anchor(Some(Uid(424242))).is_none());

        let browser = db.package("com.browser").unwrap();
        let anchor = db.package_anchor(browser).unwrap();
        assert_eq!(anchor.title, "com.browser(10040)");
        assert_eq!(db.anchor(Some(Uid(10040))), Some(anchor));
    }

    #[test]
    fn test_owned_packages_in_discovery_order() {
        let db = database();
        let system = db.identity(Uid(1000)).unwrap();
        let names: Vec<_> = db.owned_packages(system).map(Package::name).collect();
        assert_eq!(names, vec!["com.android.settings", "android"]);
        assert_eq!(db.package("android").unwrap().flags(), 0x81);
    }

    #[test]
    fn test_empty_database() {
        let db = PackageDatabase::default();
        assert!(db.is_empty());
        assert_eq!(db.identities().count(), 0);
        assert!(db.anchor(Some(Uid::KERNEL)).is_none());
    }
}
