//! Aggregation of a package settings document into a cross-referenced database
//!
//! The document is walked in three passes over the root's children:
//! 1. `shared-user` records declare named identities and their permissions
//! 2. `package` records create packages and link them to their owners
//! 3. `updated-package` records patch already registered packages
//!
//! Each pass handles its records in document order. A record that cannot be
//! read is skipped and reported; it never stops the remaining records.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::diagnostic::{Diagnostic, NodeError};
use crate::identity::{IdentityRegistry, Uid, KERNEL_NAME};
use crate::package::{Package, PackageCore, PackageRegistry};
use crate::permission::{collect_permissions, PermissionIndex};
use crate::xml::XmlNode;

pub const SHARED_USER_TAG: &str = "shared-user";
pub const PACKAGE_TAG: &str = "package";
pub const UPDATED_PACKAGE_TAG: &str = "updated-package";

/// Prefix a bug report writes in place of a section it failed to capture
pub const SECTION_FAILURE_MARKER: &str = "***";

/// Stable cross-reference target for one identity in a rendered report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    /// Link-safe key, e.g. `uid-10001`
    pub id: String,
    /// Heading text, the identity's full name
    pub title: String,
}

/// Identities, packages and the permission index built from one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageDatabase {
    pub(crate) identities: IdentityRegistry,
    pub(crate) packages: PackageRegistry,
    pub(crate) permissions: PermissionIndex,
    pub(crate) anchors: BTreeMap<Uid, Anchor>,
}

/// Outcome of a load: the (possibly empty) database and every fault raised
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    pub database: PackageDatabase,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            database: PackageDatabase::default(),
            diagnostics: vec![diagnostic],
        }
    }

    /// False when the section was missing or unparseable
    pub fn is_loaded(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_fatal)
    }
}

impl PackageDatabase {
    /// Load from the raw text of the package settings section, if there is one.
    ///
    /// A missing, empty or failed section, or one that is not well-formed XML,
    /// yields an empty database and a single fatal diagnostic.
    pub fn load_section(section: Option<&str>) -> LoadResult {
        let Some(text) = section else {
            warn!("Cannot find package settings section");
            return LoadResult::failed(Diagnostic::MissingSection);
        };

        let trimmed = text.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(SECTION_FAILURE_MARKER) {
            warn!("Cannot parse package settings section: no content");
            return LoadResult::failed(Diagnostic::UnparseableSection {
                reason: "section is empty or was not captured".to_string(),
            });
        }

        match XmlNode::parse(text) {
            Ok(root) => Self::aggregate(&root),
            Err(e) => {
                warn!(error = %e, "Cannot parse package settings section");
                LoadResult::failed(Diagnostic::UnparseableSection {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Run the three aggregation passes over an already parsed document
    pub fn aggregate(root: &XmlNode) -> LoadResult {
        let mut aggregator = Aggregator::default();

        aggregator
            .db
            .identities
            .get_or_create(Uid::KERNEL)
            .declare_name(KERNEL_NAME);

        aggregator.shared_user_pass(root);
        aggregator.package_pass(root);
        aggregator.update_pass(root);
        aggregator.allocate_anchors();

        let Aggregator { db, diagnostics } = aggregator;
        info!(
            identities = db.identities.len(),
            packages = db.packages.len(),
            permissions = db.permissions.len(),
            skipped = diagnostics.len(),
            "Package database built"
        );

        LoadResult {
            database: db,
            diagnostics,
        }
    }
}

#[derive(Default)]
struct Aggregator {
    db: PackageDatabase,
    diagnostics: Vec<Diagnostic>,
}

impl Aggregator {
    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn shared_user_pass(&mut self, root: &XmlNode) {
        for (position, node) in root.children(SHARED_USER_TAG).enumerate() {
            if let Err(error) = self.shared_user(node) {
                self.report(Diagnostic::SkippedNode { position, error });
            }
        }
    }

    fn shared_user(&mut self, node: &XmlNode) -> Result<(), NodeError> {
        let name = required(node, SHARED_USER_TAG, "name")?;
        let user_id = required(node, SHARED_USER_TAG, "userId")?;
        let uid = parse_uid(SHARED_USER_TAG, "userId", user_id)?;

        let PackageDatabase {
            identities,
            permissions,
            ..
        } = &mut self.db;

        let identity = identities.get_or_create(uid);
        if uid == Uid::KERNEL {
            debug!(shared_user = name, "Keeping reserved name for uid 0");
        } else {
            identity.declare_name(name);
        }

        let count = collect_permissions(identity.permissions_mut(), uid, node, permissions);
        debug!(%uid, shared_user = name, permissions = count, "Shared user");
        Ok(())
    }

    fn package_pass(&mut self, root: &XmlNode) {
        for (position, node) in root.children(PACKAGE_TAG).enumerate() {
            if let Err(error) = self.package(node) {
                self.report(Diagnostic::SkippedNode { position, error });
            }
        }
    }

    fn package(&mut self, node: &XmlNode) -> Result<(), NodeError> {
        let name = required(node, PACKAGE_TAG, "name")?;
        let path = required(node, PACKAGE_TAG, "codePath")?;
        let owner = package_owner(node)?;
        let flags = match node.attr("flags") {
            Some(value) => parse_flags(PACKAGE_TAG, "flags", value)?,
            None => 0,
        };

        let sequence_id = self.db.packages.allocate_sequence();
        let mut package = Package::new(PackageCore {
            sequence_id,
            name: name.to_string(),
            install_path: path.to_string(),
            flags,
            owner,
        });
        collect_permissions(
            &mut package.state_mut().permissions,
            owner,
            node,
            &mut self.db.permissions,
        );

        let (id, displaced) = self.db.packages.insert(package);
        if let Some(old) = displaced {
            if let Some(previous) = self.db.identities.get_mut(old.owner()) {
                previous.remove_package(id);
            }
            self.report(Diagnostic::DuplicatePackage {
                name: name.to_string(),
                previous_owner: old.owner(),
            });
        }

        self.db.identities.get_or_create(owner).add_package(id, name);
        debug!(package = name, %owner, sequence_id, "Package");
        Ok(())
    }

    fn update_pass(&mut self, root: &XmlNode) {
        for (position, node) in root.children(UPDATED_PACKAGE_TAG).enumerate() {
            if let Err(error) = self.updated_package(node) {
                self.report(Diagnostic::SkippedNode { position, error });
            }
        }
    }

    fn updated_package(&mut self, node: &XmlNode) -> Result<(), NodeError> {
        let name = required(node, UPDATED_PACKAGE_TAG, "name")?;

        let Some(id) = self.db.packages.id_of(name) else {
            self.report(Diagnostic::DanglingUpdate {
                name: name.to_string(),
            });
            return Ok(());
        };

        let PackageDatabase {
            packages,
            permissions,
            ..
        } = &mut self.db;
        let Some(package) = packages.get_mut(id) else {
            return Ok(());
        };

        let owner = package.owner();
        let state = package.state_mut();
        state.original_path = node.attr("codePath").map(str::to_string);
        let count = collect_permissions(&mut state.permissions, owner, node, permissions);
        debug!(package = name, permissions = count, "Updated package");
        Ok(())
    }

    fn allocate_anchors(&mut self) {
        let anchors = self
            .db
            .identities
            .iter()
            .map(|identity| {
                let uid = identity.uid();
                let anchor = Anchor {
                    id: format!("uid-{}", uid),
                    title: identity.full_name(),
                };
                (uid, anchor)
            })
            .collect();
        self.db.anchors = anchors;
    }
}

fn required<'a>(
    node: &'a XmlNode,
    tag: &'static str,
    attr: &'static str,
) -> Result<&'a str, NodeError> {
    node.attr(attr).ok_or(NodeError::MissingAttribute { tag, attr })
}

/// Owner from `userId`, falling back to `sharedUserId`
fn package_owner(node: &XmlNode) -> Result<Uid, NodeError> {
    let user_id = node.attr("userId").map(|v| parse_uid(PACKAGE_TAG, "userId", v));
    let shared_id = node
        .attr("sharedUserId")
        .map(|v| parse_uid(PACKAGE_TAG, "sharedUserId", v));

    match (user_id, shared_id) {
        (Some(Ok(uid)), _) | (_, Some(Ok(uid))) => Ok(uid),
        (Some(Err(e)), _) | (None, Some(Err(e))) => Err(e),
        (None, None) => Err(NodeError::MissingAttribute {
            tag: PACKAGE_TAG,
            attr: "userId",
        }),
    }
}

fn parse_uid(tag: &'static str, attr: &'static str, value: &str) -> Result<Uid, NodeError> {
    value
        .trim()
        .parse::<u32>()
        .map(Uid)
        .map_err(|_| invalid_number(tag, attr, value))
}

/// Parse a flags bitmask: `0x`-prefixed hex, or decimal. Negative decimals
/// are taken as their 32-bit two's complement pattern.
pub(crate) fn parse_flags(
    tag: &'static str,
    attr: &'static str,
    value: &str,
) -> Result<u32, NodeError> {
    let v = value.trim();
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => v.parse::<i64>().ok().and_then(|n| {
            if (i32::MIN as i64..=u32::MAX as i64).contains(&n) {
                Some(n as u32)
            } else {
                None
            }
        }),
    };
    parsed.ok_or_else(|| invalid_number(tag, attr, value))
}

fn invalid_number(tag: &'static str, attr: &'static str, value: &str) -> NodeError {
    NodeError::InvalidNumber {
        tag,
        attr,
        value: value.to_string(),
    }
}
