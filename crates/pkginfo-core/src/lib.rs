//! pkginfo Core - Package registry parsing and aggregation
//!
//! This crate turns a device package settings document into a
//! cross-referenced model:
//! - Owner identities (user ids), shared or per-package
//! - Installed packages linked to their owner
//! - A permission index crediting identities with each permission
//!
//! Loading never fails outright. Faults are returned as [`Diagnostic`]s next
//! to whatever could be aggregated.

pub mod database;
pub mod diagnostic;
pub mod identity;
pub mod package;
pub mod permission;
pub mod query;
pub mod xml;

pub use database::{Anchor, LoadResult, PackageDatabase};
pub use diagnostic::{Diagnostic, NodeError, Severity};
pub use identity::{Identity, IdentityRegistry, Uid, KERNEL_NAME};
pub use package::{Package, PackageCore, PackageId, PackageRegistry, PackageState};
pub use permission::PermissionIndex;
pub use query::{Grant, PermissionGrants};
pub use xml::{XmlError, XmlNode};
