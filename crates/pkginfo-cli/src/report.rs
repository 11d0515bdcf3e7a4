//! Text and JSON projections of a package database

use pkginfo_core::{Diagnostic, Package, PackageDatabase};
use serde_json::{json, Value};
use std::fmt::Write;

const INDENT: &str = "             ";

/// Render the plain text report: package table, per-identity blocks, then
/// the permission listing
pub fn render_text(db: &PackageDatabase) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write_text(db, &mut out)?;
    Ok(out)
}

fn write_text(db: &PackageDatabase, out: &mut String) -> std::fmt::Result {
    writeln!(out, "Installed packages:")?;
    let mut packages: Vec<&Package> = db.packages().collect();
    packages.sort_by(|a, b| a.name().cmp(b.name()));

    let name_width = packages
        .iter()
        .map(|p| p.name().len())
        .max()
        .unwrap_or(0)
        .max(7);
    let path_width = packages
        .iter()
        .map(|p| p.install_path().len())
        .max()
        .unwrap_or(0)
        .max(4);
    writeln!(
        out,
        "{:<nw$}  {:<pw$}  {:>6}  {:>8}",
        "Package",
        "Path",
        "UID",
        "Flags",
        nw = name_width,
        pw = path_width
    )?;
    for package in &packages {
        writeln!(
            out,
            "{:<nw$}  {:<pw$}  {:>6}  {:>8x}",
            package.name(),
            package.install_path(),
            package.owner(),
            package.flags(),
            nw = name_width,
            pw = path_width
        )?;
    }

    writeln!(out)?;
    writeln!(out, "UserIDs:")?;
    for identity in db.identities() {
        let anchor = db
            .anchor(Some(identity.uid()))
            .map(|a| a.id.as_str())
            .unwrap_or("");
        writeln!(out)?;
        writeln!(out, "== {} [#{}]", identity.full_name(), anchor)?;
        writeln!(out, "Packages:")?;
        for package in db.owned_packages(identity) {
            write_package(package, out)?;
        }
        writeln!(out, "Permissions:")?;
        for permission in identity.permissions() {
            writeln!(out, "{}{}", INDENT, permission)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Permissions:")?;
    for listing in db.all_permission_grants() {
        writeln!(out)?;
        writeln!(out, "{}", listing.name)?;
        for grant in &listing.grants {
            match grant.package {
                Some(package) => {
                    writeln!(out, "  - {}: {}", grant.identity.full_name(), package.name())?
                }
                None => writeln!(out, "  - {}", grant.identity.full_name())?,
            }
        }
    }
    Ok(())
}

fn write_package(package: &Package, out: &mut String) -> std::fmt::Result {
    writeln!(out, "  Name:        {}", package.name())?;
    writeln!(out, "  Path:        {}", package.install_path())?;
    writeln!(
        out,
        "  OrigPath:    {}",
        package.original_path().unwrap_or("-")
    )?;
    writeln!(out, "  Flags:       0x{:x}", package.flags())?;
    writeln!(out, "  Permissions:")?;
    for permission in package.permissions() {
        writeln!(out, "  {}{}", INDENT, permission)?;
    }
    Ok(())
}

/// Build the machine-readable view of the database and its load diagnostics
pub fn render_json(db: &PackageDatabase, diagnostics: &[Diagnostic]) -> Value {
    let packages: Vec<Value> = db
        .packages()
        .map(|p| {
            json!({
                "sequence_id": p.sequence_id(),
                "name": p.name(),
                "path": p.install_path(),
                "original_path": p.original_path(),
                "flags": p.flags(),
                "uid": p.owner(),
                "permissions": p.permissions(),
            })
        })
        .collect();

    let identities: Vec<Value> = db
        .identities()
        .map(|i| {
            let owned: Vec<&str> = db.owned_packages(i).map(Package::name).collect();
            json!({
                "uid": i.uid(),
                "name": i.name(),
                "full_name": i.full_name(),
                "anchor": db.anchor(Some(i.uid())).map(|a| a.id.as_str()),
                "packages": owned,
                "permissions": i.permissions(),
            })
        })
        .collect();

    let permissions: Vec<Value> = db
        .all_permission_grants()
        .map(|listing| {
            let grants: Vec<Value> = listing
                .grants
                .iter()
                .map(|g| {
                    json!({
                        "uid": g.identity.uid(),
                        "package": g.package.map(Package::name),
                    })
                })
                .collect();
            json!({ "name": listing.name, "grants": grants })
        })
        .collect();

    json!({
        "packages": packages,
        "identities": identities,
        "permissions": permissions,
        "diagnostics": diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<packages>
        <shared-user name="nfc" userId="1027">
            <perms><item name="NFC" /></perms>
        </shared-user>
        <shared-user name="app" userId="10001">
            <perms><item name="NET" /></perms>
        </shared-user>
        <package name="com.x" codePath="/data/app/x" sharedUserId="10001" flags="0x1" />
        <package name="com.y" codePath="/data/app/y" userId="10002">
            <perms><item name="CAMERA" /></perms>
        </package>
        <updated-package name="com.x" codePath="/data/app/x-1" />
        <updated-package name="com.gone" codePath="/data/app/gone" />
    </packages>"#;

    #[test]
    fn test_text_report_sections() {
        let result = PackageDatabase::load_section(Some(DOCUMENT));
        let text = render_text(&result.database).unwrap();

        assert!(text.starts_with("Installed packages:"));
        assert!(text.contains("== app(10001) [#uid-10001]"));
        assert!(text.contains("== kernel/root(0) [#uid-0]"));
        assert!(text.contains("  OrigPath:    /data/app/x-1"));
        assert!(text.contains("  Flags:       0x1"));
        assert!(text.contains("  - nfc(1027)\n"));
        // app(10001) owns com.x, which does not declare NET
        assert!(!text.contains("  - app(10001)"));
        assert!(text.contains("  - com.y(10002): com.y\n"));

        // Package table rows are sorted by name
        let x = text.find("com.x  ").unwrap();
        let y = text.find("com.y  ").unwrap();
        assert!(x < y);
    }

    #[test]
    fn test_json_report() {
        let result = PackageDatabase::load_section(Some(DOCUMENT));
        let value = render_json(&result.database, &result.diagnostics);

        assert_eq!(value["packages"][0]["name"], "com.x");
        assert_eq!(value["packages"][0]["flags"], 1);
        assert_eq!(value["packages"][0]["original_path"], "/data/app/x-1");
        assert_eq!(value["packages"][1]["permissions"][0], "CAMERA");

        let identities = value["identities"].as_array().unwrap();
        assert_eq!(identities.len(), 4);
        assert_eq!(identities[2]["full_name"], "app(10001)");
        assert_eq!(identities[2]["packages"][0], "com.x");

        assert_eq!(value["permissions"][0]["name"], "CAMERA");
        assert_eq!(value["permissions"][0]["grants"][0]["package"], "com.y");
        assert_eq!(value["permissions"][1]["name"], "NET");
        assert_eq!(value["permissions"][1]["grants"].as_array().unwrap().len(), 0);
        assert_eq!(value["permissions"][2]["name"], "NFC");
        assert_eq!(value["permissions"][2]["grants"][0]["uid"], 1027);
        assert!(value["permissions"][2]["grants"][0]["package"].is_null());

        assert_eq!(value["diagnostics"][0]["kind"], "dangling_update");
    }

    #[test]
    fn test_empty_database_renders() {
        let result = PackageDatabase::load_section(None);
        let text = render_text(&result.database).unwrap();
        assert!(text.contains("Installed packages:"));
        assert!(!text.contains("=="));

        let value = render_json(&result.database, &result.diagnostics);
        assert_eq!(value["packages"].as_array().unwrap().len(), 0);
        assert_eq!(value["diagnostics"][0]["kind"], "missing_section");
    }
}
