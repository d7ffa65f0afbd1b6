//! Local package feed files written into the temp root.
//!
//! Cloned projects live below the temp root, so the build engine picks these files up through
//! its normal directory walk: `nuget.config` points restore at the local packages directory
//! and an isolated packages cache; `Directory.Build.props` references every local package and
//! lets a project opt into extra settings through `Directory.Test.props`;
//! `Directory.Build.targets` does the same for `Directory.Test.targets`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use quick_xml::escape::escape;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::packages::PackageCatalog;
use crate::paths::{TestPaths, recreate_dir};

pub const PACKAGE_SOURCES_FILE: &str = "nuget.config";
pub const BUILD_PROPS_FILE: &str = "Directory.Build.props";
pub const BUILD_TARGETS_FILE: &str = "Directory.Build.targets";

pub const LOCAL_SOURCE_KEY: &str = "Test Packages";
pub const PUBLIC_SOURCE_KEY: &str = "nuget.org";
pub const PUBLIC_SOURCE_URL: &str = "https://api.nuget.org/v3/index.json";

/// Package-source configuration for the given layout.
pub fn render_package_sources(paths: &TestPaths, config: &HarnessConfig) -> String {
    package_sources_xml(&paths.packages_cache(), paths.packages_dir(), config.public_feed)
}

/// Package-source configuration with explicit directories.
pub fn package_sources_xml(packages_cache: &Path, packages_dir: &Path, public_feed: bool) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<configuration>\n");
    out.push_str("  <config>\n");
    let _ = writeln!(
        out,
        "    <add key=\"globalPackagesFolder\" value=\"{}\" />",
        escape(&*packages_cache.to_string_lossy())
    );
    out.push_str("  </config>\n");
    out.push_str("  <packageSources>\n");
    out.push_str("    <clear />\n");
    let _ = writeln!(
        out,
        "    <add key=\"{LOCAL_SOURCE_KEY}\" value=\"{}\" />",
        escape(&*packages_dir.to_string_lossy())
    );
    if public_feed {
        let _ = writeln!(
            out,
            "    <add key=\"{PUBLIC_SOURCE_KEY}\" value=\"{PUBLIC_SOURCE_URL}\" protocolVersion=\"3\" />"
        );
    }
    out.push_str("  </packageSources>\n");
    out.push_str("</configuration>\n");
    out
}

/// Import file referencing every package in `catalog`.
///
/// Ids and versions are inserted verbatim; the catalog has already rejected values that
/// would break out of the attribute.
pub fn render_build_props(catalog: &PackageCatalog) -> String {
    let mut out = String::new();
    out.push_str("<Project>\n\n");
    out.push_str("  <ItemGroup>\n");
    for package in catalog.packages() {
        let _ = writeln!(
            out,
            "    <PackageReference Include=\"{}\" Version=\"{}\" />",
            package.id, package.version
        );
    }
    out.push_str("  </ItemGroup>\n\n");
    out.push_str(&conditional_import("Directory.Test.props"));
    out.push_str("\n</Project>\n");
    out
}

pub fn render_build_targets() -> String {
    format!("<Project>\n\n{}\n</Project>\n", conditional_import("Directory.Test.targets"))
}

fn conditional_import(file: &str) -> String {
    format!(
        "  <Import Condition=\"Exists('$(MSBuildProjectDirectory)\\{file}')\" Project=\"$(MSBuildProjectDirectory)\\{file}\" />\n"
    )
}

/// Delete and recreate the temp root, then write the three feed files into it.
///
/// Safe to call before anything else touched the cache.
#[tracing::instrument(skip_all, fields(temp_root = %paths.temp_root().display(), packages = catalog.len()))]
pub fn clear_cache(paths: &TestPaths, config: &HarnessConfig, catalog: &PackageCatalog) -> HarnessResult<()> {
    recreate_dir(paths.temp_root())?;
    fs::create_dir_all(paths.packages_dir()).map_err(|e| HarnessError::io(paths.packages_dir(), e))?;

    write_file(&paths.temp_root().join(PACKAGE_SOURCES_FILE), &render_package_sources(paths, config))?;
    write_file(&paths.temp_root().join(BUILD_PROPS_FILE), &render_build_props(catalog))?;
    write_file(&paths.temp_root().join(BUILD_TARGETS_FILE), &render_build_targets())?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> HarnessResult<()> {
    fs::write(path, contents).map_err(|e| HarnessError::io(path, e))?;
    tracing::debug!(path = %path.display(), "wrote feed file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_sources_without_public_feed() {
        let xml = package_sources_xml(Path::new("/c"), Path::new("/p"), false);
        assert!(xml.contains("<add key=\"Test Packages\" value=\"/p\" />"));
        assert!(!xml.contains(PUBLIC_SOURCE_URL));
    }

    #[test]
    fn test_package_sources_escape_paths() {
        let xml = package_sources_xml(Path::new("/a&b"), Path::new("/p"), true);
        assert!(xml.contains("value=\"/a&amp;b\""));
    }

    #[test]
    fn test_build_props_empty_catalog_has_empty_item_group() {
        let props = render_build_props(&PackageCatalog::default());
        assert!(props.contains("  <ItemGroup>\n  </ItemGroup>"));
    }
}
