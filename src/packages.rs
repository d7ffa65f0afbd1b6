//! Locally built package archives offered to sample builds.
//!
//! Every `*.nupkg` in the packages directory is opened as a zip, its top-level `.nuspec`
//! is parsed for `id` and `version`, and the result is exposed keyed by id. The values end
//! up inside a generated XML import file, so anything that could break out of an attribute
//! is rejected up front.
//!
//! Construction is all-or-nothing: one malformed archive fails the whole catalog.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{HarnessError, HarnessResult};

/// A package archive and the identity read from its metadata.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TestPackage {
    pub id: String,
    pub version: String,
    pub path: PathBuf,
}

/// Packages found in one directory, in file-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageCatalog {
    packages: Vec<TestPackage>,
}

impl PackageCatalog {
    /// Scan `dir` for package archives. A missing directory yields an empty catalog.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn from_dir(dir: &Path) -> HarnessResult<Self> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("packages directory does not exist");
                return Ok(Self::default());
            }
            Err(e) => return Err(HarnessError::io(dir, e)),
        };

        let pattern = glob::Pattern::new("*.nupkg").map_err(|e| HarnessError::io(dir, std::io::Error::other(e)))?;
        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HarnessError::io(dir, e))?;
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| pattern.matches(n));
            if matches && path.is_file() {
                archives.push(path);
            }
        }
        archives.sort();

        let mut catalog = Self::default();
        for archive in archives {
            catalog.insert(read_package(&archive)?);
        }
        tracing::debug!(count = catalog.len(), "package catalog built");
        Ok(catalog)
    }

    /// Add a package; a later package with the same id replaces the earlier one.
    pub fn insert(&mut self, package: TestPackage) {
        match self.packages.iter_mut().find(|p| p.id == package.id) {
            Some(existing) => {
                tracing::warn!(
                    id = %package.id,
                    replaced = %existing.path.display(),
                    by = %package.path.display(),
                    "duplicate package id"
                );
                *existing = package;
            }
            None => self.packages.push(package),
        }
    }

    pub fn packages(&self) -> &[TestPackage] {
        &self.packages
    }

    pub fn get(&self, id: &str) -> Option<&TestPackage> {
        self.packages.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Read id and version from the archive at `archive`.
pub fn read_package(archive: &Path) -> HarnessResult<TestPackage> {
    let file = File::open(archive).map_err(|e| HarnessError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| HarnessError::Archive {
        archive: archive.to_path_buf(),
        source,
    })?;

    let mut nuspec = None;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|source| HarnessError::Archive {
            archive: archive.to_path_buf(),
            source,
        })?;
        let name = entry.name().to_string();
        if is_top_level_nuspec(&name) {
            let mut contents = String::new();
            entry
                .read_to_string(&mut contents)
                .map_err(|e| HarnessError::io(archive, e))?;
            nuspec = Some((name, contents));
            break;
        }
    }

    let (entry_name, contents) = nuspec.ok_or_else(|| HarnessError::MetadataNotFound {
        archive: archive.to_path_buf(),
    })?;
    let location = format!("{}@{}", archive.display(), entry_name);
    let metadata = parse_nuspec(&contents, &location)?;

    if !is_embeddable(&metadata.id) {
        return Err(HarnessError::InvalidPackageId {
            archive: archive.to_path_buf(),
            id: metadata.id,
        });
    }
    if !is_embeddable(&metadata.version) {
        return Err(HarnessError::InvalidPackageVersion {
            archive: archive.to_path_buf(),
            version: metadata.version,
        });
    }

    Ok(TestPackage {
        id: metadata.id,
        version: metadata.version,
        path: archive.to_path_buf(),
    })
}

fn is_top_level_nuspec(name: &str) -> bool {
    !name.contains('/') && !name.contains('\\') && name.ends_with(".nuspec")
}

/// Whether `value` can be placed inside a double-quoted XML attribute verbatim.
pub fn is_embeddable(value: &str) -> bool {
    !value.contains('"') && !value.contains("<![CDATA[")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NuspecMetadata {
    pub id: String,
    pub version: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Version,
}

/// Parse `<root><metadata><id/><version/></metadata></root>`.
///
/// Only unprefixed elements are considered, i.e. elements in the root's default namespace.
/// The first `metadata`, `id` and `version` element wins. `location` is used in errors.
pub fn parse_nuspec(xml: &str, location: &str) -> HarnessResult<NuspecMetadata> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let xml_err = |source| HarnessError::Xml {
        path: location.to_string(),
        source,
    };

    let mut root: Option<String> = None;
    let mut depth = 0usize;
    // Depth of the metadata element once entered; cleared when it closes.
    let mut metadata_depth: Option<usize> = None;
    let mut metadata_seen = false;
    let mut current: Option<Field> = None;
    let mut id: Option<String> = None;
    let mut version: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(name);
                } else if depth == 2 && !metadata_seen && name == "metadata" {
                    metadata_seen = true;
                    metadata_depth = Some(depth);
                } else if metadata_depth.is_some_and(|d| depth == d + 1) {
                    current = match name.as_str() {
                        "id" if id.is_none() => Some(Field::Id),
                        "version" if version.is_none() => Some(Field::Version),
                        _ => None,
                    };
                    text.clear();
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(name);
                    break;
                }
                if depth == 1 && !metadata_seen && name == "metadata" {
                    metadata_seen = true;
                } else if metadata_depth.is_some_and(|d| depth == d) {
                    match name.as_str() {
                        "id" if id.is_none() => id = Some(String::new()),
                        "version" if version.is_none() => version = Some(String::new()),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if current.is_some() {
                    text.push_str(&t.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(t) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(_) => {
                if metadata_depth.is_some_and(|d| depth == d + 1) {
                    match current.take() {
                        Some(Field::Id) => id = Some(text.trim().to_string()),
                        Some(Field::Version) => version = Some(text.trim().to_string()),
                        None => {}
                    }
                } else if metadata_depth == Some(depth) {
                    metadata_depth = None;
                }
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let root = root.ok_or_else(|| HarnessError::MetadataRootNotFound {
        path: location.to_string(),
    })?;
    let missing = |element: String| HarnessError::MetadataElementNotFound {
        path: location.to_string(),
        element,
    };
    if !metadata_seen {
        return Err(missing(format!("/{root}/metadata")));
    }
    let id = id.ok_or_else(|| missing(format!("/{root}/metadata/id")))?;
    let version = version.ok_or_else(|| missing(format!("/{root}/metadata/version")))?;
    Ok(NuspecMetadata { id, version })
}
