use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use super::DiscoveryError;
use crate::registry::{TypeDescriptor, TypeRegistry};

/// A place compiled units can be listed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRoot {
    /// The directory corresponding to the requested package.
    Directory(PathBuf),
    /// An archive holding entries under the requested package.
    Archive(PathBuf),
}

/// Source of resource roots and type materialization for discovery.
pub trait LoadingContext: Send + Sync {
    /// Every root that holds the package at `package_path` (slash
    /// separated; empty for the whole context).
    fn resource_roots(&self, package_path: &str) -> Result<Vec<ResourceRoot>, DiscoveryError>;

    /// Resolve a qualified dotted name to a type descriptor.
    fn materialize(&self, qualified_name: &str) -> Result<TypeDescriptor, DiscoveryError>;
}

/// Directory and archive roots backed by a [`TypeRegistry`].
///
/// ```ignore
/// let context = ClassPath::new(TypeRegistry::new().with::<User>())
///     .directory("target/units")
///     .archive("vendor/models.zip");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    roots: Vec<ResourceRoot>,
    registry: TypeRegistry,
}

impl ClassPath {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            roots: Vec::new(),
            registry,
        }
    }

    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(ResourceRoot::Directory(path.into()));
        self
    }

    pub fn archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(ResourceRoot::Archive(path.into()));
        self
    }

    pub fn roots(&self) -> &[ResourceRoot] {
        &self.roots
    }
}

impl LoadingContext for ClassPath {
    fn resource_roots(&self, package_path: &str) -> Result<Vec<ResourceRoot>, DiscoveryError> {
        let package_path = package_path.trim_matches('/');
        let mut found = Vec::new();
        for root in &self.roots {
            match root {
                ResourceRoot::Directory(base) => {
                    let dir = if package_path.is_empty() {
                        base.clone()
                    } else {
                        base.join(package_path)
                    };
                    if dir.is_dir() {
                        found.push(ResourceRoot::Directory(dir));
                    }
                }
                ResourceRoot::Archive(path) => {
                    if package_path.is_empty() {
                        found.push(root.clone());
                        continue;
                    }
                    let prefix = format!("{package_path}/");
                    let archive = open_archive(path)?;
                    if archive.file_names().any(|name| name.starts_with(&prefix)) {
                        found.push(root.clone());
                    }
                }
            }
        }
        Ok(found)
    }

    fn materialize(&self, qualified_name: &str) -> Result<TypeDescriptor, DiscoveryError> {
        self.registry
            .get(qualified_name)
            .cloned()
            .ok_or_else(|| DiscoveryError::Materialize {
                name: qualified_name.to_string(),
            })
    }
}

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, DiscoveryError> {
    let archive_error = |source| DiscoveryError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| archive_error(zip::result::ZipError::Io(e)))?;
    ZipArchive::new(BufReader::new(file)).map_err(archive_error)
}
