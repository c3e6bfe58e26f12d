//! Entity discovery.
//!
//! Walks the resource roots a [`LoadingContext`] exposes for a package,
//! turns every compiled unit (a `.unit` file or archive entry) into a
//! qualified type name, materializes it and keeps the types that carry
//! mapping metadata.
//!
//! Without an explicit root package the whole context is scanned, but a
//! unit is only considered when its package has a segment containing one of
//! [`HEURISTIC_TOKENS`].

mod context;
mod scan;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

pub use context::{ClassPath, LoadingContext, ResourceRoot};

use crate::entity::EntityDescriptor;
use crate::registry::TypeDescriptor;

/// File suffix of a compiled unit.
pub const UNIT_SUFFIX: &str = ".unit";

/// Package segments that mark a conventional entity package.
pub const HEURISTIC_TOKENS: [&str; 8] = [
    "entry", "entity", "entities", "model", "models", "bean", "beans", "dto",
];

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no loading context available for entity discovery")]
    MissingContext,
    #[error("no mapped types found{}", .root.as_deref().map(|r| format!(" under `{r}`")).unwrap_or_default())]
    Empty { root: Option<String> },
    #[error("failed to list `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archive `{}`: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("unable to materialize type `{name}`")]
    Materialize { name: String },
}

impl DiscoveryError {
    /// Setup problems, as opposed to I/O or materialization failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DiscoveryError::MissingContext | DiscoveryError::Empty { .. })
    }
}

/// Types found by [`discover`], unique by qualified name.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredTypes {
    types: BTreeMap<String, TypeDescriptor>,
}

impl DiscoveredTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a type with the same name was already present.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> bool {
        self.types
            .insert(descriptor.name().to_string(), descriptor)
            .is_none()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Mapping metadata of every discovered type.
    pub fn mappings(&self) -> impl Iterator<Item = &'static EntityDescriptor> + '_ {
        self.types.values().filter_map(TypeDescriptor::mapping)
    }
}

impl IntoIterator for DiscoveredTypes {
    type Item = TypeDescriptor;
    type IntoIter = std::collections::btree_map::IntoValues<String, TypeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.into_values()
    }
}

/// Whether a dotted package name looks like an entity package.
pub fn matches_heuristic(package: &str) -> bool {
    package.split('.').any(|segment| {
        let segment = segment.to_ascii_lowercase();
        HEURISTIC_TOKENS.iter().any(|token| segment.contains(token))
    })
}

/// `a.b.c` -> `a/b/c`.
pub fn package_path(package: &str) -> String {
    package.replace('.', "/")
}

/// Discover the mapped types reachable from `context`.
///
/// A blank `root_package` is treated as absent and switches on heuristic
/// filtering.
pub fn discover(
    context: Option<&dyn LoadingContext>,
    root_package: Option<&str>,
) -> Result<DiscoveredTypes, DiscoveryError> {
    let context = context.ok_or(DiscoveryError::MissingContext)?;
    let root = root_package.map(str::trim).filter(|r| !r.is_empty());
    let package = root.unwrap_or("");
    let heuristic = root.is_none();

    let roots = context.resource_roots(&package_path(package))?;
    debug!(
        package,
        heuristic,
        roots = roots.len(),
        "Scanning resource roots for mapped types"
    );

    let mut scanner = scan::Scanner::new(context, heuristic);
    for resource in &roots {
        match resource {
            ResourceRoot::Directory(dir) => {
                debug!(root = %dir.display(), "Scanning directory");
                scanner.scan_directory(dir, package)?;
            }
            ResourceRoot::Archive(archive) => {
                debug!(root = %archive.display(), "Scanning archive");
                scanner.scan_archive(archive, package)?;
            }
        }
    }

    let found = scanner.finish();
    if found.is_empty() {
        return Err(DiscoveryError::Empty {
            root: root.map(str::to_string),
        });
    }
    info!(count = found.len(), package, "Discovered mapped types");
    Ok(found)
}

/// Pick the conventional entity sub-package of `base`.
///
/// Probes `base.<token>` for every heuristic token in order and returns the
/// first one the context has resource roots for, or `base` itself.
pub fn resolve_root_package(
    context: &dyn LoadingContext,
    base_package: &str,
) -> Result<String, DiscoveryError> {
    let base = base_package.trim().trim_end_matches('.');
    for token in HEURISTIC_TOKENS {
        let candidate = if base.is_empty() {
            token.to_string()
        } else {
            format!("{base}.{token}")
        };
        if !context.resource_roots(&package_path(&candidate))?.is_empty() {
            debug!(base, package = %candidate, "Resolved entity package");
            return Ok(candidate);
        }
    }
    Ok(base.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use std::sync::OnceLock;

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::entity::{Mapped, Marker};
    use crate::registry::TypeRegistry;

    macro_rules! mapped {
        ($ty:ident, $path:literal, $marker:ident) => {
            struct $ty;
            impl Mapped for $ty {
                fn descriptor() -> &'static EntityDescriptor {
                    static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
                    DESCRIPTOR.get_or_init(|| {
                        EntityDescriptor::new($path, stringify!($ty), Marker::$marker)
                    })
                }
            }
        };
    }

    mapped!(User, "app::entity::User", Persistable);
    mapped!(Address, "app::entity::Address", Embeddable);
    mapped!(Order, "app::other::Order", Persistable);
    mapped!(Item, "app::model::Item", Persistable);
    mapped!(Thing, "app::misc::Thing", MappedBase);

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with::<User>()
            .with::<Address>()
            .with::<Order>()
            .with::<Item>()
            .with::<Thing>()
            .with_plain("app.entity.Helper")
    }

    fn unit(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn archive(path: &Path, entries: &[&str]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for entry in entries {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"").unwrap();
        }
        zip.finish().unwrap();
    }

    fn directory_fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        unit(dir.path(), "app/entity/User.unit");
        unit(dir.path(), "app/entity/Address.unit");
        unit(dir.path(), "app/entity/Helper.unit");
        unit(dir.path(), "app/other/Order.unit");
        fs::write(dir.path().join("app/entity/README.md"), b"not a unit").unwrap();
        dir
    }

    fn names(found: &DiscoveredTypes) -> Vec<&str> {
        found.names().collect()
    }

    #[test]
    fn missing_context_is_a_configuration_error() {
        let err = discover(None, Some("app")).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingContext));
        assert!(err.is_configuration());
    }

    #[test]
    fn explicit_root_scans_exhaustively() {
        let dir = directory_fixture();
        let context = ClassPath::new(registry()).directory(dir.path());
        let found = discover(Some(&context), Some("app")).unwrap();
        assert_eq!(
            names(&found),
            vec!["app.entity.Address", "app.entity.User", "app.other.Order"]
        );
        assert_eq!(
            found.get("app.entity.Address").unwrap().marker(),
            Some(Marker::Embeddable)
        );
        assert!(!found.contains("app.entity.Helper"));
    }

    #[test]
    fn explicit_root_limits_the_scan() {
        let dir = directory_fixture();
        let context = ClassPath::new(registry()).directory(dir.path());
        let found = discover(Some(&context), Some("app.other")).unwrap();
        assert_eq!(names(&found), vec!["app.other.Order"]);
    }

    #[test]
    fn heuristic_keeps_entity_packages_only() {
        let dir = directory_fixture();
        let context = ClassPath::new(registry()).directory(dir.path());
        let found = discover(Some(&context), None).unwrap();
        assert_eq!(names(&found), vec!["app.entity.Address", "app.entity.User"]);
    }

    #[test]
    fn blank_root_is_treated_as_absent() {
        let dir = directory_fixture();
        let context = ClassPath::new(registry()).directory(dir.path());
        let found = discover(Some(&context), Some("  ")).unwrap();
        assert!(!found.contains("app.other.Order"));
        assert!(found.contains("app.entity.User"));
    }

    #[test]
    fn archive_roots_follow_the_same_rules() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("models.zip");
        archive(
            &jar,
            &["app/model/Item.unit", "app/misc/Thing.unit", "app/model/notes.txt"],
        );
        let context = ClassPath::new(registry()).archive(&jar);

        let heuristic = discover(Some(&context), None).unwrap();
        assert_eq!(names(&heuristic), vec!["app.model.Item"]);

        let rooted = discover(Some(&context), Some("app.misc")).unwrap();
        assert_eq!(names(&rooted), vec!["app.misc.Thing"]);
    }

    #[test]
    fn archive_without_the_package_is_not_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("models.zip");
        archive(&jar, &["app/model/Item.unit"]);
        let context = ClassPath::new(registry()).archive(&jar);
        assert!(context.resource_roots("app/other").unwrap().is_empty());
        assert_eq!(context.resource_roots("app").unwrap().len(), 1);
        assert_eq!(context.resource_roots("").unwrap().len(), 1);
    }

    #[test]
    fn duplicates_across_roots_collapse() {
        let dir = directory_fixture();
        let jar = dir.path().join("entities.zip");
        archive(&jar, &["app/entity/User.unit"]);
        let context = ClassPath::new(registry()).directory(dir.path()).archive(&jar);
        let found = discover(Some(&context), Some("app.entity")).unwrap();
        assert_eq!(names(&found), vec!["app.entity.Address", "app.entity.User"]);
    }

    #[test]
    fn empty_result_is_a_configuration_error() {
        let dir = directory_fixture();
        let context = ClassPath::new(registry()).directory(dir.path());
        let err = discover(Some(&context), Some("app.nothing")).unwrap_err();
        assert!(matches!(err, DiscoveryError::Empty { root: Some(ref r) } if r == "app.nothing"));
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_unit_aborts_discovery() {
        let dir = directory_fixture();
        unit(dir.path(), "app/entity/Ghost.unit");
        let context = ClassPath::new(registry()).directory(dir.path());
        let err = discover(Some(&context), Some("app")).unwrap_err();
        assert!(matches!(err, DiscoveryError::Materialize { ref name } if name == "app.entity.Ghost"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn corrupt_archive_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.zip");
        fs::write(&jar, b"definitely not a zip").unwrap();
        let context = ClassPath::new(registry()).archive(&jar);
        let err = discover(Some(&context), None).unwrap_err();
        assert!(matches!(err, DiscoveryError::Archive { .. }));
    }

    #[test]
    fn resolve_root_package_prefers_keyword_order() {
        let dir = tempfile::tempdir().unwrap();
        unit(dir.path(), "app/model/Item.unit");
        unit(dir.path(), "app/entity/User.unit");
        let context = ClassPath::new(registry()).directory(dir.path());
        assert_eq!(resolve_root_package(&context, "app").unwrap(), "app.entity");
        assert_eq!(resolve_root_package(&context, "other").unwrap(), "other");
    }

    #[test]
    fn heuristic_matches_segments() {
        assert!(matches_heuristic("com.shop.entity"));
        assert!(matches_heuristic("com.shop.userModels.v1"));
        assert!(matches_heuristic("dto"));
        assert!(!matches_heuristic("com.shop.service"));
        assert!(!matches_heuristic(""));
    }
}
