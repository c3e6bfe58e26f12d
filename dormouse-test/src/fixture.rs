use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dormouse_data::discovery::UNIT_SUFFIX;
use dormouse_data::{ClassPath, TypeRegistry};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Relative path of the compiled unit for a qualified type name:
/// `app.entity.User` -> `app/entity/User.unit`.
pub fn unit_path(qualified_name: &str) -> String {
    format!("{}{UNIT_SUFFIX}", qualified_name.replace('.', "/"))
}

/// A temporary tree of discovery roots.
///
/// Directory roots and archives are created under one temporary directory
/// that is removed when the tree is dropped.
///
/// ```ignore
/// let mut tree = FixtureTree::new()?;
/// tree.directory("classes", ["app.entity.User", "app.web.Handler"])?;
/// tree.archive("models.zip", ["lib.model.Invoice"])?;
/// let context = tree.class_path(registry);
/// ```
pub struct FixtureTree {
    dir: TempDir,
    directories: Vec<PathBuf>,
    archives: Vec<PathBuf>,
}

impl FixtureTree {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
            directories: Vec::new(),
            archives: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a directory root `name` holding one unit per type name.
    pub fn directory<I, S>(&mut self, name: &str, types: I) -> io::Result<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = self.dir.path().join(name);
        fs::create_dir_all(&root)?;
        for ty in types {
            let unit = root.join(unit_path(ty.as_ref()));
            if let Some(parent) = unit.parent() {
                fs::create_dir_all(parent)?;
            }
            File::create(&unit)?;
        }
        self.directories.push(root.clone());
        Ok(root)
    }

    /// Create an archive root `name` holding one unit entry per type name.
    pub fn archive<I, S>(&mut self, name: &str, types: I) -> io::Result<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.dir.path().join(name);
        let mut writer = ZipWriter::new(File::create(&path)?);
        for ty in types {
            writer
                .start_file(unit_path(ty.as_ref()), SimpleFileOptions::default())
                .map_err(io::Error::other)?;
            writer.write_all(b"")?;
        }
        writer.finish().map_err(io::Error::other)?;
        self.archives.push(path.clone());
        Ok(path)
    }

    /// A file that is not a readable archive, registered as an archive root.
    pub fn broken_archive(&mut self, name: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, b"not an archive")?;
        self.archives.push(path.clone());
        Ok(path)
    }

    /// Loading context over every root created so far, directories first.
    pub fn class_path(&self, registry: TypeRegistry) -> ClassPath {
        let with_dirs = self
            .directories
            .iter()
            .fold(ClassPath::new(registry), |cp, dir| cp.directory(dir));
        self.archives
            .iter()
            .fold(with_dirs, |cp, archive| cp.archive(archive))
    }

    /// Single directory root holding a unit for every type in `registry`.
    pub fn for_registry(registry: TypeRegistry) -> io::Result<(Self, ClassPath)> {
        let mut tree = Self::new()?;
        let names: Vec<String> = registry.iter().map(|d| d.name().to_string()).collect();
        tree.directory("classes", names)?;
        let class_path = tree.class_path(registry);
        Ok((tree, class_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_paths_follow_packages() {
        assert_eq!(unit_path("app.entity.User"), "app/entity/User.unit");
        assert_eq!(unit_path("Top"), "Top.unit");
    }

    #[test]
    fn directory_and_archive_roots_are_written() {
        let mut tree = FixtureTree::new().unwrap();
        let dir = tree.directory("classes", ["app.entity.User"]).unwrap();
        assert!(dir.join("app/entity/User.unit").is_file());

        let archive = tree.archive("lib.zip", ["lib.model.Invoice"]).unwrap();
        let zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["lib/model/Invoice.unit"]);

        let cp = tree.class_path(TypeRegistry::new());
        assert_eq!(cp.roots().len(), 2);
    }
}
