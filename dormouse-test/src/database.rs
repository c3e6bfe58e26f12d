use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dormouse_data::LoadingContext;
use dormouse_data_sqlx::{ConnectionProfile, DriverKind};
use tempfile::TempDir;

/// A SQLite database file in a temporary directory.
///
/// The file does not exist until something connects; the directory and
/// everything in it is removed on drop.
pub struct TestDatabase {
    dir: TempDir,
    path: PathBuf,
}

impl TestDatabase {
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test.db");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// SQLite profile for this database with `context` as loading context.
    pub fn profile(&self, context: Arc<dyn LoadingContext>) -> ConnectionProfile {
        ConnectionProfile::new()
            .driver(DriverKind::Sqlite)
            .address(self.path.to_string_lossy())
            .max_connections(4)
            .loading_context(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dormouse_data::{ClassPath, TypeRegistry};

    #[test]
    fn profile_points_at_the_file() {
        let db = TestDatabase::new().unwrap();
        let settings = db
            .profile(Arc::new(ClassPath::new(TypeRegistry::new())))
            .settings()
            .unwrap();
        let url = settings.get("connection.url").unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("test.db"));
        assert!(!db.path().exists());
    }
}
