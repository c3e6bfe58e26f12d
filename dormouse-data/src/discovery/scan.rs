use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use super::context::open_archive;
use super::{matches_heuristic, package_path, DiscoveredTypes, DiscoveryError, LoadingContext, UNIT_SUFFIX};

pub(super) struct Scanner<'a> {
    context: &'a dyn LoadingContext,
    heuristic: bool,
    seen: BTreeSet<String>,
    types: DiscoveredTypes,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(context: &'a dyn LoadingContext, heuristic: bool) -> Self {
        Self {
            context,
            heuristic,
            seen: BTreeSet::new(),
            types: DiscoveredTypes::new(),
        }
    }

    pub(super) fn finish(self) -> DiscoveredTypes {
        self.types
    }

    /// Recursively list `dir`, which holds the units of `package`.
    pub(super) fn scan_directory(&mut self, dir: &Path, package: &str) -> Result<(), DiscoveryError> {
        let io_error = |source| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(dir)
            .map_err(io_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error)?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let file_name = entry.file_name();
            // Names that are not UTF-8 cannot form a type name.
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if path.is_dir() {
                self.scan_directory(&path, &join(package, name))?;
            } else if let Some(stem) = name.strip_suffix(UNIT_SUFFIX) {
                if self.accepts(package) {
                    self.consider(&join(package, stem))?;
                }
            }
        }
        Ok(())
    }

    pub(super) fn scan_archive(&mut self, archive: &Path, package: &str) -> Result<(), DiscoveryError> {
        let zip = open_archive(archive)?;
        let prefix = if package.is_empty() {
            String::new()
        } else {
            format!("{}/", package_path(package))
        };
        let mut units: Vec<String> = zip
            .file_names()
            .filter(|name| name.starts_with(&prefix) && name.ends_with(UNIT_SUFFIX))
            .map(str::to_string)
            .collect();
        units.sort();

        for entry in units {
            let stem = &entry[..entry.len() - UNIT_SUFFIX.len()];
            let qualified = stem.trim_start_matches('/').replace('/', ".");
            let entry_package = qualified.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
            if self.accepts(entry_package) {
                self.consider(&qualified)?;
            }
        }
        Ok(())
    }

    fn accepts(&self, package: &str) -> bool {
        !self.heuristic || matches_heuristic(package)
    }

    fn consider(&mut self, qualified: &str) -> Result<(), DiscoveryError> {
        if self.seen.contains(qualified) {
            return Ok(());
        }
        let descriptor = self.context.materialize(qualified)?;
        self.seen.insert(qualified.to_string());
        if descriptor.is_marked() {
            debug!(name = qualified, marker = ?descriptor.marker(), "Found mapped type");
            self.types.insert(descriptor);
        } else {
            trace!(name = qualified, "Skipping unmarked type");
        }
        Ok(())
    }
}

fn join(package: &str, segment: &str) -> String {
    if package.is_empty() {
        segment.to_string()
    } else {
        format!("{package}.{segment}")
    }
}
