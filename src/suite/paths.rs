//! Resolution of configured path entries into root-relative file lists.
//!
//! Every configured entry is checked lexically against the root before it
//! touches the filesystem, then checked again after canonicalization so a
//! symlink cannot lead outside the root either.

use crate::error::SuiteDescriptionError;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

type Result<T> = std::result::Result<T, SuiteDescriptionError>;

/// Resolves the entries of one configuration key.
pub(crate) struct PathResolver<'a> {
    root: &'a Path,
    key: &'static str,
    extension: &'static str,
}

impl<'a> PathResolver<'a> {
    /// `root` must already be canonical.
    pub(crate) fn new(root: &'a Path, key: &'static str, extension: &'static str) -> Self {
        Self {
            root,
            key,
            extension,
        }
    }

    /// Expand `entries` in configured order, keeping the first occurrence of
    /// every file.
    pub(crate) fn resolve(&self, entries: &[String]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for entry in entries {
            for path in self.resolve_entry(entry)? {
                if seen.insert(path.clone()) {
                    resolved.push(path);
                }
            }
        }

        log::debug!(
            "Resolved {} file(s) for '{}' from {} entr{}",
            resolved.len(),
            self.key,
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" }
        );
        Ok(resolved)
    }

    fn resolve_entry(&self, entry: &str) -> Result<Vec<String>> {
        let relative = normalize_relative(self.root, Path::new(entry)).ok_or_else(|| {
            SuiteDescriptionError::PathEscapesRoot {
                key: self.key,
                path: entry.to_string(),
            }
        })?;
        let full = self.root.join(&relative);

        let metadata = std::fs::metadata(&full).map_err(|_| SuiteDescriptionError::PathNotFound {
            key: self.key,
            path: entry.to_string(),
        })?;

        let canonical = full.canonicalize().map_err(|e| SuiteDescriptionError::Scan {
            path: full.clone(),
            reason: e.to_string(),
        })?;
        if !canonical.starts_with(self.root) {
            return Err(SuiteDescriptionError::PathEscapesRoot {
                key: self.key,
                path: entry.to_string(),
            });
        }

        if metadata.is_dir() {
            return self.scan_dir(&full);
        }

        if self.has_extension(&full) {
            Ok(vec![to_url_path(&relative)?])
        } else {
            log::warn!(
                "Skipping '{}' in '{}': expected a .{} file",
                entry,
                self.key,
                self.extension
            );
            Ok(Vec::new())
        }
    }

    fn scan_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let mut found = Vec::new();

        for item in WalkDir::new(dir) {
            let item = item.map_err(|e| SuiteDescriptionError::Scan {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

            if !item.file_type().is_file() || !self.has_extension(item.path()) {
                continue;
            }

            let relative = item
                .path()
                .strip_prefix(self.root)
                .map_err(|_| SuiteDescriptionError::Scan {
                    path: item.path().to_path_buf(),
                    reason: "file is outside the root directory".to_string(),
                })?;
            found.push(to_url_path(relative)?);
        }

        // Enumeration order is filesystem dependent
        found.sort();
        Ok(found)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension))
    }
}

/// Lexically normalize `entry` relative to `root`.
///
/// Returns `None` when a `..` component climbs above the root or when an
/// absolute entry lies outside it.
pub(crate) fn normalize_relative(root: &Path, entry: &Path) -> Option<PathBuf> {
    let entry = if entry.is_absolute() {
        entry.strip_prefix(root).ok()?
    } else {
        entry
    };

    let mut parts: Vec<&OsStr> = Vec::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(parts.iter().collect())
}

/// Join the components of a relative path with `/`.
pub(crate) fn to_url_path(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| SuiteDescriptionError::NonUtf8Path(relative.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}
