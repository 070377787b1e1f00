//! Reconciling a desired artifact set against directories on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, UacError};
use crate::store::write_atomic_with_mode;

/// A directory plus the file-name prefix a generator owns inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub dir: PathBuf,
    pub prefix: String,
}

impl Namespace {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&self.prefix))
    }

    /// Files currently on disk inside this namespace.
    fn existing(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(UacError::io_at(&self.dir, e)),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| UacError::io_at(&self.dir, e))?;
            let path = entry.path();
            if path.is_file() && self.owns(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Artifact {
    contents: String,
    mode: Option<u32>,
}

/// Desired contents per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    files: BTreeMap<PathBuf, Artifact>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, contents: String) {
        self.files.insert(path, Artifact { contents, mode: None });
    }

    /// Insert a file that must not be world-readable.
    pub fn insert_private(&mut self, path: PathBuf, contents: String) {
        self.files.insert(
            path,
            Artifact {
                contents,
                mode: Some(0o600),
            },
        );
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

/// What a sync did to the disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl GenerationReport {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} written, {} unchanged, {} removed",
            self.written.len(),
            self.unchanged.len(),
            self.removed.len()
        )
    }
}

/// Make the namespaces contain exactly `desired`.
///
/// Owned files not in `desired` are deleted, new or changed files are
/// written atomically, identical files are not touched.
pub fn sync(namespaces: &[Namespace], desired: &ArtifactSet) -> Result<GenerationReport> {
    let mut report = GenerationReport::default();

    for path in desired.paths() {
        if !namespaces.iter().any(|ns| ns.owns(path)) {
            return Err(UacError::invalid(
                "artifact",
                format!("{} is outside every generated namespace", path.display()),
            ));
        }
    }

    for ns in namespaces {
        for path in ns.existing()? {
            if desired.contains(&path) {
                continue;
            }
            fs::remove_file(&path).map_err(|e| UacError::io_at(&path, e))?;
            tracing::debug!(path = %path.display(), "removed stale artifact");
            report.removed.push(path);
        }
    }

    for (path, artifact) in &desired.files {
        match fs::read_to_string(path) {
            Ok(current) if current == artifact.contents => {
                report.unchanged.push(path.clone());
                continue;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(UacError::io_at(path, e)),
        }
        write_atomic_with_mode(path, artifact.contents.as_bytes(), artifact.mode)?;
        tracing::debug!(path = %path.display(), "wrote artifact");
        report.written.push(path.clone());
    }

    Ok(report)
}
