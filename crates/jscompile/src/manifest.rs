//! Include-set manifests.
//!
//! An include set is a JSON array of source paths stored as
//! `<includes_dir>/<name>.json`. Resolution expands every requested set in
//! request order and keeps each manifest's own order untouched; the order of
//! concatenation decides execution order in the assembled script, so nothing
//! here sorts or deduplicates.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, trace};

use crate::error::{BuildError, BuildResult};

/// Ordered list of absolute source paths produced by resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFileList {
    files: Vec<PathBuf>,
}

impl ResolvedFileList {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }
}

impl FromIterator<PathBuf> for ResolvedFileList {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResolvedFileList {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Loads include-set manifests and expands them into a [`ResolvedFileList`]
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    includes_dir: PathBuf,
    source_root: PathBuf,
}

impl ManifestResolver {
    /// `includes_dir` holds the `<name>.json` documents; manifest entries are
    /// joined onto `source_root`.
    pub fn new(includes_dir: impl Into<PathBuf>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            includes_dir: includes_dir.into(),
            source_root: source_root.into(),
        }
    }

    /// Location of the manifest document for an include set
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.includes_dir.join(format!("{name}.json"))
    }

    /// Expand the named include sets, in order, into one flat file list
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> BuildResult<ResolvedFileList> {
        let mut files = Vec::new();

        for name in names {
            let name = name.as_ref();
            let entries = self.load(name)?;
            debug!("Include set '{}' lists {} files", name, entries.len());
            files.extend(entries.into_iter().map(|entry| {
                let path = self.source_root.join(entry);
                trace!("  {:?}", path);
                path
            }));
        }

        Ok(ResolvedFileList { files })
    }

    /// Read one manifest and return its entries as written
    pub fn load(&self, name: &str) -> BuildResult<Vec<String>> {
        validate_name(name)?;

        let path = self.manifest_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(BuildError::ManifestNotFound {
                    name: name.to_owned(),
                    path,
                });
            }
            Err(source) => {
                return Err(BuildError::ManifestUnreadable {
                    name: name.to_owned(),
                    path,
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| BuildError::ManifestParseError {
            name: name.to_owned(),
            path,
            source,
        })
    }
}

/// Include names address a single file inside the includes directory
fn validate_name(name: &str) -> BuildResult<()> {
    let mut components = Path::new(name).components();
    let is_plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if name.is_empty() || !is_plain || name.contains(['/', '\\']) {
        return Err(BuildError::invalid_request(format!(
            "include set name '{name}' must be a plain file stem"
        )));
    }
    Ok(())
}
