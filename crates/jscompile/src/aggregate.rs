//! Concatenation of the resolved sources into a private temporary file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{debug, trace};
use tempfile::NamedTempFile;

use crate::error::{BuildError, BuildResult};
use crate::manifest::ResolvedFileList;

const ARTIFACT_PREFIX: &str = "jscompile-";
const ARTIFACT_SUFFIX: &str = ".js";

/// Concatenated sources owned by a single build invocation.
///
/// The backing file has a unique name and is removed when this value is
/// dropped, whichever way the build ends.
#[derive(Debug)]
pub struct IntermediateArtifact {
    file: NamedTempFile,
    len: u64,
    file_count: usize,
}

impl IntermediateArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Total number of bytes written
    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of source files appended
    pub const fn file_count(&self) -> usize {
        self.file_count
    }

    /// Fresh read handle positioned at the start of the concatenation
    pub fn reopen(&self) -> io::Result<File> {
        self.file.reopen()
    }
}

/// Append every file of `files`, in order, to a new intermediate artifact.
///
/// Contents are copied byte for byte with nothing inserted between files.
/// The artifact is created in `temp_dir` when given, else in the system
/// temporary directory.
pub fn aggregate(
    files: &ResolvedFileList,
    temp_dir: Option<&Path>,
) -> BuildResult<IntermediateArtifact> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(ARTIFACT_PREFIX).suffix(ARTIFACT_SUFFIX);
    let created = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    let file = created.map_err(|err| {
        let dir = temp_dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
        BuildError::artifact_write(dir, err)
    })?;
    debug!("Intermediate artifact: {:?}", file.path());

    let artifact_path = file.path().to_path_buf();
    let mut writer = BufWriter::new(file.as_file());
    let mut len = 0_u64;

    for path in files {
        let contents = fs::read(path).map_err(|source| BuildError::SourceFileUnreadable {
            path: path.clone(),
            source,
        })?;
        writer
            .write_all(&contents)
            .map_err(|err| BuildError::artifact_write(&artifact_path, err))?;
        trace!("Appended {} bytes from {:?}", contents.len(), path);
        len += contents.len() as u64;
    }

    writer
        .flush()
        .map_err(|err| BuildError::artifact_write(&artifact_path, err))?;
    drop(writer);

    debug!("Concatenated {} files ({} bytes)", files.len(), len);

    Ok(IntermediateArtifact {
        file,
        len,
        file_count: files.len(),
    })
}
