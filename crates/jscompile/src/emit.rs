//! Output emission.
//!
//! Everything written to the requested output path (and its `.map`
//! companion) is first staged next to it and renamed into place, so a failed
//! build never leaves a half-written file behind.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::{NamedTempFile, TempDir};

use crate::aggregate::IntermediateArtifact;
use crate::error::{BuildError, BuildResult};
use crate::manifest::ResolvedFileList;
use crate::minifier::{Minifier, MinifierInvocation};
use crate::request::BuildRequest;

/// First line of every minified build
pub const HEADER: &str = "// JSCOM \n";

/// Prefix of the trailing source-map reference
pub const SOURCE_MAPPING_PREFIX: &str = "\n//@ sourceMappingURL=";

/// Mode of the written output: non-executable and world-readable
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o664;

const SOURCE_MAP_VERSION: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// Raw concatenation copied verbatim
    PassThrough,
    /// Minifier output with header and optional source-map reference
    Minified,
}

/// Report of a completed build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub path: PathBuf,
    pub mode: EmitMode,
    pub bytes: u64,
    pub source_map: Option<PathBuf>,
}

/// Produce the build output for `request`.
///
/// Pass-through mode copies `artifact`; minify mode hands `files` to the
/// minifier, since it needs the original file boundaries.
pub fn emit(
    request: &BuildRequest,
    artifact: &IntermediateArtifact,
    files: &ResolvedFileList,
    minifier: &dyn Minifier,
) -> BuildResult<BuildOutput> {
    if request.minify() {
        write_minified(request, files, minifier)
    } else {
        write_pass_through(artifact, request.output())
    }
}

/// Copy the concatenation verbatim to `output`
pub fn write_pass_through(
    artifact: &IntermediateArtifact,
    output: &Path,
) -> BuildResult<BuildOutput> {
    let bytes = write_atomic(output, |file| {
        let mut source = artifact.reopen()?;
        io::copy(&mut source, file)
    })?;
    info!("Wrote {} bytes to {:?}", bytes, output);

    Ok(BuildOutput {
        path: output.to_path_buf(),
        mode: EmitMode::PassThrough,
        bytes,
        source_map: None,
    })
}

/// Run the minifier over `files` and post-process its output
pub fn write_minified(
    request: &BuildRequest,
    files: &ResolvedFileList,
    minifier: &dyn Minifier,
) -> BuildResult<BuildOutput> {
    let output = request.output();
    let staging = staging_dir(output)?;
    let staged_output = staging.path().join(file_name(output)?);
    let staged_map = if request.source_maps() {
        Some(staging.path().join(file_name(&request.source_map_path())?))
    } else {
        None
    };

    let invocation = MinifierInvocation {
        sources: files.files().to_vec(),
        output: staged_output.clone(),
        source_map: staged_map.clone(),
        verbose_warnings: !request.warning_off(),
    };

    let outcome = minifier.minify(&invocation)?;
    if !outcome.diagnostics.trim().is_empty() {
        for line in outcome.diagnostics.lines() {
            warn!("{}", line);
        }
    }

    let minified = fs::read(&staged_output).map_err(|err| BuildError::MinificationFailed {
        exit_code: None,
        diagnostics: format!("minifier output {staged_output:?} is unreadable: {err}"),
    })?;

    let source_map = match &staged_map {
        Some(staged_map) => {
            let map_path = request.source_map_path();
            let map = fs::read(staged_map).map_err(|err| BuildError::MinificationFailed {
                exit_code: None,
                diagnostics: format!("source map {staged_map:?} was not produced: {err}"),
            })?;
            let map = finalize_source_map(&map, file_name(output)?)?;
            write_atomic(&map_path, |file| {
                file.write_all(&map)?;
                Ok(map.len() as u64)
            })?;
            debug!("Wrote source map {:?}", map_path);
            Some(map_path)
        }
        None => None,
    };

    let trailer = source_map
        .as_deref()
        .map(source_mapping_comment)
        .transpose()?
        .unwrap_or_default();

    let bytes = write_atomic(output, |file| {
        file.write_all(HEADER.as_bytes())?;
        file.write_all(&minified)?;
        file.write_all(trailer.as_bytes())?;
        Ok((HEADER.len() + minified.len() + trailer.len()) as u64)
    })?;
    info!("Wrote {} bytes of minified output to {:?}", bytes, output);

    Ok(BuildOutput {
        path: output.to_path_buf(),
        mode: EmitMode::Minified,
        bytes,
        source_map,
    })
}

/// Trailing comment pointing at the map, relative to the output file
pub fn source_mapping_comment(map_path: &Path) -> BuildResult<String> {
    let name = file_name(map_path)?;
    Ok(format!("{SOURCE_MAPPING_PREFIX}{}", name.to_string_lossy()))
}

/// Stage a file next to `path`, fill it with `fill`, then rename it over
/// `path`. The staged file is removed if anything fails.
pub fn write_atomic<F>(path: &Path, fill: F) -> BuildResult<u64>
where
    F: FnOnce(&mut File) -> io::Result<u64>,
{
    let parent = parent_dir(path);
    let mut staged =
        NamedTempFile::new_in(parent).map_err(|err| BuildError::output_write(path, err))?;

    let written = fill(staged.as_file_mut())
        .and_then(|written| {
            staged.as_file_mut().flush()?;
            Ok(written)
        })
        .map_err(|err| BuildError::output_write(path, err))?;

    set_output_permissions(staged.as_file())
        .map_err(|err| BuildError::output_write(path, err))?;

    staged
        .persist(path)
        .map_err(|err| BuildError::output_write(path, err.error))?;

    Ok(written)
}

#[cfg(unix)]
fn set_output_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(OUTPUT_MODE))
}

#[cfg(not(unix))]
fn set_output_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}

/// Private directory beside the output for the minifier to write into
fn staging_dir(output: &Path) -> BuildResult<TempDir> {
    let parent = parent_dir(output);
    tempfile::Builder::new()
        .prefix(".jscompile-")
        .tempdir_in(parent)
        .map_err(|err| BuildError::output_write(parent, err))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn file_name(path: &Path) -> BuildResult<&OsStr> {
    path.file_name().ok_or_else(|| {
        BuildError::invalid_request(format!("output path {path:?} does not name a file"))
    })
}

/// Check the staged map is a version 3 source map and point its `file`
/// field at the final output instead of the staged path the minifier saw.
fn finalize_source_map(map: &[u8], output_name: &OsStr) -> BuildResult<Vec<u8>> {
    let invalid = |diagnostics: String| BuildError::MinificationFailed {
        exit_code: None,
        diagnostics,
    };

    let mut value: serde_json::Value = serde_json::from_slice(map)
        .map_err(|err| invalid(format!("source map is not valid JSON: {err}")))?;

    match value.get("version").and_then(serde_json::Value::as_u64) {
        Some(SOURCE_MAP_VERSION) => {}
        other => {
            return Err(invalid(format!(
                "expected a version 3 source map, found version {other:?}"
            )));
        }
    }

    let Some(fields) = value.as_object_mut() else {
        return Err(invalid("source map is not a JSON object".to_owned()));
    };
    fields.insert(
        "file".to_owned(),
        serde_json::Value::String(output_name.to_string_lossy().into_owned()),
    );

    serde_json::to_vec(&value)
        .map_err(|err| invalid(format!("source map re-encoding failed: {err}")))
}
