use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{BuildError, BuildResult};

/// Resolved configuration for one build invocation.
///
/// Built once from caller-supplied options and never mutated afterwards.
/// The output path is expected to be absolute; the CLI resolves relative
/// paths against the project root before constructing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    includes: Vec<String>,
    minify: bool,
    warning_off: bool,
    source_maps: bool,
    output: PathBuf,
}

impl BuildRequest {
    pub fn new(includes: Vec<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            includes,
            minify: false,
            warning_off: false,
            source_maps: false,
            output: output.into(),
        }
    }

    #[must_use]
    pub const fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    #[must_use]
    pub const fn with_warning_off(mut self, warning_off: bool) -> Self {
        self.warning_off = warning_off;
        self
    }

    #[must_use]
    pub const fn with_source_maps(mut self, source_maps: bool) -> Self {
        self.source_maps = source_maps;
        self
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub const fn minify(&self) -> bool {
        self.minify
    }

    pub const fn warning_off(&self) -> bool {
        self.warning_off
    }

    pub const fn source_maps(&self) -> bool {
        self.source_maps
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Path of the companion source map, `<output>.map`
    pub fn source_map_path(&self) -> PathBuf {
        let mut path = self.output.clone().into_os_string();
        path.push(".map");
        PathBuf::from(path)
    }

    /// Check the request before any file I/O and make sure the output
    /// directory exists.
    pub fn validate(&self) -> BuildResult<()> {
        if self.includes.is_empty() {
            return Err(BuildError::invalid_request(
                "at least one include set must be requested",
            ));
        }

        if self.output.file_name().is_none() {
            return Err(BuildError::invalid_request(format!(
                "output path {:?} does not name a file",
                self.output
            )));
        }

        if self.output.is_dir() {
            return Err(BuildError::invalid_request(format!(
                "output path {:?} is a directory",
                self.output
            )));
        }

        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                debug!("Creating output directory {:?}", parent);
                fs::create_dir_all(parent)
                    .map_err(|err| BuildError::output_write(parent, err))?;
            }
        }

        Ok(())
    }
}
