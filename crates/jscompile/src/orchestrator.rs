use std::path::PathBuf;

use log::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::emit::{BuildOutput, emit};
use crate::error::BuildResult;
use crate::manifest::ManifestResolver;
use crate::minifier::Minifier;
use crate::request::BuildRequest;

/// Drives one build: request validation, manifest resolution,
/// concatenation, then emission.
///
/// All paths are taken as given; nothing here consults or changes the
/// process working directory.
#[derive(Debug)]
pub struct BuildOrchestrator<M> {
    resolver: ManifestResolver,
    minifier: M,
    temp_dir: Option<PathBuf>,
}

impl<M: Minifier> BuildOrchestrator<M> {
    pub const fn new(resolver: ManifestResolver, minifier: M) -> Self {
        Self {
            resolver,
            minifier,
            temp_dir: None,
        }
    }

    /// Create intermediate artifacts in `dir` instead of the system default
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub const fn minifier(&self) -> &M {
        &self.minifier
    }

    /// Run the full pipeline for `request`.
    ///
    /// The intermediate artifact lives only for the duration of this call
    /// and is removed on success, on error, and while unwinding.
    pub fn build(&self, request: &BuildRequest) -> BuildResult<BuildOutput> {
        info!("Building {}", request.output().display());
        request.validate()?;

        let files = self.resolver.resolve(request.includes())?;
        debug!(
            "Resolved {} include sets into {} files",
            request.includes().len(),
            files.len()
        );

        let artifact = aggregate(&files, self.temp_dir.as_deref())?;
        debug!(
            "Concatenated {} files into {:?}",
            artifact.file_count(),
            artifact.path()
        );
        if artifact.is_empty() {
            warn!(
                "Include sets {:?} contain no source text",
                request.includes()
            );
        }

        let output = emit(request, &artifact, &files, &self.minifier)?;
        debug!("Build finished: {:?}", output);

        Ok(output)
    }
}
