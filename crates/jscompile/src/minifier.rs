//! External minifier invocation.
//!
//! The minifier is an opaque subprocess (Closure Compiler by default). It is
//! always called with an explicit argument vector, and only its exit status
//! and the presence of its output file are checked.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::error::{BuildError, BuildResult};

/// Disables the redeclared-global check
pub const JSCOMP_OFF_GLOBAL_THIS: &str = "--jscomp_off=globalThis";
/// Disables the type-checking pass
pub const JSCOMP_OFF_CHECK_TYPES: &str = "--jscomp_off=checkTypes";
/// Pins the accepted dialect to strict ES5
pub const LANGUAGE_IN: &str = "--language_in=ECMASCRIPT5_STRICT";
pub const WARNING_LEVEL_VERBOSE: &str = "--warning_level=VERBOSE";
pub const SOURCE_MAP_FORMAT: &str = "--source_map_format=V3";

/// One minifier run: ordered inputs, where to write, and which optional
/// flags apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifierInvocation {
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
    pub source_map: Option<PathBuf>,
    pub verbose_warnings: bool,
}

impl MinifierInvocation {
    /// Compose the compiler flags for this run.
    ///
    /// The globalThis and checkTypes checks are always disabled and the
    /// input language is always strict ES5.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(self.sources.len() * 2 + 10);

        args.push(JSCOMP_OFF_GLOBAL_THIS.into());
        if self.verbose_warnings {
            args.push(WARNING_LEVEL_VERBOSE.into());
        }
        args.push(JSCOMP_OFF_CHECK_TYPES.into());
        args.push(LANGUAGE_IN.into());

        for source in &self.sources {
            args.push("--js".into());
            args.push(source.into());
        }

        args.push("--js_output_file".into());
        args.push(self.output.clone().into());

        if let Some(source_map) = &self.source_map {
            args.push("--create_source_map".into());
            args.push(source_map.clone().into());
            args.push(SOURCE_MAP_FORMAT.into());
        }

        args
    }
}

/// Result of a minifier run that exited successfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifierOutcome {
    /// Captured diagnostic stream, unparsed
    pub diagnostics: String,
}

/// Seam between the emitter and the external compiler
pub trait Minifier {
    /// Run the minifier to completion.
    ///
    /// Implementations return [`BuildError::MinificationFailed`] when the
    /// tool cannot be launched, exits unsuccessfully, or leaves no output.
    fn minify(&self, invocation: &MinifierInvocation) -> BuildResult<MinifierOutcome>;
}

/// Closure Compiler launched as a subprocess.
///
/// `command` holds the program and its leading arguments, for example
/// `["java", "-jar", "compiler/compiler.jar"]`.
#[derive(Debug, Clone)]
pub struct ClosureCompiler {
    command: Vec<OsString>,
    working_dir: PathBuf,
}

impl ClosureCompiler {
    pub fn new<I, S>(command: I, working_dir: impl Into<PathBuf>) -> BuildResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let command: Vec<OsString> = command.into_iter().map(Into::into).collect();
        if command.is_empty() {
            return Err(BuildError::invalid_request("minifier command is empty"));
        }
        Ok(Self {
            command,
            working_dir: working_dir.into(),
        })
    }

    /// The full command line for an invocation, program first
    pub fn command_line(&self, invocation: &MinifierInvocation) -> Vec<OsString> {
        let mut line = self.command.clone();
        line.extend(invocation.args());
        line
    }
}

impl Minifier for ClosureCompiler {
    fn minify(&self, invocation: &MinifierInvocation) -> BuildResult<MinifierOutcome> {
        let line = self.command_line(invocation);
        let (program, args) = line
            .split_first()
            .ok_or_else(|| BuildError::invalid_request("minifier command is empty"))?;

        debug!(
            "Running minifier: {:?} {:?} (in {:?})",
            program, args, self.working_dir
        );

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| BuildError::MinificationFailed {
                exit_code: None,
                diagnostics: format!("failed to launch {program:?}: {err}"),
            })?;

        let diagnostics = collect_diagnostics(&output.stderr, &output.stdout);

        if !output.status.success() {
            return Err(BuildError::MinificationFailed {
                exit_code: output.status.code(),
                diagnostics,
            });
        }

        if !invocation.output.is_file() {
            warn!(
                "Minifier exited successfully but produced no output at {:?}",
                invocation.output
            );
            return Err(BuildError::MinificationFailed {
                exit_code: output.status.code(),
                diagnostics,
            });
        }

        Ok(MinifierOutcome { diagnostics })
    }
}

/// Captured stderr followed by any non-blank stdout, each starting on its
/// own line
fn collect_diagnostics(stderr: &[u8], stdout: &[u8]) -> String {
    let mut diagnostics = String::from_utf8_lossy(stderr).into_owned();
    let stdout = String::from_utf8_lossy(stdout);
    if !stdout.trim().is_empty() {
        if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
            diagnostics.push('\n');
        }
        diagnostics.push_str(&stdout);
    }
    diagnostics
}
