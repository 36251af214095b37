#![allow(clippy::disallowed_methods)]

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use jscompile::manifest::ManifestResolver;
use jscompile::minifier::{Minifier, MinifierInvocation, MinifierOutcome};
use jscompile::{BuildError, BuildOrchestrator, BuildRequest, BuildResult, EmitMode, Stage};

/// Stands in for the external compiler: joins its inputs with `;` and
/// counts how often it ran
#[derive(Debug, Default)]
struct JoiningMinifier {
    runs: Cell<usize>,
}

impl Minifier for JoiningMinifier {
    fn minify(&self, invocation: &MinifierInvocation) -> BuildResult<MinifierOutcome> {
        self.runs.set(self.runs.get() + 1);
        let body = invocation
            .sources
            .iter()
            .map(|path| fs::read_to_string(path).unwrap().trim().to_owned())
            .collect::<Vec<_>>()
            .join(";");
        fs::write(&invocation.output, body).unwrap();
        if let Some(map) = &invocation.source_map {
            fs::write(map, r#"{"version":3,"sources":[],"names":[],"mappings":""}"#).unwrap();
        }
        Ok(MinifierOutcome::default())
    }
}

#[derive(Debug)]
struct ExitingMinifier(i32);

impl Minifier for ExitingMinifier {
    fn minify(&self, _invocation: &MinifierInvocation) -> BuildResult<MinifierOutcome> {
        Err(BuildError::MinificationFailed {
            exit_code: Some(self.0),
            diagnostics: "ERROR - Parse error. missing ; before statement".to_owned(),
        })
    }
}

/// A project root with `includes/`, sources and a private temp dir
struct Project {
    root: TempDir,
}

impl Project {
    fn new() -> Self {
        let root = TempDir::new().expect("Failed to create project dir");
        fs::create_dir_all(root.path().join("includes")).unwrap();
        fs::create_dir_all(root.path().join("tmp")).unwrap();
        Self { root }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn source(&self, name: &str, content: &str) -> &Self {
        let path = self.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    fn manifest(&self, name: &str, files: &[&str]) -> &Self {
        let json = serde_json::to_string(files).unwrap();
        fs::write(self.path().join("includes").join(format!("{name}.json")), json).unwrap();
        self
    }

    fn output(&self) -> PathBuf {
        self.path().join("dist").join("app.js")
    }

    fn orchestrator<M: Minifier>(&self, minifier: M) -> BuildOrchestrator<M> {
        BuildOrchestrator::new(
            ManifestResolver::new(self.path().join("includes"), self.path()),
            minifier,
        )
        .with_temp_dir(self.path().join("tmp"))
    }

    fn leftover_temp_files(&self) -> usize {
        fs::read_dir(self.path().join("tmp")).unwrap().count()
    }
}

fn includes(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

#[test]
fn test_pass_through_concatenates_without_separators() {
    let project = Project::new();
    project
        .source("x.js", "var x = 1;")
        .source("y.js", "var y = x + 1;\n")
        .manifest("a", &["x.js", "y.js"]);

    let request = BuildRequest::new(includes(&["a"]), project.output());
    let output = project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap();

    assert_eq!(output.mode, EmitMode::PassThrough);
    assert_eq!(
        fs::read_to_string(project.output()).unwrap(),
        "var x = 1;var y = x + 1;\n"
    );
}

#[test]
fn test_include_sets_keep_request_order() {
    let project = Project::new();
    project
        .source("src/core/b.js", "B")
        .source("src/core/a.js", "A")
        .source("src/ext/c.js", "C")
        .manifest("ext", &["src/ext/c.js"])
        .manifest("core", &["src/core/b.js", "src/core/a.js"]);

    let request = BuildRequest::new(includes(&["core", "ext", "core"]), project.output());
    project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap();

    assert_eq!(fs::read_to_string(project.output()).unwrap(), "BACBA");
}

#[cfg(unix)]
#[test]
fn test_non_ascii_source_paths_resolve() {
    let project = Project::new();
    project
        .source("src/café/naïve.js", "var café = 1;\n")
        .source("src/tab\tname.js", "var t = 2;\n")
        .manifest("a", &["src/café/naïve.js", "src/tab\tname.js"]);

    let request = BuildRequest::new(includes(&["a"]), project.output());
    project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap();

    assert_eq!(
        fs::read_to_string(project.output()).unwrap(),
        "var café = 1;\nvar t = 2;\n"
    );
}

#[test]
fn test_repeated_builds_are_byte_identical() {
    let project = Project::new();
    project
        .source("x.js", "function x() {}\n")
        .source("y.js", "x();\n")
        .manifest("a", &["x.js", "y.js"]);
    let orchestrator = project.orchestrator(JoiningMinifier::default());

    for minify in [false, true] {
        let request = BuildRequest::new(includes(&["a"]), project.output())
            .with_minify(minify)
            .with_source_maps(minify);
        orchestrator.build(&request).unwrap();
        let first = fs::read(project.output()).unwrap();
        orchestrator.build(&request).unwrap();
        let second = fs::read(project.output()).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_minified_build_has_header_and_map_reference() {
    let project = Project::new();
    project
        .source("x.js", "var x = 1;\n")
        .source("y.js", "var y = 2;\n")
        .manifest("a", &["x.js", "y.js"]);

    let request = BuildRequest::new(includes(&["a"]), project.output())
        .with_minify(true)
        .with_source_maps(true);
    let output = project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap();

    assert_eq!(output.mode, EmitMode::Minified);
    assert_eq!(
        output.source_map,
        Some(project.path().join("dist").join("app.js.map"))
    );
    assert_eq!(
        fs::read_to_string(project.output()).unwrap(),
        "// JSCOM \nvar x = 1;;var y = 2;\n//@ sourceMappingURL=app.js.map"
    );
}

#[test]
fn test_no_intermediate_artifact_survives() {
    let project = Project::new();
    project
        .source("x.js", "var x;")
        .manifest("good", &["x.js"])
        .manifest("broken", &["x.js", "missing.js"]);
    let orchestrator = project.orchestrator(ExitingMinifier(1));

    let ok = BuildRequest::new(includes(&["good"]), project.output());
    orchestrator.build(&ok).unwrap();
    assert_eq!(project.leftover_temp_files(), 0);

    let unreadable = BuildRequest::new(includes(&["broken"]), project.output());
    assert!(orchestrator.build(&unreadable).is_err());
    assert_eq!(project.leftover_temp_files(), 0);

    let failing_minifier = ok.clone().with_minify(true);
    assert!(orchestrator.build(&failing_minifier).is_err());
    assert_eq!(project.leftover_temp_files(), 0);
}

#[test]
fn test_unreadable_source_is_attributed() {
    let project = Project::new();
    project
        .source("x.js", "var x;")
        .manifest("a", &["x.js", "gone.js"]);

    let request = BuildRequest::new(includes(&["a"]), project.output());
    let err = project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Aggregate);
    match err {
        BuildError::SourceFileUnreadable { path, .. } => {
            assert_eq!(path, project.path().join("gone.js"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!project.output().exists());
}

#[test]
fn test_failed_minification_creates_no_output() {
    let project = Project::new();
    project.source("x.js", "var x;").manifest("a", &["x.js"]);

    let request = BuildRequest::new(includes(&["a"]), project.output()).with_minify(true);
    let err = project
        .orchestrator(ExitingMinifier(2))
        .build(&request)
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Minify);
    assert!(matches!(
        err,
        BuildError::MinificationFailed {
            exit_code: Some(2),
            ..
        }
    ));
    assert!(!project.output().exists());
    // Only the (empty) output directory remains: nothing staged is left behind
    assert_eq!(
        fs::read_dir(project.path().join("dist")).unwrap().count(),
        0
    );
}

#[test]
fn test_missing_manifest_fails_before_reading_sources() {
    let project = Project::new();
    // `a` points at a source that does not exist; if sources were read before
    // every manifest resolved, this would surface as an aggregate failure
    project.manifest("a", &["not-there.js"]);

    let minifier = JoiningMinifier::default();
    let orchestrator = project.orchestrator(minifier);
    let request =
        BuildRequest::new(includes(&["a", "missing"]), project.output()).with_minify(true);
    let err = orchestrator.build(&request).unwrap_err();

    match err {
        BuildError::ManifestNotFound { name, .. } => assert_eq!(name, "missing"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(orchestrator.minifier().runs.get(), 0);
    assert_eq!(project.leftover_temp_files(), 0);
    assert!(!project.output().exists());
}

#[test]
fn test_empty_request_is_invalid() {
    let project = Project::new();
    let request = BuildRequest::new(Vec::new(), project.output());
    let err = project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Request);
}

#[test]
fn test_malformed_manifest_is_parse_error() {
    let project = Project::new();
    fs::write(
        project.path().join("includes").join("bad.json"),
        r#"{"files": "x.js"}"#,
    )
    .unwrap();

    let request = BuildRequest::new(includes(&["bad"]), project.output());
    let err = project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap_err();
    assert!(matches!(err, BuildError::ManifestParseError { .. }));
}

#[test]
fn test_unwritable_output_directory_is_write_error() {
    let project = Project::new();
    project.source("x.js", "var x;").manifest("a", &["x.js"]);
    // A regular file where the output directory should be
    fs::write(project.path().join("blocked"), "not a directory").unwrap();
    let output = project.path().join("blocked").join("app.js");

    let request = BuildRequest::new(includes(&["a"]), &output);
    let err = project
        .orchestrator(JoiningMinifier::default())
        .build(&request)
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Emit);
    match err {
        BuildError::OutputWriteError { path, .. } => {
            assert_eq!(path, project.path().join("blocked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!output.exists());
    assert_eq!(project.leftover_temp_files(), 0);
}
