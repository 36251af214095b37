use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;

use jscompile::config::Config;
use jscompile::manifest::ManifestResolver;
use jscompile::minifier::ClosureCompiler;
use jscompile::{BuildOrchestrator, BuildRequest};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Include set to append, in order (reads `<includes-dir>/<NAME>.json`)
    #[arg(long = "include", alias = "includes", value_name = "NAME", required = true)]
    includes: Vec<String>,

    /// Do not ask the minifier for verbose warnings
    #[arg(long)]
    warningoff: bool,

    /// Minify through the external compiler instead of copying the concatenation
    #[arg(long)]
    minify: bool,

    /// Output file (defaults to the configured output, `../build/jscom.js`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit `<output>.map` and reference it from the minified output
    #[arg(long)]
    sourcemaps: bool,

    /// Project root that relative paths are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let log_level = match cli.verbose {
        0 => "warn",  // Default: warnings and errors only
        1 => "info",  // -v: informational messages
        2 => "debug", // -vv: debug messages
        _ => "trace", // -vvv or more: trace messages
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    debug!(
        "Verbosity level: {} (log level: {})",
        cli.verbose, log_level
    );

    // Everything below works on absolute paths derived from the root
    let root = std::path::absolute(cli.root.unwrap_or_else(|| PathBuf::from(".")))
        .context("Failed to resolve the project root")?;
    debug!("Project root: {:?}", root);

    let config = Config::load(&root, cli.config.as_deref())?;
    debug!("Configuration: {:?}", config);

    let output = root.join(cli.output.as_ref().unwrap_or(&config.output));
    let request = BuildRequest::new(cli.includes, output)
        .with_minify(cli.minify)
        .with_warning_off(cli.warningoff)
        .with_source_maps(cli.sourcemaps);

    let resolver = ManifestResolver::new(
        config.includes_dir_in(&root),
        config.source_root_in(&root),
    );
    let compiler = ClosureCompiler::new(&config.compiler, &root)?;
    let mut orchestrator = BuildOrchestrator::new(resolver, compiler);
    if let Some(temp_dir) = config.temp_dir_in(&root) {
        orchestrator = orchestrator.with_temp_dir(temp_dir);
    }

    let built = orchestrator.build(&request).map_err(|err| {
        let stage = err.stage();
        anyhow::Error::new(err).context(format!("Build failed in the {stage} stage"))
    })?;

    info!("Build written to {:?}", built.path);
    if let Some(source_map) = &built.source_map {
        info!("Source map written to {:?}", source_map);
    }

    Ok(())
}
