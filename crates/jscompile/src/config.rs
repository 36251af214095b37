use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::combine::Combine;
use crate::dirs::{CONFIG_FILE, system_config_file, user_jscompile_config_dir};

/// Effective configuration after every layer has been merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the `<name>.json` include-set manifests
    pub includes_dir: PathBuf,

    /// Directory manifest entries are relative to
    pub source_root: PathBuf,

    /// Default output path when `--output` is not given
    pub output: PathBuf,

    /// Minifier program followed by its leading arguments
    pub compiler: Vec<String>,

    /// Where the intermediate concatenation is created.
    /// Defaults to the system temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            includes_dir: PathBuf::from("includes"),
            source_root: PathBuf::from("."),
            output: PathBuf::from("../build/jscom.js"),
            compiler: vec![
                "java".to_owned(),
                "-jar".to_owned(),
                "compiler/compiler.jar".to_owned(),
            ],
            temp_dir: None,
        }
    }
}

/// One source of configuration: a config file or the environment.
///
/// Only the keys a layer actually sets are `Some`, so a higher layer can
/// restate a default value and still win over a lower one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigLayer {
    pub includes_dir: Option<PathBuf>,
    pub source_root: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub compiler: Option<Vec<String>>,
    pub temp_dir: Option<PathBuf>,
}

impl Combine for ConfigLayer {
    fn combine(self, other: Self) -> Self {
        Self {
            includes_dir: self.includes_dir.combine(other.includes_dir),
            source_root: self.source_root.combine(other.source_root),
            output: self.output.combine(other.output),
            compiler: self.compiler.combine(other.compiler),
            temp_dir: self.temp_dir.combine(other.temp_dir),
        }
    }
}

impl ConfigLayer {
    /// Load a single config file from a path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let layer: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        if let Some(compiler) = &layer.compiler {
            validate_compiler(compiler)
                .with_context(|| format!("Invalid config file: {:?}", path))?;
        }

        Ok(layer)
    }

    /// Load configuration from environment variables with JSCOMPILE_ prefix
    pub fn from_env() -> Self {
        Self {
            includes_dir: env_path("JSCOMPILE_INCLUDES_DIR"),
            source_root: env_path("JSCOMPILE_SOURCE_ROOT"),
            output: env_path("JSCOMPILE_OUTPUT"),
            // JSCOMPILE_COMPILER - whitespace-separated program and arguments
            compiler: env::var("JSCOMPILE_COMPILER").ok().and_then(|value| {
                let words: Vec<String> = value.split_whitespace().map(str::to_owned).collect();
                (!words.is_empty()).then_some(words)
            }),
            temp_dir: env_path("JSCOMPILE_TEMP_DIR"),
        }
    }

    /// Fill every key this layer leaves unset from the defaults
    pub fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            includes_dir: self.includes_dir.unwrap_or(defaults.includes_dir),
            source_root: self.source_root.unwrap_or(defaults.source_root),
            output: self.output.unwrap_or(defaults.output),
            compiler: self.compiler.unwrap_or(defaults.compiler),
            temp_dir: self.temp_dir,
        }
    }

    fn try_load_and_combine<P: AsRef<Path>>(
        layer: &mut Self,
        path: P,
        context: &str,
    ) -> Result<()> {
        if path.as_ref().exists() {
            log::debug!("Loading {} from: {:?}", context, path.as_ref());
            let loaded = Self::load_from_file(&path)
                .with_context(|| format!("Failed to load {} from {:?}", context, path.as_ref()))?;
            *layer = loaded.combine(std::mem::take(layer));
        }
        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn validate_compiler(compiler: &[String]) -> Result<()> {
    if compiler.first().is_none_or(|program| program.trim().is_empty()) {
        return Err(anyhow!(
            "`compiler` must name a program, e.g. [\"java\", \"-jar\", \"compiler/compiler.jar\"]"
        ));
    }
    Ok(())
}

impl Config {
    /// Load configuration with hierarchical precedence:
    /// 1. CLI-provided config path (highest precedence)
    /// 2. Environment variables (JSCOMPILE_*)
    /// 3. Project config (jscompile.toml in the project root)
    /// 4. User config (~/.config/jscompile/jscompile.toml)
    /// 5. System config (/etc/jscompile/jscompile.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(root: &Path, cli_config_path: Option<&Path>) -> Result<Self> {
        let mut layer = ConfigLayer::default();

        // 1. Load system config (lowest precedence)
        if let Some(system_config_path) = system_config_file() {
            ConfigLayer::try_load_and_combine(&mut layer, &system_config_path, "system config")?;
        }

        // 2. Load user config
        if let Some(user_config_dir) = user_jscompile_config_dir() {
            let user_config_path = user_config_dir.join(CONFIG_FILE);
            ConfigLayer::try_load_and_combine(&mut layer, &user_config_path, "user config")?;
        }

        // 3. Load project config
        let project_config_path = root.join(CONFIG_FILE);
        ConfigLayer::try_load_and_combine(&mut layer, &project_config_path, "project config")?;

        // 4. Apply environment variables
        layer = ConfigLayer::from_env().combine(layer);

        // 5. Load CLI-provided config (highest precedence)
        if let Some(cli_config_path) = cli_config_path {
            ConfigLayer::try_load_and_combine(&mut layer, cli_config_path, "CLI config")?;
        }

        // 6. Defaults fill whatever no layer set
        let config = layer.into_config();
        config
            .validate()
            .context("Invalid configuration after merging all sources")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_compiler(&self.compiler)
    }

    /// Manifest directory, resolved against the project root
    pub fn includes_dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.includes_dir)
    }

    /// Source root, resolved against the project root
    pub fn source_root_in(&self, root: &Path) -> PathBuf {
        root.join(&self.source_root)
    }

    /// Temporary directory for the intermediate artifact, if configured
    pub fn temp_dir_in(&self, root: &Path) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|dir| root.join(dir))
    }
}
