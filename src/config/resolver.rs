//! Precedence resolution for the BCF configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Explicit config file (`--config`, else the `BCF_CONFIG` environment variable)
//! 3. System config.kdl (`~/.config/bcf/config.kdl`)
//! 4. Built-in defaults

use crate::Result;
use crate::config::{BcfConfig, ConfigPatch};
use crate::models::SchemaVersion;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const BCF_CONFIG_ENV: &str = "BCF_CONFIG";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from a file named by an environment variable
    EnvVar(String),
    /// Value from a file named on the command line
    ConfigFile(String),
    /// Value from the system-level config
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile(path) => write!(f, "file:{}", path),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking for the values the
/// CLI can override.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The effective configuration
    pub config: BcfConfig,
    pub author: Resolved<String>,
    pub version: Resolved<SchemaVersion>,
    pub strict: Resolved<bool>,
    /// Config files that were found and applied, lowest precedence first
    pub files: Vec<PathBuf>,
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file from `--config`
    pub config_path: Option<PathBuf>,
    pub author: Option<String>,
    pub version: Option<SchemaVersion>,
    pub strict: Option<bool>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }
}

/// Location of the system-level config file.
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bcf").join("config.kdl"))
}

/// Resolve configuration with full precedence chain.
///
/// An explicit config file (from `--config` or `BCF_CONFIG`) must exist;
/// a missing system file is simply skipped.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let explicit = match overrides.config_path {
        Some(ref path) => Some((
            path.clone(),
            ValueSource::ConfigFile(path.display().to_string()),
        )),
        None => std::env::var(BCF_CONFIG_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| {
                (
                    PathBuf::from(value),
                    ValueSource::EnvVar(BCF_CONFIG_ENV.to_string()),
                )
            }),
    };
    resolve_config_from(system_config_path().as_deref(), explicit, overrides)
}

/// Resolve configuration from explicit file locations.
pub fn resolve_config_from(
    system_path: Option<&Path>,
    explicit: Option<(PathBuf, ValueSource)>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    let mut config = BcfConfig::default();
    let mut files = Vec::new();
    let mut author = Resolved::new(config.author.clone(), ValueSource::Default);
    let mut version = Resolved::new(config.version, ValueSource::Default);
    let mut strict = Resolved::new(config.strict, ValueSource::Default);

    let mut layers: Vec<(ConfigPatch, ValueSource)> = Vec::new();

    // Load system config (lowest precedence among file-based)
    if let Some(path) = system_path {
        if let Some(patch) = ConfigPatch::load(path)? {
            files.push(path.to_path_buf());
            layers.push((patch, ValueSource::System));
        }
    }

    // Load explicit config (higher precedence than system)
    if let Some((path, source)) = explicit {
        match ConfigPatch::load(&path)? {
            Some(patch) => {
                files.push(path);
                layers.push((patch, source));
            }
            None => {
                return Err(crate::Error::NotFound(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }
    }

    let cli = ConfigPatch {
        author: overrides.author.clone(),
        version: overrides.version,
        strict: overrides.strict,
        ..Default::default()
    };
    layers.push((cli, ValueSource::CliFlag));

    for (patch, source) in layers {
        config.apply(&patch);
        if let Some(ref value) = patch.author {
            author = Resolved::new(value.clone(), source.clone());
        }
        if let Some(value) = patch.version {
            version = Resolved::new(value, source.clone());
        }
        if let Some(value) = patch.strict {
            strict = Resolved::new(value, source.clone());
        }
    }

    Ok(ResolvedConfig {
        config,
        author,
        version,
        strict,
        files,
    })
}
