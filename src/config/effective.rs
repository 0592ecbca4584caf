//! Effective generator configuration with provenance
//!
//! Built-in defaults, an optional TOML file and command-line flags are
//! merged into one [`GeneratorConfig`]. All relative paths are made
//! absolute against the invocation directory here, once, so nothing
//! downstream depends on the process working directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::tool::ToolCommand;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// External programs used by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub signer: ToolCommand,
    /// Preferred archiver (CRC-correct for large members)
    pub archiver: ToolCommand,
    /// Fallback archiver
    pub legacy_archiver: ToolCommand,
}

/// Resolved settings for one generator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Archive to produce
    pub output: PathBuf,

    /// Key file path or engine token URI; unsigned when absent
    #[serde(default)]
    pub key: Option<String>,

    /// Scratch directory; an ephemeral one is used when absent
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Directories searched for artifacts, first match wins
    pub search_paths: Vec<PathBuf>,

    /// Treat a signer failure as fatal
    #[serde(default)]
    pub strict_signing: bool,

    pub tools: ToolsConfig,
}

impl GeneratorConfig {
    /// Defaults only, with paths absolute against `base_dir`.
    pub fn builtin(base_dir: &Path) -> Result<Self, ConfigError> {
        EffectiveConfig::load(None, &ConfigOverrides::default(), base_dir).map(|e| e.config)
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output: Option<PathBuf>,
    pub key: Option<String>,
    pub work_dir: Option<PathBuf>,
    /// Appended to the configured search paths
    pub extra_search_paths: Vec<PathBuf>,
    pub strict_signing: bool,
}

impl ConfigOverrides {
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(output) = &self.output {
            map.insert("output".to_string(), path_value(output));
        }
        if let Some(key) = &self.key {
            map.insert("key".to_string(), Value::String(key.clone()));
        }
        if let Some(work_dir) = &self.work_dir {
            map.insert("work_dir".to_string(), path_value(work_dir));
        }
        if self.strict_signing {
            map.insert("strict_signing".to_string(), Value::Bool(true));
        }
        Value::Object(map)
    }
}

/// Merged configuration plus where it came from
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub config: GeneratorConfig,
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Merge defaults, the optional `config_file` and `overrides`.
    ///
    /// `base_dir` is the directory relative paths are resolved against.
    pub fn load(
        config_file: Option<&Path>,
        overrides: &ConfigOverrides,
        base_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = config_file {
            let path = base_dir.join(path);
            let (value, digest) = load_toml_file(&path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path),
                digest: Some(digest),
            });
        }

        let cli = overrides.to_value();
        let has_cli = cli.as_object().map_or(false, |m| !m.is_empty())
            || !overrides.extra_search_paths.is_empty();
        layers.push(cli);
        if has_cli {
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let mut config: GeneratorConfig = serde_json::from_value(merge_layers(layers))?;
        config
            .search_paths
            .extend(overrides.extra_search_paths.iter().cloned());

        validate(&config)?;
        absolutize(&mut config, base_dir);

        tracing::debug!(
            output = %config.output.display(),
            search_paths = ?config.search_paths,
            "effective configuration"
        );
        Ok(Self { config, sources })
    }
}

fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let text = String::from_utf8(bytes).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    let value: Value = toml::from_str(&text).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;

    Ok((value, digest))
}

fn validate(config: &GeneratorConfig) -> Result<(), ConfigError> {
    if config.output.as_os_str().is_empty() {
        return Err(ConfigError::Validation("output must not be empty".to_string()));
    }
    if config.search_paths.is_empty() {
        return Err(ConfigError::Validation(
            "at least one search path is required".to_string(),
        ));
    }
    if config.key.as_deref().map_or(false, str::is_empty) {
        return Err(ConfigError::Validation("key must not be empty".to_string()));
    }
    Ok(())
}

fn absolutize(config: &mut GeneratorConfig, base_dir: &Path) {
    config.output = base_dir.join(&config.output);
    if let Some(work_dir) = config.work_dir.as_mut() {
        *work_dir = base_dir.join(&*work_dir);
    }
    for dir in config.search_paths.iter_mut() {
        *dir = base_dir.join(&*dir);
    }
    // Key files become absolute; token URIs are left alone.
    if let Some(key) = config.key.as_mut() {
        let candidate = base_dir.join(key.as_str());
        if candidate.is_file() {
            *key = candidate.to_string_lossy().into_owned();
        }
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_config() {
        let dir = TempDir::new().unwrap();
        let config = GeneratorConfig::builtin(dir.path()).unwrap();

        assert_eq!(config.output, dir.path().join("firmware.swu"));
        assert_eq!(config.search_paths, vec![dir.path().join(".")]);
        assert_eq!(config.key, None);
        assert_eq!(config.work_dir, None);
        assert!(!config.strict_signing);
        assert_eq!(config.tools.signer, ToolCommand::new("openssl"));
    }

    #[test]
    fn test_cli_search_paths_append_to_default() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            extra_search_paths: vec![PathBuf::from("deploy"), PathBuf::from("/abs/scripts")],
            ..Default::default()
        };

        let effective = EffectiveConfig::load(None, &overrides, dir.path()).unwrap();
        assert_eq!(
            effective.config.search_paths,
            vec![
                dir.path().join("."),
                dir.path().join("deploy"),
                PathBuf::from("/abs/scripts")
            ]
        );
        assert_eq!(effective.sources.len(), 2);
        assert_eq!(effective.sources[1].origin, ConfigOrigin::Cli);
    }

    #[test]
    fn test_file_layer_then_cli() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("swu-gen.toml"),
            r#"
output = "board.swu"
search_paths = ["deploy"]
key = "pkcs11:object=fw"

[tools]
archiver = ["sh", "wrap.sh"]
"#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            output: Some(PathBuf::from("cli.swu")),
            ..Default::default()
        };

        let effective =
            EffectiveConfig::load(Some(Path::new("swu-gen.toml")), &overrides, dir.path()).unwrap();
        let config = &effective.config;

        assert_eq!(config.output, dir.path().join("cli.swu"));
        assert_eq!(config.search_paths, vec![dir.path().join("deploy")]);
        assert_eq!(config.key.as_deref(), Some("pkcs11:object=fw"));
        assert_eq!(config.tools.archiver, ToolCommand::new("sh").with_args(["wrap.sh"]));
        assert_eq!(config.tools.legacy_archiver, ToolCommand::new("cpio"));

        let file_source = &effective.sources[1];
        assert_eq!(file_source.origin, ConfigOrigin::File);
        assert_eq!(file_source.digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_key_file_made_absolute() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("priv.pem"), b"key").unwrap();
        let overrides = ConfigOverrides {
            key: Some("priv.pem".to_string()),
            ..Default::default()
        };

        let config = EffectiveConfig::load(None, &overrides, dir.path()).unwrap().config;
        assert_eq!(
            config.key,
            Some(dir.path().join("priv.pem").to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.toml"), "outptu = \"typo.swu\"\n").unwrap();

        let err = EffectiveConfig::load(Some(Path::new("bad.toml")), &ConfigOverrides::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_empty_search_paths_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("empty.toml"), "search_paths = []\n").unwrap();

        let err = EffectiveConfig::load(Some(Path::new("empty.toml")), &ConfigOverrides::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = EffectiveConfig::load(Some(Path::new("nope.toml")), &ConfigOverrides::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.toml"), "output = \n").unwrap();

        let err = EffectiveConfig::load(Some(Path::new("broken.toml")), &ConfigOverrides::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }
}
