//! Configuration management for the CLI.
//!
//! This module handles loading configuration from `modelgen.toml` files
//! and merging with command-line arguments.

use crate::error::{ArgumentError, CliResult, ConfigError};
use modelgen::default_module;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "modelgen.toml";

/// Main configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input files.
    pub input: InputConfig,

    /// Output configuration.
    pub output: OutputConfig,

    /// Naming conventions.
    pub naming: NamingConfig,

    /// Module path per super-model language, e.g. `UML = "gaphor.UML.uml"`.
    pub languages: BTreeMap<String, String>,
}

/// Input configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Model document to generate from.
    pub model: Option<PathBuf>,

    /// Override file.
    pub overrides: Option<PathBuf>,

    /// Super models as `LANG:FILE`.
    pub super_models: Vec<String>,
}

/// Output configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Generated module path. Standard output when unset.
    pub file: Option<PathBuf>,
}

/// Naming convention configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Package prefix of default super-model module paths.
    pub module_prefix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            module_prefix: "gaphor".to_string(),
        }
    }
}

impl Config {
    /// The model to generate from.
    pub fn model(&self) -> CliResult<&Path> {
        Ok(self
            .input
            .model
            .as_deref()
            .ok_or(ConfigError::MissingModel)?)
    }

    /// Parsed super-model references, in declaration order.
    pub fn super_models(&self) -> CliResult<Vec<SuperModelSpec>> {
        let specs = self
            .input
            .super_models
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<SuperModelSpec>, ArgumentError>>()?;
        Ok(specs)
    }

    /// Module the generated types of a language live in.
    pub fn module_for(&self, language: &str) -> String {
        self.languages
            .get(language)
            .cloned()
            .unwrap_or_else(|| default_module(&self.naming.module_prefix, language))
    }

    /// Every file generation reads: model, overrides and super models.
    pub fn input_files(&self) -> CliResult<Vec<PathBuf>> {
        let mut files = vec![self.model()?.to_path_buf()];
        files.extend(self.input.overrides.iter().cloned());
        files.extend(self.super_models()?.into_iter().map(|spec| spec.path));
        Ok(files)
    }

    fn validate(&self) -> CliResult<()> {
        if self.naming.module_prefix.ends_with('.') {
            return Err(ConfigError::invalid_value(
                "naming.module_prefix",
                "must not end with '.'",
            )
            .into());
        }
        if let Some(language) = self.languages.keys().find(|l| l.is_empty()) {
            return Err(ConfigError::invalid_value(
                format!("languages.{}", language),
                "language name must not be empty",
            )
            .into());
        }
        self.super_models()?;
        Ok(())
    }
}

/// A super model reference: language id and model document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperModelSpec {
    pub language: String,
    pub path: PathBuf,
}

impl FromStr for SuperModelSpec {
    type Err = ArgumentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(':') {
            Some((language, path)) if !language.is_empty() && !path.is_empty() => Ok(Self {
                language: language.to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(ArgumentError::SuperModel {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for SuperModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.path.display())
    }
}

/// Configuration manager for loading and merging configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// If the path is None, attempts to load from the default location.
    /// If no config file exists there, returns default configuration. An
    /// explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> CliResult<Config> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        if !config_path.exists() {
            if path.is_some() {
                return Err(ConfigError::not_found(config_path).into());
            }
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::invalid_toml(config_path.clone(), e.to_string()))?;
        config.validate()?;

        tracing::debug!(path = %config_path.display(), "loaded configuration");
        Ok(config)
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values. Super models
    /// given on the command line replace the configured list.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref model) = args.model {
            config.input.model = Some(model.clone());
        }

        if let Some(ref overrides) = args.overrides {
            config.input.overrides = Some(overrides.clone());
        }

        if !args.super_models.is_empty() {
            config.input.super_models = args.super_models.clone();
        }

        if let Some(ref output) = args.output {
            config.output.file = Some(output.clone());
        }

        if let Some(ref prefix) = args.module_prefix {
            config.naming.module_prefix = prefix.clone();
        }

        config
    }

    /// Get default configuration.
    pub fn default_config() -> Config {
        Config::default()
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# modelgen configuration file

[input]
# Model document (JSON) to generate from
# model = "models/uml.json"

# Override file with hand-written replacements
# overrides = "models/uml.override"

# Previously generated models whose classes are imported, as LANG:FILE
super_models = []

[output]
# Generated module; standard output when unset
# file = "uml.py"

[naming]
# Prefix of default super-model module paths (<prefix>.<Lang>.<lang>)
module_prefix = "gaphor"

[languages]
# Explicit module path per super-model language
# UML = "gaphor.UML.uml"
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Model document override.
    pub model: Option<PathBuf>,

    /// Override file override.
    pub overrides: Option<PathBuf>,

    /// Super models, as `LANG:FILE`.
    pub super_models: Vec<String>,

    /// Output file override.
    pub output: Option<PathBuf>,

    /// Module prefix override.
    pub module_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.model, None);
        assert!(config.input.super_models.is_empty());
        assert_eq!(config.output.file, None);
        assert_eq!(config.naming.module_prefix, "gaphor");
        assert!(config.languages.is_empty());
    }

    #[test]
    fn test_default_config_content_parses() {
        let config: Config = toml::from_str(ConfigManager::default_config_content()).unwrap();
        assert_eq!(config.naming.module_prefix, "gaphor");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_cli_args_output() {
        let config = Config::default();
        let args = CliArgs {
            output: Some(PathBuf::from("./custom.py")),
            ..Default::default()
        };

        let merged = ConfigManager::merge_cli_args(config, &args);
        assert_eq!(merged.output.file, Some(PathBuf::from("./custom.py")));
    }

    #[test]
    fn test_merge_cli_args_preserves_unset() {
        let mut config = Config::default();
        config.input.super_models = vec!["UML:uml.json".to_string()];
        let args = CliArgs::default();

        let merged = ConfigManager::merge_cli_args(config.clone(), &args);
        assert_eq!(merged.input.super_models, config.input.super_models);
        assert_eq!(merged.naming.module_prefix, config.naming.module_prefix);
    }

    #[test]
    fn test_merge_cli_super_models_replace() {
        let mut config = Config::default();
        config.input.super_models = vec!["UML:uml.json".to_string()];
        let args = CliArgs {
            super_models: vec!["Core:core.json".to_string()],
            ..Default::default()
        };

        let merged = ConfigManager::merge_cli_args(config, &args);
        assert_eq!(merged.input.super_models, vec!["Core:core.json"]);
    }

    #[test]
    fn test_missing_model() {
        let config = Config::default();
        assert!(config.model().is_err());
    }

    #[test]
    fn test_module_for() {
        let mut config = Config::default();
        config
            .languages
            .insert("UML".to_string(), "custom.uml".to_string());

        assert_eq!(config.module_for("UML"), "custom.uml");
        assert_eq!(config.module_for("SysML"), "gaphor.SysML.sysml");
    }

    #[test]
    fn test_parse_super_model_spec() {
        let spec: SuperModelSpec = "UML:models/uml.json".parse().unwrap();
        assert_eq!(spec.language, "UML");
        assert_eq!(spec.path, PathBuf::from("models/uml.json"));
        assert_eq!(spec.to_string(), "UML:models/uml.json");

        assert!("UML".parse::<SuperModelSpec>().is_err());
        assert!(":uml.json".parse::<SuperModelSpec>().is_err());
        assert!("UML:".parse::<SuperModelSpec>().is_err());
    }

    #[test]
    fn test_input_files() {
        let mut config = Config::default();
        config.input.model = Some(PathBuf::from("sysml.json"));
        config.input.overrides = Some(PathBuf::from("sysml.override"));
        config.input.super_models = vec!["UML:uml.json".to_string()];

        assert_eq!(
            config.input_files().unwrap(),
            vec![
                PathBuf::from("sysml.json"),
                PathBuf::from("sysml.override"),
                PathBuf::from("uml.json"),
            ]
        );
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[input]
model = "sysml.json"
overrides = "sysml.override"
super_models = ["UML:uml.json"]

[output]
file = "sysml.py"

[naming]
module_prefix = "tools"

[languages]
UML = "tools.uml"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.input.model, Some(PathBuf::from("sysml.json")));
        assert_eq!(config.input.overrides, Some(PathBuf::from("sysml.override")));
        assert_eq!(config.output.file, Some(PathBuf::from("sysml.py")));
        assert_eq!(config.naming.module_prefix, "tools");
        assert_eq!(config.module_for("UML"), "tools.uml");
        assert_eq!(
            config.super_models().unwrap(),
            vec![SuperModelSpec {
                language: "UML".to_string(),
                path: PathBuf::from("uml.json"),
            }]
        );
    }

    #[test]
    fn test_invalid_module_prefix() {
        let toml = r#"
[naming]
module_prefix = "tools."
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
