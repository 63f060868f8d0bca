//! Configuration loading from various sources

pub mod env;
pub mod file;
pub mod formats;
pub mod merge;

use crate::{Config, Result, Validate};
use std::path::{Path, PathBuf};

/// Format for configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
    /// JSON format (.json)
    Json,
}

/// Configuration source for layered loading
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
    Explicit(Config),
}

/// Builder for loading and merging configurations
///
/// Precedence: defaults < file < environment < explicit overrides
///
/// # Example
///
/// ```no_run
/// use rootseek_config::loader::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .with_file(".rootseek.toml")
///     .with_env()
///     .build()?;
/// # Ok::<(), rootseek_config::ConfigError>(())
/// ```
pub struct ConfigBuilder {
    sources: Vec<ConfigSource>,
    overrides: Vec<Box<dyn FnOnce(&mut Config)>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources
            .push(ConfigSource::File(path.as_ref().to_path_buf()));
        self
    }

    pub fn with_env(mut self) -> Self {
        self.sources.push(ConfigSource::Environment);
        self
    }

    /// Overlay a whole config.
    ///
    /// Merging is field by field and a field equal to its default never
    /// overrides an earlier source. Use [`with_override`](Self::with_override)
    /// to force a value back to its default.
    pub fn with_config(mut self, config: Config) -> Self {
        self.sources.push(ConfigSource::Explicit(config));
        self
    }

    /// Edit the merged config after every source, before validation.
    ///
    /// ```
    /// use rootseek_config::loader::ConfigBuilder;
    ///
    /// let config = ConfigBuilder::new()
    ///     .with_override(|c| c.graph.max_hops = 3)
    ///     .build()?;
    /// assert_eq!(config.graph.max_hops, 3);
    /// # Ok::<(), rootseek_config::ConfigError>(())
    /// ```
    pub fn with_override(mut self, edit: impl FnOnce(&mut Config) + 'static) -> Self {
        self.overrides.push(Box::new(edit));
        self
    }

    /// Merge all sources in order and validate the result
    pub fn build(self) -> Result<Config> {
        let mut config = Config::default();

        for source in self.sources {
            match source {
                ConfigSource::File(path) => {
                    let file_config = file::load_from_file(&path)?;
                    config = merge::merge(config, file_config);
                }
                ConfigSource::Environment => {
                    if let Some(env_config) = env::from_env()? {
                        config = merge::merge(config, env_config);
                    }
                }
                ConfigSource::Explicit(explicit_config) => {
                    config = merge::merge(config, explicit_config);
                }
            }
        }

        for edit in self.overrides {
            edit(&mut config);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const DEFAULT_PATHS: [&str; 4] = [
    ".rootseek.toml",
    ".rootseek.yml",
    ".rootseek.yaml",
    ".rootseek.json",
];

impl Config {
    /// Load configuration from the first default location that exists,
    /// then apply the environment overlay.
    ///
    /// Without any file the defaults are used.
    pub fn load() -> Result<Self> {
        let mut builder = ConfigBuilder::new();
        if let Some(path) = DEFAULT_PATHS.iter().find(|p| Path::new(p).exists()) {
            builder = builder.with_file(path);
        }
        builder.with_env().build()
    }

    /// Load configuration from a specific file plus the environment overlay
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        ConfigBuilder::new().with_file(path).with_env().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_default() {
        let config = ConfigBuilder::new().build().unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_file_then_explicit_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rootseek.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[graph]\nmax_hops = 4\n[ranking]\nacceptance_threshold = 0.7").unwrap();

        let mut explicit = Config::default();
        explicit.graph.max_hops = 2;

        let config = ConfigBuilder::new()
            .with_file(&path)
            .with_config(explicit)
            .build()
            .unwrap();
        assert_eq!(config.graph.max_hops, 2);
        assert!((config.ranking.acceptance_threshold - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_override_can_restore_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rootseek.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[graph]\nmax_hops = 4").unwrap();

        let default_hops = Config::default().graph.max_hops;
        let mut explicit = Config::default();
        explicit.graph.max_hops = default_hops;

        // A default-valued field in an explicit config does not win.
        let merged = ConfigBuilder::new()
            .with_file(&path)
            .with_config(explicit)
            .build()
            .unwrap();
        assert_eq!(merged.graph.max_hops, 4);

        let forced = ConfigBuilder::new()
            .with_file(&path)
            .with_override(move |c| c.graph.max_hops = default_hops)
            .build()
            .unwrap();
        assert_eq!(forced.graph.max_hops, default_hops);
    }

    #[test]
    fn test_override_is_still_validated() {
        let err = ConfigBuilder::new()
            .with_override(|c| c.graph.max_paths = 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, crate::ConfigError::InvalidInteger { .. }));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = ConfigBuilder::new()
            .with_file("/definitely/not/here.toml")
            .build()
            .unwrap_err();
        assert!(matches!(err, crate::ConfigError::FileNotFound { .. }));
    }
}
