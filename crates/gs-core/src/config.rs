use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::line_endings::LineEnding;

/// File name of the project-level configuration.
pub const PROJECT_CONFIG_FILE: &str = "gitscribe.toml";

/// File name of the user-level configuration, in the home directory.
pub const USER_CONFIG_FILE: &str = ".gitscriberc";

/// Contents of a `gitscribe.toml` or `~/.gitscriberc`.
///
/// Every key is optional so that a project file can override only what it
/// names and leave the rest to the user file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitscribeConfig {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub git: GitConfig,
}

impl GitscribeConfig {
    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: GitscribeConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find the nearest `gitscribe.toml` at or above `dir` and load it.
    ///
    /// The search stops at the first file found, even when it fails to load.
    pub fn discover(dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let Some(path) = find_upwards(dir, PROJECT_CONFIG_FILE) else {
            return Ok(None);
        };
        let cfg = Self::load_from(&path)?;
        Ok(Some((path, cfg)))
    }

    /// Load the user file, or `None` when it does not exist.
    pub fn load_user(path: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(user_config_path) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.files.validate()?;
        self.git.validate()
    }
}

/// `~/.gitscriberc`, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(USER_CONFIG_FILE))
}

/// First `dir/name`, walking from `dir` towards the filesystem root.
pub fn find_upwards(dir: &Path, name: &str) -> Option<PathBuf> {
    dir.ancestors()
        .map(|ancestor| ancestor.join(name))
        .find(|candidate| candidate.is_file())
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesConfig {
    /// `"LF"` or `"CRLF"`, case-insensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_endings: Option<String>,
}

impl FilesConfig {
    pub fn line_ending(&self) -> Option<LineEnding> {
        self.line_endings.as_deref().and_then(|v| v.parse().ok())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.line_endings {
            Some(value) if value.parse::<LineEnding>().is_err() => Err(ConfigError::Validation(
                format!("files.line_endings must be \"LF\" or \"CRLF\", got {value:?}"),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Record changes in git at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Keep HEAD where it is; commits live only on the session ref.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_commit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl GitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "git.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GitSettings
// ---------------------------------------------------------------------------

/// Effective git behaviour after layering project over user config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitSettings {
    pub enabled: bool,
    pub no_commit: bool,
    pub timeout: Duration,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            no_commit: true,
            timeout: crate::git::DEFAULT_GIT_TIMEOUT,
        }
    }
}

impl GitSettings {
    /// Field-wise: project value, else user value, else default.
    pub fn layered(project: Option<&GitscribeConfig>, user: Option<&GitscribeConfig>) -> Self {
        let defaults = Self::default();
        let pick = |f: fn(&GitConfig) -> Option<bool>, fallback: bool| {
            project
                .and_then(|c| f(&c.git))
                .or_else(|| user.and_then(|c| f(&c.git)))
                .unwrap_or(fallback)
        };
        let timeout = project
            .and_then(|c| c.git.timeout_secs)
            .or_else(|| user.and_then(|c| c.git.timeout_secs))
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            enabled: pick(|g| g.enabled, defaults.enabled),
            no_commit: pick(|g| g.no_commit, defaults.no_commit),
            timeout,
        }
    }

    /// Discover `gitscribe.toml` above `dir` and layer it over the user file.
    pub fn load(dir: &Path, user_config: Option<&Path>) -> Result<Self, ConfigError> {
        let project = GitscribeConfig::discover(dir)?.map(|(_, cfg)| cfg);
        let user = GitscribeConfig::load_user(user_config)?;
        Ok(Self::layered(project.as_ref(), user.as_ref()))
    }
}
