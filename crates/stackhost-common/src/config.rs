//! ---
//! sh_section: "01-core-functionality"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Installer settings and resolved project paths."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InstallerError, Result};
use crate::logging::LogFormat;

/// Settings file looked up in the project directory when no override is given.
pub const DEFAULT_SETTINGS_FILE: &str = "stackhost.toml";

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_env_template() -> PathBuf {
    PathBuf::from(".env.example")
}

fn default_key_dir() -> PathBuf {
    PathBuf::from("keys")
}

fn default_private_key() -> String {
    "private.pem".to_owned()
}

fn default_public_key() -> String {
    "public.pem".to_owned()
}

fn default_token_cache() -> PathBuf {
    PathBuf::from(".registry_token")
}

fn default_marker() -> PathBuf {
    PathBuf::from(".installed")
}

fn default_update_log() -> PathBuf {
    PathBuf::from("update.log")
}

fn default_registry_server() -> String {
    "ghcr.io".to_owned()
}

fn default_engine() -> String {
    "docker".to_owned()
}

fn default_compose() -> String {
    "docker-compose".to_owned()
}

fn default_cron_expression() -> String {
    "0 0 * * 0".to_owned()
}

fn default_escalation() -> String {
    "sudo".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Immutable settings consumed by every lifecycle command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallerSettings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub dependencies: DependencySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Settings together with the file they came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: InstallerSettings,
    pub source: Option<PathBuf>,
}

impl InstallerSettings {
    pub const ENV_SETTINGS_PATH: &'static str = "STACKHOST_CONFIG";

    /// Resolve settings from `STACKHOST_CONFIG`, an explicit path, or
    /// `stackhost.toml` in the project directory, falling back to defaults.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<LoadedSettings> {
        if let Ok(env_path) = std::env::var(Self::ENV_SETTINGS_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let settings = Self::from_path(&path)?;
                return Ok(LoadedSettings {
                    settings,
                    source: Some(path),
                });
            }
        }

        if let Some(path) = explicit {
            let settings = Self::from_path(path)?;
            return Ok(LoadedSettings {
                settings,
                source: Some(path.to_path_buf()),
            });
        }

        let candidate = project_dir.join(DEFAULT_SETTINGS_FILE);
        if candidate.exists() {
            let settings = Self::from_path(&candidate)?;
            return Ok(LoadedSettings {
                settings,
                source: Some(candidate),
            });
        }

        debug!(project = %project_dir.display(), "no settings file found, using defaults");
        Ok(LoadedSettings {
            settings: Self::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(settings_path = %path.display(), "loading settings");
        let contents = fs::read_to_string(path).map_err(|err| {
            InstallerError::io(format!("unable to read settings {}", path.display()), err)
        })?;
        contents.parse()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.registry.server.trim().is_empty() {
            return Err(InstallerError::Config(
                "registry.server must not be empty".into(),
            ));
        }
        if self.runtime.engine.trim().is_empty() || self.runtime.compose.trim().is_empty() {
            return Err(InstallerError::Config(
                "runtime.engine and runtime.compose must name executables".into(),
            ));
        }
        let fields = self.schedule.expression.split_whitespace().count();
        if fields != 5 {
            return Err(InstallerError::Config(format!(
                "schedule.expression must have 5 fields, found {fields}"
            )));
        }
        if self.paths.private_key == self.paths.public_key {
            return Err(InstallerError::Config(
                "paths.private_key and paths.public_key must differ".into(),
            ));
        }
        Ok(())
    }
}

impl std::str::FromStr for InstallerSettings {
    type Err = InstallerError;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let settings: InstallerSettings =
            toml::from_str(content).map_err(|err| InstallerError::Config(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// File locations, relative to the project directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathSettings {
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
    #[serde(default = "default_env_template")]
    pub env_template: PathBuf,
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,
    #[serde(default = "default_private_key")]
    pub private_key: String,
    #[serde(default = "default_public_key")]
    pub public_key: String,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
    #[serde(default = "default_marker")]
    pub marker: PathBuf,
    #[serde(default = "default_update_log")]
    pub update_log: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            env_template: default_env_template(),
            key_dir: default_key_dir(),
            private_key: default_private_key(),
            public_key: default_public_key(),
            token_cache: default_token_cache(),
            marker: default_marker(),
            update_log: default_update_log(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySettings {
    #[serde(default = "default_registry_server")]
    pub server: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            server: default_registry_server(),
        }
    }
}

/// External container tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeSettings {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_compose")]
    pub compose: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            compose: default_compose(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Five-field cron expression for the weekly update job.
    #[serde(default = "default_cron_expression")]
    pub expression: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            expression: default_cron_expression(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencySettings {
    /// Command prefixed to package installs; empty runs them directly.
    #[serde(default = "default_escalation")]
    pub escalate_with: String,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            escalate_with: default_escalation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
        }
    }
}

/// Absolute locations derived from [`InstallerSettings`] and a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub env_file: PathBuf,
    pub env_template: PathBuf,
    pub key_dir: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub token_cache: PathBuf,
    pub marker: PathBuf,
    pub update_log: PathBuf,
    pub log_dir: PathBuf,
}

impl ProjectPaths {
    /// Resolve every configured path against `root`.
    pub fn resolve(root: impl AsRef<Path>, settings: &InstallerSettings) -> Result<Self> {
        let root = root
            .as_ref()
            .absolutize()
            .map_err(|err| InstallerError::io("unable to resolve project directory", err))?
            .into_owned();
        let join = |path: &Path| -> PathBuf {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            }
        };
        let paths = &settings.paths;
        let key_dir = join(&paths.key_dir);
        Ok(Self {
            env_file: join(&paths.env_file),
            env_template: join(&paths.env_template),
            private_key: key_dir.join(&paths.private_key),
            public_key: key_dir.join(&paths.public_key),
            key_dir,
            token_cache: join(&paths.token_cache),
            marker: join(&paths.marker),
            update_log: join(&paths.update_log),
            log_dir: join(&settings.logging.directory),
            root,
        })
    }
}
