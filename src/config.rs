use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MapsError;

pub const CONFIG_FILE: &str = "cartos.json";
pub const DEFAULT_IMAGE_REPOSITORY: &str = "ghcr.io/jolicode/maps";
pub const DEFAULT_MOUNT_POINT: &str = "/home/app/maps";
pub const DEFAULT_USER_AGENT: &str = "maps.jolicode.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DOCKERFILE: &str = "infrastructure/maps/Dockerfile";

/// On-disk configuration; every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub use_container: Option<bool>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub mount_point: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Values coming from command-line flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<String>,
    pub project_root: Option<String>,
    pub data_dir: Option<String>,
    pub image: Option<String>,
    pub no_container: bool,
}

impl Overrides {
    /// Fills the unset fields from `CARTOS_*` variables.
    pub fn with_env(mut self) -> Self {
        if self.data_dir.is_none() {
            self.data_dir = env_value("CARTOS_DATA_DIR");
        }
        if self.image.is_none() {
            self.image = env_value("CARTOS_IMAGE");
        }
        if !self.no_container {
            self.no_container = env_value("CARTOS_NO_CONTAINER")
                .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct ContainerSettings {
    pub enabled: bool,
    pub runtime: String,
    pub image: String,
    pub mount_point: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub project_root: Utf8PathBuf,
    pub data_dir: Utf8PathBuf,
    pub container: ContainerSettings,
    pub user_agent: String,
    pub default_timeout: Option<Duration>,
}

impl Settings {
    /// Settings rooted at `project_root` with every default applied.
    pub fn for_project(project_root: Utf8PathBuf) -> Self {
        let data_dir = project_root.join("data");
        let image = default_image(&project_root);
        Self {
            project_root,
            data_dir,
            container: ContainerSettings {
                enabled: true,
                runtime: "docker".to_string(),
                image,
                mount_point: DEFAULT_MOUNT_POINT.to_string(),
            },
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn dockerfile(&self) -> Utf8PathBuf {
        self.project_root.join(DOCKERFILE)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(overrides: Overrides) -> Result<Settings, MapsError> {
        let project_root = match &overrides.project_root {
            Some(root) => Utf8PathBuf::from(root),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|err| MapsError::Filesystem(err.to_string()))?;
                Utf8PathBuf::from_path_buf(cwd)
                    .map_err(|_| MapsError::Filesystem("invalid project path".to_string()))?
            }
        };

        let config = Self::load(overrides.config_path.as_deref(), &project_root)?;
        Ok(Self::resolve_config(project_root, config, overrides))
    }

    /// Reads the explicit config file, or the first implicit one that exists.
    pub fn load(path: Option<&str>, project_root: &Utf8Path) -> Result<Config, MapsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => match implicit_config_path(project_root) {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };
        debug!(path = %config_path.display(), "loading config");

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MapsError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| MapsError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        project_root: Utf8PathBuf,
        config: Config,
        overrides: Overrides,
    ) -> Settings {
        let mut settings = Settings::for_project(project_root);

        if let Some(data_dir) = overrides.data_dir.or(config.data_dir) {
            settings.data_dir = absolutize(&settings.project_root, &data_dir);
        }
        if let Some(image) = overrides.image.or(config.image) {
            settings.container.image = image;
        }
        if let Some(enabled) = config.use_container {
            settings.container.enabled = enabled;
        }
        if overrides.no_container {
            settings.container.enabled = false;
        }
        if let Some(runtime) = config.runtime {
            settings.container.runtime = runtime;
        }
        if let Some(mount_point) = config.mount_point {
            settings.container.mount_point = mount_point;
        }
        if let Some(user_agent) = config.user_agent {
            settings.user_agent = user_agent;
        }
        if let Some(secs) = config.timeout_secs {
            settings.default_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        settings
    }
}

/// Image tag derived from the Dockerfile content, so a changed Dockerfile
/// means a new image.
pub fn default_image(project_root: &Utf8Path) -> String {
    match fs::read(project_root.join(DOCKERFILE).as_std_path()) {
        Ok(content) => format!("{DEFAULT_IMAGE_REPOSITORY}:{:x}", md5::compute(content)),
        Err(_) => format!("{DEFAULT_IMAGE_REPOSITORY}:latest"),
    }
}

fn implicit_config_path(project_root: &Utf8Path) -> Option<PathBuf> {
    let local = project_root.join(CONFIG_FILE);
    if local.as_std_path().exists() {
        return Some(local.into_std_path_buf());
    }
    ProjectDirs::from("com", "jolicode", "cartos")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .filter(|path| path.exists())
}

fn absolutize(root: &Utf8Path, value: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
