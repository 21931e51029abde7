use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::AppError,
    model::{Config, Ledger},
};

/// Folder under the user config root holding all state
pub const APP_DIR_NAME: &str = "contribution-mate";
/// Environment variable replacing the whole config directory
pub const CONFIG_DIR_ENV: &str = "CONTRIBUTION_MATE_CONFIG_DIR";
/// Configuration document
const CONFIG_FILE: &str = "config.json";
/// History ledger document
const LEDGER_FILE: &str = "history.json";
/// Local clone of the sync repository, inside the config directory
const MIRROR_CLONE_DIR: &str = "repository";

/// Snapshot of everything config directory resolution depends on
#[derive(Debug, Clone, Default)]
pub struct ConfigEnv {
    /// Target OS as in `std::env::consts::OS`
    pub os: String,
    pub override_dir: Option<PathBuf>,
    pub xdg_config_home: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
    /// Platform config root as reported by `dirs::config_dir`
    pub platform_config_dir: Option<PathBuf>,
}

impl ConfigEnv {
    pub fn from_process() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            override_dir: non_empty_path(env::var_os(CONFIG_DIR_ENV)),
            xdg_config_home: non_empty_path(env::var_os("XDG_CONFIG_HOME")),
            home_dir: dirs::home_dir(),
            platform_config_dir: dirs::config_dir(),
        }
    }
}

fn non_empty_path(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Resolves the directory holding `config.json` and `history.json`.
///
/// The override is used as is. On macOS the OS-preferred
/// `~/Library/Application Support` is skipped in favour of
/// `$XDG_CONFIG_HOME` or `~/.config`.
pub fn resolve_config_dir(env: &ConfigEnv) -> Result<PathBuf, AppError> {
    if let Some(dir) = &env.override_dir {
        return Ok(dir.clone());
    }

    let root = if env.os == "macos" {
        env.xdg_config_home
            .clone()
            .or_else(|| env.home_dir.as_ref().map(|home| home.join(".config")))
    } else {
        env.platform_config_dir.clone()
    };

    root.map(|root| root.join(APP_DIR_NAME))
        .ok_or(AppError::ConfigDirNotFound)
}

/// A JSON document persisted by the store
trait Document: Serialize + DeserializeOwned + Default {
    fn validate(&self) -> Result<(), AppError>;
}

impl Document for Config {
    fn validate(&self) -> Result<(), AppError> {
        Config::validate(self)
    }
}

impl Document for Ledger {
    fn validate(&self) -> Result<(), AppError> {
        Ledger::validate(self)
    }
}

/// Durable state on local disk: configuration and history ledger
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the resolved per-user config directory
    pub fn from_env(env: &ConfigEnv) -> Result<Self, AppError> {
        let dir = resolve_config_dir(env)?;
        debug!(dir = %dir.display(), "resolved config directory");
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    pub fn mirror_clone_dir(&self) -> PathBuf {
        self.dir.join(MIRROR_CLONE_DIR)
    }

    /// Name of the mirror clone folder inside `dir()`
    pub fn mirror_clone_name(&self) -> &'static str {
        MIRROR_CLONE_DIR
    }

    /// Loads the configuration, creating an empty one on first use
    pub fn load_config(&self) -> Result<Config, AppError> {
        load_document(&self.config_path())
    }

    /// Merges `patch` into the current configuration on disk. The merged
/// document is validated before anything is written.
    pub fn save_config(&self, patch: Config) -> Result<Config, AppError> {
        let mut config = self.load_config()?;
        config.merge(patch);
        config.validate()?;
        write_document(&self.config_path(), &config)?;
        Ok(config)
    }

    /// Loads the history ledger, creating an empty one on first use
    pub fn load_ledger(&self) -> Result<Ledger, AppError> {
        load_document(&self.ledger_path())
    }

    /// Merges `patch` into the current ledger on disk
    pub fn save_ledger(&self, patch: Ledger) -> Result<Ledger, AppError> {
        let mut ledger = self.load_ledger()?;
        ledger.merge(patch);
        ledger.validate()?;
        write_document(&self.ledger_path(), &ledger)?;
        Ok(ledger)
    }
}

fn load_document<T: Document>(path: &Path) -> Result<T, AppError> {
    if !path.exists() {
        let document = T::default();
        write_document(path, &document)?;
        debug!(path = %path.display(), "created default document");
        return Ok(document);
    }

    let file_contents = fs::read_to_string(path)?;
    if file_contents.trim().is_empty() {
        return Ok(T::default());
    }

    let document: T = serde_json::from_str(&file_contents).map_err(|err| AppError::ConfigCorrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    document.validate().map_err(|err| AppError::ConfigCorrupt {
        path: path.to_path_buf(),
        reason: match err {
            AppError::Validation(msg) => msg,
            other => other.to_string(),
        },
    })?;

    Ok(document)
}

/// Writes pretty JSON next to the target then renames over it
fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json: String = serde_json::to_string_pretty(document)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;

    debug!(path = %path.display(), "saved document");
    Ok(())
}
