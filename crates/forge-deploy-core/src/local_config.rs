//! Project-local `.forge` config file discovery and persistence
//!
//! The store walks from its start directory up to the filesystem root and
//! uses the first `.forge` it finds. Lookups and parsed contents are cached
//! until the store itself writes or removes a file.

use serde::Serialize;
use std::cell::OnceCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::environments::RawConfig;
use crate::error::{ForgeError, Result};

/// The config file name
pub const CONFIG_FILE: &str = ".forge";

/// What [`LocalConfigStore::save`] did with the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written(PathBuf),
    Deleted(PathBuf),
}

struct LoadedConfig {
    config: RawConfig,
    malformed: bool,
}

/// Reads and writes the `.forge` file governing a directory
pub struct LocalConfigStore {
    start_dir: PathBuf,
    found_path: OnceCell<Option<PathBuf>>,
    config: OnceCell<LoadedConfig>,
}

impl LocalConfigStore {
    /// Create a store rooted at `start_dir`, which should be absolute
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_dir: start_dir.into(),
            found_path: OnceCell::new(),
            config: OnceCell::new(),
        }
    }

    /// Create a store rooted at the process working directory
    pub fn from_current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn start_dir(&self) -> &Path {
        &self.start_dir
    }

    /// Path of the governing config file, if any
    pub fn locate(&self) -> Option<&Path> {
        self.found_path
            .get_or_init(|| find_config_file(&self.start_dir))
            .as_deref()
    }

    pub fn exists(&self) -> bool {
        self.locate().is_some()
    }

    pub fn require_path(&self) -> Result<&Path> {
        self.locate().ok_or(ForgeError::ConfigNotFound)
    }

    /// Parsed contents of the governing config file.
    ///
    /// A missing file yields an empty config. So does a malformed one, after
    /// a warning; use [`locate`](Self::locate) to tell the two apart.
    pub fn load(&self) -> &RawConfig {
        &self.loaded().config
    }

    /// A config file exists but could not be read or parsed
    pub fn is_malformed(&self) -> bool {
        self.loaded().malformed
    }

    fn loaded(&self) -> &LoadedConfig {
        self.config.get_or_init(|| match self.locate() {
            Some(path) => read_config(path),
            None => LoadedConfig {
                config: RawConfig::default(),
                malformed: false,
            },
        })
    }

    /// Directory that mutations of the governing config are written to
    pub fn write_target_dir(&self) -> PathBuf {
        self.locate()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.start_dir.clone())
    }

    /// Replace `directory/.forge` with `config` in one rename
    pub fn write(&mut self, directory: &Path, config: &RawConfig) -> Result<PathBuf> {
        let path = directory.join(CONFIG_FILE);
        let contents = render_config(config)?;

        let mut temp = NamedTempFile::new_in(directory)?;
        temp.write_all(contents.as_bytes())?;
        if let Some(permissions) = permissions_for(&path)? {
            temp.as_file().set_permissions(permissions)?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| e.error)?;

        info!("Wrote {}", path.display());
        self.invalidate();

        Ok(path)
    }

    /// Persist an edited config to the governing file.
    ///
    /// Once the last environment is gone the file is deleted instead.
    pub fn save(&mut self, config: &RawConfig) -> Result<SaveOutcome> {
        let emptied = config.has_environments() && config.environment_names().is_empty();

        if emptied {
            if let Some(path) = self.locate().map(Path::to_path_buf) {
                self.remove(&path)?;
                return Ok(SaveOutcome::Deleted(path));
            }
        }

        let directory = self.write_target_dir();
        self.write(&directory, config).map(SaveOutcome::Written)
    }

    /// Delete the config file entirely
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;

        info!("Removed {}", path.display());
        self.invalidate();

        Ok(())
    }

    fn invalidate(&mut self) {
        self.found_path.take();
        self.config.take();
    }
}

/// Find the config file by walking up from `start`
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let found = start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file());

    debug!("Config lookup from {}: {:?}", start.display(), found);
    found
}

fn read_config(path: &Path) -> LoadedConfig {
    let malformed = LoadedConfig {
        config: RawConfig::default(),
        malformed: true,
    };

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read {}: {}; treating it as empty", path.display(), e);
            return malformed;
        }
    };

    match serde_json::from_str::<RawConfig>(&contents) {
        Ok(config) => LoadedConfig {
            config: config.normalized(),
            malformed: false,
        },
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            malformed
        }
    }
}

/// Keep the mode of an existing file; new files get 0644
fn permissions_for(path: &Path) -> Result<Option<fs::Permissions>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(new_file_permissions()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Pretty JSON with four-space indentation and a trailing newline
fn render_config(config: &RawConfig) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config.serialize(&mut serializer)?;
    buf.push(b'\n');

    String::from_utf8(buf).map_err(|e| ForgeError::General(e.into()))
}
