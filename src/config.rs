use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".cours-prive";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "data.db";
/// Sub-directory receiving copies of student photos.
const PHOTOS_DIR_NAME: &str = "photos";
const LOG_FILE_NAME: &str = "cours-prive.log";

/// Overrides the data directory (database, photos, log file).
pub const HOME_ENV: &str = "COURS_PRIVE_HOME";
/// Overrides where CSV exports and HTML bulletins are written.
pub const EXPORT_ENV: &str = "COURS_PRIVE_EXPORT_DIR";

/// Every filesystem location the application touches.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub photos_dir: PathBuf,
    pub export_dir: PathBuf,
    pub log_path: PathBuf,
}

impl AppConfig {
    /// Resolve paths from the environment, falling back to `~/.cours-prive`
    /// for data and the working directory for exports.
    pub fn load() -> Result<Self> {
        let data_dir = match env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let export_dir = match env::var_os(EXPORT_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => env::current_dir().context("failed to read working directory")?,
        };
        Ok(Self::with_data_dir(data_dir, export_dir))
    }

    /// Build a config rooted at explicit directories.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            db_path: data_dir.join(DB_FILE_NAME),
            photos_dir: data_dir.join(PHOTOS_DIR_NAME),
            log_path: data_dir.join(LOG_FILE_NAME),
            export_dir: export_dir.into(),
            data_dir,
        }
    }

    /// Create the data, photo and export directories if they are missing.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.photos_dir, &self.export_dir] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_every_path_from_the_data_dir() {
        let config = AppConfig::with_data_dir("/srv/cours", "/tmp/out");
        assert_eq!(config.db_path, PathBuf::from("/srv/cours/data.db"));
        assert_eq!(config.photos_dir, PathBuf::from("/srv/cours/photos"));
        assert_eq!(config.log_path, PathBuf::from("/srv/cours/cours-prive.log"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn prepare_creates_directories() {
        let root = env::temp_dir().join(format!("cours-prive-config-{}", std::process::id()));
        let config = AppConfig::with_data_dir(root.join("data"), root.join("exports"));
        config.prepare().unwrap();
        assert!(config.photos_dir.is_dir());
        assert!(config.export_dir.is_dir());
        let _ = fs::remove_dir_all(&root);
    }
}
