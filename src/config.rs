// Persistence configuration
// A persistence.toml file declares named profiles; a session factory is
// opened against one of them:
//
//   [profiles.movies]
//   dataset = "data/movies.json"
//   show_sql = true

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up when none is given
pub const DEFAULT_CONFIG_FILE: &str = "persistence.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// One named data store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// JSON dump the store is loaded from; relative paths are resolved
    /// against the directory of the config file
    pub dataset: PathBuf,

    /// Log every query text at INFO level
    #[serde(default)]
    pub show_sql: bool,
}

impl PersistenceConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml(&text, base_dir)
    }

    pub fn from_toml(text: &str, base_dir: &Path) -> Result<Self> {
        let mut config: PersistenceConfig = toml::from_str(text)?;
        for profile in config.profiles.values_mut() {
            if profile.dataset.is_relative() {
                profile.dataset = base_dir.join(&profile.dataset);
            }
        }
        Ok(config)
    }

    pub fn profile(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| Error::UnknownProfile(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [profiles.movies]
        dataset = "data/movies.json"
        show_sql = true

        [profiles.archive]
        dataset = "/srv/archive.json"
    "#;

    #[test]
    fn test_profiles_resolve_relative_paths() {
        let config = PersistenceConfig::from_toml(CONFIG, Path::new("/etc/moviedb")).unwrap();

        let movies = config.profile("movies").unwrap();
        assert_eq!(movies.dataset, PathBuf::from("/etc/moviedb/data/movies.json"));
        assert!(movies.show_sql);

        let archive = config.profile("archive").unwrap();
        assert_eq!(archive.dataset, PathBuf::from("/srv/archive.json"));
        assert!(!archive.show_sql);
    }

    #[test]
    fn test_unknown_profile() {
        let config = PersistenceConfig::from_toml(CONFIG, Path::new(".")).unwrap();
        assert!(matches!(
            config.profile("maConfig"),
            Err(Error::UnknownProfile(name)) if name == "maConfig"
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            PersistenceConfig::from_toml("[profiles.movies]\nshow_sql = 1", Path::new(".")),
            Err(Error::Toml(_))
        ));
    }
}
