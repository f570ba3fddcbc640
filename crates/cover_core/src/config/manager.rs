//! Config manager for loading, saving, and atomic updates.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};
use tracing::{debug, info};

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file and the in-memory settings.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Create a manager for `config_path`. Nothing is read until `load()`
    /// or `load_or_create()`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Changes stay in memory until `save()` or `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file. Errors if the file does not exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load config from file, writing defaults if it doesn't exist.
    ///
    /// Files with unknown tables or missing keys are rewritten with the
    /// cleaned-up settings.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = parse_and_clean(&content)?;
            self.settings = settings;

            if was_modified {
                debug!("Rewriting {} with defaults", self.config_path.display());
                self.save()?;
            }
        } else {
            info!("Creating default config at {}", self.config_path.display());
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Create the logs and download folders.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        for dir in [self.logs_folder(), self.download_folder()] {
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    pub fn download_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.download_folder)
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Rewrite one section atomically.
    ///
    /// Re-reads the file so edits to other tables (and their comments)
    /// survive.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_doc: DocumentMut = self.section_toml(section)?.parse()?;
        doc[section.table_name()] = Item::Table(section_doc.as_table().clone());

        self.atomic_write(&doc.to_string())?;
        Ok(())
    }

    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let content = match section {
            ConfigSection::Backend => toml::to_string_pretty(&self.settings.backend)?,
            ConfigSection::Identity => toml::to_string_pretty(&self.settings.identity)?,
            ConfigSection::Polling => toml::to_string_pretty(&self.settings.polling)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
            ConfigSection::Paths => toml::to_string_pretty(&self.settings.paths)?,
        };
        Ok(content)
    }

    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();
        output.push_str("# Cover Studio configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n",
        );

        for section in ConfigSection::ALL {
            output.push('\n');
            output.push_str(section.comment());
            output.push('\n');
            output.push_str(&format!("[{}]\n", section.table_name()));
            for line in self.section_toml(section)?.lines() {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;
        Ok(())
    }
}

/// Parse settings and report whether the file needs rewriting.
fn parse_and_clean(content: &str) -> ConfigResult<(Settings, bool)> {
    let doc: DocumentMut = content.parse()?;
    let settings: Settings = toml::from_str(content)?;

    let has_unknown = doc.iter().any(|(key, _)| {
        !ConfigSection::ALL
            .iter()
            .any(|section| section.table_name() == key)
    });

    let missing_keys = ConfigSection::ALL.iter().any(|section| {
        let present = doc.get(section.table_name()).and_then(Item::as_table);
        match (settings_table(&settings, *section), present) {
            (toml::Value::Table(expected), Some(present)) => {
                expected.keys().any(|key| !present.contains_key(key))
            }
            _ => true,
        }
    });

    Ok((settings, has_unknown || missing_keys))
}

fn settings_table(settings: &Settings, section: ConfigSection) -> toml::Value {
    let value = match section {
        ConfigSection::Backend => toml::Value::try_from(&settings.backend),
        ConfigSection::Identity => toml::Value::try_from(&settings.identity),
        ConfigSection::Polling => toml::Value::try_from(&settings.polling),
        ConfigSection::Logging => toml::Value::try_from(&settings.logging),
        ConfigSection::Paths => toml::Value::try_from(&settings.paths),
    };
    value.unwrap_or_else(|_| toml::Value::Table(toml::Table::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("cover-studio.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[backend]"));
        assert!(content.contains("[identity]"));
        assert!(content.contains("[polling]"));
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cover-studio.toml");
        fs::write(&config_path, "[identity]\nuser_id = \"111\"\nartist = \"lee\"\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().identity.user_id, "111");
        assert_eq!(manager.settings().identity.artist, "lee");
        // Missing sections were filled in on disk
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[polling]"));
        assert!(content.contains("user_id = \"111\""));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cover-studio.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        manager.settings_mut().identity.artist = "lee".to_string();
        manager.settings_mut().backend.timeout_secs = 5;
        manager.update_section(ConfigSection::Identity).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("artist = \"lee\""));
        // Backend was not written
        assert!(content.contains("timeout_secs = 120"));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cover-studio.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(!config_path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn unknown_tables_trigger_rewrite() {
        let defaults = ConfigManager::new("unused.toml")
            .generate_config_with_comments()
            .unwrap();
        let (_, modified) = parse_and_clean(&defaults).unwrap();
        assert!(!modified);

        let with_extra = format!("{}\n[legacy]\nkey = 1\n", defaults);
        let (_, modified) = parse_and_clean(&with_extra).unwrap();
        assert!(modified);
    }

    #[test]
    fn ensure_dirs_creates_folders() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("cover-studio.toml"));
        manager.settings_mut().paths.logs_folder =
            dir.path().join("logs").to_string_lossy().to_string();
        manager.settings_mut().paths.download_folder =
            dir.path().join("dl").to_string_lossy().to_string();

        manager.ensure_dirs_exist().unwrap();

        assert!(dir.path().join("logs").is_dir());
        assert!(dir.path().join("dl").is_dir());
    }
}
