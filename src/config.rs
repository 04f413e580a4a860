use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the vorbis-tag library.
///
/// Controls what is kept when reading a tag, how the comment block is
/// written, and output behavior (dry run, backups).
///
/// # Loading
///
/// ```rust,no_run
/// use vorbis_tag::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.write.enable_padding = true;
/// config.output.backup_originals = false;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// What to keep when decoding a comment block.
    pub read: ReadConfig,
    /// How comment blocks are written.
    pub write: WriteConfig,
    /// Output behavior (dry run, backups).
    pub output: OutputConfig,
}

/// Read-side switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Keep keys with no canonical mapping as additional fields.
    pub read_all_fields: bool,
    /// Decode embedded picture bytes.
    pub read_pictures: bool,
}

/// Write-side switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Append 2048 zero bytes of padding after the fields.
    pub enable_padding: bool,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// If `true`, preview what would be written without modifying any files.
    pub dry_run: bool,
    /// If `true`, create a `.bak` backup before modifying a file.
    pub backup_originals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read: ReadConfig {
                read_all_fields: true,
                read_pictures: true,
            },
            write: WriteConfig {
                enable_padding: false,
            },
            output: OutputConfig {
                dry_run: false,
                backup_originals: true,
            },
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
