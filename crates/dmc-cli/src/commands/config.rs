use crate::GlobalOpts;
use clap::Subcommand;
use colored::*;
use dmc_config::{Config, ConfigError};
use std::fs;
use std::path::Path;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    Show,
    Set {
        key: String,
        value: String,
    },
    /// Get or set the path to the config file.
    /// If `new_path` is provided, the CLI will set the config path to that value.
    /// If omitted, the CLI will print the current configuration file path.
    Path {
        /// Optional new config path to set
        new_path: Option<String>,
    },
}

pub fn handle_config(action: Option<ConfigAction>, opts: GlobalOpts) {
    let config_path = Config::path();
    dmc_logger::debug(&format!("Reading config from: {}", config_path.display()));

    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => match Config::load_from_path(&config_path) {
            Ok(config) => show_config(&config, &opts),
            Err(e) => dmc_logger::error(&format!("Failed to load config: {}", e)),
        },
        ConfigAction::Set { key, value } => match set_value(&config_path, &key, value.clone()) {
            Ok(()) => dmc_logger::success(&format!("Set {} = {}", key, value)),
            Err(e) => dmc_logger::error(&e.to_string()),
        },
        ConfigAction::Path { new_path } => match new_path {
            Some(p) => match write_pointer(&p) {
                Ok(()) => dmc_logger::success(&format!("Config path set to {}", p)),
                Err(e) => dmc_logger::error(&format!("Failed to set config path: {}", e)),
            },
            None => show_path(&config_path),
        },
    }
}

fn show_config(config: &Config, opts: &GlobalOpts) {
    println!("{}", "Configuration:".bold().green());
    if config.is_empty() {
        if opts.verbosity_level() > 0 {
            println!("  {}", "(empty, using defaults)".yellow());
        }
    } else {
        for (key, value) in config.values_iter() {
            println!("  {}: {}", key.cyan(), value);
        }
    }
    println!("  {}: {}", "effective storage-path".dimmed(), config.get_storage_path().display());
}

/// Load the file at `path`, set one key and save it back
pub fn set_value(path: &Path, key: &str, value: String) -> Result<(), ConfigError> {
    let mut config = Config::load_from_path(path)?;
    config.set(key, value)?;
    config.save_to_path(path)
}

fn write_pointer(new_path: &str) -> std::io::Result<()> {
    let default = Config::default_path();
    let Some(pointer_path) = Config::pointer_path(&default) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "default config path has no parent directory",
        ));
    };
    if let Some(parent) = pointer_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pointer_path, new_path.as_bytes())
}

fn show_path(config_path: &Path) {
    println!("{}", config_path.display());

    // If pointer file exists, also show the override
    let Some(pointer_path) = Config::pointer_path(&Config::default_path()) else {
        return;
    };
    if let Ok(contents) = fs::read_to_string(&pointer_path) {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            println!("{} {}", "overridden-by".cyan(), trimmed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("failed to create temp dir: {err}"),
        }
    }

    #[test]
    fn test_set_value_persists_known_key() {
        let dir = temp_dir();
        let path = dir.path().join("dmc.toml");

        assert!(set_value(&path, "host-port", "25570".to_string()).is_ok());
        assert!(set_value(&path, "game-mode", "survival".to_string()).is_ok());

        let loaded = Config::load_from_path(&path).unwrap_or_default();
        assert_eq!(loaded.get_host_port(), 25570);
        assert_eq!(loaded.get_game_mode(), "SURVIVAL");
    }

    #[test]
    fn test_set_value_rejects_unknown_key() {
        let dir = temp_dir();
        let path = dir.path().join("dmc.toml");

        let result = set_value(&path, "cache-path", "/tmp".to_string());
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_set_value_rejects_bad_number() {
        let dir = temp_dir();
        let path = dir.path().join("dmc.toml");
        let result = set_value(&path, "host-port", "lots".to_string());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
