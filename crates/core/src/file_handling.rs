//! Reading and writing the shell configuration file.

use std::fs::File;
use std::path::Path;

use log::debug;

use crate::config::ShellConfig;
use crate::error::{Error, Result};

fn get_reader(file_description: &str, path: &str) -> Result<File> {
    File::open(path)
        .map_err(|e| Error::io_error(file_description.to_string(), path.to_string(), e))
}

/// Loads the shell configuration from a YAML file.
///
/// A missing file is not an error: the defaults are returned instead. Keys
/// absent from the file keep their default value.
///
/// # Errors
///
/// Returns an error if:
/// - The file exists but cannot be read
/// - The file contains invalid YAML or unknown value types
///
/// # Examples
///
/// ```no_run
/// use shell_facade_core::file_handling::get_shell_config;
///
/// let config = get_shell_config("~/.shell-facade/config.yml")?;
/// println!("silent: {}", config.silent);
/// # Ok::<(), shell_facade_core::error::Error>(())
/// ```
pub fn get_shell_config(config_path: &str) -> Result<ShellConfig> {
    if !Path::exists(Path::new(config_path)) {
        debug!("No config at `{config_path}`, using defaults");
        return Ok(ShellConfig::default());
    }

    let config_reader = get_reader("config", config_path)?;

    serde_yaml::from_reader(config_reader).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "config".to_string(),
            config_path.to_string(),
            e,
        )
    })
}

/// Writes the shell configuration to a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or serialization fails.
pub fn write_shell_config(path: &str, config: &ShellConfig) -> Result<()> {
    let f = File::create(path)
        .map_err(|e| Error::io_error("config".to_string(), path.to_string(), e))?;

    serde_yaml::to_writer(f, config).map_err(|e| {
        Error::yaml_error(
            "writing".to_string(),
            "config".to_string(),
            path.to_string(),
            e,
        )
    })
}
