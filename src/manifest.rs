//! Configuration file parsing for checkup
//!
//! Parses the service list from YAML (`check_up.yml`) or TOML files using
//! serde. The format is picked from the file extension.

use crate::check::ServiceSpec;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Load and validate configuration from a file
pub fn load(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let manifest = match Format::from_path(path) {
        Format::Toml => Manifest::from_toml(&content)?,
        Format::Yaml => Manifest::from_yaml(&content)?,
    };
    manifest.validate()?;

    Ok(manifest)
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    /// `.toml` is TOML, everything else is YAML
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Yaml,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Service definitions
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

impl Manifest {
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty YAML document is a null, not a mapping
        if content.trim().is_empty() {
            return Ok(Self { services: Vec::new() });
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    ///
    /// Duplicate names are allowed: each entry is checked independently.
    pub fn validate(&self) -> Result<()> {
        for (idx, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(Error::ConfigValidation(format!(
                    "Service #{} has an empty name",
                    idx + 1
                )));
            }

            if service.name.chars().any(char::is_control) {
                return Err(Error::ConfigValidation(format!(
                    "Service #{} name {:?} contains control characters",
                    idx + 1,
                    service.name
                )));
            }

            if service.command.trim().is_empty() {
                return Err(Error::ConfigValidation(format!(
                    "Service '{}' has an empty command",
                    service.name
                )));
            }

            if service.timeout == 0 {
                return Err(Error::ConfigValidation(format!(
                    "Service '{}' timeout must be at least 1 second",
                    service.name
                )));
            }
        }

        Ok(())
    }

    /// Pick the services to check
    ///
    /// No names selects everything in file order. Otherwise services come in
    /// the order named, with every entry matching a name included. A name
    /// matching nothing is an error.
    pub fn select(&self, names: &[String]) -> Result<Vec<ServiceSpec>> {
        if names.is_empty() {
            return Ok(self.services.clone());
        }

        let mut selected = Vec::new();
        for name in names {
            let before = selected.len();
            selected.extend(self.services.iter().filter(|s| &s.name == name).cloned());
            if selected.len() == before {
                return Err(Error::UnknownService(name.clone()));
            }
        }

        Ok(selected)
    }
}
