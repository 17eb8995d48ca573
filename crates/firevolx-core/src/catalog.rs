//! Read-only catalog of known robots.
//!
//! The dashboard's settings store owns the robot list; the bridge only reads
//! it to resolve a robot id into a [`ConnectTarget`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ConnectTarget;

/// Catalog error.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    #[error("Device {0} has no host address")]
    MissingHost(String),
}

/// One robot known to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    /// Host name or IP address of the robot.
    #[serde(default, alias = "ip_address")]
    pub host: Option<String>,
    #[serde(default)]
    pub location: String,
    /// Remote-shell port, when the robot does not listen on 23.
    #[serde(default)]
    pub port: Option<u16>,
    /// Default login name for the robot.
    #[serde(default)]
    pub username: Option<String>,
}

/// Device catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCatalog {
    #[serde(default, rename = "robots")]
    devices: Vec<DeviceRecord>,
}

impl DeviceCatalog {
    /// Default catalog location (`<config_dir>/firevolx/devices.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("firevolx").join("devices.toml"))
    }

    /// The dashboard's factory-default robots.
    #[must_use]
    pub fn builtin() -> Self {
        let robot = |id: &str, name: &str, location: &str, host: &str| DeviceRecord {
            id: id.into(),
            name: name.into(),
            host: Some(host.into()),
            location: location.into(),
            port: None,
            username: None,
        };
        Self {
            devices: vec![
                robot("RBT-001", "Patrol Robot Alpha", "Production Line A", "192.168.1.100"),
                robot("RBT-002", "Patrol Robot Beta", "Manufacturing Floor", "192.168.1.101"),
                robot("RBT-003", "Patrol Robot Gamma", "Storage Area B", "192.168.1.102"),
            ],
        }
    }

    /// Parse a catalog from TOML text.
    ///
    /// # Errors
    /// Returns error if the text is not a valid catalog.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a catalog file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), devices = catalog.devices.len(), "Loaded device catalog");
        Ok(catalog)
    }

    /// Load the default catalog file, or the built-in robots if there is none.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self, CatalogError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::builtin()),
        }
    }

    /// All records, in file order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// Find a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Resolve a record into a connect target.
    ///
    /// `username` overrides the record's default login name.
    ///
    /// # Errors
    /// Returns error if the id is unknown or the record has no host.
    pub fn target_for(
        &self,
        id: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<ConnectTarget, CatalogError> {
        let record = self
            .get(id)
            .ok_or_else(|| CatalogError::UnknownDevice(id.to_string()))?;
        let host = record
            .host
            .clone()
            .ok_or_else(|| CatalogError::MissingHost(id.to_string()))?;

        Ok(ConnectTarget {
            host,
            port: record.port,
            username: username
                .map(str::to_string)
                .or_else(|| record.username.clone())
                .unwrap_or_default(),
            password: password.map(str::to_string),
        })
    }
}
