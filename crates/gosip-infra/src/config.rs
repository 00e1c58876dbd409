//! Small helper for loading TOML configuration into a `serde`-deserializable
//! struct, shared by every binary/config-driven crate in the workspace.

use crate::errors::{InfraError, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| InfraError::Config(format!("reading {}: {}", path.display(), e)))?;
    toml::from_str(&text).map_err(|e| InfraError::Config(format!("parsing {}: {}", path.display(), e)))
}
