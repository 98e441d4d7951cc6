use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Load a previously written JSON file. A missing file yields `None`; a
/// corrupt one is logged and also yields `None`, so a botched earlier run
/// never wedges the next one.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("discarding corrupt {}: {e}", path.display());
            None
        }
    }
}

/// Write a value as pretty JSON, overwriting whatever is there.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}
