// SPDX-License-Identifier: MIT

//! Persisted client identifier sent as `X-Plex-Client-Identifier` so this
//! pipeline shows up once, stably, in Plex's "known devices" list instead
//! of re-registering a new device on every invocation.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceIdentityError {
    #[error("failed to read device identity file: {0}")]
    Read(std::io::Error),
    #[error("failed to write device identity file: {0}")]
    Write(#[from] std::io::Error),
}

/// Load the persisted identifier, generating and persisting a fresh one on
/// first run. The file holds a bare UUID string, no trailing newline.
pub fn load_or_create(path: &Path) -> Result<String, DeviceIdentityError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DeviceIdentityError::Read(e)),
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &id)?;
    Ok(id)
}
