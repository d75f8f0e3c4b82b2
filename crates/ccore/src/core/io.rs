//! File I/O utilities.

use crate::{CcoreError, Result};
use std::path::Path;
use tokio::fs;

/// Read a file asynchronously.
///
/// # Errors
///
/// Returns `CcoreError::Io` for I/O errors (these always bubble up).
pub async fn read_file_async(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    fs::read(path.as_ref()).await.map_err(CcoreError::Io)
}

/// Read a file synchronously.
pub fn read_file_sync(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    std::fs::read(path.as_ref()).map_err(CcoreError::Io)
}

/// Check if a file exists.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Validate that a file exists.
///
/// # Errors
///
/// Returns `CcoreError::Validation` if the file doesn't exist.
pub fn validate_file_exists(path: impl AsRef<Path>) -> Result<()> {
    if !file_exists(&path) {
        return Err(CcoreError::validation(format!(
            "File does not exist: {}",
            path.as_ref().display()
        )));
    }
    Ok(())
}
