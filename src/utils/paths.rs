//! Path Resolution
//!
//! Cross-platform locations for application data.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Application data directory (`~/.service-builder` equivalent per platform).
pub fn data_dir() -> AppResult<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| AppError::internal("Could not determine platform data directory"))?;
    Ok(base.join("service-builder"))
}

/// Path of the SQLite database file, creating the data directory if needed.
pub fn database_path() -> AppResult<PathBuf> {
    let dir = data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("service-builder.db"))
}
