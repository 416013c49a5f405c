//! Loading the configured zone file off disk, async all the way down
//! so it composes with the rest of startup without blocking the
//! runtime.

use std::path::Path;

use dns_resolver::zone::{Zone, ZoneError};

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Zone(ZoneError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "could not read zone file: {err}"),
            LoadError::Zone(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Read and parse the zone file at `path`.
///
/// # Errors
///
/// If the file cannot be read, or does not parse as a valid zone.
pub async fn zone_from_file(path: &Path) -> Result<Zone, LoadError> {
    let data = tokio::fs::read_to_string(path).await.map_err(LoadError::Io)?;
    Zone::from_str(&data).map_err(LoadError::Zone)
}
