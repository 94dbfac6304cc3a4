//! Destination address pool
//!
//! A plain text file, one address per line. Lines that are blank or that do
//! not carry the network prefix are skipped.

use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ledger::address::has_prefix;

pub const DEFAULT_POOL_FILE: &str = "addresses.txt";

pub fn parse_pool(content: &str, prefix: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| has_prefix(line, prefix))
        .map(str::to_string)
        .collect()
}

/// Load the pool at `path`.
///
/// Returns `None` when the file is missing or holds no usable address, in
/// which case transfers fall back to random destinations.
pub fn load_pool(path: &Path, prefix: &str) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        warn!("Address pool {} not found, using random destinations", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let pool = parse_pool(&content, prefix);

    if pool.is_empty() {
        warn!(
            "Address pool {} has no {}1... addresses, using random destinations",
            path.display(),
            prefix
        );
        return Ok(None);
    }

    info!("Loaded {} destination addresses from {}", pool.len(), path.display());
    Ok(Some(pool))
}
