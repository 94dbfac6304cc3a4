//! Seed loading
//!
//! Seeds come from, in order of preference:
//! 1. a seed file with one phrase per line (multi-wallet mode)
//! 2. an environment variable holding a single phrase
//! 3. a masked interactive prompt

use dialoguer::Password;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ledger::Seed;

/// Parse a seed file body: one phrase per line, blank lines and `#` comments skipped
pub fn parse_seed_file(content: &str) -> Result<Vec<Seed>> {
    content
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(i, line)| {
            Seed::new(line).map_err(|e| Error::InvalidSeed(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

/// Read seeds from `path`, refusing files other users can read
pub fn load_seed_file(path: &Path) -> Result<Vec<Seed>> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Seed file {} has insecure permissions {:o}. Run 'chmod 600 {}'",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read seed file {}: {}", path.display(), e)))?;
    let seeds = parse_seed_file(&content)?;
    if seeds.is_empty() {
        return Err(Error::MissingSeed(format!(
            "seed file {} contains no seed phrases",
            path.display()
        )));
    }

    info!("Loaded {} seed(s) from {}", seeds.len(), path.display());
    Ok(seeds)
}

/// Single seed from the environment, `None` when unset or blank
pub fn seed_from_env(var: &str) -> Result<Option<Seed>> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            debug!("Using seed from ${}", var);
            Seed::new(&value).map(Some)
        }
        _ => Ok(None),
    }
}

/// Ask for a seed phrase without echoing it
pub fn prompt_seed() -> Result<Seed> {
    let phrase = Password::new()
        .with_prompt("Enter your seed phrase")
        .interact()
        .map_err(|e| Error::MissingSeed(format!("no seed entered: {}", e)))?;
    Seed::new(&phrase)
}

/// Resolve every configured seed.
///
/// With `all_wallets` the seed file is required; otherwise the first source
/// that yields a seed wins and only one seed is returned.
pub fn load_seeds(
    mnemonic_env: &str,
    mnemonic_file: Option<&Path>,
    all_wallets: bool,
    interactive: bool,
) -> Result<Vec<Seed>> {
    if let Some(path) = mnemonic_file {
        if path.exists() {
            let mut seeds = load_seed_file(path)?;
            if !all_wallets {
                seeds.truncate(1);
            }
            return Ok(seeds);
        }
        if all_wallets {
            return Err(Error::Config(format!(
                "seed file {} not found",
                path.display()
            )));
        }
    } else if all_wallets {
        return Err(Error::Config(
            "multi-wallet mode needs wallets.mnemonic_file".to_string(),
        ));
    }

    if let Some(seed) = seed_from_env(mnemonic_env)? {
        return Ok(vec![seed]);
    }

    if interactive {
        return Ok(vec![prompt_seed()?]);
    }

    Err(Error::MissingSeed(format!(
        "set ${} or wallets.mnemonic_file",
        mnemonic_env
    )))
}
