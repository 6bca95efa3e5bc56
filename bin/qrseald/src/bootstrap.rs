//! Startup checks run before any store is opened.

use crate::config::ServerConfig;

/// Verify the configuration is usable. Fails fast with a readable
/// message instead of limping into runtime errors.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.jwt.secret.len() < 16 {
        anyhow::bail!("jwt.secret must be at least 16 characters");
    }

    let origin = config.payload.origin.trim_end_matches('/');
    match origin.split_once("://") {
        Some((scheme, host)) if !scheme.is_empty() && !host.is_empty() && !host.contains('/') => {}
        _ => anyhow::bail!(
            "payload.origin must be scheme://host with no path, got {:?}",
            config.payload.origin
        ),
    }

    if config.artifacts.base_url.split_once("://").is_none() {
        anyhow::bail!(
            "artifacts.base_url must be an absolute URL, got {:?}",
            config.artifacts.base_url
        );
    }

    if config.workers.count == 0 {
        anyhow::bail!("workers.count must be at least 1");
    }

    Ok(())
}
