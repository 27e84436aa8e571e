mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./mediarelay.toml",
        "~/.config/mediarelay/config.toml",
        "/etc/mediarelay/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let policy = &config.policy;
    if policy.no_compression_limit_mb <= 0.0 {
        anyhow::bail!("policy.no_compression_limit_mb must be positive");
    }
    if policy.max_input_size_mb <= policy.no_compression_limit_mb {
        anyhow::bail!(
            "policy.max_input_size_mb ({}) must exceed policy.no_compression_limit_mb ({})",
            policy.max_input_size_mb,
            policy.no_compression_limit_mb
        );
    }
    if policy.upload_attempts == 0 {
        anyhow::bail!("policy.upload_attempts must be at least 1");
    }
    if policy.resolve_attempts == 0 {
        anyhow::bail!("policy.resolve_attempts must be at least 1");
    }

    if let Some(ref dir) = policy.work_dir {
        if !dir.is_dir() {
            tracing::warn!("Work directory does not exist: {:?}", dir);
        }
    }

    if config.session.bridge_url.trim().is_empty() {
        anyhow::bail!("session.bridge_url cannot be empty");
    }

    if config.tools.probe_timeout_secs == 0 {
        anyhow::bail!("tools.probe_timeout_secs must be at least 1");
    }

    if config.session.state_timeout_secs == 0 {
        anyhow::bail!("session.state_timeout_secs must be at least 1");
    }

    Ok(())
}
