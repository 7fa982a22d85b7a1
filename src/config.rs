//! Configuration for the extension binaries.
//!
//! One TOML file configures all backends; each binary reads only the
//! section it needs. The path comes from `--config`, the
//! `PROVIDER_EXT_CONFIG` environment variable, or the packaged default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/provider-extensions.toml";

/// Top-level configuration, one section per backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    pub ipa: IpaConfig,
    pub ess: EssConfig,
    pub slurm: SlurmConfig,
    pub sync: SyncConfig,
}

impl ExtensionConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ExtensionConfig = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// FreeIPA identity server connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpaConfig {
    /// Hostname of the FreeIPA server.
    pub server: String,

    /// Account used for the session login.
    pub username: String,

    pub password: String,

    /// Verify the server TLS certificate. Lab deployments commonly run
    /// with a self-signed certificate.
    pub verify_tls: bool,

    /// API version string embedded in every JSON-RPC call.
    pub api_version: String,
}

impl Default for IpaConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            verify_tls: true,
            api_version: "2.245".to_string(),
        }
    }
}

/// Spectrum Scale (ESS/GPFS) management server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EssConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,

    /// Seconds to wait for an asynchronous management job before giving
    /// up and reporting a timeout.
    pub job_timeout_secs: u64,
}

impl Default for EssConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 443,
            username: "admin".to_string(),
            password: String::new(),
            verify_tls: true,
            job_timeout_secs: 15,
        }
    }
}

/// Slurm CLI settings. Executable names are overridable so tests can
/// point at fake binaries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlurmConfig {
    pub sacctmgr: String,
    pub sshare: String,
    pub sacct: String,
    pub scancel: String,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            sacctmgr: "sacctmgr".to_string(),
            sshare: "sshare".to_string(),
            sacct: "sacct".to_string(),
            scancel: "scancel".to_string(),
        }
    }
}

/// Account-database replication settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding the system account files (normally `/etc`).
    pub system_dir: String,

    /// Directory holding the immutable base copies of the account files.
    pub base_dir: String,

    /// Polling interval for watch mode, in seconds.
    pub interval_secs: u64,

    /// Stop after this many consecutive failed cycles in watch mode.
    pub max_consecutive_failures: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            system_dir: "/etc".to_string(),
            base_dir: "/etc/provider-extensions".to_string(),
            interval_secs: 5,
            max_consecutive_failures: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtensionConfig::default();
        assert_eq!(config.ipa.api_version, "2.245");
        assert!(config.ipa.verify_tls);
        assert_eq!(config.ess.port, 443);
        assert_eq!(config.ess.job_timeout_secs, 15);
        assert_eq!(config.slurm.sacctmgr, "sacctmgr");
        assert_eq!(config.sync.interval_secs, 5);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let text = r#"
            [ipa]
            server = "ipa.example.com"
            password = "secret"

            [ess]
            job_timeout_secs = 30
        "#;
        let config: ExtensionConfig = toml::from_str(text).unwrap();
        assert_eq!(config.ipa.server, "ipa.example.com");
        assert_eq!(config.ipa.username, "admin");
        assert_eq!(config.ess.job_timeout_secs, 30);
        assert_eq!(config.slurm.scancel, "scancel");
    }
}
