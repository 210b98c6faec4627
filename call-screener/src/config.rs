//! Configuration management for the call screener.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub harvest: HarvestConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether screening is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Our own package; its UI is never harvested
    #[serde(default = "default_own_package")]
    pub own_package: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
            own_package: default_own_package(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay after ring start before the first screen scan
    #[serde(default = "default_scan_delay")]
    pub scan_delay_ms: u64,

    /// Hard ceiling after which the call is allowed
    #[serde(default = "default_ceiling")]
    pub ceiling_ms: u64,

    /// Ceiling used by the caller-ID app scanner
    #[serde(default = "default_vendor_ceiling")]
    pub vendor_ceiling_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scan_delay_ms: default_scan_delay(),
            ceiling_ms: default_ceiling(),
            vendor_ceiling_ms: default_vendor_ceiling(),
        }
    }
}

impl TimingConfig {
    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }

    pub fn vendor_ceiling(&self) -> Duration {
        Duration::from_millis(self.vendor_ceiling_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Enable the caller-ID app scanner
    #[serde(default = "default_true")]
    pub vendor_enabled: bool,

    /// Package of the caller-ID app
    #[serde(default = "default_vendor_package")]
    pub vendor_package: String,

    /// Display name of the caller-ID app, never taken as a caller name
    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,

    /// Packages whose windows are scanned first (supports wildcards)
    #[serde(default = "default_call_app_packages")]
    pub call_app_packages: Vec<String>,

    /// Maximum node tree depth walked per window
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            vendor_enabled: true,
            vendor_package: default_vendor_package(),
            vendor_name: default_vendor_name(),
            call_app_packages: default_call_app_packages(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database
    #[serde(default)]
    pub db_path: Option<String>,
}

impl StorageConfig {
    /// Configured database path, or the per-user data directory
    pub fn resolved_db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => PathBuf::from(path),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("call-screener")
                .join("screener.db"),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_own_package() -> String {
    "com.spam_blocker".to_string()
}

fn default_scan_delay() -> u64 {
    5000
}

fn default_ceiling() -> u64 {
    10000
}

fn default_vendor_ceiling() -> u64 {
    6000
}

fn default_vendor_package() -> String {
    "com.truecaller".to_string()
}

fn default_vendor_name() -> String {
    "truecaller".to_string()
}

fn default_max_depth() -> usize {
    100
}

fn default_call_app_packages() -> Vec<String> {
    vec![
        // Dialers
        "com.android.dialer".to_string(),
        "com.google.android.dialer".to_string(),
        "com.samsung.android.dialer".to_string(),
        "com.oneplus.dialer".to_string(),
        // Caller ID
        "com.truecaller".to_string(),
        // In-call UI and OEM call services
        "com.android.incallui".to_string(),
        "com.sec.android.app.callsetting".to_string(),
        "com.miui.securitycenter".to_string(),
        "com.xiaomi.xmsf".to_string(),
    ]
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("call-screener")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
