use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Runtime configuration for the rotation daemon, loaded once at startup.
///
/// Every field has a default, so a partial file (or no file at all) still
/// yields a usable configuration. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub rotation: RotationSection,
    pub resilience: ResilienceSection,
    pub network: NetworkSection,
    pub chromium: ChromiumSection,
    pub observability: ObservabilitySection,
}

impl KioskConfig {
    /// Strict load: parse errors and invariant violations surface to the
    /// caller. Used by `kioskctl check`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let config: KioskConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                source,
                path: path.to_path_buf(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Lenient load for the daemon: any failure falls back to the built-in
    /// defaults with a logged warning. Startup never fails on a bad config.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %err,
                    "failed to load config, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rotation = &self.rotation;
        if rotation.min_interval_secs <= 0.0 || rotation.stay_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "rotation intervals must be positive".to_string(),
            ));
        }
        if rotation.min_interval_secs > rotation.stay_interval_secs
            || rotation.stay_interval_secs > rotation.max_interval_secs
        {
            return Err(ConfigError::Invalid(format!(
                "interval bounds violated: min {} <= stay {} <= max {} does not hold",
                rotation.min_interval_secs, rotation.stay_interval_secs, rotation.max_interval_secs
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationSection {
    /// Seconds to remain on each loaded page. Seed value only: once running,
    /// the adaptive pacer owns the live interval.
    pub stay_interval_secs: f64,
    pub adaptive: bool,
    pub min_interval_secs: f64,
    pub max_interval_secs: f64,
    /// Uniform random delay between consecutive URL visits, milliseconds.
    pub visit_delay_ms: [u64; 2],
    /// Persist a metrics snapshot every N completed cycles.
    pub snapshot_every_cycles: u64,
}

impl Default for RotationSection {
    fn default() -> Self {
        Self {
            stay_interval_secs: 90.0,
            adaptive: true,
            min_interval_secs: 30.0,
            max_interval_secs: 180.0,
            visit_delay_ms: [1000, 3000],
            snapshot_every_cycles: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceSection {
    pub max_retries: usize,
    pub max_browser_restarts: u32,
    pub memory_check_period_secs: u64,
    pub max_memory_percent: f64,
    /// Pause between stopping a crashed browser and starting a fresh one,
    /// so the OS can finish tearing the old process down.
    pub restart_settle_secs: u64,
    pub page_load_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Settle time after navigation completes before the page is inspected.
    pub post_load_wait_secs: u64,
}

impl Default for ResilienceSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_browser_restarts: 5,
            memory_check_period_secs: 300,
            max_memory_percent: 80.0,
            restart_settle_secs: 5,
            page_load_timeout_secs: 30,
            probe_timeout_secs: 10,
            post_load_wait_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Proxy endpoints rotated one position per browser (re)start.
    pub proxies: Vec<String>,
    pub user_agents: Vec<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            user_agents: vec![
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    /// Explicit chromium binary; autodetected from PATH when absent.
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilitySection {
    /// Snapshot destination, overwritten on every persist.
    pub metrics_path: PathBuf,
    pub failure_log: PathBuf,
    pub telemetry_db: PathBuf,
}

impl Default for ObservabilitySection {
    fn default() -> Self {
        Self {
            metrics_path: PathBuf::from("logs/kiosk_metrics.json"),
            failure_log: PathBuf::from("logs/failures.log"),
            telemetry_db: PathBuf::from("logs/telemetry.sqlite"),
        }
    }
}
