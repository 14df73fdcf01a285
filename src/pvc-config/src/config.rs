use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ConfigError;

/// env var pointing to the operator configuration file
pub const CONFIG_ENV: &str = "PVC_AUTOSCALER_CONFIG";

/// How size suffixes without `i` (`M`, `G`, `T`) are treated.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BareUnitPolicy {
    /// `M`, `G`, `T` mean the same as `Mi`, `Gi`, `Ti`
    #[default]
    Alias,
    /// bare units are a configuration error
    Reject,
}

/// Values used when an autoscaler resource leaves a field out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AutoscaleDefaults {
    pub threshold_percent: f64,
    pub cooldown_seconds: u64,
    /// period of the reconcile timer
    pub interval_seconds: u64,
}

impl Default for AutoscaleDefaults {
    fn default() -> Self {
        Self {
            threshold_percent: 75.0,
            cooldown_seconds: 300,
            interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ManualResizeConfig {
    pub retry_delay_seconds: u64,
}

impl Default for ManualResizeConfig {
    fn default() -> Self {
        Self {
            retry_delay_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OperatorConfig {
    #[serde(skip)]
    pub path: Option<PathBuf>,
    /// namespace to watch, all namespaces if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub bare_units: BareUnitPolicy,
    pub autoscale: AutoscaleDefaults,
    pub manual_resize: ManualResizeConfig,
}

impl OperatorConfig {
    /// load from file named by `PVC_AUTOSCALER_CONFIG`, or defaults if unset
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                debug!("{} not set, using default configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())?;
        let mut config: Self = serde_yaml::from_reader(file)?;
        config.path = Some(path.as_ref().to_path_buf());
        config.validate()?;
        debug!("loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.autoscale.threshold_percent;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold-percent must be between 0 and 100, got {threshold}"
            )));
        }
        if self.autoscale.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "interval-seconds must be greater than zero".to_owned(),
            ));
        }
        if matches!(&self.namespace, Some(ns) if ns.is_empty()) {
            return Err(ConfigError::Invalid("namespace must not be empty".to_owned()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.autoscale.interval_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.manual_resize.retry_delay_seconds)
    }
}
