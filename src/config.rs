//! Engine configuration.
//!
//! Every tunable in the tick pipeline lives here: drift rates and
//! ambient targets, classifier thresholds, controller setpoints, and the
//! remote reasoning endpoint. Defaults reproduce the stock greenhouse;
//! a TOML file can override any subset.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, TwinResult};

/// Drift simulation parameters.
///
/// Environment fields mean-revert toward their ambient target at `*_rate`
/// per tick, plus uniform noise bounded by `*_noise`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Reversion rate toward ambient targets per tick, in [0, 1].
    pub reversion_rate: f64,
    /// Ambient temperature target, degrees Celsius.
    pub temp_target: f64,
    /// Temperature noise bound, +/- degrees per tick.
    pub temp_noise: f64,
    /// Ambient humidity target, percent.
    pub humidity_target: f64,
    /// Humidity noise bound, +/- percent per tick.
    pub humidity_noise: f64,
    /// Ambient CO2 target, ppm.
    pub co2_target: f64,
    /// CO2 noise bound, +/- ppm per tick.
    pub co2_noise: f64,
    /// Ambient light target, lux.
    pub light_target: f64,
    /// Light noise bound, +/- lux per tick.
    pub light_noise: f64,
    /// Soil moisture lost per tick to evaporation.
    pub soil_dry_rate: f64,
    /// Soil moisture gained per tick while the valve is open.
    pub soil_wet_gain: f64,
    /// Ambient zone-light target, percent.
    pub zone_light_target: f64,
    /// Zone-light noise bound, +/- percent per tick.
    pub zone_light_noise: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            reversion_rate: 0.05,
            temp_target: 22.0,
            temp_noise: 0.3,
            humidity_target: 55.0,
            humidity_noise: 1.5,
            co2_target: 420.0,
            co2_noise: 5.0,
            light_target: 8000.0,
            light_noise: 100.0,
            soil_dry_rate: 0.008,
            soil_wet_gain: 0.15,
            zone_light_target: 70.0,
            zone_light_noise: 2.0,
        }
    }
}

/// Zone classifier thresholds, checked in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Soil moisture below this is `dry`.
    pub dry_below: f64,
    /// Soil moisture above this is `wet`.
    pub wet_above: f64,
    /// Light percent below this is `shaded`.
    pub shaded_below: f64,
    /// Health score below this is `stressed`.
    pub stressed_below: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            dry_below: 0.30,
            wet_above: 0.85,
            shaded_below: 20.0,
            stressed_below: 0.4,
        }
    }
}

/// Rule controller setpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Temperature above which the fan ramps up, degrees Celsius.
    pub fan_comfort_c: f64,
    /// Degrees of excess temperature for full fan power.
    pub fan_full_span_c: f64,
    /// Humidity above which the vent opens, percent.
    pub vent_open_pct: f64,
    /// Percent of excess humidity for a fully open vent.
    pub vent_full_span_pct: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            fan_comfort_c: 24.0,
            fan_full_span_c: 10.0,
            vent_open_pct: 70.0,
            vent_full_span_pct: 30.0,
        }
    }
}

/// Remote reasoning endpoint settings.
///
/// `api_url` and `api_key` empty means "not configured" and the engine
/// uses local rules only, mirroring the dry-run behavior of the original
/// client. Environment variables `GREENTWIN_API_URL`, `GREENTWIN_API_KEY`
/// and `GREENTWIN_MODEL` override the file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Endpoint URL for the vision/reasoning model.
    pub api_url: String,
    /// Bearer token for the endpoint.
    pub api_key: String,
    /// Model name sent in the request body.
    pub model: String,
    /// Per-call timeout in milliseconds; the single bounded attempt.
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            model: "cosmos-reason-2".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl RemoteConfig {
    /// True if both URL and key are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }

    /// The per-call timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Applies `GREENTWIN_API_URL` / `GREENTWIN_API_KEY` /
    /// `GREENTWIN_MODEL` overrides from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GREENTWIN_API_URL") {
            let url = url.trim().to_string();
            if !url.is_empty() {
                self.api_url = url;
            }
        }
        if let Ok(key) = std::env::var("GREENTWIN_API_KEY") {
            let key = key.trim().to_string();
            if !key.is_empty() {
                self.api_key = key;
            }
        }
        if let Ok(model) = std::env::var("GREENTWIN_MODEL") {
            let model = model.trim().to_string();
            if !model.is_empty() {
                self.model = model;
            }
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    /// Drift simulation parameters.
    pub drift: DriftConfig,
    /// Zone classifier thresholds.
    pub classifier: ClassifierConfig,
    /// Rule controller setpoints.
    pub controller: ControllerConfig,
    /// Remote reasoning endpoint.
    pub remote: RemoteConfig,
}

impl TwinConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Missing sections and keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MalformedJson`-style errors for unreadable
    /// or unparseable files.
    pub fn load(path: &Path) -> TwinResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SchemaError::MalformedJson {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| SchemaError::MalformedJson {
            reason: format!("cannot parse {}: {e}", path.display()),
        })?;
        Ok(config)
    }
}
