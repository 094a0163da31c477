//! Evaluation settings and throttling presets.

use serde::{Deserialize, Serialize};

/// How load timing should be derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottlingMethod {
    /// Run the discrete-event simulation under the configured link.
    Simulate,
    /// Trust the observed trace as-is (environment already throttled).
    Provided,
}

/// A named throttling condition: link characteristics plus CPU slowdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottlingPreset {
    pub rtt_ms: f64,
    pub throughput_kbps: f64,
    pub cpu_slowdown_multiplier: f64,
}

impl ThrottlingPreset {
    /// Slow 4G on a mid-tier mobile device, the default condition.
    pub const MOBILE_SLOW_4G: ThrottlingPreset = ThrottlingPreset {
        rtt_ms: 150.0,
        throughput_kbps: 1_638.4,
        cpu_slowdown_multiplier: 4.0,
    };

    /// Regular 3G, a harsher condition used for stress comparisons.
    pub const MOBILE_REGULAR_3G: ThrottlingPreset = ThrottlingPreset {
        rtt_ms: 300.0,
        throughput_kbps: 700.0,
        cpu_slowdown_multiplier: 4.0,
    };

    /// Link throughput in bytes per second.
    pub fn throughput_bytes_per_sec(&self) -> f64 {
        kbps_to_bytes_per_sec(self.throughput_kbps)
    }
}

/// Settings for one evaluation.
///
/// `rtt_ms`/`throughput_kbps` override the preset-derived link when given;
/// otherwise the engine falls back to [`ThrottlingPreset::MOBILE_SLOW_4G`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub throttling_method: ThrottlingMethod,
    pub cpu_slowdown_multiplier: f64,
    #[serde(default)]
    pub rtt_ms: Option<f64>,
    #[serde(default)]
    pub throughput_kbps: Option<f64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let preset = ThrottlingPreset::MOBILE_SLOW_4G;
        Self {
            throttling_method: ThrottlingMethod::Simulate,
            cpu_slowdown_multiplier: preset.cpu_slowdown_multiplier,
            rtt_ms: None,
            throughput_kbps: None,
        }
    }
}

impl SimulationSettings {
    /// Effective RTT after applying overrides.
    pub fn effective_rtt_ms(&self) -> f64 {
        self.rtt_ms.unwrap_or(ThrottlingPreset::MOBILE_SLOW_4G.rtt_ms)
    }

    /// Effective throughput in bytes per second after applying overrides.
    pub fn effective_throughput_bytes_per_sec(&self) -> f64 {
        kbps_to_bytes_per_sec(
            self.throughput_kbps
                .unwrap_or(ThrottlingPreset::MOBILE_SLOW_4G.throughput_kbps),
        )
    }
}

/// Kilobits per second to bytes per second.
pub fn kbps_to_bytes_per_sec(kbps: f64) -> f64 {
    kbps * 1024.0 / 8.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_slow_4g() {
        let settings = SimulationSettings::default();
        assert_eq!(settings.throttling_method, ThrottlingMethod::Simulate);
        assert_eq!(settings.effective_rtt_ms(), 150.0);
        assert!((settings.effective_throughput_bytes_per_sec() - 209_715.2).abs() < 1e-9);
    }

    #[test]
    fn overrides_take_precedence() {
        let settings = SimulationSettings {
            rtt_ms: Some(40.0),
            throughput_kbps: Some(10_240.0),
            ..SimulationSettings::default()
        };
        assert_eq!(settings.effective_rtt_ms(), 40.0);
        assert_eq!(settings.effective_throughput_bytes_per_sec(), 1_310_720.0);
    }
}
