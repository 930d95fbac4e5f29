//! Processing knobs shared by every engine call.

use serde::{Deserialize, Serialize};

/// Settings threaded explicitly through waveform processing.
///
/// Treat a value as read-only for the duration of a batch; results are only
/// reproducible between calls that share the same settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Canonical resample count (power of two).
    #[serde(default = "default_number_points")]
    pub number_points: usize,

    /// Harmonic trim/prune threshold, relative to the reference harmonic.
    #[serde(default = "default_harmonic_threshold")]
    pub harmonic_threshold: f64,

    /// Trim the spectrum of imported (oversampled) waveforms.
    #[serde(default = "default_true")]
    pub trim_harmonics: bool,

    /// Relative slope change that makes a corner during compression.
    #[serde(default = "default_compression_tolerance")]
    pub compression_tolerance: f64,

    /// Maximum normalized fit error accepted for a sinusoid.
    #[serde(default = "default_sinusoid_tolerance")]
    pub sinusoid_tolerance: f64,
}

fn default_number_points() -> usize { 128 }
fn default_harmonic_threshold() -> f64 { 0.05 }
fn default_true() -> bool { true }
fn default_compression_tolerance() -> f64 { 0.01 }
fn default_sinusoid_tolerance() -> f64 { 0.05 }

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            number_points: default_number_points(),
            harmonic_threshold: default_harmonic_threshold(),
            trim_harmonics: true,
            compression_tolerance: default_compression_tolerance(),
            sinusoid_tolerance: default_sinusoid_tolerance(),
        }
    }
}

impl ProcessingConfig {
    /// Copy with trimming switched on or off.
    pub fn with_trim(mut self, trim_harmonics: bool) -> Self {
        self.trim_harmonics = trim_harmonics;
        self
    }

    /// Time tolerance used when matching corner positions: one and a half
    /// resample steps of the given period.
    #[inline]
    pub fn corner_tolerance(&self, period: f64) -> f64 {
        1.5 * period / self.number_points as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ProcessingConfig = serde_json::from_str(r#"{"trim_harmonics": false}"#).unwrap();

        assert_eq!(config.number_points, 128);
        assert!(!config.trim_harmonics);
        assert!((config.harmonic_threshold - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_corner_tolerance() {
        let config = ProcessingConfig::default();
        // 1.5 * 10us / 128
        assert!((config.corner_tolerance(1e-5) - 1.171_875e-7).abs() < 1e-15);
    }
}
