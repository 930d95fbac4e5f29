//! Signal descriptors, excitations and operating points.
//!
//! Every piece of a [`SignalDescriptor`] is independently present or absent.
//! The processing engine derives missing pieces from whichever are present
//! and always returns new descriptors instead of patching existing ones.

use serde::{Deserialize, Serialize};

use crate::units::{Henries, Hertz};
use crate::waveform::{Waveform, WaveformLabel};

/// Scalar summary of a waveform.
///
/// `label`, `peak_to_peak` and `offset` exist for every shape. The rest is
/// filled in by the statistics engine when it can be computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Processed {
    pub label: WaveformLabel,
    pub peak_to_peak: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duty_cycle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_effective_frequency: Option<f64>,
}

impl Processed {
    /// Parametric description of an idealized shape.
    pub fn parametric(label: WaveformLabel, peak_to_peak: f64, duty_cycle: f64, offset: f64) -> Self {
        Self {
            label,
            peak_to_peak,
            offset,
            duty_cycle: Some(duty_cycle),
            dead_time: None,
            peak: None,
            rms: None,
            average: None,
            thd: None,
            effective_frequency: None,
            ac_effective_frequency: None,
        }
    }

    /// Add a dead time (seconds) to a parametric description.
    pub fn with_dead_time(mut self, dead_time: f64) -> Self {
        self.dead_time = Some(dead_time);
        self
    }
}

/// One-sided magnitude spectrum.
///
/// `frequencies[0]` is DC and `frequencies[k]` is `k` times the fundamental
/// for an untrimmed spectrum. Trimmed spectra keep a subset of those bins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Harmonics {
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

impl Harmonics {
    pub fn new(frequencies: Vec<f64>, amplitudes: Vec<f64>) -> Self {
        Self { frequencies, amplitudes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Frequency of the first non-DC bin.
    pub fn fundamental(&self) -> Option<Hertz> {
        self.frequencies.get(1).copied().map(Hertz)
    }

    /// Iterate over `(frequency, amplitude)` pairs.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies.iter().copied().zip(self.amplitudes.iter().copied())
    }
}

/// Waveform, statistics and spectrum of one electrical quantity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Waveform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<Processed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonics: Option<Harmonics>,
}

impl SignalDescriptor {
    pub fn from_waveform(waveform: Waveform) -> Self {
        Self { waveform: Some(waveform), ..Self::default() }
    }

    pub fn from_processed(processed: Processed) -> Self {
        Self { processed: Some(processed), ..Self::default() }
    }

    pub fn from_harmonics(harmonics: Harmonics) -> Self {
        Self { harmonics: Some(harmonics), ..Self::default() }
    }

    /// True when waveform, statistics and spectrum are all present.
    pub fn is_complete(&self) -> bool {
        self.waveform.is_some() && self.processed.is_some() && self.harmonics.is_some()
    }

    /// Shape label, if statistics are present.
    pub fn label(&self) -> Option<WaveformLabel> {
        self.processed.as_ref().map(|p| p.label)
    }
}

/// Excitation of a single winding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindingExcitation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub frequency: Hertz,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<SignalDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<SignalDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetizing_current: Option<SignalDescriptor>,
}

impl WindingExcitation {
    pub fn new(frequency: Hertz) -> Self {
        Self {
            name: None,
            frequency,
            current: None,
            voltage: None,
            magnetizing_current: None,
        }
    }

    pub fn with_current(mut self, current: SignalDescriptor) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_voltage(mut self, voltage: SignalDescriptor) -> Self {
        self.voltage = Some(voltage);
        self
    }
}

/// Environmental conditions of an operating point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f64,
}

fn default_ambient_temperature() -> f64 { 25.0 }

/// Excitations of every winding under one set of conditions.
///
/// Index 0 is the primary (reference) winding.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub conditions: OperatingConditions,
    #[serde(default)]
    pub excitations_per_winding: Vec<WindingExcitation>,
}

impl OperatingPoint {
    /// Primary winding excitation.
    pub fn primary(&self) -> Option<&WindingExcitation> {
        self.excitations_per_winding.first()
    }
}

/// A design value with optional bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionWithTolerance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl DimensionWithTolerance {
    pub fn nominal(value: f64) -> Self {
        Self { minimum: None, nominal: Some(value), maximum: None }
    }

    /// Single representative value: nominal, else the midpoint of the
    /// bounds, else whichever bound exists.
    pub fn resolve(&self) -> Option<f64> {
        match (self.minimum, self.nominal, self.maximum) {
            (_, Some(nominal), _) => Some(nominal),
            (Some(min), None, Some(max)) => Some((min + max) / 2.0),
            (Some(min), None, None) => Some(min),
            (None, None, Some(max)) => Some(max),
            (None, None, None) => None,
        }
    }
}

/// Requirements that drive excitation derivation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRequirements {
    pub magnetizing_inductance: DimensionWithTolerance,
    /// Primary-to-winding turns ratio for windings 1..N.
    #[serde(default)]
    pub turns_ratios: Vec<DimensionWithTolerance>,
}

impl DesignRequirements {
    /// Resolved magnetizing inductance, if any value was given.
    pub fn inductance(&self) -> Option<Henries> {
        self.magnetizing_inductance.resolve().map(Henries)
    }

    /// Resolved turns ratios; unresolvable entries are skipped.
    pub fn turns_ratio_values(&self) -> Vec<f64> {
        self.turns_ratios.iter().filter_map(|r| r.resolve()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_resolution_order() {
        let both = DimensionWithTolerance { minimum: Some(80e-6), nominal: None, maximum: Some(120e-6) };
        assert!((both.resolve().unwrap() - 100e-6).abs() < 1e-12);

        let nominal = DimensionWithTolerance { minimum: Some(1.0), nominal: Some(5.0), maximum: Some(9.0) };
        assert_eq!(nominal.resolve(), Some(5.0));

        assert_eq!(DimensionWithTolerance::default().resolve(), None);
    }

    #[test]
    fn test_excitation_json_shape() {
        let json = r#"{
            "frequency": 100000,
            "current": {
                "waveform": {"time": [0, 0.0000025, 0.00001], "data": [-5, 5, -5]}
            }
        }"#;
        let excitation: WindingExcitation = serde_json::from_str(json).unwrap();

        assert_eq!(excitation.frequency, Hertz(100_000.0));
        let current = excitation.current.unwrap();
        assert_eq!(current.waveform.unwrap().data, vec![-5.0, 5.0, -5.0]);
        assert!(current.processed.is_none());
        assert!(excitation.voltage.is_none());
    }

    #[test]
    fn test_processed_camel_case_round_trip() {
        let processed = Processed::parametric(WaveformLabel::Rectangular, 10.0, 0.25, 0.0);
        let json = serde_json::to_value(&processed).unwrap();

        assert_eq!(json["peakToPeak"], 10.0);
        assert_eq!(json["dutyCycle"], 0.25);
        assert!(json.get("rms").is_none());

        let back: Processed = serde_json::from_value(json).unwrap();
        assert_eq!(back, processed);
    }
}
