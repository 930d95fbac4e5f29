//! Power-flow tests on winding excitations.
//!
//! These decide whether the magnetizing current is centered (windings that
//! transfer power continuously, i.e. transformer operation) or carries a DC
//! bias from the winding current (inductor and flyback operation).

use crate::analysis::sampled_or_resampled;
use crate::error::{DspError, DspResult};
use crate::synthesis::standardize;
use lib_types::config::ProcessingConfig;
use lib_types::signal::{OperatingPoint, SignalDescriptor, WindingExcitation};
use lib_types::units::Hertz;
use lib_types::waveform::Waveform;

/// A winding counts as conducting where `|p|` exceeds this fraction of the
/// peak power.
const CONDUCTING_FRACTION: f64 = 0.01;

/// Fraction of non-conducting samples tolerated before a winding (or a set
/// of windings) stops counting as continuously conducting.
const IDLE_FRACTION: f64 = 0.1;

/// Voltage samples below this fraction of `max |v|` count as zero.
const ZERO_VOLTAGE_FRACTION: f64 = 0.05;

/// More zero-voltage samples than this fraction means the voltage dwells
/// at zero.
const DWELL_FRACTION: f64 = 0.02;

/// What an excitation carries, as far as power is concerned.
#[derive(Clone, Debug, PartialEq)]
pub enum Conduction {
    /// Voltage only: transformer operation.
    VoltageOnly,
    /// Current only: inductor operation.
    CurrentOnly,
    /// Instantaneous power `v * i` on the canonical grid.
    Power(Vec<f64>),
}

fn sampled_signal(signal: &SignalDescriptor, frequency: Hertz, config: &ProcessingConfig) -> DspResult<Waveform> {
    let signal = standardize(signal, frequency, config)?;
    let waveform = signal.waveform.ok_or(DspError::UnresolvableSignal)?;
    sampled_or_resampled(&waveform, frequency, config)
}

/// Instantaneous power of an excitation, when it has both signals.
pub fn conduction(excitation: &WindingExcitation, config: &ProcessingConfig) -> DspResult<Conduction> {
    let (current, voltage) = match (&excitation.current, &excitation.voltage) {
        (None, _) => return Ok(Conduction::VoltageOnly),
        (Some(_), None) => return Ok(Conduction::CurrentOnly),
        (Some(current), Some(voltage)) => (current, voltage),
    };

    let current = sampled_signal(current, excitation.frequency, config)?;
    let voltage = sampled_signal(voltage, excitation.frequency, config)?;
    if current.len() != voltage.len() {
        return Err(DspError::LengthMismatch { expected: current.len(), actual: voltage.len() });
    }

    Ok(Conduction::Power(
        current.data.iter().zip(&voltage.data).map(|(i, v)| i * v).collect(),
    ))
}

fn peak(power: &[f64]) -> f64 {
    power.iter().copied().fold(f64::MIN, f64::max)
}

/// True when the winding transfers power for (almost) the whole period.
pub fn is_continuously_conducting_power(excitation: &WindingExcitation, config: &ProcessingConfig) -> DspResult<bool> {
    let power = match conduction(excitation, config)? {
        Conduction::VoltageOnly => return Ok(true),
        Conduction::CurrentOnly => return Ok(false),
        Conduction::Power(power) => power,
    };

    let threshold = peak(&power) * CONDUCTING_FRACTION;
    let idle = power.iter().filter(|p| p.abs() < threshold).count();
    Ok(idle as f64 <= power.len() as f64 * IDLE_FRACTION)
}

/// True when every winding of the operating point conducts at the same
/// instants, as in a forward-type transformer.
pub fn is_instantaneously_conducting_power(point: &OperatingPoint, config: &ProcessingConfig) -> DspResult<bool> {
    let mut powers = Vec::with_capacity(point.excitations_per_winding.len());
    for excitation in &point.excitations_per_winding {
        match conduction(excitation, config)? {
            Conduction::VoltageOnly => return Ok(true),
            Conduction::CurrentOnly => return Ok(false),
            Conduction::Power(power) => powers.push(power),
        }
    }

    let Some(first) = powers.first() else {
        return Err(DspError::MissingExcitation);
    };
    if let Some(other) = powers.iter().find(|p| p.len() != first.len()) {
        return Err(DspError::LengthMismatch { expected: first.len(), actual: other.len() });
    }

    let threshold = powers.iter().map(|p| peak(p)).fold(0.0, f64::max) * CONDUCTING_FRACTION;
    let mismatched = (0..first.len())
        .filter(|&i| {
            powers
                .windows(2)
                .any(|pair| (pair[0][i].abs() > threshold) != (pair[1][i].abs() > threshold))
        })
        .count();

    Ok(mismatched as f64 <= first.len() as f64 * IDLE_FRACTION)
}

/// True when the sampled voltage spends a noticeable part of the period
/// at zero (dead time or discontinuous conduction).
pub fn has_zero_voltage_dwell(sampled_voltage: &Waveform) -> bool {
    let maximum = sampled_voltage.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let near_zero = sampled_voltage
        .data
        .iter()
        .filter(|v| v.abs() < maximum * ZERO_VOLTAGE_FRACTION)
        .count();
    near_zero as f64 > sampled_voltage.len() as f64 * DWELL_FRACTION
}

/// Whether the magnetizing current should carry the winding current's DC
/// level: the primary voltage never dwells at zero and the windings do
/// not all conduct together.
pub fn include_dc_offset(point: &OperatingPoint, config: &ProcessingConfig) -> DspResult<bool> {
    let primary = point.primary().ok_or(DspError::MissingExcitation)?;
    let voltage = primary.voltage.as_ref().ok_or(DspError::MissingSignal("voltage"))?;
    let voltage = sampled_signal(voltage, primary.frequency, config)?;

    let include = !has_zero_voltage_dwell(&voltage) && !is_instantaneously_conducting_power(point, config)?;
    tracing::debug!(include, "DC offset into magnetizing current");
    Ok(include)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excitation(current: Waveform, voltage: Waveform) -> WindingExcitation {
        WindingExcitation::new(Hertz(100e3))
            .with_current(SignalDescriptor::from_waveform(current))
            .with_voltage(SignalDescriptor::from_waveform(voltage))
    }

    fn square(high: f64, low: f64) -> Waveform {
        Waveform::new(vec![0.0, 0.0, 5e-6, 5e-6, 1e-5], vec![low, high, high, low, low])
    }

    #[test]
    fn test_single_signal_excitations() {
        let config = ProcessingConfig::default();
        let voltage_only = WindingExcitation::new(Hertz(100e3)).with_voltage(SignalDescriptor::from_waveform(square(1.0, -1.0)));
        let current_only = WindingExcitation::new(Hertz(100e3)).with_current(SignalDescriptor::from_waveform(square(1.0, -1.0)));

        assert!(is_continuously_conducting_power(&voltage_only, &config).unwrap());
        assert!(!is_continuously_conducting_power(&current_only, &config).unwrap());
    }

    #[test]
    fn test_in_phase_square_waves_conduct_continuously() {
        let config = ProcessingConfig::default();
        let forward = excitation(square(2.0, -2.0), square(10.0, -10.0));

        assert!(is_continuously_conducting_power(&forward, &config).unwrap());
    }

    #[test]
    fn test_half_period_current_is_not_continuous() {
        let config = ProcessingConfig::default();
        let flyback = excitation(square(2.0, 0.0), square(10.0, -10.0));

        assert!(!is_continuously_conducting_power(&flyback, &config).unwrap());
    }

    #[test]
    fn test_windings_conducting_in_turns() {
        let config = ProcessingConfig::default();
        let primary = excitation(square(2.0, 0.0), square(10.0, -10.0));
        let secondary = excitation(square(0.0, 2.0), square(-10.0, 10.0));
        let point = OperatingPoint {
            excitations_per_winding: vec![primary.clone(), secondary],
            ..OperatingPoint::default()
        };

        assert!(!is_instantaneously_conducting_power(&point, &config).unwrap());
        assert!(include_dc_offset(&point, &config).unwrap());

        let together = OperatingPoint {
            excitations_per_winding: vec![primary.clone(), primary],
            ..OperatingPoint::default()
        };
        assert!(is_instantaneously_conducting_power(&together, &config).unwrap());
    }

    #[test]
    fn test_zero_voltage_dwell() {
        let with_dwell: Vec<f64> = (0..128).map(|i| if i < 60 { 5.0 } else if i < 70 { 0.0 } else { -5.0 }).collect();
        let without: Vec<f64> = (0..128).map(|i| if i < 64 { 5.0 } else { -5.0 }).collect();
        let period = lib_types::units::Seconds(1e-5);

        assert!(has_zero_voltage_dwell(&Waveform::equidistant(with_dwell, period)));
        assert!(!has_zero_voltage_dwell(&Waveform::equidistant(without, period)));
    }
}
