//! Scalar descriptors of a waveform.
//!
//! Two levels of detail are produced:
//!
//! - [`basic_processed`]: label, offset, peak-to-peak, peak, duty cycle and
//!   (for sampled input) the average. Needs only the waveform.
//! - [`processed`]: adds RMS, THD and the effective frequencies, which need
//!   the harmonic spectrum of the same waveform.
//!
//! Recognized shapes use closed-form offset and duty-cycle rules read off
//! their corners; `Custom` shapes fall back to numerical estimates.

use crate::classify::classify;
use crate::compress::compress;
use crate::error::{ensure_finite, DspError, DspResult};
use crate::sampling::{is_sampled, sample, validate};
use lib_types::config::ProcessingConfig;
use lib_types::signal::{Harmonics, Processed};
use lib_types::units::Hertz;
use lib_types::waveform::{Waveform, WaveformLabel};

/// Fraction of the maximum above which a sample counts as "on".
const ON_THRESHOLD: f64 = 0.05;

/// Inferred duty cycles at or beyond these bounds are re-estimated by
/// counting "on" samples.
const DUTY_CYCLE_EDGE: f64 = 0.03;

/// DC component implied by a shape, read from its corner layout.
pub fn offset_for(label: WaveformLabel, corners: &Waveform) -> f64 {
    let data = &corners.data;
    let midpoint = (corners.max() + corners.min()) / 2.0;

    match label {
        WaveformLabel::Triangular => match (data.first(), data.get(1)) {
            (Some(first), Some(second)) => (first + second) / 2.0,
            _ => midpoint,
        },
        WaveformLabel::UnipolarTriangular | WaveformLabel::UnipolarRectangular => corners.min(),
        WaveformLabel::Rectangular
        | WaveformLabel::BipolarRectangular
        | WaveformLabel::BipolarTriangular => 0.0,
        WaveformLabel::FlybackPrimary => data.get(1).copied().unwrap_or(midpoint),
        WaveformLabel::FlybackSecondary => data.get(3).copied().unwrap_or(midpoint),
        _ => midpoint,
    }
}

/// `(t[b] - t[a]) / (t[d] - t[c])`, if the layout has those corners.
fn span_ratio(time: &[f64], (a, b): (usize, usize), (c, d): (usize, usize)) -> Option<f64> {
    let numerator = time.get(b)? - time.get(a)?;
    let denominator = time.get(d)? - time.get(c)?;
    (denominator != 0.0).then(|| numerator / denominator)
}

/// Duty cycle of a shape.
///
/// `corners` is the corner layout the label was recognized from. Labels
/// without a closed form, and layouts that do not have the corners the
/// label implies, are estimated numerically.
pub fn duty_cycle(label: WaveformLabel, corners: &Waveform, config: &ProcessingConfig) -> DspResult<f64> {
    let time = &corners.time;
    let closed_form = match label {
        WaveformLabel::Triangular => span_ratio(time, (0, 1), (0, 2)),
        WaveformLabel::UnipolarTriangular => span_ratio(time, (0, 1), (0, 3)),
        WaveformLabel::FlybackSecondary if time.len() == 4 => span_ratio(time, (0, 2), (0, 3)),
        WaveformLabel::Rectangular
        | WaveformLabel::UnipolarRectangular
        | WaveformLabel::FlybackPrimary
        | WaveformLabel::FlybackSecondary => span_ratio(time, (0, 2), (0, 4)),
        WaveformLabel::BipolarRectangular => span_ratio(time, (2, 3), (0, 9)),
        WaveformLabel::BipolarTriangular => span_ratio(time, (1, 2), (0, 5)),
        WaveformLabel::Sinusoidal => Some(0.5),
        _ => None,
    };

    match closed_form {
        Some(duty) => Ok(duty),
        None => custom_duty_cycle(corners, config),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Duty cycle of an arbitrary shape.
///
/// The sharpest bend of the resampled waveform (largest second difference,
/// ties resolved toward the middle of the period) marks the end of the
/// "on" phase. Results at the very edges of the period are replaced by the
/// fraction of samples above 5 % of the maximum.
pub fn custom_duty_cycle(waveform: &Waveform, config: &ProcessingConfig) -> DspResult<f64> {
    let sampled = if is_sampled(waveform, config) {
        waveform.clone()
    } else {
        sample(waveform, None, config)?
    };
    let data = &sampled.data;
    if data.len() < 3 {
        return Err(DspError::InsufficientData { needed: 3, got: data.len() });
    }

    let diff: Vec<f64> = data.windows(2).map(|w| round_to(w[1] - w[0], 9)).collect();
    let bend: Vec<f64> = diff.windows(2).map(|w| round_to(w[1] - w[0], 9).abs()).collect();

    let sharpest = bend.iter().copied().fold(f64::MIN, f64::max);
    let middle = config.number_points as f64 / 2.0;
    let mut edge_index = 0;
    let mut distance_to_middle = f64::MAX;
    for (i, &value) in bend.iter().enumerate() {
        let distance = (middle - i as f64).abs();
        if value == sharpest && distance < distance_to_middle {
            distance_to_middle = distance;
            edge_index = i;
        }
    }

    let duty = round_to((edge_index as f64 + 1.0) / config.number_points as f64, 2);
    if duty > DUTY_CYCLE_EDGE && duty < 1.0 - DUTY_CYCLE_EDGE {
        return Ok(duty);
    }

    let threshold = sampled.max() * ON_THRESHOLD;
    let on = data[..data.len() - 1].iter().filter(|&&v| v >= threshold).count();
    Ok(on as f64 / data.len() as f64)
}

/// Label, offset, peak-to-peak, peak and duty cycle of a waveform.
///
/// Sampled waveforms are compressed to their corners first and also get
/// their sample mean as `average`.
pub fn basic_processed(waveform: &Waveform, config: &ProcessingConfig) -> DspResult<Processed> {
    validate(waveform)?;

    let sampled_input = is_sampled(waveform, config);
    let corners = if sampled_input {
        compress(waveform, config.compression_tolerance)?
    } else {
        waveform.clone()
    };

    let label = classify(waveform, config)?;
    let offset = offset_for(label, &corners);

    let mut peak_to_peak = corners.max() - corners.min();
    if label.is_baseline_referenced() {
        peak_to_peak -= offset;
    }

    let duty = duty_cycle(label, &corners, config)?;
    tracing::debug!(%label, corners = corners.len(), peak_to_peak, duty, "Classified waveform");

    let mut processed = Processed::parametric(label, peak_to_peak, duty, offset);
    processed.peak = Some(corners.peak());
    if sampled_input {
        processed.average = Some(waveform.mean());
    }

    ensure_finite(processed.peak_to_peak, "peak-to-peak")?;
    ensure_finite(processed.offset, "offset")?;
    ensure_finite(duty, "duty cycle")?;
    Ok(processed)
}

/// Full statistics of a waveform, given the spectrum of its resample.
///
/// When `existing` is given its label and shape parameters are kept and
/// only the spectral and integral quantities are refreshed.
pub fn processed(
    harmonics: &Harmonics,
    waveform: &Waveform,
    existing: Option<&Processed>,
    config: &ProcessingConfig,
) -> DspResult<Processed> {
    validate(waveform)?;

    let sampled = if is_sampled(waveform, config) {
        waveform.clone()
    } else {
        sample(waveform, harmonics.fundamental(), config)?
    };
    processed_with_resample(harmonics, waveform, &sampled, existing, config)
}

/// Like [`processed`], with the resample of `waveform` already at hand.
///
/// Shape parameters come from `waveform` itself (its corners when it has
/// them); RMS and the peak fallback come from `sampled`.
pub fn processed_with_resample(
    harmonics: &Harmonics,
    waveform: &Waveform,
    sampled: &Waveform,
    existing: Option<&Processed>,
    config: &ProcessingConfig,
) -> DspResult<Processed> {
    let sampled_input = is_sampled(waveform, config);
    let mut result = match existing {
        Some(processed) => processed.clone(),
        None => basic_processed(waveform, config)?,
    };

    let average = if sampled_input {
        waveform.mean()
    } else {
        trapezoid_average(waveform)
    };

    result.average = Some(ensure_finite(average, "average")?);
    result.rms = Some(ensure_finite(rms(&sampled.data), "rms")?);
    result.thd = Some(ensure_finite(thd(harmonics), "thd")?);
    result.effective_frequency = Some(ensure_finite(effective_frequency(harmonics, false), "effective frequency")?);
    result.ac_effective_frequency = Some(ensure_finite(effective_frequency(harmonics, true), "AC effective frequency")?);
    if result.peak.is_none() {
        result.peak = Some(sampled.peak());
    }

    Ok(result)
}

/// Time average over the span, trapezoidal rule.
pub fn trapezoid_average(waveform: &Waveform) -> f64 {
    let period = waveform.span().0;
    if period == 0.0 {
        return waveform.mean();
    }
    let area: f64 = waveform
        .time
        .windows(2)
        .zip(waveform.data.windows(2))
        .map(|(t, d)| (d[0] + d[1]) / 2.0 * (t[1] - t[0]))
        .sum();
    area / period
}

/// Root mean square of uniform samples.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|v| v * v).sum::<f64>() / samples.len() as f64).sqrt()
}

/// `sqrt(sum(a_k^2, k >= 2)) / a_1`; zero without a fundamental.
pub fn thd(harmonics: &Harmonics) -> f64 {
    let fundamental = harmonics.amplitudes.get(1).copied().unwrap_or(0.0);
    if fundamental <= 0.0 {
        return 0.0;
    }
    let distortion: f64 = harmonics.amplitudes.iter().skip(2).map(|a| a * a).sum();
    distortion.sqrt() / fundamental
}

/// Amplitude-weighted RMS frequency, `sqrt(sum(a^2 f^2) / sum(a^2))`.
///
/// With `ac_only` the DC bin is left out. Zero for an empty spectrum.
pub fn effective_frequency(harmonics: &Harmonics, ac_only: bool) -> f64 {
    let skip = usize::from(ac_only);
    let (weighted, total) = harmonics
        .bins()
        .skip(skip)
        .fold((0.0, 0.0), |(weighted, total), (f, a)| {
            let energy = a * a;
            (weighted + energy * f * f, total + energy)
        });
    if total > 0.0 {
        (weighted / total).sqrt()
    } else {
        0.0
    }
}

/// Excursion of the "on" samples (magnitude above 5 % of the maximum).
pub fn ac_ripple(waveform: &Waveform, config: &ProcessingConfig) -> DspResult<f64> {
    let sampled = if is_sampled(waveform, config) {
        waveform.clone()
    } else {
        sample(waveform, None, config)?
    };

    let threshold = sampled.max() * ON_THRESHOLD;
    let (low, high) = sampled
        .data
        .iter()
        .filter(|v| v.abs() > threshold)
        .fold((f64::MAX, f64::MIN), |(low, high), &v| (low.min(v), high.max(v)));

    if low > high {
        return Ok(0.0);
    }
    Ok(high - low)
}

/// Resample to the canonical count unless already there.
fn canonical(waveform: &Waveform, frequency: Hertz, config: &ProcessingConfig) -> DspResult<Waveform> {
    if waveform.len() == config.number_points {
        Ok(waveform.clone())
    } else {
        sample(waveform, Some(frequency), config)
    }
}

/// Mean of `|v * i|` over one period.
pub fn instantaneous_power(
    voltage: &Waveform,
    current: &Waveform,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<f64> {
    let voltage = canonical(voltage, frequency, config)?;
    let current = canonical(current, frequency, config)?;
    if voltage.len() != current.len() {
        return Err(DspError::LengthMismatch { expected: voltage.len(), actual: current.len() });
    }

    let total: f64 = voltage.data.iter().zip(&current.data).map(|(v, i)| (v * i).abs()).sum();
    ensure_finite(total / voltage.len() as f64, "instantaneous power")
}

/// Ratio between the RMS voltage and the volt-seconds of the first half
/// period, `2 * Vrms / (f * integral)`. About 4.44 for a sinusoid and 4 for
/// a square wave.
pub fn waveform_coefficient(
    voltage: &Waveform,
    frequency: Hertz,
    voltage_rms: f64,
    config: &ProcessingConfig,
) -> DspResult<f64> {
    let sampled = if voltage.len() < config.number_points {
        sample(voltage, Some(frequency), config)?
    } else {
        voltage.clone()
    };

    let n = sampled.len();
    let step = frequency.to_period().0 / n as f64;
    let half = &sampled.data[..n - n / 2];
    let integral: f64 = half.windows(2).map(|w| (w[1] - w[0]).abs() / 2.0 + w[0]).sum::<f64>() * step;

    ensure_finite(2.0 * voltage_rms / (frequency.0 * integral), "waveform coefficient")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::units::Seconds;

    #[test]
    fn test_basic_processed_triangular() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(vec![0.0, 2.5e-6, 1e-5], vec![-5.0, 5.0, -5.0]);

        let processed = basic_processed(&wf, &config).unwrap();

        assert_eq!(processed.label, WaveformLabel::Triangular);
        assert!((processed.peak_to_peak - 10.0).abs() < 1e-12);
        assert!(processed.offset.abs() < 1e-12);
        assert!((processed.duty_cycle.unwrap() - 0.25).abs() < 1e-12);
        assert!((processed.peak.unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_duty_cycle_follows_sharpest_bend() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(
            vec![0.0, 2.5e-6, 4.2e-6, 7.5e-6, 1e-5],
            vec![0.0, 3.0, 8.0, 3.0, 0.0],
        );

        let processed = basic_processed(&wf, &config).unwrap();

        assert_eq!(processed.label, WaveformLabel::Custom);
        assert_eq!(processed.duty_cycle, Some(0.42));
    }

    #[test]
    fn test_flyback_offset_and_baseline_peak_to_peak() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(vec![0.0, 0.0, 5e-6, 5e-6, 1e-5], vec![0.0, 2.0, 12.0, 0.0, 0.0]);

        let processed = basic_processed(&wf, &config).unwrap();

        assert_eq!(processed.label, WaveformLabel::FlybackPrimary);
        assert_eq!(processed.offset, 2.0);
        assert!((processed.peak_to_peak - 10.0).abs() < 1e-12);
        assert!((processed.duty_cycle.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_effective_frequency_of_pure_sine_is_fundamental() {
        let harmonics = Harmonics::new(vec![0.0, 100e3, 200e3], vec![0.0, 3.0, 0.0]);

        assert_eq!(effective_frequency(&harmonics, false), 100e3);
        assert_eq!(effective_frequency(&harmonics, true), 100e3);
        assert_eq!(thd(&harmonics), 0.0);
    }

    #[test]
    fn test_dc_only_spectrum_has_no_distortion() {
        let harmonics = Harmonics::new(vec![0.0, 100e3], vec![2.0, 0.0]);

        assert_eq!(thd(&harmonics), 0.0);
        assert_eq!(effective_frequency(&harmonics, false), 0.0);
        assert_eq!(effective_frequency(&harmonics, true), 0.0);
    }

    #[test]
    fn test_trapezoid_average_of_offset_triangle() {
        let wf = Waveform::new(vec![0.0, 5e-6, 1e-5], vec![0.0, 4.0, 0.0]);
        assert!((trapezoid_average(&wf) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ac_ripple_ignores_idle_samples() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(vec![0.0, 0.0, 5e-6, 5e-6, 1e-5], vec![0.0, 2.0, 12.0, 0.0, 0.0]);

        let ripple = ac_ripple(&wf, &config).unwrap();

        // First "on" sample sits one step into the ramp.
        assert!((ripple - 10.0).abs() < 0.2);
    }

    #[test]
    fn test_waveform_coefficient_of_square_wave() {
        let config = ProcessingConfig::default();
        let data: Vec<f64> = (0..128).map(|i| if i < 64 { 1.0 } else { -1.0 }).collect();
        let period = Seconds::from_us(10.0);
        let time = (0..128).map(|i| i as f64 * period.0 / 128.0).collect();
        let wf = Waveform::new(time, data);

        let coefficient = waveform_coefficient(&wf, period.to_frequency(), 1.0, &config).unwrap();

        assert!((coefficient - 256.0 / 63.0).abs() < 1e-9);
    }

    #[test]
    fn test_instantaneous_power_of_in_phase_signals() {
        let config = ProcessingConfig::default();
        let voltage = Waveform::new(vec![0.0, 0.0, 5e-6, 5e-6, 1e-5], vec![-10.0, 10.0, 10.0, -10.0, -10.0]);
        let current = Waveform::new(vec![0.0, 0.0, 5e-6, 5e-6, 1e-5], vec![-2.0, 2.0, 2.0, -2.0, -2.0]);

        let power = instantaneous_power(&voltage, &current, Hertz(100e3), &config).unwrap();

        assert!((power - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_basic_processed_rejects_nan() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(vec![0.0, 1e-5], vec![f64::NAN, 1.0]);

        assert!(matches!(basic_processed(&wf, &config), Err(DspError::NonFinite(_))));
    }
}
