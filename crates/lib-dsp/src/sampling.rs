//! Uniform resampling of piecewise-linear waveforms.
//!
//! Spectral analysis needs one period on a uniform grid with a power-of-two
//! point count. `sample` maps any corner-based waveform onto that grid:
//! sample `i` sits at `i * T / N` and the closing point at `T` is omitted.
//!
//! At a repeated time value (a vertical jump) the sample takes the value
//! *before* the jump.

use crate::error::{DspError, DspResult};
use lib_types::config::ProcessingConfig;
use lib_types::units::{Hertz, Seconds};
use lib_types::waveform::{linspace, Waveform};

/// Relative disagreement tolerated between a supplied frequency and the
/// waveform's own period.
const FREQUENCY_TOLERANCE: f64 = 0.01;

/// Check the structural invariants of a waveform.
pub fn validate(waveform: &Waveform) -> DspResult<()> {
    if waveform.time.len() != waveform.data.len() {
        return Err(DspError::LengthMismatch {
            expected: waveform.time.len(),
            actual: waveform.data.len(),
        });
    }
    if waveform.len() < 2 {
        return Err(DspError::InsufficientData { needed: 2, got: waveform.len() });
    }
    if !waveform.is_finite() {
        return Err(DspError::NonFinite("waveform".to_string()));
    }
    if let Some(i) = waveform.time.windows(2).position(|w| w[1] < w[0]) {
        return Err(DspError::NonMonotonicTime(i + 1));
    }
    Ok(())
}

/// Relative deviation of a time step from the mean step still accepted as
/// a uniform grid.
const SPACING_TOLERANCE: f64 = 0.01;

/// Evenly spaced time axis, one entry per value.
fn is_uniform(waveform: &Waveform) -> bool {
    let time = &waveform.time;
    let n = time.len();
    if n < 2 || n != waveform.data.len() {
        return false;
    }
    let step = (time[n - 1] - time[0]) / (n - 1) as f64;
    step > 0.0
        && time
            .windows(2)
            .all(|w| ((w[1] - w[0]) - step).abs() <= SPACING_TOLERANCE * step)
}

/// True for waveforms already on the canonical grid: exactly
/// `number_points` evenly spaced samples, or an imported capture.
pub fn is_sampled(waveform: &Waveform, config: &ProcessingConfig) -> bool {
    (waveform.len() == config.number_points && is_uniform(waveform)) || is_imported(waveform, config)
}

/// True for evenly spaced captures longer than the canonical grid with a
/// power-of-two length.
pub fn is_imported(waveform: &Waveform, config: &ProcessingConfig) -> bool {
    waveform.len() > config.number_points && waveform.len().is_power_of_two() && is_uniform(waveform)
}

/// Period of the waveform.
///
/// Sampled waveforms omit their closing point, so one sample step is added
/// back to the span.
pub fn period_of(waveform: &Waveform, config: &ProcessingConfig) -> Seconds {
    let n = waveform.time.len();
    if n >= 2 && is_sampled(waveform, config) {
        let step = waveform.time[n - 1] - waveform.time[n - 2];
        Seconds(waveform.time[n - 1] + step - waveform.time[0])
    } else {
        waveform.span()
    }
}

/// Point count used when resampling a waveform of `len` points.
pub fn target_points(len: usize, config: &ProcessingConfig) -> usize {
    if len > config.number_points {
        len.next_power_of_two()
    } else {
        config.number_points
    }
}

/// Resample one period onto the uniform grid.
///
/// With no `frequency` the waveform's own period defines the grid. A
/// supplied frequency must agree with the period within 1 %.
pub fn sample(
    waveform: &Waveform,
    frequency: Option<Hertz>,
    config: &ProcessingConfig,
) -> DspResult<Waveform> {
    validate(waveform)?;

    let period = period_of(waveform, config);
    if period.0 <= 0.0 {
        return Err(DspError::InsufficientData { needed: 2, got: 1 });
    }

    let own_frequency = period.to_frequency();
    let frequency = match frequency {
        Some(f) => {
            if (own_frequency.0 - f.0).abs() / f.0 > FREQUENCY_TOLERANCE {
                return Err(DspError::FrequencyMismatch {
                    frequency: f.0,
                    waveform_frequency: own_frequency.0,
                });
            }
            f
        }
        None => own_frequency,
    };

    let n = target_points(waveform.len(), config);
    if is_sampled(waveform, config) && waveform.len() == n {
        return Ok(waveform.clone());
    }

    let mut time = linspace(0.0, frequency.to_period().0, n + 1);
    time.pop();

    let start = waveform.time[0];
    let data = time
        .iter()
        .enumerate()
        .map(|(i, &t)| value_at(waveform, start + t).ok_or(DspError::SamplingFailed(i)))
        .collect::<DspResult<Vec<f64>>>()?;

    tracing::trace!(from = waveform.len(), to = n, frequency = frequency.0, "Resampled waveform");

    Ok(Waveform::new(time, data))
}

/// Value of the piecewise-linear waveform at `t`, pre-jump at corners.
fn value_at(waveform: &Waveform, t: f64) -> Option<f64> {
    let time = &waveform.time;
    let data = &waveform.data;
    let last = time.len() - 1;

    for k in 0..last {
        if t > time[k + 1] && k + 1 != last {
            continue;
        }
        if time[k] > t {
            return None;
        }
        if time[k + 1] == time[k] {
            return Some(data[k]);
        }
        let fraction = (t - time[k]) / (time[k + 1] - time[k]);
        return Some(data[k] + (data[k + 1] - data[k]) * fraction);
    }
    None
}
