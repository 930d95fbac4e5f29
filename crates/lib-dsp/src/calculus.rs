//! Differentiation and periodic integration of waveforms.
//!
//! `v = L di/dt` turns a winding current into the induced voltage;
//! `i = (1/L) ∫ v dt` turns an applied voltage into the magnetizing current.

use crate::analysis::{describe, describe_sampled, sampled_or_resampled};
use crate::compress::compress;
use crate::error::{ensure_finite, DspError, DspResult};
use crate::power::is_continuously_conducting_power;
use crate::sampling::{is_sampled, period_of, sample, validate};
use crate::statistics::{ac_ripple, basic_processed, trapezoid_average};
use crate::synthesis::{create_waveform, standardize, ShapeParameters};
use lib_types::config::ProcessingConfig;
use lib_types::signal::{Processed, SignalDescriptor, WindingExcitation};
use lib_types::units::Henries;
use lib_types::waveform::{Waveform, WaveformLabel};

/// Rate of change of a waveform.
///
/// Sampled input keeps its grid: sample `i` holds the forward difference
/// towards sample `i + 1`, wrapping around the period. Corner input
/// becomes a staircase with one flat step per sloped segment.
///
/// Zero-duration segments (vertical jumps) are skipped, not turned into a
/// narrow spike: the result steps straight from the slope before the jump
/// to the slope after it, and the jump's own contribution is dropped.
pub fn derivative(waveform: &Waveform, config: &ProcessingConfig) -> DspResult<Waveform> {
    validate(waveform)?;

    if is_sampled(waveform, config) {
        let n = waveform.len();
        let step = waveform.time[n - 1] - waveform.time[n - 2];
        let mut data = Vec::with_capacity(n);
        for i in 0..n {
            let (next_time, next_value) = if i + 1 < n {
                (waveform.time[i + 1], waveform.data[i + 1])
            } else {
                (waveform.time[i] + step, waveform.data[0])
            };
            let dt = next_time - waveform.time[i];
            let rate = if dt > 0.0 {
                (next_value - waveform.data[i]) / dt
            } else {
                data.last().copied().unwrap_or(0.0)
            };
            data.push(rate);
        }
        return Ok(Waveform::new(waveform.time.clone(), data));
    }

    let mut time = Vec::with_capacity(2 * waveform.len());
    let mut data = Vec::with_capacity(2 * waveform.len());
    for (t, d) in waveform.time.windows(2).zip(waveform.data.windows(2)) {
        let dt = t[1] - t[0];
        if dt == 0.0 {
            continue;
        }
        let rate = (d[1] - d[0]) / dt;
        time.extend_from_slice(&[t[0], t[1]]);
        data.extend_from_slice(&[rate, rate]);
    }

    let (Some(&first_time), Some(&last_rate)) = (time.first(), data.last()) else {
        return Err(DspError::InsufficientData { needed: 2, got: 0 });
    };
    // Close the period with the jump back to the first step.
    time.insert(0, first_time);
    data.insert(0, last_rate);

    Ok(Waveform::new(time, data))
}

/// Knobs of [`integral`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegralOptions {
    /// Remove the linear drift so the result ends where it starts.
    pub enforce_periodicity: bool,
    /// Subtract the mean of the result.
    pub center: bool,
    /// Constant added last.
    pub initial_offset: f64,
}

impl Default for IntegralOptions {
    fn default() -> Self {
        Self {
            enforce_periodicity: true,
            center: false,
            initial_offset: 0.0,
        }
    }
}

/// Running trapezoidal integral over one period, on the input's grid.
///
/// Sampled input is treated as periodic: the last interval closes back
/// onto the first sample when the net area is computed.
pub fn integral(waveform: &Waveform, options: IntegralOptions, config: &ProcessingConfig) -> DspResult<Waveform> {
    validate(waveform)?;

    let sampled = is_sampled(waveform, config);
    let start = waveform.time[0];
    let period = period_of(waveform, config).0;

    let mut running = 0.0;
    let mut data = Vec::with_capacity(waveform.len());
    data.push(running);
    for (t, d) in waveform.time.windows(2).zip(waveform.data.windows(2)) {
        running += (d[0] + d[1]) / 2.0 * (t[1] - t[0]);
        data.push(running);
    }

    let total = match (sampled, waveform.time.last(), waveform.data.first(), waveform.data.last()) {
        (true, Some(&last_time), Some(&first), Some(&last)) => {
            running + (first + last) / 2.0 * (start + period - last_time)
        }
        _ => running,
    };

    if options.enforce_periodicity && period > 0.0 {
        for (value, &t) in data.iter_mut().zip(&waveform.time) {
            *value -= total * (t - start) / period;
        }
    }

    let mut result = Waveform::new(waveform.time.clone(), data);
    if options.center {
        let mean = if sampled { result.mean() } else { trapezoid_average(&result) };
        result = result.shifted(-mean);
    }
    if options.initial_offset != 0.0 {
        result = result.shifted(options.initial_offset);
    }

    if !result.is_finite() {
        return Err(DspError::NonFinite("integral".to_string()));
    }
    Ok(result)
}

fn check_inductance(inductance: Henries) -> DspResult<f64> {
    if inductance.0 > 0.0 && inductance.0.is_finite() {
        Ok(inductance.0)
    } else {
        Err(DspError::InvalidInductance(inductance.0))
    }
}

/// Voltage induced across `inductance` by the excitation's current.
pub fn induced_voltage(
    excitation: &WindingExcitation,
    inductance: Henries,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let inductance = check_inductance(inductance)?;
    let current = excitation.current.as_ref().ok_or(DspError::MissingSignal("current"))?;
    let current = standardize(current, excitation.frequency, config)?;
    let waveform = current.waveform.ok_or(DspError::MissingSignal("current waveform"))?;

    let voltage = derivative(&waveform, config)?.scaled(inductance);
    tracing::debug!(points = voltage.len(), inductance, "Induced voltage");
    describe(voltage, excitation.frequency, None, config)
}

/// DC level added to the magnetizing current.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DcBias {
    /// No bias: the current is whatever the integral gives.
    #[default]
    None,
    /// A fixed bias in amperes.
    Fixed(f64),
    /// `peak - ripple / 2` of the winding current.
    FromCurrent,
}

/// Knobs of [`magnetizing_current`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagnetizingOptions {
    pub enforce_periodicity: bool,
    pub dc_bias: DcBias,
    /// Store the corner layout instead of the full resample.
    pub compress: bool,
}

impl Default for MagnetizingOptions {
    fn default() -> Self {
        Self {
            enforce_periodicity: true,
            dc_bias: DcBias::None,
            compress: false,
        }
    }
}

impl MagnetizingOptions {
    pub fn with_dc_bias(mut self, dc_bias: DcBias) -> Self {
        self.dc_bias = dc_bias;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }
}

fn resolve_dc_bias(excitation: &WindingExcitation, bias: DcBias, config: &ProcessingConfig) -> DspResult<f64> {
    match bias {
        DcBias::None => Ok(0.0),
        DcBias::Fixed(value) => ensure_finite(value, "DC bias"),
        DcBias::FromCurrent => {
            let Some(current) = excitation.current.as_ref() else {
                return Ok(0.0);
            };
            let current = standardize(current, excitation.frequency, config)?;
            let waveform = current.waveform.ok_or(DspError::MissingSignal("current waveform"))?;
            let peak = current
                .processed
                .as_ref()
                .and_then(|p| p.peak)
                .unwrap_or_else(|| waveform.peak());
            ensure_finite(peak - ac_ripple(&waveform, config)? / 2.0, "DC bias")
        }
    }
}

/// Shape statistics of the excitation's current, if it has one.
fn current_shape(excitation: &WindingExcitation, config: &ProcessingConfig) -> DspResult<Option<Processed>> {
    let Some(current) = excitation.current.as_ref() else {
        return Ok(None);
    };
    if let Some(processed) = current.processed.as_ref() {
        return Ok(Some(processed.clone()));
    }
    let current = standardize(current, excitation.frequency, config)?;
    let waveform = current.waveform.ok_or(DspError::MissingSignal("current waveform"))?;
    basic_processed(&waveform, config).map(Some)
}

/// Magnetizing current of a winding.
///
/// Flyback and unipolar-triangular winding currents already carry the
/// magnetizing ramp, so a triangle spanning the same excursion above their
/// offset is used directly. Otherwise the winding voltage is integrated
/// over `inductance`, centered when the winding conducts power
/// continuously, and biased per `options.dc_bias`.
pub fn magnetizing_current(
    excitation: &WindingExcitation,
    inductance: Henries,
    options: MagnetizingOptions,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let inductance = check_inductance(inductance)?;
    let frequency = excitation.frequency;

    let sampled = match current_shape(excitation, config)? {
        Some(processed)
            if matches!(
                processed.label,
                WaveformLabel::FlybackPrimary | WaveformLabel::FlybackSecondary | WaveformLabel::UnipolarTriangular
            ) =>
        {
            let shape = ShapeParameters::new(WaveformLabel::Triangular, processed.peak_to_peak)
                .with_offset(processed.offset + processed.peak_to_peak / 2.0);
            let triangle = create_waveform(&shape, frequency, config)?;
            tracing::debug!(label = %processed.label, "Magnetizing current follows the winding current ramp");
            sample(&triangle, Some(frequency), config)?
        }
        _ => {
            let voltage = excitation.voltage.as_ref().ok_or(DspError::MissingSignal("voltage"))?;
            let voltage = standardize(voltage, frequency, config)?;
            let voltage = voltage.waveform.ok_or(DspError::MissingSignal("voltage waveform"))?;
            let voltage = sampled_or_resampled(&voltage, frequency, config)?;

            let center = is_continuously_conducting_power(excitation, config)?;
            let dc = resolve_dc_bias(excitation, options.dc_bias, config)?;
            let flux = integral(
                &voltage,
                IntegralOptions {
                    enforce_periodicity: options.enforce_periodicity,
                    center,
                    initial_offset: 0.0,
                },
                config,
            )?;
            tracing::debug!(center, dc, inductance, "Integrated magnetizing current");
            flux.scaled(1.0 / inductance).shifted(dc)
        }
    };

    let stored = if options.compress {
        compress(&sampled, config.compression_tolerance)?
    } else {
        sampled.clone()
    };
    describe_sampled(stored, &sampled, frequency, None, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::units::Hertz;
    use std::f64::consts::PI;

    fn sampled_sine(n: usize, peak_to_peak: f64, frequency: f64) -> Waveform {
        let period = 1.0 / frequency;
        let time = (0..n).map(|i| i as f64 * period / n as f64).collect();
        let data = (0..n).map(|i| peak_to_peak / 2.0 * (2.0 * PI * i as f64 / n as f64).sin()).collect();
        Waveform::new(time, data)
    }

    #[test]
    fn test_derivative_of_triangle_is_rectangle() {
        let config = ProcessingConfig::default();
        let triangle = Waveform::new(vec![0.0, 2.5e-6, 1e-5], vec![-5.0, 5.0, -5.0]);

        let rate = derivative(&triangle, &config).unwrap();

        assert_eq!(rate.len(), 5);
        assert!((rate.data[1] - 4e6).abs() < 1e-3);
        assert!((rate.data[3] + 10.0 / 7.5e-6).abs() < 1e-3);
        assert_eq!(rate.data[0], rate.data[4]);
    }

    #[test]
    fn test_integral_of_balanced_rectangle() {
        let config = ProcessingConfig::default();
        let rectangle = Waveform::new(
            vec![0.0, 0.0, 2.5e-6, 2.5e-6, 1e-5],
            vec![-2.5, 7.5, 7.5, -2.5, -2.5],
        );
        let sampled = sample(&rectangle, None, &config).unwrap();

        let flux = integral(&sampled, IntegralOptions::default(), &config).unwrap();

        // 7.5 V for 2.5 µs, less the two half-steps lost at the edges
        assert!((flux.peak_to_peak() - 1.8555e-5).abs() < 1e-8);
        assert!(flux.data[0].abs() < 1e-15);
    }

    #[test]
    fn test_integral_removes_drift() {
        let config = ProcessingConfig::default();
        let constant = Waveform::equidistant(vec![1.0; 128], lib_types::units::Seconds(1.0));
        let constant = sample(&constant, None, &config).unwrap();

        let drifting = integral(
            &constant,
            IntegralOptions { enforce_periodicity: false, ..IntegralOptions::default() },
            &config,
        )
        .unwrap();
        let periodic = integral(&constant, IntegralOptions::default(), &config).unwrap();

        assert!(drifting.peak_to_peak() > 0.9);
        assert!(periodic.peak_to_peak() < 1e-12);
    }

    #[test]
    fn test_integral_centering_and_offset() {
        let config = ProcessingConfig::default();
        let sine = sampled_sine(128, 2.0, 1.0);

        let options = IntegralOptions { center: true, initial_offset: 3.0, ..IntegralOptions::default() };
        let result = integral(&sine, options, &config).unwrap();

        assert!((result.mean() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sine_current_survives_voltage_round_trip() {
        let config = ProcessingConfig::default();
        let frequency = Hertz(100e3);
        let inductance = Henries::from_uh(100.0);

        let excitation = WindingExcitation::new(frequency)
            .with_current(SignalDescriptor::from_waveform(sampled_sine(128, 50.0, frequency.0)));
        let voltage = induced_voltage(&excitation, inductance, &config).unwrap();

        let back = WindingExcitation::new(frequency).with_voltage(voltage);
        let current = magnetizing_current(&back, inductance, MagnetizingOptions::default(), &config).unwrap();

        let peak_to_peak = current.processed.unwrap().peak_to_peak;
        assert!((peak_to_peak - 50.0).abs() / 50.0 < 0.02, "got {peak_to_peak}");
    }

    #[test]
    fn test_flyback_current_gives_triangular_magnetizing_current() {
        let config = ProcessingConfig::default();
        let current = Waveform::new(vec![0.0, 0.0, 5e-6, 5e-6, 1e-5], vec![0.0, 2.0, 12.0, 0.0, 0.0]);
        let excitation = WindingExcitation::new(Hertz(100e3)).with_current(SignalDescriptor::from_waveform(current));

        let result = magnetizing_current(&excitation, Henries::from_uh(50.0), MagnetizingOptions::default(), &config)
            .unwrap();
        let processed = result.processed.unwrap();

        assert_eq!(processed.label, WaveformLabel::Triangular);
        assert!((processed.peak_to_peak - 10.0).abs() < 0.2);
        assert!((processed.average.unwrap() - 7.0).abs() < 0.1);
    }

    #[test]
    fn test_fixed_bias_and_compression() {
        let config = ProcessingConfig::default();
        let voltage = Waveform::new(
            vec![0.0, 0.0, 5e-6, 5e-6, 1e-5],
            vec![-10.0, 10.0, 10.0, -10.0, -10.0],
        );
        let excitation = WindingExcitation::new(Hertz(100e3)).with_voltage(SignalDescriptor::from_waveform(voltage));
        let options = MagnetizingOptions::default().with_dc_bias(DcBias::Fixed(4.0)).compressed();

        let result = magnetizing_current(&excitation, Henries::from_uh(100.0), options, &config).unwrap();

        assert!(result.waveform.unwrap().len() < 10);
        assert!((result.processed.unwrap().average.unwrap() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_non_positive_inductance() {
        let config = ProcessingConfig::default();
        let excitation = WindingExcitation::new(Hertz(100e3));

        let result = magnetizing_current(&excitation, Henries(0.0), MagnetizingOptions::default(), &config);
        assert!(matches!(result, Err(DspError::InvalidInductance(_))));

        let result = induced_voltage(&excitation, Henries(-1.0), &config);
        assert!(matches!(result, Err(DspError::InvalidInductance(_))));
    }

    #[test]
    fn test_missing_voltage_is_reported() {
        let config = ProcessingConfig::default();
        let excitation = WindingExcitation::new(Hertz(100e3));

        let result = magnetizing_current(&excitation, Henries::from_uh(10.0), MagnetizingOptions::default(), &config);
        assert!(matches!(result, Err(DspError::MissingSignal("voltage"))));
    }
}
