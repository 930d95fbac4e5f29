//! Idealized waveforms from shape parameters.
//!
//! [`create_waveform`] is the inverse of classification: the corner layout
//! it emits for a label is recognized as that same label, with the same
//! peak-to-peak and duty cycle.

use crate::error::{ensure_finite, DspError, DspResult};
use crate::harmonics::reconstruct;
use lib_types::config::ProcessingConfig;
use lib_types::signal::{Processed, SignalDescriptor};
use lib_types::units::Hertz;
use lib_types::waveform::{Waveform, WaveformLabel};
use std::f64::consts::PI;

/// Shape parameters of an idealized waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeParameters {
    pub label: WaveformLabel,
    pub peak_to_peak: f64,
    pub duty_cycle: f64,
    pub offset: f64,
    pub dead_time: f64,
}

impl ShapeParameters {
    pub fn new(label: WaveformLabel, peak_to_peak: f64) -> Self {
        Self {
            label,
            peak_to_peak,
            duty_cycle: 0.5,
            offset: 0.0,
            dead_time: 0.0,
        }
    }

    pub fn with_duty_cycle(mut self, duty_cycle: f64) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_dead_time(mut self, dead_time: f64) -> Self {
        self.dead_time = dead_time;
        self
    }
}

impl From<&Processed> for ShapeParameters {
    fn from(processed: &Processed) -> Self {
        Self {
            label: processed.label,
            peak_to_peak: processed.peak_to_peak,
            duty_cycle: processed.duty_cycle.unwrap_or(0.5),
            offset: processed.offset,
            dead_time: processed.dead_time.unwrap_or(0.0),
        }
    }
}

/// One period of the idealized shape.
///
/// Sinusoids come out in the sampled layout (`number_points` samples, no
/// closing point); every other shape as its corner points.
pub fn create_waveform(
    shape: &ShapeParameters,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<Waveform> {
    if !(frequency.0 > 0.0) || !frequency.0.is_finite() {
        return Err(DspError::NonFinite("frequency".to_string()));
    }
    if !(0.0..=1.0).contains(&shape.duty_cycle) {
        return Err(DspError::InvalidDutyCycle(shape.duty_cycle));
    }
    let pp = ensure_finite(shape.peak_to_peak, "peak-to-peak")?;
    let offset = ensure_finite(shape.offset, "offset")?;
    let dead_time = ensure_finite(shape.dead_time, "dead time")?;
    let duty = shape.duty_cycle;

    let period = frequency.to_period().0;
    let dc = duty * period;
    let capped = duty.min(0.5) * period;

    let (time, data) = match shape.label {
        WaveformLabel::Triangular => {
            let (max, min) = (pp / 2.0 + offset, -pp / 2.0 + offset);
            (vec![0.0, dc, period], vec![min, max, min])
        }
        WaveformLabel::UnipolarTriangular => {
            let (max, min) = (pp + offset, offset);
            (vec![0.0, dc, dc, period], vec![min, max, min, min])
        }
        WaveformLabel::Rectangular => {
            let (max, min) = (pp * (1.0 - duty), -pp * duty);
            (vec![0.0, 0.0, dc, dc, period], vec![min, max, max, min, min])
        }
        WaveformLabel::RectangularWithDeadtime => {
            let (max, min) = (pp * (1.0 - duty), -pp * duty);
            let off = period - dead_time;
            (
                vec![0.0, 0.0, dc, dc, off, off, period],
                vec![0.0, max, max, min, min, 0.0, 0.0],
            )
        }
        WaveformLabel::SecondaryRectangular => {
            let (max, min) = (-pp * (1.0 - duty), pp * duty);
            (vec![0.0, 0.0, dc, dc, period], vec![min, max, max, min, min])
        }
        WaveformLabel::SecondaryRectangularWithDeadtime => {
            let (max, min) = (-pp * (1.0 - duty), pp * duty);
            let off = period - dead_time;
            (
                vec![0.0, 0.0, dc, dc, off, off, period],
                vec![0.0, max, max, min, min, 0.0, 0.0],
            )
        }
        WaveformLabel::UnipolarRectangular => {
            let (max, min) = (pp + offset, offset);
            (vec![0.0, 0.0, capped, capped, period], vec![min, max, max, min, min])
        }
        WaveformLabel::BipolarRectangular => {
            let (max, min) = (pp / 2.0, -pp / 2.0);
            let (rise, fall) = (0.25 * period - dc / 2.0, 0.25 * period + dc / 2.0);
            let (sink, back) = (0.75 * period - dc / 2.0, 0.75 * period + dc / 2.0);
            (
                vec![0.0, rise, rise, fall, fall, sink, sink, back, back, period],
                vec![0.0, 0.0, max, max, 0.0, 0.0, min, min, 0.0, 0.0],
            )
        }
        WaveformLabel::BipolarTriangular => {
            let (max, min) = (pp / 2.0, -pp / 2.0);
            (
                vec![
                    0.0,
                    0.25 * period - capped / 2.0,
                    0.25 * period + capped / 2.0,
                    0.75 * period - capped / 2.0,
                    0.75 * period + capped / 2.0,
                    period,
                ],
                vec![min, min, max, max, min, min],
            )
        }
        WaveformLabel::FlybackPrimary => {
            let (max, min) = (pp + offset, offset);
            (vec![0.0, 0.0, dc, dc, period], vec![0.0, min, max, 0.0, 0.0])
        }
        WaveformLabel::FlybackSecondary => {
            let (max, min) = (pp + offset, offset);
            (vec![0.0, dc, dc, period, period], vec![0.0, 0.0, max, min, 0.0])
        }
        WaveformLabel::FlybackSecondaryWithDeadtime => {
            let (max, min) = (pp + offset, offset);
            let off = period - dead_time;
            (vec![0.0, dc, dc, off, off, period], vec![0.0, 0.0, max, min, 0.0, 0.0])
        }
        WaveformLabel::Sinusoidal => {
            let n = config.number_points;
            (0..n)
                .map(|i| {
                    let angle = 2.0 * PI * i as f64 / n as f64;
                    (i as f64 * period / n as f64, angle.sin() * pp / 2.0 + offset)
                })
                .unzip()
        }
        WaveformLabel::Custom => return Err(DspError::UnresolvableSignal),
    };

    Ok(Waveform::new(time, data))
}

/// Descriptor with a waveform, derived from whichever piece is present.
///
/// An existing waveform is kept; otherwise statistics are synthesized
/// into an idealized shape, and failing that the spectrum is
/// reconstructed.
pub fn standardize(
    signal: &SignalDescriptor,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    if signal.waveform.is_some() {
        return Ok(signal.clone());
    }

    let waveform = match (&signal.processed, &signal.harmonics) {
        (Some(processed), _) => create_waveform(&ShapeParameters::from(processed), frequency, config)?,
        (None, Some(harmonics)) => reconstruct(harmonics, frequency, config)?,
        (None, None) => return Err(DspError::UnresolvableSignal),
    };

    Ok(SignalDescriptor {
        waveform: Some(waveform),
        ..signal.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::statistics::basic_processed;
    use lib_types::signal::Harmonics;

    #[test]
    fn test_rectangular_levels_balance() {
        let config = ProcessingConfig::default();
        let shape = ShapeParameters::new(WaveformLabel::Rectangular, 10.0).with_duty_cycle(0.25);

        let wf = create_waveform(&shape, Hertz(100e3), &config).unwrap();

        assert_eq!(wf.data, vec![-2.5, 7.5, 7.5, -2.5, -2.5]);
        assert!((wf.time[2] - 2.5e-6).abs() < 1e-18);
    }

    #[test]
    fn test_every_canonical_label_round_trips() {
        let config = ProcessingConfig::default();
        let labels = [
            WaveformLabel::Sinusoidal,
            WaveformLabel::Triangular,
            WaveformLabel::Rectangular,
            WaveformLabel::UnipolarTriangular,
            WaveformLabel::UnipolarRectangular,
            WaveformLabel::BipolarRectangular,
            WaveformLabel::BipolarTriangular,
            WaveformLabel::FlybackPrimary,
            WaveformLabel::FlybackSecondary,
        ];

        for label in labels {
            let shape = ShapeParameters::new(label, 20.0).with_duty_cycle(0.3).with_offset(
                if label.is_flyback() { 2.0 } else { 0.0 },
            );
            let wf = create_waveform(&shape, Hertz(100e3), &config).unwrap();

            assert_eq!(classify(&wf, &config).unwrap(), label, "label {label}");

            let processed = basic_processed(&wf, &config).unwrap();
            assert!((processed.peak_to_peak - 20.0).abs() < 1e-9, "peak-to-peak of {label}");
        }
    }

    #[test]
    fn test_duty_cycle_survives_synthesis() {
        let config = ProcessingConfig::default();
        for label in [WaveformLabel::Triangular, WaveformLabel::Rectangular, WaveformLabel::FlybackPrimary] {
            let shape = ShapeParameters::new(label, 5.0).with_duty_cycle(0.3).with_offset(1.0);
            let wf = create_waveform(&shape, Hertz(50e3), &config).unwrap();
            let processed = basic_processed(&wf, &config).unwrap();

            assert!((processed.duty_cycle.unwrap() - 0.3).abs() < 1e-9, "duty of {label}");
        }
    }

    #[test]
    fn test_deadtime_shape_returns_to_zero() {
        let config = ProcessingConfig::default();
        let shape = ShapeParameters::new(WaveformLabel::RectangularWithDeadtime, 10.0)
            .with_duty_cycle(0.4)
            .with_dead_time(1e-6);

        let wf = create_waveform(&shape, Hertz(100e3), &config).unwrap();

        assert_eq!(wf.len(), 7);
        assert_eq!(wf.data[5], 0.0);
        assert!((wf.time[5] - 9e-6).abs() < 1e-18);
    }

    #[test]
    fn test_create_rejects_bad_parameters() {
        let config = ProcessingConfig::default();
        let shape = ShapeParameters::new(WaveformLabel::Triangular, 1.0).with_duty_cycle(1.5);
        assert!(matches!(
            create_waveform(&shape, Hertz(1e3), &config),
            Err(DspError::InvalidDutyCycle(_))
        ));

        let custom = ShapeParameters::new(WaveformLabel::Custom, 1.0);
        assert!(create_waveform(&custom, Hertz(1e3), &config).is_err());
    }

    #[test]
    fn test_standardize_prefers_waveform_then_processed_then_harmonics() {
        let config = ProcessingConfig::default();
        let f = Hertz(100e3);

        let processed = Processed::parametric(WaveformLabel::Triangular, 10.0, 0.5, 0.0);
        let from_processed = standardize(&SignalDescriptor::from_processed(processed), f, &config).unwrap();
        assert_eq!(from_processed.waveform.unwrap().len(), 3);

        let harmonics = Harmonics::new(vec![0.0, 100e3], vec![0.0, 1.0]);
        let from_harmonics = standardize(&SignalDescriptor::from_harmonics(harmonics), f, &config).unwrap();
        assert_eq!(from_harmonics.waveform.unwrap().len(), 128);

        let empty = standardize(&SignalDescriptor::default(), f, &config);
        assert!(matches!(empty, Err(DspError::UnresolvableSignal)));
    }
}
