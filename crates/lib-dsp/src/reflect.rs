//! Reflection of signals across a turns ratio.
//!
//! Currents reflect with the turns ratio `n = Np / Ns`, voltages with
//! `1 / n`; callers pass whichever factor applies. Reflection only builds
//! the new waveform: statistics and spectrum are computed by the caller.

use crate::classify::{classify, falling_ramp, off_time_plateau, rising_ramp, rising_rectangle, Corners};
use crate::compress::compress;
use crate::error::{DspError, DspResult};
use crate::sampling::{is_sampled, period_of};
use crate::statistics::{basic_processed, trapezoid_average};
use crate::synthesis::{create_waveform, standardize, ShapeParameters};
use lib_types::config::ProcessingConfig;
use lib_types::signal::{Processed, SignalDescriptor};
use lib_types::units::Hertz;
use lib_types::waveform::{Waveform, WaveformLabel};

fn check_ratio(ratio: f64) -> DspResult<f64> {
    if ratio > 0.0 && ratio.is_finite() {
        Ok(ratio)
    } else {
        Err(DspError::InvalidTurnsRatio(ratio))
    }
}

/// Shape-aware reflection.
///
/// With no `label`, or `Custom`, the waveform is simply scaled. Flyback
/// primary and secondary shapes swap into each other. Unipolar shapes
/// become the opposite-side conduction interval of the same converter:
/// the ramp or plateau moves to the off-time and the level is referred
/// through the volt-second balance `d / (1 - d)`; reflecting the
/// off-time layout brings the on-time layout back. Any other labelled
/// shape keeps its AC part scaled and has the sign of its average
/// flipped.
pub fn reflect(
    signal: &SignalDescriptor,
    ratio: f64,
    label: Option<WaveformLabel>,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let ratio = check_ratio(ratio)?;
    let standardized = standardize(signal, frequency, config)?;
    let waveform = standardized.waveform.as_ref().ok_or(DspError::UnresolvableSignal)?;

    let reflected = match label {
        None | Some(WaveformLabel::Custom) => waveform.scaled(ratio),
        Some(label) => reflect_shape(waveform, standardized.processed.as_ref(), ratio, label, config)?,
    };

    Ok(SignalDescriptor::from_waveform(reflected))
}

fn reflect_shape(
    waveform: &Waveform,
    existing: Option<&Processed>,
    ratio: f64,
    label: WaveformLabel,
    config: &ProcessingConfig,
) -> DspResult<Waveform> {
    match label {
        WaveformLabel::FlybackPrimary => swap_flyback(waveform, existing, ratio, WaveformLabel::FlybackSecondary, config),
        WaveformLabel::FlybackSecondary => swap_flyback(waveform, existing, ratio, WaveformLabel::FlybackPrimary, config),
        WaveformLabel::UnipolarTriangular | WaveformLabel::UnipolarRectangular => {
            let corners = if is_sampled(waveform, config) {
                compress(waveform, config.compression_tolerance)?
            } else {
                waveform.clone()
            };
            match reflect_unipolar(&corners, ratio, label, config)? {
                Some(reflected) => Ok(reflected),
                None => {
                    tracing::warn!(%label, points = corners.len(), "Unipolar layout not recognized, scaling instead");
                    Ok(flip_average(waveform, ratio, config))
                }
            }
        }
        _ => Ok(flip_average(waveform, ratio, config)),
    }
}

/// `ratio * (d - 2 * avg)`: AC part scaled, average scaled and negated.
fn flip_average(waveform: &Waveform, ratio: f64, config: &ProcessingConfig) -> Waveform {
    let average = if is_sampled(waveform, config) {
        waveform.mean()
    } else {
        trapezoid_average(waveform)
    };
    waveform.shifted(-2.0 * average).scaled(ratio)
}

fn swap_flyback(
    waveform: &Waveform,
    existing: Option<&Processed>,
    ratio: f64,
    target: WaveformLabel,
    config: &ProcessingConfig,
) -> DspResult<Waveform> {
    let processed = match existing {
        Some(processed) => processed.clone(),
        None => basic_processed(waveform, config)?,
    };
    let period = period_of(waveform, config);

    let shape = ShapeParameters::new(target, processed.peak_to_peak * ratio)
        .with_duty_cycle(processed.duty_cycle.unwrap_or(0.5))
        .with_offset(processed.offset * ratio);
    let reflected = create_waveform(&shape, period.to_frequency(), config)?;
    let recognized = classify(&reflected, config)?;
    if recognized != target {
        tracing::warn!(expected = %target, %recognized, "Reflected waveform does not reclassify");
    }
    Ok(reflected)
}

/// Refer an on-time excursion to the off-time, `x * d / (1 - d)`, or back.
fn refer(excursion: f64, duty: f64, towards_off_time: bool) -> DspResult<f64> {
    match (towards_off_time, duty) {
        (true, d) if d < 1.0 => Ok(excursion * d / (1.0 - d)),
        (false, d) if d > 0.0 => Ok(excursion * (1.0 - d) / d),
        _ => Err(DspError::InvalidDutyCycle(duty)),
    }
}

/// Reflect the corner layout of a unipolar shape, in either direction.
///
/// Returns `None` when the corners are in neither the on-time nor the
/// off-time layout of `label`.
fn reflect_unipolar(
    corners: &Waveform,
    ratio: f64,
    label: WaveformLabel,
    config: &ProcessingConfig,
) -> DspResult<Option<Waveform>> {
    let c = Corners::new(corners, config);
    let (t, d) = (c.time, c.data);
    let period = match (t.first(), t.last()) {
        (Some(first), Some(last)) if last > first => last - first,
        _ => return Ok(None),
    };

    let reflected = match label {
        WaveformLabel::UnipolarTriangular if rising_ramp(&c) => {
            // min, ramp to max over the on-time, back to min, flat
            let on = t[1] - t[0];
            let low = d[0] * ratio;
            let high = refer((d[1] - d[0]) * ratio, on / period, true)? + low;
            Waveform::new(vec![0.0, on, on, period], vec![low, low, high, low])
        }
        WaveformLabel::UnipolarTriangular if falling_ramp(&c) => {
            let on = t[1] - t[0];
            let low = d[0] * ratio;
            let high = refer((d[2] - d[0]) * ratio, on / period, false)? + low;
            Waveform::new(vec![0.0, on, on, period], vec![low, high, low, low])
        }
        WaveformLabel::UnipolarRectangular if rising_rectangle(&c) => {
            let on = t[2] - t[0];
            let low = -d[0] * ratio;
            let high = low - refer((d[1] - d[0]) * ratio, on / period, true)?;
            Waveform::new(vec![0.0, on, on, period, period], vec![low, low, high, high, low])
        }
        WaveformLabel::UnipolarRectangular if off_time_plateau(&c) => {
            let on = t[1] - t[0];
            let low = -d[0] * ratio;
            let high = low + refer((d[0] - d[2]) * ratio, on / period, false)?;
            Waveform::new(vec![0.0, 0.0, on, on, period], vec![low, high, high, low, low])
        }
        _ => return Ok(None),
    };
    Ok(Some(reflected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::sample;

    fn flyback_primary() -> SignalDescriptor {
        SignalDescriptor::from_waveform(Waveform::new(
            vec![0.0, 0.0, 4e-6, 4e-6, 1e-5],
            vec![0.0, 1.0, 6.0, 0.0, 0.0],
        ))
    }

    #[test]
    fn test_plain_reflection_scales() {
        let config = ProcessingConfig::default();
        let reflected = reflect(&flyback_primary(), 2.0, None, Hertz(100e3), &config).unwrap();

        assert_eq!(reflected.waveform.unwrap().data, vec![0.0, 2.0, 12.0, 0.0, 0.0]);
        assert!(reflected.processed.is_none());
    }

    #[test]
    fn test_flyback_primary_becomes_secondary() {
        let config = ProcessingConfig::default();
        let reflected = reflect(&flyback_primary(), 3.0, Some(WaveformLabel::FlybackPrimary), Hertz(100e3), &config)
            .unwrap();
        let waveform = reflected.waveform.unwrap();

        assert_eq!(classify(&waveform, &config).unwrap(), WaveformLabel::FlybackSecondary);
        let processed = basic_processed(&waveform, &config).unwrap();
        assert!((processed.peak_to_peak - 15.0).abs() < 1e-9);
        assert!((processed.offset - 3.0).abs() < 1e-9);
        assert!((processed.duty_cycle.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_flyback_reflection_is_symmetric() {
        let config = ProcessingConfig::default();
        let original = flyback_primary();
        let ratio = 2.5;

        let there = reflect(&original, ratio, Some(WaveformLabel::FlybackPrimary), Hertz(100e3), &config).unwrap();
        let back = reflect(&there, 1.0 / ratio, Some(WaveformLabel::FlybackSecondary), Hertz(100e3), &config).unwrap();

        let expected = original.waveform.unwrap();
        let back = back.waveform.unwrap();
        assert_eq!(back.len(), expected.len());
        for (a, b) in back.data.iter().zip(&expected.data) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in back.time.iter().zip(&expected.time) {
            assert!((a - b).abs() < 1e-15);
        }
    }

    #[test]
    fn test_unipolar_rectangular_reflects_to_negative_off_time() {
        let config = ProcessingConfig::default();
        let signal = SignalDescriptor::from_waveform(Waveform::new(
            vec![0.0, 0.0, 2.5e-6, 2.5e-6, 1e-5],
            vec![0.0, 60.0, 60.0, 0.0, 0.0],
        ));

        let reflected = reflect(&signal, 1.0, Some(WaveformLabel::UnipolarRectangular), Hertz(100e3), &config).unwrap();
        let waveform = reflected.waveform.unwrap();

        let expected = [0.0, 0.0, -20.0, -20.0, 0.0];
        for (a, b) in waveform.data.iter().zip(expected) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(classify(&waveform, &config).unwrap(), WaveformLabel::UnipolarRectangular);
        // Mirrors the 15 A average of the unipolar side.
        let mean = sample(&waveform, None, &config).unwrap().mean();
        assert!((mean + 15.0).abs() < 0.2);
    }

    #[test]
    fn test_average_of_labelled_shape_changes_sign() {
        let config = ProcessingConfig::default();
        let triangle = SignalDescriptor::from_waveform(Waveform::new(vec![0.0, 5e-6, 1e-5], vec![0.0, 10.0, 0.0]));

        for (factor, average) in [(2.0, -10.0), (0.5, -2.5)] {
            let reflected = reflect(&triangle, factor, Some(WaveformLabel::Triangular), Hertz(100e3), &config).unwrap();
            let waveform = reflected.waveform.unwrap();

            assert!((trapezoid_average(&waveform) - average).abs() < 1e-9);
            assert!((waveform.peak_to_peak() - 10.0 * factor).abs() < 1e-9);
            assert_eq!(classify(&waveform, &config).unwrap(), WaveformLabel::Triangular);
        }
    }

    #[test]
    fn test_unipolar_triangular_moves_to_off_time_and_back() {
        let config = ProcessingConfig::default();
        let on_time = SignalDescriptor::from_waveform(Waveform::new(
            vec![0.0, 4e-6, 4e-6, 1e-5],
            vec![1.0, 7.0, 1.0, 1.0],
        ));

        let there = reflect(&on_time, 2.0, Some(WaveformLabel::UnipolarTriangular), Hertz(100e3), &config).unwrap();
        let off_time = there.waveform.clone().unwrap();
        // 6 A over 40 % of the period, referred to the remaining 60 %
        let expected = [2.0, 2.0, 10.0, 2.0];
        for (a, b) in off_time.data.iter().zip(expected) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(classify(&off_time, &config).unwrap(), WaveformLabel::UnipolarTriangular);

        let back = reflect(&there, 0.5, Some(WaveformLabel::UnipolarTriangular), Hertz(100e3), &config).unwrap();
        let back = back.waveform.unwrap();
        let original = on_time.waveform.unwrap();
        assert_eq!(back.len(), original.len());
        for (a, b) in back.data.iter().zip(&original.data) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in back.time.iter().zip(&original.time) {
            assert!((a - b).abs() < 1e-15);
        }
    }

    #[test]
    fn test_unipolar_rectangular_round_trip() {
        let config = ProcessingConfig::default();
        let on_time = SignalDescriptor::from_waveform(Waveform::new(
            vec![0.0, 0.0, 3e-6, 3e-6, 1e-5],
            vec![0.5, 12.5, 12.5, 0.5, 0.5],
        ));

        let there = reflect(&on_time, 3.0, Some(WaveformLabel::UnipolarRectangular), Hertz(100e3), &config).unwrap();
        let back = reflect(&there, 1.0 / 3.0, Some(WaveformLabel::UnipolarRectangular), Hertz(100e3), &config).unwrap();

        let back = back.waveform.unwrap();
        let original = on_time.waveform.unwrap();
        assert_eq!(back.len(), original.len());
        for (a, b) in back.data.iter().zip(&original.data) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(classify(&back, &config).unwrap(), WaveformLabel::UnipolarRectangular);
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let config = ProcessingConfig::default();
        for ratio in [0.0, -1.0, f64::NAN] {
            let result = reflect(&flyback_primary(), ratio, None, Hertz(100e3), &config);
            assert!(matches!(result, Err(DspError::InvalidTurnsRatio(_))));
        }
    }
}
