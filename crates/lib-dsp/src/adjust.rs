//! Edits of already-described signals and excitations.
//!
//! Every edit rebuilds the affected descriptors through [`describe`], so
//! spectrum and statistics always match the edited waveform. Shape
//! parameters that the edit changes in a known way (offset, peak-to-peak)
//! are carried over instead of being re-derived.

use crate::analysis::describe;
use crate::error::{ensure_finite, DspError, DspResult};
use crate::harmonics::prune;
use crate::sampling::{is_imported, is_sampled, period_of, sample};
use crate::statistics::{instantaneous_power, waveform_coefficient};
use crate::synthesis::standardize;
use lib_types::config::ProcessingConfig;
use lib_types::signal::{OperatingPoint, Processed, SignalDescriptor, WindingExcitation};
use lib_types::units::Hertz;
use lib_types::waveform::Waveform;

/// Below this the excitation is a line-frequency envelope and the
/// switching frequency has to be read from its spectrum.
const LINE_FREQUENCY_LIMIT: f64 = 400.0;

/// Harmonics weaker than this fraction of the fundamental are ignored when
/// looking for the switching frequency.
const SWITCHING_HARMONIC_FRACTION: f64 = 0.01;

fn waveform_of(signal: &SignalDescriptor, frequency: Hertz, config: &ProcessingConfig) -> DspResult<(Waveform, Option<Processed>)> {
    let standardized = standardize(signal, frequency, config)?;
    let waveform = standardized.waveform.ok_or(DspError::UnresolvableSignal)?;
    Ok((waveform, standardized.processed))
}

fn map_signals<F>(excitation: &WindingExcitation, mut f: F) -> DspResult<WindingExcitation>
where
    F: FnMut(&SignalDescriptor) -> DspResult<SignalDescriptor>,
{
    let mut edited = excitation.clone();
    for slot in [&mut edited.current, &mut edited.voltage, &mut edited.magnetizing_current] {
        if let Some(signal) = slot.as_ref() {
            *slot = Some(f(signal)?);
        }
    }
    Ok(edited)
}

/// Keep DC plus the main harmonics of a signal's spectrum.
pub fn prune_signal(signal: &SignalDescriptor, threshold: f64, main_index: Option<usize>) -> DspResult<SignalDescriptor> {
    let harmonics = signal.harmonics.as_ref().ok_or(DspError::MissingSignal("harmonics"))?;
    Ok(SignalDescriptor {
        harmonics: Some(prune(harmonics, threshold, main_index)),
        ..signal.clone()
    })
}

/// [`prune_signal`] on every signal of the excitation that has a spectrum.
pub fn prune_excitation(
    excitation: &WindingExcitation,
    threshold: f64,
    main_index: Option<usize>,
) -> DspResult<WindingExcitation> {
    map_signals(excitation, |signal| {
        if signal.harmonics.is_some() {
            prune_signal(signal, threshold, main_index)
        } else {
            Ok(signal.clone())
        }
    })
}

/// Shift a signal by a constant.
pub fn add_offset(
    signal: &SignalDescriptor,
    offset: f64,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let offset = ensure_finite(offset, "offset")?;
    let (waveform, processed) = waveform_of(signal, frequency, config)?;
    let processed = processed.map(|p| Processed {
        offset: p.offset + offset,
        peak: None,
        ..p
    });
    describe(waveform.shifted(offset), frequency, processed.as_ref(), config)
}

fn scale_signal(
    signal: &SignalDescriptor,
    proportion: f64,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let (waveform, processed) = waveform_of(signal, frequency, config)?;
    let processed = processed.map(|p| Processed {
        peak_to_peak: p.peak_to_peak * proportion.abs(),
        offset: p.offset * proportion,
        peak: None,
        ..p
    });
    describe(waveform.scaled(proportion), frequency, processed.as_ref(), config)
}

/// Excitation whose current is `proportion` times the original.
pub fn with_proportional_current(
    excitation: &WindingExcitation,
    proportion: f64,
    config: &ProcessingConfig,
) -> DspResult<WindingExcitation> {
    let proportion = ensure_finite(proportion, "current proportion")?;
    let current = excitation.current.as_ref().ok_or(DspError::MissingSignal("current"))?;
    let mut scaled = excitation.clone();
    scaled.current = Some(scale_signal(current, proportion, excitation.frequency, config)?);
    Ok(scaled)
}

/// Excitation whose voltage is `proportion` times the original.
pub fn with_proportional_voltage(
    excitation: &WindingExcitation,
    proportion: f64,
    config: &ProcessingConfig,
) -> DspResult<WindingExcitation> {
    let proportion = ensure_finite(proportion, "voltage proportion")?;
    let voltage = excitation.voltage.as_ref().ok_or(DspError::MissingSignal("voltage"))?;
    let mut scaled = excitation.clone();
    scaled.voltage = Some(scale_signal(voltage, proportion, excitation.frequency, config)?);
    Ok(scaled)
}

/// Stretch the time axis so that one period lasts `1 / frequency`.
pub fn scale_time_to_frequency(waveform: &Waveform, frequency: Hertz, config: &ProcessingConfig) -> DspResult<Waveform> {
    if !(frequency.0 > 0.0) || !frequency.0.is_finite() {
        return Err(DspError::NonFinite("frequency".to_string()));
    }
    let period = period_of(waveform, config);
    if period.0 <= 0.0 {
        return Err(DspError::InsufficientData { needed: 2, got: waveform.len() });
    }
    Ok(waveform.time_scaled(frequency.to_period().0 / period.0))
}

/// The same excitation at another frequency.
///
/// Waveforms are stretched in time; shape parameters carry over and the
/// frequency-dependent statistics and spectra are recomputed.
pub fn scale_excitation_to_frequency(
    excitation: &WindingExcitation,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<WindingExcitation> {
    let mut scaled = map_signals(excitation, |signal| {
        let (waveform, processed) = waveform_of(signal, excitation.frequency, config)?;
        let waveform = scale_time_to_frequency(&waveform, frequency, config)?;
        describe(waveform, frequency, processed.as_ref(), config)
    })?;
    scaled.frequency = frequency;
    Ok(scaled)
}

/// [`scale_excitation_to_frequency`] on every winding.
pub fn scale_operating_point_to_frequency(
    point: &OperatingPoint,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<OperatingPoint> {
    let excitations = point
        .excitations_per_winding
        .iter()
        .map(|excitation| scale_excitation_to_frequency(excitation, frequency, config))
        .collect::<DspResult<Vec<_>>>()?;
    Ok(OperatingPoint {
        excitations_per_winding: excitations,
        ..point.clone()
    })
}

/// Frequency at which the winding actually switches.
///
/// Line-frequency excitations (below 400 Hz) with an imported current
/// carry the switching ripple as a high harmonic: the strongest harmonic
/// above the fundamental, among those over 1 % of it, is returned. Every
/// other excitation switches at its own frequency.
pub fn switching_frequency(excitation: &WindingExcitation, config: &ProcessingConfig) -> Hertz {
    let current = match &excitation.current {
        Some(current) if excitation.frequency.0 < LINE_FREQUENCY_LIMIT => current,
        _ => return excitation.frequency,
    };
    let imported = current.waveform.as_ref().is_some_and(|w| is_imported(w, config));
    let Some(harmonics) = current.harmonics.as_ref().filter(|_| imported) else {
        return excitation.frequency;
    };
    let Some(&fundamental) = harmonics.amplitudes.get(1) else {
        return excitation.frequency;
    };

    let strongest = harmonics
        .bins()
        .skip(2)
        .filter(|&(_, a)| a > fundamental * SWITCHING_HARMONIC_FRACTION)
        .fold(None, |best: Option<(f64, f64)>, (f, a)| match best {
            Some((_, best_a)) if best_a >= a => best,
            _ => Some((f, a)),
        });

    match strongest {
        Some((f, _)) => Hertz(f),
        None => Hertz(harmonics.frequencies[1]),
    }
}

/// Resample a waveform to a power-of-two point count, if it is not one.
pub fn make_power_of_two(waveform: &Waveform, config: &ProcessingConfig) -> DspResult<Waveform> {
    if waveform.len().is_power_of_two() {
        return Ok(waveform.clone());
    }
    let normalized = sample(waveform, None, config)?;
    if !is_sampled(waveform, config) && waveform.len() > config.number_points {
        tracing::warn!(from = waveform.len(), to = normalized.len(), "Resampled waveform up to a power of two");
    }
    Ok(normalized)
}

/// [`make_power_of_two`] on every waveform of the operating point.
pub fn operating_point_power_of_two(point: &OperatingPoint, config: &ProcessingConfig) -> DspResult<OperatingPoint> {
    let mut normalized = point.clone();
    for excitation in &mut normalized.excitations_per_winding {
        for signal in [&mut excitation.current, &mut excitation.voltage, &mut excitation.magnetizing_current]
            .into_iter()
            .flatten()
        {
            if let Some(waveform) = signal.waveform.as_mut() {
                *waveform = make_power_of_two(waveform, config)?;
            }
        }
    }
    Ok(normalized)
}

/// Waveform coefficient of the primary voltage.
pub fn operating_point_waveform_coefficient(point: &OperatingPoint, config: &ProcessingConfig) -> DspResult<f64> {
    let primary = point.primary().ok_or(DspError::MissingExcitation)?;
    let voltage = primary.voltage.as_ref().ok_or(DspError::MissingSignal("voltage"))?;
    let described = match voltage.processed.as_ref().and_then(|p| p.rms) {
        Some(_) => voltage.clone(),
        None => {
            let (waveform, processed) = waveform_of(voltage, primary.frequency, config)?;
            describe(waveform, primary.frequency, processed.as_ref(), config)?
        }
    };
    let waveform = described.waveform.as_ref().ok_or(DspError::UnresolvableSignal)?;
    let rms = described.processed.as_ref().and_then(|p| p.rms).ok_or(DspError::MissingSignal("voltage rms"))?;
    waveform_coefficient(waveform, primary.frequency, rms, config)
}

/// Mean absolute instantaneous power of a winding.
pub fn excitation_power(excitation: &WindingExcitation, config: &ProcessingConfig) -> DspResult<f64> {
    let voltage = excitation.voltage.as_ref().ok_or(DspError::MissingSignal("voltage"))?;
    let current = excitation.current.as_ref().ok_or(DspError::MissingSignal("current"))?;
    let (voltage, _) = waveform_of(voltage, excitation.frequency, config)?;
    let (current, _) = waveform_of(current, excitation.frequency, config)?;
    instantaneous_power(&voltage, &current, excitation.frequency, config)
}
