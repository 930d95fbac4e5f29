//! Harmonic decomposition and reconstruction.
//!
//! Spectra are one-sided magnitudes only: bin 0 is the mean and bin `k` is
//! the peak amplitude of the `k`-th harmonic. Phase is not kept, so
//! reconstruction superposes zero-phase sines; RMS survives the round trip
//! while the exact shape of a non-sinusoidal waveform does not.

use crate::error::{DspError, DspResult};
use crate::fft::FftEngine;
use crate::sampling::is_imported;
use lib_types::config::ProcessingConfig;
use lib_types::signal::Harmonics;
use lib_types::units::Hertz;
use lib_types::waveform::Waveform;

/// Spectrum of a uniformly sampled period.
///
/// The sample count must be a power of two. Imported waveforms are trimmed
/// when `config.trim_harmonics` is set: DC and the fundamental are always
/// kept, higher bins only when their amplitude reaches
/// `harmonic_threshold` times the fundamental.
pub fn decompose(sampled: &Waveform, frequency: Hertz, config: &ProcessingConfig) -> DspResult<Harmonics> {
    let mut engine = FftEngine::new();
    let amplitudes = engine.amplitudes(&sampled.data)?;
    let frequencies: Vec<f64> = (0..amplitudes.len()).map(|k| frequency.0 * k as f64).collect();
    let harmonics = Harmonics::new(frequencies, amplitudes);

    if !(config.trim_harmonics && is_imported(sampled, config)) {
        return Ok(harmonics);
    }

    let trimmed = trim(&harmonics, config.harmonic_threshold);
    tracing::debug!(from = harmonics.len(), to = trimmed.len(), "Trimmed imported spectrum");
    Ok(trimmed)
}

/// DC, fundamental and every bin at or above `threshold` times the
/// fundamental amplitude.
pub fn trim(harmonics: &Harmonics, threshold: f64) -> Harmonics {
    let fundamental = harmonics.amplitudes.get(1).copied().unwrap_or(0.0);
    let (frequencies, amplitudes) = harmonics
        .bins()
        .enumerate()
        .filter(|&(k, (_, a))| k < 2 || a >= threshold * fundamental)
        .map(|(_, bin)| bin)
        .unzip();
    Harmonics::new(frequencies, amplitudes)
}

/// Indexes (DC excluded) of the harmonics that matter for frequency
/// dependent losses.
///
/// Each bin is weighted by `amplitude * sqrt(frequency)`. The reference is
/// the strongest weighted bin, or the bin at `main_index` when given.
pub fn main_harmonic_indexes(harmonics: &Harmonics, threshold: f64, main_index: Option<usize>) -> Vec<usize> {
    let weighted: Vec<f64> = harmonics.bins().map(|(f, a)| a * f.max(0.0).sqrt()).collect();

    let reference = match main_index {
        Some(index) => weighted.get(index).copied().unwrap_or(0.0),
        None => weighted.iter().skip(1).copied().fold(0.0, f64::max),
    };

    weighted
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &w)| w >= reference * threshold)
        .map(|(k, _)| k)
        .collect()
}

/// DC plus the main harmonics.
pub fn prune(harmonics: &Harmonics, threshold: f64, main_index: Option<usize>) -> Harmonics {
    let mut frequencies = Vec::new();
    let mut amplitudes = Vec::new();
    if let (Some(&f), Some(&a)) = (harmonics.frequencies.first(), harmonics.amplitudes.first()) {
        frequencies.push(f);
        amplitudes.push(a);
    }
    for k in main_harmonic_indexes(harmonics, threshold, main_index) {
        frequencies.push(harmonics.frequencies[k]);
        amplitudes.push(harmonics.amplitudes[k]);
    }
    Harmonics::new(frequencies, amplitudes)
}

/// Time-domain period from a magnitude spectrum.
///
/// The result is in the sampled layout (no closing point) with at least
/// `number_points` samples and sixteen samples per period of the highest
/// harmonic.
pub fn reconstruct(harmonics: &Harmonics, frequency: Hertz, config: &ProcessingConfig) -> DspResult<Waveform> {
    if harmonics.is_empty() || harmonics.frequencies.len() != harmonics.amplitudes.len() {
        return Err(DspError::InsufficientData { needed: 1, got: harmonics.len() });
    }
    if frequency.0 <= 0.0 || !frequency.0.is_finite() {
        return Err(DspError::NonFinite("reconstruction frequency".to_string()));
    }

    let mut bins = Vec::with_capacity(harmonics.len());
    for (f, a) in harmonics.bins() {
        if !f.is_finite() || !a.is_finite() {
            return Err(DspError::NonFinite("harmonics".to_string()));
        }
        let multiplier = f / frequency.0;
        let index = multiplier.round();
        if (multiplier - index).abs() > 1e-6 {
            tracing::warn!(frequency = f, fundamental = frequency.0, "Harmonic is not an integer multiple; snapping to nearest bin");
        }
        bins.push((index.max(0.0) as usize, a));
    }

    let highest = bins.iter().map(|&(k, _)| k).max().unwrap_or(0);
    let n = config.number_points.max(16 * highest.max(1).next_power_of_two());

    let mut engine = FftEngine::new();
    let data = engine.sine_series(&bins, n)?;
    let period = frequency.to_period().0;
    let time = (0..n).map(|i| i as f64 * period / n as f64).collect();

    Ok(Waveform::new(time, data))
}
