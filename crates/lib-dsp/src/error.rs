//! Error types for waveform processing.

use thiserror::Error;

/// Errors that can occur while processing waveforms and excitations.
#[derive(Debug, Error)]
pub enum DspError {
    /// Transform length below two or not a power of two.
    #[error("FFT length {0} is not a power of two")]
    InvalidFftSize(usize),

    /// Paired buffers of different length.
    #[error("Expected {expected} values, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Too few points for the operation.
    #[error("Need at least {needed} points, found {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Time axis goes backwards.
    #[error("Time must be non-decreasing, violated at index {0}")]
    NonMonotonicTime(usize),

    /// Supplied frequency disagrees with the waveform period.
    #[error("Frequency {frequency} Hz does not match waveform time info ({waveform_frequency} Hz)")]
    FrequencyMismatch { frequency: f64, waveform_frequency: f64 },

    /// NaN or infinity in an input or a computed quantity.
    #[error("Non-finite value in {0}")]
    NonFinite(String),

    /// None of waveform, processed data or harmonics is present.
    #[error("Signal cannot be resolved: no waveform, processed data or harmonics")]
    UnresolvableSignal,

    /// A signal required by the operation is absent.
    #[error("Missing {0} signal")]
    MissingSignal(&'static str),

    /// Magnetizing inductance must be positive and finite.
    #[error("Magnetizing inductance must be positive, got {0} H")]
    InvalidInductance(f64),

    /// Turns ratio must be positive and finite.
    #[error("Turns ratio must be positive, got {0}")]
    InvalidTurnsRatio(f64),

    /// More secondaries would have to be guessed than the primary supports.
    #[error(
        "Missing excitation for more than one secondary ({turns_ratios} turns ratios, {windings} windings). Only one can be guessed"
    )]
    TurnsRatioCardinality { turns_ratios: usize, windings: usize },

    /// Duty cycle outside `[0, 1]`.
    #[error("Duty cycle must lie in [0, 1], got {0}")]
    InvalidDutyCycle(f64),

    /// Operating point without any winding excitation.
    #[error("Missing excitation for primary")]
    MissingExcitation,

    /// A resample instant could not be bracketed by the input waveform.
    #[error("Sampling failed at point {0}")]
    SamplingFailed(usize),

    /// A transform or fit produced an unusable result.
    #[error("Numerical failure: {0}")]
    NumericalInstability(String),
}

/// Result type for waveform processing.
pub type DspResult<T> = Result<T, DspError>;

/// Fail with `NonFinite` when `value` is NaN or infinite.
pub(crate) fn ensure_finite(value: f64, what: &str) -> DspResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DspError::NonFinite(what.to_string()))
    }
}
