//! Waveform to complete signal descriptor.

use crate::error::DspResult;
use crate::harmonics::decompose;
use crate::sampling::{is_sampled, sample};
use crate::statistics::processed_with_resample;
use lib_types::config::ProcessingConfig;
use lib_types::signal::{Processed, SignalDescriptor};
use lib_types::units::Hertz;
use lib_types::waveform::Waveform;

/// Resample `waveform` unless it already sits on the canonical grid.
pub fn sampled_or_resampled(
    waveform: &Waveform,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<Waveform> {
    if is_sampled(waveform, config) {
        Ok(waveform.clone())
    } else {
        sample(waveform, Some(frequency), config)
    }
}

/// Descriptor holding `waveform` with freshly computed spectrum and
/// statistics.
///
/// `existing` statistics keep their shape parameters; spectral and
/// integral quantities are always recomputed.
pub fn describe(
    waveform: Waveform,
    frequency: Hertz,
    existing: Option<&Processed>,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let sampled = sampled_or_resampled(&waveform, frequency, config)?;
    describe_sampled(waveform, &sampled, frequency, existing, config)
}

/// Like [`describe`], with the resample already at hand. The stored
/// waveform may differ from `sampled` in layout (e.g. compressed corners).
pub fn describe_sampled(
    waveform: Waveform,
    sampled: &Waveform,
    frequency: Hertz,
    existing: Option<&Processed>,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let harmonics = decompose(sampled, frequency, config)?;
    let processed = processed_with_resample(&harmonics, &waveform, sampled, existing, config)?;

    Ok(SignalDescriptor {
        waveform: Some(waveform),
        processed: Some(processed),
        harmonics: Some(harmonics),
    })
}
