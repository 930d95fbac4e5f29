//! Operating point completion.
//!
//! Given the excitation of the primary winding (current, voltage or both,
//! in any of the three signal forms), the turns ratios and the
//! magnetizing inductance, fill in everything the loss models downstream
//! need: the missing primary signal, the secondary excitations, the
//! magnetizing current of every winding, and complete descriptors
//! (waveform, statistics, spectrum) for all of them.

use crate::analysis::describe;
use crate::calculus::{induced_voltage, magnetizing_current, DcBias, MagnetizingOptions};
use crate::error::{DspError, DspResult};
use crate::power::include_dc_offset;
use crate::reflect::reflect;
use crate::synthesis::standardize;
use lib_types::config::ProcessingConfig;
use lib_types::signal::{DesignRequirements, OperatingPoint, SignalDescriptor, WindingExcitation};
use lib_types::units::{Henries, Hertz};

/// Standardize a signal and compute its statistics and spectrum.
///
/// Statistics already present keep their shape parameters.
pub fn complete_signal(
    signal: &SignalDescriptor,
    frequency: Hertz,
    config: &ProcessingConfig,
) -> DspResult<SignalDescriptor> {
    let standardized = standardize(signal, frequency, config)?;
    let waveform = standardized.waveform.ok_or(DspError::UnresolvableSignal)?;
    describe(waveform, frequency, standardized.processed.as_ref(), config)
}

fn turns_ratios(requirements: &DesignRequirements) -> DspResult<Vec<f64>> {
    let ratios = requirements.turns_ratio_values();
    match ratios.iter().find(|r| !(**r > 0.0 && r.is_finite())) {
        Some(&bad) => Err(DspError::InvalidTurnsRatio(bad)),
        None => Ok(ratios),
    }
}

fn positive_inductance(requirements: &DesignRequirements) -> Option<Henries> {
    requirements.inductance().filter(|l| l.0 > 0.0 && l.0.is_finite())
}

fn required_inductance(requirements: &DesignRequirements) -> DspResult<Henries> {
    positive_inductance(requirements)
        .ok_or_else(|| DspError::InvalidInductance(requirements.inductance().map_or(0.0, |l| l.0)))
}

/// Shape-aware reflection of a primary signal, completed.
fn reflected(signal: &SignalDescriptor, ratio: f64, frequency: Hertz, config: &ProcessingConfig) -> DspResult<SignalDescriptor> {
    let label = signal.label();
    let reflected = reflect(signal, ratio, label, frequency, config)?;
    complete_signal(&reflected, frequency, config)
}

/// Check that an operating point can be completed and fill in what every
/// winding is missing locally.
///
/// Windings with a voltage and no current get their magnetizing current as
/// current; windings with a current and no voltage get the induced
/// voltage. When a single turns ratio is given for a single winding, the
/// secondary excitation is reflected from the primary. Guessing more than
/// one secondary is refused before anything is derived.
pub fn check_integrity(
    point: &OperatingPoint,
    requirements: &DesignRequirements,
    config: &ProcessingConfig,
) -> DspResult<OperatingPoint> {
    let windings = point.excitations_per_winding.len();
    if windings == 0 {
        return Err(DspError::MissingExcitation);
    }

    let ratios = turns_ratios(requirements)?;
    let guess_secondary = ratios.len() > windings - 1;
    if guess_secondary && !(ratios.len() == 1 && windings == 1) {
        return Err(DspError::TurnsRatioCardinality {
            turns_ratios: ratios.len(),
            windings,
        });
    }

    let mut excitations = Vec::with_capacity(windings.max(ratios.len() + 1));
    for (index, excitation) in point.excitations_per_winding.iter().enumerate() {
        let frequency = excitation.frequency;
        let mut completed = excitation.clone();

        if let Some(voltage) = &excitation.voltage {
            completed.voltage = Some(standardize(voltage, frequency, config)?);
        }
        if let Some(current) = &excitation.current {
            completed.current = Some(standardize(current, frequency, config)?);
        }

        match (&completed.current, &completed.voltage) {
            (None, Some(_)) => {
                let inductance = required_inductance(requirements)?;
                let options = MagnetizingOptions::default().compressed();
                completed.current = Some(magnetizing_current(&completed, inductance, options, config)?);
            }
            (Some(_), None) => {
                if let Some(inductance) = positive_inductance(requirements) {
                    completed.voltage = Some(induced_voltage(&completed, inductance, config)?);
                }
            }
            (None, None) if index == 0 => return Err(DspError::MissingSignal("primary current or voltage")),
            _ => {}
        }
        excitations.push(completed);
    }

    if guess_secondary {
        let primary = &excitations[0];
        let frequency = primary.frequency;
        let mut secondary = primary.clone();
        secondary.name = None;
        secondary.voltage = match &primary.voltage {
            Some(voltage) => Some(reflect(voltage, 1.0 / ratios[0], voltage.label(), frequency, config)?),
            None => None,
        };
        secondary.current = match &primary.current {
            Some(current) => Some(reflect(current, ratios[0], current.label(), frequency, config)?),
            None => None,
        };
        tracing::warn!(turns_ratio = ratios[0], "Created the secondary excitation from the primary");
        excitations.push(secondary);
    }

    Ok(OperatingPoint {
        excitations_per_winding: excitations,
        ..point.clone()
    })
}

/// Complete an operating point.
///
/// Runs [`check_integrity`] and completes every current and voltage.
/// Secondary `i` takes whatever it is missing from the primary, reflected
/// through `turns_ratios[i - 1]`; a secondary with no signal of its own and
/// no turns ratio is an error. With a known inductance every winding also
/// gets its magnetizing current.
pub fn process_operating_point(
    point: &OperatingPoint,
    requirements: &DesignRequirements,
    config: &ProcessingConfig,
) -> DspResult<OperatingPoint> {
    let point = check_integrity(point, requirements, config)?;
    let ratios = turns_ratios(requirements)?;
    let windings = point.excitations_per_winding.len();

    let mut excitations: Vec<WindingExcitation> = Vec::with_capacity(windings);

    for (index, excitation) in point.excitations_per_winding.iter().enumerate() {
        let mut completed = excitation.clone();
        let from_primary = match (index, excitations.first()) {
            (0, _) | (_, None) => None,
            (_, Some(primary)) => match ratios.get(index - 1) {
                Some(&ratio) => Some((ratio, primary)),
                None if excitation.current.is_none() && excitation.voltage.is_none() => {
                    return Err(DspError::TurnsRatioCardinality {
                        turns_ratios: ratios.len(),
                        windings,
                    })
                }
                None => None,
            },
        };
        if let Some((_, primary)) = from_primary {
            if !(completed.frequency.0 > 0.0) {
                completed.frequency = primary.frequency;
            }
        }
        let frequency = completed.frequency;

        completed.current = match (&excitation.current, from_primary) {
            (Some(current), _) => Some(complete_signal(current, frequency, config)?),
            (None, Some((ratio, primary))) => match &primary.current {
                Some(current) => Some(reflected(current, ratio, frequency, config)?),
                None => None,
            },
            (None, None) => None,
        };

        completed.voltage = match (&excitation.voltage, from_primary) {
            (Some(voltage), _) => Some(complete_signal(voltage, frequency, config)?),
            (None, Some((ratio, primary))) => match &primary.voltage {
                Some(voltage) => Some(reflected(voltage, 1.0 / ratio, frequency, config)?),
                None => None,
            },
            (None, None) => None,
        };

        excitations.push(completed);
    }

    let mut point = OperatingPoint {
        excitations_per_winding: excitations,
        ..point
    };

    if let Some(inductance) = positive_inductance(requirements) {
        if let Some(index) = point.excitations_per_winding.iter().position(|e| e.voltage.is_none()) {
            tracing::debug!(winding = index, "No voltage to integrate");
            return Err(DspError::MissingSignal("winding voltage"));
        }

        let dc_bias = if include_dc_offset(&point, config)? {
            DcBias::FromCurrent
        } else {
            DcBias::None
        };
        let options = MagnetizingOptions::default().with_dc_bias(dc_bias);

        for index in 0..point.excitations_per_winding.len() {
            if point.excitations_per_winding[index].magnetizing_current.is_none() {
                let current = magnetizing_current(&point.excitations_per_winding[index], inductance, options, config)?;
                point.excitations_per_winding[index].magnetizing_current = Some(current);
            }
        }
    }

    tracing::info!(
        name = point.name.as_deref().unwrap_or("unnamed"),
        windings = point.excitations_per_winding.len(),
        "Processed operating point"
    );
    Ok(point)
}
