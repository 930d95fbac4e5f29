//! Operating points from a handful of numbers.

use crate::calculus::{magnetizing_current, DcBias, MagnetizingOptions};
use crate::error::{ensure_finite, DspError, DspResult};
use crate::excitation::process_operating_point;
use lib_types::config::ProcessingConfig;
use lib_types::signal::{
    DesignRequirements, DimensionWithTolerance, OperatingConditions, OperatingPoint, Processed, SignalDescriptor,
    WindingExcitation,
};
use lib_types::units::{Henries, Hertz};
use lib_types::waveform::WaveformLabel;
use serde::{Deserialize, Serialize};

/// Relative spread written around the nominal magnetizing inductance.
const INDUCTANCE_TOLERANCE: f64 = 0.2;

/// Primary voltage shape plus the design numbers around it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickOperatingPoint {
    pub frequency: Hertz,
    pub magnetizing_inductance: Henries,
    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f64,
    pub label: WaveformLabel,
    pub peak_to_peak: f64,
    #[serde(default = "default_duty_cycle")]
    pub duty_cycle: f64,
    #[serde(default)]
    pub dc_current: f64,
    #[serde(default)]
    pub turns_ratios: Vec<f64>,
}

fn default_ambient_temperature() -> f64 { 25.0 }
fn default_duty_cycle() -> f64 { 0.5 }

/// Build and process an operating point from a [`QuickOperatingPoint`].
///
/// Each winding gets the primary voltage shape with its peak-to-peak
/// scaled by the winding's turns ratio; its current is the magnetizing
/// current biased by `dc_current`. Also returns the design requirements
/// the point was processed against.
pub fn quick_operating_point(
    quick: &QuickOperatingPoint,
    config: &ProcessingConfig,
) -> DspResult<(OperatingPoint, DesignRequirements)> {
    let inductance = quick.magnetizing_inductance.0;
    if !(inductance > 0.0) || !inductance.is_finite() {
        return Err(DspError::InvalidInductance(inductance));
    }
    if let Some(&bad) = quick.turns_ratios.iter().find(|r| !(**r > 0.0 && r.is_finite())) {
        return Err(DspError::InvalidTurnsRatio(bad));
    }
    let dc_current = ensure_finite(quick.dc_current, "DC current")?;

    let requirements = DesignRequirements {
        magnetizing_inductance: DimensionWithTolerance {
            minimum: Some(inductance * (1.0 - INDUCTANCE_TOLERANCE)),
            nominal: Some(inductance),
            maximum: Some(inductance * (1.0 + INDUCTANCE_TOLERANCE)),
        },
        turns_ratios: quick.turns_ratios.iter().map(|&r| DimensionWithTolerance::nominal(r)).collect(),
    };

    let options = MagnetizingOptions::default()
        .with_dc_bias(DcBias::Fixed(dc_current))
        .compressed();

    let mut excitations = Vec::with_capacity(quick.turns_ratios.len() + 1);
    for scale in std::iter::once(1.0).chain(quick.turns_ratios.iter().copied()) {
        let voltage = Processed::parametric(quick.label, quick.peak_to_peak * scale, quick.duty_cycle, 0.0);
        let mut excitation =
            WindingExcitation::new(quick.frequency).with_voltage(SignalDescriptor::from_processed(voltage));

        let current = magnetizing_current(&excitation, quick.magnetizing_inductance, options, config)?;
        excitation.magnetizing_current = Some(current.clone());
        excitation.current = Some(current);
        excitations.push(excitation);
    }

    let point = OperatingPoint {
        name: Some("Operating Point".to_string()),
        conditions: OperatingConditions {
            name: None,
            ambient_temperature: quick.ambient_temperature,
        },
        excitations_per_winding: excitations,
    };

    // The turns ratios describe the windings listed, none is guessed.
    let processed = process_operating_point(&point, &requirements, config)?;
    Ok((processed, requirements))
}
