//! Run orchestration.

use crate::config::RunConfig;
use anyhow::{Context, Result};
use lib_dsp::adjust::{operating_point_waveform_coefficient, prune_excitation, switching_frequency};
use lib_dsp::excitation::process_operating_point;
use lib_types::signal::{OperatingPoint, SignalDescriptor};
use rayon::prelude::*;
use serde::Serialize;

/// Run orchestrator.
pub struct Orchestrator {
    config: RunConfig,
}

/// Headline statistics of one signal.
#[derive(Clone, Debug, Serialize)]
pub struct SignalSummary {
    pub label: String,
    pub peak_to_peak: f64,
    pub offset: f64,
    pub duty_cycle: Option<f64>,
    pub rms: Option<f64>,
    pub thd: Option<f64>,
    pub effective_frequency: Option<f64>,
    pub harmonics: usize,
}

impl SignalSummary {
    pub fn of(signal: Option<&SignalDescriptor>) -> Option<Self> {
        let signal = signal?;
        let processed = signal.processed.as_ref()?;
        Some(Self {
            label: processed.label.to_string(),
            peak_to_peak: processed.peak_to_peak,
            offset: processed.offset,
            duty_cycle: processed.duty_cycle,
            rms: processed.rms,
            thd: processed.thd,
            effective_frequency: processed.effective_frequency,
            harmonics: signal.harmonics.as_ref().map_or(0, |h| h.len()),
        })
    }
}

/// Per-winding summary.
#[derive(Clone, Debug, Serialize)]
pub struct WindingSummary {
    pub index: usize,
    pub frequency: f64,
    pub switching_frequency: f64,
    pub current: Option<SignalSummary>,
    pub voltage: Option<SignalSummary>,
    pub magnetizing_current: Option<SignalSummary>,
}

/// One completed operating point.
#[derive(Clone, Debug, Serialize)]
pub struct PointResult {
    pub name: String,
    pub waveform_coefficient: Option<f64>,
    pub windings: Vec<WindingSummary>,
    #[serde(skip)]
    pub operating_point: OperatingPoint,
}

/// Everything a run produced.
#[derive(Clone, Debug, Serialize)]
pub struct RunResults {
    pub name: String,
    pub points: Vec<PointResult>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: RunConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Complete every operating point of the run.
    ///
    /// Points are independent and processed in parallel; results keep the
    /// input order.
    pub fn run(&self) -> Result<RunResults> {
        tracing::info!(
            points = self.config.operating_points.len(),
            threads = rayon::current_num_threads(),
            "Starting run: {}",
            self.config.name
        );

        let points = self
            .config
            .operating_points
            .par_iter()
            .enumerate()
            .map(|(index, point)| self.process_point(index, point))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Run complete");
        Ok(RunResults {
            name: self.config.name.clone(),
            points,
        })
    }

    fn process_point(&self, index: usize, point: &OperatingPoint) -> Result<PointResult> {
        let processing = &self.config.processing;
        let name = point.name.clone().unwrap_or_else(|| format!("operating point {}", index));

        let mut processed = process_operating_point(point, &self.config.design_requirements, processing)
            .with_context(|| format!("Failed to process {}", name))?;

        if let Some(threshold) = self.config.output.prune_threshold {
            for excitation in &mut processed.excitations_per_winding {
                *excitation = prune_excitation(excitation, threshold, None)
                    .with_context(|| format!("Failed to prune harmonics of {}", name))?;
            }
        }

        let waveform_coefficient = match operating_point_waveform_coefficient(&processed, processing) {
            Ok(coefficient) => Some(coefficient),
            Err(e) => {
                tracing::debug!("No waveform coefficient for {}: {}", name, e);
                None
            }
        };

        let windings = processed
            .excitations_per_winding
            .iter()
            .enumerate()
            .map(|(index, excitation)| WindingSummary {
                index,
                frequency: excitation.frequency.0,
                switching_frequency: switching_frequency(excitation, processing).0,
                current: SignalSummary::of(excitation.current.as_ref()),
                voltage: SignalSummary::of(excitation.voltage.as_ref()),
                magnetizing_current: SignalSummary::of(excitation.magnetizing_current.as_ref()),
            })
            .collect();

        tracing::debug!("Completed {}", name);
        Ok(PointResult {
            name,
            waveform_coefficient,
            windings,
            operating_point: processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use lib_types::config::ProcessingConfig;
    use lib_types::signal::{DesignRequirements, DimensionWithTolerance, Processed, WindingExcitation};
    use lib_types::units::Hertz;
    use lib_types::waveform::WaveformLabel;

    fn run_config(points: usize, prune_threshold: Option<f64>) -> RunConfig {
        let voltage = Processed::parametric(WaveformLabel::Rectangular, 10.0, 0.25, 0.0);
        let point = OperatingPoint {
            excitations_per_winding: vec![
                WindingExcitation::new(Hertz(100e3)).with_voltage(SignalDescriptor::from_processed(voltage)),
            ],
            ..OperatingPoint::default()
        };

        RunConfig {
            name: "forward".to_string(),
            processing: ProcessingConfig::default(),
            design_requirements: DesignRequirements {
                magnetizing_inductance: DimensionWithTolerance::nominal(100e-6),
                turns_ratios: vec![DimensionWithTolerance::nominal(2.0)],
            },
            operating_points: vec![point; points],
            output: OutputConfig {
                operating_points: true,
                prune_threshold,
            },
        }
    }

    #[test]
    fn test_run_completes_every_point_in_order() {
        let results = Orchestrator::new(run_config(4, None)).unwrap().run().unwrap();

        assert_eq!(results.points.len(), 4);
        for (index, point) in results.points.iter().enumerate() {
            assert_eq!(point.name, format!("operating point {}", index));
            assert_eq!(point.windings.len(), 2);
            let voltage = point.windings[1].voltage.as_ref().unwrap();
            assert!((voltage.peak_to_peak - 5.0).abs() < 1e-9);
            assert!(point.waveform_coefficient.is_some());
        }
    }

    #[test]
    fn test_pruning_shrinks_spectra() {
        let full = Orchestrator::new(run_config(1, None)).unwrap().run().unwrap();
        let pruned = Orchestrator::new(run_config(1, Some(0.1))).unwrap().run().unwrap();

        let bins = |results: &RunResults| results.points[0].windings[0].voltage.as_ref().unwrap().harmonics;
        assert!(bins(&pruned) < bins(&full));
    }
}
