//! Run description loading and validation.

use anyhow::{Context, Result};
use lib_types::config::ProcessingConfig;
use lib_types::signal::{DesignRequirements, OperatingPoint};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level run description.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run name/description.
    pub name: String,

    /// Engine settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Magnetizing inductance and turns ratios of the component.
    pub design_requirements: DesignRequirements,

    /// Operating points to complete.
    #[serde(default)]
    pub operating_points: Vec<OperatingPoint>,

    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write the completed operating points, waveforms included.
    #[serde(default = "default_true")]
    pub operating_points: bool,

    /// Keep only DC and the main harmonics of every spectrum written.
    #[serde(default)]
    pub prune_threshold: Option<f64>,
}

fn default_true() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            operating_points: default_true(),
            prune_threshold: None,
        }
    }
}

/// Read a JSON or TOML document, chosen by extension.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;

    if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?} as JSON", path))
    } else {
        // Assume TOML
        toml::from_str(&content).with_context(|| format!("Failed to parse {:?} as TOML", path))
    }
}

/// Load a run description from a file.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let config: RunConfig = read_document(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate engine settings.
pub fn validate_processing(processing: &ProcessingConfig) -> Result<()> {
    if processing.number_points < 8 || !processing.number_points.is_power_of_two() {
        anyhow::bail!(
            "number_points must be a power of two of at least 8 (got {})",
            processing.number_points
        );
    }

    for (name, value) in [
        ("harmonic_threshold", processing.harmonic_threshold),
        ("compression_tolerance", processing.compression_tolerance),
        ("sinusoid_tolerance", processing.sinusoid_tolerance),
    ] {
        if !(value > 0.0 && value < 1.0) {
            anyhow::bail!("{} must lie in (0, 1) (got {})", name, value);
        }
    }

    Ok(())
}

/// Validate configuration.
fn validate_config(config: &RunConfig) -> Result<()> {
    validate_processing(&config.processing)?;

    match config.design_requirements.inductance() {
        Some(inductance) if inductance.0 > 0.0 && inductance.0.is_finite() => {}
        Some(inductance) => anyhow::bail!("Magnetizing inductance must be positive (got {} H)", inductance.0),
        None => anyhow::bail!("Magnetizing inductance has no minimum, nominal or maximum value"),
    }

    if let Some(ratio) = config
        .design_requirements
        .turns_ratio_values()
        .into_iter()
        .find(|r| !(*r > 0.0 && r.is_finite()))
    {
        anyhow::bail!("Turns ratios must be positive (got {})", ratio);
    }

    if config.operating_points.is_empty() {
        anyhow::bail!("Run '{}' has no operating points", config.name);
    }

    if let Some(threshold) = config.output.prune_threshold {
        if !(threshold > 0.0 && threshold < 1.0) {
            anyhow::bail!("prune_threshold must lie in (0, 1) (got {})", threshold);
        }
    }

    Ok(())
}
