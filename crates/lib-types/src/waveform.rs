//! Time-domain waveform representation.
//!
//! A `Waveform` holds exactly one period of a periodic electrical signal as
//! aligned `time`/`data` sequences. The first and last time values bound the
//! period.
//!
//! # Corner Semantics
//!
//! Waveforms are piecewise linear between consecutive points. A vertical
//! jump is encoded by repeating a time value:
//!
//! ```text
//! time = [0, 0,   2.5e-6, 2.5e-6, 1e-5]
//! data = [0, 7.5, 7.5,    -2.5,   -2.5]
//! ```
//!
//! Uniformly sampled waveforms (the canonical layout used for spectral
//! analysis) omit the closing point at `t = T`: sample `i` sits at
//! `i * T / N` for `i = 0..N`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::units::Seconds;

/// One period of time/value samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Sample times in seconds, monotonically non-decreasing.
    pub time: Vec<f64>,

    /// Sample values (amperes or volts), aligned 1:1 with `time`.
    pub data: Vec<f64>,
}

impl Waveform {
    /// Create a waveform without validation.
    pub fn new(time: Vec<f64>, data: Vec<f64>) -> Self {
        Self { time, data }
    }

    /// Create a waveform, checking the structural invariants.
    pub fn try_new(time: Vec<f64>, data: Vec<f64>) -> Result<Self, &'static str> {
        if time.len() != data.len() {
            return Err("time and data must have the same length");
        }
        if data.len() < 2 {
            return Err("a waveform needs at least two points");
        }
        if time.windows(2).any(|w| w[1] < w[0]) {
            return Err("time must be monotonically non-decreasing");
        }
        Ok(Self { time, data })
    }

    /// Create a waveform whose points are spread evenly over one period,
    /// first point at `t = 0` and last point at `t = period`.
    pub fn equidistant(data: Vec<f64>, period: Seconds) -> Self {
        let time = linspace(0.0, period.0, data.len());
        Self { time, data }
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the waveform has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time span between the first and last point.
    #[inline]
    pub fn span(&self) -> Seconds {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => Seconds(last - first),
            _ => Seconds::ZERO,
        }
    }

    /// Maximum value.
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::MIN, f64::max)
    }

    /// Minimum value.
    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::MAX, f64::min)
    }

    /// Peak-to-peak amplitude.
    pub fn peak_to_peak(&self) -> f64 {
        let (min, max) = self.data.iter().fold((f64::MAX, f64::MIN), |(min, max), &v| {
            (min.min(v), max.max(v))
        });
        max - min
    }

    /// Largest excursion from zero, `max(max, -min)`.
    pub fn peak(&self) -> f64 {
        self.max().max(-self.min())
    }

    /// Arithmetic mean of the points.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// True when every time and data value is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().chain(self.time.iter()).all(|v| v.is_finite())
    }

    /// Copy with every value multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            time: self.time.clone(),
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Copy with `offset` added to every value.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            time: self.time.clone(),
            data: self.data.iter().map(|v| v + offset).collect(),
        }
    }

    /// Copy with the time axis multiplied by `factor`.
    pub fn time_scaled(&self, factor: f64) -> Self {
        Self {
            time: self.time.iter().map(|t| t * factor).collect(),
            data: self.data.clone(),
        }
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

/// Canonical waveform shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveformLabel {
    #[serde(rename = "Triangular")]
    Triangular,
    #[serde(rename = "Unipolar Triangular")]
    UnipolarTriangular,
    #[serde(rename = "Bipolar Triangular")]
    BipolarTriangular,
    #[serde(rename = "Rectangular")]
    Rectangular,
    #[serde(rename = "Unipolar Rectangular")]
    UnipolarRectangular,
    #[serde(rename = "Bipolar Rectangular")]
    BipolarRectangular,
    #[serde(rename = "Rectangular With Deadtime")]
    RectangularWithDeadtime,
    #[serde(rename = "Secondary Rectangular")]
    SecondaryRectangular,
    #[serde(rename = "Secondary Rectangular With Deadtime")]
    SecondaryRectangularWithDeadtime,
    #[serde(rename = "Flyback Primary")]
    FlybackPrimary,
    #[serde(rename = "Flyback Secondary")]
    FlybackSecondary,
    #[serde(rename = "Flyback Secondary With Deadtime")]
    FlybackSecondaryWithDeadtime,
    #[serde(rename = "Sinusoidal")]
    Sinusoidal,
    #[serde(rename = "Custom")]
    Custom,
}

impl WaveformLabel {
    /// Flyback primary or secondary shapes.
    pub fn is_flyback(&self) -> bool {
        matches!(
            self,
            Self::FlybackPrimary | Self::FlybackSecondary | Self::FlybackSecondaryWithDeadtime
        )
    }

    /// Shapes whose peak-to-peak is measured above the offset baseline.
    pub fn is_baseline_referenced(&self) -> bool {
        self.is_flyback() || matches!(self, Self::UnipolarTriangular | Self::UnipolarRectangular)
    }
}

impl fmt::Display for WaveformLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Triangular => "Triangular",
            Self::UnipolarTriangular => "Unipolar Triangular",
            Self::BipolarTriangular => "Bipolar Triangular",
            Self::Rectangular => "Rectangular",
            Self::UnipolarRectangular => "Unipolar Rectangular",
            Self::BipolarRectangular => "Bipolar Rectangular",
            Self::RectangularWithDeadtime => "Rectangular With Deadtime",
            Self::SecondaryRectangular => "Secondary Rectangular",
            Self::SecondaryRectangularWithDeadtime => "Secondary Rectangular With Deadtime",
            Self::FlybackPrimary => "Flyback Primary",
            Self::FlybackSecondary => "Flyback Secondary",
            Self::FlybackSecondaryWithDeadtime => "Flyback Secondary With Deadtime",
            Self::Sinusoidal => "Sinusoidal",
            Self::Custom => "Custom",
        };
        f.write_str(name)
    }
}
