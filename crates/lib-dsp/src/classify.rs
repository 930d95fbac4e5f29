//! Waveform shape recognition.
//!
//! Sampled waveforms are compressed to their corners first; corner layouts
//! are then matched against an ordered rule table. The first matching rule
//! wins. Waveforms that match no rule are tested for a sinusoid by fitting
//! the fundamental; anything else is `Custom`.

use crate::compress::compress;
use crate::error::DspResult;
use crate::sampling::{is_sampled, sample};
use lib_types::config::ProcessingConfig;
use lib_types::waveform::{Waveform, WaveformLabel};
use std::f64::consts::PI;

/// Corner layout under test, with the tolerances used to compare it.
pub struct Corners<'a> {
    pub time: &'a [f64],
    pub data: &'a [f64],
    /// Time tolerance for coincident corners.
    time_tolerance: f64,
    /// Value tolerance for equal levels.
    level_tolerance: f64,
    peak_to_peak: f64,
}

impl<'a> Corners<'a> {
    pub fn new(waveform: &'a Waveform, config: &ProcessingConfig) -> Self {
        let period = waveform.span().0;
        let peak_to_peak = waveform.peak_to_peak();
        Self {
            time: &waveform.time,
            data: &waveform.data,
            time_tolerance: config.corner_tolerance(period),
            level_tolerance: 1e-9 * peak_to_peak.max(f64::MIN_POSITIVE),
            peak_to_peak,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Corners `i` and `j` happen at the same instant.
    #[inline]
    fn coincide(&self, i: usize, j: usize) -> bool {
        (self.time[i] - self.time[j]).abs() <= self.time_tolerance
    }

    /// Corners `i` and `j` sit at the same level.
    #[inline]
    fn level(&self, i: usize, j: usize) -> bool {
        (self.data[i] - self.data[j]).abs() <= self.level_tolerance
    }

    /// Two durations agree within the corner tolerance.
    #[inline]
    fn same_duration(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.time_tolerance
    }

    /// A volt-second style area is negligible for this layout.
    #[inline]
    fn balanced(&self, area: f64) -> bool {
        area.abs() <= self.peak_to_peak * self.time_tolerance
    }
}

/// One entry of the shape table.
pub struct ShapeRule {
    pub label: WaveformLabel,
    pub points: usize,
    pub matches: fn(&Corners<'_>) -> bool,
}

/// Shape table, in matching order.
pub const SHAPE_RULES: &[ShapeRule] = &[
    ShapeRule {
        label: WaveformLabel::Triangular,
        points: 3,
        matches: |c| c.level(0, 2),
    },
    ShapeRule {
        label: WaveformLabel::UnipolarTriangular,
        points: 4,
        matches: rising_ramp,
    },
    // A sampled flyback secondary without offset has no closing jump.
    ShapeRule {
        label: WaveformLabel::FlybackSecondary,
        points: 4,
        matches: |c| falling_ramp(c) && c.data[0].abs() <= c.level_tolerance,
    },
    ShapeRule {
        label: WaveformLabel::UnipolarTriangular,
        points: 4,
        matches: falling_ramp,
    },
    ShapeRule {
        label: WaveformLabel::UnipolarRectangular,
        points: 5,
        matches: |c| !c.balanced(high_low_area(c)) && rising_rectangle(c),
    },
    ShapeRule {
        label: WaveformLabel::Rectangular,
        points: 5,
        matches: |c| c.balanced(high_low_area(c)) && rising_rectangle(c),
    },
    ShapeRule {
        label: WaveformLabel::Rectangular,
        points: 5,
        matches: |c| c.balanced(low_high_area(c)) && off_time_plateau(c),
    },
    ShapeRule {
        label: WaveformLabel::UnipolarRectangular,
        points: 5,
        matches: |c| !c.balanced(low_high_area(c)) && off_time_plateau(c),
    },
    ShapeRule {
        label: WaveformLabel::BipolarRectangular,
        points: 10,
        matches: |c| {
            [(0, 1), (2, 3), (4, 5), (6, 7), (8, 9)].iter().all(|&(i, j)| c.level(i, j))
                && [(1, 2), (3, 4), (5, 6), (7, 8)].iter().all(|&(i, j)| c.coincide(i, j))
                && c.level(0, 9)
        },
    },
    ShapeRule {
        label: WaveformLabel::BipolarTriangular,
        points: 6,
        matches: |c| {
            c.level(0, 1)
                && c.level(2, 3)
                && c.level(4, 5)
                && c.level(0, 5)
                && c.same_duration(c.time[2] - c.time[1], c.time[4] - c.time[3])
        },
    },
    ShapeRule {
        label: WaveformLabel::FlybackPrimary,
        points: 5,
        matches: |c| {
            c.coincide(0, 1)
                && c.data[1] < c.data[2]
                && c.coincide(2, 3)
                && c.level(3, 4)
                && c.level(0, 4)
        },
    },
    ShapeRule {
        label: WaveformLabel::FlybackSecondary,
        points: 5,
        matches: |c| {
            c.level(0, 1)
                && c.coincide(1, 2)
                && c.data[2] > c.data[3]
                && c.coincide(3, 4)
                && c.level(0, 4)
        },
    },
];

/// Jump at the start, flat top, jump down, flat bottom.
pub fn rising_rectangle(c: &Corners<'_>) -> bool {
    c.len() == 5 && c.coincide(0, 1) && c.level(1, 2) && c.coincide(2, 3) && c.level(3, 4) && c.level(0, 4)
}

/// Flat, jump to a second level held until the end of the period, jump
/// back.
pub fn off_time_plateau(c: &Corners<'_>) -> bool {
    c.len() == 5 && c.level(0, 1) && c.coincide(1, 2) && c.level(2, 3) && c.coincide(3, 4) && c.level(0, 4)
}

/// Ramp up, drop back to the start level, flat.
pub fn rising_ramp(c: &Corners<'_>) -> bool {
    c.len() == 4 && c.coincide(1, 2) && c.level(2, 3) && c.level(0, 3)
}

/// Flat, jump up, ramp back down to the start level.
pub fn falling_ramp(c: &Corners<'_>) -> bool {
    c.len() == 4 && c.level(0, 1) && c.coincide(1, 2) && c.data[2] > c.data[3] && c.level(0, 3)
}

fn high_low_area(c: &Corners<'_>) -> f64 {
    (c.time[2] - c.time[0]) * c.data[2] + (c.time[4] - c.time[2]) * c.data[4]
}

fn low_high_area(c: &Corners<'_>) -> f64 {
    (c.time[1] - c.time[0]) * c.data[1] + (c.time[3] - c.time[2]) * c.data[3]
}

/// Match a corner layout against the shape table.
pub fn match_corners(corners: &Corners<'_>) -> Option<WaveformLabel> {
    SHAPE_RULES
        .iter()
        .find(|rule| rule.points == corners.len() && (rule.matches)(corners))
        .map(|rule| rule.label)
}

/// Recognize the shape of one period.
pub fn classify(waveform: &Waveform, config: &ProcessingConfig) -> DspResult<WaveformLabel> {
    let sampled_input = is_sampled(waveform, config);
    let corners_waveform = if sampled_input {
        compress(waveform, config.compression_tolerance)?
    } else {
        waveform.clone()
    };

    if let Some(label) = match_corners(&Corners::new(&corners_waveform, config)) {
        return Ok(label);
    }

    let sampled = if sampled_input {
        waveform.clone()
    } else {
        sample(waveform, None, config)?
    };

    let error = sinusoid_fit_error(&sampled.data);
    tracing::trace!(points = corners_waveform.len(), fit_error = error, "No corner rule matched");

    if error < config.sinusoid_tolerance {
        Ok(WaveformLabel::Sinusoidal)
    } else {
        Ok(WaveformLabel::Custom)
    }
}

/// Normalized error of the best fundamental-plus-mean fit to one period of
/// uniform samples: `sum|d - fit| / sum|d - mean|`.
///
/// The fit is phase-agnostic. A constant input returns infinity.
pub fn sinusoid_fit_error(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 4 {
        return f64::INFINITY;
    }

    let mean = samples.iter().sum::<f64>() / n as f64;
    let step = 2.0 * PI / n as f64;
    let (cos_sum, sin_sum) = samples.iter().enumerate().fold((0.0, 0.0), |(c, s), (i, &d)| {
        let angle = step * i as f64;
        (c + d * angle.cos(), s + d * angle.sin())
    });
    let a = 2.0 * cos_sum / n as f64;
    let b = 2.0 * sin_sum / n as f64;

    let (residual, spread) = samples.iter().enumerate().fold((0.0, 0.0), |(r, s), (i, &d)| {
        let angle = step * i as f64;
        let fit = mean + a * angle.cos() + b * angle.sin();
        (r + (d - fit).abs(), s + (d - mean).abs())
    });

    if spread == 0.0 {
        return f64::INFINITY;
    }
    residual / spread
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{create_waveform, ShapeParameters};
    use lib_types::units::{Hertz, Seconds};

    #[test]
    fn test_triangular_corners() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(vec![0.0, 2.5e-6, 1e-5], vec![-5.0, 5.0, -5.0]);

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::Triangular);
    }

    #[test]
    fn test_balanced_rectangle_is_rectangular() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(
            vec![0.0, 0.0, 2.5e-6, 2.5e-6, 1e-5],
            vec![-2.5, 7.5, 7.5, -2.5, -2.5],
        );

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::Rectangular);
    }

    #[test]
    fn test_unbalanced_rectangle_is_unipolar() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(
            vec![0.0, 0.0, 2.5e-6, 2.5e-6, 1e-5],
            vec![0.0, 60.0, 60.0, 0.0, 0.0],
        );

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::UnipolarRectangular);
    }

    #[test]
    fn test_flyback_primary_ramp() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(
            vec![0.0, 0.0, 5e-6, 5e-6, 1e-5],
            vec![0.0, 2.0, 12.0, 0.0, 0.0],
        );

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::FlybackPrimary);
    }

    #[test]
    fn test_sampled_flyback_secondary_without_offset() {
        let config = ProcessingConfig::default();
        let shape = ShapeParameters::new(WaveformLabel::FlybackSecondary, 10.0).with_duty_cycle(0.4);
        let corners = create_waveform(&shape, Hertz(100e3), &config).unwrap();
        let sampled = sample(&corners, None, &config).unwrap();

        // No closing jump survives compression.
        assert_eq!(compress(&sampled, config.compression_tolerance).unwrap().len(), 4);
        assert_eq!(classify(&sampled, &config).unwrap(), WaveformLabel::FlybackSecondary);
    }

    #[test]
    fn test_off_time_ramp_is_unipolar_triangular() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(vec![0.0, 4e-6, 4e-6, 1e-5], vec![2.0, 2.0, 10.0, 2.0]);

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::UnipolarTriangular);
    }

    #[test]
    fn test_sampled_sine_is_sinusoidal() {
        let config = ProcessingConfig::default();
        let data: Vec<f64> = (0..128).map(|i| 3.0 * (2.0 * PI * i as f64 / 128.0).cos() + 1.0).collect();
        let wf = Waveform::equidistant(data, Seconds::from_us(10.0));

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::Sinusoidal);
    }

    #[test]
    fn test_irregular_shape_is_custom() {
        let config = ProcessingConfig::default();
        let wf = Waveform::new(
            vec![0.0, 2.5e-6, 4.2e-6, 7.5e-6, 1e-5],
            vec![0.0, 3.0, 8.0, 3.0, 0.0],
        );

        assert_eq!(classify(&wf, &config).unwrap(), WaveformLabel::Custom);
    }

    #[test]
    fn test_fit_error_of_square_wave_is_large() {
        let data: Vec<f64> = (0..128).map(|i| if i < 64 { 1.0 } else { -1.0 }).collect();
        assert!(sinusoid_fit_error(&data) > 0.05);
        assert!(sinusoid_fit_error(&[1.0; 16]).is_infinite());
    }
}
