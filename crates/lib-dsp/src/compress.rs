//! Corner extraction from uniformly sampled waveforms.

use crate::error::{DspError, DspResult};
use lib_types::waveform::Waveform;

/// Reduce a sampled waveform to the points where its slope changes.
///
/// The period is closed first by repeating the first value one sample step
/// after the last point. A point is kept when the slope leaving it differs
/// from the slope arriving at it by more than `tolerance` (relative). The
/// closing point is always kept, so the result spans the full period.
///
/// Flat-to-flat transitions compare `0/0` and are never kept; a slope that
/// starts after a flat section compares against zero and always is.
pub fn compress(waveform: &Waveform, tolerance: f64) -> DspResult<Waveform> {
    let n = waveform.len();
    if n < 2 || waveform.time.len() != n {
        return Err(DspError::InsufficientData { needed: 2, got: n.min(waveform.time.len()) });
    }

    let mut time = waveform.time.clone();
    let mut data = waveform.data.clone();
    time.push(time[n - 1] + (time[n - 1] - time[n - 2]));
    data.push(data[0]);

    let mut corners_time = Vec::new();
    let mut corners_data = Vec::new();
    let mut previous_slope = f64::MAX;

    for i in 0..n {
        let slope = (data[i + 1] - data[i]) / (time[i + 1] - time[i]);
        if ((slope - previous_slope) / previous_slope).abs() > tolerance {
            corners_time.push(time[i]);
            corners_data.push(data[i]);
        }
        previous_slope = slope;
    }

    corners_time.push(time[n]);
    corners_data.push(data[n]);

    tracing::trace!(from = n, to = corners_data.len(), "Compressed waveform");

    Ok(Waveform::new(corners_time, corners_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::units::Seconds;

    fn sampled(data: Vec<f64>) -> Waveform {
        let n = data.len() as f64;
        let period = 1e-5;
        let time = (0..data.len()).map(|i| i as f64 * period / n).collect();
        Waveform::new(time, data)
    }

    #[test]
    fn test_compress_rectangle_keeps_five_corners() {
        let mut data = vec![-2.5; 128];
        for v in data.iter_mut().take(33).skip(1) {
            *v = 7.5;
        }

        let corners = compress(&sampled(data), 0.01).unwrap();

        assert_eq!(corners.data, vec![-2.5, 7.5, 7.5, -2.5, -2.5]);
        assert!((corners.time[4] - 1e-5).abs() < 1e-15);
        assert!((corners.time[2] - 32.0 * 1e-5 / 128.0).abs() < 1e-15);
    }

    #[test]
    fn test_compress_triangle_keeps_apexes() {
        let data: Vec<f64> = (0..128)
            .map(|i| if i <= 64 { -5.0 + 10.0 * i as f64 / 64.0 } else { 5.0 - 10.0 * (i - 64) as f64 / 64.0 })
            .collect();

        let corners = compress(&sampled(data), 0.01).unwrap();

        assert_eq!(corners.len(), 3);
        assert!((corners.data[1] - 5.0).abs() < 1e-12);
        assert!((corners.data[2] + 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_compress_constant_keeps_endpoints() {
        let wf = Waveform::equidistant(vec![1.0; 16], Seconds::from_us(1.0));
        let corners = compress(&wf, 0.01).unwrap();

        assert_eq!(corners.len(), 2);
    }

    #[test]
    fn test_compress_rejects_single_point() {
        let wf = Waveform::new(vec![0.0], vec![1.0]);
        assert!(compress(&wf, 0.01).is_err());
    }
}
