//! Transforms behind the harmonic analysis.
//!
//! Forward spectra of sampled periods use the real-input planner of
//! `realfft`; sine-series synthesis builds a Hermitian spectrum and runs
//! the complex inverse of `rustfft`. Plans are cached per engine, so keep
//! one engine around when transforming many periods of the same length.

use crate::error::{DspError, DspResult};
use num_complex::Complex64;
use realfft::RealFftPlanner;
use rustfft::FftPlanner;

fn check_size(len: usize) -> DspResult<()> {
    if len < 2 || !len.is_power_of_two() {
        return Err(DspError::InvalidFftSize(len));
    }
    Ok(())
}

/// FFT engine with cached planners.
pub struct FftEngine {
    real: RealFftPlanner<f64>,
    complex: FftPlanner<f64>,
}

impl FftEngine {
    pub fn new() -> Self {
        Self {
            real: RealFftPlanner::new(),
            complex: FftPlanner::new(),
        }
    }

    /// Forward transform of real samples: `N / 2 + 1` unnormalized bins.
    pub fn rfft(&mut self, data: &[f64]) -> DspResult<Vec<Complex64>> {
        check_size(data.len())?;

        let plan = self.real.plan_fft_forward(data.len());
        let mut scratch = data.to_vec();
        let mut bins = plan.make_output_vec();
        plan.process(&mut scratch, &mut bins)
            .map_err(|e| DspError::NumericalInstability(e.to_string()))?;

        Ok(bins)
    }

    /// Inverse transform, normalized by `1 / N`.
    fn inverse(&mut self, spectrum: &mut [Complex64]) -> DspResult<()> {
        check_size(spectrum.len())?;

        let n = spectrum.len();
        self.complex.plan_fft_inverse(n).process(spectrum);
        spectrum.iter_mut().for_each(|x| *x /= n as f64);
        Ok(())
    }

    /// One-sided amplitude spectrum of one period of uniform samples.
    ///
    /// Returns N/2 bins: `|X0|/N` for DC and `2|Xk|/N` for `k = 1..N/2`.
    /// The Nyquist bin is dropped.
    pub fn amplitudes(&mut self, samples: &[f64]) -> DspResult<Vec<f64>> {
        let spectrum = self.rfft(samples)?;
        let n = samples.len() as f64;
        let half = samples.len() / 2;

        Ok(spectrum
            .iter()
            .take(half)
            .enumerate()
            .map(|(k, x)| if k == 0 { x.norm() / n } else { 2.0 * x.norm() / n })
            .collect())
    }

    /// Evaluate `a0 + sum(a_k * sin(2*pi*k*i/n))` at `i = 0..n`.
    ///
    /// `bins` holds `(harmonic index, amplitude)` pairs; index 0 is DC.
    /// Every index must stay below the Nyquist index `n/2`.
    pub fn sine_series(&mut self, bins: &[(usize, f64)], n: usize) -> DspResult<Vec<f64>> {
        check_size(n)?;

        let scale = n as f64;
        let mut spectrum = vec![Complex64::new(0.0, 0.0); n];
        for &(k, amplitude) in bins {
            if k == 0 {
                spectrum[0] += Complex64::new(amplitude * scale, 0.0);
                continue;
            }
            if 2 * k >= n {
                return Err(DspError::InsufficientData { needed: 2 * k + 1, got: n });
            }
            // sin(x) = (e^{ix} - e^{-ix}) / 2i
            spectrum[k] += Complex64::new(0.0, -amplitude * scale / 2.0);
            spectrum[n - k] += Complex64::new(0.0, amplitude * scale / 2.0);
        }

        self.inverse(&mut spectrum)?;
        Ok(spectrum.iter().map(|c| c.re).collect())
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}
