//! # lib-dsp
//!
//! Waveform processing and harmonic analysis engine for magnetic component
//! excitations.
//!
//! This crate turns whatever is known about a winding's current or voltage
//! into the complete description loss models need:
//!
//! - **Sampling**: Uniform resampling and corner compression of one period
//! - **Classification**: Recognition of the canonical converter shapes
//! - **Statistics**: Offset, peak-to-peak, duty cycle, RMS, THD, effective frequency
//! - **Harmonics**: Magnitude spectra through a cached real FFT, and back
//! - **Calculus**: Induced voltage and magnetizing current
//! - **Reflection**: Signals referred across a turns ratio
//! - **Excitations**: Completion of whole operating points
//!
//! Every operation is a pure function of its inputs and an explicit
//! [`ProcessingConfig`](lib_types::config::ProcessingConfig).

pub mod error;
pub mod fft;
pub mod sampling;
pub mod compress;
pub mod classify;
pub mod statistics;
pub mod harmonics;
pub mod analysis;
pub mod synthesis;
pub mod calculus;
pub mod power;
pub mod reflect;
pub mod excitation;
pub mod adjust;
pub mod quick;

pub use error::{DspError, DspResult};
pub use fft::FftEngine;
pub use analysis::describe;
pub use classify::classify;
pub use calculus::{induced_voltage, magnetizing_current, DcBias, MagnetizingOptions};
pub use excitation::{check_integrity, complete_signal, process_operating_point};
pub use quick::{quick_operating_point, QuickOperatingPoint};
pub use reflect::reflect;
pub use synthesis::{create_waveform, standardize, ShapeParameters};
