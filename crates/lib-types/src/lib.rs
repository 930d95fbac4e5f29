//! # lib-types
//!
//! Data model shared by the waveform engine and the command line tool.
//!
//! [`Waveform`] holds one period of a signal as time/value pairs. A
//! [`SignalDescriptor`] pairs it with its spectrum and statistics, and an
//! [`OperatingPoint`] groups one [`WindingExcitation`] per winding.
//! [`ProcessingConfig`] carries the tolerances every engine call reads.

pub mod units;
pub mod waveform;
pub mod signal;
pub mod config;

pub use units::*;
pub use waveform::*;
pub use signal::*;
pub use config::*;
