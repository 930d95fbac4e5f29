//! Unit newtypes for the quantities that cross crate boundaries.
//!
//! Sample buffers and statistics stay plain `f64` in SI units; only periods,
//! frequencies and inductances are wrapped so a period is never passed where
//! a frequency is expected.

use serde::{Deserialize, Serialize};

/// A duration, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub f64);

impl Seconds {
    pub const ZERO: Self = Self(0.0);

    pub fn from_us(microseconds: f64) -> Self {
        Self(microseconds / 1e6)
    }

    /// The frequency whose period is this duration.
    pub fn to_frequency(self) -> Hertz {
        Hertz(self.0.recip())
    }
}

/// A repetition rate, in hertz.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hertz(pub f64);

impl Hertz {
    /// Length of one cycle.
    pub fn to_period(self) -> Seconds {
        Seconds(self.0.recip())
    }
}

/// An inductance, in henries.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Henries(pub f64);

impl Henries {
    pub fn from_uh(microhenries: f64) -> Self {
        Self(microhenries / 1e6)
    }
}
