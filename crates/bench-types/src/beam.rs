use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit-path identifier locating a beam segment in the split tree.
///
/// The root beam is `1`. A two-branch split at index `i` produces the
/// transmitted child `i << 1` and the reflected child `(i << 1) | 1`.
/// Indices strictly increase with split depth and are never reused
/// across siblings. Single-output interactions (mirror, lens, ...)
/// continue under the parent's index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BeamIndex(u64);

impl BeamIndex {
    pub const ROOT: Self = Self(1);

    /// Maximum split depth before the bit path would overflow.
    pub const MAX_SPLIT_DEPTH: u32 = 62;

    /// Construct from a raw path value. Zero is not a valid path.
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// Index of the transmitted (primary) child of a two-branch split.
    ///
    /// Callers must not split deeper than `MAX_SPLIT_DEPTH`.
    pub fn transmitted(self) -> Self {
        Self(self.0 << 1)
    }

    /// Index of the reflected (secondary) child of a two-branch split.
    pub fn reflected(self) -> Self {
        Self((self.0 << 1) | 1)
    }

    pub fn parent(self) -> Option<Self> {
        if self.0 <= 1 {
            None
        } else {
            Some(Self(self.0 >> 1))
        }
    }

    /// Number of splits between the root and this index.
    pub fn split_depth(self) -> u32 {
        u64::BITS - 1 - self.0.leading_zeros()
    }

    /// True if `self` is `ancestor` or reachable from it by repeated
    /// left-shift / shift-or-1.
    pub fn descends_from(self, ancestor: Self) -> bool {
        let mut i = self.0;
        while i >= ancestor.0 {
            if i == ancestor.0 {
                return true;
            }
            i >>= 1;
        }
        false
    }
}

impl fmt::Display for BeamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:b}", self.0)
    }
}

/// Physical attributes carried along a beam segment.
///
/// All fields except `power` are optional; variants that render segment
/// width or taper use `waist` and `focal_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamAttrs {
    /// Wavelength in nanometers.
    pub wavelength: Option<f64>,
    /// Relative optical power (the root beam is conventionally 1.0).
    pub power: f64,
    /// Linear polarization angle in radians.
    pub polarization: Option<f64>,
    /// Beam waist radius in layout units.
    pub waist: Option<f64>,
    /// Rate of waist change per unit of propagation (negative = converging).
    pub focal_rate: Option<f64>,
}

impl Default for BeamAttrs {
    fn default() -> Self {
        Self {
            wavelength: None,
            power: 1.0,
            polarization: None,
            waist: None,
            focal_rate: None,
        }
    }
}

impl BeamAttrs {
    pub fn with_wavelength(wavelength: f64) -> Self {
        Self {
            wavelength: Some(wavelength),
            ..Self::default()
        }
    }

    pub fn scaled_power(&self, factor: f64) -> Self {
        Self {
            power: self.power * factor,
            ..*self
        }
    }
}
