use serde::{Deserialize, Serialize};

/// Shape of the optically active region of an interface, centered on the
/// component's position and lying in its interface plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Aperture {
    /// Circular aperture of the given diameter.
    Circular { diameter: f64 },
    /// Rectangular aperture, `dx` across the plane, `dy` vertical.
    Rect { dx: f64, dy: f64 },
}

/// A half-open wavelength interval `[min, max)` in nanometers.
/// `None` on either side means the bound is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl WavelengthRange {
    pub fn contains(&self, wavelength: f64) -> bool {
        let above_min = self.min.map_or(true, |lo| wavelength >= lo);
        let below_max = self.max.map_or(true, |hi| wavelength < hi);
        above_min && below_max
    }
}

/// Optical behavior of an interface. Each variant implements one uniform
/// "compute outputs" contract in the solver's interaction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Behavior {
    /// Total reflector: angle of incidence equals angle of reflection.
    Mirror,
    /// Partially reflective splitter. `ratio` of the power is reflected,
    /// the remainder transmitted.
    Sampler { ratio: f64 },
    /// Polarizing splitter at the given transmission axis (radians).
    /// Transmitted fraction is cos^2(polarization - angle).
    Polarizer { angle: f64 },
    /// Wavelength-selective reflector: wavelengths inside any listed range
    /// reflect, everything else transmits. A beam with no wavelength
    /// attribute transmits.
    Dichroic { ranges: Vec<WavelengthRange> },
    /// Thin lens with the given focal length (paraxial approximation).
    Lens { focal_length: f64 },
    /// Diffraction grating: fixed angular offset from the transmitted
    /// axis. When `directional`, the offset sign follows the side the
    /// beam arrives from.
    Diffractor { angle: f64, directional: bool },
    /// Pass-through with no directional change (inline markers, pickoffs).
    Transmissive,
}

/// Per-component description of optical behavior: what the solver needs
/// to test intersections and compute outgoing rays. The component's solid
/// body is opaque to the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub aperture: Aperture,
    /// Acceptance half-angle from the face normal, in radians. Hits at a
    /// steeper incidence pass through (unless blocked).
    pub acceptance: f64,
    /// Optional diameter of the physical region that stops a beam
    /// regardless of incidence angle. Typically larger than the aperture.
    pub blocking_diameter: Option<f64>,
    pub behavior: Behavior,
}

impl InterfaceDescriptor {
    pub fn new(aperture: Aperture, acceptance: f64, behavior: Behavior) -> Self {
        Self {
            aperture,
            acceptance,
            blocking_diameter: None,
            behavior,
        }
    }

    pub fn with_blocking(mut self, diameter: f64) -> Self {
        self.blocking_diameter = Some(diameter);
        self
    }
}
