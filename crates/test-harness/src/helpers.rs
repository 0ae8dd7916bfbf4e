//! Helper functions: error type, descriptor constructors, and a labeled
//! scene builder over the layout engine.

use std::collections::HashMap;

use bench_types::{
    AlongBeamConstraint, Aperture, BeamAttrs, BeamIndex, Behavior, InterfaceDescriptor, Placement,
    Pose, WavelengthRange,
};
use beam_solver::BeamTree;
use layout_engine::body::MockBodyGenerator;
use layout_engine::LayoutEngine;
use std::f64::consts::FRAC_PI_2;
use uuid::Uuid;

// ── Error Type ──────────────────────────────────────────────────────────────

/// Unified error type for the test harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("unknown label: {label}")]
    UnknownLabel { label: String },

    #[error("duplicate label: {label}")]
    DuplicateLabel { label: String },

    #[error("no pose for component: {label}")]
    NoPose { label: String },

    #[error("no tree for beam: {label}")]
    NoTree { label: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("engine error: {0}")]
    Engine(String),
}

impl From<layout_engine::types::EngineError> for HarnessError {
    fn from(err: layout_engine::types::EngineError) -> Self {
        HarnessError::Engine(err.to_string())
    }
}

// ── Descriptor Constructors ─────────────────────────────────────────────────

/// A one-inch mirror accepting any incidence.
pub fn mirror() -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Mirror,
    )
}

/// A transmissive window or waveplate: interacts, never bends the beam.
pub fn window() -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Transmissive,
    )
}

/// A beam sampler splitting off `ratio` of the power.
pub fn sampler(ratio: f64) -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Sampler { ratio },
    )
}

/// A linear polarizer at `angle` radians.
pub fn polarizer(angle: f64) -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Polarizer { angle },
    )
}

/// A dichroic reflecting the given wavelength bands (nm, half-open).
pub fn dichroic(bands: &[(Option<f64>, Option<f64>)]) -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Dichroic {
            ranges: bands
                .iter()
                .map(|&(min, max)| WavelengthRange { min, max })
                .collect(),
        },
    )
}

/// A thin lens with the given focal length.
pub fn lens(focal_length: f64) -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Lens { focal_length },
    )
}

// ── Scene Builder ───────────────────────────────────────────────────────────

/// Labeled wrapper over `LayoutEngine` so scenario tests read in terms
/// of names rather than ids. Every mutation recomputes, as the engine
/// does for interactive edits.
pub struct BenchBuilder {
    pub engine: LayoutEngine,
    pub gen: MockBodyGenerator,
    labels: HashMap<String, Uuid>,
}

impl BenchBuilder {
    pub fn new() -> Self {
        Self {
            engine: LayoutEngine::new(),
            gen: MockBodyGenerator::new(),
            labels: HashMap::new(),
        }
    }

    fn bind(&mut self, label: &str, id: Uuid) -> Result<Uuid, HarnessError> {
        if self.labels.insert(label.to_string(), id).is_some() {
            return Err(HarnessError::DuplicateLabel {
                label: label.to_string(),
            });
        }
        Ok(id)
    }

    pub fn id(&self, label: &str) -> Result<Uuid, HarnessError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| HarnessError::UnknownLabel {
                label: label.to_string(),
            })
    }

    pub fn beam(
        &mut self,
        label: &str,
        origin: [f64; 3],
        direction: [f64; 3],
    ) -> Result<Uuid, HarnessError> {
        self.beam_with_attrs(label, origin, direction, BeamAttrs::default())
    }

    pub fn beam_with_attrs(
        &mut self,
        label: &str,
        origin: [f64; 3],
        direction: [f64; 3],
        attrs: BeamAttrs,
    ) -> Result<Uuid, HarnessError> {
        let id = self
            .engine
            .add_beam(label, origin, direction, attrs, &mut self.gen)?;
        self.bind(label, id)
    }

    pub fn fixed(
        &mut self,
        label: &str,
        descriptor: InterfaceDescriptor,
        position: [f64; 3],
        angle: f64,
    ) -> Result<Uuid, HarnessError> {
        let id = self.engine.add_component(
            label,
            descriptor,
            Placement::Fixed { position, angle },
            &mut self.gen,
        )?;
        self.bind(label, id)
    }

    /// Inline placement at a distance along a beam index.
    pub fn along(
        &mut self,
        label: &str,
        descriptor: InterfaceDescriptor,
        beam_label: &str,
        beam_index: BeamIndex,
        constraint: AlongBeamConstraint,
        angle: f64,
        pre_refs: u32,
    ) -> Result<Uuid, HarnessError> {
        let beam = self.id(beam_label)?;
        let id = self.engine.add_component(
            label,
            descriptor,
            Placement::AlongBeam {
                beam,
                beam_index,
                constraint,
                angle,
                pre_refs,
            },
            &mut self.gen,
        )?;
        self.bind(label, id)
    }

    pub fn relative(
        &mut self,
        label: &str,
        descriptor: InterfaceDescriptor,
        parent_label: &str,
        offset: [f64; 3],
        angle_offset: f64,
    ) -> Result<Uuid, HarnessError> {
        let parent = self.id(parent_label)?;
        let id = self.engine.add_component(
            label,
            descriptor,
            Placement::RelativeTo {
                parent,
                offset,
                angle_offset,
            },
            &mut self.gen,
        )?;
        self.bind(label, id)
    }

    pub fn pose(&self, label: &str) -> Result<Pose, HarnessError> {
        let id = self.id(label)?;
        self.engine.pose(id).ok_or_else(|| HarnessError::NoPose {
            label: label.to_string(),
        })
    }

    pub fn tree(&self, beam_label: &str) -> Result<&BeamTree, HarnessError> {
        let id = self.id(beam_label)?;
        self.engine.tree(id).ok_or_else(|| HarnessError::NoTree {
            label: beam_label.to_string(),
        })
    }
}

impl Default for BenchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
