use bench_types::{Aperture, Pose};
use beam_solver::SceneComponent;
use uuid::Uuid;

/// Errors from body generation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BodyError {
    #[error("body generation failed for '{label}': {reason}")]
    Generation { label: String, reason: String },
}

/// A generated physical body for a placed component.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub component: Uuid,
    pub pose: Pose,
    /// In-plane clearance radius of the mounted part.
    pub footprint: f64,
}

/// Produces mount bodies for posed components. Implementations wrap a
/// geometry backend; the engine only needs poses and footprints back.
pub trait BodyGenerator {
    fn body_for(&mut self, component: &SceneComponent, pose: &Pose) -> Result<Body, BodyError>;
}

/// Generator that derives footprints from the interface alone, with no
/// geometry backend behind it.
#[derive(Debug, Default)]
pub struct MockBodyGenerator {
    pub calls: u32,
}

impl MockBodyGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BodyGenerator for MockBodyGenerator {
    fn body_for(&mut self, component: &SceneComponent, pose: &Pose) -> Result<Body, BodyError> {
        self.calls += 1;
        let aperture_radius = match component.descriptor.aperture {
            Aperture::Circular { diameter } => diameter / 2.0,
            Aperture::Rect { dx, dy } => dx.hypot(dy) / 2.0,
        };
        let footprint = component
            .descriptor
            .blocking_diameter
            .map_or(aperture_radius, |b| aperture_radius.max(b / 2.0));
        Ok(Body {
            component: component.id,
            pose: *pose,
            footprint,
        })
    }
}
