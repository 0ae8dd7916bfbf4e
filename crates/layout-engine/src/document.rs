use beam_solver::{BeamSource, Bounds};
use serde::{Deserialize, Serialize};

use crate::types::ComponentDecl;
use crate::LayoutEngine;

/// Current file format version.
pub const FORMAT_VERSION: u32 = 1;

/// The top-level file structure: declarations only. Poses, trees and
/// bodies are recomputed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchFile {
    /// Format identifier.
    pub format: String,
    /// Format version number.
    pub version: u32,
    pub beams: Vec<BeamSource>,
    pub components: Vec<ComponentDecl>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

/// Errors during document loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("failed to parse file: {0}")]
    ParseError(String),

    #[error("unknown file format: {0}")]
    UnknownFormat(String),

    #[error("file version {file_version} is newer than supported version {supported_version}")]
    FutureVersion {
        file_version: u32,
        supported_version: u32,
    },
}

/// Serialize a document to a pretty-printed JSON string.
pub fn save_document(engine: &LayoutEngine) -> String {
    let file = BenchFile {
        format: "optic-bench".to_string(),
        version: FORMAT_VERSION,
        beams: engine.scene.beams.clone(),
        components: engine
            .scene
            .components
            .iter()
            .map(ComponentDecl::from_component)
            .collect(),
        bounds: engine.scene.bounds,
    };
    serde_json::to_string_pretty(&file).expect("document serialization should never fail")
}

/// Deserialize a document from a JSON string.
///
/// Validates the format identifier and version. The returned engine has
/// not been recomputed; call `recompute` before reading poses or trees.
pub fn load_document(json: &str) -> Result<LayoutEngine, LoadError> {
    let raw: BenchFile =
        serde_json::from_str(json).map_err(|e| LoadError::ParseError(e.to_string()))?;

    if raw.format != "optic-bench" {
        return Err(LoadError::UnknownFormat(raw.format));
    }
    if raw.version > FORMAT_VERSION {
        return Err(LoadError::FutureVersion {
            file_version: raw.version,
            supported_version: FORMAT_VERSION,
        });
    }

    let mut engine = LayoutEngine::new();
    engine.scene.beams = raw.beams;
    engine.scene.components = raw
        .components
        .into_iter()
        .map(ComponentDecl::into_component)
        .collect();
    engine.scene.bounds = raw.bounds;
    Ok(engine)
}
