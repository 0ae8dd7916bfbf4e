pub mod body;
pub mod document;
pub mod recompute;
pub mod types;
pub mod undo;

use std::collections::HashMap;

use bench_types::{BeamAttrs, InterfaceDescriptor, Placement, Pose};
use beam_solver::{BeamTree, Bounds, SceneRegistry, SolveWarning};
use uuid::Uuid;

use crate::body::{Body, BodyGenerator};
use crate::types::{ComponentDecl, EngineError};
use crate::undo::{Command, UndoStack};

/// The layout engine.
///
/// Owns the scene declarations, coordinates recomputes, and keeps the
/// solved beam trees, generated bodies, and undo history in sync with
/// every edit.
pub struct LayoutEngine {
    /// Declared beams and components plus solver state.
    pub scene: SceneRegistry,
    /// Solved segment tree per beam, from the last recompute.
    pub trees: HashMap<Uuid, BeamTree>,
    /// Generated mount bodies per posed component.
    pub bodies: HashMap<Uuid, Body>,
    /// Warnings from the last recompute.
    pub warnings: Vec<SolveWarning>,
    history: UndoStack,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self {
            scene: SceneRegistry::new(),
            trees: HashMap::new(),
            bodies: HashMap::new(),
            warnings: Vec::new(),
            history: UndoStack::new(),
        }
    }

    /// Add a beam source and recompute.
    pub fn add_beam(
        &mut self,
        label: impl Into<String>,
        origin: [f64; 3],
        direction: [f64; 3],
        attrs: BeamAttrs,
        gen: &mut dyn BodyGenerator,
    ) -> Result<Uuid, EngineError> {
        let id = self.scene.add_beam(label, origin, direction, attrs);
        let beam = self
            .scene
            .beam(id)
            .cloned()
            .expect("beam was just inserted");
        self.history.push(Command::AddBeam {
            beam: Box::new(beam),
        });
        self.recompute(gen)?;
        Ok(id)
    }

    /// Add a component and recompute.
    pub fn add_component(
        &mut self,
        label: impl Into<String>,
        descriptor: InterfaceDescriptor,
        placement: Placement,
        gen: &mut dyn BodyGenerator,
    ) -> Result<Uuid, EngineError> {
        self.validate_placement(&placement, None)?;
        let id = self.scene.add_component(label, descriptor, placement);
        let position = self.scene.components.len() - 1;
        let decl = ComponentDecl::from_component(&self.scene.components[position]);
        self.history.push(Command::AddComponent {
            decl: Box::new(decl),
            position,
        });
        self.recompute(gen)?;
        Ok(id)
    }

    /// Remove a component and recompute. Components that other
    /// placements are expressed relative to cannot be removed.
    pub fn remove_component(
        &mut self,
        id: Uuid,
        gen: &mut dyn BodyGenerator,
    ) -> Result<(), EngineError> {
        let position = self
            .scene
            .component_index(id)
            .ok_or(EngineError::ComponentNotFound { id })?;
        let in_use = self.scene.components.iter().any(
            |c| matches!(c.placement, Placement::RelativeTo { parent, .. } if parent == id),
        );
        if in_use {
            return Err(EngineError::ComponentInUse { id });
        }
        let removed = self.scene.components.remove(position);
        self.history.push(Command::RemoveComponent {
            decl: Box::new(ComponentDecl::from_component(&removed)),
            position,
        });
        self.recompute(gen)?;
        Ok(())
    }

    /// Replace a component's placement and recompute.
    pub fn edit_placement(
        &mut self,
        id: Uuid,
        placement: Placement,
        gen: &mut dyn BodyGenerator,
    ) -> Result<(), EngineError> {
        self.validate_placement(&placement, Some(id))?;
        let comp = self
            .scene
            .component_mut(id)
            .ok_or(EngineError::ComponentNotFound { id })?;
        let old_placement = comp.placement;
        comp.placement = placement;
        self.history.push(Command::EditPlacement {
            component: id,
            old_placement,
            new_placement: placement,
        });
        self.recompute(gen)?;
        Ok(())
    }

    /// Suppress or unsuppress a component and recompute. Suppressed
    /// components keep their declaration but do not interact with beams.
    pub fn set_suppressed(
        &mut self,
        id: Uuid,
        suppressed: bool,
        gen: &mut dyn BodyGenerator,
    ) -> Result<(), EngineError> {
        let comp = self
            .scene
            .component_mut(id)
            .ok_or(EngineError::ComponentNotFound { id })?;
        let old_suppressed = comp.suppressed;
        comp.suppressed = suppressed;
        self.history.push(Command::SetSuppressed {
            component: id,
            old_suppressed,
            new_suppressed: suppressed,
        });
        self.recompute(gen)?;
        Ok(())
    }

    /// Set or clear the baseplate extent and recompute.
    pub fn set_bounds(
        &mut self,
        bounds: Option<Bounds>,
        gen: &mut dyn BodyGenerator,
    ) -> Result<(), EngineError> {
        let old_bounds = self.scene.bounds;
        self.scene.bounds = bounds;
        self.history.push(Command::SetBounds {
            old_bounds,
            new_bounds: bounds,
        });
        self.recompute(gen)?;
        Ok(())
    }

    /// Recompute the whole document: re-solve every beam and regenerate
    /// bodies for all posed components.
    pub fn recompute(&mut self, gen: &mut dyn BodyGenerator) -> Result<(), EngineError> {
        let state = recompute::recompute(&mut self.scene)?;
        self.trees = state.trees;
        self.warnings = state.warnings;
        self.bodies.clear();
        for comp in &self.scene.components {
            if comp.suppressed {
                continue;
            }
            let Some(pose) = comp.pose else {
                continue;
            };
            let body = gen.body_for(comp, &pose)?;
            self.bodies.insert(comp.id, body);
        }
        Ok(())
    }

    /// Undo the most recent edit and recompute.
    pub fn undo(&mut self, gen: &mut dyn BodyGenerator) -> Result<bool, EngineError> {
        let Some(cmd) = self.history.pop_undo() else {
            return Ok(false);
        };
        self.revert(&cmd);
        self.history.push_redo(cmd);
        self.recompute(gen)?;
        Ok(true)
    }

    /// Re-apply the most recently undone edit and recompute.
    pub fn redo(&mut self, gen: &mut dyn BodyGenerator) -> Result<bool, EngineError> {
        let Some(cmd) = self.history.pop_redo() else {
            return Ok(false);
        };
        self.apply(&cmd);
        self.history.push_undo_only(cmd);
        self.recompute(gen)?;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Resolved pose of a component, if the last recompute placed it.
    pub fn pose(&self, id: Uuid) -> Option<Pose> {
        self.scene.component(id).and_then(|c| c.pose)
    }

    /// Solved segment tree of a beam, if the last recompute reached it.
    pub fn tree(&self, beam: Uuid) -> Option<&BeamTree> {
        self.trees.get(&beam)
    }

    fn validate_placement(
        &self,
        placement: &Placement,
        editing: Option<Uuid>,
    ) -> Result<(), EngineError> {
        match *placement {
            Placement::Fixed { .. } => Ok(()),
            Placement::AlongBeam { beam, .. } => {
                if self.scene.beam(beam).is_none() {
                    return Err(EngineError::UnknownBeam { id: beam });
                }
                Ok(())
            }
            Placement::RelativeTo { parent, .. } => {
                if editing == Some(parent) || self.scene.component(parent).is_none() {
                    return Err(EngineError::UnknownParent { id: parent });
                }
                Ok(())
            }
        }
    }

    fn revert(&mut self, cmd: &Command) {
        match cmd {
            Command::AddBeam { beam } => {
                self.scene.beams.retain(|b| b.id != beam.id);
            }
            Command::AddComponent { decl, .. } => {
                self.scene.components.retain(|c| c.id != decl.id);
            }
            Command::RemoveComponent { decl, position } => {
                let at = (*position).min(self.scene.components.len());
                self.scene
                    .components
                    .insert(at, decl.as_ref().clone().into_component());
            }
            Command::EditPlacement {
                component,
                old_placement,
                ..
            } => {
                if let Some(comp) = self.scene.component_mut(*component) {
                    comp.placement = *old_placement;
                }
            }
            Command::SetSuppressed {
                component,
                old_suppressed,
                ..
            } => {
                if let Some(comp) = self.scene.component_mut(*component) {
                    comp.suppressed = *old_suppressed;
                }
            }
            Command::SetBounds { old_bounds, .. } => {
                self.scene.bounds = *old_bounds;
            }
        }
    }

    fn apply(&mut self, cmd: &Command) {
        match cmd {
            Command::AddBeam { beam } => {
                self.scene.beams.push(beam.as_ref().clone());
            }
            Command::AddComponent { decl, position } => {
                let at = (*position).min(self.scene.components.len());
                self.scene
                    .components
                    .insert(at, decl.as_ref().clone().into_component());
            }
            Command::RemoveComponent { decl, .. } => {
                self.scene.components.retain(|c| c.id != decl.id);
            }
            Command::EditPlacement {
                component,
                new_placement,
                ..
            } => {
                if let Some(comp) = self.scene.component_mut(*component) {
                    comp.placement = *new_placement;
                }
            }
            Command::SetSuppressed {
                component,
                new_suppressed,
                ..
            } => {
                if let Some(comp) = self.scene.component_mut(*component) {
                    comp.suppressed = *new_suppressed;
                }
            }
            Command::SetBounds { new_bounds, .. } => {
                self.scene.bounds = *new_bounds;
            }
        }
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}
