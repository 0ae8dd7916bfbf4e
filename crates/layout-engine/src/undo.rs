use bench_types::Placement;
use beam_solver::{BeamSource, Bounds};
use uuid::Uuid;

use crate::types::ComponentDecl;

/// A reversible declaration edit. The engine applies or reverts one of
/// these and then recomputes; commands carry enough of the old state to
/// run in either direction.
#[derive(Debug, Clone)]
pub enum Command {
    AddBeam {
        beam: Box<BeamSource>,
    },
    AddComponent {
        decl: Box<ComponentDecl>,
        position: usize,
    },
    RemoveComponent {
        decl: Box<ComponentDecl>,
        position: usize,
    },
    EditPlacement {
        component: Uuid,
        old_placement: Placement,
        new_placement: Placement,
    },
    SetSuppressed {
        component: Uuid,
        old_suppressed: bool,
        new_suppressed: bool,
    },
    SetBounds {
        old_bounds: Option<Bounds>,
        new_bounds: Option<Bounds>,
    },
}

/// Edit history for the scene declarations.
///
/// Undoing moves a command from the undo side to the redo side and
/// vice versa; the solved trees and bodies are never stored here, they
/// are rebuilt by the recompute that follows every move.
#[derive(Debug, Default)]
pub struct UndoStack {
    undo: Vec<Command>,
    redo: Vec<Command>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh edit. Edits undone before this point can no
    /// longer be replayed on top of it, so the redo side is dropped.
    pub fn push(&mut self, cmd: Command) {
        self.redo.clear();
        self.undo.push(cmd);
    }

    /// Put a replayed command back on the undo side without dropping
    /// what remains redoable.
    pub fn push_undo_only(&mut self, cmd: Command) {
        self.undo.push(cmd);
    }

    pub fn pop_undo(&mut self) -> Option<Command> {
        self.undo.pop()
    }

    pub fn push_redo(&mut self, cmd: Command) {
        self.redo.push(cmd);
    }

    pub fn pop_redo(&mut self) -> Option<Command> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}
