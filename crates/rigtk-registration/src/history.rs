//! Undo/redo of applied registrations.

use rigtk_core::Placement;
use crate::apply::AppliedRegistration;

/// Placements of a moving image and its children at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSnapshot<Id> {
    pub moving: Placement,
    pub children: Vec<(Id, Placement)>,
}

impl<Id> PlacementSnapshot<Id> {
    pub fn new(moving: Placement, children: Vec<(Id, Placement)>) -> Self {
        Self { moving, children }
    }
}

/// Two stacks of placement snapshots.
///
/// `record` pushes the state before a registration and clears the redo
/// stack. `undo` and `redo` take the current state, push it onto the
/// opposite stack and return the state to restore.
#[derive(Debug, Clone)]
pub struct TransformationHistory<Id> {
    undo_stack: Vec<PlacementSnapshot<Id>>,
    redo_stack: Vec<PlacementSnapshot<Id>>,
}

impl<Id> Default for TransformationHistory<Id> {
    fn default() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }
}

impl<Id: Clone> TransformationHistory<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, applied: &AppliedRegistration<Id>) {
        let (moving, children) = applied.undo();
        self.undo_stack.push(PlacementSnapshot::new(moving, children));
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, current: PlacementSnapshot<Id>) -> Option<PlacementSnapshot<Id>> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: PlacementSnapshot<Id>) -> Option<PlacementSnapshot<Id>> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
