//! Classifies drop events into reorder, move, delete, or nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BoardError;
use super::ordering;
use super::reduce::{Action, Slot};
use crate::model::{EntityKind, Snapshot};

/// What was dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Item,
    Column,
    Task,
    Section,
}

impl DragKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            DragKind::Item => EntityKind::Item,
            DragKind::Column => EntityKind::Column,
            DragKind::Task => EntityKind::Task,
            DragKind::Section => EntityKind::Section,
        }
    }

    /// Columns and sections reorder as one flat list per parent
    pub fn is_flat(self) -> bool {
        matches!(self, DragKind::Column | DragKind::Section)
    }

    pub fn parse(s: &str) -> Option<DragKind> {
        match s {
            "item" => Some(DragKind::Item),
            "column" => Some(DragKind::Column),
            "task" => Some(DragKind::Task),
            "section" => Some(DragKind::Section),
            _ => None,
        }
    }
}

/// Where a drag ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DropTarget {
    Container { id: String },
    Delete,
}

/// Destination of a drop: a target plus an index inside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub target: DropTarget,
    pub index: usize,
}

/// A completed drag gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropEvent {
    pub draggable_id: String,
    pub kind: DragKind,
    pub source: Slot,
    /// `None` when released outside any valid target
    pub destination: Option<Destination>,
}

impl DropEvent {
    pub fn new(kind: DragKind, draggable_id: impl Into<String>, source: Slot) -> Self {
        DropEvent {
            draggable_id: draggable_id.into(),
            kind,
            source,
            destination: None,
        }
    }

    pub fn to(mut self, container_id: impl Into<String>, index: usize) -> Self {
        self.destination = Some(Destination {
            target: DropTarget::Container {
                id: container_id.into(),
            },
            index,
        });
        self
    }

    pub fn to_trash(mut self) -> Self {
        self.destination = Some(Destination {
            target: DropTarget::Delete,
            index: 0,
        });
        self
    }
}

/// The interpreter's verdict on a drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Nothing to do
    Noop,
    /// Ask the user before deleting this entity
    ConfirmDelete { kind: EntityKind, id: String },
    /// Apply this action through the reconciler
    Apply(Action),
}

/// Decide what a drop means against the current state.
pub fn interpret(state: &Snapshot, event: &DropEvent) -> Result<DragOutcome, BoardError> {
    let Some(dest) = &event.destination else {
        debug!(id = %event.draggable_id, "dropped outside any target");
        return Ok(DragOutcome::Noop);
    };
    let kind = event.kind.entity_kind();

    let dest_container = match &dest.target {
        DropTarget::Delete => {
            if event.kind != DragKind::Item {
                debug!(id = %event.draggable_id, kind = %kind, "delete target ignored");
                return Ok(DragOutcome::Noop);
            }
            if !state.contains(kind, &event.draggable_id) {
                return Err(BoardError::NotFound {
                    kind,
                    id: event.draggable_id.clone(),
                });
            }
            return Ok(DragOutcome::ConfirmDelete {
                kind,
                id: event.draggable_id.clone(),
            });
        }
        DropTarget::Container { id } => id,
    };

    if event.kind.is_flat() {
        // Columns and sections only move within their own board/project.
        if dest.index == event.source.index {
            return Ok(DragOutcome::Noop);
        }
        let parent = &event.source.container_id;
        let ids = match event.kind {
            DragKind::Column => ordering::sorted_ids(&state.columns, parent),
            _ => ordering::sorted_ids(&state.sections, parent),
        };
        let ordered_ids = reinsert(ids, kind, &event.draggable_id, parent, dest.index)?;
        return Ok(DragOutcome::Apply(Action::Reorder {
            kind,
            container_id: parent.clone(),
            ordered_ids,
        }));
    }

    if *dest_container == event.source.container_id {
        if dest.index == event.source.index {
            return Ok(DragOutcome::Noop);
        }
        let parent = &event.source.container_id;
        let ids = match event.kind {
            DragKind::Item => ordering::sorted_ids(&state.items, parent),
            _ => ordering::sorted_ids(&state.tasks, parent),
        };
        let ordered_ids = reinsert(ids, kind, &event.draggable_id, parent, dest.index)?;
        return Ok(DragOutcome::Apply(Action::Reorder {
            kind,
            container_id: parent.clone(),
            ordered_ids,
        }));
    }

    Ok(DragOutcome::Apply(Action::Move {
        kind,
        id: event.draggable_id.clone(),
        from: event.source.clone(),
        to: Slot::new(dest_container.clone(), dest.index),
    }))
}

/// Remove `id` from `ids` and put it back at `index` (clamped to the end).
fn reinsert(
    mut ids: Vec<String>,
    kind: EntityKind,
    id: &str,
    container_id: &str,
    index: usize,
) -> Result<Vec<String>, BoardError> {
    let pos = ids
        .iter()
        .position(|x| x == id)
        .ok_or_else(|| BoardError::NotInContainer {
            kind,
            id: id.to_string(),
            container_id: container_id.to_string(),
        })?;
    let moved = ids.remove(pos);
    let index = index.min(ids.len());
    ids.insert(index, moved);
    Ok(ids)
}

/// Where an entity currently sits: its parent and display position.
pub fn locate(state: &Snapshot, kind: DragKind, id: &str) -> Option<Slot> {
    fn find<T: ordering::Ordered>(all: &[T], id: &str) -> Option<Slot> {
        let entity = all.iter().find(|e| e.id() == id)?;
        let parent = entity.parent_id();
        let index = ordering::sorted_members(all, parent)
            .iter()
            .position(|e| e.id() == id)?;
        Some(Slot::new(parent, index))
    }
    match kind {
        DragKind::Item => find(&state.items, id),
        DragKind::Column => find(&state.columns, id),
        DragKind::Task => find(&state.tasks, id),
        DragKind::Section => find(&state.sections, id),
    }
}
