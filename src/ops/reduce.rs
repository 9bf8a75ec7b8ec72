//! Pure state transitions for reorder, move, and delete.
//!
//! `reduce` never touches the store. It returns the next snapshot together
//! with the effect that has to be persisted for the store to agree with it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BoardError;
use super::ordering::{self, Ordered};
use crate::model::{EntityKind, Row, Snapshot};

/// A position inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub container_id: String,
    pub index: usize,
}

impl Slot {
    pub fn new(container_id: impl Into<String>, index: usize) -> Self {
        Slot {
            container_id: container_id.into(),
            index,
        }
    }
}

/// A change to the ordering state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Rewrite a container's order to exactly `ordered_ids`
    Reorder {
        kind: EntityKind,
        container_id: String,
        ordered_ids: Vec<String>,
    },
    /// Take an entity out of one container and put it into another
    Move {
        kind: EntityKind,
        id: String,
        from: Slot,
        to: Slot,
    },
    /// Remove an entity; siblings keep their indices until the next load
    Delete { kind: EntityKind, id: String },
}

/// What must be persisted to make the store match `Transition::next`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Upsert(Vec<Row>),
    Delete { kind: EntityKind, id: String },
}

/// Result of applying an action to a snapshot
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: Snapshot,
    pub effect: Effect,
}

/// Compute the state after `action`. `state` is left untouched.
pub fn reduce(state: &Snapshot, action: &Action) -> Result<Transition, BoardError> {
    let mut next = state.clone();
    let effect = match action {
        Action::Reorder {
            kind,
            container_id,
            ordered_ids,
        } => {
            if !next.has_container(*kind, container_id) {
                return Err(BoardError::ContainerNotFound {
                    kind: *kind,
                    id: container_id.clone(),
                });
            }
            let rows = match kind {
                EntityKind::Item => reorder_within(&mut next.items, container_id, ordered_ids),
                EntityKind::Column => reorder_within(&mut next.columns, container_id, ordered_ids),
                EntityKind::Task => reorder_within(&mut next.tasks, container_id, ordered_ids),
                EntityKind::Section => {
                    reorder_within(&mut next.sections, container_id, ordered_ids)
                }
                EntityKind::Dependency => unreachable_kind(*kind, container_id),
            }?;
            debug!(%kind, container = %container_id, rows = rows.len(), "reorder computed");
            Effect::Upsert(rows)
        }
        Action::Move { kind, id, from, to } => {
            for slot in [from, to] {
                if !next.has_container(*kind, &slot.container_id) {
                    return Err(BoardError::ContainerNotFound {
                        kind: *kind,
                        id: slot.container_id.clone(),
                    });
                }
            }
            let rows = match kind {
                EntityKind::Item => move_across(&mut next.items, *kind, id, from, to),
                EntityKind::Column => move_across(&mut next.columns, *kind, id, from, to),
                EntityKind::Task => move_across(&mut next.tasks, *kind, id, from, to),
                EntityKind::Section => move_across(&mut next.sections, *kind, id, from, to),
                EntityKind::Dependency => unreachable_kind(*kind, &from.container_id),
            }?;
            debug!(
                %kind,
                %id,
                from = %from.container_id,
                to = %to.container_id,
                rows = rows.len(),
                "move computed"
            );
            Effect::Upsert(rows)
        }
        Action::Delete { kind, id } => {
            if !next.remove(*kind, id) {
                return Err(BoardError::NotFound {
                    kind: *kind,
                    id: id.clone(),
                });
            }
            Effect::Delete {
                kind: *kind,
                id: id.clone(),
            }
        }
    };
    Ok(Transition { next, effect })
}

fn unreachable_kind(kind: EntityKind, container_id: &str) -> Result<Vec<Row>, BoardError> {
    Err(BoardError::ContainerNotFound {
        kind,
        id: container_id.to_string(),
    })
}

/// Assign `order_index = position` for every id in `ordered_ids`, which must
/// be a permutation of the container's current members.
pub fn reorder_within<T: Ordered>(
    all: &mut [T],
    container_id: &str,
    ordered_ids: &[String],
) -> Result<Vec<Row>, BoardError> {
    let mut current = ordering::sorted_ids(all, container_id);
    let mut requested = ordered_ids.to_vec();
    current.sort();
    requested.sort();
    if current != requested {
        return Err(BoardError::NotAPermutation {
            container_id: container_id.to_string(),
            expected: current.len(),
        });
    }

    ordering::assign_positions(all, container_id, ordered_ids);
    Ok(rows_for(all, container_id, ordered_ids))
}

/// Move `id` from `from` to `to`, renumbering both containers densely.
///
/// The returned batch holds every member of both containers, deduplicated by
/// id with the moved entity's destination record last-writer.
pub fn move_across<T: Ordered>(
    all: &mut [T],
    kind: EntityKind,
    id: &str,
    from: &Slot,
    to: &Slot,
) -> Result<Vec<Row>, BoardError> {
    if !all.iter().any(|e| e.id() == id) {
        return Err(BoardError::NotFound {
            kind,
            id: id.to_string(),
        });
    }

    let mut source_ids = ordering::sorted_ids(all, &from.container_id);
    let Some(source_pos) = source_ids.iter().position(|s| s == id) else {
        return Err(BoardError::NotInContainer {
            kind,
            id: id.to_string(),
            container_id: from.container_id.clone(),
        });
    };
    if source_pos != from.index {
        debug!(%id, expected = from.index, actual = source_pos, "stale source index");
    }
    source_ids.remove(source_pos);
    ordering::assign_positions(all, &from.container_id, &source_ids);

    let mut dest_ids: Vec<String> = ordering::sorted_ids(all, &to.container_id)
        .into_iter()
        .filter(|d| d != id)
        .collect();
    let insert_at = to.index.min(dest_ids.len());
    dest_ids.insert(insert_at, id.to_string());

    if let Some(moved) = all.iter_mut().find(|e| e.id() == id) {
        moved.set_parent_id(&to.container_id);
    }
    ordering::assign_positions(all, &to.container_id, &dest_ids);

    let mut batch: IndexMap<String, Row> = IndexMap::new();
    for row in rows_for(all, &from.container_id, &source_ids) {
        batch.insert(row.id().to_string(), row);
    }
    for row in rows_for(all, &to.container_id, &dest_ids) {
        batch.insert(row.id().to_string(), row);
    }
    Ok(batch.into_values().collect())
}

fn rows_for<T: Ordered>(all: &[T], container_id: &str, ids: &[String]) -> Vec<Row> {
    ids.iter()
        .filter_map(|id| {
            all.iter()
                .find(|e| e.id() == id && e.parent_id() == container_id)
                .map(Ordered::to_row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Board, Column, Item};
    use pretty_assertions::assert_eq;

    fn item(id: &str, column: &str, idx: usize) -> Item {
        let mut i = Item::new(id, column, id.to_uppercase());
        i.order_index = idx;
        i
    }

    fn board_state() -> Snapshot {
        let mut todo = Column::new("todo", "b1", "To Do");
        todo.order_index = 0;
        let mut doing = Column::new("doing", "b1", "Doing");
        doing.order_index = 1;
        Snapshot {
            boards: vec![Board {
                id: "b1".into(),
                name: "Sales".into(),
            }],
            columns: vec![todo, doing],
            items: vec![
                item("a", "todo", 0),
                item("b", "todo", 1),
                item("c", "todo", 2),
                item("d", "doing", 0),
            ],
            ..Snapshot::default()
        }
    }

    fn layout(state: &Snapshot, column: &str) -> Vec<(String, usize)> {
        ordering::sorted_members(&state.items, column)
            .into_iter()
            .map(|i| (i.id.clone(), i.order_index))
            .collect()
    }

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reorder_assigns_positions() {
        let state = board_state();
        let t = reduce(
            &state,
            &Action::Reorder {
                kind: EntityKind::Item,
                container_id: "todo".into(),
                ordered_ids: ids(&["b", "a", "c"]),
            },
        )
        .unwrap();
        assert_eq!(
            layout(&t.next, "todo"),
            vec![("b".into(), 0), ("a".into(), 1), ("c".into(), 2)]
        );
        let Effect::Upsert(rows) = t.effect else {
            panic!("expected upsert");
        };
        let row_ids: Vec<&str> = rows.iter().map(Row::id).collect();
        assert_eq!(row_ids, vec!["b", "a", "c"]);
        // input snapshot untouched
        assert_eq!(layout(&state, "todo")[0].0, "a");
    }

    #[test]
    fn test_reorder_rejects_partial_listing() {
        let err = reduce(
            &board_state(),
            &Action::Reorder {
                kind: EntityKind::Item,
                container_id: "todo".into(),
                ordered_ids: ids(&["b", "a"]),
            },
        )
        .unwrap_err();
        assert!(matches!(err, BoardError::NotAPermutation { expected: 3, .. }));
    }

    #[test]
    fn test_reorder_rejects_foreign_and_duplicate_ids() {
        let state = board_state();
        for bad in [ids(&["a", "b", "d"]), ids(&["a", "a", "b"])] {
            let err = reduce(
                &state,
                &Action::Reorder {
                    kind: EntityKind::Item,
                    container_id: "todo".into(),
                    ordered_ids: bad,
                },
            )
            .unwrap_err();
            assert!(matches!(err, BoardError::NotAPermutation { .. }));
        }
    }

    #[test]
    fn test_reorder_unknown_container() {
        let err = reduce(
            &board_state(),
            &Action::Reorder {
                kind: EntityKind::Item,
                container_id: "nope".into(),
                ordered_ids: vec![],
            },
        )
        .unwrap_err();
        assert!(matches!(err, BoardError::ContainerNotFound { .. }));
    }

    #[test]
    fn test_move_across_renumbers_both_sides() {
        let t = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "a".into(),
                from: Slot::new("todo", 0),
                to: Slot::new("doing", 1),
            },
        )
        .unwrap();
        assert_eq!(layout(&t.next, "todo"), vec![("b".into(), 0), ("c".into(), 1)]);
        assert_eq!(layout(&t.next, "doing"), vec![("d".into(), 0), ("a".into(), 1)]);
        assert_eq!(t.next.item("a").unwrap().column_id, "doing");
    }

    #[test]
    fn test_move_batch_is_deduplicated_with_destination_record() {
        let t = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "b".into(),
                from: Slot::new("todo", 1),
                to: Slot::new("doing", 0),
            },
        )
        .unwrap();
        let Effect::Upsert(rows) = t.effect else {
            panic!("expected upsert");
        };
        let mut row_ids: Vec<&str> = rows.iter().map(Row::id).collect();
        row_ids.sort();
        assert_eq!(row_ids, vec!["a", "b", "c", "d"]);
        let moved = rows.iter().find(|r| r.id() == "b").unwrap();
        match moved {
            Row::Item(i) => {
                assert_eq!(i.column_id, "doing");
                assert_eq!(i.order_index, 0);
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_move_within_same_container_via_move() {
        let t = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "a".into(),
                from: Slot::new("todo", 0),
                to: Slot::new("todo", 2),
            },
        )
        .unwrap();
        assert_eq!(
            layout(&t.next, "todo"),
            vec![("b".into(), 0), ("c".into(), 1), ("a".into(), 2)]
        );
        let Effect::Upsert(rows) = t.effect else {
            panic!("expected upsert");
        };
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_move_past_end_appends() {
        let t = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "c".into(),
                from: Slot::new("todo", 2),
                to: Slot::new("doing", 99),
            },
        )
        .unwrap();
        assert_eq!(layout(&t.next, "doing"), vec![("d".into(), 0), ("c".into(), 1)]);
    }

    #[test]
    fn test_move_tolerates_stale_source_index() {
        let t = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "c".into(),
                from: Slot::new("todo", 0),
                to: Slot::new("doing", 0),
            },
        )
        .unwrap();
        assert_eq!(layout(&t.next, "todo"), vec![("a".into(), 0), ("b".into(), 1)]);
    }

    #[test]
    fn test_move_wrong_source_container() {
        let err = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "d".into(),
                from: Slot::new("todo", 0),
                to: Slot::new("doing", 0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, BoardError::NotInContainer { .. }));
    }

    #[test]
    fn test_move_missing_entity() {
        let err = reduce(
            &board_state(),
            &Action::Move {
                kind: EntityKind::Item,
                id: "ghost".into(),
                from: Slot::new("todo", 0),
                to: Slot::new("doing", 0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, BoardError::NotFound { .. }));
    }

    #[test]
    fn test_delete_leaves_sibling_indices_alone() {
        let t = reduce(
            &board_state(),
            &Action::Delete {
                kind: EntityKind::Item,
                id: "a".into(),
            },
        )
        .unwrap();
        assert_eq!(layout(&t.next, "todo"), vec![("b".into(), 1), ("c".into(), 2)]);
        assert_eq!(
            t.effect,
            Effect::Delete {
                kind: EntityKind::Item,
                id: "a".into()
            }
        );
    }

    #[test]
    fn test_reorder_columns() {
        let t = reduce(
            &board_state(),
            &Action::Reorder {
                kind: EntityKind::Column,
                container_id: "b1".into(),
                ordered_ids: ids(&["doing", "todo"]),
            },
        )
        .unwrap();
        assert_eq!(ordering::sorted_ids(&t.next.columns, "b1"), ids(&["doing", "todo"]));
    }
}
