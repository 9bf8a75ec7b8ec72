//! Optimistic apply, then persist or reload.
//!
//! A [`Session`] mirrors the store's collections locally. Every change goes
//! through two phases: [`Session::apply_local`] computes the transition and
//! installs it immediately, [`Session::commit`] sends the resulting batch to
//! the store. Any failure in either phase throws the local state away,
//! reloads from the store, and emits exactly one error notice. If the reload
//! fails too, the session falls back to the last state the store confirmed.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::BoardError;
use super::deps;
use super::drag::{self, DragOutcome, DropEvent};
use super::ordering;
use super::reduce::{self, Action, Effect, Slot};
use crate::io::notify::{Notice, Notifier};
use crate::io::store::{Store, StoreError};
use crate::model::{EntityKind, Row, Snapshot};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no delete is awaiting confirmation")]
    NothingToConfirm,
}

/// Phase-one result: what still has to reach the store
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an applied change must be committed"]
pub struct PendingCommit {
    base_revision: u64,
    effect: Effect,
}

impl PendingCommit {
    pub fn base_revision(&self) -> u64 {
        self.base_revision
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

/// What a drop resolved to, from the caller's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResult {
    /// The drop meant nothing; state is unchanged
    Ignored,
    /// The change was applied and persisted
    Committed,
    /// A delete is waiting for [`Session::confirm_delete`] or
    /// [`Session::cancel_delete`]
    AwaitingConfirmation { kind: EntityKind, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingDelete {
    kind: EntityKind,
    id: String,
}

pub struct Session<S: Store, N: Notifier> {
    store: S,
    notifier: N,
    state: Snapshot,
    /// What the store holds as far as this session knows: the last fetch
    /// plus every accepted commit, without optimistic edits.
    committed: Snapshot,
    blocked: HashMap<String, bool>,
    pending_delete: Option<PendingDelete>,
}

impl<S: Store, N: Notifier> Session<S, N> {
    /// Open a session and perform the initial load.
    pub fn open(store: S, notifier: N) -> Result<Self, SyncError> {
        let mut session = Session {
            store,
            notifier,
            state: Snapshot::default(),
            committed: Snapshot::default(),
            blocked: HashMap::new(),
            pending_delete: None,
        };
        session.load()?;
        Ok(session)
    }

    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn into_parts(self) -> (S, N) {
        (self.store, self.notifier)
    }

    /// Derived blocked flag for a task; false for unknown ids.
    pub fn is_blocked(&self, task_id: &str) -> bool {
        self.blocked.get(task_id).copied().unwrap_or(false)
    }

    /// Id of the entity whose delete awaits confirmation, if any.
    pub fn pending_delete(&self) -> Option<(EntityKind, &str)> {
        self.pending_delete
            .as_ref()
            .map(|p| (p.kind, p.id.as_str()))
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Replace local state with the store's, re-densify every container,
    /// and persist any repaired indices as one batch.
    ///
    /// A failed repair batch leaves local state dense and emits one error
    /// notice; the next load tries again.
    pub fn load(&mut self) -> Result<(), SyncError> {
        let mut fresh = self.store.fetch_all()?;
        let repairs = densify_snapshot(&mut fresh);
        self.committed = fresh.clone();
        self.install(fresh);

        if !repairs.is_empty() {
            info!(rows = repairs.len(), "re-densifying containers after load");
            match self.store.upsert(self.state.revision, &repairs) {
                Ok(rev) => {
                    self.state.revision = rev;
                    self.committed.revision = rev;
                }
                Err(e) => {
                    warn!(error = %e, "could not persist re-densified indices");
                    self.notifier.notify(Notice::error(format!(
                        "could not save repaired ordering: {}",
                        e
                    )));
                }
            }
        }
        Ok(())
    }

    fn install(&mut self, state: Snapshot) {
        self.state = state;
        self.refresh_derived();
    }

    fn refresh_derived(&mut self) {
        self.blocked = deps::blocked_flags(&self.state);
    }

    // -----------------------------------------------------------------------
    // Two-phase apply
    // -----------------------------------------------------------------------

    /// Phase one: compute the transition and install it locally.
    pub fn apply_local(&mut self, action: &Action) -> Result<PendingCommit, SyncError> {
        let base_revision = self.state.revision;
        match reduce::reduce(&self.state, action) {
            Ok(transition) => {
                self.install(transition.next);
                Ok(PendingCommit {
                    base_revision,
                    effect: transition.effect,
                })
            }
            Err(e) => Err(self.recover(SyncError::Board(e))),
        }
    }

    /// Phase two: persist a pending change, or reload on failure.
    pub fn commit(&mut self, pending: PendingCommit) -> Result<(), SyncError> {
        let result = match &pending.effect {
            Effect::Upsert(rows) => self.store.upsert(pending.base_revision, rows),
            Effect::Delete { kind, id } => self.store.delete(pending.base_revision, *kind, id),
        };
        match result {
            Ok(rev) => {
                match &pending.effect {
                    Effect::Upsert(rows) => {
                        for row in rows {
                            self.committed.apply_row(row);
                        }
                    }
                    Effect::Delete { kind, id } => {
                        self.committed.remove(*kind, id);
                    }
                }
                self.committed.revision = rev;
                self.state.revision = rev;
                debug!(revision = rev, "commit accepted");
                Ok(())
            }
            Err(e) => Err(self.recover(SyncError::Store(e))),
        }
    }

    /// Apply and commit in one step.
    pub fn dispatch(&mut self, action: &Action) -> Result<(), SyncError> {
        let pending = self.apply_local(action)?;
        self.commit(pending)
    }

    /// Drop local state, reload from the store, and tell the user once.
    fn recover(&mut self, err: SyncError) -> SyncError {
        warn!(error = %err, "reconciliation failed, reloading");
        self.pending_delete = None;
        match self.store.fetch_all() {
            Ok(mut fresh) => {
                densify_snapshot(&mut fresh);
                self.committed = fresh.clone();
                self.install(fresh);
            }
            Err(reload_err) => {
                warn!(error = %reload_err, "reload after failure also failed");
                let committed = self.committed.clone();
                self.install(committed);
            }
        }
        self.notifier.notify(Notice::error(err.to_string()));
        err
    }

    // -----------------------------------------------------------------------
    // Reconciler operations
    // -----------------------------------------------------------------------

    /// Set `order_index = position` for every id in `ordered_ids`.
    pub fn reorder_within(
        &mut self,
        kind: EntityKind,
        container_id: &str,
        ordered_ids: Vec<String>,
    ) -> Result<(), SyncError> {
        self.dispatch(&Action::Reorder {
            kind,
            container_id: container_id.to_string(),
            ordered_ids,
        })
    }

    /// Move an entity to another container, renumbering both.
    pub fn move_across(
        &mut self,
        kind: EntityKind,
        id: &str,
        from: Slot,
        to: Slot,
    ) -> Result<(), SyncError> {
        self.dispatch(&Action::Move {
            kind,
            id: id.to_string(),
            from,
            to,
        })
    }

    // -----------------------------------------------------------------------
    // Drag and drop
    // -----------------------------------------------------------------------

    /// Interpret a drop and carry it out.
    pub fn handle_drop(&mut self, event: &DropEvent) -> Result<DropResult, SyncError> {
        let outcome = match drag::interpret(&self.state, event) {
            Ok(o) => o,
            Err(e) => return Err(self.recover(SyncError::Board(e))),
        };
        match outcome {
            DragOutcome::Noop => Ok(DropResult::Ignored),
            DragOutcome::ConfirmDelete { kind, id } => {
                debug!(%kind, %id, "delete awaiting confirmation");
                self.pending_delete = Some(PendingDelete {
                    kind,
                    id: id.clone(),
                });
                Ok(DropResult::AwaitingConfirmation { kind, id })
            }
            DragOutcome::Apply(action) => {
                self.dispatch(&action)?;
                Ok(DropResult::Committed)
            }
        }
    }

    /// Carry out the delete awaiting confirmation.
    pub fn confirm_delete(&mut self) -> Result<(), SyncError> {
        let pending = self
            .pending_delete
            .take()
            .ok_or(SyncError::NothingToConfirm)?;
        self.dispatch(&Action::Delete {
            kind: pending.kind,
            id: pending.id.clone(),
        })?;
        self.notifier
            .notify(Notice::success(format!("deleted {} {}", pending.kind, pending.id)));
        Ok(())
    }

    /// Forget the delete awaiting confirmation. Returns whether there was one.
    pub fn cancel_delete(&mut self) -> bool {
        self.pending_delete.take().is_some()
    }

    // -----------------------------------------------------------------------
    // Direct edits
    // -----------------------------------------------------------------------

    /// Run an edit against a copy of local state and persist the rows it
    /// returns. On success the edited copy becomes local state.
    pub fn edit<T>(
        &mut self,
        f: impl FnOnce(&mut Snapshot) -> Result<(T, Vec<Row>), BoardError>,
    ) -> Result<T, SyncError> {
        let base_revision = self.state.revision;
        let mut next = self.state.clone();
        // Validation failures leave state alone; nothing was applied.
        let (value, rows) = f(&mut next)?;
        self.install(next);
        self.commit(PendingCommit {
            base_revision,
            effect: Effect::Upsert(rows),
        })?;
        Ok(value)
    }

    /// Remove a dependency edge.
    pub fn remove_dependency(&mut self, task_id: &str, depends_on: &str) -> Result<(), SyncError> {
        let mut scratch = self.state.clone();
        let edge = deps::remove_dependency(&mut scratch, task_id, depends_on)?;
        self.dispatch(&Action::Delete {
            kind: EntityKind::Dependency,
            id: edge.id,
        })
    }
}

/// Densify every container in a snapshot, returning rows that changed.
pub fn densify_snapshot(state: &mut Snapshot) -> Vec<Row> {
    let mut rows = Vec::new();
    rows.extend(changed_rows(&mut state.columns));
    rows.extend(changed_rows(&mut state.items));
    rows.extend(changed_rows(&mut state.sections));
    rows.extend(changed_rows(&mut state.tasks));
    rows
}

fn changed_rows<T: ordering::Ordered>(all: &mut [T]) -> Vec<Row> {
    let changed = ordering::densify_all(all);
    all.iter()
        .filter(|e| changed.iter().any(|c| c == e.id()))
        .map(ordering::Ordered::to_row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::notify::RecordingNotifier;
    use crate::io::store::MemoryStore;
    use crate::model::{Board, Column, Item, ProjectTask, Section, TaskStatus};
    use pretty_assertions::assert_eq;

    fn item(id: &str, column: &str, idx: usize) -> Item {
        let mut i = Item::new(id, column, id.to_uppercase());
        i.order_index = idx;
        i
    }

    fn seed() -> Snapshot {
        let mut doing = Column::new("doing", "b1", "Doing");
        doing.order_index = 1;
        Snapshot {
            boards: vec![Board {
                id: "b1".into(),
                name: "Sales".into(),
            }],
            columns: vec![Column::new("todo", "b1", "To Do"), doing],
            items: vec![item("a", "todo", 0), item("b", "todo", 1), item("c", "doing", 0)],
            ..Snapshot::default()
        }
    }

    fn session(data: Snapshot) -> Session<MemoryStore, RecordingNotifier> {
        Session::open(MemoryStore::new(data), RecordingNotifier::default()).unwrap()
    }

    fn column_ids(s: &Session<MemoryStore, RecordingNotifier>, col: &str) -> Vec<String> {
        ordering::sorted_ids(&s.state().items, col)
    }

    #[test]
    fn test_dispatch_persists_batch() {
        let mut s = session(seed());
        s.move_across(
            EntityKind::Item,
            "a",
            Slot::new("todo", 0),
            Slot::new("doing", 1),
        )
        .unwrap();
        assert_eq!(column_ids(&s, "doing"), vec!["c", "a"]);
        assert_eq!(s.store().batches().len(), 1);
        assert_eq!(s.store().data().item("a").unwrap().column_id, "doing");
        assert_eq!(s.state().revision, 1);
        assert!(s.notifier().notices.is_empty());
    }

    #[test]
    fn test_apply_local_is_visible_before_commit() {
        let mut s = session(seed());
        let pending = s
            .apply_local(&Action::Reorder {
                kind: EntityKind::Item,
                container_id: "todo".into(),
                ordered_ids: vec!["b".into(), "a".into()],
            })
            .unwrap();
        assert_eq!(column_ids(&s, "todo"), vec!["b", "a"]);
        // store still has the old order
        assert_eq!(ordering::sorted_ids(&s.store().data().items, "todo"), vec!["a", "b"]);
        s.commit(pending).unwrap();
        assert_eq!(ordering::sorted_ids(&s.store().data().items, "todo"), vec!["b", "a"]);
    }

    #[test]
    fn test_failed_commit_reloads_and_notifies_once() {
        let mut s = session(seed());
        s.store_mut().fail_next_upserts(1);
        let fetches_before = s.store().fetch_count();

        let err = s
            .move_across(
                EntityKind::Item,
                "a",
                Slot::new("todo", 0),
                Slot::new("doing", 0),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Rejected(_))));
        assert_eq!(column_ids(&s, "todo"), vec!["a", "b"]);
        assert_eq!(s.store().fetch_count(), fetches_before + 1);
        assert_eq!(s.notifier().errors().count(), 1);
    }

    #[test]
    fn test_failed_commit_and_reload_restores_committed_state() {
        let mut s = session(seed());
        s.reorder_within(EntityKind::Item, "todo", vec!["b".into(), "a".into()])
            .unwrap();
        s.store_mut().fail_next_upserts(1);
        s.store_mut().fail_next_fetches(1);

        let err = s
            .move_across(
                EntityKind::Item,
                "a",
                Slot::new("todo", 1),
                Slot::new("doing", 0),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Rejected(_))));

        // The rejected move is gone; the accepted reorder is kept
        assert_eq!(s.state().item("a").unwrap().column_id, "todo");
        assert_eq!(column_ids(&s, "todo"), vec!["b", "a"]);
        assert_eq!(s.state(), s.store().data());
        assert_eq!(s.notifier().errors().count(), 1);
    }

    #[test]
    fn test_failed_repair_batch_notifies_once() {
        let mut data = seed();
        data.items[1].order_index = 9;
        let mut store = MemoryStore::new(data);
        store.fail_next_upserts(1);
        let s = Session::open(store, RecordingNotifier::default()).unwrap();

        assert_eq!(s.state().item("b").unwrap().order_index, 1);
        assert_eq!(s.store().data().item("b").unwrap().order_index, 9);
        assert_eq!(s.notifier().errors().count(), 1);
    }

    #[test]
    fn test_missing_entity_reloads() {
        let mut s = session(seed());
        let err = s
            .move_across(
                EntityKind::Item,
                "ghost",
                Slot::new("todo", 0),
                Slot::new("doing", 0),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Board(BoardError::NotFound { .. })));
        assert_eq!(s.notifier().errors().count(), 1);
        assert!(s.store().batches().is_empty());
    }

    #[test]
    fn test_second_pending_commit_on_stale_revision_is_discarded() {
        let mut s = session(seed());
        let first = s
            .apply_local(&Action::Reorder {
                kind: EntityKind::Item,
                container_id: "todo".into(),
                ordered_ids: vec!["b".into(), "a".into()],
            })
            .unwrap();
        let second = s
            .apply_local(&Action::Move {
                kind: EntityKind::Item,
                id: "c".into(),
                from: Slot::new("doing", 0),
                to: Slot::new("todo", 0),
            })
            .unwrap();
        assert_eq!(first.base_revision(), second.base_revision());

        s.commit(first).unwrap();
        let err = s.commit(second).unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Conflict { .. })));
        // first batch won; second was discarded by the reload
        assert_eq!(column_ids(&s, "todo"), vec!["b", "a"]);
        assert_eq!(column_ids(&s, "doing"), vec!["c"]);
    }

    #[test]
    fn test_external_write_causes_conflict_then_fresh_state() {
        let mut s = session(seed());
        s.store_mut().write_external(|d| {
            d.items.push(item("z", "doing", 1));
        });
        let err = s
            .reorder_within(EntityKind::Item, "todo", vec!["b".into(), "a".into()])
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Conflict { .. })));
        assert_eq!(column_ids(&s, "doing"), vec!["c", "z"]);

        // retry against fresh state succeeds
        s.reorder_within(EntityKind::Item, "todo", vec!["b".into(), "a".into()])
            .unwrap();
        assert_eq!(column_ids(&s, "todo"), vec!["b", "a"]);
    }

    #[test]
    fn test_drop_to_trash_then_cancel() {
        let mut s = session(seed());
        let ev = DropEvent::new(drag::DragKind::Item, "a", Slot::new("todo", 0)).to_trash();
        let res = s.handle_drop(&ev).unwrap();
        assert_eq!(
            res,
            DropResult::AwaitingConfirmation {
                kind: EntityKind::Item,
                id: "a".into()
            }
        );
        assert_eq!(s.pending_delete(), Some((EntityKind::Item, "a")));
        assert!(s.cancel_delete());
        assert!(!s.cancel_delete());
        assert_eq!(s.state(), s.store().data());
        assert!(matches!(s.confirm_delete(), Err(SyncError::NothingToConfirm)));
    }

    #[test]
    fn test_confirm_delete_leaves_gap_until_load() {
        let mut s = session(seed());
        let ev = DropEvent::new(drag::DragKind::Item, "a", Slot::new("todo", 0)).to_trash();
        s.handle_drop(&ev).unwrap();
        s.confirm_delete().unwrap();

        assert_eq!(s.store().deletes(), &[(EntityKind::Item, "a".to_string())]);
        assert!(s.store().batches().is_empty());
        assert_eq!(s.state().item("b").unwrap().order_index, 1);

        s.load().unwrap();
        assert_eq!(s.state().item("b").unwrap().order_index, 0);
        assert_eq!(s.store().data().item("b").unwrap().order_index, 0);
    }

    #[test]
    fn test_load_densifies_and_persists_repairs() {
        let mut data = seed();
        data.items[1].order_index = 9;
        let s = session(data);
        assert_eq!(s.state().item("b").unwrap().order_index, 1);
        assert_eq!(s.store().batches().len(), 1);
        assert_eq!(s.store().batches()[0].len(), 1);
    }

    #[test]
    fn test_blocked_flags_track_edits() {
        let mut data = seed();
        data.projects.push(crate::model::Project {
            id: "p1".into(),
            name: "Launch".into(),
        });
        data.sections.push(Section {
            id: "s1".into(),
            project_id: "p1".into(),
            title: "Plan".into(),
            order_index: 0,
        });
        let mut t2 = ProjectTask::new("t2", "s1", "Two").with_status(TaskStatus::OnTrack);
        t2.order_index = 1;
        data.tasks = vec![ProjectTask::new("t1", "s1", "One"), t2];
        let mut s = session(data);
        assert!(!s.is_blocked("t1"));

        s.edit(|st| {
            let edge = deps::add_dependency(st, "t1", "t2")?;
            Ok(((), vec![Row::Dependency(edge)]))
        })
        .unwrap();
        assert!(s.is_blocked("t1"));

        s.edit(|st| {
            let t = deps::set_status(st, "t2", TaskStatus::Completed)?;
            Ok(((), vec![Row::Task(t)]))
        })
        .unwrap();
        assert!(!s.is_blocked("t1"));

        s.remove_dependency("t1", "t2").unwrap();
        assert!(s.state().dependencies.is_empty());
        assert!(s.store().data().dependencies.is_empty());
    }

    #[test]
    fn test_edit_validation_error_leaves_state() {
        let mut s = session(seed());
        let before = s.state().clone();
        let err = s
            .edit(|st| {
                let i = crate::ops::crud::add_item(st, "nope", "X")?;
                Ok(((), vec![Row::Item(i)]))
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::Board(BoardError::ContainerNotFound { .. })));
        assert_eq!(s.state(), &before);
        assert!(s.notifier().notices.is_empty());
    }
}
