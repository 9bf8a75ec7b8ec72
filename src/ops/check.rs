use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::deps;
use super::ordering::{self, Ordered};
use crate::model::{EntityKind, Snapshot};

/// Structured result from `cbx check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (something that should be fixed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// Members of a container do not hold exactly `0..n-1`
    #[serde(rename = "non_dense")]
    NonDense {
        kind: EntityKind,
        container_id: String,
        indices: Vec<usize>,
    },
    /// An entity points at a parent that doesn't exist
    #[serde(rename = "dangling_parent")]
    DanglingParent {
        kind: EntityKind,
        id: String,
        parent_id: String,
    },
    /// A dependency edge points at a task that doesn't exist
    #[serde(rename = "dangling_dep")]
    DanglingDep { task_id: String, depends_on: String },
    /// A task depends on itself
    #[serde(rename = "self_dep")]
    SelfDep { task_id: String },
    /// Tasks that (transitively) depend on each other
    #[serde(rename = "dep_cycle")]
    DepCycle { task_ids: Vec<String> },
    /// The same id appears more than once within a collection
    #[serde(rename = "duplicate_id")]
    DuplicateId { kind: EntityKind, id: String },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Completed task that still waits on open tasks
    #[serde(rename = "completed_while_blocked")]
    CompletedWhileBlocked {
        task_id: String,
        blockers: Vec<String>,
    },
    /// Completed task with unchecked subtasks
    #[serde(rename = "completed_with_open_subtasks")]
    CompletedWithOpenSubtasks { task_id: String },
    /// Board with no columns to put items in
    #[serde(rename = "empty_board")]
    EmptyBoard { board_id: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a snapshot and return structured results.
///
/// Checks performed:
/// 1. Every container's members are densely indexed
/// 2. Every entity's parent exists
/// 3. No duplicate ids
/// 4. Dependency edges resolve, are not self-loops, and form no cycles
/// 5. Warnings for completed tasks that are blocked or have open subtasks
pub fn check_snapshot(state: &Snapshot) -> CheckResult {
    let mut result = CheckResult::default();

    check_collection(&state.items, EntityKind::Item, |p| state.column(p).is_some(), &mut result);
    check_collection(&state.columns, EntityKind::Column, |p| state.board(p).is_some(), &mut result);
    check_collection(&state.tasks, EntityKind::Task, |p| state.section(p).is_some(), &mut result);
    check_collection(
        &state.sections,
        EntityKind::Section,
        |p| state.project(p).is_some(),
        &mut result,
    );

    check_dependencies(state, &mut result);
    check_tasks(state, &mut result);

    for board in &state.boards {
        if !state.columns.iter().any(|c| c.board_id == board.id) {
            result.warnings.push(CheckWarning::EmptyBoard {
                board_id: board.id.clone(),
            });
        }
    }

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Per-collection validation
// ---------------------------------------------------------------------------

fn check_collection<T: Ordered>(
    all: &[T],
    kind: EntityKind,
    parent_exists: impl Fn(&str) -> bool,
    result: &mut CheckResult,
) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    for e in all {
        if !seen.insert(e.id()) && reported.insert(e.id()) {
            result.errors.push(CheckError::DuplicateId {
                kind,
                id: e.id().to_string(),
            });
        }
        if !parent_exists(e.parent_id()) {
            result.errors.push(CheckError::DanglingParent {
                kind,
                id: e.id().to_string(),
                parent_id: e.parent_id().to_string(),
            });
        }
    }

    for parent in ordering::parents(all) {
        if !ordering::is_dense(all, &parent) {
            let indices = ordering::sorted_members(all, &parent)
                .iter()
                .map(|e| e.order_index())
                .collect();
            result.errors.push(CheckError::NonDense {
                kind,
                container_id: parent,
                indices,
            });
        }
    }
}

fn check_dependencies(state: &Snapshot, result: &mut CheckResult) {
    let task_ids: HashSet<&str> = state.tasks.iter().map(|t| t.id.as_str()).collect();
    for edge in &state.dependencies {
        if edge.task_id == edge.depends_on {
            result.errors.push(CheckError::SelfDep {
                task_id: edge.task_id.clone(),
            });
            continue;
        }
        for id in [&edge.task_id, &edge.depends_on] {
            if !task_ids.contains(id.as_str()) {
                result.errors.push(CheckError::DanglingDep {
                    task_id: edge.task_id.clone(),
                    depends_on: edge.depends_on.clone(),
                });
                break;
            }
        }
    }

    for cycle in deps::find_cycles(&state.dependencies) {
        // single-node cycles are self-loops, already reported above
        if cycle.len() > 1 {
            result.errors.push(CheckError::DepCycle { task_ids: cycle });
        }
    }
}

fn check_tasks(state: &Snapshot, result: &mut CheckResult) {
    let flags: HashMap<String, bool> = deps::blocked_flags(state);
    for task in state.tasks.iter().filter(|t| t.status.is_terminal()) {
        if flags.get(&task.id).copied().unwrap_or(false) {
            let blockers = deps::blockers(&task.id, &state.tasks, &state.dependencies)
                .into_iter()
                .map(str::to_string)
                .collect();
            result.warnings.push(CheckWarning::CompletedWhileBlocked {
                task_id: task.id.clone(),
                blockers,
            });
        }
        if task.has_incomplete_subtasks() {
            result.warnings.push(CheckWarning::CompletedWithOpenSubtasks {
                task_id: task.id.clone(),
            });
        }
    }
}
