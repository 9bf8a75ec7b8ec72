pub mod check;
pub mod crud;
pub mod deps;
pub mod drag;
pub mod ordering;
pub mod reconcile;
pub mod reduce;

use crate::model::EntityKind;

/// Error type for board and project-task operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("{} not found: {id}", .kind.container_name())]
    ContainerNotFound { kind: EntityKind, id: String },
    #[error("{kind} {id} is not in {} {container_id}", .kind.container_name())]
    NotInContainer {
        kind: EntityKind,
        id: String,
        container_id: String,
    },
    #[error("ordering for {container_id} must list each of its {expected} members exactly once")]
    NotAPermutation {
        container_id: String,
        expected: usize,
    },
    #[error("task cannot depend on itself: {0}")]
    SelfDependency(String),
    #[error("dependency already exists: {task_id} -> {depends_on}")]
    DuplicateDependency { task_id: String, depends_on: String },
    #[error("dependency would create a cycle: {}", join_path(.path))]
    DependencyCycle { path: Vec<String> },
    #[error("task {0} has incomplete subtasks")]
    IncompleteSubtasks(String),
    #[error("task {task_id} is blocked by: {}", .blockers.join(", "))]
    Blocked {
        task_id: String,
        blockers: Vec<String>,
    },
}

fn join_path(path: &[String]) -> String {
    path.join(" -> ")
}
