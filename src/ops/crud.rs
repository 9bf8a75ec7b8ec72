use super::BoardError;
use super::ordering::next_order_index;
use crate::model::{Column, EntityKind, Item, ProjectTask, Section, Snapshot, Subtask};

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Append a new item to the bottom of a column.
pub fn add_item(state: &mut Snapshot, column_id: &str, title: &str) -> Result<Item, BoardError> {
    require_container(state, EntityKind::Item, column_id)?;
    let id = next_id(state.items.iter().map(|i| i.id.as_str()), "I");
    let mut item = Item::new(id, column_id, title);
    item.order_index = next_order_index(&state.items, column_id);
    state.items.push(item.clone());
    Ok(item)
}

/// Append a new column to the right end of a board.
pub fn add_column(state: &mut Snapshot, board_id: &str, title: &str) -> Result<Column, BoardError> {
    require_container(state, EntityKind::Column, board_id)?;
    let id = next_id(state.columns.iter().map(|c| c.id.as_str()), "C");
    let mut column = Column::new(id, board_id, title);
    column.order_index = next_order_index(&state.columns, board_id);
    state.columns.push(column.clone());
    Ok(column)
}

/// Append a new section to the end of a project.
pub fn add_section(
    state: &mut Snapshot,
    project_id: &str,
    title: &str,
) -> Result<Section, BoardError> {
    require_container(state, EntityKind::Section, project_id)?;
    let id = next_id(state.sections.iter().map(|s| s.id.as_str()), "S");
    let section = Section {
        id,
        project_id: project_id.to_string(),
        title: title.to_string(),
        order_index: next_order_index(&state.sections, project_id),
    };
    state.sections.push(section.clone());
    Ok(section)
}

/// Append a new task to the bottom of a section.
pub fn add_task(
    state: &mut Snapshot,
    section_id: &str,
    title: &str,
) -> Result<ProjectTask, BoardError> {
    require_container(state, EntityKind::Task, section_id)?;
    let id = next_id(state.tasks.iter().map(|t| t.id.as_str()), "T");
    let mut task = ProjectTask::new(id, section_id, title);
    task.order_index = next_order_index(&state.tasks, section_id);
    state.tasks.push(task.clone());
    Ok(task)
}

/// Add a subtask. Subtask ids extend the parent's id: `T-004.1`, `T-004.2`.
/// Returns the updated parent task.
pub fn add_subtask(
    state: &mut Snapshot,
    task_id: &str,
    title: &str,
) -> Result<ProjectTask, BoardError> {
    let task = find_task_mut(state, task_id)?;
    let next = task
        .subtasks
        .iter()
        .filter_map(|s| s.id.rsplit('.').next()?.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    task.subtasks.push(Subtask {
        id: format!("{}.{}", task_id, next),
        title: title.to_string(),
        completed: false,
    });
    Ok(task.clone())
}

/// Flip a subtask's completed flag. Returns the updated parent task.
pub fn toggle_subtask(
    state: &mut Snapshot,
    task_id: &str,
    subtask_id: &str,
) -> Result<ProjectTask, BoardError> {
    let task = find_task_mut(state, task_id)?;
    let sub = task
        .subtasks
        .iter_mut()
        .find(|s| s.id == subtask_id)
        .ok_or_else(|| BoardError::NotFound {
            kind: EntityKind::Task,
            id: subtask_id.to_string(),
        })?;
    sub.completed = !sub.completed;
    Ok(task.clone())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_container(state: &Snapshot, kind: EntityKind, id: &str) -> Result<(), BoardError> {
    if state.has_container(kind, id) {
        Ok(())
    } else {
        Err(BoardError::ContainerNotFound {
            kind,
            id: id.to_string(),
        })
    }
}

fn find_task_mut<'a>(
    state: &'a mut Snapshot,
    task_id: &str,
) -> Result<&'a mut ProjectTask, BoardError> {
    state.task_mut(task_id).ok_or_else(|| BoardError::NotFound {
        kind: EntityKind::Task,
        id: task_id.to_string(),
    })
}

/// Next free `PREFIX-NNN` id, one past the highest number in use.
pub fn next_id<'a>(existing: impl Iterator<Item = &'a str>, prefix: &str) -> String {
    let prefix_dash = format!("{}-", prefix);
    let max = existing
        .filter_map(|id| id.strip_prefix(&prefix_dash))
        .filter_map(|num| num.split('.').next()?.parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:03}", prefix, max + 1)
}
