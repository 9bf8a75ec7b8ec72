use serde::Serialize;

use crate::model::{Snapshot, TaskStatus};
use crate::ops::deps;
use crate::ops::ordering;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BoardJson {
    pub id: String,
    pub name: String,
    pub columns: Vec<ColumnJson>,
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub id: String,
    pub title: String,
    pub order_index: usize,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct ItemJson {
    pub id: String,
    pub title: String,
    pub order_index: usize,
}

#[derive(Serialize)]
pub struct ProjectJson {
    pub id: String,
    pub name: String,
    pub sections: Vec<SectionJson>,
}

#[derive(Serialize)]
pub struct SectionJson {
    pub id: String,
    pub title: String,
    pub order_index: usize,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub order_index: usize,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubtaskJson>,
}

#[derive(Serialize)]
pub struct SubtaskJson {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// A board with its columns and items in display order.
pub fn board_to_json(state: &Snapshot, board_id: &str) -> Option<BoardJson> {
    let board = state.board(board_id)?;
    let columns = ordering::sorted_members(&state.columns, board_id)
        .into_iter()
        .map(|col| ColumnJson {
            id: col.id.clone(),
            title: col.title.clone(),
            order_index: col.order_index,
            items: ordering::sorted_members(&state.items, &col.id)
                .into_iter()
                .map(|item| ItemJson {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    order_index: item.order_index,
                })
                .collect(),
        })
        .collect();
    Some(BoardJson {
        id: board.id.clone(),
        name: board.name.clone(),
        columns,
    })
}

/// A project with its sections and tasks in display order, each task
/// carrying its derived blocked state.
pub fn project_to_json(state: &Snapshot, project_id: &str) -> Option<ProjectJson> {
    let project = state.project(project_id)?;
    let sections = ordering::sorted_members(&state.sections, project_id)
        .into_iter()
        .map(|sec| SectionJson {
            id: sec.id.clone(),
            title: sec.title.clone(),
            order_index: sec.order_index,
            tasks: deps::section_view(state, &sec.id)
                .into_iter()
                .map(|view| TaskJson {
                    id: view.task.id.clone(),
                    title: view.task.title.clone(),
                    status: view.task.status,
                    order_index: view.task.order_index,
                    blocked: view.is_blocked(),
                    blockers: view.blockers().iter().map(|b| b.to_string()).collect(),
                    subtasks: view
                        .task
                        .subtasks
                        .iter()
                        .map(|s| SubtaskJson {
                            id: s.id.clone(),
                            title: s.title.clone(),
                            completed: s.completed,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    Some(ProjectJson {
        id: project.id.clone(),
        name: project.name.clone(),
        sections,
    })
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

pub fn format_board(board: &BoardJson) -> Vec<String> {
    let mut lines = vec![format!("{} [{}]", board.name, board.id)];
    for col in &board.columns {
        lines.push(format!("  {} [{}] ({})", col.title, col.id, col.items.len()));
        for item in &col.items {
            lines.push(format!("    {}. {} {}", item.order_index, item.id, item.title));
        }
    }
    lines
}

pub fn format_project(project: &ProjectJson) -> Vec<String> {
    let mut lines = vec![format!("{} [{}]", project.name, project.id)];
    for sec in &project.sections {
        lines.push(format!("  {} [{}]", sec.title, sec.id));
        for task in &sec.tasks {
            let mut line = format!(
                "    {}. {} {} ({})",
                task.order_index, task.id, task.title, task.status
            );
            if task.blocked {
                line.push_str(&format!(" blocked by: {}", task.blockers.join(", ")));
            }
            lines.push(line);
            for sub in &task.subtasks {
                let mark = if sub.completed { 'x' } else { ' ' };
                lines.push(format!("       [{}] {} {}", mark, sub.id, sub.title));
            }
        }
    }
    lines
}
