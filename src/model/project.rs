use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project whose tasks are laid out in sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// A section of a project's task board, ordered within the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub order_index: usize,
}

/// Project task status. Only `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "On Track")]
    OnTrack,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Off Track")]
    OffTrack,
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        self == TaskStatus::Completed
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::OnTrack => "On Track",
            TaskStatus::AtRisk => "At Risk",
            TaskStatus::OffTrack => "Off Track",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Parse a status from its label or a kebab/snake-case spelling
    /// (`on-track`, `on_track`, `On Track` all work).
    pub fn parse(s: &str) -> Option<TaskStatus> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "notstarted" => Some(TaskStatus::NotStarted),
            "ontrack" => Some(TaskStatus::OnTrack),
            "atrisk" => Some(TaskStatus::AtRisk),
            "offtrack" => Some(TaskStatus::OffTrack),
            "completed" | "done" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A checklist entry under a project task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// A task on a project board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: String,
    /// Section the task currently sits in
    pub section: String,
    pub title: String,
    pub status: TaskStatus,
    pub order_index: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    /// Set when the task enters `Completed`, cleared when it leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProjectTask {
    pub fn new(id: impl Into<String>, section: impl Into<String>, title: impl Into<String>) -> Self {
        ProjectTask {
            id: id.into(),
            section: section.into(),
            title: title.into(),
            status: TaskStatus::NotStarted,
            order_index: 0,
            subtasks: Vec::new(),
            completed_at: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn has_incomplete_subtasks(&self) -> bool {
        self.subtasks.iter().any(|s| !s.completed)
    }
}

/// Directed edge `task_id → depends_on`: `task_id` waits on `depends_on`.
///
/// The id is derived from both endpoints, so an edge can only be stored once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub task_id: String,
    pub depends_on: String,
}

impl Dependency {
    pub fn new(task_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        let task_id = task_id.into();
        let depends_on = depends_on.into();
        Dependency {
            id: Dependency::edge_id(&task_id, &depends_on),
            task_id,
            depends_on,
        }
    }

    pub fn edge_id(task_id: &str, depends_on: &str) -> String {
        format!("{}->{}", task_id, depends_on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_spellings() {
        assert_eq!(TaskStatus::parse("On Track"), Some(TaskStatus::OnTrack));
        assert_eq!(TaskStatus::parse("on-track"), Some(TaskStatus::OnTrack));
        assert_eq!(TaskStatus::parse("not_started"), Some(TaskStatus::NotStarted));
        assert_eq!(TaskStatus::parse("done"), Some(TaskStatus::Completed));
        assert_eq!(TaskStatus::parse("sideways"), None);
    }

    #[test]
    fn test_status_serde_uses_labels() {
        let json = serde_json::to_string(&TaskStatus::AtRisk).unwrap();
        assert_eq!(json, "\"At Risk\"");
        let back: TaskStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(back, TaskStatus::Completed);
    }

    #[test]
    fn test_incomplete_subtasks() {
        let mut task = ProjectTask::new("t1", "s1", "Ship it");
        assert!(!task.has_incomplete_subtasks());
        task.subtasks.push(Subtask {
            id: "st1".into(),
            title: "Write docs".into(),
            completed: false,
        });
        assert!(task.has_incomplete_subtasks());
        task.subtasks[0].completed = true;
        assert!(!task.has_incomplete_subtasks());
    }
}
