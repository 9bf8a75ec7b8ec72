use serde::{Deserialize, Serialize};

use super::board::{Board, Column, Item};
use super::project::{Dependency, Project, ProjectTask, Section};

/// Kinds of persisted rows. All but `Dependency` are ordered within a
/// parent container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Item,
    Column,
    Task,
    Section,
    Dependency,
}

impl EntityKind {
    /// Name of the parent container kind (`column`, `board`, ...)
    pub fn container_name(self) -> &'static str {
        match self {
            EntityKind::Item => "column",
            EntityKind::Column => "board",
            EntityKind::Task => "section",
            EntityKind::Section => "project",
            EntityKind::Dependency => "task",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Item => write!(f, "item"),
            EntityKind::Column => write!(f, "column"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::Section => write!(f, "section"),
            EntityKind::Dependency => write!(f, "dependency"),
        }
    }
}

/// A single persisted row, as handed to the store in a batch upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "lowercase")]
pub enum Row {
    Item(Item),
    Column(Column),
    Task(ProjectTask),
    Section(Section),
    Dependency(Dependency),
}

impl Row {
    pub fn id(&self) -> &str {
        match self {
            Row::Item(i) => &i.id,
            Row::Column(c) => &c.id,
            Row::Task(t) => &t.id,
            Row::Section(s) => &s.id,
            Row::Dependency(d) => &d.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Row::Item(_) => EntityKind::Item,
            Row::Column(_) => EntityKind::Column,
            Row::Task(_) => EntityKind::Task,
            Row::Section(_) => EntityKind::Section,
            Row::Dependency(_) => EntityKind::Dependency,
        }
    }
}

/// Every collection the ordering core works over, as of one store revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonic store revision this snapshot was read at
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub tasks: Vec<ProjectTask>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Snapshot {
    pub fn board(&self, id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == id)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&ProjectTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut ProjectTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Whether a container of the given child kind exists
    pub fn has_container(&self, kind: EntityKind, container_id: &str) -> bool {
        match kind {
            EntityKind::Item => self.column(container_id).is_some(),
            EntityKind::Column => self.board(container_id).is_some(),
            EntityKind::Task => self.section(container_id).is_some(),
            EntityKind::Section => self.project(container_id).is_some(),
            EntityKind::Dependency => false,
        }
    }

    /// Whether an entity of the given kind exists
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Item => self.item(id).is_some(),
            EntityKind::Column => self.column(id).is_some(),
            EntityKind::Task => self.task(id).is_some(),
            EntityKind::Section => self.section(id).is_some(),
            EntityKind::Dependency => self.dependencies.iter().any(|d| d.id == id),
        }
    }

    /// Write a row over the entity with the same id, or append it.
    pub fn apply_row(&mut self, row: &Row) {
        match row {
            Row::Item(r) => upsert_by_id(&mut self.items, r.clone(), |x| &x.id),
            Row::Column(r) => upsert_by_id(&mut self.columns, r.clone(), |x| &x.id),
            Row::Task(r) => upsert_by_id(&mut self.tasks, r.clone(), |x| &x.id),
            Row::Section(r) => upsert_by_id(&mut self.sections, r.clone(), |x| &x.id),
            Row::Dependency(r) => upsert_by_id(&mut self.dependencies, r.clone(), |x| &x.id),
        }
    }

    /// Remove an entity. Returns false if it was not present.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Item => remove_by_id(&mut self.items, id, |x| &x.id),
            EntityKind::Column => remove_by_id(&mut self.columns, id, |x| &x.id),
            EntityKind::Task => {
                let removed = remove_by_id(&mut self.tasks, id, |x| &x.id);
                if removed {
                    self.dependencies
                        .retain(|d| d.task_id != id && d.depends_on != id);
                }
                removed
            }
            EntityKind::Section => remove_by_id(&mut self.sections, id, |x| &x.id),
            EntityKind::Dependency => remove_by_id(&mut self.dependencies, id, |x| &x.id),
        }
    }
}

fn upsert_by_id<T>(rows: &mut Vec<T>, row: T, id: impl Fn(&T) -> &String) {
    match rows.iter().position(|r| id(r) == id(&row)) {
        Some(idx) => rows[idx] = row,
        None => rows.push(row),
    }
}

fn remove_by_id<T>(rows: &mut Vec<T>, target: &str, id: impl Fn(&T) -> &String) -> bool {
    let before = rows.len();
    rows.retain(|r| id(r) != target);
    rows.len() != before
}
