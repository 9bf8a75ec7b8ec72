//! Task dependencies: derived blocked status, edge editing, cycle checks.
//!
//! # Edge direction
//!
//! Edges point from the waiting task to the task it waits on
//! (`task_id → depends_on`). Adding `from → to` closes a cycle when `from`
//! is already reachable from `to`.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;

use super::BoardError;
use super::ordering;
use crate::model::{Dependency, EntityKind, ProjectTask, Snapshot, TaskStatus};

// ---------------------------------------------------------------------------
// Blocked status
// ---------------------------------------------------------------------------

/// Ids of the tasks `task_id` waits on that are not yet `Completed`.
///
/// Edges whose target no longer exists do not block.
pub fn blockers<'a>(task_id: &str, tasks: &'a [ProjectTask], deps: &[Dependency]) -> Vec<&'a str> {
    let mut out: Vec<&'a str> = Vec::new();
    for edge in deps.iter().filter(|d| d.task_id == task_id) {
        if let Some(target) = tasks.iter().find(|t| t.id == edge.depends_on)
            && !target.status.is_terminal()
            && !out.contains(&target.id.as_str())
        {
            out.push(target.id.as_str());
        }
    }
    out
}

/// True iff at least one dependency of `task` is not `Completed`.
pub fn is_blocked(task: &ProjectTask, tasks: &[ProjectTask], deps: &[Dependency]) -> bool {
    !blockers(&task.id, tasks, deps).is_empty()
}

/// Blocked flag for every task in the snapshot, keyed by task id.
pub fn blocked_flags(state: &Snapshot) -> HashMap<String, bool> {
    state
        .tasks
        .iter()
        .map(|t| (t.id.clone(), is_blocked(t, &state.tasks, &state.dependencies)))
        .collect()
}

/// A task as presented to a view, with its derived blocked state
#[derive(Debug, Clone)]
pub struct TaskView<'a> {
    pub task: &'a ProjectTask,
    blockers: Vec<&'a str>,
}

impl<'a> TaskView<'a> {
    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }

    pub fn blockers(&self) -> &[&'a str] {
        &self.blockers
    }
}

/// Tasks of one section in display order, each with its blocked state.
pub fn section_view<'a>(state: &'a Snapshot, section_id: &str) -> Vec<TaskView<'a>> {
    ordering::sorted_members(&state.tasks, section_id)
        .into_iter()
        .map(|task| TaskView {
            task,
            blockers: blockers(&task.id, &state.tasks, &state.dependencies),
        })
        .collect()
}

/// A blocked task and what it is waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
    pub task_id: String,
    pub title: String,
    pub section: String,
    pub blockers: Vec<String>,
}

/// Every blocked task, in snapshot order.
pub fn blocked_tasks(state: &Snapshot) -> Vec<BlockedTask> {
    state
        .tasks
        .iter()
        .filter_map(|t| {
            let b = blockers(&t.id, &state.tasks, &state.dependencies);
            (!b.is_empty()).then(|| BlockedTask {
                task_id: t.id.clone(),
                title: t.title.clone(),
                section: t.section.clone(),
                blockers: b.into_iter().map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Refuse a transition to `Completed` while subtasks are open or the task
/// is blocked.
pub fn ensure_can_complete(state: &Snapshot, task_id: &str) -> Result<(), BoardError> {
    let task = state.task(task_id).ok_or_else(|| BoardError::NotFound {
        kind: EntityKind::Task,
        id: task_id.to_string(),
    })?;
    if task.has_incomplete_subtasks() {
        return Err(BoardError::IncompleteSubtasks(task_id.to_string()));
    }
    let b = blockers(task_id, &state.tasks, &state.dependencies);
    if !b.is_empty() {
        return Err(BoardError::Blocked {
            task_id: task_id.to_string(),
            blockers: b.into_iter().map(str::to_string).collect(),
        });
    }
    Ok(())
}

/// Set a task's status, enforcing the completion guard.
/// Returns a copy of the updated task for persisting.
pub fn set_status(
    state: &mut Snapshot,
    task_id: &str,
    status: TaskStatus,
) -> Result<ProjectTask, BoardError> {
    if status.is_terminal() {
        ensure_can_complete(state, task_id)?;
    }
    let task = state.task_mut(task_id).ok_or_else(|| BoardError::NotFound {
        kind: EntityKind::Task,
        id: task_id.to_string(),
    })?;
    if task.status != status {
        if status.is_terminal() {
            task.completed_at = Some(chrono::Utc::now());
        } else if task.status.is_terminal() {
            task.completed_at = None;
        }
        task.status = status;
    }
    Ok(task.clone())
}

// ---------------------------------------------------------------------------
// Edge editing
// ---------------------------------------------------------------------------

/// Add `task_id → depends_on`. Rejects self-loops, duplicates, unknown
/// tasks, and edges that would close a cycle.
pub fn add_dependency(
    state: &mut Snapshot,
    task_id: &str,
    depends_on: &str,
) -> Result<Dependency, BoardError> {
    if task_id == depends_on {
        return Err(BoardError::SelfDependency(task_id.to_string()));
    }
    for id in [task_id, depends_on] {
        if state.task(id).is_none() {
            return Err(BoardError::NotFound {
                kind: EntityKind::Task,
                id: id.to_string(),
            });
        }
    }
    if state
        .dependencies
        .iter()
        .any(|d| d.task_id == task_id && d.depends_on == depends_on)
    {
        return Err(BoardError::DuplicateDependency {
            task_id: task_id.to_string(),
            depends_on: depends_on.to_string(),
        });
    }
    if let Some(path) = would_create_cycle(&state.dependencies, task_id, depends_on) {
        return Err(BoardError::DependencyCycle { path });
    }

    let edge = Dependency::new(task_id, depends_on);
    state.dependencies.push(edge.clone());
    Ok(edge)
}

/// Remove `task_id → depends_on`, returning the removed edge.
pub fn remove_dependency(
    state: &mut Snapshot,
    task_id: &str,
    depends_on: &str,
) -> Result<Dependency, BoardError> {
    let pos = state
        .dependencies
        .iter()
        .position(|d| d.task_id == task_id && d.depends_on == depends_on)
        .ok_or_else(|| BoardError::NotFound {
            kind: EntityKind::Dependency,
            id: Dependency::edge_id(task_id, depends_on),
        })?;
    Ok(state.dependencies.remove(pos))
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

fn graph(deps: &[Dependency]) -> DiGraphMap<&str, ()> {
    let mut g = DiGraphMap::new();
    for d in deps {
        g.add_edge(d.task_id.as_str(), d.depends_on.as_str(), ());
    }
    g
}

/// If adding `from → to` would close a cycle, return it as
/// `from -> to -> ... -> from`.
pub fn would_create_cycle(deps: &[Dependency], from: &str, to: &str) -> Option<Vec<String>> {
    if from == to {
        return Some(vec![from.to_string(), to.to_string()]);
    }
    let g = graph(deps);
    if !g.contains_node(to) || !g.contains_node(from) {
        return None;
    }

    let mut queue: VecDeque<&str> = VecDeque::from([to]);
    let mut visited: HashSet<&str> = HashSet::from([to]);
    let mut parent: HashMap<&str, &str> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        if current == from {
            let mut path = vec![from.to_string()];
            let mut node = from;
            while node != to {
                match parent.get(node) {
                    Some(&p) => {
                        path.push(p.to_string());
                        node = p;
                    }
                    None => break,
                }
            }
            // path is from <- ... <- to; flip to read forwards
            path.reverse();
            let mut cycle = vec![from.to_string()];
            cycle.extend(path);
            return Some(cycle);
        }
        for next in g.neighbors(current) {
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

/// All dependency cycles currently present, each as a sorted list of task
/// ids. Self-loops show up as one-element cycles.
pub fn find_cycles(deps: &[Dependency]) -> Vec<Vec<String>> {
    let g = graph(deps);
    let mut cycles: Vec<Vec<String>> = tarjan_scc(&g)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| g.contains_edge(*n, *n))
        })
        .map(|component| {
            let mut ids: Vec<String> = component.into_iter().map(str::to_string).collect();
            ids.sort_unstable();
            ids
        })
        .collect();
    cycles.sort_unstable();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Subtask;
    use pretty_assertions::assert_eq;

    fn state() -> Snapshot {
        Snapshot {
            tasks: vec![
                ProjectTask::new("t1", "s1", "Launch"),
                ProjectTask::new("t2", "s1", "Pricing").with_status(TaskStatus::OnTrack),
                ProjectTask::new("t3", "s1", "Legal").with_status(TaskStatus::Completed),
                ProjectTask::new("t4", "s2", "Press"),
            ],
            dependencies: vec![Dependency::new("t1", "t2"), Dependency::new("t1", "t3")],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_blocked_when_any_dependency_open() {
        let s = state();
        let t1 = s.task("t1").unwrap();
        assert!(is_blocked(t1, &s.tasks, &s.dependencies));
        assert_eq!(blockers("t1", &s.tasks, &s.dependencies), vec!["t2"]);
    }

    #[test]
    fn test_unblocked_after_dependency_completes() {
        let mut s = state();
        s.task_mut("t2").unwrap().status = TaskStatus::Completed;
        let t1 = s.task("t1").unwrap();
        assert!(!is_blocked(t1, &s.tasks, &s.dependencies));
    }

    #[test]
    fn test_no_dependencies_never_blocked() {
        let s = state();
        let flags = blocked_flags(&s);
        assert_eq!(flags["t4"], false);
        assert_eq!(flags["t2"], false);
        assert_eq!(flags["t1"], true);
    }

    #[test]
    fn test_dangling_edge_does_not_block() {
        let mut s = state();
        s.dependencies = vec![Dependency::new("t4", "gone")];
        assert!(!is_blocked(s.task("t4").unwrap(), &s.tasks, &s.dependencies));
    }

    #[test]
    fn test_section_view_reports_blocked() {
        let mut s = state();
        for (i, t) in s.tasks.iter_mut().enumerate() {
            t.order_index = i;
        }
        let view = section_view(&s, "s1");
        let flags: Vec<(&str, bool)> = view
            .iter()
            .map(|v| (v.task.id.as_str(), v.is_blocked()))
            .collect();
        assert_eq!(flags, vec![("t1", true), ("t2", false), ("t3", false)]);
        assert_eq!(view[0].blockers(), &["t2"]);
    }

    #[test]
    fn test_blocked_tasks_lists_blockers() {
        let list = blocked_tasks(&state());
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].task_id, "t1");
        assert_eq!(list[0].blockers, vec!["t2".to_string()]);
    }

    #[test]
    fn test_add_dependency_rules() {
        let mut s = state();
        assert!(matches!(
            add_dependency(&mut s, "t4", "t4"),
            Err(BoardError::SelfDependency(_))
        ));
        assert!(matches!(
            add_dependency(&mut s, "t1", "t2"),
            Err(BoardError::DuplicateDependency { .. })
        ));
        assert!(matches!(
            add_dependency(&mut s, "t1", "nope"),
            Err(BoardError::NotFound { .. })
        ));
        let edge = add_dependency(&mut s, "t4", "t1").unwrap();
        assert_eq!(edge.id, "t4->t1");
        assert_eq!(s.dependencies.len(), 3);
    }

    #[test]
    fn test_add_dependency_rejects_cycle_with_path() {
        let mut s = state();
        add_dependency(&mut s, "t2", "t4").unwrap();
        // t1 -> t2 -> t4; closing t4 -> t1 would loop
        let err = add_dependency(&mut s, "t4", "t1").unwrap_err();
        match err {
            BoardError::DependencyCycle { path } => {
                assert_eq!(path, vec!["t4", "t1", "t2", "t4"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_remove_dependency() {
        let mut s = state();
        let removed = remove_dependency(&mut s, "t1", "t2").unwrap();
        assert_eq!(removed.depends_on, "t2");
        assert!(!is_blocked(s.task("t1").unwrap(), &s.tasks, &s.dependencies));
        assert!(remove_dependency(&mut s, "t1", "t2").is_err());
    }

    #[test]
    fn test_find_cycles() {
        let deps = vec![
            Dependency::new("a", "b"),
            Dependency::new("b", "c"),
            Dependency::new("c", "a"),
            Dependency::new("d", "a"),
        ];
        assert_eq!(find_cycles(&deps), vec![vec!["a", "b", "c"]]);
        assert!(find_cycles(&state().dependencies).is_empty());
    }

    #[test]
    fn test_completion_guard() {
        let mut s = state();
        assert!(matches!(
            set_status(&mut s, "t1", TaskStatus::Completed),
            Err(BoardError::Blocked { .. })
        ));

        s.task_mut("t4").unwrap().subtasks.push(Subtask {
            id: "st1".into(),
            title: "Draft".into(),
            completed: false,
        });
        assert!(matches!(
            set_status(&mut s, "t4", TaskStatus::Completed),
            Err(BoardError::IncompleteSubtasks(_))
        ));

        s.task_mut("t4").unwrap().subtasks[0].completed = true;
        let done = set_status(&mut s, "t4", TaskStatus::Completed).unwrap();
        assert!(done.completed_at.is_some());

        let reopened = set_status(&mut s, "t4", TaskStatus::AtRisk).unwrap();
        assert!(reopened.completed_at.is_none());
    }
}
