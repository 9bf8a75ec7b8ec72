mod init;
pub use init::{cmd_init, seed_snapshot};

use std::path::{Path, PathBuf};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, Workspace};
use crate::io::file_store::FileStore;
use crate::io::notify::TracingNotifier;
use crate::io::store::Store;
use crate::model::{Row, Snapshot, TaskStatus};
use crate::ops::drag::{self, DragKind, DropEvent};
use crate::ops::reconcile::{self, DropResult, Session};
use crate::ops::{check, crud, deps, ordering};

type CmdResult = Result<(), Box<dyn std::error::Error>>;
type FileSession = Session<FileStore, TracingNotifier>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let start = start_dir(cli.project_dir.as_deref())?;

    match cli.command {
        Commands::Init(args) => cmd_init(args, &start),

        // Read commands
        Commands::Show(args) => cmd_show(&start, args, json),
        Commands::Tasks(args) => cmd_tasks(&start, args, json),
        Commands::Blocked => cmd_blocked(&start, json),
        Commands::Check => cmd_check(&start, json),

        // Write commands
        Commands::Add(args) => cmd_add(&start, args),
        Commands::Drop(args) => cmd_drop(&start, args),
        Commands::Dep(args) => cmd_dep(&start, args),
        Commands::Status(args) => cmd_status(&start, args),
        Commands::Subtask(args) => cmd_subtask(&start, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Directory to start workspace discovery from (`-C` or the cwd).
pub fn start_dir(project_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match project_dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

/// Stored state, densified in memory for display. Nothing is written.
fn read_state(start: &Path) -> Result<(Workspace, Snapshot), Box<dyn std::error::Error>> {
    let workspace = config_io::load_workspace(start)?;
    let mut state = workspace.store().fetch_all()?;
    reconcile::densify_snapshot(&mut state);
    Ok((workspace, state))
}

fn open_session(start: &Path) -> Result<(Workspace, FileSession), Box<dyn std::error::Error>> {
    let workspace = config_io::load_workspace(start)?;
    let session = Session::open(workspace.store(), TracingNotifier)?;
    Ok((workspace, session))
}

/// Board named on the command line, else the configured default, else the
/// only board.
fn resolve_board(
    workspace: &Workspace,
    state: &Snapshot,
    given: Option<String>,
) -> Result<String, String> {
    if let Some(id) = given.or_else(|| workspace.config.board.default_board.clone()) {
        return Ok(id);
    }
    match state.boards.as_slice() {
        [only] => Ok(only.id.clone()),
        _ => Err("no board given and no [board] default_board configured".to_string()),
    }
}

/// Project named on the command line, else the only project, else the one
/// sharing the default board's id.
fn resolve_project(
    workspace: &Workspace,
    state: &Snapshot,
    given: Option<String>,
) -> Result<String, String> {
    if let Some(id) = given {
        return Ok(id);
    }
    if let [only] = state.projects.as_slice() {
        return Ok(only.id.clone());
    }
    workspace
        .config
        .board
        .default_board
        .clone()
        .filter(|id| state.project(id).is_some())
        .ok_or_else(|| "no project given and more than one project exists".to_string())
}

fn member_count(state: &Snapshot, kind: DragKind, container_id: &str) -> usize {
    match kind {
        DragKind::Item => ordering::next_order_index(&state.items, container_id),
        DragKind::Column => ordering::next_order_index(&state.columns, container_id),
        DragKind::Task => ordering::next_order_index(&state.tasks, container_id),
        DragKind::Section => ordering::next_order_index(&state.sections, container_id),
    }
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_show(start: &Path, args: ShowArgs, json: bool) -> CmdResult {
    let (workspace, state) = read_state(start)?;
    let board_id = resolve_board(&workspace, &state, args.board)?;
    let board = board_to_json(&state, &board_id)
        .ok_or_else(|| format!("board not found: {}", board_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else {
        for line in format_board(&board) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_tasks(start: &Path, args: TasksArgs, json: bool) -> CmdResult {
    let (workspace, state) = read_state(start)?;
    let project_id = resolve_project(&workspace, &state, args.project)?;
    let project = project_to_json(&state, &project_id)
        .ok_or_else(|| format!("project not found: {}", project_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&project)?);
    } else {
        for line in format_project(&project) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_blocked(start: &Path, json: bool) -> CmdResult {
    let (_, state) = read_state(start)?;
    let blocked = deps::blocked_tasks(&state);

    if json {
        println!("{}", serde_json::to_string_pretty(&blocked)?);
    } else {
        for b in &blocked {
            println!(
                "[{}] {} {} (blocked by: {})",
                b.section,
                b.task_id,
                b.title,
                b.blockers.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_check(start: &Path, json: bool) -> CmdResult {
    // Raw stored state: densifying first would hide the gaps being checked.
    let workspace = config_io::load_workspace(start)?;
    let state = workspace.store().fetch_all()?;
    let result = check::check_snapshot(&state);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            match err {
                check::CheckError::NonDense {
                    kind,
                    container_id,
                    indices,
                } => {
                    let list: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
                    println!(
                        "  {} {} has non-dense {} indices: {}",
                        kind.container_name(),
                        container_id,
                        kind,
                        list.join(", ")
                    );
                }
                check::CheckError::DanglingParent {
                    kind,
                    id,
                    parent_id,
                } => {
                    println!(
                        "  {} {} points at missing {} {}",
                        kind,
                        id,
                        kind.container_name(),
                        parent_id
                    );
                }
                check::CheckError::DanglingDep {
                    task_id,
                    depends_on,
                } => {
                    println!("  {} has dangling dep: {}", task_id, depends_on);
                }
                check::CheckError::SelfDep { task_id } => {
                    println!("  {} depends on itself", task_id);
                }
                check::CheckError::DepCycle { task_ids } => {
                    println!("  dependency cycle among: {}", task_ids.join(", "));
                }
                check::CheckError::DuplicateId { kind, id } => {
                    println!("  duplicate {} id: {}", kind, id);
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                check::CheckWarning::CompletedWhileBlocked { task_id, blockers } => {
                    println!(
                        "  {} is completed but blocked by: {}",
                        task_id,
                        blockers.join(", ")
                    );
                }
                check::CheckWarning::CompletedWithOpenSubtasks { task_id } => {
                    println!("  {} is completed with open subtasks", task_id);
                }
                check::CheckWarning::EmptyBoard { board_id } => {
                    println!("  board {} has no columns", board_id);
                }
            }
        }
    }
    if result.valid {
        println!("✓ store is valid");
    } else {
        println!("✗ store has errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(start: &Path, args: AddCmd) -> CmdResult {
    let (workspace, mut session) = open_session(start)?;

    let id = match args.what {
        AddWhat::Item { column, title } => session.edit(|st| {
            let item = crud::add_item(st, &column, &title)?;
            Ok((item.id.clone(), vec![Row::Item(item)]))
        })?,
        AddWhat::Column { title, board } => {
            let board_id = resolve_board(&workspace, session.state(), board)?;
            session.edit(|st| {
                let column = crud::add_column(st, &board_id, &title)?;
                Ok((column.id.clone(), vec![Row::Column(column)]))
            })?
        }
        AddWhat::Section { project, title } => session.edit(|st| {
            let section = crud::add_section(st, &project, &title)?;
            Ok((section.id.clone(), vec![Row::Section(section)]))
        })?,
        AddWhat::Task { section, title } => session.edit(|st| {
            let task = crud::add_task(st, &section, &title)?;
            Ok((task.id.clone(), vec![Row::Task(task)]))
        })?,
        AddWhat::Subtask { task, title } => session.edit(|st| {
            let parent = crud::add_subtask(st, &task, &title)?;
            let sub_id = parent
                .subtasks
                .last()
                .map(|s| s.id.clone())
                .unwrap_or_default();
            Ok((sub_id, vec![Row::Task(parent)]))
        })?,
    };

    println!("{}", id);
    Ok(())
}

fn cmd_drop(start: &Path, args: DropArgs) -> CmdResult {
    let kind = DragKind::parse(&args.kind).ok_or_else(|| {
        format!(
            "unknown kind '{}' (expected: item, column, task, section)",
            args.kind
        )
    })?;
    let (_, mut session) = open_session(start)?;
    let source = drag::locate(session.state(), kind, &args.id)
        .ok_or_else(|| format!("{} not found: {}", kind.entity_kind(), args.id))?;

    let event = DropEvent::new(kind, args.id.as_str(), source.clone());
    let event = match (args.to.as_deref(), args.at) {
        (Some("trash"), _) => event.to_trash(),
        (to, at) if to.is_some() || at.is_some() => {
            let container = match to {
                Some(c) if !kind.is_flat() => c.to_string(),
                _ => source.container_id.clone(),
            };
            let index = at.unwrap_or_else(|| {
                let n = member_count(session.state(), kind, &container);
                if container == source.container_id {
                    n.saturating_sub(1)
                } else {
                    n
                }
            });
            event.to(container, index)
        }
        _ => event,
    };

    match session.handle_drop(&event)? {
        DropResult::Ignored => println!("nothing to do"),
        DropResult::Committed => {
            let slot = drag::locate(session.state(), kind, &args.id)
                .ok_or_else(|| format!("{} not found: {}", kind.entity_kind(), args.id))?;
            println!("{} -> {} [{}]", args.id, slot.container_id, slot.index);
        }
        DropResult::AwaitingConfirmation { kind, id } => {
            if !args.yes {
                session.cancel_delete();
                return Err(format!("refusing to delete {} {} without --yes", kind, id).into());
            }
            session.confirm_delete()?;
            println!("deleted {} {}", kind, id);
        }
    }
    Ok(())
}

fn cmd_dep(start: &Path, args: DepCmd) -> CmdResult {
    let (_, mut session) = open_session(start)?;
    match args.action {
        DepAction::Add { task, depends_on } => {
            session.edit(|st| {
                let edge = deps::add_dependency(st, &task, &depends_on)?;
                Ok(((), vec![Row::Dependency(edge)]))
            })?;
            println!("{} dep add {}", task, depends_on);
        }
        DepAction::Rm { task, depends_on } => {
            session.remove_dependency(&task, &depends_on)?;
            println!("{} dep rm {}", task, depends_on);
        }
    }
    Ok(())
}

fn cmd_status(start: &Path, args: StatusArgs) -> CmdResult {
    let status = TaskStatus::parse(&args.status).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected: not-started, on-track, at-risk, off-track, completed)",
            args.status
        )
    })?;
    let (_, mut session) = open_session(start)?;
    let task = session.edit(|st| {
        let task = deps::set_status(st, &args.task, status)?;
        Ok((task.clone(), vec![Row::Task(task)]))
    })?;
    println!("{} {}", task.id, task.status);
    Ok(())
}

fn cmd_subtask(start: &Path, args: SubtaskArgs) -> CmdResult {
    let (_, mut session) = open_session(start)?;
    let task = session.edit(|st| {
        let task = crud::toggle_subtask(st, &args.task, &args.subtask)?;
        Ok((task.clone(), vec![Row::Task(task)]))
    })?;
    if let Some(sub) = task.subtasks.iter().find(|s| s.id == args.subtask) {
        let mark = if sub.completed { 'x' } else { ' ' };
        println!("[{}] {} {}", mark, sub.id, sub.title);
    }
    Ok(())
}
