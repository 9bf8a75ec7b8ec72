use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cbx", about = concat!("cardbox v", env!("CARGO_PKG_VERSION"), " - boards and projects you can drag around"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create cardbox.toml and a seeded store in the current directory
    Init(InitArgs),
    /// Show a board's columns and items
    Show(ShowArgs),
    /// Show a project's sections and tasks
    Tasks(TasksArgs),
    /// Show blocked tasks and their blockers
    Blocked,
    /// Validate store integrity
    Check,
    /// Create an item, column, section, task, or subtask
    Add(AddCmd),
    /// Drag an entity to a new position, another container, or the trash
    Drop(DropArgs),
    /// Add or remove task dependencies
    Dep(DepCmd),
    /// Change a task's status
    Status(StatusArgs),
    /// Check off a subtask, or uncheck it if already done
    Subtask(SubtaskArgs),
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Board and project name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Overwrite an existing store
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Board id (default: [board] default_board)
    pub board: Option<String>,
}

#[derive(Args)]
pub struct TasksArgs {
    /// Project id (default: the only project, or [board] default_board)
    pub project: Option<String>,
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddCmd {
    #[command(subcommand)]
    pub what: AddWhat,
}

#[derive(Subcommand)]
pub enum AddWhat {
    /// Add an item to the bottom of a column
    Item {
        /// Column id
        column: String,
        /// Item title
        title: String,
    },
    /// Add a column to the right end of a board
    Column {
        /// Column title
        title: String,
        /// Board id (default: [board] default_board)
        #[arg(long)]
        board: Option<String>,
    },
    /// Add a section to the end of a project
    Section {
        /// Project id
        project: String,
        /// Section title
        title: String,
    },
    /// Add a task to the bottom of a section
    Task {
        /// Section id
        section: String,
        /// Task title
        title: String,
    },
    /// Add a subtask to a task
    Subtask {
        /// Task id
        task: String,
        /// Subtask title
        title: String,
    },
}

// ---------------------------------------------------------------------------
// Drop
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct DropArgs {
    /// What is being dragged: item, column, task, or section
    pub kind: String,
    /// Id of the dragged entity
    pub id: String,
    /// Destination container id, or "trash"
    #[arg(long)]
    pub to: Option<String>,
    /// Destination position (default: end of the destination)
    #[arg(long)]
    pub at: Option<usize>,
    /// Confirm a drop onto the trash
    #[arg(long, short = 'y')]
    pub yes: bool,
}

// ---------------------------------------------------------------------------
// Dependencies and status
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct DepCmd {
    #[command(subcommand)]
    pub action: DepAction,
}

#[derive(Subcommand)]
pub enum DepAction {
    /// Make TASK wait on DEPENDS_ON
    Add { task: String, depends_on: String },
    /// Remove the edge TASK -> DEPENDS_ON
    Rm { task: String, depends_on: String },
}

#[derive(Args)]
pub struct StatusArgs {
    /// Task id
    pub task: String,
    /// New status: not-started, on-track, at-risk, off-track, completed
    pub status: String,
}

#[derive(Args)]
pub struct SubtaskArgs {
    /// Parent task id
    pub task: String,
    /// Subtask id (e.g. T-001.1)
    pub subtask: String,
}
