use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::{self, CONFIG_FILE};
use crate::model::{Board, Config, Project, Snapshot};
use crate::ops::{BoardError, crud};

/// Id shared by the seeded board and project
const DEFAULT_ID: &str = "main";

const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "Doing", "Done"];
const DEFAULT_SECTIONS: [&str; 2] = ["Backlog", "This Week"];

/// Infer a workspace name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Initial store contents: one board with default columns and one project
/// with default sections.
pub fn seed_snapshot(name: &str) -> Result<Snapshot, BoardError> {
    let mut state = Snapshot {
        boards: vec![Board {
            id: DEFAULT_ID.to_string(),
            name: name.to_string(),
        }],
        projects: vec![Project {
            id: DEFAULT_ID.to_string(),
            name: name.to_string(),
        }],
        ..Snapshot::default()
    };
    for title in DEFAULT_COLUMNS {
        crud::add_column(&mut state, DEFAULT_ID, title)?;
    }
    for title in DEFAULT_SECTIONS {
        crud::add_section(&mut state, DEFAULT_ID, title)?;
    }
    Ok(state)
}

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if dir.join(CONFIG_FILE).is_file() && !args.force {
        return Err(format!(
            "cardbox workspace already exists in {} (use --force to reinitialize)",
            dir.display()
        )
        .into());
    }

    // Check for an enclosing workspace and warn
    if let Some(parent) = dir.parent()
        && let Ok(parent_root) = config_io::discover(parent)
    {
        eprintln!("Note: enclosing workspace found at {}/", parent_root.display());
    }

    let name = args.name.unwrap_or_else(|| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .unwrap_or_else(|| "Untitled".to_string())
    });

    let mut config = Config::default();
    config.board.default_board = Some(DEFAULT_ID.to_string());
    config_io::write_config(dir, &config)?;

    let workspace = config_io::load_workspace(dir)?;
    workspace.store().create(&seed_snapshot(&name)?, args.force)?;

    println!("Initialized cardbox workspace: {}", name);
    println!("  board: {} [{}]", name, DEFAULT_ID);
    println!("  project: {} [{}]", name, DEFAULT_ID);
    Ok(())
}
