pub mod aggregate;
pub mod covariates;
pub mod init;
pub mod module;
pub mod query;
pub mod rate;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table as Console};

use easyqc_core::Project;
use easyqc_table::Table;

use crate::config::{load_config_from, EasyqcConfig};

/// Load the config and open the project named `project`.
pub fn open_project(config_path: Option<PathBuf>, project: &str) -> Result<(EasyqcConfig, Project)> {
    let config = load_config_from(config_path.as_deref())?;
    let (name, root) = config.project(project)?;
    if !root.is_dir() {
        anyhow::bail!("project directory does not exist: {}", root.display());
    }
    let project = Project::open(&name, &root)?;
    Ok((config, project))
}

/// Render a table for the terminal. Nulls print as empty cells.
pub fn render_table(table: &Table) -> Console {
    let mut console = Console::new();
    console.set_header(table.columns().iter().map(Cell::new));
    for row in table.rows() {
        console.add_row(row.iter().map(|v| Cell::new(v.to_text())));
    }
    console
}

/// Print `table` with a row count, or a note when it has no rows.
pub fn print_table(table: &Table) {
    if table.is_empty() {
        println!("(no rows; columns: {})", table.columns().join(", "));
        return;
    }
    println!("{}", render_table(table));
    println!("{} row(s)", table.height());
}
