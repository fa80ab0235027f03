//! The `easyqc covariates` command.

use std::path::PathBuf;

use anyhow::Result;

use easyqc_table::table::{
    list_subdirectories, read_list, with_batch, with_id_column, words_table, ID_COLUMN,
};

pub fn execute(
    config_path: Option<PathBuf>,
    project: String,
    source: Option<PathBuf>,
    ids: Option<String>,
    id_var: Option<String>,
    batch: Option<String>,
) -> Result<()> {
    let (_, project) = super::open_project(config_path, &project)?;

    let table = match (source, ids) {
        (Some(path), _) if path.is_dir() => list_subdirectories(&path)?,
        (Some(path), _) => read_list(&path)?,
        (None, Some(text)) => words_table(&text),
        (None, None) => anyhow::bail!("give a source file, a directory, or --ids"),
    };

    let table = if table.has_column(ID_COLUMN) {
        table
    } else {
        let var = match id_var {
            Some(var) => var,
            None => match table.columns().first() {
                Some(first) => first.clone(),
                None => anyhow::bail!("covariate source has no columns"),
            },
        };
        with_id_column(table, &var)?
    };
    let table = match batch {
        Some(b) => with_batch(table, &b),
        None => table,
    };

    let path = project.covariate_path();
    table.write_csv(&path)?;
    println!(
        "Wrote {} subject(s) to {}",
        table.subject_ids().len(),
        path.display()
    );
    Ok(())
}
