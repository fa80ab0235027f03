//! The `easyqc aggregate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use easyqc_table::aggregate::{analysis_table, write_snapshots};
use easyqc_table::query::{query, QueryOutcome};
use easyqc_table::table::ID_COLUMN;
use easyqc_table::{JoinMode, ReindexWorker, Table};

pub async fn execute(
    config_path: Option<PathBuf>,
    project: String,
    join: Option<JoinMode>,
    query_text: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (config, project) = super::open_project(config_path, &project)?;

    let worker = ReindexWorker::new(project.rating_root());
    let snapshot = worker
        .refresh()
        .await
        .context("rating reindex did not complete")?;
    let aggregation = &snapshot.aggregation;
    write_snapshots(&project.root, &aggregation.long, &aggregation.wide)?;

    let covariate_path = project.covariate_path();
    let covariates = if covariate_path.exists() {
        Some(Table::read_csv(&covariate_path)?)
    } else {
        tracing::info!("no covariate table at {}", covariate_path.display());
        None
    };
    if let Some(cov) = covariates.as_ref().filter(|c| !c.has_column(ID_COLUMN)) {
        eprintln!(
            "Warning: {} has no '{}' column; covariates not joined.",
            covariate_path.display(),
            ID_COLUMN
        );
        tracing::debug!("covariate columns: {:?}", cov.columns());
    }
    let mode = join.unwrap_or(config.join);
    let mut table = analysis_table(&aggregation.wide, covariates.as_ref(), mode);

    let filter = query_text.or_else(|| project.settings.select_filter.clone());
    if let Some(q) = filter.filter(|q| !q.trim().is_empty()) {
        table = match query(&table, &q) {
            QueryOutcome::Applied(t) => t,
            QueryOutcome::Fallback { table, reason } => {
                eprintln!("Warning: query not applied ({reason}); showing unfiltered table.");
                table
            }
        };
    }

    println!(
        "Project {}: {} rating file(s), {} subject(s), join={}",
        project.name,
        aggregation.records.len(),
        aggregation.by_subject.len(),
        mode
    );
    super::print_table(&table);

    if let Some(path) = output {
        table.write_csv(&path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
