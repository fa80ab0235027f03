//! The `easyqc query` command.

use std::path::PathBuf;

use anyhow::Result;

use easyqc_table::query::{query, QueryOutcome};
use easyqc_table::table::read_list;

pub fn execute(input: PathBuf, sql: String, output: Option<PathBuf>) -> Result<()> {
    let table = read_list(&input)?;
    let result = match query(&table, &sql) {
        QueryOutcome::Applied(t) => t,
        QueryOutcome::Fallback { table, reason } => {
            eprintln!("Warning: query not applied ({reason}); showing unfiltered table.");
            table
        }
    };

    super::print_table(&result);
    if let Some(path) = output {
        result.write_csv(&path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
