//! The `easyqc validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use easyqc_core::modules::parse_module_file;

pub fn execute(path: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read module file: {}", path.display()))?;
    let module = parse_module_file(&content)
        .with_context(|| format!("invalid module file: {}", path.display()))?;

    println!(
        "Module: {} ({}) with {} score(s), {} tag(s)",
        module.name,
        module.label,
        module.scores.len(),
        module.tags.len()
    );

    let mut warnings = Vec::new();
    for (k, score) in module.scores.iter() {
        if !score.is_complete() {
            warnings.push(format!("score {k} needs a label and a domain"));
        }
    }
    for (k, tag) in module.tags.iter() {
        if !tag.is_complete() {
            warnings.push(format!("tag {k} needs a label"));
        }
    }
    for w in &warnings {
        println!("  WARNING: {w}");
    }

    if warnings.is_empty() {
        println!("Module file valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }
    Ok(())
}
