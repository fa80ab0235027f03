//! The `easyqc module` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};

use easyqc_core::{ModuleError, ModuleRegistry, Project, ScoreDef, TagDef};

#[derive(Subcommand)]
pub enum ModuleAction {
    /// List the project's modules
    List {
        /// Project name ("-" for default_project)
        project: String,
    },

    /// Add a module
    Add {
        /// Project name ("-" for default_project)
        project: String,

        /// Module name (letters, digits and underscores)
        name: String,

        /// Display label
        label: String,

        /// Position to insert at (default: append)
        #[arg(long)]
        index: Option<usize>,

        /// Score definition LABEL=DOMAIN, e.g. "Quality=1-5" or "Motion=None,Mild,Severe"
        #[arg(long = "score", value_name = "LABEL=DOMAIN")]
        scores: Vec<String>,

        /// Tag label
        #[arg(long = "tag", value_name = "LABEL")]
        tags: Vec<String>,

        /// Viewer command template
        #[arg(long)]
        code: Option<String>,

        /// Default rater
        #[arg(long)]
        rater: Option<String>,

        /// Subject filter query for this module
        #[arg(long)]
        select_filter: Option<String>,
    },

    /// Rename, relabel or move a module
    Modify {
        /// Project name ("-" for default_project)
        project: String,

        /// Current module name
        name: String,

        /// New name
        #[arg(long)]
        rename: Option<String>,

        /// New label
        #[arg(long)]
        label: Option<String>,

        /// New position
        #[arg(long)]
        index: Option<usize>,
    },

    /// Remove a module (the last one cannot be removed)
    Remove {
        /// Project name ("-" for default_project)
        project: String,

        /// Module name
        name: String,
    },

    /// Export a module to a JSON file
    Export {
        /// Project name ("-" for default_project)
        project: String,

        /// Module name
        name: String,

        /// Output path
        path: PathBuf,
    },

    /// Import a module from a JSON file
    Import {
        /// Project name ("-" for default_project)
        project: String,

        /// Module JSON path
        path: PathBuf,
    },
}

pub fn execute(config_path: Option<PathBuf>, action: ModuleAction) -> Result<()> {
    match action {
        ModuleAction::List { project } => {
            let (_, project) = super::open_project(config_path, &project)?;
            print_modules(&project.settings.qcmodule);
            Ok(())
        }
        ModuleAction::Add {
            project,
            name,
            label,
            index,
            scores,
            tags,
            code,
            rater,
            select_filter,
        } => {
            let (_, mut project) = super::open_project(config_path, &project)?;
            let mut registry = project.settings.qcmodule.clone();
            let at = index.unwrap_or(registry.len() + 1);
            registry.add_module(at, &name, &label)?;

            let module = registry.by_name_mut(&name)?;
            for (i, raw) in scores.iter().enumerate() {
                let score = parse_score(raw)?;
                if i == 0 {
                    replace_first(module.scores.get_mut(1), score);
                } else {
                    module.scores.push(score);
                }
            }
            for (i, label) in tags.iter().enumerate() {
                let tag = TagDef::new(label);
                if i == 0 {
                    replace_first(module.tags.get_mut(1), tag);
                } else {
                    module.tags.push(tag);
                }
            }
            module.code = code;
            module.rater = rater;
            module.select_filter = select_filter;

            commit(&mut project, registry)?;
            println!("Added module '{name}' to project {}", project.name);
            Ok(())
        }
        ModuleAction::Modify {
            project,
            name,
            rename,
            label,
            index,
        } => {
            let (_, mut project) = super::open_project(config_path, &project)?;
            let mut registry = project.settings.qcmodule.clone();
            let current = registry
                .find(&name)
                .ok_or_else(|| ModuleError::NotFound(name.clone()))?;
            let new_label = match label {
                Some(l) => l,
                None => registry.by_name(&name)?.label.clone(),
            };
            let new_name = rename.unwrap_or_else(|| name.clone());
            registry.modify_module(current, &new_name, &new_label, index.unwrap_or(current))?;
            commit(&mut project, registry)?;
            println!("Updated module '{new_name}'");
            Ok(())
        }
        ModuleAction::Remove { project, name } => {
            let (_, mut project) = super::open_project(config_path, &project)?;
            let mut registry = project.settings.qcmodule.clone();
            let index = registry
                .find(&name)
                .ok_or_else(|| ModuleError::NotFound(name.clone()))?;
            registry.remove_module(index)?;
            commit(&mut project, registry)?;
            println!("Removed module '{name}'");
            Ok(())
        }
        ModuleAction::Export {
            project,
            name,
            path,
        } => {
            let (_, project) = super::open_project(config_path, &project)?;
            project.settings.qcmodule.export_module(&name, &path)?;
            println!("Exported module '{name}' to {}", path.display());
            Ok(())
        }
        ModuleAction::Import { project, path } => {
            let (_, mut project) = super::open_project(config_path, &project)?;
            let mut registry = project.settings.qcmodule.clone();
            let index = registry.import_module(&path)?;
            commit(&mut project, registry)?;
            println!("Imported module at index {index}");
            Ok(())
        }
    }
}

/// Swap the edited registry into the project and save its settings.
fn commit(project: &mut Project, registry: ModuleRegistry) -> Result<()> {
    project.settings.qcmodule = registry;
    project.save()
}

fn replace_first<T>(slot: Option<&mut T>, value: T) {
    if let Some(slot) = slot {
        *slot = value;
    }
}

fn parse_score(raw: &str) -> Result<ScoreDef> {
    let (label, domain) = raw
        .split_once('=')
        .with_context(|| format!("expected LABEL=DOMAIN, got '{raw}'"))?;
    Ok(ScoreDef::new(label.trim(), domain.trim())?)
}

fn print_modules(registry: &ModuleRegistry) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Name", "Label", "Scores", "Tags", "Rater", "Ready"]);
    for (i, module) in registry.iter() {
        let scores: Vec<String> = module
            .scores
            .iter()
            .map(|(_, s)| {
                format!(
                    "{} [{}]",
                    s.label.as_deref().unwrap_or("?"),
                    s.domain.as_deref().unwrap_or_default()
                )
            })
            .collect();
        let tags: Vec<&str> = module
            .tags
            .iter()
            .map(|(_, t)| t.label.as_deref().unwrap_or("?"))
            .collect();
        let ready = match module.check_ready() {
            Ok(()) => "yes".to_string(),
            Err(ModuleError::MissingRater(_)) if module.rater.is_none() => "needs rater".to_string(),
            Err(e) => e.to_string(),
        };
        table.add_row(vec![
            Cell::new(i),
            Cell::new(&module.name),
            Cell::new(&module.label),
            Cell::new(scores.join(", ")),
            Cell::new(tags.join(", ")),
            Cell::new(module.rater.as_deref().unwrap_or_default()),
            Cell::new(ready),
        ]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_definitions() {
        let s = parse_score("Quality=1-3").unwrap();
        assert_eq!(s.domain.as_deref(), Some("1,2,3"));
        assert_eq!(s.label.as_deref(), Some("Quality"));
        assert!(parse_score("Quality").is_err());
        assert!(parse_score("Quality=3-1").is_err());
    }
}
