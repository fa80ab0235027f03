//! The `easyqc rate` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table as Console};

use easyqc_core::session::ListingRow;
use easyqc_core::{ModuleDefinition, Project, RatingSession};
use easyqc_table::{select_filter, Table};

/// Who rates what.
#[derive(Debug, Clone)]
pub struct RateTarget {
    pub project: String,
    pub module: String,
    pub rater: String,
    pub ezqcid: String,
}

/// Edits requested on the command line.
#[derive(Debug, Clone, Default)]
pub struct RateEdits {
    pub scores: Vec<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub observe: bool,
}

impl RateEdits {
    fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.tags.is_empty() && self.notes.is_none()
    }
}

pub fn execute(
    config_path: Option<PathBuf>,
    target: RateTarget,
    edits: RateEdits,
    list: bool,
) -> Result<()> {
    let (config, project) = super::open_project(config_path, &target.project)?;
    let rater = config.rater(&target.rater)?;
    let module = project.settings.qcmodule.by_name(&target.module)?;

    let covariates = load_covariates(&project, module)?;
    let subjects = match &covariates {
        Some(table) if !table.subject_ids().is_empty() => table.subject_ids(),
        _ => {
            tracing::info!("no covariate subjects, rating '{}' on its own", target.ezqcid);
            vec![target.ezqcid.clone()]
        }
    };

    let mut session = RatingSession::open(
        project.store(),
        module,
        &rater,
        subjects,
        &target.ezqcid,
    )?;
    if edits.observe {
        session.set_observe_only(true);
    }

    if !edits.is_empty() {
        for raw in &edits.scores {
            let (key, value) = parse_assignment(raw)?;
            let value = Some(value).filter(|v| !v.is_empty() && *v != "null");
            session.set_score(key, value)?;
        }
        for raw in &edits.tags {
            let (key, value) = parse_assignment(raw)?;
            session.set_tag(key, parse_bool(value)?)?;
        }
        if let Some(notes) = edits.notes {
            session.set_notes(Some(notes));
        }

        let vars = template_vars(&project, covariates.as_ref(), &target.ezqcid);
        session.prepare_command(&vars);

        match session.save()? {
            Some(path) => println!("Saved {}", path.display()),
            None => println!("Observe-only session: rating not saved."),
        }
    } else if session.is_observe_only() {
        println!("Observe-only session.");
    }

    print_record(&session);
    if list {
        print_listing(&session.listing());
    }
    Ok(())
}

/// The covariate table after the project's and the module's subject filters.
fn load_covariates(project: &Project, module: &ModuleDefinition) -> Result<Option<Table>> {
    let path = project.covariate_path();
    if !path.exists() {
        return Ok(None);
    }
    let mut table = Table::read_csv(&path)?;
    for filter in [&project.settings.var_select_filter, &module.select_filter] {
        if let Some(q) = filter.as_deref().filter(|q| !q.trim().is_empty()) {
            table = select_filter(&table, q);
        }
    }
    Ok(Some(table))
}

/// The subject's covariate row with project constants layered on top.
fn template_vars(project: &Project, covariates: Option<&Table>, subject: &str) -> BTreeMap<String, String> {
    let mut vars = covariates
        .and_then(|t| t.find_subject(subject).map(|row| t.row_strings(row)))
        .unwrap_or_default();
    vars.extend(project.settings.constants.clone());
    vars
}

/// Split `KEY=VALUE` where KEY is a 1-based index.
fn parse_assignment(raw: &str) -> Result<(usize, &str)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid key '{key}' in '{raw}'"))?;
    Ok((key, value.trim()))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("expected true or false, got '{other}'"),
    }
}

fn print_record(session: &RatingSession) {
    let module = session.module();
    let mut table = Console::new();
    table.set_header(vec!["Field", "Label", "Value"]);
    table.add_row(vec![Cell::new("module"), Cell::new(&module.label), Cell::new(&module.name)]);
    table.add_row(vec![Cell::new("rater"), Cell::new(""), Cell::new(session.rater())]);
    table.add_row(vec![Cell::new("ezqcid"), Cell::new(""), Cell::new(session.subject())]);
    for (k, score) in module.scores.iter() {
        table.add_row(vec![
            Cell::new(format!("score{k}")),
            Cell::new(score.label.as_deref().unwrap_or_default()),
            Cell::new(score.value.as_deref().unwrap_or_default()),
        ]);
    }
    for (k, tag) in module.tags.iter() {
        table.add_row(vec![
            Cell::new(format!("tag{k}")),
            Cell::new(tag.label.as_deref().unwrap_or_default()),
            Cell::new(tag.value.map(bool_text).unwrap_or_default()),
        ]);
    }
    table.add_row(vec![
        Cell::new("notes"),
        Cell::new(""),
        Cell::new(module.notes.as_deref().unwrap_or_default()),
    ]);
    table.add_row(vec![
        Cell::new("time"),
        Cell::new(""),
        Cell::new(module.time.as_deref().unwrap_or_default()),
    ]);
    println!("{table}");
}

fn print_listing(rows: &[ListingRow]) {
    let mut table = Console::new();
    table.set_header(vec!["#", "ezqcid", "score1", "tag1"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.index),
            Cell::new(&row.subject),
            Cell::new(row.score1.as_deref().unwrap_or_default()),
            Cell::new(row.tag1.map(bool_text).unwrap_or_default()),
        ]);
    }
    println!("{table}");
}

fn bool_text(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}
