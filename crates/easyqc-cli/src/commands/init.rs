//! The `easyqc init` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use easyqc_core::model::validate_module_name;
use easyqc_core::Project;

use crate::config::{config_location, load_config_from, save_config};

pub fn execute(config_path: Option<PathBuf>, name: String, dir: PathBuf) -> Result<()> {
    // Project names end up in file names, so hold them to the module rules.
    validate_module_name(&name).with_context(|| format!("invalid project name '{name}'"))?;

    let project = Project::create(&name, &dir)?;
    let root = std::fs::canonicalize(&project.root)
        .with_context(|| format!("failed to resolve {}", project.root.display()))?;
    println!("Created project '{}' in {}", name, root.display());

    let location = config_location(config_path.as_deref());
    let mut config = load_config_from(Some(&location))?;
    if let Some(previous) = config.projects.get(&name) {
        println!("Replacing registered path {previous} for '{name}'");
    }
    config
        .projects
        .insert(name.clone(), root.to_string_lossy().into_owned());
    if config.default_project.is_none() {
        config.default_project = Some(name.clone());
    }
    save_config(&config, &location)?;
    println!("Registered '{}' in {}", name, location.display());

    println!("\nNext steps:");
    println!("  1. Add a module: easyqc module add {name} <module> <Label> --score Quality=1-5 --tag Artifact");
    println!("  2. Load subjects: easyqc covariates {name} <subjects.csv>");
    println!("  3. Rate: easyqc rate {name} <module> <rater> <ezqcid> --score 1=3");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_registers_project() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("easyqc.toml");
        execute(Some(cfg.clone()), "study1".into(), dir.path().join("study1")).unwrap();

        assert!(dir.path().join("study1").join("settings_study1.json").exists());
        let config = load_config_from(Some(&cfg)).unwrap();
        assert!(config.projects.contains_key("study1"));
        assert_eq!(config.default_project.as_deref(), Some("study1"));
    }

    #[test]
    fn init_rejects_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("easyqc.toml");
        assert!(execute(Some(cfg), "bad name".into(), dir.path().join("x")).is_err());
        assert!(!dir.path().join("x").exists());
    }
}
