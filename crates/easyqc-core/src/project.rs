//! Per-project settings document and on-disk layout.
//!
//! A project directory holds `settings_{project}.json`, the covariate table
//! under `Table/`, and the rating files under `RatingFiles/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::modules::ModuleRegistry;
use crate::store::{RatingFileStore, RATING_DIR};

/// Directory holding the covariate table and cached snapshots.
pub const TABLE_DIR: &str = "Table";

/// File name of the covariate table inside [`TABLE_DIR`].
pub const COVARIATE_FILE: &str = "ezqc_all.csv";

/// The project settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Values substituted into viewer templates; they win over covariates.
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Filter applied to the covariate table before listing subjects.
    #[serde(default)]
    pub var_select_filter: Option<String>,
    #[serde(default)]
    pub select_filter: Option<String>,
    #[serde(default)]
    pub qcmodule: ModuleRegistry,
}

impl ProjectSettings {
    /// Settings for a new project: no constants and a single `example`
    /// module.
    pub fn new() -> Self {
        Self {
            qcmodule: ModuleRegistry::with_example(),
            ..Self::default()
        }
    }

    /// Parse a settings document from JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(content).context("failed to parse settings JSON")?;
        Ok(settings)
    }
}

/// A project: its name, root directory and settings.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub root: PathBuf,
    pub settings: ProjectSettings,
}

impl Project {
    /// Path of `settings_{name}.json` inside `root`.
    pub fn settings_path(root: &Path, name: &str) -> PathBuf {
        root.join(format!("settings_{name}.json"))
    }

    /// Load a project's settings, creating and saving fresh settings when the
    /// file does not exist yet.
    pub fn open(name: &str, root: &Path) -> Result<Self> {
        let path = Self::settings_path(root, name);
        let settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let settings = ProjectSettings::from_json(&content)
                .with_context(|| format!("invalid settings file: {}", path.display()))?;
            tracing::debug!("loaded settings for project '{}'", name);
            settings
        } else {
            tracing::warn!(
                "settings file {} does not exist, creating a new one",
                path.display()
            );
            let project = Self {
                name: name.to_string(),
                root: root.to_path_buf(),
                settings: ProjectSettings::new(),
            };
            project.save()?;
            return Ok(project);
        };
        Ok(Self {
            name: name.to_string(),
            root: root.to_path_buf(),
            settings,
        })
    }

    /// Create a project directory with fresh settings. An existing project
    /// in `root` is opened instead.
    pub fn create(name: &str, root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("failed to create project dir: {}", root.display()))?;
        if Self::settings_path(root, name).exists() {
            tracing::warn!("project '{}' already exists, opening it", name);
        }
        Self::open(name, root)
    }

    /// Write the settings document as pretty JSON.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create project dir: {}", self.root.display()))?;
        let path = Self::settings_path(&self.root, &self.name);
        let json =
            serde_json::to_string_pretty(&self.settings).context("failed to serialize settings")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
        tracing::debug!("saved settings to {}", path.display());
        Ok(())
    }

    pub fn table_dir(&self) -> PathBuf {
        self.root.join(TABLE_DIR)
    }

    pub fn covariate_path(&self) -> PathBuf {
        self.table_dir().join(COVARIATE_FILE)
    }

    pub fn rating_root(&self) -> PathBuf {
        self.root.join(RATING_DIR)
    }

    pub fn store(&self) -> RatingFileStore {
        RatingFileStore::for_project(&self.root)
    }
}
