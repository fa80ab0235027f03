//! The project's ordered list of rating modules.
//!
//! Wraps an [`OrdinalRegistry`] of [`ModuleDefinition`]s with the name and
//! minimum-size rules the registry primitive does not know about, plus
//! export/import of single module files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, RegistryError};
use crate::model::{validate_module_name, ModuleDefinition, ScoreDef, TagDef};
use crate::registry::OrdinalRegistry;

/// Ordered, uniquely-named rating modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleRegistry {
    modules: OrdinalRegistry<ModuleDefinition>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding a single `example` module, as new projects get.
    pub fn with_example() -> Self {
        let mut registry = Self::new();
        if let Ok(module) = ModuleDefinition::new("example", "Example") {
            registry.modules.push(module);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModuleDefinition> {
        self.modules.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ModuleDefinition> {
        self.modules.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ModuleDefinition)> {
        self.modules.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.values().map(|m| m.name.as_str()).collect()
    }

    /// Index of the module called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.modules.position(|m| m.name == name)
    }

    pub fn by_name(&self, name: &str) -> Result<&ModuleDefinition, ModuleError> {
        self.find(name)
            .and_then(|i| self.modules.get(i))
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Result<&mut ModuleDefinition, ModuleError> {
        let index = self
            .find(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        self.modules
            .get_mut(index)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    /// Create a module at `index`, shifting later modules down.
    pub fn add_module(&mut self, index: usize, name: &str, label: &str) -> Result<(), ModuleError> {
        if self.find(name).is_some() {
            return Err(ModuleError::DuplicateName(name.to_string()));
        }
        let module = ModuleDefinition::new(name, label)?;
        self.insert(index, module)
    }

    /// Insert an existing definition at `index`.
    pub fn insert(&mut self, index: usize, module: ModuleDefinition) -> Result<(), ModuleError> {
        validate_module_name(&module.name)?;
        if self.find(&module.name).is_some() {
            return Err(ModuleError::DuplicateName(module.name));
        }
        let name = module.name.clone();
        self.modules.insert(index, module)?;
        tracing::info!("added module '{}' at index {}", name, index);
        Ok(())
    }

    /// Remove the module at `index`. The last module cannot be removed.
    pub fn remove_module(&mut self, index: usize) -> Result<ModuleDefinition, ModuleError> {
        if self.modules.len() <= 1 {
            return Err(RegistryError::WouldEmpty.into());
        }
        let removed = self.modules.remove(index).ok_or(RegistryError::IndexOutOfRange {
            index,
            max: self.modules.len(),
        })?;
        tracing::info!("removed module '{}' from index {}", removed.name, index);
        Ok(removed)
    }

    /// Rename/relabel the module at `index` and move it to `new_index`.
    ///
    /// Works on a copy and swaps it in only when every step succeeds.
    pub fn modify_module(
        &mut self,
        index: usize,
        new_name: &str,
        new_label: &str,
        new_index: usize,
    ) -> Result<(), ModuleError> {
        validate_module_name(new_name)?;
        if let Some(existing) = self.find(new_name) {
            if existing != index {
                return Err(ModuleError::DuplicateName(new_name.to_string()));
            }
        }
        let mut next = self.modules.clone();
        let mut module = next.remove(index).ok_or(RegistryError::IndexOutOfRange {
            index,
            max: self.modules.len(),
        })?;
        module.name = new_name.to_string();
        module.label = new_label.to_string();
        let at = new_index.clamp(1, next.len() + 1);
        next.insert(at, module)?;
        self.modules = next;
        Ok(())
    }

    /// Insert a score definition into module `module` at `index`.
    pub fn add_score(&mut self, module: &str, index: usize, score: ScoreDef) -> Result<(), ModuleError> {
        self.by_name_mut(module)?.scores.insert(index, score)?;
        Ok(())
    }

    pub fn remove_score(&mut self, module: &str, index: usize) -> Result<Option<ScoreDef>, ModuleError> {
        Ok(self.by_name_mut(module)?.scores.remove(index))
    }

    pub fn add_tag(&mut self, module: &str, index: usize, tag: TagDef) -> Result<(), ModuleError> {
        self.by_name_mut(module)?.tags.insert(index, tag)?;
        Ok(())
    }

    pub fn remove_tag(&mut self, module: &str, index: usize) -> Result<Option<TagDef>, ModuleError> {
        Ok(self.by_name_mut(module)?.tags.remove(index))
    }

    /// Write one module as pretty JSON.
    pub fn export_module(&self, name: &str, path: &Path) -> Result<()> {
        let module = self.by_name(name)?;
        let json = serde_json::to_string_pretty(module).context("failed to serialize module")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write module to {}", path.display()))?;
        tracing::info!("exported module '{}' to {}", name, path.display());
        Ok(())
    }

    /// Validate and append a module from an export file. Returns its index.
    pub fn import_module(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read module file: {}", path.display()))?;
        let module = parse_module_file(&content)?;
        let index = self.modules.len() + 1;
        self.insert(index, module)?;
        Ok(index)
    }
}

/// Parse a module export file, checking the required-field schema first.
pub fn parse_module_file(content: &str) -> Result<ModuleDefinition, ModuleError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ModuleError::InvalidModuleFile(format!("not valid JSON: {e}")))?;
    check_module_schema(&value)?;
    serde_json::from_value(value).map_err(|e| ModuleError::InvalidModuleFile(e.to_string()))
}

/// Required fields `{name, label, interpreter, code, tags, scores}`.
pub fn check_module_schema(value: &serde_json::Value) -> Result<(), ModuleError> {
    let invalid = |msg: String| Err(ModuleError::InvalidModuleFile(msg));
    let Some(obj) = value.as_object() else {
        return invalid("module file must contain a JSON object".into());
    };

    let interpreter_key = if obj.contains_key("interpreter") {
        "interpreter"
    } else {
        "interper"
    };
    for field in ["name", "label", interpreter_key, "code", "tags", "scores"] {
        if !obj.contains_key(field) {
            return invalid(format!("missing field: {field}"));
        }
    }

    for field in ["name", "label", interpreter_key] {
        let ok = obj[field].as_str().is_some_and(|s| !s.trim().is_empty());
        if !ok {
            return invalid(format!("{field} must be a non-empty string"));
        }
    }

    for field in ["tags", "scores"] {
        if !obj[field].is_object() {
            return invalid(format!("{field} must be an object"));
        }
    }
    Ok(())
}
