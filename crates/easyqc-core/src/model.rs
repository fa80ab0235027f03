//! Core data model types for easyqc.
//!
//! A [`ModuleDefinition`] is a named rating form: its score and tag
//! definitions, the viewer command template, and the rater it is assigned
//! to. A [`RatingRecord`] is the snapshot of one module's live state saved
//! for one `(module, subject, rater)` triple.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ModuleError;
use crate::registry::OrdinalRegistry;

/// Viewer commands keyed by sub-command index (index 0 for a single command).
pub type CodeExe = BTreeMap<usize, String>;

/// One score definition inside a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDef {
    #[serde(default)]
    pub label: Option<String>,
    /// Raw domain as typed by the user, e.g. `"0-3"`.
    #[serde(default)]
    pub num: Option<String>,
    /// Expanded comma list, e.g. `"0,1,2,3"`.
    #[serde(default, rename = "num_")]
    pub domain: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub value: Option<String>,
}

impl ScoreDef {
    /// A labelled score with its domain expanded from `raw`.
    pub fn new(label: &str, raw: &str) -> Result<Self, ModuleError> {
        Ok(Self {
            label: Some(label.to_string()),
            num: Some(raw.to_string()),
            domain: parse_score_domain(raw)?,
            value: None,
        })
    }

    /// Members of the expanded domain, in order.
    pub fn domain_values(&self) -> Vec<&str> {
        self.domain
            .as_deref()
            .map(|d| d.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        has_text(&self.label) && has_text(&self.domain)
    }
}

/// One boolean tag definition inside a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDef {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<bool>,
}

impl TagDef {
    pub fn new(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            value: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        has_text(&self.label)
    }
}

/// A named rating form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub rater: Option<String>,
    #[serde(default)]
    pub scores: OrdinalRegistry<ScoreDef>,
    #[serde(default)]
    pub tags: OrdinalRegistry<TagDef>,
    #[serde(default = "default_interpreter", alias = "interper")]
    pub interpreter: String,
    /// Viewer command template.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_exe: Option<CodeExe>,
    /// Filter query that selects the subjects this module rates.
    #[serde(default)]
    pub select_filter: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub ezqcid: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub control: bool,
}

fn default_interpreter() -> String {
    "shell".to_string()
}

impl ModuleDefinition {
    /// A new module with one empty score and one empty tag.
    pub fn new(name: &str, label: &str) -> Result<Self, ModuleError> {
        validate_module_name(name)?;
        Ok(Self {
            name: name.to_string(),
            label: label.to_string(),
            rater: None,
            scores: OrdinalRegistry::from(vec![ScoreDef::default()]),
            tags: OrdinalRegistry::from(vec![TagDef::default()]),
            interpreter: default_interpreter(),
            code: None,
            code_exe: None,
            select_filter: None,
            ezqcid: None,
            time: None,
            notes: None,
            control: false,
        })
    }

    /// Check that the module can be rated: a rater is set and every score and
    /// tag is fully configured.
    pub fn check_ready(&self) -> Result<(), ModuleError> {
        if !has_text(&self.rater) {
            return Err(ModuleError::MissingRater(self.name.clone()));
        }
        if let Some((key, _)) = self.scores.iter().find(|(_, s)| !s.is_complete()) {
            return Err(ModuleError::IncompleteScore {
                module: self.name.clone(),
                key,
            });
        }
        if let Some((key, _)) = self.tags.iter().find(|(_, t)| !t.is_complete()) {
            return Err(ModuleError::IncompleteTag {
                module: self.name.clone(),
                key,
            });
        }
        Ok(())
    }

    /// Snapshot the live state for `subject` with every value cleared.
    pub fn fresh_record(&self, subject: &str) -> RatingRecord {
        let mut record = self.snapshot();
        for (_, score) in record.scores.iter_mut() {
            score.value = None;
        }
        for (_, tag) in record.tags.iter_mut() {
            tag.value = Some(false);
        }
        record.ezqcid = Some(subject.to_string());
        record.code_exe = None;
        record.time = None;
        record.notes = None;
        record
    }

    /// Snapshot the current live state as a rating record.
    pub fn snapshot(&self) -> RatingRecord {
        RatingRecord {
            name: self.name.clone(),
            label: Some(self.label.clone()),
            rater: self.rater.clone(),
            ezqcid: self.ezqcid.clone(),
            scores: self.scores.clone(),
            tags: self.tags.clone(),
            code: self.code.clone(),
            code_exe: self.code_exe.clone(),
            notes: self.notes.clone(),
            time: self.time.clone(),
            control: self.control,
        }
    }

    /// Replace the mutable rating fields with a stored record.
    ///
    /// `code`, `select_filter` and `interpreter` are execution configuration
    /// and always keep their live values.
    pub fn apply_record(&mut self, record: RatingRecord) {
        if let Some(label) = record.label {
            self.label = label;
        }
        self.rater = record.rater;
        self.ezqcid = record.ezqcid;
        self.scores = record.scores;
        self.tags = record.tags;
        self.code_exe = record.code_exe;
        self.notes = record.notes;
        self.time = record.time;
        self.control = record.control;
    }
}

/// A saved rating: one module's state for one subject and one rater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub rater: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub ezqcid: Option<String>,
    #[serde(default)]
    pub scores: OrdinalRegistry<ScoreDef>,
    #[serde(default)]
    pub tags: OrdinalRegistry<TagDef>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_exe: Option<CodeExe>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub control: bool,
}

impl RatingRecord {
    /// Value of score 1, the first column of every listing.
    pub fn score1(&self) -> Option<&str> {
        self.scores.get(1).and_then(|s| s.value.as_deref())
    }

    /// Value of tag 1.
    pub fn tag1(&self) -> Option<bool> {
        self.tags.get(1).and_then(|t| t.value)
    }

    /// Scores that differ in domain between `self` (stored) and `live`, plus
    /// tags whose labels differ. Empty when the record is compatible.
    pub fn schema_drift(&self, live: &ModuleDefinition) -> Vec<String> {
        let mut drift = Vec::new();
        for (key, score) in live.scores.iter() {
            match self.scores.get(key) {
                Some(stored) if stored.domain == score.domain => {}
                Some(stored) => drift.push(format!(
                    "score {key}: stored domain {:?} != live domain {:?}",
                    stored.domain, score.domain
                )),
                None => drift.push(format!("score {key}: missing from stored rating")),
            }
        }
        for (key, tag) in live.tags.iter() {
            match self.tags.get(key) {
                Some(stored) if stored.label == tag.label => {}
                Some(stored) => drift.push(format!(
                    "tag {key}: stored label {:?} != live label {:?}",
                    stored.label, tag.label
                )),
                None => drift.push(format!("tag {key}: missing from stored rating")),
            }
        }
        drift
    }
}

/// Module names are identifiers: `^[a-zA-Z_][a-zA-Z0-9_]*$`.
pub fn validate_module_name(name: &str) -> Result<(), ModuleError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ModuleError::InvalidName(name.to_string()))
    }
}

/// Expand a raw score domain into its comma list.
///
/// - `"Poor,Fair,Good"` categorical labels (must be unique)
/// - `"0-3"` inclusive integer range
/// - `"4"` shorthand for `1..=4`
///
/// An empty string means "no domain yet".
pub fn parse_score_domain(raw: &str) -> Result<Option<String>, ModuleError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let invalid = |reason: &str| ModuleError::InvalidDomain {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    if value.contains(',') {
        let mut labels: Vec<&str> = value.split(',').map(str::trim).collect();
        if labels.last().is_some_and(|l| l.is_empty()) {
            labels.pop();
        }
        let label_ok = |l: &&str| {
            !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
        };
        if labels.is_empty() || !labels.iter().all(label_ok) {
            return Err(invalid("labels may only contain letters, digits, '_' and spaces"));
        }
        let mut seen = std::collections::HashSet::new();
        if !labels.iter().all(|l| seen.insert(*l)) {
            return Err(invalid("duplicate labels"));
        }
        return Ok(Some(labels.join(",")));
    }

    if let Some((start, end)) = value.split_once('-') {
        let (start, end) = (start.trim(), end.trim());
        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(start) || !all_digits(end) {
            return Err(invalid("expected a range like 0-3"));
        }
        let start: u32 = start.parse().map_err(|_| invalid("range start too large"))?;
        let end: u32 = end.parse().map_err(|_| invalid("range end too large"))?;
        if start > end {
            return Err(invalid("range start is greater than range end"));
        }
        return Ok(Some(join_range(start, end)));
    }

    if value.chars().all(|c| c.is_ascii_digit()) {
        let max: u32 = value.parse().map_err(|_| invalid("value too large"))?;
        if max == 0 {
            return Err(invalid("value must be greater than 0"));
        }
        return Ok(Some(join_range(1, max)));
    }

    Err(invalid(
        "expected labels \"Poor,Fair,Good\", a range \"0-3\", or a count \"4\"",
    ))
}

fn join_range(start: u32, end: u32) -> String {
    (start..=end)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn has_text(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Accept strings, numbers, and booleans where a string is expected; subject
/// ids and score values are often numeric in hand-edited files.
fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
