//! On-disk rating files.
//!
//! One JSON file per `(module, subject, rater)`:
//!
//! ```text
//! {root}/{module}/{rater}/{module}._.{subject}._.{rater}._.{score1}._.{tag1}.json
//! ```
//!
//! Lookups only use the `{module}._.{subject}._.{rater}` prefix. The trailing
//! `score1`/`tag1` fields are a cache for listings and are never parsed back;
//! the JSON body is authoritative.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::model::{ModuleDefinition, RatingRecord};

/// Reserved filename field separator.
pub const SEPARATOR: &str = "._.";

/// Directory under a project root that holds all rating files.
pub const RATING_DIR: &str = "RatingFiles";

/// Whether saves are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadWrite,
    /// Loaded data is shown but edits are not persisted.
    ObserveOnly,
}

/// The identity fields encoded in a rating filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingFileName {
    pub module: String,
    pub subject: String,
    pub rater: String,
}

impl RatingFileName {
    /// Parse the identity prefix of a rating filename (with or without the
    /// `.json` extension). Cached trailing fields are ignored.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
        let mut parts = stem.split(SEPARATOR);
        let module = parts.next()?;
        let subject = parts.next()?;
        let rater = parts.next()?;
        if module.is_empty() || rater.is_empty() {
            return None;
        }
        Some(Self {
            module: module.to_string(),
            subject: subject.to_string(),
            rater: rater.to_string(),
        })
    }

    /// `{module}._.{subject}._.{rater}`
    pub fn prefix(&self) -> String {
        prefix(&self.module, &self.subject, &self.rater)
    }
}

/// Result of looking up a rating by identity.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// No rating yet; the caller initialises a fresh record.
    Missing,
    /// Exactly one file matched.
    Loaded {
        record: RatingRecord,
        path: PathBuf,
        /// Non-empty when the stored schema no longer matches the live module.
        drift: Vec<String>,
    },
}

/// Reads and writes rating files below a `RatingFiles` root.
#[derive(Debug, Clone)]
pub struct RatingFileStore {
    root: PathBuf,
}

impl RatingFileStore {
    /// Store for the project at `project_root`.
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(RATING_DIR))
    }

    /// Store rooted directly at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{module}/{rater}`
    pub fn rater_dir(&self, module: &str, rater: &str) -> PathBuf {
        self.root.join(module).join(rater)
    }

    /// Paths of all files whose identity prefix is `(module, subject, rater)`.
    pub fn find(&self, module: &str, subject: &str, rater: &str) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.rater_dir(module, rater);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let exact = format!("{}.json", prefix(module, subject, rater));
        let head = format!("{}{SEPARATOR}", prefix(module, subject, rater));

        let mut matches = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(".json") && (name == exact || name.starts_with(&head)) {
                matches.push(entry.path());
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Load the rating for `(live.name, subject, rater)` and check it against
    /// the live module definition.
    pub fn load(
        &self,
        live: &ModuleDefinition,
        subject: &str,
        rater: &str,
    ) -> Result<LoadOutcome, StoreError> {
        let mut matches = self.find(&live.name, subject, rater)?;
        match matches.len() {
            0 => {
                tracing::debug!("no rating for {}/{}/{}", live.name, subject, rater);
                Ok(LoadOutcome::Missing)
            }
            1 => {
                let path = matches.remove(0);
                let record = read_record(&path)?;
                let drift = record.schema_drift(live);
                if !drift.is_empty() {
                    tracing::warn!(
                        "rating {} does not match module '{}' ({}); observe-only",
                        path.display(),
                        live.name,
                        drift.join("; ")
                    );
                }
                Ok(LoadOutcome::Loaded {
                    record,
                    path,
                    drift,
                })
            }
            count => {
                let err = StoreError::Ambiguous {
                    prefix: prefix(&live.name, subject, rater),
                    count,
                    dir: self.rater_dir(&live.name, rater),
                };
                tracing::error!("{}", err);
                Err(err)
            }
        }
    }

    /// Persist `record`, replacing any earlier file with the same identity.
    ///
    /// The new body is written to a temporary file in the target directory
    /// and renamed into place before stale files are removed. Returns the
    /// written path, or `None` when `access` is observe-only.
    pub fn save(&self, record: &RatingRecord, access: Access) -> Result<Option<PathBuf>, StoreError> {
        let rater = record
            .rater
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| StoreError::MissingRater(record.name.clone()))?;
        let subject = record
            .ezqcid
            .as_deref()
            .ok_or_else(|| StoreError::MissingSubject(record.name.clone()))?;
        let score1 = record.score1().unwrap_or_default();
        for field in [record.name.as_str(), subject, rater, score1] {
            if field.contains(SEPARATOR) {
                return Err(StoreError::ReservedSeparator(field.to_string()));
            }
            if field.contains(['/', '\\']) {
                return Err(StoreError::PathSeparator(field.to_string()));
            }
        }

        let dir = self.rater_dir(&record.name, rater);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        if access == Access::ObserveOnly {
            tracing::info!("observe-only session, not saving {}/{}", record.name, subject);
            return Ok(None);
        }

        let path = dir.join(rating_filename(record, subject, rater));
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        write_pretty(tmp.as_file_mut(), record).map_err(|e| StoreError::Json {
            path: path.clone(),
            source: e,
        })?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| StoreError::io(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;

        for stale in self.find(&record.name, subject, rater)? {
            if stale == path {
                continue;
            }
            match std::fs::remove_file(&stale) {
                Ok(()) => tracing::debug!("removed stale rating {}", stale.display()),
                Err(e) => tracing::warn!("failed to remove {}: {}", stale.display(), e),
            }
        }

        tracing::info!("saved rating {}", path.display());
        Ok(Some(path))
    }
}

/// Read one rating file.
pub fn read_record(path: &Path) -> Result<RatingRecord, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `{module}._.{subject}._.{rater}`
pub fn prefix(module: &str, subject: &str, rater: &str) -> String {
    format!("{module}{SEPARATOR}{subject}{SEPARATOR}{rater}")
}

/// Full filename for `record`, recomputed from its body.
///
/// Missing values render as `None` and booleans as `True`/`False` so files
/// written here sort and list alongside files from earlier releases.
pub fn rating_filename(record: &RatingRecord, subject: &str, rater: &str) -> String {
    let score1 = record.score1().unwrap_or("None");
    let tag1 = match record.tag1() {
        Some(true) => "True",
        Some(false) => "False",
        None => "None",
    };
    format!(
        "{}{SEPARATOR}{score1}{SEPARATOR}{tag1}.json",
        prefix(&record.name, subject, rater)
    )
}

fn write_pretty<W: Write>(writer: W, record: &RatingRecord) -> Result<(), serde_json::Error> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    record.serialize(&mut ser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScoreDef, TagDef};

    fn memory_module() -> ModuleDefinition {
        let mut m = ModuleDefinition::new("memory", "Memory").unwrap();
        m.rater = Some("alice".into());
        *m.scores.get_mut(1).unwrap() = ScoreDef::new("Quality", "1,2,3,4,5").unwrap();
        *m.tags.get_mut(1).unwrap() = TagDef::new("Artifact");
        m
    }

    fn rated(m: &ModuleDefinition, subject: &str, score: &str, tag: bool) -> RatingRecord {
        let mut r = m.fresh_record(subject);
        r.scores.get_mut(1).unwrap().value = Some(score.into());
        r.tags.get_mut(1).unwrap().value = Some(tag);
        r.notes = Some("ok".into());
        r.time = Some("2026-01-02 03:04:05".into());
        r
    }

    #[test]
    fn filename_contract() {
        let m = memory_module();
        let r = rated(&m, "sub-001", "3", true);
        assert_eq!(
            rating_filename(&r, "sub-001", "alice"),
            "memory._.sub-001._.alice._.3._.True.json"
        );
        let fresh = m.fresh_record("s");
        assert_eq!(rating_filename(&fresh, "s", "alice"), "memory._.s._.alice._.None._.False.json");
    }

    #[test]
    fn parse_filename_identity() {
        let id = RatingFileName::parse("memory._.sub-001._.alice._.3._.True.json").unwrap();
        assert_eq!(id.module, "memory");
        assert_eq!(id.subject, "sub-001");
        assert_eq!(id.rater, "alice");
        assert_eq!(id.prefix(), "memory._.sub-001._.alice");
        assert!(RatingFileName::parse("notarating.json").is_none());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        let record = rated(&m, "sub-001", "3", true);

        let path = store.save(&record, Access::ReadWrite).unwrap().unwrap();
        assert!(path.ends_with("RatingFiles/memory/alice/memory._.sub-001._.alice._.3._.True.json"));

        match store.load(&m, "sub-001", "alice").unwrap() {
            LoadOutcome::Loaded { record: loaded, drift, .. } => {
                assert!(drift.is_empty());
                assert_eq!(loaded.scores, record.scores);
                assert_eq!(loaded.tags, record.tags);
                assert_eq!(loaded.notes, record.notes);
                assert_eq!(loaded.time, record.time);
            }
            LoadOutcome::Missing => panic!("expected a stored rating"),
        }
    }

    #[test]
    fn save_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        store.save(&rated(&m, "s1", "2", false), Access::ReadWrite).unwrap();
        store.save(&rated(&m, "s1", "5", true), Access::ReadWrite).unwrap();

        let files = store.find("memory", "s1", "alice").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with("._.5._.True.json"));
    }

    #[test]
    fn observe_only_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        let out = store.save(&rated(&m, "s1", "2", false), Access::ObserveOnly).unwrap();
        assert!(out.is_none());
        assert!(store.rater_dir("memory", "alice").is_dir());
        assert!(store.find("memory", "s1", "alice").unwrap().is_empty());
    }

    #[test]
    fn prefix_does_not_match_longer_rater_or_subject() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        store.save(&rated(&m, "s10", "2", false), Access::ReadWrite).unwrap();
        assert!(store.find("memory", "s1", "alice").unwrap().is_empty());
        assert!(store.find("memory", "s10", "ali").unwrap().is_empty());
    }

    #[test]
    fn missing_rating() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let outcome = store.load(&memory_module(), "nobody", "alice").unwrap();
        assert!(matches!(outcome, LoadOutcome::Missing));
    }

    #[test]
    fn schema_drift_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let mut old = memory_module();
        old.scores.get_mut(1).unwrap().domain = Some("1,2,3".into());
        store.save(&rated(&old, "s1", "2", false), Access::ReadWrite).unwrap();

        let mut live = memory_module();
        live.scores.get_mut(1).unwrap().domain = Some("1,2,3,4".into());
        match store.load(&live, "s1", "alice").unwrap() {
            LoadOutcome::Loaded { drift, .. } => assert_eq!(drift.len(), 1),
            LoadOutcome::Missing => panic!("expected a stored rating"),
        }
    }

    #[test]
    fn ambiguous_prefix_is_an_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        let rater_dir = store.rater_dir("memory", "alice");
        std::fs::create_dir_all(&rater_dir).unwrap();
        let body = serde_json::to_string(&rated(&m, "s1", "1", false)).unwrap();
        std::fs::write(rater_dir.join("memory._.s1._.alice._.1._.False.json"), &body).unwrap();
        std::fs::write(rater_dir.join("memory._.s1._.alice._.2._.False.json"), &body).unwrap();

        let err = store.load(&m, "s1", "alice").unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn reserved_separator_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        let r = m.fresh_record("a._.b");
        assert!(matches!(
            store.save(&r, Access::ReadWrite),
            Err(StoreError::ReservedSeparator(_))
        ));
    }

    #[test]
    fn path_separators_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        for subject in ["site/001", "site\\001"] {
            let err = store.save(&m.fresh_record(subject), Access::ReadWrite).unwrap_err();
            assert!(matches!(&err, StoreError::PathSeparator(s) if s == subject));
        }
        let mut other = memory_module();
        other.rater = Some("../bob".into());
        assert!(matches!(
            store.save(&other.fresh_record("s1"), Access::ReadWrite),
            Err(StoreError::PathSeparator(_))
        ));
        assert!(!dir.path().join("RatingFiles").exists());
    }

    #[test]
    fn files_use_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        let path = store.save(&rated(&m, "s1", "4", false), Access::ReadWrite).unwrap().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\n    \"name\": \"memory\""));
    }
}
