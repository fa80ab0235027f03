//! A rating session: one rater working through a list of subjects with one
//! module.
//!
//! All navigation state lives in the session value rather than in the
//! project settings, so two sessions on the same project are independent.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{ModuleError, RegistryError, SessionError};
use crate::model::{CodeExe, ModuleDefinition, RatingRecord};
use crate::store::{read_record, Access, LoadOutcome, RatingFileStore};
use crate::template;

/// Timestamp format stored in rating files.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the subject listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// 1-based position in the subject list.
    pub index: usize,
    pub subject: String,
    pub score1: Option<String>,
    pub tag1: Option<bool>,
}

/// An open rating session.
#[derive(Debug)]
pub struct RatingSession {
    store: RatingFileStore,
    /// The module as configured; used for schema checks and fresh records.
    live: ModuleDefinition,
    /// The live module with the current subject's rating applied.
    current: ModuleDefinition,
    subjects: Vec<String>,
    cursor: usize,
    access: Access,
}

impl RatingSession {
    /// Open a session on `subject` and load (or initialise) its rating.
    ///
    /// `rater` overrides the module's configured rater. The module must be
    /// ready to rate (see [`ModuleDefinition::check_ready`]).
    pub fn open(
        store: RatingFileStore,
        module: &ModuleDefinition,
        rater: &str,
        subjects: Vec<String>,
        subject: &str,
    ) -> Result<Self, SessionError> {
        if subjects.is_empty() {
            return Err(SessionError::NoSubjects);
        }
        let cursor = subjects
            .iter()
            .position(|s| s == subject)
            .ok_or_else(|| SessionError::UnknownSubject(subject.to_string()))?;

        let mut live = module.clone();
        live.rater = Some(rater.to_string());
        live.check_ready()?;

        let mut session = Self {
            store,
            current: live.clone(),
            live,
            subjects,
            cursor,
            access: Access::ReadWrite,
        };
        session.load_current()?;
        tracing::info!(
            "opened session: module={}, rater={}, subject={}",
            session.live.name,
            rater,
            subject
        );
        Ok(session)
    }

    pub fn subject(&self) -> &str {
        &self.subjects[self.cursor]
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn rater(&self) -> &str {
        self.live.rater.as_deref().unwrap_or_default()
    }

    /// The working module, with the current rating applied.
    pub fn module(&self) -> &ModuleDefinition {
        &self.current
    }

    pub fn is_observe_only(&self) -> bool {
        self.access == Access::ObserveOnly
    }

    pub fn set_observe_only(&mut self, observe: bool) {
        self.access = if observe {
            Access::ObserveOnly
        } else {
            Access::ReadWrite
        };
    }

    /// The record that `save` would write.
    pub fn record(&self) -> RatingRecord {
        self.current.snapshot()
    }

    /// Set score `key` to a member of its domain, or clear it.
    pub fn set_score(&mut self, key: usize, value: Option<&str>) -> Result<(), ModuleError> {
        let max = self.current.scores.len();
        let score = self
            .current
            .scores
            .get_mut(key)
            .ok_or(RegistryError::IndexOutOfRange { index: key, max })?;
        if let Some(v) = value {
            if !score.domain_values().contains(&v) {
                return Err(ModuleError::ValueOutOfDomain {
                    key,
                    value: v.to_string(),
                    domain: score.domain.clone().unwrap_or_default(),
                });
            }
        }
        score.value = value.map(str::to_string);
        Ok(())
    }

    pub fn set_tag(&mut self, key: usize, value: bool) -> Result<(), ModuleError> {
        let max = self.current.tags.len();
        let tag = self
            .current
            .tags
            .get_mut(key)
            .ok_or(RegistryError::IndexOutOfRange { index: key, max })?;
        tag.value = Some(value);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.current.notes = notes.filter(|n| !n.trim().is_empty());
    }

    pub fn set_command(&mut self, code_exe: Option<CodeExe>) {
        self.current.code_exe = code_exe;
    }

    /// Render the module's viewer template for the current subject and keep
    /// the commands on the record.
    pub fn prepare_command(&mut self, vars: &BTreeMap<String, String>) -> Option<&CodeExe> {
        let code = self.current.code.as_deref()?;
        self.current.code_exe = Some(template::render_command(code, vars));
        self.current.code_exe.as_ref()
    }

    /// Persist the current record. Returns `None` in observe-only mode.
    pub fn save(&mut self) -> Result<Option<PathBuf>, SessionError> {
        if self.access == Access::ReadWrite {
            self.current.time = Some(chrono::Local::now().format(TIME_FORMAT).to_string());
        }
        Ok(self.store.save(&self.current.snapshot(), self.access)?)
    }

    /// Save, then move to the next subject (wrapping to the first).
    pub fn next(&mut self) -> Result<&str, SessionError> {
        let next = (self.cursor + 1) % self.subjects.len();
        self.move_to(next)
    }

    /// Save, then move to the previous subject (wrapping to the last).
    pub fn previous(&mut self) -> Result<&str, SessionError> {
        let prev = self
            .cursor
            .checked_sub(1)
            .unwrap_or(self.subjects.len() - 1);
        self.move_to(prev)
    }

    /// Save, then jump to `subject`.
    pub fn goto(&mut self, subject: &str) -> Result<&str, SessionError> {
        let index = self
            .subjects
            .iter()
            .position(|s| s == subject)
            .ok_or_else(|| SessionError::UnknownSubject(subject.to_string()))?;
        self.move_to(index)
    }

    /// Score 1 and tag 1 for every subject, read from the rating bodies.
    pub fn listing(&self) -> Vec<ListingRow> {
        self.subjects
            .iter()
            .enumerate()
            .map(|(i, subject)| {
                let record = self
                    .store
                    .find(&self.live.name, subject, self.rater())
                    .ok()
                    .and_then(|paths| paths.into_iter().next())
                    .and_then(|path| match read_record(&path) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::warn!("skipping unreadable rating: {}", e);
                            None
                        }
                    });
                ListingRow {
                    index: i + 1,
                    subject: subject.clone(),
                    score1: record.as_ref().and_then(|r| r.score1().map(str::to_string)),
                    tag1: record.as_ref().and_then(RatingRecord::tag1),
                }
            })
            .collect()
    }

    fn move_to(&mut self, index: usize) -> Result<&str, SessionError> {
        self.save()?;
        self.cursor = index;
        self.load_current()?;
        Ok(self.subject())
    }

    fn load_current(&mut self) -> Result<(), SessionError> {
        let subject = self.subjects[self.cursor].clone();
        let mut working = self.live.clone();
        match self.store.load(&self.live, &subject, self.rater())? {
            LoadOutcome::Missing => {
                tracing::info!("no rating yet for '{}', starting fresh", subject);
                working.apply_record(self.live.fresh_record(&subject));
            }
            LoadOutcome::Loaded { record, drift, .. } => {
                if !drift.is_empty() {
                    self.access = Access::ObserveOnly;
                }
                working.apply_record(record);
            }
        }
        self.current = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScoreDef, TagDef};

    fn memory_module() -> ModuleDefinition {
        let mut m = ModuleDefinition::new("memory", "Memory").unwrap();
        *m.scores.get_mut(1).unwrap() = ScoreDef::new("Quality", "1,2,3,4,5").unwrap();
        *m.tags.get_mut(1).unwrap() = TagDef::new("Artifact");
        m
    }

    fn subjects() -> Vec<String> {
        vec!["s1".into(), "s2".into(), "s3".into()]
    }

    #[test]
    fn open_requires_known_subject_and_ready_module() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();
        assert!(matches!(
            RatingSession::open(store.clone(), &m, "alice", subjects(), "s9"),
            Err(SessionError::UnknownSubject(_))
        ));
        assert!(matches!(
            RatingSession::open(store.clone(), &m, "alice", vec![], "s1"),
            Err(SessionError::NoSubjects)
        ));
        let incomplete = ModuleDefinition::new("raw", "Raw").unwrap();
        assert!(matches!(
            RatingSession::open(store, &incomplete, "alice", subjects(), "s1"),
            Err(SessionError::Module(ModuleError::IncompleteScore { .. }))
        ));
    }

    #[test]
    fn rate_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let m = memory_module();

        let mut session = RatingSession::open(store.clone(), &m, "alice", subjects(), "s1").unwrap();
        session.set_score(1, Some("3")).unwrap();
        session.set_tag(1, true).unwrap();
        session.set_notes(Some("motion in slice 4".into()));
        let path = session.save().unwrap().unwrap();
        assert!(path.ends_with("memory._.s1._.alice._.3._.True.json"));
        assert!(session.record().time.is_some());

        let reopened = RatingSession::open(store, &m, "alice", subjects(), "s1").unwrap();
        assert_eq!(reopened.record().score1(), Some("3"));
        assert_eq!(reopened.record().notes.as_deref(), Some("motion in slice 4"));
        assert!(!reopened.is_observe_only());
    }

    #[test]
    fn score_must_be_in_domain() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let mut session =
            RatingSession::open(store, &memory_module(), "alice", subjects(), "s1").unwrap();
        assert!(matches!(
            session.set_score(1, Some("9")),
            Err(ModuleError::ValueOutOfDomain { .. })
        ));
        assert!(session.set_score(2, Some("1")).is_err());
        assert!(session.set_tag(5, true).is_err());
        session.set_score(1, None).unwrap();
    }

    #[test]
    fn navigation_wraps_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let mut session =
            RatingSession::open(store.clone(), &memory_module(), "alice", subjects(), "s1").unwrap();

        assert_eq!(session.previous().unwrap(), "s3");
        assert_eq!(session.next().unwrap(), "s1");
        session.set_score(1, Some("5")).unwrap();
        assert_eq!(session.goto("s2").unwrap(), "s2");
        // Fresh record for s2, and s1 was saved on the way out.
        assert_eq!(session.record().score1(), None);
        assert_eq!(store.find("memory", "s1", "alice").unwrap().len(), 1);

        let listing = session.listing();
        assert_eq!(listing.len(), 3);
        assert_eq!(listing[0].score1.as_deref(), Some("5"));
        assert_eq!(listing[0].index, 1);
    }

    #[test]
    fn drift_switches_to_observe_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let mut old = memory_module();
        old.scores.get_mut(1).unwrap().domain = Some("1,2,3".into());
        let mut s = RatingSession::open(store.clone(), &old, "alice", subjects(), "s1").unwrap();
        s.set_score(1, Some("2")).unwrap();
        s.save().unwrap();

        let mut live = memory_module();
        live.scores.get_mut(1).unwrap().domain = Some("1,2,3,4".into());
        let mut session = RatingSession::open(store.clone(), &live, "alice", subjects(), "s1").unwrap();
        assert!(session.is_observe_only());
        assert!(session.save().unwrap().is_none());

        // The stored rating is untouched.
        let files = store.find("memory", "s1", "alice").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with("._.2._.False.json"));
    }

    #[test]
    fn prepare_command_renders_template() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        let mut m = memory_module();
        m.code = Some("MULTICMD view {ezqcid}/a;| view {ezqcid}/b".into());
        let mut session = RatingSession::open(store, &m, "alice", subjects(), "s2").unwrap();
        let vars = BTreeMap::from([("ezqcid".to_string(), "s2".to_string())]);
        let exe = session.prepare_command(&vars).unwrap();
        assert_eq!(exe[&1], "view s2/b");
        assert!(session.record().code_exe.is_some());
    }
}
