//! Rating aggregation: rating files → long table → wide per-subject table.
//!
//! The pipeline is `discover → flatten → concat → pivot → merge → reorder`.
//! Every step is deterministic: files are visited in sorted path order and
//! rows/columns are emitted in a fixed order, so rebuilding an unchanged
//! corpus produces identical tables.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use easyqc_core::model::RatingRecord;
use easyqc_core::project::TABLE_DIR;
use easyqc_core::store::{read_record, RatingFileName};
use easyqc_core::template::join_commands;
use serde::{Deserialize, Serialize};

use crate::table::{Table, Value, ID_COLUMN};

/// Cached long-form snapshot, one row per rating file.
pub const LONG_SNAPSHOT: &str = "ezqc_qctable_orig.csv";

/// Cached pivoted snapshot, one row per subject.
pub const WIDE_SNAPSHOT: &str = "ezqc_qctable_orig_wide.csv";

/// How rated subjects are joined against the covariate table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Only subjects present in both tables.
    Inner,
    /// Every covariate row, with empty rating columns when unrated.
    #[default]
    Left,
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            other => Err(format!("unknown join mode '{other}' (expected left or inner)")),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => f.write_str("inner"),
            Self::Left => f.write_str("left"),
        }
    }
}

/// A rating file that passed the directory, filename and body checks.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredRating {
    pub path: PathBuf,
    pub record: RatingRecord,
}

/// One `(module, rater)` rating of a subject in the per-subject index.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectEntry {
    pub module: String,
    pub rater: String,
    pub scores: BTreeMap<usize, Option<String>>,
    pub tags: BTreeMap<usize, Option<bool>>,
    pub notes: Option<String>,
    pub time: Option<String>,
}

/// `ezqcid → "{module}-{rater}" → entry`
pub type SubjectIndex = BTreeMap<String, BTreeMap<String, SubjectEntry>>;

/// Everything one aggregation pass produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub records: Vec<DiscoveredRating>,
    /// One row per rating file.
    pub long: Table,
    /// One row per subject, columns `{rater}.{module}.{field}`.
    pub wide: Table,
    pub by_subject: SubjectIndex,
}

/// Find every valid rating file under `rating_root`.
///
/// Files must live at `{root}/{module}/{rater}/`, their filename prefix must
/// agree with the directories, and the body's `name`/`rater`/`ezqcid` must
/// agree with the filename. Anything else is skipped with a warning.
pub fn discover(rating_root: &Path) -> Vec<DiscoveredRating> {
    discover_until(rating_root, &|| false).unwrap_or_default()
}

/// [`discover`] that checks `cancelled` before each file and returns `None`
/// as soon as it reports true.
pub fn discover_until(
    rating_root: &Path,
    cancelled: &dyn Fn() -> bool,
) -> Option<Vec<DiscoveredRating>> {
    let mut paths = Vec::new();
    if rating_root.is_dir() {
        collect_json_files(rating_root, &mut paths);
    } else {
        tracing::warn!("rating directory {} does not exist", rating_root.display());
    }
    paths.sort();

    let mut found = Vec::with_capacity(paths.len());
    for path in paths {
        if cancelled() {
            tracing::debug!("rating discovery cancelled");
            return None;
        }
        match validate_rating_file(rating_root, &path) {
            Ok(record) => found.push(DiscoveredRating { path, record }),
            Err(reason) => tracing::warn!("skipping {}: {}", path.display(), reason),
        }
    }
    tracing::debug!("discovered {} rating files", found.len());
    Some(found)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("skipping {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
}

fn validate_rating_file(root: &Path, path: &Path) -> std::result::Result<RatingRecord, String> {
    let relative = path.strip_prefix(root).map_err(|e| e.to_string())?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let [dir_module, dir_rater, file_name] = parts.as_slice() else {
        return Err("not at {module}/{rater}/{file}".to_string());
    };
    let name = RatingFileName::parse(file_name).ok_or("filename is not a rating filename")?;
    if &name.module != dir_module || &name.rater != dir_rater {
        return Err(format!(
            "filename module/rater ({}/{}) does not match directory ({}/{})",
            name.module, name.rater, dir_module, dir_rater
        ));
    }
    let record = read_record(path).map_err(|e| e.to_string())?;
    if record.name != name.module
        || record.rater.as_deref() != Some(name.rater.as_str())
        || record.ezqcid.as_deref() != Some(name.subject.as_str())
    {
        return Err(format!(
            "body identity ({}, {:?}, {:?}) does not match filename",
            record.name, record.rater, record.ezqcid
        ));
    }
    Ok(record)
}

/// One rating as `(column, value)` pairs.
///
/// `name` becomes `module_name`; scores and tags become `score{k}{field}` /
/// `tag{k}{field}` with the value in the bare `score{k}`/`tag{k}` column;
/// `code_exe` is joined into one string.
pub fn flatten(rating: &DiscoveredRating) -> Vec<(String, Value)> {
    let r = &rating.record;
    let mut row: Vec<(String, Value)> = vec![
        ("module_name".into(), r.name.as_str().into()),
        ("label".into(), r.label.clone().into()),
        ("rater".into(), r.rater.clone().into()),
        (ID_COLUMN.into(), r.ezqcid.clone().into()),
        ("code".into(), r.code.clone().into()),
        (
            "code_exe".into(),
            r.code_exe.as_ref().map(join_commands).into(),
        ),
        ("notes".into(), r.notes.clone().into()),
        ("time".into(), r.time.clone().into()),
        ("control".into(), r.control.into()),
    ];
    for (k, score) in r.scores.iter() {
        row.push((format!("score{k}label"), score.label.clone().into()));
        row.push((format!("score{k}num"), score.num.clone().into()));
        row.push((format!("score{k}num_"), score.domain.clone().into()));
        row.push((format!("score{k}"), score.value.clone().into()));
    }
    for (k, tag) in r.tags.iter() {
        row.push((format!("tag{k}label"), tag.label.clone().into()));
        row.push((format!("tag{k}"), tag.value.into()));
    }
    let file_name = rating
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    row.push(("filename".into(), file_name.into()));
    row.push((
        "filepath".into(),
        rating.path.to_string_lossy().into_owned().into(),
    ));
    row
}

/// Stack flattened rows into one table; columns are the union in first-seen
/// order.
pub fn concat(rows: Vec<Vec<(String, Value)>>) -> Table {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        for (name, _) in row {
            if !positions.contains_key(name) {
                positions.insert(name.clone(), columns.len());
                columns.push(name.clone());
            }
        }
    }
    let width = columns.len();
    let mut table = Table::new(columns);
    for row in rows {
        let mut cells = vec![Value::Null; width];
        for (name, value) in row {
            cells[positions[&name]] = value;
        }
        table.push_row(cells);
    }
    table
}

/// Pivot the long table to one row per subject.
///
/// Every field other than `ezqcid`, `module_name` and `rater` becomes one
/// column per `(module, rater)` pair, named `{rater}.{module}.{field}`,
/// holding the first non-null value. Columns that are null for every
/// subject are dropped. Rows are sorted by subject id, which is text.
pub fn pivot(long: &Table) -> Table {
    let (Some(id_col), Some(module_col), Some(rater_col)) = (
        long.column_index(ID_COLUMN),
        long.column_index("module_name"),
        long.column_index("rater"),
    ) else {
        return Table::new(vec![ID_COLUMN.to_string()]);
    };

    let fields: Vec<usize> = (0..long.width())
        .filter(|&c| c != id_col && c != module_col && c != rater_col)
        .collect();

    let mut pairs: Vec<(String, String)> = long
        .rows()
        .iter()
        .map(|r| (r[module_col].to_text(), r[rater_col].to_text()))
        .collect();
    pairs.sort();
    pairs.dedup();

    // (field, pair) -> column in the output
    let mut out_columns = vec![ID_COLUMN.to_string()];
    let mut slot: HashMap<(usize, usize), usize> = HashMap::new();
    for &field in &fields {
        for (p, (module, rater)) in pairs.iter().enumerate() {
            slot.insert((field, p), out_columns.len());
            out_columns.push(format!("{rater}.{module}.{}", long.columns()[field]));
        }
    }
    let pair_index: HashMap<&(String, String), usize> =
        pairs.iter().enumerate().map(|(i, p)| (p, i)).collect();

    let mut by_subject: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for row in long.rows() {
        if row[id_col].is_null() {
            continue;
        }
        let id = row[id_col].to_text();
        let cells = by_subject.entry(id.clone()).or_insert_with(|| {
            let mut cells = vec![Value::Null; out_columns.len()];
            cells[0] = Value::Text(id);
            cells
        });
        let pair = (row[module_col].to_text(), row[rater_col].to_text());
        let Some(&p) = pair_index.get(&pair) else { continue };
        for &field in &fields {
            let out = slot[&(field, p)];
            if cells[out].is_null() {
                cells[out] = row[field].clone();
            }
        }
    }

    let mut wide = Table::from_rows(out_columns, by_subject.into_values().collect());
    let all_null: Vec<bool> = (0..wide.width())
        .map(|c| c != 0 && wide.rows().iter().all(|r| r[c].is_null()))
        .collect();
    let mut c = 0;
    wide.drop_columns(|_| {
        let drop = all_null[c];
        c += 1;
        drop
    });
    wide
}

/// Join `wide` onto `covariates` by `ezqcid`.
///
/// Ids are compared as text. Other shared column names get `_x` (covariate)
/// and `_y` (rating) suffixes. Covariate row order is kept. When either
/// side has no `ezqcid` column, `wide` is returned as is.
pub fn merge(covariates: &Table, wide: &Table, mode: JoinMode) -> Table {
    let (Some(left_id), Some(right_id)) = (
        covariates.column_index(ID_COLUMN),
        wide.column_index(ID_COLUMN),
    ) else {
        tracing::warn!(
            "cannot merge: both tables need an '{}' column, keeping ratings only",
            ID_COLUMN
        );
        return wide.clone();
    };

    let right_cols: Vec<usize> = (0..wide.width()).filter(|&c| c != right_id).collect();
    let mut columns: Vec<String> = covariates
        .columns()
        .iter()
        .map(|c| {
            if c != ID_COLUMN && wide.has_column(c) {
                format!("{c}_x")
            } else {
                c.clone()
            }
        })
        .collect();
    for &c in &right_cols {
        let name = &wide.columns()[c];
        if covariates.has_column(name) {
            columns.push(format!("{name}_y"));
        } else {
            columns.push(name.clone());
        }
    }

    let lookup: HashMap<String, usize> = wide
        .rows()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, r)| (r[right_id].to_text(), i))
        .collect();

    let mut out = Table::new(columns);
    for row in covariates.rows() {
        let key = row[left_id].to_text();
        let matched = lookup.get(&key).map(|&i| &wide.rows()[i]);
        if matched.is_none() && mode == JoinMode::Inner {
            continue;
        }
        let mut cells = row.clone();
        cells.extend(
            right_cols
                .iter()
                .map(|&c| matched.map_or(Value::Null, |m| m[c].clone())),
        );
        out.push_row(cells);
    }
    out
}

fn has_numbered_suffix(column: &str, kind: &str) -> bool {
    column
        .rsplit_once(&format!(".{kind}"))
        .is_some_and(|(_, n)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Drop code columns and order the rest: `ezqcid`, then `*.score{n}`, then
/// `*.tag{n}`, then everything else, each group in its existing order.
pub fn reorder(mut table: Table) -> Table {
    table.drop_columns(|c| c.contains(".code"));
    let columns = table.columns();
    let is_score = |c: &str| has_numbered_suffix(c, "score");
    let is_tag = |c: &str| has_numbered_suffix(c, "tag");

    let mut order: Vec<usize> = Vec::with_capacity(columns.len());
    order.extend(columns.iter().position(|c| c == ID_COLUMN));
    let rest = || (0..columns.len()).filter(move |&i| columns[i] != ID_COLUMN);
    order.extend(rest().filter(|&i| is_score(&columns[i])));
    order.extend(rest().filter(|&i| is_tag(&columns[i])));
    order.extend(rest().filter(|&i| !is_score(&columns[i]) && !is_tag(&columns[i])));
    table.project(&order);
    table
}

/// Group ratings by subject, then by `{module}-{rater}`.
pub fn index_by_subject(records: &[DiscoveredRating]) -> SubjectIndex {
    let mut index = SubjectIndex::new();
    for DiscoveredRating { record, .. } in records {
        let (Some(subject), Some(rater)) = (&record.ezqcid, &record.rater) else {
            continue;
        };
        let entry = SubjectEntry {
            module: record.name.clone(),
            rater: rater.clone(),
            scores: record
                .scores
                .iter()
                .map(|(k, s)| (k, s.value.clone()))
                .collect(),
            tags: record.tags.iter().map(|(k, t)| (k, t.value)).collect(),
            notes: record.notes.clone(),
            time: record.time.clone(),
        };
        index
            .entry(subject.clone())
            .or_default()
            .insert(format!("{}-{}", record.name, rater), entry);
    }
    index
}

/// Run discovery, flatten, concat and pivot over `rating_root`.
pub fn aggregate(rating_root: &Path) -> Aggregation {
    aggregate_until(rating_root, &|| false).unwrap_or_default()
}

/// [`aggregate`] with cooperative cancellation during discovery.
pub fn aggregate_until(rating_root: &Path, cancelled: &dyn Fn() -> bool) -> Option<Aggregation> {
    let records = discover_until(rating_root, cancelled)?;
    let long = concat(records.iter().map(flatten).collect());
    let wide = pivot(&long);
    let by_subject = index_by_subject(&records);
    tracing::info!(
        "aggregated {} ratings for {} subjects",
        records.len(),
        by_subject.len()
    );
    Some(Aggregation {
        records,
        long,
        wide,
        by_subject,
    })
}

/// The analysis table: `wide` joined onto `covariates` (when present), then
/// reordered.
pub fn analysis_table(wide: &Table, covariates: Option<&Table>, mode: JoinMode) -> Table {
    let merged = match covariates {
        Some(cov) => merge(cov, wide, mode),
        None => wide.clone(),
    };
    reorder(merged)
}

/// Write the long and wide snapshots under `{project_root}/Table/`.
///
/// Each file is written to a temporary file in the same directory and
/// renamed into place.
pub fn write_snapshots(project_root: &Path, long: &Table, wide: &Table) -> Result<()> {
    let dir = project_root.join(TABLE_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for (name, table) in [(LONG_SNAPSHOT, long), (WIDE_SNAPSHOT, wide)] {
        let path = dir.join(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        table.to_csv_writer(tmp.as_file_mut())?;
        tmp.as_file_mut().flush()?;
        tmp.persist(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!("wrote snapshot {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use easyqc_core::model::{ModuleDefinition, ScoreDef, TagDef};
    use easyqc_core::store::{Access, RatingFileStore};

    fn module(name: &str, rater: &str) -> ModuleDefinition {
        let mut m = ModuleDefinition::new(name, name).unwrap();
        m.rater = Some(rater.into());
        *m.scores.get_mut(1).unwrap() = ScoreDef::new("Quality", "1-5").unwrap();
        *m.tags.get_mut(1).unwrap() = TagDef::new("Artifact");
        m
    }

    fn rate(store: &RatingFileStore, m: &ModuleDefinition, subject: &str, score: &str, tag: bool) {
        let mut r = m.fresh_record(subject);
        r.scores.get_mut(1).unwrap().value = Some(score.into());
        r.tags.get_mut(1).unwrap().value = Some(tag);
        store.save(&r, Access::ReadWrite).unwrap();
    }

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        rate(&store, &module("memory", "alice"), "sub-001", "3", true);
        rate(&store, &module("memory", "bob"), "sub-001", "4", false);
        rate(&store, &module("memory", "alice"), "sub-002", "1", false);
        rate(&store, &module("motion", "alice"), "sub-002", "5", true);
        dir
    }

    #[test]
    fn discover_skips_inconsistent_files() {
        let dir = corpus();
        let root = dir.path().join("RatingFiles");
        // Filename rater disagrees with its directory.
        std::fs::copy(
            root.join("memory/alice/memory._.sub-001._.alice._.3._.True.json"),
            root.join("memory/bob/memory._.sub-001._.alice._.3._.True.json"),
        )
        .unwrap();
        // Not valid JSON.
        std::fs::write(root.join("memory/alice/memory._.x._.alice.json"), "{").unwrap();
        // Wrong depth.
        std::fs::write(root.join("stray.json"), "{}").unwrap();

        let found = discover(&root);
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn discover_can_be_cancelled() {
        let dir = corpus();
        assert!(discover_until(&dir.path().join("RatingFiles"), &|| true).is_none());
    }

    #[test]
    fn flatten_collapses_value_columns() {
        let dir = corpus();
        let found = discover(&dir.path().join("RatingFiles"));
        let row = flatten(&found[0]);
        let names: Vec<&str> = row.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names[0], "module_name");
        assert!(names.contains(&"score1"));
        assert!(names.contains(&"score1num_"));
        assert!(names.contains(&"tag1"));
        assert!(!names.contains(&"name"));
        assert!(!names.contains(&"score1value"));
        assert_eq!(names.last(), Some(&"filepath"));
    }

    #[test]
    fn pivot_names_columns_by_rater_and_module() {
        let dir = corpus();
        let agg = aggregate(&dir.path().join("RatingFiles"));
        assert_eq!(agg.long.height(), 4);
        assert_eq!(agg.wide.height(), 2);
        assert_eq!(agg.wide.get(0, ID_COLUMN), Some(&Value::from("sub-001")));
        assert_eq!(agg.wide.get(0, "alice.memory.score1"), Some(&Value::from("3")));
        assert_eq!(agg.wide.get(0, "alice.memory.tag1"), Some(&Value::Bool(true)));
        assert_eq!(agg.wide.get(0, "bob.memory.score1"), Some(&Value::from("4")));
        assert_eq!(agg.wide.get(0, "alice.motion.score1"), Some(&Value::Null));
        // notes are null everywhere and dropped
        assert!(!agg.wide.has_column("alice.memory.notes"));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let dir = corpus();
        let root = dir.path().join("RatingFiles");
        let cov = Table::from_csv_reader("ezqcid,age\nsub-002,41\nsub-001,30\nsub-009,52\n".as_bytes())
            .unwrap();
        let a = aggregate(&root);
        let b = aggregate(&root);
        assert_eq!(
            a.wide.to_csv_string().unwrap(),
            b.wide.to_csv_string().unwrap()
        );
        for mode in [JoinMode::Left, JoinMode::Inner] {
            let first = analysis_table(&a.wide, Some(&cov), mode).to_csv_string().unwrap();
            let second = analysis_table(&b.wide, Some(&cov), mode).to_csv_string().unwrap();
            assert_eq!(first, second, "{mode} join differs between runs");
        }
    }

    #[test]
    fn merge_matches_leading_zero_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = RatingFileStore::for_project(dir.path());
        rate(&store, &module("memory", "alice"), "001", "2", false);
        let agg = aggregate(&dir.path().join("RatingFiles"));
        let cov = Table::from_csv_reader("ezqcid,age\n001,30\n002,41\n".as_bytes()).unwrap();
        assert_eq!(cov.subject_ids(), vec!["001", "002"]);

        let inner = merge(&cov, &agg.wide, JoinMode::Inner);
        assert_eq!(inner.height(), 1);
        assert_eq!(inner.get(0, ID_COLUMN), Some(&Value::from("001")));
        assert_eq!(inner.get(0, "alice.memory.score1"), Some(&Value::from("2")));
    }

    #[test]
    fn merge_without_ids_keeps_ratings() {
        let dir = corpus();
        let agg = aggregate(&dir.path().join("RatingFiles"));
        let cov = Table::from_csv_reader("subject,age\nsub-001,30\n".as_bytes()).unwrap();
        let out = merge(&cov, &agg.wide, JoinMode::Left);
        assert_eq!(out.height(), 2);
        assert!(out.has_column("alice.memory.score1"));
        assert!(!out.has_column("age"));
        let table = analysis_table(&agg.wide, Some(&cov), JoinMode::Inner);
        assert_eq!(table.columns()[0], ID_COLUMN);
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn merge_modes() {
        let dir = corpus();
        let agg = aggregate(&dir.path().join("RatingFiles"));
        let cov = Table::from_csv_reader("ezqcid,age\nsub-001,30\nsub-003,41\n".as_bytes()).unwrap();

        let left = merge(&cov, &agg.wide, JoinMode::Left);
        assert_eq!(left.height(), 2);
        assert_eq!(left.get(1, "alice.memory.score1"), Some(&Value::Null));

        let inner = merge(&cov, &agg.wide, JoinMode::Inner);
        assert_eq!(inner.height(), 1);
        assert_eq!(inner.get(0, "age"), Some(&Value::Int(30)));
    }

    #[test]
    fn merge_suffixes_shared_columns() {
        let cov = Table::from_rows(
            vec!["ezqcid".into(), "x".into()],
            vec![vec![Value::Int(7), Value::from("cov")]],
        );
        let wide = Table::from_rows(
            vec!["ezqcid".into(), "x".into()],
            vec![vec![Value::from("7"), Value::from("rating")]],
        );
        let out = merge(&cov, &wide, JoinMode::Inner);
        assert_eq!(out.columns(), &["ezqcid", "x_x", "x_y"]);
        assert_eq!(out.get(0, "x_y"), Some(&Value::from("rating")));
    }

    #[test]
    fn reorder_groups_columns() {
        let table = Table::new(
            [
                "age",
                "alice.m.code",
                "alice.m.tag1",
                "ezqcid",
                "alice.m.score1",
                "alice.m.score1label",
                "alice.m.code_exe",
                "bob.m.score1",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        let out = reorder(table);
        assert_eq!(
            out.columns(),
            &[
                "ezqcid",
                "alice.m.score1",
                "bob.m.score1",
                "alice.m.tag1",
                "age",
                "alice.m.score1label"
            ]
        );
    }

    #[test]
    fn subject_index() {
        let dir = corpus();
        let agg = aggregate(&dir.path().join("RatingFiles"));
        let sub1 = &agg.by_subject["sub-001"];
        assert_eq!(sub1.len(), 2);
        assert_eq!(sub1["memory-bob"].scores[&1].as_deref(), Some("4"));
        assert_eq!(agg.by_subject["sub-002"]["motion-alice"].tags[&1], Some(true));
    }

    #[test]
    fn snapshots_are_written() {
        let dir = corpus();
        let agg = aggregate(&dir.path().join("RatingFiles"));
        write_snapshots(dir.path(), &agg.long, &agg.wide).unwrap();
        let wide = Table::read_csv(&dir.path().join("Table").join(WIDE_SNAPSHOT)).unwrap();
        assert_eq!(wide.height(), 2);
        assert!(dir.path().join("Table").join(LONG_SNAPSHOT).exists());
    }

    #[test]
    fn join_mode_parses() {
        assert_eq!("Inner".parse::<JoinMode>().unwrap(), JoinMode::Inner);
        assert!("outer".parse::<JoinMode>().is_err());
        assert_eq!(JoinMode::default(), JoinMode::Left);
    }
}
