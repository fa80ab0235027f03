//! In-memory tables with dynamically typed cells, plus CSV and list-file I/O.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Name of the subject id column.
pub const ID_COLUMN: &str = "ezqcid";

/// Name of the batch column set by [`with_batch`].
pub const BATCH_COLUMN: &str = "ezqcbatch";

/// A single table cell.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Infer a cell from CSV text: integer, float, `True`/`False`, empty as
    /// null, and text otherwise.
    pub fn infer(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("nan") {
            return Self::Null;
        }
        match s {
            "True" | "TRUE" | "true" => return Self::Bool(true),
            "False" | "FALSE" | "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return Self::Int(i);
        }
        if s.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = s.parse::<f64>() {
                return Self::Float(f);
            }
        }
        Self::Text(raw.to_string())
    }

    /// A subject id cell: always text, never inferred, so `001` stays
    /// `001`. Blank is null.
    pub fn id(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Null
        } else {
            Self::Text(raw.to_string())
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Render as CSV text. Null is empty and booleans are `True`/`False`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => s.clone(),
        }
    }

    /// Total order used for sorting: nulls first, then numbers, booleans
    /// and text.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        let class_a = self.sort_class();
        let class_b = other.sort_class();
        if class_a != class_b {
            return class_a.cmp(&class_b);
        }
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }

    const fn sort_class(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Bool(_) => 2,
            Self::Text(_) => 3,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// A rectangular table: named columns and rows of [`Value`]s.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, padding or truncating each row to the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Set column `name` from `values`, appending the column when absent.
    /// Missing trailing values are null.
    pub fn set_column(&mut self, name: &str, values: impl IntoIterator<Item = Value>) {
        let col = match self.column_index(name) {
            Some(col) => col,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
                self.columns.len() - 1
            }
        };
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[col] = values.next().unwrap_or_default();
        }
    }

    /// Remove the columns for which `drop` returns true.
    pub fn drop_columns(&mut self, mut drop: impl FnMut(&str) -> bool) {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !drop(&self.columns[i]))
            .collect();
        if keep.len() == self.columns.len() {
            return;
        }
        self.project(&keep);
    }

    /// Keep only the columns at `indices`, in that order. Indices may repeat.
    pub fn project(&mut self, indices: &[usize]) {
        self.columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = indices.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Rename column `from` to `to`. Returns false when `from` is absent.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(col) => {
                self.columns[col] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Value]) -> bool) {
        self.rows.retain(|r| keep(r));
    }

    /// Sort rows by the given column with [`Value::sort_cmp`], stable.
    pub fn sort_by_column(&mut self, name: &str) {
        if let Some(col) = self.column_index(name) {
            self.rows.sort_by(|a, b| a[col].sort_cmp(&b[col]));
        }
    }

    /// A column holds numbers when every non-null cell is an integer or float.
    pub fn is_numeric_column(&self, col: usize) -> bool {
        self.rows
            .iter()
            .map(|r| &r[col])
            .filter(|v| !v.is_null())
            .all(Value::is_numeric)
    }

    /// Row `row` as `{column: text}`, skipping nulls. Used for templating.
    pub fn row_strings(&self, row: usize) -> BTreeMap<String, String> {
        let Some(cells) = self.rows.get(row) else {
            return BTreeMap::new();
        };
        self.columns
            .iter()
            .zip(cells)
            .filter(|(_, v)| !v.is_null())
            .map(|(c, v)| (c.clone(), v.to_text()))
            .collect()
    }

    /// Index of the first row whose `ezqcid` renders as `id`.
    pub fn find_subject(&self, id: &str) -> Option<usize> {
        let col = self.column_index(ID_COLUMN)?;
        self.rows.iter().position(|r| r[col].to_text() == id)
    }

    /// Distinct subject ids in row order.
    pub fn subject_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.column(ID_COLUMN)
            .map(|values| {
                values
                    .filter(|v| !v.is_null())
                    .map(Value::to_text)
                    .filter(|id| seen.insert(id.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse CSV with a header row, inferring each cell's type. `ezqcid`
    /// cells stay text.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = rdr
            .headers()
            .context("failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect();
        let id_col = columns.iter().position(|c| c == ID_COLUMN);
        let mut table = Self::new(columns);
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("failed to read CSV row {}", i + 1))?;
            let row = record
                .iter()
                .enumerate()
                .map(|(c, raw)| {
                    if Some(c) == id_col {
                        Value::id(raw)
                    } else {
                        Value::infer(raw)
                    }
                })
                .collect();
            table.push_row(row);
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_csv_reader(file).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write CSV with a header row and no index column.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)
            .context("failed to write CSV header")?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Value::to_text))
                .context("failed to write CSV row")?;
        }
        wtr.flush().context("failed to flush CSV")?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_csv_writer(&mut buf)?;
        String::from_utf8(buf).context("CSV output is not UTF-8")
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        self.to_csv_writer(file)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Read a subject list: `.csv` as a table, `.txt`/`.list` as one `path` per
/// line.
pub fn read_list(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => Table::read_csv(path),
        Some("txt" | "list") => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let rows = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| vec![Value::from(l)])
                .collect();
            Ok(Table::from_rows(vec!["path".to_string()], rows))
        }
        _ => bail!("unsupported list format: {}", path.display()),
    }
}

/// Split `text` on spaces, commas and newlines into a single column `0`.
pub fn words_table(text: &str) -> Table {
    let rows = text
        .split(|c: char| c == ' ' || c == ',' || c == '\n' || c == '\r')
        .filter(|w| !w.is_empty())
        .map(|w| vec![Value::from(w)])
        .collect();
    Table::from_rows(vec!["0".to_string()], rows)
}

/// Add an `ezqcid` column copied from `var` when the table has none.
pub fn with_id_column(mut table: Table, var: &str) -> Result<Table> {
    if table.has_column(ID_COLUMN) {
        return Ok(table);
    }
    let Some(values) = table.column(var) else {
        bail!("column '{}' not found", var);
    };
    let values: Vec<Value> = values
        .map(|v| match v {
            Value::Null => Value::Null,
            other => Value::Text(other.to_text()),
        })
        .collect();
    table.set_column(ID_COLUMN, values);
    Ok(table)
}

/// Set every row's `ezqcbatch` to `batch`.
pub fn with_batch(mut table: Table, batch: &str) -> Table {
    let height = table.height();
    table.set_column(BATCH_COLUMN, std::iter::repeat(Value::from(batch)).take(height));
    table
}

/// One row per subdirectory of `path`, in column `0`, sorted by name.
pub fn list_subdirectories(path: &Path) -> Result<Table> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("failed to read directory: {}", path.display()))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    let rows = names.into_iter().map(|n| vec![Value::Text(n)]).collect();
    Ok(Table::from_rows(vec!["0".to_string()], rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn infer_types() {
        assert_eq!(Value::infer("3"), Value::Int(3));
        assert_eq!(Value::infer("2.5"), Value::Float(2.5));
        assert_eq!(Value::infer("True"), Value::Bool(true));
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("inf"), Value::Text("inf".into()));
        assert_eq!(Value::infer("sub-01"), Value::Text("sub-01".into()));
    }

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::Text("2".into()));
        assert_eq!(Value::Null.sort_cmp(&Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn csv_round_trip_keeps_bool_text() {
        let csv = "ezqcid,age,ok,notes\nsub-01,31,True,\nsub-02,45.5,False,redo\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.get(0, "age"), Some(&Value::Int(31)));
        assert_eq!(table.get(0, "notes"), Some(&Value::Null));
        assert!(table.is_numeric_column(1));
        assert!(!table.is_numeric_column(2));
        assert_eq!(table.to_csv_string().unwrap(), csv);
    }

    #[test]
    fn subject_ids_keep_leading_zeros() {
        let csv = "ezqcid,age,code\n001,30,007\n002,41,\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.subject_ids(), vec!["001", "002"]);
        assert_eq!(table.get(0, ID_COLUMN), Some(&Value::from("001")));
        assert_eq!(table.get(0, "code"), Some(&Value::Int(7)));
        assert_eq!(table.find_subject("001"), Some(0));
        assert_eq!(table.to_csv_string().unwrap(), "ezqcid,age,code\n001,30,7\n002,41,\n");

        let t = Table::from_rows(cols(&["subj"]), vec![vec![Value::Int(12)], vec![Value::Null]]);
        let t = with_id_column(t, "subj").unwrap();
        assert_eq!(t.get(0, ID_COLUMN), Some(&Value::from("12")));
        assert_eq!(t.get(1, ID_COLUMN), Some(&Value::Null));
    }

    #[test]
    fn short_rows_are_padded() {
        let table = Table::from_csv_reader("a,b,c\n1,2\n".as_bytes()).unwrap();
        assert_eq!(table.get(0, "c"), Some(&Value::Null));
    }

    #[test]
    fn words_split_on_separators() {
        let t = words_table("s1, s2\ns3  s4,");
        assert_eq!(t.columns(), &["0"]);
        assert_eq!(t.height(), 4);
        assert_eq!(t.get(3, "0"), Some(&Value::from("s4")));
    }

    #[test]
    fn id_and_batch_columns() {
        let t = Table::from_rows(cols(&["subj"]), vec![vec!["a".into()], vec!["b".into()]]);
        let t = with_id_column(t, "subj").unwrap();
        assert_eq!(t.subject_ids(), vec!["a", "b"]);
        let t = with_batch(t, "batch1");
        assert_eq!(t.get(1, BATCH_COLUMN), Some(&Value::from("batch1")));
        assert!(with_id_column(Table::new(cols(&["x"])), "missing").is_err());
    }

    #[test]
    fn list_files() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("subjects.txt");
        std::fs::write(&txt, "/data/s1\n\n/data/s2\n").unwrap();
        let t = read_list(&txt).unwrap();
        assert_eq!(t.columns(), &["path"]);
        assert_eq!(t.height(), 2);

        assert!(read_list(&dir.path().join("x.xlsx")).is_err());

        std::fs::create_dir(dir.path().join("s2")).unwrap();
        std::fs::create_dir(dir.path().join("s1")).unwrap();
        let subdirs = list_subdirectories(dir.path()).unwrap();
        assert_eq!(subdirs.get(0, "0"), Some(&Value::from("s1")));
        assert_eq!(subdirs.height(), 2);
    }

    #[test]
    fn row_strings_skip_nulls() {
        let t = Table::from_rows(
            cols(&["ezqcid", "path", "age"]),
            vec![vec!["s1".into(), Value::Null, Value::Int(3)]],
        );
        let vars = t.row_strings(0);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["age"], "3");
        assert_eq!(t.find_subject("s1"), Some(0));
    }
}
