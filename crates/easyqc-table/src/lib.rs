//! easyqc-table: tables, rating aggregation, and filter queries.
//!
//! Turns the per-file rating corpus written by `easyqc-core` into
//! analysis-ready tables and slices them with a small SQL-shaped query
//! language.

pub mod aggregate;
pub mod query;
pub mod refresh;
pub mod table;

pub use aggregate::{Aggregation, JoinMode};
pub use query::{select_filter, QueryError, QueryOutcome};
pub use refresh::{ReindexWorker, Snapshot};
pub use table::{Table, Value};
