//! Ad-hoc filter queries over a table.
//!
//! Queries are shaped like `SELECT <cols> FROM df [WHERE <predicate>]
//! [ORDER BY ...] [LIMIT n]`. The select list may contain `_othervar_`,
//! which expands to every column not otherwise named.
//!
//! [`select_filter`] is the boundary used by display code: it never fails
//! and falls back to the input table on any error. [`query`] returns a
//! tagged [`QueryOutcome`] so callers can tell the two cases apart.

pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;

use crate::table::Table;
use lexer::{quote_identifier, tokenize, Keyword, TokenKind};

/// Select-list macro for "all remaining columns".
pub const OTHERVAR: &str = "_othervar_";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("syntax error at offset {pos}: {message}")]
    Lex { pos: usize, message: String },

    #[error("parse error at offset {pos}: {message}")]
    Parse { pos: usize, message: String },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// The query text is empty.
    #[error("empty query")]
    Empty,
}

/// Result of running a filter query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The query ran; the table may have zero rows.
    Applied(Table),
    /// The query failed; `table` is the unfiltered input.
    Fallback { table: Table, reason: QueryError },
}

impl QueryOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn table(&self) -> &Table {
        match self {
            Self::Applied(table) | Self::Fallback { table, .. } => table,
        }
    }

    pub fn into_table(self) -> Table {
        match self {
            Self::Applied(table) | Self::Fallback { table, .. } => table,
        }
    }
}

/// Replace `_othervar_` in the select list with the columns of `columns`
/// not named elsewhere in the list, in table order.
///
/// Queries without the macro are returned unchanged.
pub fn expand_othervar(query: &str, columns: &[String]) -> Result<String, QueryError> {
    let tokens = tokenize(query)?;
    let Some(select) = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Keyword(Keyword::Select))
    else {
        return Ok(query.to_string());
    };
    let from = tokens[select..]
        .iter()
        .position(|t| t.kind == TokenKind::Keyword(Keyword::From))
        .map_or(tokens.len(), |i| select + i);
    let list = &tokens[select + 1..from];

    let is_macro = |k: &TokenKind| matches!(k, TokenKind::Ident(name) if name == OTHERVAR);
    let Some(at) = list.iter().position(|t| is_macro(&t.kind)) else {
        return Ok(query.to_string());
    };

    let named: Vec<&str> = list
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::Ident(name) | TokenKind::QuotedIdent(name) if name != OTHERVAR => {
                Some(name.as_str())
            }
            _ => None,
        })
        .collect();
    let remaining: Vec<String> = columns
        .iter()
        .filter(|c| !named.contains(&c.as_str()))
        .map(|c| quote_identifier(c))
        .collect();

    let token = &list[at];
    let (start, end) = if !remaining.is_empty() {
        (token.start, token.end)
    } else if at > 0 && list[at - 1].kind == TokenKind::Comma {
        // `a, _othervar_` with nothing left: drop the comma too.
        (list[at - 1].start, token.end)
    } else if list.get(at + 1).is_some_and(|t| t.kind == TokenKind::Comma) {
        (token.start, list[at + 1].end)
    } else {
        (token.start, token.end)
    };

    let expanded = format!("{}{}{}", &query[..start], remaining.join(", "), &query[end..]);
    tracing::debug!("expanded {} to: {}", OTHERVAR, expanded);
    Ok(expanded)
}

/// Expand the macro, parse, and evaluate `query` against `table`.
///
/// Non-numeric columns are compared as text.
pub fn run_query(table: &Table, query: &str) -> Result<Table, QueryError> {
    if query.trim().is_empty() {
        return Err(QueryError::Empty);
    }
    let expanded = expand_othervar(query, table.columns())?;
    let statement = parser::parse(&expanded)?;
    let prepared = eval::stringify_non_numeric(table);
    eval::execute(&statement, &prepared)
}

/// Run `query`, falling back to `table` on any error.
pub fn query(table: &Table, query: &str) -> QueryOutcome {
    match run_query(table, query) {
        Ok(result) => {
            if result.is_empty() {
                tracing::info!("query matched no rows: {}", query);
            }
            QueryOutcome::Applied(result)
        }
        Err(reason) => {
            tracing::warn!("query failed, showing unfiltered table: {}", reason);
            QueryOutcome::Fallback {
                table: table.clone(),
                reason,
            }
        }
    }
}

/// Filter `table` with `query`. Never fails: errors yield `table` unchanged.
pub fn select_filter(table: &Table, query_text: &str) -> Table {
    query(table, query_text).into_table()
}
