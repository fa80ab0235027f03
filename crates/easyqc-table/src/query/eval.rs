//! Statement evaluation against a [`Table`].
//!
//! Predicates use three-valued logic: a comparison involving null is
//! unknown, and only rows whose predicate is true are kept.

use std::cmp::Ordering;

use super::lexer::CmpOp;
use super::parser::{Expr, Operand, SelectItem, Statement};
use super::QueryError;
use crate::table::{Table, Value};

/// Coerce every non-numeric column to text. Nulls stay null.
pub fn stringify_non_numeric(table: &Table) -> Table {
    let text_cols: Vec<usize> = (0..table.width())
        .filter(|&c| !table.is_numeric_column(c))
        .collect();
    if text_cols.is_empty() {
        return table.clone();
    }
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let mut row = row.clone();
            for &c in &text_cols {
                if !row[c].is_null() && row[c].as_text().is_none() {
                    row[c] = Value::Text(row[c].to_text());
                }
            }
            row
        })
        .collect();
    Table::from_rows(table.columns().to_vec(), rows)
}

/// Run `stmt` against `table`.
pub fn execute(stmt: &Statement, table: &Table) -> Result<Table, QueryError> {
    let resolve = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
    };

    let mut projection = Vec::new();
    for item in &stmt.select {
        match item {
            SelectItem::All => projection.extend(0..table.width()),
            SelectItem::Column(name) => projection.push(resolve(name)?),
        }
    }
    let order: Vec<(usize, bool)> = stmt
        .order_by
        .iter()
        .map(|o| resolve(&o.column).map(|c| (c, o.descending)))
        .collect::<Result<_, _>>()?;
    let filter = match &stmt.filter {
        Some(expr) => {
            for name in expr.columns() {
                resolve(name)?;
            }
            Some(expr)
        }
        None => None,
    };

    let mut rows: Vec<&Vec<Value>> = table
        .rows()
        .iter()
        .filter(|row| filter.map_or(true, |e| eval(e, table, row) == Some(true)))
        .collect();

    if !order.is_empty() {
        rows.sort_by(|a, b| {
            for &(c, descending) in &order {
                let ord = a[c].sort_cmp(&b[c]);
                let ord = if descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    if let Some(limit) = stmt.limit {
        rows.truncate(limit);
    }

    let columns = projection
        .iter()
        .map(|&c| table.columns()[c].clone())
        .collect();
    let out = rows
        .into_iter()
        .map(|row| projection.iter().map(|&c| row[c].clone()).collect())
        .collect();
    Ok(Table::from_rows(columns, out))
}

fn value<'a>(operand: &'a Operand, table: &Table, row: &'a [Value]) -> &'a Value {
    match operand {
        Operand::Literal(v) => v,
        Operand::Column(name) => table
            .column_index(name)
            .and_then(|c| row.get(c))
            .unwrap_or(&Value::Null),
        Operand::Quoted(text) => text
            .as_text()
            .and_then(|name| table.column_index(name))
            .and_then(|c| row.get(c))
            .unwrap_or(text),
    }
}

fn eval(expr: &Expr, table: &Table, row: &[Value]) -> Option<bool> {
    match expr {
        Expr::And(a, b) => match (eval(a, table, row), eval(b, table, row)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Expr::Or(a, b) => match (eval(a, table, row), eval(b, table, row)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Expr::Not(e) => eval(e, table, row).map(|b| !b),
        Expr::Compare(a, op, b) => {
            let ord = compare(value(a, table, row), value(b, table, row))?;
            Some(match op {
                CmpOp::Eq => ord == Ordering::Equal,
                CmpOp::Ne => ord != Ordering::Equal,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
            })
        }
        Expr::Like {
            operand,
            pattern,
            negated,
        } => {
            let text = value(operand, table, row);
            let pattern = value(pattern, table, row);
            if text.is_null() || pattern.is_null() {
                return None;
            }
            Some(like(&text.to_text(), &pattern.to_text()) != *negated)
        }
        Expr::InList {
            operand,
            list,
            negated,
        } => {
            let needle = value(operand, table, row);
            let mut unknown = false;
            for item in list {
                match compare(needle, value(item, table, row)) {
                    Some(Ordering::Equal) => return Some(!negated),
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            if unknown {
                None
            } else {
                Some(*negated)
            }
        }
        Expr::IsNull { operand, negated } => {
            Some(value(operand, table, row).is_null() != *negated)
        }
        Expr::Between {
            operand,
            low,
            high,
            negated,
        } => {
            let v = value(operand, table, row);
            let above = compare(v, value(low, table, row)).map(|o| o != Ordering::Less);
            let below = compare(v, value(high, table, row)).map(|o| o != Ordering::Greater);
            let inside = match (above, below) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            inside.map(|b| b != *negated)
        }
    }
}

/// Compare two cells. `None` when either is null.
///
/// Numbers compare numerically. A number and a text compare numerically when
/// the text parses as a number, otherwise as text. Anything else compares by
/// its text form, so `TRUE` matches the text `True`.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        if a.is_numeric() || b.is_numeric() {
            return x.partial_cmp(&y);
        }
    }
    Some(a.to_text().cmp(&b.to_text()))
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Text(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

/// SQL `LIKE` with `%` and `_`, ASCII case-insensitive.
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    // Greedy matcher with backtracking to the last '%'.
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}
