//! Rendering a [`QueryPlan`] into Postgres SQL.
//!
//! Column names only ever come from an allow-list and are quoted anyway;
//! every value is a bind parameter.

use sqlx::{Postgres, QueryBuilder};

use super::{Predicate, QueryPlan, SortDirection};

/// Append `WHERE ...` for the plan's predicates. No-op without predicates.
pub fn push_where(qb: &mut QueryBuilder<'_, Postgres>, plan: &QueryPlan) {
    for (i, predicate) in plan.predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Contains { field, needle } => {
                qb.push(quote_ident(field))
                    .push(" LIKE ")
                    .push_bind(format!("%{}%", escape_like(needle)))
                    .push(" ESCAPE '\\'");
            }
            Predicate::Equals { field, value } => {
                qb.push(quote_ident(field)).push(" = ").push_bind(*value);
            }
        }
    }
}

/// Append `ORDER BY ... LIMIT ... OFFSET ...`.
pub fn push_order_and_page(qb: &mut QueryBuilder<'_, Postgres>, plan: &QueryPlan) {
    for (i, key) in plan.order.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(quote_ident(&key.field));
        qb.push(match key.direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        });
    }
    qb.push(" LIMIT ").push_bind(plan.limit);
    qb.push(" OFFSET ").push_bind(plan.offset);
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape `LIKE` metacharacters so the needle matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
