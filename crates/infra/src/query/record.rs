//! In-memory evaluation of a [`QueryPlan`].

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use warden_auth::{Action, Role, User};

use super::{Predicate, QueryPlan, SortDirection};

/// Borrowed view of one queryable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    Text(&'a str),
    Bool(bool),
    Time(DateTime<Utc>),
    Id(Uuid),
}

impl FieldRef<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Id(a), Self::Id(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// A row the in-memory store can filter and sort by column name.
pub trait Record {
    fn field(&self, name: &str) -> Option<FieldRef<'_>>;
}

impl QueryPlan {
    pub fn matches<R: Record>(&self, row: &R) -> bool {
        self.predicates.iter().all(|p| match p {
            Predicate::Contains { field, needle } => {
                matches!(row.field(field), Some(FieldRef::Text(v)) if v.contains(needle.as_str()))
            }
            Predicate::Equals { field, value } => {
                matches!(row.field(field), Some(FieldRef::Bool(v)) if v == *value)
            }
        })
    }

    pub fn compare<R: Record>(&self, a: &R, b: &R) -> Ordering {
        for key in &self.order {
            let ord = match (a.field(&key.field), b.field(&key.field)) {
                (Some(x), Some(y)) => x.compare(&y),
                _ => Ordering::Equal,
            };
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Filter, sort and page `rows`, returning the page and the total match
    /// count.
    pub fn apply<'a, R, I>(&self, rows: I) -> (Vec<R>, u64)
    where
        R: Record + Clone + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut hits: Vec<&R> = rows.into_iter().filter(|r| self.matches(*r)).collect();
        hits.sort_by(|a, b| self.compare(*a, *b));
        let total = hits.len() as u64;
        let page = hits
            .into_iter()
            .skip(self.offset.max(0) as usize)
            .take(self.limit.max(0) as usize)
            .cloned()
            .collect();
        (page, total)
    }
}

impl Record for User {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        Some(match name {
            "id" => FieldRef::Id(*self.id.as_uuid()),
            "full_name" => FieldRef::Text(&self.full_name),
            "username" => FieldRef::Text(&self.username),
            "email" => FieldRef::Text(&self.email),
            "active" => FieldRef::Bool(self.active),
            "verified" => FieldRef::Bool(self.verified),
            "created_at" => FieldRef::Time(self.created_at),
            "updated_at" => FieldRef::Time(self.updated_at),
            _ => return None,
        })
    }
}

impl Record for Role {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        Some(match name {
            "id" => FieldRef::Id(*self.id.as_uuid()),
            "name" => FieldRef::Text(&self.name),
            "description" => FieldRef::Text(&self.description),
            "active" => FieldRef::Bool(self.active),
            "created_at" => FieldRef::Time(self.created_at),
            "updated_at" => FieldRef::Time(self.updated_at),
            _ => return None,
        })
    }
}

impl Record for Action {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        Some(match name {
            "id" => FieldRef::Id(*self.id.as_uuid()),
            "name" => FieldRef::Text(&self.name),
            "description" => FieldRef::Text(&self.description),
            "active" => FieldRef::Bool(self.active),
            "created_at" => FieldRef::Time(self.created_at),
            "updated_at" => FieldRef::Time(self.updated_at),
            _ => return None,
        })
    }
}
