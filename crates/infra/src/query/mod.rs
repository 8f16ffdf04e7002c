//! Dynamic filter/sort/pagination engine shared by every entity store.
//!
//! Callers hand in untrusted field names. A [`QuerySchema`] checks each of
//! them against the entity's allow-lists and produces a [`QueryPlan`], which
//! the stores then render either as SQL ([`sql`]) or as an in-memory
//! predicate and comparator ([`record`]).

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use warden_core::{FieldViolations, ServiceError, ServiceResult};

pub mod record;
pub mod sql;

pub use record::{FieldRef, Record};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Column every plan falls back to when no sort was requested.
pub const DEFAULT_SORT_FIELD: &str = "created_at";

/// Final tie-breaker, so equal sort keys still page deterministically.
pub const TIE_BREAK_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Substring match.
    Text,
    /// Equality on `true` / `false`.
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `+field`, `-field` or a bare `field` (ascending).
    ///
    /// Returns `None` for an empty token.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let key = if let Some(field) = token.strip_prefix('-') {
            Self::desc(field)
        } else if let Some(field) = token.strip_prefix('+') {
            Self::asc(field)
        } else {
            Self::asc(token)
        };
        (!key.field.is_empty()).then_some(key)
    }
}

/// Caller-supplied query, not yet checked against any allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub sorts: Vec<SortKey>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
}

impl QueryRequest {
    /// Build a request from flat query-string pairs.
    ///
    /// `sort` takes a comma-separated list of sort tokens, `page` and
    /// `per_page` take integers, and every other key becomes a filter.
    pub fn from_pairs<I, K, V>(pairs: I) -> ServiceResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        let mut v = FieldViolations::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "sort" => request
                    .sorts
                    .extend(value.split(',').filter_map(SortKey::parse)),
                "page" => match parse_saturating(value) {
                    Some(page) => request.page = page,
                    None => v.add("page", "must be a non-negative integer"),
                },
                "per_page" => match parse_saturating(value) {
                    Some(per_page) => request.per_page = per_page,
                    None => v.add("per_page", "must be a non-negative integer"),
                },
                _ => {
                    request
                        .filters
                        .insert(key.to_string(), FilterValue::Text(value.to_string()));
                }
            }
        }

        v.into_result().map(|()| request)
    }
}

/// Oversized paging values saturate and are clamped later by the plan.
fn parse_saturating(value: &str) -> Option<u32> {
    value
        .parse::<u64>()
        .ok()
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterField {
    pub name: String,
    pub kind: FieldKind,
}

impl FilterField {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
        }
    }

    pub fn boolean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Bool,
        }
    }
}

/// Allow-lists for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySchema {
    pub entity: String,
    pub filterable: Vec<FilterField>,
    pub sortable: Vec<String>,
    pub max_per_page: u32,
}

/// One validated filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-sensitive substring match.
    Contains { field: String, needle: String },
    Equals { field: String, value: bool },
}

/// A query that has passed the allow-lists and been paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub predicates: Vec<Predicate>,
    /// Requested sort keys followed by the id tie-breaker.
    pub order: Vec<SortKey>,
    pub limit: i64,
    pub offset: i64,
    pub page: u32,
    pub per_page: u32,
}

impl QuerySchema {
    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.iter().any(|s| s == field)
    }

    fn filter_kind(&self, field: &str) -> Option<FieldKind> {
        self.filterable.iter().find(|f| f.name == field).map(|f| f.kind)
    }

    /// Check a request against the allow-lists and resolve paging.
    pub fn plan(&self, request: &QueryRequest) -> ServiceResult<QueryPlan> {
        let mut predicates = Vec::with_capacity(request.filters.len());
        let mut v = FieldViolations::new();

        for (field, value) in &request.filters {
            let Some(kind) = self.filter_kind(field) else {
                tracing::debug!(entity = %self.entity, field = %field, "filter field rejected");
                return Err(ServiceError::QueryFieldNotAllowed(field.clone()));
            };
            match (kind, value) {
                (FieldKind::Text, FilterValue::Text(needle)) => predicates.push(Predicate::Contains {
                    field: field.clone(),
                    needle: needle.clone(),
                }),
                (FieldKind::Bool, FilterValue::Bool(value)) => predicates.push(Predicate::Equals {
                    field: field.clone(),
                    value: *value,
                }),
                (FieldKind::Bool, FilterValue::Text(raw)) => match raw.as_str() {
                    "true" => predicates.push(Predicate::Equals {
                        field: field.clone(),
                        value: true,
                    }),
                    "false" => predicates.push(Predicate::Equals {
                        field: field.clone(),
                        value: false,
                    }),
                    _ => v.add(field.as_str(), "must be true or false"),
                },
                (FieldKind::Text, FilterValue::Bool(_)) => v.add(field.as_str(), "must be a string"),
            }
        }

        let mut order = Vec::with_capacity(request.sorts.len() + 1);
        for key in &request.sorts {
            if !self.is_sortable(&key.field) {
                tracing::debug!(entity = %self.entity, field = %key.field, "sort field rejected");
                return Err(ServiceError::QueryFieldNotAllowed(key.field.clone()));
            }
            if !order.iter().any(|k: &SortKey| k.field == key.field) {
                order.push(key.clone());
            }
        }
        v.into_result()?;

        if order.is_empty() {
            order.push(SortKey::desc(DEFAULT_SORT_FIELD));
        }
        order.push(SortKey::asc(TIE_BREAK_FIELD));

        let page = request.page.max(1);
        let per_page = match request.per_page {
            0 => DEFAULT_PER_PAGE.min(self.max_per_page),
            n => n.min(self.max_per_page),
        };
        let limit = i64::from(per_page);
        let offset = limit * (i64::from(page) - 1);

        Ok(QueryPlan {
            predicates,
            order,
            limit,
            offset,
            page,
            per_page,
        })
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, plan: &QueryPlan) -> Self {
        let seen = plan.offset as u64 + items.len() as u64;
        Self {
            has_more: seen < total,
            items,
            total,
            page: plan.page,
            per_page: plan.per_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            has_more: self.has_more,
        }
    }
}

/// Run the row fetch and the count side by side and combine them.
///
/// Fails as soon as either side fails; the other result is dropped.
pub async fn run_query<T, E, R, C>(plan: &QueryPlan, rows: R, count: C) -> ServiceResult<Page<T>>
where
    R: Future<Output = Result<Vec<T>, E>>,
    C: Future<Output = Result<u64, E>>,
    E: Into<ServiceError>,
{
    let (items, total) = tokio::try_join!(rows, count).map_err(Into::into)?;
    Ok(Page::new(items, total, plan))
}
