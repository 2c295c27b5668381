use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    error::{CatalogError, CatalogResult},
    models::fields,
    repository::StoreError,
};

/// Query
///
/// A predicate over the documents of one entity kind. The filter builder
/// produces these and every `Repository` implementation consumes them; nothing
/// above the store ever sees SQL.
///
/// Field names are dotted paths into the stored document (`details.type`).
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches every document.
    All,
    And(Vec<Query>),
    Eq {
        field: &'static str,
        value: Value,
    },
    /// Member-of clause. On an array-valued field it matches when any element
    /// is in `values`; an empty set matches nothing.
    In {
        field: &'static str,
        values: Vec<Value>,
    },
    /// Full-text search over the kind's text fields: matches when any word of
    /// the term equals any word of those fields, case-insensitively.
    Text(String),
    OnOrAfter {
        field: &'static str,
        at: DateTime<Utc>,
    },
}

impl Query {
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Query::Eq {
            field,
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn id(id: Uuid) -> Self {
        Query::eq(fields::ID, id.to_string())
    }

    /// Conjunction of `clauses`, collapsing the trivial cases.
    pub fn all_of(mut clauses: Vec<Query>) -> Self {
        clauses.retain(|clause| *clause != Query::All);
        match clauses.len() {
            0 => Query::All,
            1 => clauses.remove(0),
            _ => Query::And(clauses),
        }
    }
}

/// Normalised search words: lowercase, alphanumeric only.
pub fn text_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn field_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

/// Offset/limit window derived from a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    /// Rejects non-positive pages and page sizes instead of clamping them.
    pub fn new(page: i64, page_size: i64) -> CatalogResult<Self> {
        let mut invalid = Vec::new();
        if page <= 0 {
            invalid.push("page");
        }
        if page_size <= 0 {
            invalid.push("page_size");
        }
        if !invalid.is_empty() {
            return Err(CatalogError::validation(invalid));
        }

        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| CatalogError::validation(["page"]))?;

        Ok(Page {
            offset,
            limit: page_size,
        })
    }
}

/// Number of pages needed to show `total` documents.
pub fn page_count(total: u64, page_size: i64) -> CatalogResult<u64> {
    if page_size <= 0 {
        return Err(CatalogError::validation(["page_size"]));
    }
    Ok(total.div_ceil(page_size as u64))
}

/// A partial document update: top-level fields to overwrite, plus at most one
/// element appended to an array field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub set: Map<String, Value>,
    pub append: Option<(&'static str, Value)>,
}

impl Patch {
    pub fn set<T: Serialize + ?Sized>(
        mut self,
        field: &'static str,
        value: &T,
    ) -> Result<Self, StoreError> {
        self.set
            .insert(field.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn append<T: Serialize + ?Sized>(
        mut self,
        field: &'static str,
        value: &T,
    ) -> Result<Self, StoreError> {
        self.append = Some((field, serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.append.is_none()
    }
}
