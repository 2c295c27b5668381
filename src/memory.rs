use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::fields;
use crate::query::{Page, Patch, Query, text_words};
use crate::repository::{EntityKind, Repository, StoreError};

/// MemoryRepository
///
/// In-process Entity Store evaluating the same query language as
/// `PostgresRepository`. Backs local development without a database and the
/// whole test suite.
#[derive(Default)]
pub struct MemoryRepository {
    collections: RwLock<HashMap<EntityKind, HashMap<Uuid, Value>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lookup<'a>(document: &'a Value, field: &str) -> Option<&'a Value> {
    field
        .split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

fn timestamp(document: &Value, field: &str) -> Option<DateTime<Utc>> {
    lookup(document, field)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
}

fn matches(kind: EntityKind, document: &Value, query: &Query) -> bool {
    match query {
        Query::All => true,
        Query::And(clauses) => clauses.iter().all(|clause| matches(kind, document, clause)),
        Query::Eq { field, value } => lookup(document, field).unwrap_or(&Value::Null) == value,
        Query::In { field, values } => match lookup(document, field) {
            Some(Value::Array(items)) => items.iter().any(|item| values.contains(item)),
            Some(value) => values.contains(value),
            None => false,
        },
        Query::Text(term) => {
            let wanted: HashSet<String> = text_words(term).into_iter().collect();
            kind.text_fields()
                .iter()
                .filter_map(|field| lookup(document, field).and_then(Value::as_str))
                .flat_map(text_words)
                .any(|word| wanted.contains(&word))
        }
        Query::OnOrAfter { field, at } => timestamp(document, field).is_some_and(|ts| ts >= *at),
    }
}

fn apply_patch(document: &mut Value, patch: &Patch) {
    let Some(object) = document.as_object_mut() else {
        return;
    };
    for (key, value) in &patch.set {
        object.insert(key.clone(), value.clone());
    }
    if let Some((field, element)) = &patch.append {
        let entry = object
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(element.clone()),
            other => *other = Value::Array(vec![element.clone()]),
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find(
        &self,
        kind: EntityKind,
        query: &Query,
        page: Option<Page>,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&kind) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<(&Uuid, &Value)> = collection
            .iter()
            .filter(|(_, document)| matches(kind, document, query))
            .collect();
        hits.sort_by_key(|(id, document)| (Reverse(timestamp(document, fields::SUBMITTED_DATE)), **id));

        let (skip, take) = match page {
            Some(page) => (page.offset.max(0) as usize, page.limit.max(0) as usize),
            None => (0, usize::MAX),
        };

        Ok(hits
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(_, document)| document.clone())
            .collect())
    }

    async fn find_one(&self, kind: EntityKind, query: &Query) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).and_then(|collection| {
            collection
                .values()
                .find(|document| matches(kind, document, query))
                .cloned()
        }))
    }

    async fn count(&self, kind: EntityKind, query: &Query) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).map_or(0, |collection| {
            collection
                .values()
                .filter(|document| matches(kind, document, query))
                .count() as u64
        }))
    }

    async fn insert(&self, kind: EntityKind, id: Uuid, document: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(kind).or_default();
        if collection.contains_key(&id) {
            return Err(StoreError::Duplicate { kind, id });
        }
        collection.insert(id, document);
        Ok(())
    }

    async fn update_if_match(
        &self,
        kind: EntityKind,
        id: Uuid,
        predicate: &Query,
        patch: &Patch,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections.get_mut(&kind).and_then(|c| c.get_mut(&id)) else {
            return Ok(0);
        };
        if !matches(kind, document, predicate) {
            return Ok(0);
        }
        apply_patch(document, patch);
        Ok(1)
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(&kind)
            .and_then(|collection| collection.remove(&id));
        Ok(removed.map_or(0, |_| 1))
    }
}
