use crate::error::{CatalogError, CatalogResult};
use crate::models::{Audit, Author, Definition, Source, fields};
use crate::query::{Page, Patch, Query, field_path, text_words};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// EntityKind
///
/// One document collection per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Author,
    Source,
    Definition,
}

impl EntityKind {
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Author => "authors",
            EntityKind::Source => "sources",
            EntityKind::Definition => "definitions",
        }
    }

    /// Fields covered by `Query::Text` for this kind.
    pub fn text_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Author => &[fields::FIRST_NAME, fields::LAST_NAME, fields::ORGANIZATION_NAME],
            EntityKind::Source => &[
                fields::SOURCE_TITLE,
                fields::JOURNAL_NAME,
                fields::ARTICLE_NAME,
                fields::WEBSITE_NAME,
            ],
            EntityKind::Definition => &[fields::TITLE, fields::CONTENT],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Author => "author",
            EntityKind::Source => "source",
            EntityKind::Definition => "definition",
        })
    }
}

/// StoreError
///
/// Infrastructure failures of the Entity Store. Never a domain outcome.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("{kind} {id} already exists")]
    Duplicate { kind: EntityKind, id: Uuid },
}

/// Document
///
/// A catalog entity as stored: its collection, its id and its audit block.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn audit(&self) -> &Audit;
}

impl Document for Author {
    const KIND: EntityKind = EntityKind::Author;

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}

impl Document for Source {
    const KIND: EntityKind = EntityKind::Source;

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}

impl Document for Definition {
    const KIND: EntityKind = EntityKind::Definition;

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}

/// Repository Trait
///
/// The Entity Store contract: raw JSON documents per collection, queried with
/// the `Query` language. Listing results are ordered newest `submitted_date`
/// first so paging is stable across implementations.
///
/// **Send + Sync + async_trait** keep the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find(
        &self,
        kind: EntityKind,
        query: &Query,
        page: Option<Page>,
    ) -> Result<Vec<Value>, StoreError>;
    async fn find_one(&self, kind: EntityKind, query: &Query) -> Result<Option<Value>, StoreError>;
    async fn count(&self, kind: EntityKind, query: &Query) -> Result<u64, StoreError>;

    // Fails with `StoreError::Duplicate` when the id is taken.
    async fn insert(&self, kind: EntityKind, id: Uuid, document: Value) -> Result<(), StoreError>;
    // Applies `patch` only if the document `id` also satisfies `predicate`.
    // Returns the number of matched documents (0 or 1).
    async fn update_if_match(
        &self,
        kind: EntityKind,
        id: Uuid,
        predicate: &Query,
        patch: &Patch,
    ) -> Result<u64, StoreError>;
    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<u64, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL: one `(id UUID, body JSONB)` table per kind
/// (see `migrations/`), with the query language rendered to parameterised SQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct DocumentRow {
    body: Json<Value>,
}

// Field names are `fields::*` constants, so they are rendered as literals.
// That keeps each expression identical to the one its index is built on.
fn quoted(key: &str) -> String {
    format!("'{}'", key.replace('\'', "''"))
}

fn arrow_chain(keys: &[String]) -> String {
    keys.iter()
        .fold(String::from("body"), |expr, key| format!("{} -> {}", expr, quoted(key)))
}

fn json_expr(field: &str) -> String {
    arrow_chain(&field_path(field))
}

// Same path with the last step extracted as text: `body -> 'details' ->> 'type'`.
fn text_expr(field: &str) -> String {
    let path = field_path(field);
    match path.split_last() {
        Some((last, parents)) => format!("{} ->> {}", arrow_chain(parents), quoted(last)),
        None => String::from("body::text"),
    }
}

fn path_literal(field: &str) -> String {
    format!("'{{{}}}'", field_path(field).join(",").replace('\'', "''"))
}

/// The text a scalar JSON value has under `->>`. Arrays, objects and null have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_texts(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| scalar_text(v).unwrap_or_else(|| v.to_string()))
        .collect()
}

fn parse_uuid(value: &Value) -> Option<Uuid> {
    value.as_str().and_then(|raw| Uuid::parse_str(raw).ok())
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, kind: EntityKind, query: &Query) {
    match query {
        Query::All => {
            builder.push("TRUE");
        }
        Query::And(clauses) if clauses.is_empty() => {
            builder.push("TRUE");
        }
        Query::And(clauses) => {
            builder.push("(");
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                push_predicate(builder, kind, clause);
            }
            builder.push(")");
        }
        // The document id is the primary key column.
        Query::Eq { field, value } if *field == fields::ID => match parse_uuid(value) {
            Some(id) => {
                builder.push("id = ");
                builder.push_bind(id);
            }
            None => {
                builder.push("FALSE");
            }
        },
        Query::Eq { field, value } => match scalar_text(value) {
            Some(text) => {
                builder.push(format!("({}) = ", text_expr(field)));
                builder.push_bind(text);
            }
            None => {
                builder.push(format!("({}) = ", json_expr(field)));
                builder.push_bind(Json(value.clone()));
            }
        },
        Query::In { values, .. } if values.is_empty() => {
            builder.push("FALSE");
        }
        Query::In { field, values } if *field == fields::ID => {
            let ids: Vec<Uuid> = values.iter().filter_map(parse_uuid).collect();
            builder.push("id = ANY(");
            builder.push_bind(ids);
            builder.push(")");
        }
        // Array fields match on any element.
        Query::In { field, values } if fields::is_array(field) => {
            builder.push(format!("({}) ?| ", json_expr(field)));
            builder.push_bind(value_texts(values));
            builder.push("::text[]");
        }
        Query::In { field, values } => {
            builder.push(format!("({}) = ANY(", text_expr(field)));
            builder.push_bind(value_texts(values));
            builder.push("::text[])");
        }
        Query::Text(term) => {
            let words = text_words(term);
            if words.is_empty() {
                builder.push("FALSE");
                return;
            }
            builder.push("to_tsvector('simple', concat_ws(' '");
            for field in kind.text_fields() {
                builder.push(format!(", {}", text_expr(field)));
            }
            builder.push(")) @@ to_tsquery('simple', ");
            // Words are alphanumeric only, so they are safe tsquery lexemes.
            builder.push_bind(words.join(" | "));
            builder.push(")");
        }
        Query::OnOrAfter { field, at } => {
            builder.push(format!("({})::timestamptz >= ", text_expr(field)));
            builder.push_bind(*at);
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find(
        &self,
        kind: EntityKind,
        query: &Query,
        page: Option<Page>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT body FROM {} WHERE ", kind.collection()));
        push_predicate(&mut builder, kind, query);
        builder.push(format!(
            " ORDER BY ({})::timestamptz DESC, id",
            text_expr(fields::SUBMITTED_DATE)
        ));

        if let Some(page) = page {
            builder.push(" LIMIT ");
            builder.push_bind(page.limit);
            builder.push(" OFFSET ");
            builder.push_bind(page.offset);
        }

        match builder.build_query_as::<DocumentRow>().fetch_all(&self.pool).await {
            Ok(rows) => Ok(rows.into_iter().map(|row| row.body.0).collect()),
            Err(e) => {
                tracing::error!("find {} error: {:?}", kind, e);
                Err(e.into())
            }
        }
    }

    async fn find_one(&self, kind: EntityKind, query: &Query) -> Result<Option<Value>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT body FROM {} WHERE ", kind.collection()));
        push_predicate(&mut builder, kind, query);
        builder.push(" LIMIT 1");

        match builder.build_query_as::<DocumentRow>().fetch_optional(&self.pool).await {
            Ok(row) => Ok(row.map(|row| row.body.0)),
            Err(e) => {
                tracing::error!("find_one {} error: {:?}", kind, e);
                Err(e.into())
            }
        }
    }

    async fn count(&self, kind: EntityKind, query: &Query) -> Result<u64, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE ", kind.collection()));
        push_predicate(&mut builder, kind, query);

        match builder.build_query_scalar::<i64>().fetch_one(&self.pool).await {
            Ok(count) => Ok(count.max(0) as u64),
            Err(e) => {
                tracing::error!("count {} error: {:?}", kind, e);
                Err(e.into())
            }
        }
    }

    async fn insert(&self, kind: EntityKind, id: Uuid, document: Value) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO {} (id, body) VALUES ($1, $2)", kind.collection());
        match sqlx::query(&sql)
            .bind(id)
            .bind(Json(document))
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate { kind, id }),
            Err(e) => {
                tracing::error!("insert {} error: {:?}", kind, e);
                Err(e.into())
            }
        }
    }

    async fn update_if_match(
        &self,
        kind: EntityKind,
        id: Uuid,
        predicate: &Query,
        patch: &Patch,
    ) -> Result<u64, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET body = ", kind.collection()));

        let set = Json(Value::Object(patch.set.clone()));
        match &patch.append {
            None => {
                builder.push("body || ");
                builder.push_bind(set);
            }
            Some((field, element)) => {
                builder.push("jsonb_set(body || ");
                builder.push_bind(set);
                builder.push(format!(
                    ", {}, COALESCE({}, '[]'::jsonb) || ",
                    path_literal(field),
                    json_expr(field)
                ));
                builder.push_bind(Json(Value::Array(vec![element.clone()])));
                builder.push(")");
            }
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND ");
        push_predicate(&mut builder, kind, predicate);

        match builder.build().execute(&self.pool).await {
            Ok(result) => Ok(result.rows_affected()),
            Err(e) => {
                tracing::error!("update {} error: {:?}", kind, e);
                Err(e.into())
            }
        }
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.collection());
        match sqlx::query(&sql).bind(id).execute(&self.pool).await {
            Ok(result) => Ok(result.rows_affected()),
            Err(e) => {
                tracing::error!("delete {} error: {:?}", kind, e);
                Err(e.into())
            }
        }
    }
}

/// EntityStore
///
/// Typed facade over a `Repository`: (de)serialises entities and turns a
/// missing document into `CatalogError::NotFound`.
#[derive(Clone)]
pub struct EntityStore {
    repo: RepositoryState,
}

impl EntityStore {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn get<T: Document>(&self, id: Uuid) -> CatalogResult<T> {
        match self.repo.find_one(T::KIND, &Query::id(id)).await? {
            Some(document) => Ok(serde_json::from_value(document)?),
            None => Err(CatalogError::NotFound { kind: T::KIND, id }),
        }
    }

    /// Referential existence check used before writes.
    pub async fn ensure_exists<T: Document>(&self, id: Uuid) -> CatalogResult<()> {
        if self.repo.count(T::KIND, &Query::id(id)).await? == 0 {
            return Err(CatalogError::NotFound { kind: T::KIND, id });
        }
        Ok(())
    }

    pub async fn find<T: Document>(&self, query: &Query, page: Option<Page>) -> CatalogResult<Vec<T>> {
        self.repo
            .find(T::KIND, query, page)
            .await?
            .into_iter()
            .map(|document| serde_json::from_value(document).map_err(CatalogError::from))
            .collect()
    }

    pub async fn count<T: Document>(&self, query: &Query) -> CatalogResult<u64> {
        Ok(self.repo.count(T::KIND, query).await?)
    }

    pub async fn insert<T: Document>(&self, entity: &T) -> CatalogResult<()> {
        let document = serde_json::to_value(entity)?;
        Ok(self.repo.insert(T::KIND, entity.id(), document).await?)
    }

    pub async fn update_if_match<T: Document>(
        &self,
        id: Uuid,
        predicate: &Query,
        patch: &Patch,
    ) -> CatalogResult<u64> {
        Ok(self.repo.update_if_match(T::KIND, id, predicate, patch).await?)
    }

    pub async fn delete<T: Document>(&self, id: Uuid) -> CatalogResult<u64> {
        Ok(self.repo.delete(T::KIND, id).await?)
    }
}
