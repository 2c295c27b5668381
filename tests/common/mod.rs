#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use reference_catalog::{
    AppConfig, AppState, CatalogService, MemoryRepository,
    auth::{AuthUser, IdentityError, IdentityGateway, IdentityState, Role},
    lifecycle::LifecycleEngine,
    models::{
        Audit, Author, AuthorDetails, BookProperties, Definition, DefinitionCategory,
        OrganizationProperties, PersonProperties, Rejection, Source, SourceDetails, WebProperties,
        author_slug,
    },
    query::{Page, Patch, Query},
    repository::{EntityKind, EntityStore, Repository, RepositoryState, StoreError},
    requests::{CreateAuthorRequest, CreateDefinitionRequest, CreateSourceRequest},
};

// --- Identities ---

pub const OWNER_ID: Uuid = Uuid::from_u128(0x1001);
pub const OTHER_ID: Uuid = Uuid::from_u128(0x1002);
pub const MODERATOR_ID: Uuid = Uuid::from_u128(0x2001);
pub const ADMIN_ID: Uuid = Uuid::from_u128(0x2002);
/// Known to nobody: display name lookups for this id fail.
pub const DELETED_ID: Uuid = Uuid::from_u128(0x9999);

pub fn owner() -> AuthUser {
    AuthUser::new(OWNER_ID, vec![Role::User])
}

pub fn other_user() -> AuthUser {
    AuthUser::new(OTHER_ID, vec![Role::User])
}

pub fn moderator() -> AuthUser {
    AuthUser::new(MODERATOR_ID, vec![Role::Moderator])
}

pub fn admin() -> AuthUser {
    AuthUser::new(ADMIN_ID, vec![Role::User, Role::Admin])
}

/// StaticIdentity
///
/// Identity provider double: fixed display names and fixed bearer tokens.
#[derive(Default)]
pub struct StaticIdentity {
    names: HashMap<Uuid, String>,
    tokens: HashMap<String, AuthUser>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
            .with_name(OWNER_ID, "alice")
            .with_name(OTHER_ID, "bob")
            .with_name(MODERATOR_ID, "mod-carol")
            .with_name(ADMIN_ID, "admin-dave")
    }

    pub fn with_name(mut self, id: Uuid, name: &str) -> Self {
        self.names.insert(id, name.to_string());
        self
    }

    pub fn with_token(mut self, token: &str, user: AuthUser) -> Self {
        self.tokens.insert(token.to_string(), user);
        self
    }
}

#[async_trait]
impl IdentityGateway for StaticIdentity {
    async fn resolve_caller(&self, credential: &str) -> Result<AuthUser, IdentityError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| IdentityError::Refused("unknown token".to_string()))
    }

    async fn display_name(&self, user_id: Uuid) -> Result<String, IdentityError> {
        self.names
            .get(&user_id)
            .cloned()
            .ok_or(IdentityError::UserNotFound(user_id))
    }
}

// --- Harness ---

/// Everything a test needs, all sharing one in-memory store.
pub struct Harness {
    pub repo: Arc<MemoryRepository>,
    pub store: EntityStore,
    pub engine: LifecycleEngine,
    pub service: CatalogService,
    pub state: AppState,
}

pub fn harness() -> Harness {
    harness_with(StaticIdentity::new())
}

pub fn harness_with(identity: StaticIdentity) -> Harness {
    let repo = Arc::new(MemoryRepository::new());
    assemble(repo.clone(), repo, identity)
}

/// A harness whose engine and service talk to `wrap(store)` instead of the
/// store itself. `Harness::repo` stays the unwrapped store.
pub fn harness_wrapping<R, F>(wrap: F) -> (Harness, Arc<R>)
where
    R: Repository + 'static,
    F: FnOnce(Arc<MemoryRepository>) -> Arc<R>,
{
    let repo = Arc::new(MemoryRepository::new());
    let wrapped = wrap(repo.clone());
    (assemble(repo, wrapped.clone(), StaticIdentity::new()), wrapped)
}

fn assemble(repo: Arc<MemoryRepository>, repo_state: RepositoryState, identity: StaticIdentity) -> Harness {
    let identity: IdentityState = Arc::new(identity);
    let store = EntityStore::new(repo_state.clone());

    Harness {
        engine: LifecycleEngine::new(store.clone()),
        service: CatalogService::new(repo_state.clone(), identity.clone()),
        state: AppState {
            repo: repo_state,
            identity,
            config: AppConfig::default(),
        },
        store,
        repo,
    }
}

// --- Concurrent writers ---

/// What another writer does to a document right before our conditional write.
pub enum Interference {
    ApprovedBy(Uuid, DateTime<Utc>),
    Deleted,
}

/// InterferingRepository
///
/// Forwards to an in-memory store, but lets one armed document change under
/// the caller between its read and its `update_if_match`.
pub struct InterferingRepository {
    inner: Arc<MemoryRepository>,
    armed: Mutex<Option<(EntityKind, Uuid, Interference)>>,
}

impl InterferingRepository {
    pub fn new(inner: Arc<MemoryRepository>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
        }
    }

    /// Fires once, on the next conditional write to `kind`/`id`.
    pub fn arm(&self, kind: EntityKind, id: Uuid, interference: Interference) {
        *self.armed.lock().unwrap() = Some((kind, id, interference));
    }

    fn take_armed(&self, kind: EntityKind, id: Uuid) -> Option<Interference> {
        let mut armed = self.armed.lock().unwrap();
        match armed.as_ref() {
            Some((k, target, _)) if *k == kind && *target == id => armed.take().map(|(_, _, i)| i),
            _ => None,
        }
    }
}

#[async_trait]
impl Repository for InterferingRepository {
    async fn find(&self, kind: EntityKind, query: &Query, page: Option<Page>) -> Result<Vec<Value>, StoreError> {
        self.inner.find(kind, query, page).await
    }

    async fn find_one(&self, kind: EntityKind, query: &Query) -> Result<Option<Value>, StoreError> {
        self.inner.find_one(kind, query).await
    }

    async fn count(&self, kind: EntityKind, query: &Query) -> Result<u64, StoreError> {
        self.inner.count(kind, query).await
    }

    async fn insert(&self, kind: EntityKind, id: Uuid, document: Value) -> Result<(), StoreError> {
        self.inner.insert(kind, id, document).await
    }

    async fn update_if_match(
        &self,
        kind: EntityKind,
        id: Uuid,
        predicate: &Query,
        patch: &Patch,
    ) -> Result<u64, StoreError> {
        match self.take_armed(kind, id) {
            Some(Interference::ApprovedBy(moderator, at)) => {
                let approval = Audit::approval_patch(moderator, at)?;
                self.inner.update_if_match(kind, id, &Query::All, &approval).await?;
            }
            Some(Interference::Deleted) => {
                self.inner.delete(kind, id).await?;
            }
            None => {}
        }
        self.inner.update_if_match(kind, id, predicate, patch).await
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete(kind, id).await
    }
}

// --- Fixture data ---

pub fn person(first: &str, last: &str) -> AuthorDetails {
    AuthorDetails::Person(PersonProperties {
        first_name: first.to_string(),
        last_name: last.to_string(),
    })
}

pub fn organization(name: &str) -> AuthorDetails {
    AuthorDetails::Organization(OrganizationProperties {
        organization_name: name.to_string(),
    })
}

pub fn book(title: &str) -> SourceDetails {
    SourceDetails::Book(BookProperties {
        title: title.to_string(),
        publisher: Some("Academic Press".to_string()),
        pages_from: Some(10),
        pages_to: Some(42),
        ..Default::default()
    })
}

pub fn web(article: &str, url: &str) -> SourceDetails {
    SourceDetails::Web(WebProperties {
        article_name: article.to_string(),
        url: url.to_string(),
        website_name: "Example Wiki".to_string(),
        access_date: fixed_time(2024, 3, 1),
        publication_date: None,
    })
}

pub fn fixed_time(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn author_request(details: AuthorDetails) -> CreateAuthorRequest {
    CreateAuthorRequest { details }
}

pub fn source_request(authors: &[Uuid], details: SourceDetails) -> CreateSourceRequest {
    CreateSourceRequest {
        authors: authors.iter().map(Uuid::to_string).collect(),
        details,
    }
}

pub fn definition_request(title: &str, content: &str, source: Uuid) -> CreateDefinitionRequest {
    CreateDefinitionRequest {
        title: title.to_string(),
        content: content.to_string(),
        category: DefinitionCategory::HumanIntelligence,
        source: source.to_string(),
    }
}

// --- Submissions through the lifecycle engine ---

pub async fn submit_author(h: &Harness, caller: &AuthUser, details: AuthorDetails) -> Author {
    h.engine
        .submit_author(caller, author_request(details))
        .await
        .expect("author submission should succeed")
}

pub async fn submit_source(h: &Harness, caller: &AuthUser, authors: &[Uuid]) -> Source {
    h.engine
        .submit_source(caller, source_request(authors, book("Computing Machinery and Intelligence")))
        .await
        .expect("source submission should succeed")
}

pub async fn submit_definition(h: &Harness, caller: &AuthUser, source: Uuid) -> Definition {
    h.engine
        .submit_definition(caller, definition_request("Intelligence", "The ability to learn from experience.", source))
        .await
        .expect("definition submission should succeed")
}

/// A1 -> S1 -> D1, all submitted by `caller` and pending.
pub async fn submit_chain(h: &Harness, caller: &AuthUser) -> (Author, Source, Definition) {
    let author = submit_author(h, caller, person("Alan", "Turing")).await;
    let source = submit_source(h, caller, &[author.id]).await;
    let definition = submit_definition(h, caller, source.id).await;
    (author, source, definition)
}

// --- Direct seeding with controlled audit fields ---

pub fn audit_at(owner: Uuid, at: DateTime<Utc>, approved_by: Option<Uuid>) -> Audit {
    let mut audit = Audit::submitted(owner, at);
    if let Some(moderator) = approved_by {
        audit.mark_approved(moderator, at + Duration::hours(1));
    }
    audit
}

pub async fn seed_author(h: &Harness, details: AuthorDetails, audit: Audit) -> Author {
    let id = Uuid::new_v4();
    let author = Author {
        id,
        slug: author_slug(&details, id),
        audit,
        details,
    };
    h.store.insert(&author).await.expect("seed author");
    author
}

pub async fn seed_source(
    h: &Harness,
    authors: &[Uuid],
    details: SourceDetails,
    audit: Audit,
) -> Source {
    let source = Source {
        id: Uuid::new_v4(),
        audit,
        authors: authors.to_vec(),
        details,
    };
    h.store.insert(&source).await.expect("seed source");
    source
}

pub async fn seed_definition(
    h: &Harness,
    title: &str,
    content: &str,
    source: Uuid,
    audit: Audit,
    rejection_log: Vec<Rejection>,
) -> Definition {
    let definition = Definition {
        id: Uuid::new_v4(),
        audit,
        title: title.to_string(),
        content: content.to_string(),
        category: DefinitionCategory::HumanIntelligence,
        source,
        rejection_log,
    };
    h.store.insert(&definition).await.expect("seed definition");
    definition
}

pub fn rejection(by: Uuid, at: DateTime<Utc>, reason: &str) -> Rejection {
    Rejection {
        id: Uuid::new_v4(),
        rejected_by: by,
        rejected_date: at,
        content: reason.to_string(),
    }
}
