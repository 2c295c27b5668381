use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, IdentityGateway, IdentityState},
    models::{
        Audit, Author, AuthorDetails, Definition, DefinitionCategory, ModerationStatus, Source,
        SourceDetails,
    },
    visibility::has_detail_access,
};

/// Placeholder for users the identity provider no longer knows.
pub const DELETED_USER_LABEL: &str = "<deleted>";

// --- Response schemas ---

/// PublicAudit
///
/// The only audit facts exposed to anonymous readers.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicAudit {
    pub submitted_by_name: String,
    #[ts(type = "string")]
    pub submitted_date: DateTime<Utc>,
}

/// ModerationAudit
///
/// Full audit block for owners and moderators, with names resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ModerationAudit {
    pub submitted_by: Uuid,
    pub submitted_by_name: String,
    #[ts(type = "string")]
    pub submitted_date: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_change_date: DateTime<Utc>,
    pub approved: bool,
    pub approved_by: Option<Uuid>,
    pub approved_by_name: Option<String>,
    pub approved_date: Option<DateTime<Utc>>,
    pub status: ModerationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RejectionView {
    pub id: Uuid,
    pub rejected_by: Uuid,
    pub rejected_by_name: String,
    #[ts(type = "string")]
    pub rejected_date: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub slug: String,
    #[schema(value_type = Object)]
    pub details: AuthorDetails,
    #[serde(flatten)]
    pub audit: PublicAudit,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorDetail {
    pub id: Uuid,
    pub slug: String,
    #[schema(value_type = Object)]
    pub details: AuthorDetails,
    #[serde(flatten)]
    pub audit: ModerationAudit,
}

/// AuthorView
///
/// Either projection, serialised without a wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum AuthorView {
    Detail(AuthorDetail),
    Summary(AuthorSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SourceSummary {
    pub id: Uuid,
    pub authors: Vec<Uuid>,
    #[schema(value_type = Object)]
    pub details: SourceDetails,
    #[serde(flatten)]
    pub audit: PublicAudit,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SourceDetail {
    pub id: Uuid,
    pub authors: Vec<Uuid>,
    #[schema(value_type = Object)]
    pub details: SourceDetails,
    #[serde(flatten)]
    pub audit: ModerationAudit,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum SourceView {
    Detail(SourceDetail),
    Summary(SourceSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DefinitionSummary {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: DefinitionCategory,
    pub source: Uuid,
    #[serde(flatten)]
    pub audit: PublicAudit,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DefinitionDetail {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: DefinitionCategory,
    pub source: Uuid,
    #[serde(flatten)]
    pub audit: ModerationAudit,
    pub rejection_log: Vec<RejectionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum DefinitionView {
    Detail(DefinitionDetail),
    Summary(DefinitionSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct PageCountResponse {
    pub page_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct KindStatistics {
    pub total: u64,
    /// Entries submitted since the start of the current calendar quarter (UTC).
    pub current_quarter: u64,
}

/// Statistics
///
/// Output schema of GET /statistics.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Statistics {
    pub authors: KindStatistics,
    pub sources: KindStatistics,
    pub definitions: KindStatistics,
}

// --- Projector ---

/// Per-batch display name cache. Lookups never fail: unknown or unreachable
/// users resolve to `DELETED_USER_LABEL`.
struct NameCache<'a> {
    identity: &'a dyn IdentityGateway,
    names: HashMap<Uuid, String>,
}

impl<'a> NameCache<'a> {
    fn new(identity: &'a dyn IdentityGateway) -> Self {
        Self {
            identity,
            names: HashMap::new(),
        }
    }

    async fn name(&mut self, user_id: Uuid) -> String {
        if let Some(name) = self.names.get(&user_id) {
            return name.clone();
        }
        let name = match self.identity.display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Display name lookup failed: {}", e);
                DELETED_USER_LABEL.to_string()
            }
        };
        self.names.insert(user_id, name.clone());
        name
    }

    async fn public_audit(&mut self, audit: &Audit) -> PublicAudit {
        PublicAudit {
            submitted_by_name: self.name(audit.submitted_by).await,
            submitted_date: audit.submitted_date,
        }
    }

    async fn moderation_audit(&mut self, audit: &Audit, status: ModerationStatus) -> ModerationAudit {
        let approved_by_name = match audit.approved_by {
            Some(moderator) => Some(self.name(moderator).await),
            None => None,
        };
        ModerationAudit {
            submitted_by: audit.submitted_by,
            submitted_by_name: self.name(audit.submitted_by).await,
            submitted_date: audit.submitted_date,
            last_change_date: audit.last_change_date,
            approved: audit.approved,
            approved_by: audit.approved_by,
            approved_by_name,
            approved_date: audit.approved_date,
            status,
        }
    }
}

/// Projector
///
/// Turns entities into caller-appropriate response shapes, resolving user ids
/// to display names on the way.
#[derive(Clone)]
pub struct Projector {
    identity: IdentityState,
}

impl Projector {
    pub fn new(identity: IdentityState) -> Self {
        Self { identity }
    }

    fn names(&self) -> NameCache<'_> {
        NameCache::new(self.identity.as_ref())
    }

    // --- Authors ---

    pub async fn author_detail(&self, author: Author) -> AuthorDetail {
        project_author_detail(&mut self.names(), author).await
    }

    pub async fn author(&self, author: Author, caller: Option<&AuthUser>) -> AuthorView {
        project_author(&mut self.names(), author, caller).await
    }

    pub async fn authors(&self, authors: Vec<Author>, caller: Option<&AuthUser>) -> Vec<AuthorView> {
        let mut names = self.names();
        let mut views = Vec::with_capacity(authors.len());
        for author in authors {
            views.push(project_author(&mut names, author, caller).await);
        }
        views
    }

    // --- Sources ---

    pub async fn source_detail(&self, source: Source) -> SourceDetail {
        project_source_detail(&mut self.names(), source).await
    }

    pub async fn source(&self, source: Source, caller: Option<&AuthUser>) -> SourceView {
        project_source(&mut self.names(), source, caller).await
    }

    pub async fn sources(&self, sources: Vec<Source>, caller: Option<&AuthUser>) -> Vec<SourceView> {
        let mut names = self.names();
        let mut views = Vec::with_capacity(sources.len());
        for source in sources {
            views.push(project_source(&mut names, source, caller).await);
        }
        views
    }

    // --- Definitions ---

    pub async fn definition_detail(&self, definition: Definition) -> DefinitionDetail {
        project_definition_detail(&mut self.names(), definition).await
    }

    pub async fn definition(&self, definition: Definition, caller: Option<&AuthUser>) -> DefinitionView {
        project_definition(&mut self.names(), definition, caller).await
    }

    pub async fn definitions(
        &self,
        definitions: Vec<Definition>,
        caller: Option<&AuthUser>,
    ) -> Vec<DefinitionView> {
        let mut names = self.names();
        let mut views = Vec::with_capacity(definitions.len());
        for definition in definitions {
            views.push(project_definition(&mut names, definition, caller).await);
        }
        views
    }

    /// Public projection regardless of caller.
    pub async fn definition_summaries(&self, definitions: Vec<Definition>) -> Vec<DefinitionSummary> {
        let mut names = self.names();
        let mut summaries = Vec::with_capacity(definitions.len());
        for definition in definitions {
            summaries.push(project_definition_summary(&mut names, definition).await);
        }
        summaries
    }
}

// Owners and moderators get the detailed shape, everyone else the summary.

async fn project_author(
    names: &mut NameCache<'_>,
    author: Author,
    caller: Option<&AuthUser>,
) -> AuthorView {
    if has_detail_access(&author.audit, caller) {
        return AuthorView::Detail(project_author_detail(names, author).await);
    }
    AuthorView::Summary(AuthorSummary {
        audit: names.public_audit(&author.audit).await,
        id: author.id,
        slug: author.slug,
        details: author.details,
    })
}

async fn project_source(
    names: &mut NameCache<'_>,
    source: Source,
    caller: Option<&AuthUser>,
) -> SourceView {
    if has_detail_access(&source.audit, caller) {
        return SourceView::Detail(project_source_detail(names, source).await);
    }
    SourceView::Summary(SourceSummary {
        audit: names.public_audit(&source.audit).await,
        id: source.id,
        authors: source.authors,
        details: source.details,
    })
}

async fn project_definition(
    names: &mut NameCache<'_>,
    definition: Definition,
    caller: Option<&AuthUser>,
) -> DefinitionView {
    if has_detail_access(&definition.audit, caller) {
        return DefinitionView::Detail(project_definition_detail(names, definition).await);
    }
    DefinitionView::Summary(project_definition_summary(names, definition).await)
}

async fn project_author_detail(names: &mut NameCache<'_>, author: Author) -> AuthorDetail {
    let status = ModerationStatus::derive(&author.audit, &[]);
    AuthorDetail {
        audit: names.moderation_audit(&author.audit, status).await,
        id: author.id,
        slug: author.slug,
        details: author.details,
    }
}

async fn project_source_detail(names: &mut NameCache<'_>, source: Source) -> SourceDetail {
    let status = ModerationStatus::derive(&source.audit, &[]);
    SourceDetail {
        audit: names.moderation_audit(&source.audit, status).await,
        id: source.id,
        authors: source.authors,
        details: source.details,
    }
}

async fn project_definition_summary(
    names: &mut NameCache<'_>,
    definition: Definition,
) -> DefinitionSummary {
    DefinitionSummary {
        audit: names.public_audit(&definition.audit).await,
        id: definition.id,
        title: definition.title,
        content: definition.content,
        category: definition.category,
        source: definition.source,
    }
}

async fn project_definition_detail(
    names: &mut NameCache<'_>,
    definition: Definition,
) -> DefinitionDetail {
    let status = definition.status();
    let audit = names.moderation_audit(&definition.audit, status).await;

    let mut rejection_log = Vec::with_capacity(definition.rejection_log.len());
    for rejection in definition.rejection_log {
        rejection_log.push(RejectionView {
            rejected_by_name: names.name(rejection.rejected_by).await,
            id: rejection.id,
            rejected_by: rejection.rejected_by,
            rejected_date: rejection.rejected_date,
            content: rejection.content,
        });
    }

    DefinitionDetail {
        id: definition.id,
        title: definition.title,
        content: definition.content,
        category: definition.category,
        source: definition.source,
        audit,
        rejection_log,
    }
}
