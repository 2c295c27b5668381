use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{CatalogError, CatalogResult},
    models::{
        Audit, Author, Definition, Rejection, Source, author_slug, fields, latest_rejection,
        parse_id, parse_ids, require_text,
    },
    query::{Patch, Query},
    repository::{Document, EntityKind, EntityStore},
    requests::{
        ChangeAuthorRequest, ChangeDefinitionRequest, ChangeSourceRequest, CreateAuthorRequest,
        CreateDefinitionRequest, CreateSourceRequest,
    },
};

/// LifecycleEngine
///
/// Submit, approve, reject, edit and delete. Every precondition is checked
/// against a fresh read before the mutating store call. Writes that flip or
/// depend on the approval state are conditional on `approved = false`, so a
/// concurrent approval surfaces as `AlreadyApproved` instead of being overwritten.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: EntityStore,
}

impl LifecycleEngine {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    // --- Submit ---

    pub async fn submit_author(
        &self,
        caller: &AuthUser,
        request: CreateAuthorRequest,
    ) -> CatalogResult<Author> {
        let invalid = request.details.validate();
        if !invalid.is_empty() {
            return Err(CatalogError::ValidationFailed { fields: invalid });
        }

        let id = Uuid::new_v4();
        let author = Author {
            id,
            slug: author_slug(&request.details, id),
            audit: Audit::submitted(caller.id, Utc::now()),
            details: request.details,
        };
        self.store.insert(&author).await?;

        tracing::info!(author_id = %id, caller = %caller.id, "Author submitted");
        Ok(author)
    }

    pub async fn submit_source(
        &self,
        caller: &AuthUser,
        request: CreateSourceRequest,
    ) -> CatalogResult<Source> {
        let mut invalid = request.details.validate();
        if request.authors.is_empty() {
            invalid.push("authors".to_string());
        }
        if !invalid.is_empty() {
            return Err(CatalogError::ValidationFailed { fields: invalid });
        }

        let authors = parse_ids(&request.authors)?;
        for author_id in &authors {
            self.store.ensure_exists::<Author>(*author_id).await?;
        }

        let source = Source {
            id: Uuid::new_v4(),
            audit: Audit::submitted(caller.id, Utc::now()),
            authors,
            details: request.details,
        };
        self.store.insert(&source).await?;

        tracing::info!(source_id = %source.id, caller = %caller.id, "Source submitted");
        Ok(source)
    }

    pub async fn submit_definition(
        &self,
        caller: &AuthUser,
        request: CreateDefinitionRequest,
    ) -> CatalogResult<Definition> {
        let mut invalid = Vec::new();
        require_text(&mut invalid, "title", &request.title);
        require_text(&mut invalid, "content", &request.content);
        if !invalid.is_empty() {
            return Err(CatalogError::ValidationFailed { fields: invalid });
        }

        let source = parse_id(&request.source)?;
        self.store.ensure_exists::<Source>(source).await?;

        let definition = Definition {
            id: Uuid::new_v4(),
            audit: Audit::submitted(caller.id, Utc::now()),
            title: request.title,
            content: request.content,
            category: request.category,
            source,
            rejection_log: Vec::new(),
        };
        self.store.insert(&definition).await?;

        tracing::info!(definition_id = %definition.id, caller = %caller.id, "Definition submitted");
        Ok(definition)
    }

    // --- Approve ---

    /// Approves a definition after its source and that source's authors.
    ///
    /// Ancestors are approved child-first, so a failure part-way through never
    /// leaves an approved entity over unapproved dependencies. Ancestors that
    /// are already approved keep their existing audit fields.
    pub async fn approve_definition(&self, caller: &AuthUser, id: Uuid) -> CatalogResult<Definition> {
        require_moderator(caller)?;

        let mut definition: Definition = self.store.get(id).await?;
        if definition.audit.approved {
            return Err(CatalogError::AlreadyApproved {
                kind: EntityKind::Definition,
                id,
            });
        }

        tolerate_approved(self.approve_source(caller, definition.source).await)?;
        let at = Utc::now();
        self.flip_approved::<Definition>(id, caller.id, at).await?;

        definition.audit.mark_approved(caller.id, at);
        Ok(definition)
    }

    async fn approve_source(&self, caller: &AuthUser, id: Uuid) -> CatalogResult<()> {
        let source: Source = self.store.get(id).await?;
        if source.audit.approved {
            return Err(CatalogError::AlreadyApproved {
                kind: EntityKind::Source,
                id,
            });
        }

        for author_id in &source.authors {
            tolerate_approved(self.approve_author(caller, *author_id).await)?;
        }
        self.flip_approved::<Source>(id, caller.id, Utc::now()).await
    }

    async fn approve_author(&self, caller: &AuthUser, id: Uuid) -> CatalogResult<()> {
        let author: Author = self.store.get(id).await?;
        if author.audit.approved {
            return Err(CatalogError::AlreadyApproved {
                kind: EntityKind::Author,
                id,
            });
        }
        self.flip_approved::<Author>(id, caller.id, Utc::now()).await
    }

    /// Conditional `approved = false -> true` write. Zero matches means someone
    /// else got there first, or the document is gone: a re-read tells them apart.
    async fn flip_approved<T: Document>(
        &self,
        id: Uuid,
        moderator: Uuid,
        at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        let patch = Audit::approval_patch(moderator, at)?;
        let matched = self
            .store
            .update_if_match::<T>(id, &Query::eq(fields::APPROVED, false), &patch)
            .await?;
        if matched == 0 {
            self.store.ensure_exists::<T>(id).await?;
            return Err(CatalogError::AlreadyApproved { kind: T::KIND, id });
        }

        tracing::info!(kind = %T::KIND, id = %id, moderator = %moderator, "Approved");
        Ok(())
    }

    // --- Reject ---

    pub async fn reject_definition(
        &self,
        caller: &AuthUser,
        id: Uuid,
        reason: &str,
    ) -> CatalogResult<Definition> {
        require_moderator(caller)?;
        if reason.trim().is_empty() {
            return Err(CatalogError::validation(["reason"]));
        }

        let definition: Definition = self.store.get(id).await?;
        if definition.audit.approved {
            return Err(CatalogError::AlreadyApproved {
                kind: EntityKind::Definition,
                id,
            });
        }
        if let Some(latest) = latest_rejection(&definition.rejection_log) {
            if latest > definition.audit.last_change_date {
                return Err(CatalogError::UnansweredRejection { id });
            }
        }

        let rejection = Rejection {
            id: Uuid::new_v4(),
            rejected_by: caller.id,
            rejected_date: Utc::now(),
            content: reason.to_string(),
        };
        let patch = Patch::default().append(fields::REJECTION_LOG, &rejection)?;
        let matched = self
            .store
            .update_if_match::<Definition>(id, &Query::eq(fields::APPROVED, false), &patch)
            .await?;
        if matched == 0 {
            return Err(CatalogError::AlreadyApproved {
                kind: EntityKind::Definition,
                id,
            });
        }

        tracing::info!(definition_id = %id, moderator = %caller.id, rejection_id = %rejection.id, "Definition rejected");
        self.store.get(id).await
    }

    // --- Edit ---

    pub async fn edit_definition(
        &self,
        caller: &AuthUser,
        id: Uuid,
        request: ChangeDefinitionRequest,
    ) -> CatalogResult<Definition> {
        let definition: Definition = self.store.get(id).await?;
        ensure_editable(&definition, caller)?;

        let mut invalid = Vec::new();
        let mut patch = Patch::default();

        if let Some(title) = request.title.filter(|t| *t != definition.title) {
            require_text(&mut invalid, "title", &title);
            patch = patch.set(fields::TITLE, &title)?;
        }
        if let Some(content) = request.content.filter(|c| *c != definition.content) {
            require_text(&mut invalid, "content", &content);
            patch = patch.set(fields::CONTENT, &content)?;
        }
        if let Some(category) = request.category.filter(|c| *c != definition.category) {
            patch = patch.set(fields::CATEGORY, &category)?;
        }
        if !invalid.is_empty() {
            return Err(CatalogError::ValidationFailed { fields: invalid });
        }
        if let Some(raw) = request.source {
            let source = parse_id(&raw)?;
            if source != definition.source {
                self.store.ensure_exists::<Source>(source).await?;
                patch = patch.set(fields::SOURCE, &source)?;
            }
        }

        self.commit_edit(definition, caller, patch).await
    }

    pub async fn edit_author(
        &self,
        caller: &AuthUser,
        id: Uuid,
        request: ChangeAuthorRequest,
    ) -> CatalogResult<Author> {
        let author: Author = self.store.get(id).await?;
        ensure_editable(&author, caller)?;

        let details = request.apply(&author.details)?;
        let mut patch = Patch::default();
        if details != author.details {
            patch = patch
                .set(fields::SLUG, &author_slug(&details, id))?
                .set(fields::DETAILS, &details)?;
        }

        self.commit_edit(author, caller, patch).await
    }

    pub async fn edit_source(
        &self,
        caller: &AuthUser,
        id: Uuid,
        request: ChangeSourceRequest,
    ) -> CatalogResult<Source> {
        let source: Source = self.store.get(id).await?;
        ensure_editable(&source, caller)?;

        let details = request.apply(&source.details)?;
        let mut patch = Patch::default();
        if details != source.details {
            patch = patch.set(fields::DETAILS, &details)?;
        }

        if let Some(raw) = &request.authors {
            if raw.is_empty() {
                return Err(CatalogError::validation(["authors"]));
            }
            let authors = parse_ids(raw)?;
            if authors != source.authors {
                for author_id in &authors {
                    self.store.ensure_exists::<Author>(*author_id).await?;
                }
                patch = patch.set(fields::AUTHORS, &authors)?;
            }
        }

        self.commit_edit(source, caller, patch).await
    }

    /// Writes an edit patch, bumping `last_change_date`. An empty patch is a
    /// no-op and hands back the unchanged entity.
    async fn commit_edit<T: Document>(
        &self,
        current: T,
        caller: &AuthUser,
        patch: Patch,
    ) -> CatalogResult<T> {
        if patch.is_empty() {
            tracing::debug!(kind = %T::KIND, id = %current.id(), "Edit without changes");
            return Ok(current);
        }

        let id = current.id();
        let patch = patch.set(fields::LAST_CHANGE_DATE, &Utc::now())?;
        let guard = Query::all_of(vec![
            Query::eq(fields::APPROVED, false),
            Query::eq(fields::SUBMITTED_BY, caller.id.to_string()),
        ]);
        let matched = self.store.update_if_match::<T>(id, &guard, &patch).await?;
        if matched == 0 {
            // Ownership is immutable, so only a concurrent approval can get here.
            return Err(CatalogError::AlreadyApproved { kind: T::KIND, id });
        }

        tracing::info!(kind = %T::KIND, id = %id, caller = %caller.id, "Edited");
        self.store.get(id).await
    }

    // --- Delete ---

    /// Removes an author no source references. `InUse` carries every blocking source id.
    pub async fn delete_author(&self, caller: &AuthUser, id: Uuid) -> CatalogResult<()> {
        require_moderator(caller)?;

        let sources: Vec<Source> = self
            .store
            .find(&Query::is_in(fields::AUTHORS, [id.to_string()]), None)
            .await?;
        if !sources.is_empty() {
            return Err(CatalogError::InUse {
                kind: EntityKind::Author,
                id,
                blocking: sources.iter().map(|s| s.id).collect(),
            });
        }

        self.remove::<Author>(caller, id).await
    }

    /// Removes a source no definition references. `InUse` carries every blocking definition id.
    pub async fn delete_source(&self, caller: &AuthUser, id: Uuid) -> CatalogResult<()> {
        require_moderator(caller)?;

        let definitions: Vec<Definition> = self
            .store
            .find(&Query::eq(fields::SOURCE, id.to_string()), None)
            .await?;
        if !definitions.is_empty() {
            return Err(CatalogError::InUse {
                kind: EntityKind::Source,
                id,
                blocking: definitions.iter().map(|d| d.id).collect(),
            });
        }

        self.remove::<Source>(caller, id).await
    }

    async fn remove<T: Document>(&self, caller: &AuthUser, id: Uuid) -> CatalogResult<()> {
        if self.store.delete::<T>(id).await? == 0 {
            return Err(CatalogError::NotFound { kind: T::KIND, id });
        }
        tracing::info!(kind = %T::KIND, id = %id, moderator = %caller.id, "Deleted");
        Ok(())
    }
}

fn require_moderator(caller: &AuthUser) -> CatalogResult<()> {
    if caller.is_moderator() {
        Ok(())
    } else {
        Err(CatalogError::InsufficientRole)
    }
}

fn ensure_editable<T: Document>(entity: &T, caller: &AuthUser) -> CatalogResult<()> {
    if entity.audit().approved {
        return Err(CatalogError::AlreadyApproved {
            kind: T::KIND,
            id: entity.id(),
        });
    }
    if entity.audit().submitted_by != caller.id {
        return Err(CatalogError::OwnershipViolation);
    }
    Ok(())
}

/// Cascade steps treat "already approved" as success.
fn tolerate_approved(result: CatalogResult<()>) -> CatalogResult<()> {
    match result {
        Err(CatalogError::AlreadyApproved { kind, id }) => {
            tracing::debug!(kind = %kind, id = %id, "Cascade target already approved");
            Ok(())
        }
        other => other,
    }
}
