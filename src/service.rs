use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::{
    auth::{AuthUser, IdentityState},
    error::{CatalogError, CatalogResult},
    filters::FilterBuilder,
    lifecycle::LifecycleEngine,
    models::{Author, Definition, Source, fields, parse_id},
    projection::{
        AuthorDetail, AuthorView, DefinitionDetail, DefinitionSummary, DefinitionView,
        KindStatistics, PageCountResponse, Projector, SourceDetail, SourceView, Statistics,
    },
    query::{Page, Query, page_count},
    repository::{Document, EntityStore, RepositoryState},
    requests::{
        AuthorPageCountRequest, AuthorPageRequest, ChangeAuthorRequest, ChangeDefinitionRequest,
        ChangeSourceRequest, CreateAuthorRequest, CreateDefinitionRequest, CreateSourceRequest,
        DefinitionPageCountRequest, DefinitionPageRequest, SourcePageCountRequest,
        SourcePageRequest,
    },
    visibility::{ListingScope, authorize_listing, ensure_visible},
};

/// Number of entries returned by `newest_definitions` when no limit is given.
pub const DEFAULT_NEWEST_LIMIT: i64 = 4;

/// CatalogService
///
/// The operation surface of the catalog. Built per request from the shared
/// store and identity handles; holds no mutable state of its own.
#[derive(Clone)]
pub struct CatalogService {
    store: EntityStore,
    engine: LifecycleEngine,
    filters: FilterBuilder,
    projector: Projector,
}

impl CatalogService {
    pub fn new(repo: RepositoryState, identity: IdentityState) -> Self {
        let store = EntityStore::new(repo);
        Self {
            engine: LifecycleEngine::new(store.clone()),
            filters: FilterBuilder::new(store.clone()),
            projector: Projector::new(identity),
            store,
        }
    }

    // --- Submit ---

    pub async fn submit_author(
        &self,
        caller: &AuthUser,
        request: CreateAuthorRequest,
    ) -> CatalogResult<AuthorDetail> {
        let author = self.engine.submit_author(caller, request).await?;
        Ok(self.projector.author_detail(author).await)
    }

    pub async fn submit_source(
        &self,
        caller: &AuthUser,
        request: CreateSourceRequest,
    ) -> CatalogResult<SourceDetail> {
        let source = self.engine.submit_source(caller, request).await?;
        Ok(self.projector.source_detail(source).await)
    }

    pub async fn submit_definition(
        &self,
        caller: &AuthUser,
        request: CreateDefinitionRequest,
    ) -> CatalogResult<DefinitionDetail> {
        let definition = self.engine.submit_definition(caller, request).await?;
        Ok(self.projector.definition_detail(definition).await)
    }

    // --- Edit ---

    pub async fn edit_author(
        &self,
        caller: &AuthUser,
        id: &str,
        request: ChangeAuthorRequest,
    ) -> CatalogResult<AuthorDetail> {
        let author = self.engine.edit_author(caller, parse_id(id)?, request).await?;
        Ok(self.projector.author_detail(author).await)
    }

    pub async fn edit_source(
        &self,
        caller: &AuthUser,
        id: &str,
        request: ChangeSourceRequest,
    ) -> CatalogResult<SourceDetail> {
        let source = self.engine.edit_source(caller, parse_id(id)?, request).await?;
        Ok(self.projector.source_detail(source).await)
    }

    pub async fn edit_definition(
        &self,
        caller: &AuthUser,
        id: &str,
        request: ChangeDefinitionRequest,
    ) -> CatalogResult<DefinitionDetail> {
        let definition = self.engine.edit_definition(caller, parse_id(id)?, request).await?;
        Ok(self.projector.definition_detail(definition).await)
    }

    // --- Moderation ---

    pub async fn approve_definition(
        &self,
        caller: &AuthUser,
        id: &str,
    ) -> CatalogResult<DefinitionDetail> {
        let definition = self.engine.approve_definition(caller, parse_id(id)?).await?;
        Ok(self.projector.definition_detail(definition).await)
    }

    pub async fn reject_definition(
        &self,
        caller: &AuthUser,
        id: &str,
        reason: &str,
    ) -> CatalogResult<DefinitionDetail> {
        let definition = self
            .engine
            .reject_definition(caller, parse_id(id)?, reason)
            .await?;
        Ok(self.projector.definition_detail(definition).await)
    }

    pub async fn delete_author(&self, caller: &AuthUser, id: &str) -> CatalogResult<()> {
        self.engine.delete_author(caller, parse_id(id)?).await
    }

    pub async fn delete_source(&self, caller: &AuthUser, id: &str) -> CatalogResult<()> {
        self.engine.delete_source(caller, parse_id(id)?).await
    }

    // --- Single reads ---

    pub async fn get_author(&self, caller: Option<&AuthUser>, id: &str) -> CatalogResult<AuthorView> {
        let author = self.visible::<Author>(caller, id).await?;
        Ok(self.projector.author(author, caller).await)
    }

    pub async fn get_source(&self, caller: Option<&AuthUser>, id: &str) -> CatalogResult<SourceView> {
        let source = self.visible::<Source>(caller, id).await?;
        Ok(self.projector.source(source, caller).await)
    }

    pub async fn get_definition(
        &self,
        caller: Option<&AuthUser>,
        id: &str,
    ) -> CatalogResult<DefinitionView> {
        let definition = self.visible::<Definition>(caller, id).await?;
        Ok(self.projector.definition(definition, caller).await)
    }

    async fn visible<T: Document>(&self, caller: Option<&AuthUser>, id: &str) -> CatalogResult<T> {
        let entity: T = self.store.get(parse_id(id)?).await?;
        ensure_visible(entity, caller)
    }

    // --- Listings ---

    pub async fn list_authors(
        &self,
        caller: Option<&AuthUser>,
        scope: ListingScope,
        request: AuthorPageRequest,
    ) -> CatalogResult<Vec<AuthorView>> {
        let page = Page::new(request.page, request.page_size)?;
        let filter = authorize_listing(caller, scope, request.filter)?;
        let query = self.filters.authors(&filter)?;
        let authors: Vec<Author> = self.store.find(&query, Some(page)).await?;
        Ok(self.projector.authors(authors, caller).await)
    }

    pub async fn list_sources(
        &self,
        caller: Option<&AuthUser>,
        scope: ListingScope,
        request: SourcePageRequest,
    ) -> CatalogResult<Vec<SourceView>> {
        let page = Page::new(request.page, request.page_size)?;
        let filter = authorize_listing(caller, scope, request.filter)?;
        let query = self.filters.sources(&filter)?;
        let sources: Vec<Source> = self.store.find(&query, Some(page)).await?;
        Ok(self.projector.sources(sources, caller).await)
    }

    pub async fn list_definitions(
        &self,
        caller: Option<&AuthUser>,
        scope: ListingScope,
        request: DefinitionPageRequest,
    ) -> CatalogResult<Vec<DefinitionView>> {
        let page = Page::new(request.page, request.page_size)?;
        let filter = authorize_listing(caller, scope, request.filter)?;
        let query = self.filters.definitions(&filter).await?;
        let definitions: Vec<Definition> = self.store.find(&query, Some(page)).await?;
        Ok(self.projector.definitions(definitions, caller).await)
    }

    pub async fn count_author_pages(
        &self,
        caller: Option<&AuthUser>,
        scope: ListingScope,
        request: AuthorPageCountRequest,
    ) -> CatalogResult<PageCountResponse> {
        let filter = authorize_listing(caller, scope, request.filter)?;
        let query = self.filters.authors(&filter)?;
        let total = self.store.count::<Author>(&query).await?;
        Ok(PageCountResponse {
            page_count: page_count(total, request.page_size)?,
        })
    }

    pub async fn count_source_pages(
        &self,
        caller: Option<&AuthUser>,
        scope: ListingScope,
        request: SourcePageCountRequest,
    ) -> CatalogResult<PageCountResponse> {
        let filter = authorize_listing(caller, scope, request.filter)?;
        let query = self.filters.sources(&filter)?;
        let total = self.store.count::<Source>(&query).await?;
        Ok(PageCountResponse {
            page_count: page_count(total, request.page_size)?,
        })
    }

    pub async fn count_definition_pages(
        &self,
        caller: Option<&AuthUser>,
        scope: ListingScope,
        request: DefinitionPageCountRequest,
    ) -> CatalogResult<PageCountResponse> {
        let filter = authorize_listing(caller, scope, request.filter)?;
        let query = self.filters.definitions(&filter).await?;
        let total = self.store.count::<Definition>(&query).await?;
        Ok(PageCountResponse {
            page_count: page_count(total, request.page_size)?,
        })
    }

    // --- Public overview ---

    /// The `limit` most recently submitted approved definitions.
    pub async fn newest_definitions(&self, limit: Option<i64>) -> CatalogResult<Vec<DefinitionSummary>> {
        let limit = limit.unwrap_or(DEFAULT_NEWEST_LIMIT);
        if limit < 1 {
            return Err(CatalogError::validation(["limit"]));
        }

        let page = Page::new(1, limit)?;
        let definitions: Vec<Definition> = self
            .store
            .find(&Query::eq(fields::APPROVED, true), Some(page))
            .await?;
        Ok(self.projector.definition_summaries(definitions).await)
    }

    /// Totals and current-quarter submissions per kind, across all approval states.
    pub async fn statistics(&self) -> CatalogResult<Statistics> {
        let since = quarter_start(Utc::now());
        Ok(Statistics {
            authors: self.kind_statistics::<Author>(since).await?,
            sources: self.kind_statistics::<Source>(since).await?,
            definitions: self.kind_statistics::<Definition>(since).await?,
        })
    }

    async fn kind_statistics<T: Document>(&self, since: DateTime<Utc>) -> CatalogResult<KindStatistics> {
        let recent = Query::OnOrAfter {
            field: fields::SUBMITTED_DATE,
            at: since,
        };
        Ok(KindStatistics {
            total: self.store.count::<T>(&Query::All).await?,
            current_quarter: self.store.count::<T>(&recent).await?,
        })
    }
}

/// UTC midnight on the first day of the quarter containing `now`.
pub fn quarter_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let month = now.month0() / 3 * 3 + 1;
    Utc.with_ymd_and_hms(now.year(), month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
