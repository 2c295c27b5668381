use crate::{
    AppState,
    auth::AuthUser,
    error::CatalogResult,
    projection::{
        AuthorDetail, AuthorView, DefinitionDetail, DefinitionSummary, DefinitionView,
        PageCountResponse, SourceDetail, SourceView, Statistics,
    },
    requests::{
        AuthorPageCountRequest, AuthorPageRequest, ChangeAuthorRequest, ChangeDefinitionRequest,
        ChangeSourceRequest, CreateAuthorRequest, CreateDefinitionRequest, CreateSourceRequest,
        DefinitionPageCountRequest, DefinitionPageRequest, NewestDefinitionsParams,
        RejectDefinitionRequest, SourcePageCountRequest, SourcePageRequest,
    },
    visibility::ListingScope,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

// --- Public reads ---
//
// Anonymous callers are welcome; a valid credential upgrades the projection
// for the caller's own (or, for moderators, any) content.

/// get_author
///
/// [Public Route] Single author. Unapproved authors are only visible to their
/// submitter and to moderators; everyone else gets a 404.
#[utoipa::path(
    get,
    path = "/authors/{id}",
    params(("id" = String, Path, description = "Author id")),
    responses(
        (status = 200, description = "Author", body = AuthorView),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_author(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CatalogResult<Json<AuthorView>> {
    let author = state.catalog().get_author(caller.as_ref(), &id).await?;
    Ok(Json(author))
}

#[utoipa::path(
    get,
    path = "/sources/{id}",
    params(("id" = String, Path, description = "Source id")),
    responses(
        (status = 200, description = "Source", body = SourceView),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_source(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CatalogResult<Json<SourceView>> {
    let source = state.catalog().get_source(caller.as_ref(), &id).await?;
    Ok(Json(source))
}

/// get_definition
///
/// [Public Route] Single definition. Owners and moderators additionally see the
/// moderation audit, derived status and rejection log.
#[utoipa::path(
    get,
    path = "/definitions/{id}",
    params(("id" = String, Path, description = "Definition id")),
    responses(
        (status = 200, description = "Definition", body = DefinitionView),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_definition(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CatalogResult<Json<DefinitionView>> {
    let definition = state.catalog().get_definition(caller.as_ref(), &id).await?;
    Ok(Json(definition))
}

/// list_authors
///
/// [Public Route] One page of authors. Omitting `approved` lists approved authors only.
#[utoipa::path(
    post,
    path = "/authors/page",
    request_body = AuthorPageRequest,
    responses(
        (status = 200, description = "Authors", body = [AuthorView]),
        (status = 400, description = "Invalid page or filter"),
        (status = 403, description = "Unapproved content of another user")
    )
)]
pub async fn list_authors(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<AuthorPageRequest>,
) -> CatalogResult<Json<Vec<AuthorView>>> {
    let authors = state
        .catalog()
        .list_authors(caller.as_ref(), ListingScope::Public, payload)
        .await?;
    Ok(Json(authors))
}

#[utoipa::path(
    post,
    path = "/authors/page_count",
    request_body = AuthorPageCountRequest,
    responses((status = 200, description = "Page count", body = PageCountResponse))
)]
pub async fn count_author_pages(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<AuthorPageCountRequest>,
) -> CatalogResult<Json<PageCountResponse>> {
    let count = state
        .catalog()
        .count_author_pages(caller.as_ref(), ListingScope::Public, payload)
        .await?;
    Ok(Json(count))
}

#[utoipa::path(
    post,
    path = "/sources/page",
    request_body = SourcePageRequest,
    responses(
        (status = 200, description = "Sources", body = [SourceView]),
        (status = 400, description = "Invalid page or filter")
    )
)]
pub async fn list_sources(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<SourcePageRequest>,
) -> CatalogResult<Json<Vec<SourceView>>> {
    let sources = state
        .catalog()
        .list_sources(caller.as_ref(), ListingScope::Public, payload)
        .await?;
    Ok(Json(sources))
}

#[utoipa::path(
    post,
    path = "/sources/page_count",
    request_body = SourcePageCountRequest,
    responses((status = 200, description = "Page count", body = PageCountResponse))
)]
pub async fn count_source_pages(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<SourcePageCountRequest>,
) -> CatalogResult<Json<PageCountResponse>> {
    let count = state
        .catalog()
        .count_source_pages(caller.as_ref(), ListingScope::Public, payload)
        .await?;
    Ok(Json(count))
}

/// list_definitions
///
/// [Public Route] One page of definitions. `author_ids` restricts the result to
/// definitions whose source lists one of those authors.
#[utoipa::path(
    post,
    path = "/definitions/page",
    request_body = DefinitionPageRequest,
    responses(
        (status = 200, description = "Definitions", body = [DefinitionView]),
        (status = 400, description = "Invalid page or filter")
    )
)]
pub async fn list_definitions(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<DefinitionPageRequest>,
) -> CatalogResult<Json<Vec<DefinitionView>>> {
    let definitions = state
        .catalog()
        .list_definitions(caller.as_ref(), ListingScope::Public, payload)
        .await?;
    Ok(Json(definitions))
}

#[utoipa::path(
    post,
    path = "/definitions/page_count",
    request_body = DefinitionPageCountRequest,
    responses((status = 200, description = "Page count", body = PageCountResponse))
)]
pub async fn count_definition_pages(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<DefinitionPageCountRequest>,
) -> CatalogResult<Json<PageCountResponse>> {
    let count = state
        .catalog()
        .count_definition_pages(caller.as_ref(), ListingScope::Public, payload)
        .await?;
    Ok(Json(count))
}

/// newest_definitions
///
/// [Public Route] The most recently submitted approved definitions (default 4).
#[utoipa::path(
    get,
    path = "/definitions/newest",
    params(NewestDefinitionsParams),
    responses(
        (status = 200, description = "Newest definitions", body = [DefinitionSummary]),
        (status = 400, description = "limit < 1")
    )
)]
pub async fn newest_definitions(
    State(state): State<AppState>,
    Query(params): Query<NewestDefinitionsParams>,
) -> CatalogResult<Json<Vec<DefinitionSummary>>> {
    let definitions = state.catalog().newest_definitions(params.limit).await?;
    Ok(Json(definitions))
}

#[utoipa::path(
    get,
    path = "/statistics",
    responses((status = 200, description = "Catalog statistics", body = Statistics))
)]
pub async fn get_statistics(State(state): State<AppState>) -> CatalogResult<Json<Statistics>> {
    let statistics = state.catalog().statistics().await?;
    Ok(Json(statistics))
}

// --- Submissions & edits ---

/// submit_author
///
/// [Authenticated Route] Submits an author for review. The caller becomes its owner.
#[utoipa::path(
    post,
    path = "/authors",
    request_body = CreateAuthorRequest,
    responses(
        (status = 201, description = "Author submitted", body = AuthorDetail),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn submit_author(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAuthorRequest>,
) -> CatalogResult<(StatusCode, Json<AuthorDetail>)> {
    let author = state.catalog().submit_author(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// edit_author
///
/// [Authenticated Route] Owner-only, pre-approval only. An edit that changes
/// nothing leaves the author untouched.
#[utoipa::path(
    put,
    path = "/authors/{id}",
    params(("id" = String, Path, description = "Author id")),
    request_body = ChangeAuthorRequest,
    responses(
        (status = 200, description = "Author", body = AuthorDetail),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already approved")
    )
)]
pub async fn edit_author(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ChangeAuthorRequest>,
) -> CatalogResult<Json<AuthorDetail>> {
    let author = state.catalog().edit_author(&caller, &id, payload).await?;
    Ok(Json(author))
}

/// submit_source
///
/// [Authenticated Route] Every listed author must already exist.
#[utoipa::path(
    post,
    path = "/sources",
    request_body = CreateSourceRequest,
    responses(
        (status = 201, description = "Source submitted", body = SourceDetail),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown author")
    )
)]
pub async fn submit_source(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateSourceRequest>,
) -> CatalogResult<(StatusCode, Json<SourceDetail>)> {
    let source = state.catalog().submit_source(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

#[utoipa::path(
    put,
    path = "/sources/{id}",
    params(("id" = String, Path, description = "Source id")),
    request_body = ChangeSourceRequest,
    responses(
        (status = 200, description = "Source", body = SourceDetail),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already approved")
    )
)]
pub async fn edit_source(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ChangeSourceRequest>,
) -> CatalogResult<Json<SourceDetail>> {
    let source = state.catalog().edit_source(&caller, &id, payload).await?;
    Ok(Json(source))
}

#[utoipa::path(
    post,
    path = "/definitions",
    request_body = CreateDefinitionRequest,
    responses(
        (status = 201, description = "Definition submitted", body = DefinitionDetail),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown source")
    )
)]
pub async fn submit_definition(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateDefinitionRequest>,
) -> CatalogResult<(StatusCode, Json<DefinitionDetail>)> {
    let definition = state.catalog().submit_definition(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

/// edit_definition
///
/// [Authenticated Route] Any effective change bumps `last_change_date`, which
/// answers a pending rejection and sends the definition back to review.
#[utoipa::path(
    put,
    path = "/definitions/{id}",
    params(("id" = String, Path, description = "Definition id")),
    request_body = ChangeDefinitionRequest,
    responses(
        (status = 200, description = "Definition", body = DefinitionDetail),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already approved")
    )
)]
pub async fn edit_definition(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ChangeDefinitionRequest>,
) -> CatalogResult<Json<DefinitionDetail>> {
    let definition = state.catalog().edit_definition(&caller, &id, payload).await?;
    Ok(Json(definition))
}

// --- Review listings ---
//
// Same payloads as the public listings, but an omitted `approved` flag means
// "any state": non-moderators must then name themselves as `submitted_by`.

#[utoipa::path(
    post,
    path = "/review/authors/page",
    request_body = AuthorPageRequest,
    responses(
        (status = 200, description = "Authors", body = [AuthorView]),
        (status = 403, description = "Unapproved content of another user")
    )
)]
pub async fn review_authors(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AuthorPageRequest>,
) -> CatalogResult<Json<Vec<AuthorView>>> {
    let authors = state
        .catalog()
        .list_authors(Some(&caller), ListingScope::Review, payload)
        .await?;
    Ok(Json(authors))
}

#[utoipa::path(
    post,
    path = "/review/authors/page_count",
    request_body = AuthorPageCountRequest,
    responses((status = 200, description = "Page count", body = PageCountResponse))
)]
pub async fn review_author_pages(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AuthorPageCountRequest>,
) -> CatalogResult<Json<PageCountResponse>> {
    let count = state
        .catalog()
        .count_author_pages(Some(&caller), ListingScope::Review, payload)
        .await?;
    Ok(Json(count))
}

#[utoipa::path(
    post,
    path = "/review/sources/page",
    request_body = SourcePageRequest,
    responses(
        (status = 200, description = "Sources", body = [SourceView]),
        (status = 403, description = "Unapproved content of another user")
    )
)]
pub async fn review_sources(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SourcePageRequest>,
) -> CatalogResult<Json<Vec<SourceView>>> {
    let sources = state
        .catalog()
        .list_sources(Some(&caller), ListingScope::Review, payload)
        .await?;
    Ok(Json(sources))
}

#[utoipa::path(
    post,
    path = "/review/sources/page_count",
    request_body = SourcePageCountRequest,
    responses((status = 200, description = "Page count", body = PageCountResponse))
)]
pub async fn review_source_pages(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SourcePageCountRequest>,
) -> CatalogResult<Json<PageCountResponse>> {
    let count = state
        .catalog()
        .count_source_pages(Some(&caller), ListingScope::Review, payload)
        .await?;
    Ok(Json(count))
}

/// review_definitions
///
/// [Authenticated Route] Review queue for moderators, or the caller's own
/// submissions in any state.
#[utoipa::path(
    post,
    path = "/review/definitions/page",
    request_body = DefinitionPageRequest,
    responses(
        (status = 200, description = "Definitions", body = [DefinitionView]),
        (status = 403, description = "Unapproved content of another user")
    )
)]
pub async fn review_definitions(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<DefinitionPageRequest>,
) -> CatalogResult<Json<Vec<DefinitionView>>> {
    let definitions = state
        .catalog()
        .list_definitions(Some(&caller), ListingScope::Review, payload)
        .await?;
    Ok(Json(definitions))
}

#[utoipa::path(
    post,
    path = "/review/definitions/page_count",
    request_body = DefinitionPageCountRequest,
    responses((status = 200, description = "Page count", body = PageCountResponse))
)]
pub async fn review_definition_pages(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<DefinitionPageCountRequest>,
) -> CatalogResult<Json<PageCountResponse>> {
    let count = state
        .catalog()
        .count_definition_pages(Some(&caller), ListingScope::Review, payload)
        .await?;
    Ok(Json(count))
}

// --- Moderation ---
//
// Role checks live in the lifecycle engine; these handlers only need an identity.

/// approve_definition
///
/// [Admin Route] Approves the definition, cascading to its source and the
/// source's authors first.
#[utoipa::path(
    post,
    path = "/admin/definitions/{id}/approve",
    params(("id" = String, Path, description = "Definition id")),
    responses(
        (status = 200, description = "Approved", body = DefinitionDetail),
        (status = 403, description = "Moderator role required"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already approved")
    )
)]
pub async fn approve_definition(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CatalogResult<Json<DefinitionDetail>> {
    let definition = state.catalog().approve_definition(&caller, &id).await?;
    Ok(Json(definition))
}

/// reject_definition
///
/// [Admin Route] Appends a rejection. Refused while the previous rejection is
/// still unanswered by an edit.
#[utoipa::path(
    post,
    path = "/admin/definitions/{id}/reject",
    params(("id" = String, Path, description = "Definition id")),
    request_body = RejectDefinitionRequest,
    responses(
        (status = 200, description = "Rejected", body = DefinitionDetail),
        (status = 403, description = "Moderator role required"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already approved or unanswered rejection")
    )
)]
pub async fn reject_definition(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectDefinitionRequest>,
) -> CatalogResult<Json<DefinitionDetail>> {
    let definition = state
        .catalog()
        .reject_definition(&caller, &id, &payload.reason)
        .await?;
    Ok(Json(definition))
}

/// delete_author
///
/// [Admin Route] Refused with the blocking source ids while any source lists the author.
#[utoipa::path(
    delete,
    path = "/admin/authors/{id}",
    params(("id" = String, Path, description = "Author id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Moderator role required"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Still referenced")
    )
)]
pub async fn delete_author(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CatalogResult<StatusCode> {
    state.catalog().delete_author(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/admin/sources/{id}",
    params(("id" = String, Path, description = "Source id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Moderator role required"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Still referenced")
    )
)]
pub async fn delete_source(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CatalogResult<StatusCode> {
    state.catalog().delete_source(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
