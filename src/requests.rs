use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{CatalogError, CatalogResult},
    models::{
        AuthorDetails, AuthorType, BookProperties, DefinitionCategory, JournalProperties,
        OrganizationProperties, PersonProperties, SourceDetails, SourceType, WebProperties,
    },
};

// --- Submit payloads ---

/// CreateAuthorRequest
///
/// Input payload for submitting a new author (POST /authors).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateAuthorRequest {
    /// `{ "type": "person" | "organization", "properties": { ... } }`
    #[schema(value_type = Object)]
    pub details: AuthorDetails,
}

/// CreateSourceRequest
///
/// Input payload for submitting a new source (POST /sources). Every listed
/// author must already exist.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateSourceRequest {
    pub authors: Vec<String>,
    /// `{ "type": "book" | "journal" | "web", "properties": { ... } }`
    #[schema(value_type = Object)]
    pub details: SourceDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateDefinitionRequest {
    pub title: String,
    pub content: String,
    pub category: DefinitionCategory,
    // Id of an existing source.
    pub source: String,
}

// --- Edit payloads ---
//
// `None` means "leave as is"; only present fields are compared and written.
// Optional properties are `Option<Option<_>>`: an explicit `null` (or a blank
// string) clears the stored value.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePersonProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ChangePersonProperties {
    fn apply_to(&self, target: &mut PersonProperties) {
        assign(&mut target.first_name, &self.first_name);
        assign(&mut target.last_name, &self.last_name);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeOrganizationProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
}

impl ChangeOrganizationProperties {
    fn apply_to(&self, target: &mut OrganizationProperties) {
        assign(&mut target.organization_name, &self.organization_name);
    }
}

/// ChangeAuthorRequest
///
/// Partial update payload for an author (PUT /authors/{id}).
///
/// Switching `author_type` requires the complete properties of the new type.
/// Properties for any type other than the resulting one are refused.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeAuthorRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_type: Option<AuthorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_properties: Option<ChangePersonProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_properties: Option<ChangeOrganizationProperties>,
}

impl ChangeAuthorRequest {
    /// The details the author would have after this change.
    pub fn apply(&self, current: &AuthorDetails) -> CatalogResult<AuthorDetails> {
        let target = self.author_type.unwrap_or_else(|| current.author_type());

        let mut stray = Vec::new();
        if target != AuthorType::Person && self.person_properties.is_some() {
            stray.push("person_properties");
        }
        if target != AuthorType::Organization && self.organization_properties.is_some() {
            stray.push("organization_properties");
        }
        if !stray.is_empty() {
            return Err(CatalogError::validation(stray));
        }

        let next = match target {
            AuthorType::Person => {
                let base = match current {
                    AuthorDetails::Person(p) => Some(p),
                    _ => None,
                };
                AuthorDetails::Person(resolve_variant(
                    base,
                    self.person_properties.as_ref(),
                    "person_properties",
                    ChangePersonProperties::apply_to,
                )?)
            }
            AuthorType::Organization => {
                let base = match current {
                    AuthorDetails::Organization(o) => Some(o),
                    _ => None,
                };
                AuthorDetails::Organization(resolve_variant(
                    base,
                    self.organization_properties.as_ref(),
                    "organization_properties",
                    ChangeOrganizationProperties::apply_to,
                )?)
            }
        };

        let invalid = next.validate();
        if !invalid.is_empty() {
            return Err(CatalogError::ValidationFailed { fields: invalid });
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeBookProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publication_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publication_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u32>)]
    pub pages_from: Option<Option<u32>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u32>)]
    pub pages_to: Option<Option<u32>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub edition: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publisher: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub isbn: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub ean: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub doi: Option<Option<String>>,
}

impl ChangeBookProperties {
    fn apply_to(&self, target: &mut BookProperties) {
        assign(&mut target.title, &self.title);
        assign_clearable(&mut target.publication_date, &self.publication_date);
        assign_clearable_text(&mut target.publication_place, &self.publication_place);
        assign_clearable(&mut target.pages_from, &self.pages_from);
        assign_clearable(&mut target.pages_to, &self.pages_to);
        assign_clearable_text(&mut target.edition, &self.edition);
        assign_clearable_text(&mut target.publisher, &self.publisher);
        assign_clearable_text(&mut target.isbn, &self.isbn);
        assign_clearable_text(&mut target.ean, &self.ean);
        assign_clearable_text(&mut target.doi, &self.doi);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeJournalProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_name: Option<String>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publication_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publication_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u32>)]
    pub pages_from: Option<Option<u32>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u32>)]
    pub pages_to: Option<Option<u32>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub edition: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publisher: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub doi: Option<Option<String>>,
}

impl ChangeJournalProperties {
    fn apply_to(&self, target: &mut JournalProperties) {
        assign(&mut target.title, &self.title);
        assign(&mut target.journal_name, &self.journal_name);
        assign_clearable(&mut target.publication_date, &self.publication_date);
        assign_clearable_text(&mut target.publication_place, &self.publication_place);
        assign_clearable(&mut target.pages_from, &self.pages_from);
        assign_clearable(&mut target.pages_to, &self.pages_to);
        assign_clearable_text(&mut target.edition, &self.edition);
        assign_clearable_text(&mut target.publisher, &self.publisher);
        assign_clearable_text(&mut target.doi, &self.doi);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeWebProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub publication_date: Option<Option<DateTime<Utc>>>,
}

impl ChangeWebProperties {
    fn apply_to(&self, target: &mut WebProperties) {
        assign(&mut target.article_name, &self.article_name);
        assign(&mut target.url, &self.url);
        assign(&mut target.website_name, &self.website_name);
        assign(&mut target.access_date, &self.access_date);
        assign_clearable(&mut target.publication_date, &self.publication_date);
    }
}

/// ChangeSourceRequest
///
/// Partial update payload for a source (PUT /sources/{id}). Same type-switch
/// rules as `ChangeAuthorRequest`; a new author list must be non-empty and
/// reference existing authors.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeSourceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_properties: Option<ChangeBookProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_properties: Option<ChangeJournalProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_properties: Option<ChangeWebProperties>,
}

impl ChangeSourceRequest {
    pub fn apply(&self, current: &SourceDetails) -> CatalogResult<SourceDetails> {
        let target = self.source_type.unwrap_or_else(|| current.source_type());

        let mut stray = Vec::new();
        if target != SourceType::Book && self.book_properties.is_some() {
            stray.push("book_properties");
        }
        if target != SourceType::Journal && self.journal_properties.is_some() {
            stray.push("journal_properties");
        }
        if target != SourceType::Web && self.web_properties.is_some() {
            stray.push("web_properties");
        }
        if !stray.is_empty() {
            return Err(CatalogError::validation(stray));
        }

        let next = match target {
            SourceType::Book => {
                let base = match current {
                    SourceDetails::Book(b) => Some(b),
                    _ => None,
                };
                SourceDetails::Book(resolve_variant(
                    base,
                    self.book_properties.as_ref(),
                    "book_properties",
                    ChangeBookProperties::apply_to,
                )?)
            }
            SourceType::Journal => {
                let base = match current {
                    SourceDetails::Journal(j) => Some(j),
                    _ => None,
                };
                SourceDetails::Journal(resolve_variant(
                    base,
                    self.journal_properties.as_ref(),
                    "journal_properties",
                    ChangeJournalProperties::apply_to,
                )?)
            }
            SourceType::Web => {
                let base = match current {
                    SourceDetails::Web(w) => Some(w),
                    _ => None,
                };
                // A fresh web variant has no meaningful default access date.
                if base.is_none()
                    && self
                        .web_properties
                        .as_ref()
                        .is_some_and(|w| w.access_date.is_none())
                {
                    return Err(CatalogError::validation(["access_date"]));
                }
                SourceDetails::Web(resolve_variant(
                    base,
                    self.web_properties.as_ref(),
                    "web_properties",
                    ChangeWebProperties::apply_to,
                )?)
            }
        };

        let invalid = next.validate();
        if !invalid.is_empty() {
            return Err(CatalogError::ValidationFailed { fields: invalid });
        }
        Ok(next)
    }
}

/// ChangeDefinitionRequest
///
/// Partial update payload for a definition (PUT /definitions/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangeDefinitionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DefinitionCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// RejectDefinitionRequest
///
/// Moderator verdict attached to a rejection (POST /admin/definitions/{id}/reject).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RejectDefinitionRequest {
    #[schema(example = "needs citation")]
    pub reason: String,
}

// --- Filters ---
//
// Every facet is optional; an omitted facet imposes no constraint. Free-text
// fields are joined into a single search term in declaration order.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct AuthorFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_name: Option<String>,
    pub author_types: Vec<AuthorType>,
    pub ids: Vec<String>,
    pub approved: Option<bool>,
    pub submitted_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct SourceFilter {
    pub title: Option<String>,
    pub journal_name: Option<String>,
    pub article_name: Option<String>,
    pub website_name: Option<String>,
    pub source_types: Vec<SourceType>,
    pub ids: Vec<String>,
    /// Sources listing at least one of these authors.
    pub author_ids: Vec<String>,
    pub approved: Option<bool>,
    pub submitted_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct DefinitionFilter {
    pub title: Option<String>,
    pub content: Option<String>,
    pub categories: Vec<DefinitionCategory>,
    pub ids: Vec<String>,
    pub source_ids: Vec<String>,
    /// Definitions whose source lists at least one of these authors.
    pub author_ids: Vec<String>,
    pub approved: Option<bool>,
    pub submitted_by: Option<Uuid>,
}

// --- Paging ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthorPageRequest {
    pub page: i64,
    pub page_size: i64,
    #[serde(default)]
    pub filter: AuthorFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SourcePageRequest {
    pub page: i64,
    pub page_size: i64,
    #[serde(default)]
    pub filter: SourceFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DefinitionPageRequest {
    pub page: i64,
    pub page_size: i64,
    #[serde(default)]
    pub filter: DefinitionFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthorPageCountRequest {
    pub page_size: i64,
    #[serde(default)]
    pub filter: AuthorFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SourcePageCountRequest {
    pub page_size: i64,
    #[serde(default)]
    pub filter: SourceFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DefinitionPageCountRequest {
    pub page_size: i64,
    #[serde(default)]
    pub filter: DefinitionFilter,
}

/// Query string of GET /definitions/newest.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct NewestDefinitionsParams {
    /// Defaults to 4.
    pub limit: Option<i64>,
}

// --- Helpers ---

fn assign<T: Clone>(target: &mut T, change: &Option<T>) {
    if let Some(value) = change {
        *target = value.clone();
    }
}

fn assign_clearable<T: Clone>(target: &mut Option<T>, change: &Option<Option<T>>) {
    if let Some(value) = change {
        *target = value.clone();
    }
}

fn assign_clearable_text(target: &mut Option<String>, change: &Option<Option<String>>) {
    if let Some(value) = change {
        *target = value.clone().filter(|text| !text.trim().is_empty());
    }
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Current properties with the change applied, or the change applied to empty
/// properties when the type is being switched. A type switch without the new
/// properties is refused.
fn resolve_variant<T, C>(
    current: Option<&T>,
    change: Option<&C>,
    field: &'static str,
    apply: fn(&C, &mut T),
) -> CatalogResult<T>
where
    T: Clone + Default,
{
    let mut next = match (current, change) {
        (Some(base), _) => base.clone(),
        (None, Some(_)) => T::default(),
        (None, None) => return Err(CatalogError::validation([field])),
    };
    if let Some(change) = change {
        apply(change, &mut next);
    }
    Ok(next)
}
