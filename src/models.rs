use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{CatalogError, CatalogResult},
    query::Patch,
    repository::StoreError,
};

/// Dotted document paths shared by the filter builder, the lifecycle engine
/// and both store implementations.
pub mod fields {
    pub const ID: &str = "id";
    pub const APPROVED: &str = "approved";
    pub const APPROVED_BY: &str = "approved_by";
    pub const APPROVED_DATE: &str = "approved_date";
    pub const SUBMITTED_BY: &str = "submitted_by";
    pub const SUBMITTED_DATE: &str = "submitted_date";
    pub const LAST_CHANGE_DATE: &str = "last_change_date";

    pub const DETAILS: &str = "details";
    pub const DETAILS_TYPE: &str = "details.type";

    pub const FIRST_NAME: &str = "details.properties.first_name";
    pub const LAST_NAME: &str = "details.properties.last_name";
    pub const ORGANIZATION_NAME: &str = "details.properties.organization_name";

    pub const SOURCE_TITLE: &str = "details.properties.title";
    pub const JOURNAL_NAME: &str = "details.properties.journal_name";
    pub const ARTICLE_NAME: &str = "details.properties.article_name";
    pub const WEBSITE_NAME: &str = "details.properties.website_name";

    pub const AUTHORS: &str = "authors";
    pub const SOURCE: &str = "source";
    pub const CATEGORY: &str = "category";
    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    pub const REJECTION_LOG: &str = "rejection_log";
    pub const SLUG: &str = "slug";

    /// Array-valued fields: `Query::In` matches them on any element.
    pub fn is_array(field: &str) -> bool {
        matches!(field, AUTHORS | REJECTION_LOG)
    }
}

// --- Moderation audit ---

/// Audit
///
/// Ownership and moderation facts shared by every catalog entity. Flattened into
/// the stored document so the audit fields are addressable at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    // Immutable after submission.
    pub submitted_by: Uuid,
    pub submitted_date: DateTime<Utc>,
    // Bumped by every effective edit; compared against the newest rejection.
    pub last_change_date: DateTime<Utc>,
    pub approved: bool,
    // Set together with `approved`, never independently.
    pub approved_by: Option<Uuid>,
    pub approved_date: Option<DateTime<Utc>>,
}

impl Audit {
    pub fn submitted(by: Uuid, at: DateTime<Utc>) -> Self {
        Audit {
            submitted_by: by,
            submitted_date: at,
            last_change_date: at,
            approved: false,
            approved_by: None,
            approved_date: None,
        }
    }

    /// The store patch flipping an entity to approved.
    pub fn approval_patch(by: Uuid, at: DateTime<Utc>) -> Result<Patch, StoreError> {
        Patch::default()
            .set(fields::APPROVED, &true)?
            .set(fields::APPROVED_BY, &by)?
            .set(fields::APPROVED_DATE, &at)
    }

    pub fn mark_approved(&mut self, by: Uuid, at: DateTime<Utc>) {
        self.approved = true;
        self.approved_by = Some(by);
        self.approved_date = Some(at);
    }
}

/// ModerationStatus
///
/// Display-only lifecycle label, always derived from stored facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ModerationStatus {
    Pending,
    Declined,
    Approved,
}

impl ModerationStatus {
    pub fn derive(audit: &Audit, rejection_log: &[Rejection]) -> Self {
        if audit.approved {
            return ModerationStatus::Approved;
        }
        match latest_rejection(rejection_log) {
            None => ModerationStatus::Pending,
            Some(rejected) if rejected < audit.last_change_date => ModerationStatus::Pending,
            Some(_) => ModerationStatus::Declined,
        }
    }
}

pub fn latest_rejection(rejection_log: &[Rejection]) -> Option<DateTime<Utc>> {
    rejection_log.iter().map(|r| r.rejected_date).max()
}

// --- Authors ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AuthorType {
    Person,
    Organization,
}

impl AuthorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorType::Person => "person",
            AuthorType::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PersonProperties {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OrganizationProperties {
    pub organization_name: String,
}

/// AuthorDetails
///
/// The type tag and its properties travel together, so a person can never
/// carry organization properties or vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "properties", rename_all = "snake_case")]
#[ts(export)]
pub enum AuthorDetails {
    Person(PersonProperties),
    Organization(OrganizationProperties),
}

impl AuthorDetails {
    pub fn author_type(&self) -> AuthorType {
        match self {
            AuthorDetails::Person(_) => AuthorType::Person,
            AuthorDetails::Organization(_) => AuthorType::Organization,
        }
    }

    /// Names of the fields violating their constraints; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut invalid = Vec::new();
        match self {
            AuthorDetails::Person(p) => {
                require_text(&mut invalid, "first_name", &p.first_name);
                require_text(&mut invalid, "last_name", &p.last_name);
            }
            AuthorDetails::Organization(o) => {
                require_text(&mut invalid, "organization_name", &o.organization_name);
            }
        }
        invalid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub slug: String,
    #[serde(flatten)]
    pub audit: Audit,
    pub details: AuthorDetails,
}

/// `<last>-<first>-<8 digits>` for people, `<organization>-<8 digits>` otherwise.
/// The digits come from the author id, keeping namesakes apart.
pub fn author_slug(details: &AuthorDetails, id: Uuid) -> String {
    let base = match details {
        AuthorDetails::Person(p) => format!("{}-{}", slug_words(&p.last_name), slug_words(&p.first_name)),
        AuthorDetails::Organization(o) => slug_words(&o.organization_name),
    };
    format!("{}-{:08}", base, id.as_u128() % 100_000_000)
}

fn slug_words(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

// --- Sources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SourceType {
    Book,
    Journal,
    Web,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Book => "book",
            SourceType::Journal => "journal",
            SourceType::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BookProperties {
    pub title: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub publication_place: Option<String>,
    pub pages_from: Option<u32>,
    pub pages_to: Option<u32>,
    pub edition: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    pub ean: Option<String>,
    pub doi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct JournalProperties {
    pub title: String,
    pub journal_name: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub publication_place: Option<String>,
    pub pages_from: Option<u32>,
    pub pages_to: Option<u32>,
    pub edition: Option<String>,
    pub publisher: Option<String>,
    pub doi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct WebProperties {
    pub article_name: String,
    pub url: String,
    pub website_name: String,
    #[ts(type = "string")]
    pub access_date: DateTime<Utc>,
    pub publication_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "properties", rename_all = "snake_case")]
#[ts(export)]
pub enum SourceDetails {
    Book(BookProperties),
    Journal(JournalProperties),
    Web(WebProperties),
}

impl SourceDetails {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceDetails::Book(_) => SourceType::Book,
            SourceDetails::Journal(_) => SourceType::Journal,
            SourceDetails::Web(_) => SourceType::Web,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut invalid = Vec::new();
        match self {
            SourceDetails::Book(b) => {
                require_text(&mut invalid, "title", &b.title);
                check_pages(&mut invalid, b.pages_from, b.pages_to);
            }
            SourceDetails::Journal(j) => {
                require_text(&mut invalid, "title", &j.title);
                require_text(&mut invalid, "journal_name", &j.journal_name);
                check_pages(&mut invalid, j.pages_from, j.pages_to);
            }
            SourceDetails::Web(w) => {
                require_text(&mut invalid, "article_name", &w.article_name);
                require_text(&mut invalid, "website_name", &w.website_name);
                // Only absolute URLs parse.
                if reqwest::Url::parse(w.url.trim()).is_err() {
                    invalid.push("url".to_string());
                }
            }
        }
        invalid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    #[serde(flatten)]
    pub audit: Audit,
    // Ordered, never empty.
    pub authors: Vec<Uuid>,
    pub details: SourceDetails,
}

// --- Definitions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DefinitionCategory {
    HumanIntelligence,
    ArtificialIntelligence,
    MachineIntelligence,
    PlantIntelligence,
    AlienIntelligence,
}

impl DefinitionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionCategory::HumanIntelligence => "human_intelligence",
            DefinitionCategory::ArtificialIntelligence => "artificial_intelligence",
            DefinitionCategory::MachineIntelligence => "machine_intelligence",
            DefinitionCategory::PlantIntelligence => "plant_intelligence",
            DefinitionCategory::AlienIntelligence => "alien_intelligence",
        }
    }
}

/// Rejection
///
/// One moderator verdict. Entries are only ever appended to a definition's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: Uuid,
    pub rejected_by: Uuid,
    pub rejected_date: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub id: Uuid,
    #[serde(flatten)]
    pub audit: Audit,
    pub title: String,
    pub content: String,
    pub category: DefinitionCategory,
    pub source: Uuid,
    #[serde(default)]
    pub rejection_log: Vec<Rejection>,
}

impl Definition {
    pub fn status(&self) -> ModerationStatus {
        ModerationStatus::derive(&self.audit, &self.rejection_log)
    }
}

// --- Shared helpers ---

pub fn parse_id(raw: &str) -> CatalogResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| CatalogError::InvalidReference(raw.to_string()))
}

pub fn parse_ids(raw: &[String]) -> CatalogResult<Vec<Uuid>> {
    raw.iter().map(|id| parse_id(id)).collect()
}

pub(crate) fn require_text(invalid: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        invalid.push(field.to_string());
    }
}

fn check_pages(invalid: &mut Vec<String>, from: Option<u32>, to: Option<u32>) {
    if from == Some(0) {
        invalid.push("pages_from".to_string());
    }
    if to == Some(0) {
        invalid.push("pages_to".to_string());
    }
    if let (Some(from), Some(to)) = (from, to) {
        if to > 0 && from > to {
            invalid.push("pages_to".to_string());
        }
    }
}
