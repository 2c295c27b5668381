use uuid::Uuid;

use crate::{
    error::CatalogResult,
    models::{Source, fields, parse_ids},
    query::Query,
    repository::EntityStore,
    requests::{AuthorFilter, DefinitionFilter, SourceFilter},
};

/// FilterBuilder
///
/// Turns structured filter requests into store queries. Approval constraints
/// are copied from the filter as given; the visibility policy tightens them
/// before a filter gets here.
#[derive(Clone)]
pub struct FilterBuilder {
    store: EntityStore,
}

impl FilterBuilder {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub fn authors(&self, filter: &AuthorFilter) -> CatalogResult<Query> {
        let mut clauses = Vec::new();

        if let Some(term) = search_term(&[
            filter.first_name.as_deref(),
            filter.last_name.as_deref(),
            filter.organization_name.as_deref(),
        ]) {
            clauses.push(Query::Text(term));
        }
        if !filter.author_types.is_empty() {
            clauses.push(Query::is_in(
                fields::DETAILS_TYPE,
                filter.author_types.iter().map(|t| t.as_str()),
            ));
        }
        push_common(&mut clauses, &filter.ids, filter.approved, filter.submitted_by)?;

        Ok(Query::all_of(clauses))
    }

    pub fn sources(&self, filter: &SourceFilter) -> CatalogResult<Query> {
        let mut clauses = Vec::new();

        if let Some(term) = search_term(&[
            filter.title.as_deref(),
            filter.journal_name.as_deref(),
            filter.article_name.as_deref(),
            filter.website_name.as_deref(),
        ]) {
            clauses.push(Query::Text(term));
        }
        if !filter.source_types.is_empty() {
            clauses.push(Query::is_in(
                fields::DETAILS_TYPE,
                filter.source_types.iter().map(|t| t.as_str()),
            ));
        }
        if !filter.author_ids.is_empty() {
            clauses.push(Query::is_in(fields::AUTHORS, id_values(&parse_ids(&filter.author_ids)?)));
        }
        push_common(&mut clauses, &filter.ids, filter.approved, filter.submitted_by)?;

        Ok(Query::all_of(clauses))
    }

    /// Definitions only reference their source, so an author restriction first
    /// resolves the sources listing any requested author.
    pub async fn definitions(&self, filter: &DefinitionFilter) -> CatalogResult<Query> {
        let mut clauses = Vec::new();

        if let Some(term) = search_term(&[filter.title.as_deref(), filter.content.as_deref()]) {
            clauses.push(Query::Text(term));
        }
        if !filter.categories.is_empty() {
            clauses.push(Query::is_in(
                fields::CATEGORY,
                filter.categories.iter().map(|c| c.as_str()),
            ));
        }
        if !filter.source_ids.is_empty() {
            clauses.push(Query::is_in(fields::SOURCE, id_values(&parse_ids(&filter.source_ids)?)));
        }
        if !filter.author_ids.is_empty() {
            let author_ids = parse_ids(&filter.author_ids)?;
            let sources: Vec<Source> = self
                .store
                .find(&Query::is_in(fields::AUTHORS, id_values(&author_ids)), None)
                .await?;
            let source_ids: Vec<Uuid> = sources.iter().map(|s| s.id).collect();
            // No matching source leaves an empty set, which matches nothing.
            clauses.push(Query::is_in(fields::SOURCE, id_values(&source_ids)));
        }
        push_common(&mut clauses, &filter.ids, filter.approved, filter.submitted_by)?;

        Ok(Query::all_of(clauses))
    }
}

/// Joins the non-empty text parts with single spaces, in the given order.
pub fn search_term(parts: &[Option<&str>]) -> Option<String> {
    let term = parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!term.is_empty()).then_some(term)
}

fn id_values(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

fn push_common(
    clauses: &mut Vec<Query>,
    ids: &[String],
    approved: Option<bool>,
    submitted_by: Option<Uuid>,
) -> CatalogResult<()> {
    if !ids.is_empty() {
        clauses.push(Query::is_in(fields::ID, id_values(&parse_ids(ids)?)));
    }
    if let Some(approved) = approved {
        clauses.push(Query::eq(fields::APPROVED, approved));
    }
    if let Some(owner) = submitted_by {
        clauses.push(Query::eq(fields::SUBMITTED_BY, owner.to_string()));
    }
    Ok(())
}
