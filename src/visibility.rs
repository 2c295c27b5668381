use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{CatalogError, CatalogResult},
    models::Audit,
    repository::Document,
    requests::{AuthorFilter, DefinitionFilter, SourceFilter},
};

/// ListingScope
///
/// Context a listing runs in. Listings are checked before the filter reaches
/// the filter builder; single entity reads are checked after the fetch and fold
/// every refusal into `NotFound` so moderation state never leaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// Anonymous browsing: an omitted approval flag means approved-only.
    Public,
    /// Owner or moderator review: an omitted approval flag means any state.
    Review,
}

/// Filters carrying an approval flag and an owner constraint.
pub trait ScopedFilter {
    fn approved(&self) -> Option<bool>;
    fn set_approved(&mut self, approved: Option<bool>);
    fn owner(&self) -> Option<Uuid>;
}

impl ScopedFilter for AuthorFilter {
    fn approved(&self) -> Option<bool> {
        self.approved
    }

    fn set_approved(&mut self, approved: Option<bool>) {
        self.approved = approved;
    }

    fn owner(&self) -> Option<Uuid> {
        self.submitted_by
    }
}

impl ScopedFilter for SourceFilter {
    fn approved(&self) -> Option<bool> {
        self.approved
    }

    fn set_approved(&mut self, approved: Option<bool>) {
        self.approved = approved;
    }

    fn owner(&self) -> Option<Uuid> {
        self.submitted_by
    }
}

impl ScopedFilter for DefinitionFilter {
    fn approved(&self) -> Option<bool> {
        self.approved
    }

    fn set_approved(&mut self, approved: Option<bool>) {
        self.approved = approved;
    }

    fn owner(&self) -> Option<Uuid> {
        self.submitted_by
    }
}

/// Returns the filter that is safe to execute for `caller`, or the refusal.
///
/// A non-moderator asking for unapproved content must name themselves as the
/// owner; the filter is never narrowed on their behalf.
pub fn authorize_listing<F: ScopedFilter>(
    caller: Option<&AuthUser>,
    scope: ListingScope,
    mut filter: F,
) -> CatalogResult<F> {
    match (filter.approved(), scope) {
        (Some(true), _) => return Ok(filter),
        (None, ListingScope::Public) => {
            filter.set_approved(Some(true));
            return Ok(filter);
        }
        _ => {}
    }

    let caller = caller.ok_or(CatalogError::Unauthenticated)?;
    if caller.is_moderator() {
        return Ok(filter);
    }

    match filter.owner() {
        Some(owner) if owner == caller.id => Ok(filter),
        _ => Err(CatalogError::OwnershipViolation),
    }
}

/// Whether `caller` may see the detailed, owner-level view of an entity.
pub fn has_detail_access(audit: &Audit, caller: Option<&AuthUser>) -> bool {
    caller.is_some_and(|c| c.is_moderator() || c.id == audit.submitted_by)
}

pub fn can_view(audit: &Audit, caller: Option<&AuthUser>) -> bool {
    audit.approved || has_detail_access(audit, caller)
}

/// Hands the entity back if the caller may see it, `NotFound` otherwise.
pub fn ensure_visible<T: Document>(entity: T, caller: Option<&AuthUser>) -> CatalogResult<T> {
    if can_view(entity.audit(), caller) {
        Ok(entity)
    } else {
        Err(CatalogError::NotFound {
            kind: T::KIND,
            id: entity.id(),
        })
    }
}
