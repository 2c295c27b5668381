mod common;

use reference_catalog::{
    CatalogError,
    models::{
        Author, AuthorDetails, AuthorType, Definition, DefinitionCategory, ModerationStatus,
        OrganizationProperties, Source, SourceDetails, SourceType, author_slug,
    },
    query::Query,
    repository::EntityKind,
    requests::{
        ChangeAuthorRequest, ChangeBookProperties, ChangeDefinitionRequest, ChangeOrganizationProperties,
        ChangePersonProperties, ChangeSourceRequest, ChangeWebProperties,
    },
};
use std::sync::Arc;
use uuid::Uuid;

use common::*;

// --- Submit ---

#[tokio::test]
async fn test_submit_definition_starts_pending_and_reads_back() {
    let h = harness();
    let (_, source, definition) = submit_chain(&h, &owner()).await;

    let stored: Definition = h.store.get(definition.id).await.unwrap();
    assert_eq!(stored.title, "Intelligence");
    assert_eq!(stored.content, "The ability to learn from experience.");
    assert_eq!(stored.category, DefinitionCategory::HumanIntelligence);
    assert_eq!(stored.source, source.id);
    assert_eq!(stored.audit.submitted_by, OWNER_ID);
    assert_eq!(stored.audit.submitted_date, stored.audit.last_change_date);
    assert!(!stored.audit.approved);
    assert!(stored.audit.approved_by.is_none());
    assert!(stored.audit.approved_date.is_none());
    assert!(stored.rejection_log.is_empty());
    assert_eq!(stored.status(), ModerationStatus::Pending);
}

#[tokio::test]
async fn test_submit_definition_with_unknown_source_writes_nothing() {
    let h = harness();
    let missing = Uuid::new_v4();

    let result = h
        .engine
        .submit_definition(&owner(), definition_request("Intelligence", "Learning.", missing))
        .await;

    match result {
        Err(CatalogError::NotFound { kind, id }) => {
            assert_eq!(kind, EntityKind::Source);
            assert_eq!(id, missing);
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
    let stored: Vec<Definition> = h.store.find(&Query::All, None).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_submit_definition_rejects_blank_fields() {
    let h = harness();
    let (_, source, _) = submit_chain(&h, &owner()).await;

    let result = h
        .engine
        .submit_definition(&owner(), definition_request("  ", "", source.id))
        .await;

    match result {
        Err(CatalogError::ValidationFailed { fields }) => {
            assert_eq!(fields, vec!["title".to_string(), "content".to_string()]);
        }
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_definition_with_malformed_source_id() {
    let h = harness();
    let mut request = definition_request("Intelligence", "Learning.", Uuid::new_v4());
    request.source = "not-a-uuid".to_string();

    let result = h.engine.submit_definition(&owner(), request).await;
    assert!(matches!(result, Err(CatalogError::InvalidReference(raw)) if raw == "not-a-uuid"));
}

#[tokio::test]
async fn test_submit_source_requires_existing_authors() {
    let h = harness();
    let author = submit_author(&h, &owner(), person("Alan", "Turing")).await;
    let missing = Uuid::new_v4();

    let result = h
        .engine
        .submit_source(&owner(), source_request(&[author.id, missing], book("Minds and Machines")))
        .await;

    assert!(matches!(
        result,
        Err(CatalogError::NotFound { kind: EntityKind::Author, id }) if id == missing
    ));
}

#[tokio::test]
async fn test_submit_source_without_authors_fails_validation() {
    let h = harness();

    let result = h.engine.submit_source(&owner(), source_request(&[], book("Minds and Machines"))).await;

    match result {
        Err(CatalogError::ValidationFailed { fields }) => assert!(fields.contains(&"authors".to_string())),
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_author_assigns_slug() {
    let h = harness();
    let author = submit_author(&h, &owner(), person("Ada", "Lovelace")).await;

    assert!(author.slug.starts_with("lovelace-ada-"));
    assert_eq!(author.slug.len(), "lovelace-ada-".len() + 8);
}

// --- Approve ---

#[tokio::test]
async fn test_approve_definition_cascades_to_source_and_authors() {
    let h = harness();
    let first = submit_author(&h, &owner(), person("Alan", "Turing")).await;
    let second = submit_author(&h, &owner(), organization("Royal Society")).await;
    let source = submit_source(&h, &owner(), &[first.id, second.id]).await;
    let definition = submit_definition(&h, &owner(), source.id).await;

    let approved = h.engine.approve_definition(&moderator(), definition.id).await.unwrap();

    assert!(approved.audit.approved);
    assert_eq!(approved.audit.approved_by, Some(MODERATOR_ID));
    assert!(approved.audit.approved_date.is_some());
    assert_eq!(approved.status(), ModerationStatus::Approved);

    let source: Source = h.store.get(source.id).await.unwrap();
    assert!(source.audit.approved);
    assert_eq!(source.audit.approved_by, Some(MODERATOR_ID));

    for id in [first.id, second.id] {
        let author: Author = h.store.get(id).await.unwrap();
        assert!(author.audit.approved);
        assert_eq!(author.audit.approved_by, Some(MODERATOR_ID));
        assert!(author.audit.approved_date.is_some());
    }
}

#[tokio::test]
async fn test_cascade_keeps_audit_of_already_approved_ancestors() {
    let h = harness();
    let (author, source, first) = submit_chain(&h, &owner()).await;
    h.engine.approve_definition(&moderator(), first.id).await.unwrap();

    let before_source: Source = h.store.get(source.id).await.unwrap();
    let before_author: Author = h.store.get(author.id).await.unwrap();

    let second = submit_definition(&h, &other_user(), source.id).await;
    h.engine.approve_definition(&admin(), second.id).await.unwrap();

    let after_source: Source = h.store.get(source.id).await.unwrap();
    let after_author: Author = h.store.get(author.id).await.unwrap();
    assert_eq!(after_source.audit, before_source.audit);
    assert_eq!(after_author.audit, before_author.audit);
    assert_eq!(after_source.audit.approved_by, Some(MODERATOR_ID));

    let second: Definition = h.store.get(second.id).await.unwrap();
    assert_eq!(second.audit.approved_by, Some(ADMIN_ID));
}

#[tokio::test]
async fn test_approve_twice_reports_already_approved() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;
    h.engine.approve_definition(&moderator(), definition.id).await.unwrap();

    let result = h.engine.approve_definition(&moderator(), definition.id).await;

    assert!(matches!(
        result,
        Err(CatalogError::AlreadyApproved { kind: EntityKind::Definition, id }) if id == definition.id
    ));
}

#[tokio::test]
async fn test_approve_requires_moderator_role() {
    let h = harness();
    let (author, source, definition) = submit_chain(&h, &owner()).await;

    let result = h.engine.approve_definition(&owner(), definition.id).await;
    assert!(matches!(result, Err(CatalogError::InsufficientRole)));

    let definition: Definition = h.store.get(definition.id).await.unwrap();
    let source: Source = h.store.get(source.id).await.unwrap();
    let author: Author = h.store.get(author.id).await.unwrap();
    assert!(!definition.audit.approved);
    assert!(!source.audit.approved);
    assert!(!author.audit.approved);
}

#[tokio::test]
async fn test_failed_cascade_leaves_dependents_unapproved() {
    let h = harness();
    let kept = submit_author(&h, &owner(), person("Alan", "Turing")).await;
    let vanished = submit_author(&h, &owner(), person("John", "McCarthy")).await;
    let source = submit_source(&h, &owner(), &[kept.id, vanished.id]).await;
    let definition = submit_definition(&h, &owner(), source.id).await;

    // Removed behind the deletion guard's back.
    h.store.delete::<Author>(vanished.id).await.unwrap();

    let result = h.engine.approve_definition(&moderator(), definition.id).await;
    assert!(matches!(
        result,
        Err(CatalogError::NotFound { kind: EntityKind::Author, id }) if id == vanished.id
    ));

    let source: Source = h.store.get(source.id).await.unwrap();
    let definition: Definition = h.store.get(definition.id).await.unwrap();
    assert!(!source.audit.approved);
    assert!(!definition.audit.approved);
}

#[tokio::test]
async fn test_cascade_tolerates_approval_between_read_and_write() {
    let (h, repo) = harness_wrapping(|inner| Arc::new(InterferingRepository::new(inner)));
    let (author, source, definition) = submit_chain(&h, &owner()).await;
    let raced_at = fixed_time(2024, 6, 1);
    repo.arm(EntityKind::Source, source.id, Interference::ApprovedBy(ADMIN_ID, raced_at));

    let approved = h.engine.approve_definition(&moderator(), definition.id).await.unwrap();
    assert_eq!(approved.audit.approved_by, Some(MODERATOR_ID));

    // The other moderator's approval of the source wins and is kept as is.
    let source: Source = h.store.get(source.id).await.unwrap();
    assert!(source.audit.approved);
    assert_eq!(source.audit.approved_by, Some(ADMIN_ID));
    assert_eq!(source.audit.approved_date, Some(raced_at));

    let author: Author = h.store.get(author.id).await.unwrap();
    assert_eq!(author.audit.approved_by, Some(MODERATOR_ID));
    let stored: Definition = h.store.get(definition.id).await.unwrap();
    assert!(stored.audit.approved);
}

#[tokio::test]
async fn test_cascade_stops_when_an_author_vanishes_before_its_write() {
    let (h, repo) = harness_wrapping(|inner| Arc::new(InterferingRepository::new(inner)));
    let (author, source, definition) = submit_chain(&h, &owner()).await;
    repo.arm(EntityKind::Author, author.id, Interference::Deleted);

    let result = h.engine.approve_definition(&moderator(), definition.id).await;

    assert!(matches!(
        result,
        Err(CatalogError::NotFound { kind: EntityKind::Author, id }) if id == author.id
    ));
    let source: Source = h.store.get(source.id).await.unwrap();
    let definition: Definition = h.store.get(definition.id).await.unwrap();
    assert!(!source.audit.approved);
    assert!(!definition.audit.approved);
}

#[tokio::test]
async fn test_approve_unknown_definition() {
    let h = harness();
    let missing = Uuid::new_v4();

    let result = h.engine.approve_definition(&moderator(), missing).await;
    assert!(matches!(result, Err(CatalogError::NotFound { kind: EntityKind::Definition, .. })));
}

// --- Reject ---

#[tokio::test]
async fn test_rejection_needs_an_answer_before_the_next_one() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;

    let declined = h
        .engine
        .reject_definition(&moderator(), definition.id, "Too vague.")
        .await
        .unwrap();
    assert_eq!(declined.status(), ModerationStatus::Declined);
    assert_eq!(declined.rejection_log.len(), 1);
    assert_eq!(declined.rejection_log[0].rejected_by, MODERATOR_ID);
    assert_eq!(declined.rejection_log[0].content, "Too vague.");

    let second = h.engine.reject_definition(&moderator(), definition.id, "Still vague.").await;
    assert!(matches!(second, Err(CatalogError::UnansweredRejection { id }) if id == definition.id));

    let edited = h
        .engine
        .edit_definition(
            &owner(),
            definition.id,
            ChangeDefinitionRequest {
                content: Some("The ability to learn from experience and adapt.".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status(), ModerationStatus::Pending);

    let declined_again = h
        .engine
        .reject_definition(&moderator(), definition.id, "Cite the test protocol.")
        .await
        .unwrap();
    assert_eq!(declined_again.rejection_log.len(), 2);
    assert_eq!(declined_again.status(), ModerationStatus::Declined);
}

#[tokio::test]
async fn test_reject_requires_a_reason() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;

    let result = h.engine.reject_definition(&moderator(), definition.id, "   ").await;
    match result {
        Err(CatalogError::ValidationFailed { fields }) => assert_eq!(fields, vec!["reason".to_string()]),
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reject_approved_definition_is_refused() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;
    h.engine.approve_definition(&moderator(), definition.id).await.unwrap();

    let result = h.engine.reject_definition(&moderator(), definition.id, "Late objection").await;
    assert!(matches!(result, Err(CatalogError::AlreadyApproved { .. })));
}

#[tokio::test]
async fn test_reject_by_regular_user_is_refused() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;

    let result = h.engine.reject_definition(&other_user(), definition.id, "No").await;
    assert!(matches!(result, Err(CatalogError::InsufficientRole)));
}

#[tokio::test]
async fn test_approve_after_rejection_clears_declined_state() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;
    h.engine.reject_definition(&moderator(), definition.id, "Typo").await.unwrap();

    let approved = h.engine.approve_definition(&admin(), definition.id).await.unwrap();

    assert_eq!(approved.status(), ModerationStatus::Approved);
    assert_eq!(approved.rejection_log.len(), 1);
}

// --- Edit ---

#[tokio::test]
async fn test_edit_without_changes_keeps_last_change_date() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;

    let result = h
        .engine
        .edit_definition(
            &owner(),
            definition.id,
            ChangeDefinitionRequest {
                title: Some(definition.title.clone()),
                category: Some(definition.category),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.audit.last_change_date, definition.audit.last_change_date);
    let stored: Definition = h.store.get(definition.id).await.unwrap();
    assert_eq!(stored, definition);
}

#[tokio::test]
async fn test_edit_applies_changes_and_bumps_last_change_date() {
    let h = harness();
    let (author, _, definition) = submit_chain(&h, &owner()).await;
    let other_source = submit_source(&h, &owner(), &[author.id]).await;

    let edited = h
        .engine
        .edit_definition(
            &owner(),
            definition.id,
            ChangeDefinitionRequest {
                title: Some("General intelligence".to_string()),
                category: Some(DefinitionCategory::MachineIntelligence),
                source: Some(other_source.id.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.title, "General intelligence");
    assert_eq!(edited.content, definition.content);
    assert_eq!(edited.category, DefinitionCategory::MachineIntelligence);
    assert_eq!(edited.source, other_source.id);
    assert!(edited.audit.last_change_date > definition.audit.last_change_date);
    assert_eq!(edited.audit.submitted_date, definition.audit.submitted_date);
}

#[tokio::test]
async fn test_edit_by_non_owner_is_refused() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;

    let change = ChangeDefinitionRequest {
        title: Some("Hijacked".to_string()),
        ..Default::default()
    };
    let result = h.engine.edit_definition(&other_user(), definition.id, change.clone()).await;
    assert!(matches!(result, Err(CatalogError::OwnershipViolation)));

    // Moderators do not edit on the owner's behalf either.
    let result = h.engine.edit_definition(&moderator(), definition.id, change).await;
    assert!(matches!(result, Err(CatalogError::OwnershipViolation)));
}

#[tokio::test]
async fn test_edit_after_approval_is_refused() {
    let h = harness();
    let (author, source, definition) = submit_chain(&h, &owner()).await;
    h.engine.approve_definition(&moderator(), definition.id).await.unwrap();

    let result = h
        .engine
        .edit_definition(
            &owner(),
            definition.id,
            ChangeDefinitionRequest {
                title: Some("Revised".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CatalogError::AlreadyApproved { kind: EntityKind::Definition, .. })));

    let result = h
        .engine
        .edit_source(&owner(), source.id, ChangeSourceRequest::default())
        .await;
    assert!(matches!(result, Err(CatalogError::AlreadyApproved { kind: EntityKind::Source, .. })));

    let result = h
        .engine
        .edit_author(&owner(), author.id, ChangeAuthorRequest::default())
        .await;
    assert!(matches!(result, Err(CatalogError::AlreadyApproved { kind: EntityKind::Author, .. })));
}

#[tokio::test]
async fn test_edit_definition_to_unknown_source() {
    let h = harness();
    let (_, _, definition) = submit_chain(&h, &owner()).await;
    let missing = Uuid::new_v4();

    let result = h
        .engine
        .edit_definition(
            &owner(),
            definition.id,
            ChangeDefinitionRequest {
                source: Some(missing.to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(CatalogError::NotFound { kind: EntityKind::Source, id }) if id == missing
    ));
}

#[tokio::test]
async fn test_edit_author_switches_type_with_properties() {
    let h = harness();
    let author = submit_author(&h, &owner(), person("Nicolas", "Bourbaki")).await;

    let edited = h
        .engine
        .edit_author(
            &owner(),
            author.id,
            ChangeAuthorRequest {
                author_type: Some(AuthorType::Organization),
                organization_properties: Some(ChangeOrganizationProperties {
                    organization_name: Some("Association des collaborateurs de Nicolas Bourbaki".to_string()),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.details.author_type(), AuthorType::Organization);
    assert_eq!(
        edited.details,
        AuthorDetails::Organization(OrganizationProperties {
            organization_name: "Association des collaborateurs de Nicolas Bourbaki".to_string(),
        })
    );
    // The slug follows the new name and keeps its id digits.
    assert_eq!(edited.slug, author_slug(&edited.details, author.id));
    assert!(edited.slug.starts_with("association-des-collaborateurs-de-nicolas-bourbaki-"));
    assert_eq!(edited.slug[edited.slug.len() - 8..], author.slug[author.slug.len() - 8..]);

    let stored: Author = h.store.get(author.id).await.unwrap();
    assert_eq!(stored.slug, edited.slug);
}

#[tokio::test]
async fn test_edit_author_type_switch_without_properties_fails() {
    let h = harness();
    let author = submit_author(&h, &owner(), person("Nicolas", "Bourbaki")).await;

    let result = h
        .engine
        .edit_author(
            &owner(),
            author.id,
            ChangeAuthorRequest {
                author_type: Some(AuthorType::Organization),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CatalogError::ValidationFailed { .. })));

    let result = h
        .engine
        .edit_author(
            &owner(),
            author.id,
            ChangeAuthorRequest {
                organization_properties: Some(ChangeOrganizationProperties {
                    organization_name: Some("Stray".to_string()),
                }),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CatalogError::ValidationFailed { .. })));

    let stored: Author = h.store.get(author.id).await.unwrap();
    assert_eq!(stored.details, author.details);
}

#[tokio::test]
async fn test_edit_author_partial_person_change() {
    let h = harness();
    let author = submit_author(&h, &owner(), person("Alan", "Turring")).await;

    let edited = h
        .engine
        .edit_author(
            &owner(),
            author.id,
            ChangeAuthorRequest {
                person_properties: Some(ChangePersonProperties {
                    last_name: Some("Turing".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.details, person("Alan", "Turing"));
    assert!(author.slug.starts_with("turring-alan-"));
    assert!(edited.slug.starts_with("turing-alan-"));
    assert!(edited.audit.last_change_date > author.audit.last_change_date);
}

#[tokio::test]
async fn test_edit_source_switch_to_web_requires_access_date() {
    let h = harness();
    let (author, source, _) = submit_chain(&h, &owner()).await;

    let missing_date = ChangeSourceRequest {
        source_type: Some(SourceType::Web),
        web_properties: Some(ChangeWebProperties {
            article_name: Some("Artificial intelligence".to_string()),
            url: Some("https://en.wikipedia.org/wiki/Artificial_intelligence".to_string()),
            website_name: Some("Wikipedia".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let result = h.engine.edit_source(&owner(), source.id, missing_date.clone()).await;
    assert!(matches!(result, Err(CatalogError::ValidationFailed { .. })));

    let mut complete = missing_date;
    if let Some(web) = complete.web_properties.as_mut() {
        web.access_date = Some(fixed_time(2024, 5, 2));
    }
    complete.authors = Some(vec![author.id.to_string()]);

    let edited = h.engine.edit_source(&owner(), source.id, complete).await.unwrap();
    assert_eq!(edited.details.source_type(), SourceType::Web);
    assert!(matches!(&edited.details, SourceDetails::Web(w) if w.website_name == "Wikipedia"));
    assert_eq!(edited.authors, vec![author.id]);
}

#[tokio::test]
async fn test_edit_source_clears_optional_properties() {
    let h = harness();
    let (_, source, _) = submit_chain(&h, &owner()).await;

    let edited = h
        .engine
        .edit_source(
            &owner(),
            source.id,
            ChangeSourceRequest {
                book_properties: Some(ChangeBookProperties {
                    pages_from: Some(Some(50)),
                    pages_to: Some(None),
                    publisher: Some(Some("   ".to_string())),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    match &edited.details {
        SourceDetails::Book(book) => {
            assert_eq!(book.title, "Computing Machinery and Intelligence");
            assert_eq!(book.pages_from, Some(50));
            assert_eq!(book.pages_to, None);
            assert_eq!(book.publisher, None);
        }
        other => panic!("Expected a book, got {:?}", other),
    }

    let stored: Source = h.store.get(source.id).await.unwrap();
    assert_eq!(stored.details, edited.details);
}

#[tokio::test]
async fn test_edit_source_rejects_empty_author_list() {
    let h = harness();
    let (_, source, _) = submit_chain(&h, &owner()).await;

    let result = h
        .engine
        .edit_source(
            &owner(),
            source.id,
            ChangeSourceRequest {
                authors: Some(vec![]),
                ..Default::default()
            },
        )
        .await;

    match result {
        Err(CatalogError::ValidationFailed { fields }) => assert_eq!(fields, vec!["authors".to_string()]),
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

// --- Delete ---

#[tokio::test]
async fn test_delete_author_in_use_lists_every_blocking_source() {
    let h = harness();
    let author = submit_author(&h, &owner(), person("Alan", "Turing")).await;
    let first = submit_source(&h, &owner(), &[author.id]).await;
    let second = submit_source(&h, &other_user(), &[author.id]).await;

    let result = h.engine.delete_author(&moderator(), author.id).await;

    match result {
        Err(CatalogError::InUse { kind, id, mut blocking }) => {
            assert_eq!(kind, EntityKind::Author);
            assert_eq!(id, author.id);
            blocking.sort();
            let mut expected = vec![first.id, second.id];
            expected.sort();
            assert_eq!(blocking, expected);
        }
        other => panic!("Expected InUse, got {:?}", other),
    }
    assert!(h.store.get::<Author>(author.id).await.is_ok());
}

#[tokio::test]
async fn test_delete_unreferenced_author_then_lookup_fails() {
    let h = harness();
    let author = submit_author(&h, &owner(), organization("Bourbaki")).await;

    h.engine.delete_author(&admin(), author.id).await.unwrap();

    let lookup = h.store.get::<Author>(author.id).await;
    assert!(matches!(lookup, Err(CatalogError::NotFound { .. })));

    let again = h.engine.delete_author(&admin(), author.id).await;
    assert!(matches!(again, Err(CatalogError::NotFound { kind: EntityKind::Author, .. })));
}

#[tokio::test]
async fn test_delete_source_in_use_lists_definitions() {
    let h = harness();
    let (_, source, definition) = submit_chain(&h, &owner()).await;

    let result = h.engine.delete_source(&moderator(), source.id).await;

    match result {
        Err(CatalogError::InUse { kind, blocking, .. }) => {
            assert_eq!(kind, EntityKind::Source);
            assert_eq!(blocking, vec![definition.id]);
        }
        other => panic!("Expected InUse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_requires_moderator_role() {
    let h = harness();
    let author = submit_author(&h, &owner(), organization("Bourbaki")).await;

    let result = h.engine.delete_author(&owner(), author.id).await;
    assert!(matches!(result, Err(CatalogError::InsufficientRole)));
    assert!(h.store.get::<Author>(author.id).await.is_ok());
}

// --- End to end ---

#[tokio::test]
async fn test_rejected_definition_revised_and_approved() {
    let h = harness();
    let owner = owner();

    let author = submit_author(&h, &owner, person("Alan", "Turing")).await;
    let source = submit_source(&h, &owner, &[author.id]).await;
    let definition = submit_definition(&h, &owner, source.id).await;
    assert_eq!(definition.status(), ModerationStatus::Pending);

    let rejected = h
        .engine
        .reject_definition(&moderator(), definition.id, "Needs a citation.")
        .await
        .unwrap();
    assert_eq!(rejected.status(), ModerationStatus::Declined);

    h.engine
        .edit_definition(
            &owner,
            definition.id,
            ChangeDefinitionRequest {
                content: Some("The capacity to learn and solve problems (Turing, 1950).".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let approved = h.engine.approve_definition(&moderator(), definition.id).await.unwrap();
    assert_eq!(approved.status(), ModerationStatus::Approved);
    assert!(approved.audit.approved_date.is_some_and(|at| at >= approved.audit.last_change_date));

    let source: Source = h.store.get(source.id).await.unwrap();
    let author: Author = h.store.get(author.id).await.unwrap();
    assert!(source.audit.approved && author.audit.approved);

    let deletion = h.engine.delete_author(&moderator(), author.id).await;
    assert!(matches!(deletion, Err(CatalogError::InUse { blocking, .. }) if blocking == vec![source.id]));
}
