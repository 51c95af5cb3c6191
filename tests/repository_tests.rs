use cms_portal::{
    MemoryRepository,
    models::{ContentFilter, ContentPatch, ContentStatus, NewContent, NewUser},
    repository::{Repository, RepositoryError},
};
use std::time::Duration;
use uuid::Uuid;

fn sample(author_id: Uuid, title: &str, status: ContentStatus) -> NewContent {
    NewContent {
        title: title.to_string(),
        description: format!("Description for {}", title),
        body: format!("Body for {}", title),
        status,
        image: None,
        author_id,
        author: "alice".to_string(),
    }
}

#[tokio::test]
async fn test_create_assigns_identity_and_timestamps() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();

    let created = repo
        .create_content(sample(author_id, "First", ContentStatus::Draft))
        .await
        .unwrap();
    assert_ne!(created.id, Uuid::nil());
    assert_eq!(created.author_id, author_id);
    assert_eq!(created.created_at, created.updated_at);

    let fetched = repo.get_content(created.id).await.unwrap();
    assert_eq!(fetched.unwrap().title, "First");
}

#[tokio::test]
async fn test_get_unknown_returns_none() {
    let repo = MemoryRepository::new();
    assert!(repo.get_content(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_default_listing_hides_drafts() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    repo.create_content(sample(author_id, "Draft", ContentStatus::Draft))
        .await
        .unwrap();
    let published = repo
        .create_content(sample(author_id, "Published", ContentStatus::Published))
        .await
        .unwrap();

    let page = repo
        .list_content(&ContentFilter::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, published.id);
}

#[tokio::test]
async fn test_status_filter_is_textual_and_exact() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    repo.create_content(sample(author_id, "Draft", ContentStatus::Draft))
        .await
        .unwrap();

    let drafts = repo
        .list_content(&ContentFilter::new(None, Some("draft".to_string()), 1))
        .await
        .unwrap();
    assert_eq!(drafts.count, 1);

    // Unknown literals match nothing instead of erroring.
    let none = repo
        .list_content(&ContentFilter::new(None, Some("archived".to_string()), 1))
        .await
        .unwrap();
    assert_eq!(none.count, 0);
}

#[tokio::test]
async fn test_search_spans_all_text_fields() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    repo.create_content(sample(author_id, "Rust Guide", ContentStatus::Published))
        .await
        .unwrap();

    for term in ["GUIDE", "description for", "body FOR"] {
        let page = repo
            .list_content(&ContentFilter::new(Some(term.to_string()), None, 1))
            .await
            .unwrap();
        assert_eq!(page.count, 1, "term {:?} should match", term);
    }

    let page = repo
        .list_content(&ContentFilter::new(Some("zeppelin".to_string()), None, 1))
        .await
        .unwrap();
    assert_eq!(page.count, 0);
}

#[tokio::test]
async fn test_listing_orders_newest_first() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();

    // Spaced out so the creation timestamps are strictly increasing.
    for title in ["Oldest", "Middle", "Newest"] {
        repo.create_content(sample(author_id, title, ContentStatus::Published))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let page = repo
        .list_content(&ContentFilter::default())
        .await
        .unwrap();
    let titles: Vec<&str> = page.results.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Newest", "Middle", "Oldest"]);
}

#[tokio::test]
async fn test_pagination_slices_into_pages_of_ten() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    for i in 1..=15 {
        repo.create_content(sample(
            author_id,
            &format!("Record {:02}", i),
            ContentStatus::Published,
        ))
        .await
        .unwrap();
    }

    let first = repo
        .list_content(&ContentFilter::new(None, None, 1))
        .await
        .unwrap();
    assert_eq!(first.count, 15);
    assert_eq!(first.results.len(), 10);
    assert_eq!(first.total_pages, 2);
    assert!(first.has_next);
    assert!(!first.has_previous);

    let second = repo
        .list_content(&ContentFilter::new(None, None, 2))
        .await
        .unwrap();
    assert_eq!(second.results.len(), 5);
    assert!(second.has_previous);
    assert!(!second.has_next);

    // The two pages partition the records.
    let mut seen: Vec<Uuid> = first
        .results
        .iter()
        .chain(second.results.iter())
        .map(|c| c.id)
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 15);

    // Far past the end: empty results, same count.
    let ninth = repo
        .list_content(&ContentFilter::new(None, None, 9))
        .await
        .unwrap();
    assert_eq!(ninth.count, 15);
    assert!(ninth.results.is_empty());
}

#[tokio::test]
async fn test_update_patches_only_provided_fields() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    let created = repo
        .create_content(sample(author_id, "Original", ContentStatus::Draft))
        .await
        .unwrap();

    let patch = ContentPatch {
        title: Some("Renamed".to_string()),
        status: Some(ContentStatus::Published),
        ..Default::default()
    };
    let updated = repo
        .update_content(created.id, patch)
        .await
        .unwrap()
        .expect("record exists");
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.status, ContentStatus::Published);
    assert_eq!(updated.description, created.description);
    assert!(updated.updated_at >= created.updated_at);

    // Unknown ids update nothing.
    let missing = repo
        .update_content(Uuid::new_v4(), ContentPatch::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_set_content_image_stores_key() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    let created = repo
        .create_content(sample(author_id, "Illustrated", ContentStatus::Published))
        .await
        .unwrap();

    let updated = repo
        .set_content_image(created.id, "images/abc.png")
        .await
        .unwrap()
        .expect("record exists");
    assert_eq!(updated.image.as_deref(), Some("images/abc.png"));

    assert!(
        repo.set_content_image(Uuid::new_v4(), "images/ghost.png")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_delete_content_removes_record() {
    let repo = MemoryRepository::new();
    let author_id = Uuid::new_v4();
    let created = repo
        .create_content(sample(author_id, "Short lived", ContentStatus::Published))
        .await
        .unwrap();

    assert!(repo.delete_content(created.id).await.unwrap());
    assert!(repo.get_content(created.id).await.unwrap().is_none());
    assert!(!repo.delete_content(created.id).await.unwrap());
}

#[tokio::test]
async fn test_list_by_author_includes_drafts_and_excludes_others() {
    let repo = MemoryRepository::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    repo.create_content(sample(alice, "Alice draft", ContentStatus::Draft))
        .await
        .unwrap();
    repo.create_content(sample(alice, "Alice post", ContentStatus::Published))
        .await
        .unwrap();
    repo.create_content(sample(bob, "Bob post", ContentStatus::Published))
        .await
        .unwrap();

    let records = repo.list_content_by_author(alice).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.author_id == alice));
}

// --- Accounts ---

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let repo = MemoryRepository::new();
    let new_user = |name: &str| NewUser {
        username: name.to_string(),
        password_hash: "$argon2id$fake".to_string(),
    };

    repo.create_user(new_user("alice")).await.unwrap();
    let err = repo.create_user(new_user("alice")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateUsername));
}

#[tokio::test]
async fn test_get_user_by_username_is_exact() {
    let repo = MemoryRepository::new();
    let created = repo
        .create_user(NewUser {
            username: "alice".to_string(),
            password_hash: "$argon2id$fake".to_string(),
        })
        .await
        .unwrap();

    let found = repo.get_user_by_username("alice").await.unwrap();
    assert_eq!(found.unwrap().id, created.id);
    assert!(repo.get_user_by_username("Alice").await.unwrap().is_none());

    let by_id = repo.get_user(created.id).await.unwrap();
    assert_eq!(by_id.unwrap().username, "alice");
}
