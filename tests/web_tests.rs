use cms_portal::{
    AppConfig, AppState, MemoryRepository, MockMediaStorage, TemplateEngine, create_router,
    repository::RepositoryState,
    storage::MediaState,
    templates::TemplateState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let media = Arc::new(MockMediaStorage::new()) as MediaState;
    let templates = Arc::new(TemplateEngine::new()) as TemplateState;
    let config = AppConfig::default();

    let state = AppState {
        repo: repo.clone(),
        media,
        templates,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

/// A browser-like client that keeps cookies across requests and follows the
/// post/redirect/get responses the pages answer with.
fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("client build fail")
}

/// Signs up through the registration form; the session cookie lands in the
/// client's jar during the redirect.
async fn register_via_form(app: &TestApp, client: &reqwest::Client, username: &str) {
    let response = client
        .post(&format!("{}/register/", app.address))
        .form(&[("username", username), ("password", "correct-horse-battery")])
        .send()
        .await
        .expect("register fail");
    assert_eq!(response.status(), 200);
    assert_eq!(response.url().path(), "/content/");
}

/// Submits the creation form and returns the new record's id, parsed from the
/// detail page the browser lands on.
async fn create_via_form(app: &TestApp, client: &reqwest::Client, title: &str, status: &str) -> Uuid {
    let form = reqwest::multipart::Form::new()
        .text("title", title.to_string())
        .text("description", "A description long enough to pass.".to_string())
        .text("content", "Body text typed into the form.".to_string())
        .text("status", status.to_string());

    let response = client
        .post(&format!("{}/content/create/", app.address))
        .multipart(form)
        .send()
        .await
        .expect("create fail");
    assert_eq!(response.status(), 200);

    let path = response.url().path().to_string();
    let id = path
        .strip_prefix("/content/")
        .and_then(|rest| rest.strip_suffix('/'))
        .expect("should land on the detail page");
    id.parse().expect("detail path should contain the record id")
}

#[tokio::test]
async fn test_home_redirects_to_listing() {
    let app = spawn_app().await;
    let client = browser();

    let response = client.get(&app.address).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.url().path(), "/content/");
}

#[tokio::test]
async fn test_register_flow_signs_in_and_shows_flash() {
    let app = spawn_app().await;
    let client = browser();

    let response = client
        .post(&format!("{}/register/", app.address))
        .form(&[("username", "alice"), ("password", "correct-horse-battery")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/content/");

    let body = response.text().await.unwrap();
    assert!(body.contains("Welcome! Your account is ready."));
    assert!(body.contains("alice"));

    // The flash is one-shot; a reload no longer shows it.
    let body = client
        .get(&format!("{}/content/", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!body.contains("Welcome! Your account is ready."));
}

#[tokio::test]
async fn test_register_form_reports_taken_username() {
    let app = spawn_app().await;
    let first = browser();
    register_via_form(&app, &first, "alice").await;

    let second = browser();
    let response = second
        .post(&format!("{}/register/", app.address))
        .form(&[("username", "alice"), ("password", "correct-horse-battery")])
        .send()
        .await
        .unwrap();
    // No redirect; the form re-renders with the field error.
    assert_eq!(response.status(), 200);
    assert_eq!(response.url().path(), "/register/");
    let body = response.text().await.unwrap();
    assert!(body.contains("This username is already taken."));
}

#[tokio::test]
async fn test_anonymous_create_redirects_to_login_with_next() {
    let app = spawn_app().await;
    let client = browser();

    let response = client
        .get(&format!("{}/content/create/", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/login/");
    assert_eq!(response.url().query(), Some("next=/content/create/"));
}

#[tokio::test]
async fn test_login_honors_next_target() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;

    // Drop the session, then come back through the login form.
    client
        .post(&format!("{}/logout/", app.address))
        .send()
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/login/", app.address))
        .form(&[
            ("username", "alice"),
            ("password", "correct-horse-battery"),
            ("next", "/content/create/"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/content/create/");
    let body = response.text().await.unwrap();
    assert!(body.contains("Create content"));
}

#[tokio::test]
async fn test_login_ignores_offsite_next_target() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;
    client
        .post(&format!("{}/logout/", app.address))
        .send()
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/login/", app.address))
        .form(&[
            ("username", "alice"),
            ("password", "correct-horse-battery"),
            ("next", "https://evil.example/phish"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/content/");
}

#[tokio::test]
async fn test_login_failure_rerenders_with_message() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;
    client
        .post(&format!("{}/logout/", app.address))
        .send()
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/login/", app.address))
        .form(&[("username", "alice"), ("password", "wrong-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.url().path(), "/login/");
    let body = response.text().await.unwrap();
    assert!(body.contains("Invalid username or password."));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;

    let response = client
        .post(&format!("{}/logout/", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/content/");
    let body = response.text().await.unwrap();
    assert!(body.contains("Signed out."));
    assert!(body.contains("Log in"));

    // Authenticated pages bounce back to the login form.
    let response = client
        .get(&format!("{}/content/mine/", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/login/");
}

// --- Content Pages ---

#[tokio::test]
async fn test_create_form_flow_lands_on_detail_with_flash() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;

    let form = reqwest::multipart::Form::new()
        .text("title", "From the browser")
        .text("description", "A description long enough to pass.")
        .text("content", "Body text typed into the form.")
        .text("status", "published");
    let response = client
        .post(&format!("{}/content/create/", app.address))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let path = response.url().path().to_string();
    assert!(path.starts_with("/content/"));
    let body = response.text().await.unwrap();
    assert!(body.contains("Content created successfully."));
    assert!(body.contains("From the browser"));

    // The record really exists underneath the page.
    let id: Uuid = path
        .strip_prefix("/content/")
        .and_then(|rest| rest.strip_suffix('/'))
        .unwrap()
        .parse()
        .unwrap();
    let stored = app.repo.get_content(id).await.unwrap().expect("record stored");
    assert_eq!(stored.title, "From the browser");
    assert_eq!(stored.author, "alice");
}

#[tokio::test]
async fn test_empty_create_form_rerenders_with_errors() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;

    let form = reqwest::multipart::Form::new()
        .text("title", "")
        .text("description", "")
        .text("content", "")
        .text("status", "");
    let response = client
        .post(&format!("{}/content/create/", app.address))
        .multipart(form)
        .send()
        .await
        .unwrap();

    // Invalid input re-renders the form in place.
    assert_eq!(response.status(), 200);
    assert_eq!(response.url().path(), "/content/create/");
    let body = response.text().await.unwrap();
    assert!(body.matches("This field is required.").count() >= 3);
}

#[tokio::test]
async fn test_listing_hides_drafts_but_my_content_shows_them() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;

    create_via_form(&app, &client, "Published piece", "published").await;
    create_via_form(&app, &client, "Hidden draft", "draft").await;

    // Anyone browsing the listing sees only the published record.
    let anonymous = browser();
    let body = anonymous
        .get(&format!("{}/content/", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Published piece"));
    assert!(!body.contains("Hidden draft"));

    // The author's own page includes the draft.
    let body = client
        .get(&format!("{}/content/mine/", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Hidden draft"));
    assert!(body.contains("Published piece"));
}

#[tokio::test]
async fn test_listing_search_box_filters_results() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;

    create_via_form(&app, &client, "Rust patterns", "published").await;
    create_via_form(&app, &client, "Garden notes", "published").await;

    let body = client
        .get(&format!("{}/content/?search=rust", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Rust patterns"));
    assert!(!body.contains("Garden notes"));
}

#[tokio::test]
async fn test_detail_page_unknown_id_is_404() {
    let app = spawn_app().await;
    let client = browser();

    let response = client
        .get(&format!("{}/content/{}/", app.address, Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body = response.text().await.unwrap();
    assert!(body.contains("Not found"));
}

#[tokio::test]
async fn test_edit_page_enforces_ownership() {
    let app = spawn_app().await;
    let author = browser();
    register_via_form(&app, &author, "alice").await;
    let id = create_via_form(&app, &author, "Owned by alice", "published").await;

    let intruder = browser();
    register_via_form(&app, &intruder, "bob").await;

    let response = intruder
        .get(&format!("{}/content/{}/edit/", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body = response.text().await.unwrap();
    assert!(body.contains("Forbidden"));
}

#[tokio::test]
async fn test_edit_form_updates_record() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;
    let id = create_via_form(&app, &client, "Before the edit", "draft").await;

    // The form comes prefilled.
    let body = client
        .get(&format!("{}/content/{}/edit/", app.address, id))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Before the edit"));

    let form = reqwest::multipart::Form::new()
        .text("title", "After the edit")
        .text("description", "A description long enough to pass.")
        .text("content", "Body text typed into the form.")
        .text("status", "published");
    let response = client
        .post(&format!("{}/content/{}/edit/", app.address, id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), format!("/content/{}/", id));
    let body = response.text().await.unwrap();
    assert!(body.contains("Content updated successfully."));
    assert!(body.contains("After the edit"));

    let stored = app.repo.get_content(id).await.unwrap().expect("record kept");
    assert_eq!(stored.title, "After the edit");
    assert_eq!(stored.status.as_str(), "published");
}

#[tokio::test]
async fn test_delete_flow_confirms_then_removes() {
    let app = spawn_app().await;
    let client = browser();
    register_via_form(&app, &client, "alice").await;
    let id = create_via_form(&app, &client, "Short lived", "published").await;

    // Confirmation page first.
    let body = client
        .get(&format!("{}/content/{}/delete/", app.address, id))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Are you sure"));
    assert!(body.contains("Short lived"));

    // Then the actual deletion.
    let response = client
        .post(&format!("{}/content/{}/delete/", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/content/");
    let body = response.text().await.unwrap();
    assert!(body.contains("Content deleted."));

    assert!(app.repo.get_content(id).await.unwrap().is_none());
}
