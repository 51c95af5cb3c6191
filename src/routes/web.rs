use crate::{AppState, web};
use axum::{
    Router,
    routing::{get, post},
};

/// Web Router Module
///
/// Defines the server-rendered HTML pages. These routes carry identity in the
/// session cookie instead of a bearer header, and their handlers answer with
/// redirects and rendered templates rather than JSON. Pages that require an
/// account redirect anonymous visitors to `/login/` with a `next` parameter
/// pointing back at the page they wanted.
pub fn web_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Lands on the content listing.
        .route("/", get(web::home))
        // GET /content/
        // Public listing with search, status filter and paging.
        .route("/content/", get(web::content_list_page))
        // GET /content/mine/
        // The signed-in author's records, drafts included.
        .route("/content/mine/", get(web::my_content_page))
        // GET/POST /content/create/
        // Multipart creation form and its submission.
        .route(
            "/content/create/",
            get(web::content_create_page).post(web::content_create_submit),
        )
        // GET /content/{id}/
        // Public detail page; the author also sees edit and delete links.
        .route("/content/{id}/", get(web::content_detail_page))
        // GET/POST /content/{id}/edit/
        // Prefilled edit form, author only.
        .route(
            "/content/{id}/edit/",
            get(web::content_edit_page).post(web::content_edit_submit),
        )
        // GET/POST /content/{id}/delete/
        // Confirmation page and the actual deletion.
        .route(
            "/content/{id}/delete/",
            get(web::content_delete_page).post(web::content_delete_submit),
        )
        // --- Identity ---
        // GET/POST /login/
        .route("/login/", get(web::login_page).post(web::login_submit))
        // GET/POST /register/
        .route("/register/", get(web::register_page).post(web::register_submit))
        // POST /logout/
        // Logout is a POST so a crawled link can never end a session.
        .route("/logout/", post(web::logout))
        // GET /media/{key}
        // Stored images, served through the media storage trait.
        .route("/media/{*key}", get(web::media_file))
}
