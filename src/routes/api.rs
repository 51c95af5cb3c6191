use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// API Router Module
///
/// Defines the JSON endpoints under `/api`. Read endpoints are open to any
/// client; every mutating endpoint requires a bearer token via the `AuthUser`
/// extractor, and the content handlers enforce the owner-only rule before
/// touching a record.
///
/// Routes are registered with their full paths so they match the OpenAPI
/// annotations on the handlers one-to-one.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(handlers::health_check))
        // --- Content ---
        // GET /api/content/?search=...&status=...&page=...
        // Paginated listing. Without a status filter only published records
        // are returned; drafts never leak into the default view.
        // POST /api/content/
        // Creates a record owned by the bearer of the token.
        .route(
            "/api/content/",
            get(handlers::list_content).post(handlers::create_content),
        )
        // GET /api/content/mine
        // Every record of the authenticated author, drafts included.
        .route("/api/content/mine", get(handlers::get_my_content))
        // GET /api/content/{id}/
        // Single record by id, any status.
        // PATCH /api/content/{id}/
        // Partial update, author only. Existence is checked before ownership
        // so strangers see the same 404 as everyone else.
        // DELETE /api/content/{id}/
        // Removes the record and its stored image, author only.
        .route(
            "/api/content/{id}/",
            get(handlers::get_content_details)
                .patch(handlers::update_content)
                .delete(handlers::delete_content),
        )
        // POST /api/content/{id}/image
        // Multipart image upload; replaces and cleans up any previous image.
        .route("/api/content/{id}/image", post(handlers::upload_content_image))
        // --- Identity ---
        // POST /api/auth/register
        // Account creation. Duplicate usernames come back as 409.
        .route("/api/auth/register", post(handlers::register))
        // POST /api/auth/login
        // Credential check returning a signed bearer token.
        .route("/api/auth/login", post(handlers::login))
        // GET /api/auth/me
        // Profile of the token's owner; doubles as a token validity check.
        .route("/api/auth/me", get(handlers::me))
}
