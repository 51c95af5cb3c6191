use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    models::{
        Content, ContentFilter, ContentInput, ContentPage, LoginRequest, LoginResponse,
        NewUser, RegisterRequest, UserProfile,
    },
    storage, validation,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// ContentListParams
///
/// Accepted query parameters for the public listing endpoint
/// (GET /api/content/). Bound by Axum's Query extractor and normalized into a
/// [`ContentFilter`] before reaching the repository.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ContentListParams {
    /// Case-insensitive substring matched against title, description and text.
    pub search: Option<String>,
    /// Status filter; omitting it lists published records only.
    pub status: Option<String>,
    /// 1-based page number; each page holds ten records.
    pub page: Option<i64>,
}

impl ContentListParams {
    pub fn into_filter(self) -> ContentFilter {
        ContentFilter::new(self.search, self.status, self.page.unwrap_or(1))
    }
}

// --- Content Handlers ---

/// health_check
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_check() -> &'static str {
    "OK"
}

/// list_content
///
/// [Public Route] Paginated listing with optional search and status filter.
/// Without a status filter only published records appear; drafts never leak
/// into the default listing.
#[utoipa::path(
    get,
    path = "/api/content/",
    params(ContentListParams),
    responses((status = 200, description = "A page of content", body = ContentPage))
)]
pub async fn list_content(
    State(state): State<AppState>,
    Query(params): Query<ContentListParams>,
) -> Result<Json<ContentPage>, AppError> {
    let page = state.repo.list_content(&params.into_filter()).await?;
    Ok(Json(page))
}

/// get_content_details
///
/// [Public Route] Single record by id. Drafts are reachable here by anyone
/// holding the id; only the listing hides them.
#[utoipa::path(
    get,
    path = "/api/content/{id}/",
    responses(
        (status = 200, description = "The record", body = Content),
        (status = 404, description = "No such record", body = crate::error::ErrorBody)
    )
)]
pub async fn get_content_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Content>, AppError> {
    let record = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| AppError::not_found("Content"))?;
    Ok(Json(record))
}

/// get_my_content
///
/// [Authenticated Route] Every record the requesting user authored, drafts
/// included, newest first.
#[utoipa::path(
    get,
    path = "/api/content/mine",
    responses(
        (status = 200, description = "Own records", body = [Content]),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody)
    )
)]
pub async fn get_my_content(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Content>>, AppError> {
    let records = state.repo.list_content_by_author(id).await?;
    Ok(Json(records))
}

/// create_content
///
/// [Authenticated Route] Creates a record from a JSON payload. Validation
/// reports every failing field at once; the author fields come from the
/// authenticated identity, never from the payload.
#[utoipa::path(
    post,
    path = "/api/content/",
    request_body = ContentInput,
    responses(
        (status = 201, description = "Created", body = Content),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody)
    )
)]
pub async fn create_content(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ContentInput>,
) -> Result<(StatusCode, Json<Content>), AppError> {
    let new = validation::validate_new(&payload, auth.id, &auth.username)?;
    let record = state.repo.create_content(new).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// update_content
///
/// [Authenticated Route] Partial update of an owned record. Absent fields are
/// untouched; unknown fields (including any attempt to set the author) are
/// ignored by deserialization.
///
/// *Authorization*: existence is checked before ownership, so a missing id is
/// 404 for everyone while someone else's id is 403.
#[utoipa::path(
    patch,
    path = "/api/content/{id}/",
    request_body = ContentInput,
    responses(
        (status = 200, description = "Updated", body = Content),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 403, description = "Not the author", body = crate::error::ErrorBody),
        (status = 404, description = "No such record", body = crate::error::ErrorBody)
    )
)]
pub async fn update_content(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ContentInput>,
) -> Result<Json<Content>, AppError> {
    let existing = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| AppError::not_found("Content"))?;
    if !auth::can_modify(&auth, &existing) {
        return Err(AppError::Forbidden);
    }

    let patch = validation::validate_patch(&payload)?;
    let updated = state
        .repo
        .update_content(id, patch)
        .await?
        .ok_or_else(|| AppError::not_found("Content"))?;
    Ok(Json(updated))
}

/// delete_content
///
/// [Authenticated Route] Deletes an owned record, then removes its stored
/// image on a best-effort basis: the record is gone either way, so a storage
/// hiccup only leaves an orphaned file behind.
#[utoipa::path(
    delete,
    path = "/api/content/{id}/",
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author", body = crate::error::ErrorBody),
        (status = 404, description = "No such record", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_content(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let existing = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| AppError::not_found("Content"))?;
    if !auth::can_modify(&auth, &existing) {
        return Err(AppError::Forbidden);
    }

    if !state.repo.delete_content(id).await? {
        return Err(AppError::not_found("Content"));
    }

    if let Some(key) = existing.image {
        if let Err(err) = state.media.remove(&key).await {
            tracing::warn!("failed to remove image {} for deleted content: {:?}", key, err);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// upload_content_image
///
/// [Authenticated Route] Attaches an image to an owned record via a multipart
/// field named `image`. The key is derived server-side from the validated
/// MIME type; a replaced image is removed from storage afterwards.
#[utoipa::path(
    post,
    path = "/api/content/{id}/image",
    responses(
        (status = 200, description = "Image attached", body = Content),
        (status = 400, description = "Rejected upload", body = crate::error::ErrorBody),
        (status = 403, description = "Not the author", body = crate::error::ErrorBody),
        (status = 404, description = "No such record", body = crate::error::ErrorBody)
    )
)]
pub async fn upload_content_image(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Content>, AppError> {
    let existing = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| AppError::not_found("Content"))?;
    if !auth::can_modify(&auth, &existing) {
        return Err(AppError::Forbidden);
    }

    let (content_type, bytes) = read_image_upload(multipart).await?;
    validation::validate_image(&content_type, bytes.len())?;

    let key = storage::image_key(&content_type);
    state.media.put(&key, &bytes).await?;

    let updated = state
        .repo
        .set_content_image(id, &key)
        .await?
        .ok_or_else(|| AppError::not_found("Content"))?;

    if let Some(old) = existing.image {
        if old != key {
            if let Err(err) = state.media.remove(&old).await {
                tracing::warn!("failed to remove replaced image {}: {:?}", old, err);
            }
        }
    }

    Ok(Json(updated))
}

/// Pulls the `image` field out of a multipart body. Read failures count as a
/// client problem (truncated or oversized upload), not a server error.
async fn read_image_upload(mut multipart: Multipart) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| image_upload_error("Invalid or oversized upload."))?
    {
        if field.name() == Some("image") {
            let content_type = field.content_type().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| image_upload_error("Invalid or oversized upload."))?;
            return Ok((content_type, bytes));
        }
    }
    Err(image_upload_error("No image file was submitted."))
}

fn image_upload_error(message: &str) -> AppError {
    let mut errors = validation::ValidationErrors::default();
    errors.add("image", message);
    AppError::Validation(errors)
}

// --- Identity Handlers ---

/// register
///
/// [Public Route] Creates an account. The password is hashed with Argon2id
/// before it reaches the repository; a taken username answers 409.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    validation::validate_credentials(&payload.username, &payload.password)?;
    let password_hash = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username.trim().to_string(),
            password_hash,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// login
///
/// [Public Route] Verifies credentials and mints a bearer token. Unknown
/// usernames and wrong passwords are indistinguishable from the outside.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Bad credentials", body = crate::error::ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .repo
        .get_user_by_username(payload.username.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let token = auth::mint_token(user.id, &state.config.jwt_secret)?;
    Ok(Json(LoginResponse {
        token,
        id: user.id,
        username: user.username,
    }))
}

/// me
///
/// [Authenticated Route] The profile behind the presented credential.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current profile", body = UserProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody)
    )
)]
pub async fn me(auth: AuthUser) -> Json<UserProfile> {
    Json(UserProfile {
        id: auth.id,
        username: auth.username,
    })
}
