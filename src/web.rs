use axum::{
    Form,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use minijinja::context;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    handlers::ContentListParams,
    models::{Content, ContentInput, NewUser},
    repository::RepositoryError,
    storage::{self, StorageError},
    validation::{self, ValidationErrors},
};

/// Cookie carrying a one-shot flash code; read and cleared on the next page.
const FLASH_COOKIE: &str = "cms_flash";

// --- Page Error Handling ---

/// PageError
///
/// The HTML counterpart of [`AppError`]: failures become redirects (missing
/// authentication) or minimal standalone error pages. The fallback pages are
/// rendered without the template engine so a template failure can still
/// produce a response.
#[derive(Debug)]
pub enum PageError {
    Redirect(String),
    Page {
        status: StatusCode,
        title: &'static str,
        message: String,
    },
}

impl PageError {
    fn not_found(message: &str) -> Self {
        PageError::Page {
            status: StatusCode::NOT_FOUND,
            title: "Not found",
            message: message.to_string(),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Redirect(to) => Redirect::to(&to).into_response(),
            PageError::Page { status, title, message } => {
                (status, Html(fallback_page(title, &message))).into_response()
            }
        }
    }
}

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::AuthRequired | AppError::InvalidCredentials => {
                PageError::Redirect("/login/".to_string())
            }
            AppError::Forbidden => PageError::Page {
                status: StatusCode::FORBIDDEN,
                title: "Forbidden",
                message: "You do not have permission to modify this content.".to_string(),
            },
            AppError::NotFound(message) => PageError::not_found(&message),
            AppError::Validation(errors) => PageError::Page {
                status: StatusCode::BAD_REQUEST,
                title: "Invalid request",
                message: errors.to_string(),
            },
            AppError::Conflict(message) => PageError::Page {
                status: StatusCode::CONFLICT,
                title: "Conflict",
                message,
            },
            AppError::Internal(detail) => {
                tracing::error!("page failed with internal error: {}", detail);
                PageError::Page {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    title: "Server error",
                    message: "Something went wrong.".to_string(),
                }
            }
        }
    }
}

impl From<RepositoryError> for PageError {
    fn from(err: RepositoryError) -> Self {
        AppError::from(err).into()
    }
}

impl From<StorageError> for PageError {
    fn from(err: StorageError) -> Self {
        AppError::from(err).into()
    }
}

impl From<minijinja::Error> for PageError {
    fn from(err: minijinja::Error) -> Self {
        tracing::error!("template rendering failed: {:?}", err);
        PageError::Page {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            title: "Server error",
            message: "Something went wrong.".to_string(),
        }
    }
}

/// Bare-bones error page used when the template engine is unavailable or the
/// failure is terminal. The inputs are server-controlled strings.
fn fallback_page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title></head><body><h1>{title}</h1><p>{message}</p>\
         <p><a href=\"/content/\">Back to all content</a></p></body></html>"
    )
}

// --- Cookie Helpers ---

/// Redeems a stored flash code for its message and clears the cookie. The
/// cookie holds a short code rather than free text so the value never needs
/// escaping.
fn take_flash(jar: CookieJar) -> (CookieJar, Option<&'static str>) {
    match jar.get(FLASH_COOKIE) {
        Some(cookie) => {
            let message = flash_message(cookie.value());
            let jar = jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/").build());
            (jar, message)
        }
        None => (jar, None),
    }
}

fn flash_message(code: &str) -> Option<&'static str> {
    match code {
        "created" => Some("Content created successfully."),
        "updated" => Some("Content updated successfully."),
        "deleted" => Some("Content deleted."),
        "welcome" => Some("Welcome! Your account is ready."),
        "signed-in" => Some("Signed in."),
        "signed-out" => Some("Signed out."),
        _ => None,
    }
}

/// Sets a flash code and redirects. Used after every successful mutation so a
/// refresh of the landing page cannot repeat the action.
fn flash_redirect(jar: CookieJar, code: &str, to: &str) -> Response {
    let jar = jar.add(
        Cookie::build((FLASH_COOKIE, code.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build(),
    );
    (jar, Redirect::to(to)).into_response()
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((auth::SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn login_redirect(next: &str) -> PageError {
    PageError::Redirect(format!("/login/?next={next}"))
}

/// Only same-site paths are allowed as a post-login target; anything else
/// falls back to the listing.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/content/"
    }
}

// --- Context Helpers ---

fn profile(user: &AuthUser) -> serde_json::Value {
    json!({ "id": user.id, "username": user.username })
}

/// Re-render values for the content form after a rejected submission.
fn form_values(input: &ContentInput) -> serde_json::Value {
    json!({
        "title": input.title.as_deref().unwrap_or(""),
        "description": input.description.as_deref().unwrap_or(""),
        "content": input.body.as_deref().unwrap_or(""),
        "status": input.status.as_deref().unwrap_or("draft"),
    })
}

/// Prefill values for the edit form.
fn record_values(record: &Content) -> serde_json::Value {
    json!({
        "title": record.title,
        "description": record.description,
        "content": record.body,
        "status": record.status.as_str(),
    })
}

#[allow(clippy::too_many_arguments)]
fn render_content_form(
    state: &AppState,
    user: &AuthUser,
    heading: &str,
    action: &str,
    values: serde_json::Value,
    errors: ValidationErrors,
    current_image: Option<&str>,
    flash: Option<&str>,
) -> Result<Response, PageError> {
    let html = state.templates.render(
        "content_form.html",
        context! {
            user => profile(user),
            flash => flash,
            heading => heading,
            action => action,
            values => values,
            errors => errors,
            current_image => current_image,
        },
    )?;
    Ok(Html(html).into_response())
}

// --- Form Payloads ---

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// An image part pulled out of a multipart form submission.
struct UploadedImage {
    content_type: String,
    bytes: Bytes,
}

fn unreadable_form(_: axum::extract::multipart::MultipartError) -> PageError {
    PageError::Page {
        status: StatusCode::BAD_REQUEST,
        title: "Invalid request",
        message: "The submitted form could not be read.".to_string(),
    }
}

/// Collects the content form fields plus the optional image part. Browsers
/// submit an empty `image` part when no file is chosen; that counts as "no
/// upload", not an empty upload.
async fn read_content_form(
    mut multipart: Multipart,
) -> Result<(ContentInput, Option<UploadedImage>), PageError> {
    let mut input = ContentInput::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(unreadable_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => input.title = Some(field.text().await.map_err(unreadable_form)?),
            "description" => {
                input.description = Some(field.text().await.map_err(unreadable_form)?)
            }
            "content" => input.body = Some(field.text().await.map_err(unreadable_form)?),
            "status" => input.status = Some(field.text().await.map_err(unreadable_form)?),
            "image" => {
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(unreadable_form)?;
                if !bytes.is_empty() {
                    image = Some(UploadedImage { content_type, bytes });
                }
            }
            _ => {}
        }
    }

    Ok((input, image))
}

fn check_upload(upload: Option<&UploadedImage>) -> Result<(), ValidationErrors> {
    match upload {
        Some(upload) => validation::validate_image(&upload.content_type, upload.bytes.len()),
        None => Ok(()),
    }
}

// --- Page Handlers ---

/// GET / simply lands on the listing.
pub async fn home() -> Redirect {
    Redirect::to("/content/")
}

/// GET /content/ renders the public listing with search, status filter and paging.
pub async fn content_list_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(params): Query<ContentListParams>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let (jar, flash) = take_flash(jar);
    let filter = params.into_filter();
    let page = state.repo.list_content(&filter).await?;

    let html = state.templates.render(
        "content_list.html",
        context! {
            user => user.as_ref().map(profile),
            flash => flash,
            page => page,
            search => filter.search.clone().unwrap_or_default(),
            status => filter.status.clone().unwrap_or_default(),
        },
    )?;
    Ok((jar, Html(html)).into_response())
}

/// GET /content/{id}/ renders the public detail view. Drafts are visible to anyone who
/// has the id; the author additionally sees edit and delete links.
pub async fn content_detail_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let (jar, flash) = take_flash(jar);
    let record = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| PageError::not_found("Content not found."))?;
    let can_modify = user
        .as_ref()
        .is_some_and(|user| auth::can_modify(user, &record));

    let html = state.templates.render(
        "content_detail.html",
        context! {
            user => user.as_ref().map(profile),
            flash => flash,
            content => record,
            can_modify => can_modify,
        },
    )?;
    Ok((jar, Html(html)).into_response())
}

/// GET /content/mine/ lists the author's own records, drafts included.
pub async fn my_content_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect("/content/mine/"));
    };
    let (jar, flash) = take_flash(jar);
    let records = state.repo.list_content_by_author(user.id).await?;

    let html = state.templates.render(
        "my_content.html",
        context! {
            user => profile(&user),
            flash => flash,
            records => records,
        },
    )?;
    Ok((jar, Html(html)).into_response())
}

/// GET /content/create/ renders an empty form, authors only.
pub async fn content_create_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect("/content/create/"));
    };
    let (jar, flash) = take_flash(jar);
    let page = render_content_form(
        &state,
        &user,
        "Create content",
        "/content/create/",
        form_values(&ContentInput::default()),
        ValidationErrors::default(),
        None,
        flash,
    )?;
    Ok((jar, page).into_response())
}

/// POST /content/create/ validates the multipart submission; on success
/// stores the optional image, creates the record and lands on its detail
/// page. On failure the form re-renders with every field error.
pub async fn content_create_submit(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect("/content/create/"));
    };
    let (input, upload) = read_content_form(multipart).await?;

    match (
        validation::validate_new(&input, user.id, &user.username),
        check_upload(upload.as_ref()),
    ) {
        (Ok(mut new), Ok(())) => {
            if let Some(upload) = upload {
                let key = storage::image_key(&upload.content_type);
                state.media.put(&key, &upload.bytes).await?;
                new.image = Some(key);
            }
            let record = state.repo.create_content(new).await?;
            Ok(flash_redirect(jar, "created", &format!("/content/{}/", record.id)))
        }
        (text_result, image_result) => {
            let mut errors = text_result.err().unwrap_or_default();
            if let Err(image_errors) = image_result {
                errors.merge(image_errors);
            }
            render_content_form(
                &state,
                &user,
                "Create content",
                "/content/create/",
                form_values(&input),
                errors,
                None,
                None,
            )
        }
    }
}

/// GET /content/{id}/edit/ renders the prefilled form, author only.
pub async fn content_edit_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect(&format!("/content/{id}/edit/")));
    };
    let record = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| PageError::not_found("Content not found."))?;
    if !auth::can_modify(&user, &record) {
        return Err(AppError::Forbidden.into());
    }

    let (jar, flash) = take_flash(jar);
    let page = render_content_form(
        &state,
        &user,
        "Edit content",
        &format!("/content/{id}/edit/"),
        record_values(&record),
        ValidationErrors::default(),
        record.image.as_deref(),
        flash,
    )?;
    Ok((jar, page).into_response())
}

/// POST /content/{id}/edit/ applies a full-form update in the same order the API
/// uses: authentication, existence, ownership, then validation.
pub async fn content_edit_submit(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect(&format!("/content/{id}/edit/")));
    };
    let record = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| PageError::not_found("Content not found."))?;
    if !auth::can_modify(&user, &record) {
        return Err(AppError::Forbidden.into());
    }

    let (input, upload) = read_content_form(multipart).await?;
    let action = format!("/content/{id}/edit/");

    match (validation::validate_patch(&input), check_upload(upload.as_ref())) {
        (Ok(patch), Ok(())) => {
            state
                .repo
                .update_content(id, patch)
                .await?
                .ok_or_else(|| PageError::not_found("Content not found."))?;

            if let Some(upload) = upload {
                let key = storage::image_key(&upload.content_type);
                state.media.put(&key, &upload.bytes).await?;
                state
                    .repo
                    .set_content_image(id, &key)
                    .await?
                    .ok_or_else(|| PageError::not_found("Content not found."))?;
                if let Some(old) = &record.image {
                    if old != &key {
                        if let Err(err) = state.media.remove(old).await {
                            tracing::warn!("failed to remove replaced image {}: {:?}", old, err);
                        }
                    }
                }
            }

            Ok(flash_redirect(jar, "updated", &format!("/content/{id}/")))
        }
        (text_result, image_result) => {
            let mut errors = text_result.err().unwrap_or_default();
            if let Err(image_errors) = image_result {
                errors.merge(image_errors);
            }
            render_content_form(
                &state,
                &user,
                "Edit content",
                &action,
                form_values(&input),
                errors,
                record.image.as_deref(),
                None,
            )
        }
    }
}

/// GET /content/{id}/delete/ renders the confirmation page, author only.
pub async fn content_delete_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect(&format!("/content/{id}/delete/")));
    };
    let record = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| PageError::not_found("Content not found."))?;
    if !auth::can_modify(&user, &record) {
        return Err(AppError::Forbidden.into());
    }

    let (jar, flash) = take_flash(jar);
    let html = state.templates.render(
        "content_confirm_delete.html",
        context! {
            user => profile(&user),
            flash => flash,
            content => record,
        },
    )?;
    Ok((jar, Html(html)).into_response())
}

/// POST /content/{id}/delete/ deletes the record and cleans up the stored image.
pub async fn content_delete_submit(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let Some(user) = user else {
        return Err(login_redirect(&format!("/content/{id}/delete/")));
    };
    let record = state
        .repo
        .get_content(id)
        .await?
        .ok_or_else(|| PageError::not_found("Content not found."))?;
    if !auth::can_modify(&user, &record) {
        return Err(AppError::Forbidden.into());
    }

    if !state.repo.delete_content(id).await? {
        return Err(PageError::not_found("Content not found."));
    }
    if let Some(key) = record.image {
        if let Err(err) = state.media.remove(&key).await {
            tracing::warn!("failed to remove image {} for deleted content: {:?}", key, err);
        }
    }

    Ok(flash_redirect(jar, "deleted", "/content/"))
}

// --- Identity Pages ---

/// GET /login/ renders the sign-in form; already-authenticated visitors go straight to
/// the listing.
pub async fn login_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    if user.is_some() {
        return Err(PageError::Redirect("/content/".to_string()));
    }
    let (jar, flash) = take_flash(jar);
    let html = state.templates.render(
        "login.html",
        context! {
            user => (),
            flash => flash,
            next => query.next.unwrap_or_default(),
            error => (),
        },
    )?;
    Ok((jar, Html(html)).into_response())
}

/// POST /login/ verifies the credentials, sets the session cookie and
/// honors a same-site `next` target. Failures re-render with one generic
/// message; the form never says which half was wrong.
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let user = state
        .repo
        .get_user_by_username(form.username.trim())
        .await?;
    let verified = user
        .as_ref()
        .is_some_and(|user| auth::verify_password(&form.password, &user.password_hash));

    let Some(user) = user.filter(|_| verified) else {
        let html = state.templates.render(
            "login.html",
            context! {
                user => (),
                flash => (),
                next => form.next,
                error => "Invalid username or password.",
            },
        )?;
        return Ok(Html(html).into_response());
    };

    let token = auth::mint_token(user.id, &state.config.jwt_secret)?;
    let jar = jar.add(session_cookie(token));
    Ok(flash_redirect(jar, "signed-in", safe_next(&form.next)))
}

/// GET /register/ renders the account creation form.
pub async fn register_page(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    if user.is_some() {
        return Err(PageError::Redirect("/content/".to_string()));
    }
    let (jar, flash) = take_flash(jar);
    let html = state.templates.render(
        "register.html",
        context! {
            user => (),
            flash => flash,
            values => json!({ "username": "" }),
            errors => ValidationErrors::default(),
        },
    )?;
    Ok((jar, Html(html)).into_response())
}

/// POST /register/ creates the account and signs the visitor in. A taken
/// username comes back as a field error on the form, not a bare 409.
pub async fn register_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    let rerender = |errors: ValidationErrors| -> Result<Response, PageError> {
        let html = state.templates.render(
            "register.html",
            context! {
                user => (),
                flash => (),
                values => json!({ "username": form.username }),
                errors => errors,
            },
        )?;
        Ok(Html(html).into_response())
    };

    if let Err(errors) = validation::validate_credentials(&form.username, &form.password) {
        return rerender(errors);
    }

    let password_hash = auth::hash_password(&form.password)?;
    match state
        .repo
        .create_user(NewUser {
            username: form.username.trim().to_string(),
            password_hash,
        })
        .await
    {
        Ok(user) => {
            let token = auth::mint_token(user.id, &state.config.jwt_secret)?;
            let jar = jar.add(session_cookie(token));
            Ok(flash_redirect(jar, "welcome", "/content/"))
        }
        Err(RepositoryError::DuplicateUsername) => {
            let mut errors = ValidationErrors::default();
            errors.add("username", "This username is already taken.");
            rerender(errors)
        }
        Err(other) => Err(other.into()),
    }
}

/// POST /logout/ clears the session cookie.
pub async fn logout(jar: CookieJar) -> Response {
    let jar = jar.remove(Cookie::build((auth::SESSION_COOKIE, "")).path("/").build());
    flash_redirect(jar, "signed-out", "/content/")
}

// --- Media ---

/// GET /media/{key} serves stored image bytes through the storage trait, so
/// the HTML pages work the same against the filesystem store and the mock.
pub async fn media_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, PageError> {
    let Some(bytes) = state.media.get(&key).await? else {
        return Err(PageError::not_found("Media not found."));
    };
    Ok((
        [(header::CONTENT_TYPE, storage::content_type_for_key(&key))],
        bytes,
    )
        .into_response())
}
