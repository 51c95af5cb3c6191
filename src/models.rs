use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fixed size of every listing page. The query engine never accepts a
/// client-supplied page size.
pub const PAGE_SIZE: i64 = 10;

/// Upper bound for an uploaded content image, in bytes (5 MiB).
pub const IMAGE_MAX_BYTES: usize = 5 * 1024 * 1024;

// --- Core Application Schemas (Mapped to Database) ---

/// ContentStatus
///
/// Publication state of a content record. Stored as lowercase text in the
/// `content.status` column and serialized the same way on the wire, so the
/// database, the JSON API and the HTML forms all speak one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when parsing an unknown status literal.
#[derive(Debug, thiserror::Error)]
#[error("status must be one of: draft, published")]
pub struct InvalidStatus;

impl std::str::FromStr for ContentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            _ => Err(InvalidStatus),
        }
    }
}

// The status column is plain TEXT; decode goes through `FromStr` so an
// unexpected literal surfaces as a column decode error instead of a panic.
impl sqlx::Type<sqlx::Postgres> for ContentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ContentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let text = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(text.parse()?)
    }
}

/// Content
///
/// A single managed content record from the `content` table. This is the
/// primary data structure for the core business logic; the same shape is
/// returned by the JSON API and fed to the HTML templates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Content {
    pub id: Uuid,
    // FK to users.id (Owner). Only this user may modify or delete the record.
    pub author_id: Uuid,
    // Denormalized author username, captured at creation time for display.
    pub author: String,
    pub title: String,
    pub description: String,

    /// Maps the `body` column to the wire field `content`. The Rust field is
    /// named `body` because `Content.content` would stutter.
    #[serde(rename = "content")]
    pub body: String,

    // Media key under the storage root, e.g. "images/<uuid>.png".
    pub image: Option<String>,
    pub status: ContentStatus,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// Canonical identity record from the `users` table. Never serialized to the
/// wire because it carries the password hash; responses use [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// ContentInput
///
/// Raw create/edit payload, deserialized from the JSON API or assembled from
/// HTML form fields. Every field is optional so that presence checks happen in
/// the validation layer, which can then report all missing fields at once
/// instead of failing on the first during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ContentInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "content")]
    pub body: Option<String>,
    /// Raw status literal; validated against [`ContentStatus`].
    pub status: Option<String>,
}

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /api/auth/register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// LoginRequest
///
/// Input payload for POST /api/auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// --- Validated Write Models (Internal) ---

/// NewContent
///
/// A create payload that already passed validation and sanitization. Only the
/// validation layer constructs this, so the repository can trust every field.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub title: String,
    pub description: String,
    pub body: String,
    pub status: ContentStatus,
    pub image: Option<String>,
    pub author_id: Uuid,
    pub author: String,
}

/// ContentPatch
///
/// A validated partial update. `None` means "leave the column unchanged";
/// there is deliberately no way to express an author change.
#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub status: Option<ContentStatus>,
}

// --- Query Engine Schemas ---

/// ContentFilter
///
/// Normalized listing parameters. The same filter drives the SQL query in the
/// Postgres repository and the in-memory predicate in [`ContentFilter::matches`],
/// so both backends agree on what a listing returns.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    /// Case-insensitive substring matched against title, description and body.
    pub search: Option<String>,
    /// Raw status literal compared textually. An unknown value matches nothing
    /// rather than erroring, mirroring how the HTML filter form behaves.
    pub status: Option<String>,
    /// 1-based page number; values below 1 are treated as 1.
    pub page: i64,
}

impl Default for ContentFilter {
    fn default() -> Self {
        ContentFilter { search: None, status: None, page: 1 }
    }
}

impl ContentFilter {
    /// Builds a filter from raw query parameters, dropping blank strings so
    /// that an empty search box means "no filter".
    pub fn new(search: Option<String>, status: Option<String>, page: i64) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        ContentFilter {
            search: clean(search),
            status: clean(status),
            page: page.max(1),
        }
    }

    /// Pure visibility predicate. Without a status filter only published
    /// records are visible; with one, the stored status must match exactly.
    pub fn matches(&self, content: &Content) -> bool {
        let status_ok = match &self.status {
            None => content.status == ContentStatus::Published,
            Some(wanted) => content.status.as_str() == wanted,
        };
        if !status_ok {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                content.title.to_lowercase().contains(&term)
                    || content.description.to_lowercase().contains(&term)
                    || content.body.to_lowercase().contains(&term)
            }
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * PAGE_SIZE
    }
}

/// ContentPage
///
/// Listing envelope shared by the JSON API and the HTML list view. `count` is
/// the total number of matching records, not the number on this page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ContentPage {
    pub results: Vec<Content>,
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl ContentPage {
    /// Computes page metadata. A page past the end yields empty results with
    /// `has_next = false`; an empty result set still reports one total page so
    /// templates can render "page 1 of 1".
    pub fn new(results: Vec<Content>, count: i64, page: i64) -> Self {
        let total_pages = if count == 0 {
            1
        } else {
            (count + PAGE_SIZE - 1) / PAGE_SIZE
        };
        ContentPage {
            results,
            count,
            page,
            page_size: PAGE_SIZE,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

// --- Identity Schemas (Output) ---

/// UserProfile
///
/// Public projection of a [`User`], safe to serialize.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// LoginResponse
///
/// Output of a successful login: the bearer token plus the profile the client
/// usually wants immediately afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub id: Uuid,
    pub username: String,
}

/// NewUser
///
/// Internal create payload for the users table; the password is already
/// hashed by the time this exists.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}
