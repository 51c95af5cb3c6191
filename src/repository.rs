use crate::models::{
    Content, ContentFilter, ContentPage, ContentPatch, NewContent, NewUser, User, PAGE_SIZE,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// RepositoryError
///
/// Persistence failures surfaced to the handlers. Uniqueness violations get
/// their own variant so the facades can answer 409 instead of 500.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("username is already taken")]
    DuplicateUsername,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers interact with
/// the data layer through this trait only, so the Postgres implementation and
/// the in-memory implementation are interchangeable behind
/// `Arc<dyn Repository>`.
///
/// **Send + Sync + async_trait** are required to make the trait object safely
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Content Retrieval ---
    /// Paginated listing. Must apply the filter's visibility rule: published
    /// records only unless an explicit status filter is present.
    async fn list_content(&self, filter: &ContentFilter) -> Result<ContentPage, RepositoryError>;
    /// Everything a single author owns, drafts included, newest first.
    async fn list_content_by_author(&self, author_id: Uuid)
        -> Result<Vec<Content>, RepositoryError>;
    /// Single record by id regardless of status; callers decide visibility.
    async fn get_content(&self, id: Uuid) -> Result<Option<Content>, RepositoryError>;

    // --- Content Actions ---
    async fn create_content(&self, new: NewContent) -> Result<Content, RepositoryError>;
    /// Partial update; `None` fields keep their column value. Returns the
    /// fresh record, or `None` if the id vanished meanwhile.
    async fn update_content(
        &self,
        id: Uuid,
        patch: ContentPatch,
    ) -> Result<Option<Content>, RepositoryError>;
    /// Points the record at a new stored image key.
    async fn set_content_image(
        &self,
        id: Uuid,
        image: &str,
    ) -> Result<Option<Content>, RepositoryError>;
    /// Returns true if a row was actually deleted.
    async fn delete_content(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn get_user_by_username(&self, username: &str)
        -> Result<Option<User>, RepositoryError>;
    /// Fails with [`RepositoryError::DuplicateUsername`] on a taken name.
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres Implementation ---

/// PostgresRepository
///
/// The production implementation, backed by a PostgreSQL pool. All queries
/// are built at runtime; filters go through `QueryBuilder::push_bind` so user
/// input is always parameterized, never spliced into the SQL text.
pub struct PostgresRepository {
    pool: PgPool,
}

const CONTENT_COLUMNS: &str =
    "id, author_id, author, title, description, body, image, status, created_at, updated_at";

/// Appends the WHERE clauses shared by the count and page queries, mirroring
/// [`ContentFilter::matches`] exactly.
fn push_filter(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ContentFilter) {
    match &filter.status {
        Some(status) => {
            builder.push("status = ");
            builder.push_bind(status.clone());
        }
        // Visibility rule: unfiltered listings show published records only.
        None => {
            builder.push("status = 'published'");
        }
    }

    if let Some(term) = &filter.search {
        // Case-insensitive search across title, description and body.
        let pattern = format!("%{}%", term);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR body ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the idempotent bootstrap schema. Run at startup in local mode;
    /// production databases are migrated separately.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(include_str!("../db/schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_content
    ///
    /// Runs the count and page queries with the same filter clauses, so the
    /// envelope metadata always agrees with the rows. The page size is fixed;
    /// a page past the end simply returns no rows.
    async fn list_content(&self, filter: &ContentFilter) -> Result<ContentPage, RepositoryError> {
        let mut count_query: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM content WHERE ");
        push_filter(&mut count_query, filter);
        let count: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_query: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE "
        ));
        push_filter(&mut page_query, filter);
        page_query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        page_query.push_bind(PAGE_SIZE);
        page_query.push(" OFFSET ");
        page_query.push_bind(filter.offset());

        let results = page_query
            .build_query_as::<Content>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ContentPage::new(results, count, filter.page.max(1)))
    }

    /// list_content_by_author
    ///
    /// The owner's dashboard view: every record they authored, regardless of
    /// status, newest first.
    async fn list_content_by_author(
        &self,
        author_id: Uuid,
    ) -> Result<Vec<Content>, RepositoryError> {
        let results = sqlx::query_as::<_, Content>(
            "SELECT id, author_id, author, title, description, body, image, status, \
             created_at, updated_at FROM content WHERE author_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<Content>, RepositoryError> {
        let record = sqlx::query_as::<_, Content>(
            "SELECT id, author_id, author, title, description, body, image, status, \
             created_at, updated_at FROM content WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// create_content
    ///
    /// Inserts a validated record. The id is generated here; timestamps are
    /// assigned by the database so ordering matches insertion order.
    async fn create_content(&self, new: NewContent) -> Result<Content, RepositoryError> {
        let new_id = Uuid::new_v4();
        let record = sqlx::query_as::<_, Content>(
            "INSERT INTO content (id, author_id, author, title, description, body, image, \
             status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             RETURNING id, author_id, author, title, description, body, image, status, \
             created_at, updated_at",
        )
        .bind(new_id)
        .bind(new.author_id)
        .bind(&new.author)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.body)
        .bind(&new.image)
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// update_content
    ///
    /// Uses PostgreSQL `COALESCE` to apply only the fields present in the
    /// patch. The author columns are never part of the SET list, so ownership
    /// cannot drift through this path.
    async fn update_content(
        &self,
        id: Uuid,
        patch: ContentPatch,
    ) -> Result<Option<Content>, RepositoryError> {
        let record = sqlx::query_as::<_, Content>(
            "UPDATE content \
             SET title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 body = COALESCE($4, body), \
                 status = COALESCE($5, status), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, author_id, author, title, description, body, image, status, \
             created_at, updated_at",
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.body)
        .bind(patch.status.map(|status| status.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn set_content_image(
        &self,
        id: Uuid,
        image: &str,
    ) -> Result<Option<Content>, RepositoryError> {
        let record = sqlx::query_as::<_, Content>(
            "UPDATE content SET image = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING id, author_id, author, title, description, body, image, status, \
             created_at, updated_at",
        )
        .bind(id)
        .bind(image)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete_content(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM content WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Relies on the UNIQUE constraint rather than a check-then-insert race;
    /// a unique violation is translated into `DuplicateUsername`.
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let new_id = Uuid::new_v4();
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, password_hash, created_at) \
             VALUES ($1, $2, $3, NOW()) \
             RETURNING id, username, password_hash, created_at",
        )
        .bind(new_id)
        .bind(&new.username)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                RepositoryError::DuplicateUsername
            } else {
                RepositoryError::Database(err)
            }
        })?;
        Ok(user)
    }
}

// --- In-Memory Implementation ---

/// MemoryRepository
///
/// Mutex-guarded maps implementing the same contract. Serves two jobs: the
/// store for local runs without a DATABASE_URL, and the backend for the
/// integration test suites. Listing delegates to [`ContentFilter::matches`],
/// so both implementations share one visibility definition.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    content: HashMap<Uuid, Content>,
    users: HashMap<Uuid, User>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first with the id as a tiebreak, matching the SQL ORDER BY.
fn sort_newest_first(records: &mut [Content]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_content(&self, filter: &ContentFilter) -> Result<ContentPage, RepositoryError> {
        let inner = self.inner.lock().expect("repository lock poisoned");
        let mut matched: Vec<Content> = inner
            .content
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        drop(inner);

        sort_newest_first(&mut matched);

        let count = matched.len() as i64;
        let page = filter.page.max(1);
        let start = filter.offset() as usize;
        let results = if start >= matched.len() {
            Vec::new()
        } else {
            matched
                .into_iter()
                .skip(start)
                .take(PAGE_SIZE as usize)
                .collect()
        };

        Ok(ContentPage::new(results, count, page))
    }

    async fn list_content_by_author(
        &self,
        author_id: Uuid,
    ) -> Result<Vec<Content>, RepositoryError> {
        let inner = self.inner.lock().expect("repository lock poisoned");
        let mut records: Vec<Content> = inner
            .content
            .values()
            .filter(|record| record.author_id == author_id)
            .cloned()
            .collect();
        drop(inner);

        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<Content>, RepositoryError> {
        let inner = self.inner.lock().expect("repository lock poisoned");
        Ok(inner.content.get(&id).cloned())
    }

    async fn create_content(&self, new: NewContent) -> Result<Content, RepositoryError> {
        let now = Utc::now();
        let record = Content {
            id: Uuid::new_v4(),
            author_id: new.author_id,
            author: new.author,
            title: new.title,
            description: new.description,
            body: new.body,
            image: new.image,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.lock().expect("repository lock poisoned");
        inner.content.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_content(
        &self,
        id: Uuid,
        patch: ContentPatch,
    ) -> Result<Option<Content>, RepositoryError> {
        let mut inner = self.inner.lock().expect("repository lock poisoned");
        let Some(record) = inner.content.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(description) = patch.description {
            record.description = description;
        }
        if let Some(body) = patch.body {
            record.body = body;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn set_content_image(
        &self,
        id: Uuid,
        image: &str,
    ) -> Result<Option<Content>, RepositoryError> {
        let mut inner = self.inner.lock().expect("repository lock poisoned");
        let Some(record) = inner.content.get_mut(&id) else {
            return Ok(None);
        };
        record.image = Some(image.to_string());
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete_content(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().expect("repository lock poisoned");
        Ok(inner.content.remove(&id).is_some())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().expect("repository lock poisoned");
        Ok(inner.users.get(&id).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().expect("repository lock poisoned");
        Ok(inner
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut inner = self.inner.lock().expect("repository lock poisoned");
        if inner.users.values().any(|user| user.username == new.username) {
            return Err(RepositoryError::DuplicateUsername);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }
}
