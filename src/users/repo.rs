use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::filters::{like_pattern, Predicate};
use super::repo_types::{User, UserFields};

/// Unique constraint Postgres names for `platform_user.email`.
const EMAIL_CONSTRAINT: &str = "platform_user_email_key";

const USER_COLUMNS: &str =
    "id, first_name, last_name, nickname, password, email, country, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered to a user")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Record store for users. Every call is a single statement.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, fields: &UserFields) -> Result<User, StoreError>;
    async fn update(&self, id: Uuid, fields: &UserFields) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    /// Rows matching every predicate, ordered by `(created_at, id)`, at most `limit`.
    async fn fetch_page(&self, predicates: &[Predicate], limit: u32)
        -> Result<Vec<User>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Insert a user; id and timestamps come from column defaults.
    async fn create(&self, fields: &UserFields) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO platform_user (first_name, last_name, nickname, password, email, country)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.nickname)
        .bind(&fields.password)
        .bind(&fields.email)
        .bind(&fields.country)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            debug!(error = %e, "error inserting user record");
            classify(e)
        })?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, fields: &UserFields) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&update_statement())
            .bind(id)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.nickname)
            .bind(&fields.password)
            .bind(&fields.email)
            .bind(&fields.country)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| {
                debug!(error = %e, %id, "error updating user record");
                classify(e)
            })?;

        user.ok_or_else(|| {
            debug!(%id, "user not found");
            StoreError::NotFound
        })
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM platform_user WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                debug!(error = %e, %id, "unable to delete user");
                classify(e)
            })?;

        if result.rows_affected() == 0 {
            debug!(%id, "user not found");
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        predicates: &[Predicate],
        limit: u32,
    ) -> Result<Vec<User>, StoreError> {
        let mut qb = search_query(predicates, limit);
        let users = qb
            .build_query_as::<User>()
            .fetch_all(&self.db)
            .await
            .map_err(|e| {
                debug!(error = %e, "error fetching user page");
                classify(e)
            })?;
        Ok(users)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .map_err(|e| {
                debug!(error = %e, "database connection lost");
                classify(e)
            })?;
        Ok(())
    }
}

/// `updated_at` never drops below `created_at`, even if the database clock
/// steps backwards.
fn update_statement() -> String {
    format!(
        r#"
        UPDATE platform_user
        SET first_name = $2, last_name = $3, nickname = $4, password = $5,
            email = $6, country = $7, updated_at = GREATEST(now(), created_at)
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    )
}

/// Render predicates as a parameterized keyset query. Every value is bound.
pub(crate) fn search_query(
    predicates: &[Predicate],
    limit: u32,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM platform_user"));
    for (i, predicate) in predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Contains { column, needle } => {
                qb.push(column.as_sql())
                    .push(" ILIKE ")
                    .push_bind(like_pattern(needle));
            }
            Predicate::After(cursor) => {
                qb.push("(created_at, id) > (")
                    .push_bind(cursor.created_at)
                    .push(", ")
                    .push_bind(cursor.id)
                    .push(")");
            }
        }
    }
    qb.push(" ORDER BY created_at, id LIMIT ")
        .push_bind(i64::from(limit));
    qb
}

/// Translate driver errors into the store taxonomy. This is the only place
/// that knows what a duplicate email looks like coming out of Postgres.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let on_email = db_err.constraint() == Some(EMAIL_CONSTRAINT)
            || db_err.message().contains(EMAIL_CONSTRAINT);
        if db_err.is_unique_violation() && on_email {
            return StoreError::Conflict;
        }
    }
    if matches!(err, sqlx::Error::RowNotFound) {
        return StoreError::NotFound;
    }
    StoreError::Other(anyhow::Error::new(err))
}
