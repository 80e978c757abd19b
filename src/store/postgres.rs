use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewUser, StoreError, User, UserStore};

const USER_COLUMNS: &str =
    "id, email, username, password_hash, full_name, is_active, is_verified, created_at";

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique-constraint violation to the matching duplicate error.
/// Constraint names come from the users migration.
fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.constraint() {
            Some("users_email_key") => return StoreError::DuplicateEmail,
            Some("users_username_key") => return StoreError::DuplicateUsername,
            _ => {}
        }
    }
    StoreError::Backend(err.into())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, full_name, is_verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(new.is_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE email = $1"#,
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE username = $1"#,
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(user)
    }
}
