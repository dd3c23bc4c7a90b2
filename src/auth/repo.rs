use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Storage for user profiles. Emails are stored normalized by the caller.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Fails with `DuplicateEmail` and stores nothing if the email exists.
    async fn insert(&self, user: NewUser) -> Result<User, RepoError>;
}

const USER_COLUMNS: &str = "id, email, password_hash, age, height, weight, address, \
                            allergies, health_issues, dietary_preferences, created_at";

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, age, height, weight, address,
                               allergies, health_issues, dietary_preferences)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.age)
        .bind(user.height)
        .bind(user.weight)
        .bind(&user.address)
        .bind(&user.allergies)
        .bind(&user.health_issues)
        .bind(&user.dietary_preferences)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(RepoError::DuplicateEmail),
            Err(e) => Err(RepoError::Other(anyhow::Error::new(e).context("insert user"))),
        }
    }
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            age: user.age,
            height: user.height,
            weight: user.weight,
            address: user.address,
            allergies: user.allergies,
            health_issues: user.health_issues,
            dietary_preferences: user.dietary_preferences,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(record.clone());
        Ok(record)
    }
}
