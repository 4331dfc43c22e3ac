use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::info;

use crate::auth::password;
use crate::auth::policy::Requester;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str =
    "id, email, name, password_hash, is_active, is_staff, is_superuser, created_at";

/// Lowercase the domain part only; the local part stays case-significant.
pub fn normalize_email(raw: &str) -> String {
    let raw = raw.trim();
    match raw.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => raw.to_string(),
    }
}

pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn email_taken(db: &PgPool, email: &str) -> anyhow::Result<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)",
    )
    .bind(email)
    .fetch_one(db)
    .await?;
    Ok(taken)
}

pub async fn create(
    db: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
    ))
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .fetch_one(db)
    .await?;
    Ok(user)
}

pub async fn create_superuser(
    db: &PgPool,
    email: &str,
    password_hash: &str,
) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password_hash, is_staff, is_superuser) \
         VALUES ($1, $2, TRUE, TRUE) RETURNING {COLUMNS}"
    ))
    .bind(email)
    .bind(password_hash)
    .fetch_one(db)
    .await?;
    Ok(user)
}

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(users)
}

pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    Ok(total)
}

/// Apply a partial profile update; absent fields keep their stored values.
pub async fn update(
    db: &PgPool,
    id: i64,
    name: Option<&str>,
    password_hash: Option<&str>,
) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = COALESCE($2, name), \
         password_hash = COALESCE($3, password_hash) \
         WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(password_hash)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Identity facts for policy checks on the authenticated caller.
pub async fn requester(db: &PgPool, id: i64) -> anyhow::Result<Option<Requester>> {
    let user = find_by_id(db, id).await?;
    Ok(user.map(|u| Requester {
        id: u.id,
        is_staff: u.is_staff,
        is_superuser: u.is_superuser,
    }))
}

/// Seed the configured superuser once; a no-op when the email is registered.
pub async fn ensure_superuser(db: &PgPool, email: &str, plain_password: &str) -> anyhow::Result<()> {
    let email = normalize_email(email);
    if find_by_email(db, &email).await?.is_some() {
        return Ok(());
    }
    let hash = password::hash_password(plain_password)?;
    let user = create_superuser(db, &email, &hash).await?;
    info!(user_id = user.id, "superuser created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("Test@Example.COM"), "Test@example.com");
        assert_eq!(normalize_email("  user@X.Org  "), "user@x.org");
    }

    #[test]
    fn normalize_email_leaves_addresses_without_at_alone() {
        assert_eq!(normalize_email("not-an-email"), "not-an-email");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn normalize_email_splits_on_the_last_at() {
        assert_eq!(normalize_email("a@b@Example.COM"), "a@b@example.com");
    }
}
