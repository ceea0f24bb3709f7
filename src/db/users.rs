use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateUserData, UpdateUserData, User};

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    data: &CreateUserData,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, name, password_hash, email_verification_token)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&data.email)
    .bind(&data.name)
    .bind(&data.password_hash)
    .bind(&data.email_verification_token)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_verification_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email_verification_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
}

/// Reset tokens only match while unexpired.
pub async fn find_by_reset_token(pool: &PgPool, token: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE password_reset_token = $1 AND password_reset_expires > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

/// Apply a partial patch. Columns whose patch value is `None` keep their
/// current value. Returns `None` when no row has `id`.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    patch: &UpdateUserData,
) -> Result<Option<User>, sqlx::Error> {
    if patch.is_empty() {
        return find_by_id(pool, id).await;
    }

    sqlx::query_as::<_, User>(
        "UPDATE users SET
            email = COALESCE($2, email),
            name = COALESCE($3, name),
            password_hash = COALESCE($4, password_hash),
            email_verified = COALESCE($5, email_verified),
            email_verification_token = COALESCE($6, email_verification_token),
            password_reset_token = COALESCE($7, password_reset_token),
            password_reset_expires = COALESCE($8, password_reset_expires),
            last_login = COALESCE($9, last_login),
            updated_at = COALESCE($10, NOW())
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&patch.email)
    .bind(&patch.name)
    .bind(&patch.password_hash)
    .bind(patch.email_verified)
    .bind(&patch.email_verification_token)
    .bind(&patch.password_reset_token)
    .bind(patch.password_reset_expires)
    .bind(patch.last_login)
    .bind(patch.updated_at)
    .fetch_optional(pool)
    .await
}

/// Mark the address verified and drop the verification token.
pub async fn mark_email_verified(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET email_verified = TRUE, email_verification_token = NULL, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_password_reset(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
