use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::db::models::{EmailToken, EmailTokenPurpose, Millis, RefreshToken};
use crate::error::AppError;

pub struct RefreshTokenRepository;

/// Result of trying to consume a refresh token.
#[derive(Debug)]
pub enum Consumed {
    Ok(RefreshToken),
    Unknown,
    Revoked,
    Expired,
}

impl RefreshTokenRepository {
    pub async fn insert<'e, E>(
        exec: E,
        token: &str,
        user_id: i64,
        created_at: Millis,
        expires_at: Millis,
    ) -> Result<RefreshToken, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
INSERT INTO refresh_tokens (token_string, user_id, expires_at, revoked, created_at)
VALUES (?, ?, ?, 0, ?)
RETURNING *
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(exec)
        .await?;

        Ok(row)
    }

    /// Revokes the token if and only if it is currently live. The conditional update is
    /// the compare-and-set: of two concurrent callers only one sees a row come back.
    pub async fn consume(
        conn: &mut SqliteConnection,
        token: &str,
        now: Millis,
    ) -> Result<Consumed, AppError> {
        let consumed = sqlx::query_as::<_, RefreshToken>(
            r#"
UPDATE refresh_tokens
SET revoked = 1
WHERE token_string = ? AND revoked = 0 AND expires_at > ?
RETURNING *
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = consumed {
            return Ok(Consumed::Ok(row));
        }

        let existing = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_string = ?",
        )
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(match existing {
            None => Consumed::Unknown,
            Some(row) if row.revoked => Consumed::Revoked,
            Some(_) => Consumed::Expired,
        })
    }

    pub async fn revoke_all<'e, E>(exec: E, user_id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
                .bind(user_id)
                .execute(exec)
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn get<'e, E>(exec: E, token: &str) -> Result<Option<RefreshToken>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_string = ?",
        )
        .bind(token)
        .fetch_optional(exec)
        .await?;

        Ok(row)
    }

    pub async fn cleanup_expired<'e, E>(exec: E, now: Millis) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(exec)
            .await?;

        Ok(result.rows_affected())
    }
}

pub struct EmailTokenRepository;

impl EmailTokenRepository {
    pub async fn insert<'e, E>(
        exec: E,
        token: &str,
        user_id: i64,
        purpose: EmailTokenPurpose,
        created_at: Millis,
        expires_at: Millis,
    ) -> Result<EmailToken, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, EmailToken>(
            r#"
INSERT INTO email_tokens (token, user_id, purpose, expires_at, used, created_at)
VALUES (?, ?, ?, ?, 0, ?)
RETURNING *
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(purpose)
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(exec)
        .await?;

        Ok(row)
    }

    /// Marks a live token of the given purpose as used and returns it.
    pub async fn consume<'e, E>(
        exec: E,
        token: &str,
        purpose: EmailTokenPurpose,
        now: Millis,
    ) -> Result<Option<EmailToken>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, EmailToken>(
            r#"
UPDATE email_tokens
SET used = 1
WHERE token = ? AND purpose = ? AND used = 0 AND expires_at > ?
RETURNING *
            "#,
        )
        .bind(token)
        .bind(purpose)
        .bind(now)
        .fetch_optional(exec)
        .await?;

        Ok(row)
    }

    /// Burns any outstanding tokens so only the newest link works.
    pub async fn invalidate_for_user<'e, E>(
        exec: E,
        user_id: i64,
        purpose: EmailTokenPurpose,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE email_tokens SET used = 1 WHERE user_id = ? AND purpose = ? AND used = 0")
            .bind(user_id)
            .bind(purpose)
            .execute(exec)
            .await?;

        Ok(())
    }

    pub async fn cleanup_expired<'e, E>(exec: E, now: Millis) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM email_tokens WHERE expires_at <= ? OR used = 1")
            .bind(now)
            .execute(exec)
            .await?;

        Ok(result.rows_affected())
    }
}
