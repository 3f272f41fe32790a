use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::db::models::{Community, Millis, Participant};
use crate::db::{unique_or, Page, Paged};
use crate::error::AppError;

pub struct CommunityRepository;

#[derive(Debug, Default, Clone)]
pub struct CommunityChanges {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub lead_user_id: Option<i64>,
}

pub const ALREADY_PARTICIPANT: &str = "User is already a participant";

impl CommunityRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        name: &str,
        abbreviation: &str,
        lead_user_id: i64,
        now: Millis,
    ) -> Result<Community, AppError> {
        sqlx::query_as::<_, Community>(
            r#"
INSERT INTO communities (name, abbreviation, lead_user_id, profile_photo_file_id, created_at, updated_at)
VALUES (?, ?, ?, NULL, ?, ?)
RETURNING *
            "#,
        )
        .bind(name)
        .bind(abbreviation)
        .bind(lead_user_id)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| unique_or(e, "Community name"))
    }

    pub async fn get_by_id<'e, E>(exec: E, id: i64) -> Result<Option<Community>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let community = sqlx::query_as::<_, Community>("SELECT * FROM communities WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;

        Ok(community)
    }

    pub async fn list(conn: &mut SqliteConnection, page: Page) -> Result<Paged<Community>, AppError> {
        let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM communities")
            .fetch_one(&mut *conn)
            .await?;

        let items = sqlx::query_as::<_, Community>(
            "SELECT * FROM communities ORDER BY name ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok(Paged {
            items,
            page: page.page,
            page_size: page.page_size,
            total_items,
        })
    }

    /// A new lead is only written while they are a participant, checked inside the same
    /// statement so a concurrent leave cannot slip in between. `None` means no row matched:
    /// the community is gone or the new lead is not a participant.
    pub async fn update<'e, E>(
        exec: E,
        id: i64,
        changes: &CommunityChanges,
        now: Millis,
    ) -> Result<Option<Community>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Community>(
            r#"
UPDATE communities
SET name = COALESCE(?, name),
    abbreviation = COALESCE(?, abbreviation),
    lead_user_id = COALESCE(?, lead_user_id),
    updated_at = ?
WHERE id = ?
  AND (? IS NULL OR EXISTS (
      SELECT 1 FROM community_participants
      WHERE community_id = communities.id AND user_id = ?
  ))
RETURNING *
            "#,
        )
        .bind(changes.name.as_deref())
        .bind(changes.abbreviation.as_deref())
        .bind(changes.lead_user_id)
        .bind(now)
        .bind(id)
        .bind(changes.lead_user_id)
        .bind(changes.lead_user_id)
        .fetch_optional(exec)
        .await
        .map_err(|e| unique_or(e, "Community name"))
    }

    pub async fn set_profile_photo(
        conn: &mut SqliteConnection,
        id: i64,
        file_id: Option<i64>,
        now: Millis,
    ) -> Result<Community, AppError> {
        let community = sqlx::query_as::<_, Community>(
            "UPDATE communities SET profile_photo_file_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(file_id)
        .bind(now)
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(community)
    }

    /// Participants and messages go with the community (ON DELETE CASCADE).
    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM communities WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Relies on the `(community_id, user_id)` primary key: of two concurrent joins one
    /// inserts and the other gets a conflict.
    pub async fn add_participant<'e, E>(
        exec: E,
        community_id: i64,
        user_id: i64,
        now: Millis,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "INSERT INTO community_participants (community_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(community_id)
        .bind(user_id)
        .bind(now)
        .execute(exec)
        .await
        .map_err(|e| match unique_or(e, "Participant") {
            AppError::AlreadyExists(_) => AppError::Conflict(ALREADY_PARTICIPANT.to_string()),
            other => other,
        })?;

        Ok(())
    }

    /// Never removes the current lead; `false` when no row was deleted.
    pub async fn remove_participant<'e, E>(
        exec: E,
        community_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
DELETE FROM community_participants
WHERE community_id = ? AND user_id = ?
  AND user_id <> (SELECT lead_user_id FROM communities WHERE id = ?)
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .bind(community_id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn is_participant<'e, E>(
        exec: E,
        community_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM community_participants WHERE community_id = ? AND user_id = ?",
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(exec)
        .await?;

        Ok(found.is_some())
    }

    pub async fn participant_ids<'e, E>(exec: E, community_id: i64) -> Result<Vec<i64>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let ids = sqlx::query_scalar(
            "SELECT user_id FROM community_participants WHERE community_id = ? ORDER BY user_id",
        )
        .bind(community_id)
        .fetch_all(exec)
        .await?;

        Ok(ids)
    }

    pub async fn list_participants(
        conn: &mut SqliteConnection,
        community_id: i64,
        page: Page,
    ) -> Result<Paged<Participant>, AppError> {
        let total_items: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM community_participants WHERE community_id = ?",
        )
        .bind(community_id)
        .fetch_one(&mut *conn)
        .await?;

        let items = sqlx::query_as::<_, Participant>(
            r#"
SELECT p.community_id, p.user_id, u.first_name, u.last_name, p.joined_at
FROM community_participants p
JOIN users u ON p.user_id = u.id
WHERE p.community_id = ?
ORDER BY p.joined_at ASC, p.user_id ASC
LIMIT ? OFFSET ?
            "#,
        )
        .bind(community_id)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok(Paged {
            items,
            page: page.page,
            page_size: page.page_size,
            total_items,
        })
    }
}
