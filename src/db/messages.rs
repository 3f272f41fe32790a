use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use crate::db::models::{ChatMessage, ChatMessageRow, MessageBody, Millis};
use crate::error::AppError;

pub struct MessageRepository;

/// Cursor window for chat retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageQuery {
    pub before: Option<Millis>,
    pub after: Option<Millis>,
    pub limit: Option<i64>,
    pub sender: Option<i64>,
}

impl MessageQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Only an `after`-only window reads forward; every other combination reads backward
    /// from the newest message.
    pub fn ascending(&self) -> bool {
        self.after.is_some() && self.before.is_none()
    }
}

fn into_message(row: ChatMessageRow) -> Result<ChatMessage, AppError> {
    ChatMessage::try_from(row).map_err(AppError::Internal)
}

impl MessageRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        community_id: i64,
        sender_user_id: i64,
        body: &MessageBody,
        now: Millis,
    ) -> Result<ChatMessage, AppError> {
        let (content, file_id) = match body {
            MessageBody::Text { content } => (content.as_str(), None),
            MessageBody::File { file_id, caption } => (caption.as_str(), Some(*file_id)),
        };

        let row = sqlx::query_as::<_, ChatMessageRow>(
            r#"
INSERT INTO chat_messages (community_id, sender_user_id, type, content, file_id,
                           created_at, updated_at, deleted_at)
VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
RETURNING *
            "#,
        )
        .bind(community_id)
        .bind(sender_user_id)
        .bind(body.message_type())
        .bind(content)
        .bind(file_id)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        into_message(row)
    }

    /// Fetches a message that has not been soft-deleted.
    pub async fn get_live<'e, E>(exec: E, id: i64) -> Result<Option<ChatMessage>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            "SELECT * FROM chat_messages WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(exec)
        .await?;

        row.map(into_message).transpose()
    }

    /// Sets `deleted_at` once; a second call on the same row reports `false`.
    pub async fn soft_delete<'e, E>(exec: E, id: i64, now: Millis) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE chat_messages SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn query<'e, E>(
        exec: E,
        community_id: i64,
        query: &MessageQuery,
    ) -> Result<Vec<ChatMessage>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT * FROM chat_messages WHERE deleted_at IS NULL AND community_id = ",
        );
        qb.push_bind(community_id);

        if let Some(before) = query.before {
            qb.push(" AND created_at < ").push_bind(before);
        }
        if let Some(after) = query.after {
            qb.push(" AND created_at > ").push_bind(after);
        }
        if let Some(sender) = query.sender {
            qb.push(" AND sender_user_id = ").push_bind(sender);
        }

        if query.ascending() {
            qb.push(" ORDER BY created_at ASC, id ASC");
        } else {
            qb.push(" ORDER BY created_at DESC, id DESC");
        }
        qb.push(" LIMIT ").push_bind(query.effective_limit());

        let rows = qb.build_query_as::<ChatMessageRow>().fetch_all(exec).await?;
        rows.into_iter().map(into_message).collect()
    }
}
