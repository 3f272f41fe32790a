use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use crate::db::models::{now_millis, File, Millis, ResourceType};
use crate::error::AppError;

pub struct FileRepository;

pub struct NewFile<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub url: &'a str,
    pub size: i64,
    pub mime: &'a str,
    pub resource_type: ResourceType,
    pub uploaded_by: i64,
}

impl FileRepository {
    /// First half of the attach protocol: the row exists but belongs to nothing yet.
    pub async fn create_unattached<'e, E>(exec: E, new: NewFile<'_>) -> Result<File, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let file = sqlx::query_as::<_, File>(
            r#"
INSERT INTO files (name, path, url, size, mime, resource_type, resource_id, uploaded_by, created_at)
VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
RETURNING *
            "#,
        )
        .bind(new.name)
        .bind(new.path)
        .bind(new.url)
        .bind(new.size)
        .bind(new.mime)
        .bind(new.resource_type)
        .bind(new.uploaded_by)
        .bind(now_millis())
        .fetch_one(exec)
        .await?;

        Ok(file)
    }

    pub async fn get_by_id<'e, E>(exec: E, id: i64) -> Result<Option<File>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let file = sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;

        Ok(file)
    }

    /// Every file among `ids` in one round trip; unknown ids are skipped.
    pub async fn get_many<'e, E>(exec: E, ids: &[i64]) -> Result<Vec<File>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM files WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let files = qb.build_query_as::<File>().fetch_all(exec).await?;
        Ok(files)
    }

    pub async fn list_for_resource<'e, E>(
        exec: E,
        resource_type: ResourceType,
        resource_id: i64,
    ) -> Result<Vec<File>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let files = sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE resource_type = ? AND resource_id = ? ORDER BY id ASC",
        )
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(exec)
        .await?;

        Ok(files)
    }

    /// Second half of the attach protocol. Must run inside the transaction that also
    /// touches the parent row. Each file must still be unattached and of the expected type.
    pub async fn attach(
        conn: &mut SqliteConnection,
        file_ids: &[i64],
        resource_type: ResourceType,
        resource_id: i64,
    ) -> Result<(), AppError> {
        for file_id in file_ids {
            let result = sqlx::query(
                r#"
UPDATE files
SET resource_id = ?
WHERE id = ? AND resource_type = ? AND resource_id IS NULL
                "#,
            )
            .bind(resource_id)
            .bind(file_id)
            .bind(resource_type)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() != 1 {
                return Err(AppError::Internal(format!(
                    "file {} could not be attached to {:?} {}",
                    file_id, resource_type, resource_id
                )));
            }
        }

        Ok(())
    }

    /// Clears `resource_id` on the given files of a resource, handing them to the sweeper.
    /// Returns how many rows were detached.
    pub async fn detach(
        conn: &mut SqliteConnection,
        file_ids: &[i64],
        resource_type: ResourceType,
        resource_id: i64,
    ) -> Result<u64, AppError> {
        let mut detached = 0;
        for file_id in file_ids {
            let result = sqlx::query(
                "UPDATE files SET resource_id = NULL WHERE id = ? AND resource_type = ? AND resource_id = ?",
            )
            .bind(file_id)
            .bind(resource_type)
            .bind(resource_id)
            .execute(&mut *conn)
            .await?;
            detached += result.rows_affected();
        }

        Ok(detached)
    }

    pub async fn detach_all_for_resource<'e, E>(
        exec: E,
        resource_type: ResourceType,
        resource_id: i64,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE files SET resource_id = NULL WHERE resource_type = ? AND resource_id = ?",
        )
        .bind(resource_type)
        .bind(resource_id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected())
    }

    /// Detaches every file sent as a chat message in the community.
    pub async fn detach_chat_files_of_community<'e, E>(
        exec: E,
        community_id: i64,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
UPDATE files
SET resource_id = NULL
WHERE resource_type = 'CHAT'
  AND resource_id IN (SELECT id FROM chat_messages WHERE community_id = ?)
            "#,
        )
        .bind(community_id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_orphans<'e, E>(
        exec: E,
        created_before: Millis,
        limit: i64,
    ) -> Result<Vec<File>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let files = sqlx::query_as::<_, File>(
            r#"
SELECT * FROM files
WHERE resource_id IS NULL AND created_at < ?
ORDER BY created_at ASC
LIMIT ?
            "#,
        )
        .bind(created_before)
        .bind(limit)
        .fetch_all(exec)
        .await?;

        Ok(files)
    }

    /// Deletes the row only if it is still unattached; returns whether it was removed.
    pub async fn delete_unattached<'e, E>(exec: E, id: i64) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM files WHERE id = ? AND resource_id IS NULL")
            .bind(id)
            .execute(exec)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
