use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use crate::db::models::{ClassNote, Millis};
use crate::db::{Page, Paged};
use crate::error::AppError;

pub struct ClassNoteRepository;

pub struct NewClassNote<'a> {
    pub course_code: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub content: &'a str,
    pub department_id: i64,
    pub uploader_user_id: i64,
}

#[derive(Debug, Default, Clone)]
pub struct ClassNoteChanges {
    pub course_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub department_id: Option<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct ClassNoteFilter {
    pub department_id: Option<i64>,
    pub course_code: Option<String>,
    pub uploader_user_id: Option<i64>,
}

impl ClassNoteFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(department_id) = self.department_id {
            qb.push(" AND department_id = ").push_bind(department_id);
        }
        if let Some(course_code) = &self.course_code {
            qb.push(" AND course_code = ").push_bind(course_code.clone());
        }
        if let Some(uploader) = self.uploader_user_id {
            qb.push(" AND uploader_user_id = ").push_bind(uploader);
        }
    }
}

impl ClassNoteRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        new: NewClassNote<'_>,
        now: Millis,
    ) -> Result<ClassNote, AppError> {
        let note = sqlx::query_as::<_, ClassNote>(
            r#"
INSERT INTO class_notes (course_code, title, description, content, department_id,
                         uploader_user_id, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new.course_code)
        .bind(new.title)
        .bind(new.description)
        .bind(new.content)
        .bind(new.department_id)
        .bind(new.uploader_user_id)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(note)
    }

    pub async fn get_by_id<'e, E>(exec: E, id: i64) -> Result<Option<ClassNote>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let note = sqlx::query_as::<_, ClassNote>("SELECT * FROM class_notes WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;

        Ok(note)
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        changes: &ClassNoteChanges,
        now: Millis,
    ) -> Result<ClassNote, AppError> {
        let note = sqlx::query_as::<_, ClassNote>(
            r#"
UPDATE class_notes
SET course_code = COALESCE(?, course_code),
    title = COALESCE(?, title),
    description = COALESCE(?, description),
    content = COALESCE(?, content),
    department_id = COALESCE(?, department_id),
    updated_at = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(changes.course_code.as_deref())
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.content.as_deref())
        .bind(changes.department_id)
        .bind(now)
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(note)
    }

    /// Bumps `updated_at`; used when only the attachment set changes.
    pub async fn touch<'e, E>(exec: E, id: i64, now: Millis) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE class_notes SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(exec)
            .await?;

        Ok(())
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM class_notes WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &ClassNoteFilter,
        page: Page,
    ) -> Result<Paged<ClassNote>, AppError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM class_notes");
        filter.push_where(&mut count);
        let total_items: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM class_notes");
        filter.push_where(&mut select);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<ClassNote>()
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
