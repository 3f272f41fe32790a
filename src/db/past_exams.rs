use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use crate::db::models::{Millis, PastExam, Term};
use crate::db::{Page, Paged};
use crate::error::AppError;

pub struct PastExamRepository;

pub struct NewPastExam<'a> {
    pub year: i32,
    pub term: Term,
    pub department_id: i64,
    pub course_code: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub uploader_user_id: i64,
}

#[derive(Debug, Default, Clone)]
pub struct PastExamChanges {
    pub year: Option<i32>,
    pub term: Option<Term>,
    pub department_id: Option<i64>,
    pub course_code: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct PastExamFilter {
    pub department_id: Option<i64>,
    pub course_code: Option<String>,
    pub year: Option<i32>,
    pub term: Option<Term>,
}

impl PastExamFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(department_id) = self.department_id {
            qb.push(" AND department_id = ").push_bind(department_id);
        }
        if let Some(course_code) = &self.course_code {
            qb.push(" AND course_code = ").push_bind(course_code.clone());
        }
        if let Some(year) = self.year {
            qb.push(" AND year = ").push_bind(year);
        }
        if let Some(term) = self.term {
            qb.push(" AND term = ").push_bind(term);
        }
    }
}

impl PastExamRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        new: NewPastExam<'_>,
        now: Millis,
    ) -> Result<PastExam, AppError> {
        let exam = sqlx::query_as::<_, PastExam>(
            r#"
INSERT INTO past_exams (year, term, department_id, course_code, title, content, file_id,
                        uploader_user_id, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new.year)
        .bind(new.term)
        .bind(new.department_id)
        .bind(new.course_code)
        .bind(new.title)
        .bind(new.content)
        .bind(new.uploader_user_id)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(exam)
    }

    pub async fn get_by_id<'e, E>(exec: E, id: i64) -> Result<Option<PastExam>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let exam = sqlx::query_as::<_, PastExam>("SELECT * FROM past_exams WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;

        Ok(exam)
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        changes: &PastExamChanges,
        now: Millis,
    ) -> Result<PastExam, AppError> {
        let exam = sqlx::query_as::<_, PastExam>(
            r#"
UPDATE past_exams
SET year = COALESCE(?, year),
    term = COALESCE(?, term),
    department_id = COALESCE(?, department_id),
    course_code = COALESCE(?, course_code),
    title = COALESCE(?, title),
    content = COALESCE(?, content),
    updated_at = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(changes.year)
        .bind(changes.term)
        .bind(changes.department_id)
        .bind(changes.course_code.as_deref())
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(now)
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(exam)
    }

    pub async fn set_file(
        conn: &mut SqliteConnection,
        id: i64,
        file_id: Option<i64>,
        now: Millis,
    ) -> Result<PastExam, AppError> {
        let exam = sqlx::query_as::<_, PastExam>(
            "UPDATE past_exams SET file_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(file_id)
        .bind(now)
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(exam)
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM past_exams WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &PastExamFilter,
        page: Page,
    ) -> Result<Paged<PastExam>, AppError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM past_exams");
        filter.push_where(&mut count);
        let total_items: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM past_exams");
        filter.push_where(&mut select);
        select
            .push(" ORDER BY year DESC, created_at DESC, id DESC LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<PastExam>()
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
