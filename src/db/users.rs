use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::db::models::{now_millis, Instructor, Role, Student, User};
use crate::db::unique_or;
use crate::error::AppError;

pub struct UserRepository;

/// Columns for a new `users` row; the password arrives already hashed.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub pwd_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub department_id: Option<i64>,
}

/// Editable profile columns; `None` leaves the stored value alone.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department_id: Option<i64>,
    pub graduation_year: Option<i32>,
    pub title: Option<String>,
}

impl UserRepository {
    pub async fn create(conn: &mut SqliteConnection, new: NewUser<'_>) -> Result<User, AppError> {
        let created_at = now_millis();

        sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (email, pwd_hash, first_name, last_name, role, department_id, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new.email)
        .bind(new.pwd_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.role)
        .bind(new.department_id)
        .bind(created_at)
        .fetch_one(conn)
        .await
        .map_err(|e| unique_or(e, "Email"))
    }

    pub async fn create_student(
        conn: &mut SqliteConnection,
        user_id: i64,
        student_identifier: &str,
        graduation_year: Option<i32>,
    ) -> Result<Student, AppError> {
        sqlx::query_as::<_, Student>(
            r#"
INSERT INTO students (user_id, student_identifier, graduation_year)
VALUES (?, ?, ?)
RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(student_identifier)
        .bind(graduation_year)
        .fetch_one(conn)
        .await
        .map_err(|e| unique_or(e, "Student ID"))
    }

    pub async fn create_instructor(
        conn: &mut SqliteConnection,
        user_id: i64,
        title: &str,
    ) -> Result<Instructor, AppError> {
        let instructor = sqlx::query_as::<_, Instructor>(
            "INSERT INTO instructors (user_id, title) VALUES (?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(title)
        .fetch_one(conn)
        .await?;

        Ok(instructor)
    }

    pub async fn get_by_id<'e, E>(exec: E, id: i64) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email<'e, E>(exec: E, email: &str) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(exec)
            .await?;

        Ok(user)
    }

    pub async fn get_student<'e, E>(exec: E, user_id: i64) -> Result<Option<Student>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(exec)
            .await?;

        Ok(student)
    }

    pub async fn get_instructor<'e, E>(
        exec: E,
        user_id: i64,
    ) -> Result<Option<Instructor>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let instructor =
            sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(exec)
                .await?;

        Ok(instructor)
    }

    /// Applies profile edits; role is never touched. Extension columns are only written
    /// for the extension the user actually has.
    pub async fn update_profile(
        conn: &mut SqliteConnection,
        user: &User,
        changes: &ProfileChanges,
    ) -> Result<User, AppError> {
        let updated = sqlx::query_as::<_, User>(
            r#"
UPDATE users
SET first_name = COALESCE(?, first_name),
    last_name = COALESCE(?, last_name),
    department_id = COALESCE(?, department_id)
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.department_id)
        .bind(user.id)
        .fetch_one(&mut *conn)
        .await?;

        match user.role {
            Role::Student if changes.graduation_year.is_some() => {
                sqlx::query("UPDATE students SET graduation_year = ? WHERE user_id = ?")
                    .bind(changes.graduation_year)
                    .bind(user.id)
                    .execute(&mut *conn)
                    .await?;
            }
            Role::Instructor if changes.title.is_some() => {
                sqlx::query("UPDATE instructors SET title = ? WHERE user_id = ?")
                    .bind(changes.title.as_deref())
                    .bind(user.id)
                    .execute(&mut *conn)
                    .await?;
            }
            _ => {}
        }

        Ok(updated)
    }

    pub async fn set_email_verified<'e, E>(exec: E, user_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE users SET email_verified = 1 WHERE id = ?")
            .bind(user_id)
            .execute(exec)
            .await?;

        Ok(())
    }

    pub async fn set_password<'e, E>(exec: E, user_id: i64, pwd_hash: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE users SET pwd_hash = ? WHERE id = ?")
            .bind(pwd_hash)
            .bind(user_id)
            .execute(exec)
            .await?;

        Ok(())
    }

    pub async fn deactivate<'e, E>(exec: E, user_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(user_id)
            .execute(exec)
            .await?;

        Ok(())
    }
}
