use sqlx::{Executor, Sqlite};

use crate::db::models::Department;
use crate::error::AppError;

/// Read-only access to the faculty/department reference tables.
pub struct DepartmentRepository;

impl DepartmentRepository {
    pub async fn get_by_id<'e, E>(exec: E, id: i64) -> Result<Option<Department>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await?;

        Ok(department)
    }

    pub async fn exists<'e, E>(exec: E, id: i64) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        Ok(Self::get_by_id(exec, id).await?.is_some())
    }
}
