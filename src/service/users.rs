use sqlx::{Pool, Sqlite};

use crate::db::models::{Role, User};
use crate::db::users::ProfileChanges;
use crate::db::{DepartmentRepository, UserRepository};
use crate::error::AppError;
use crate::policy::{authorize, Action, Principal};
use crate::service::tokens::TokenService;
use crate::service::views::UserView;
use crate::validation;

/// The caller's own account. None of these require a verified email.
#[derive(Clone)]
pub struct UserService {
    db: Pool<Sqlite>,
    tokens: TokenService,
}

impl UserService {
    pub fn new(db: Pool<Sqlite>, tokens: TokenService) -> Self {
        UserService { db, tokens }
    }

    async fn load(&self, user_id: i64) -> Result<User, AppError> {
        UserRepository::get_by_id(&self.db, user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn view(&self, user: &User) -> Result<UserView, AppError> {
        match user.role {
            Role::Student => {
                let student = UserRepository::get_student(&self.db, user.id).await?;
                Ok(UserView::new(user, student.as_ref(), None))
            }
            Role::Instructor => {
                let instructor = UserRepository::get_instructor(&self.db, user.id).await?;
                Ok(UserView::new(user, None, instructor.as_ref()))
            }
        }
    }

    pub async fn get_profile(&self, principal: &Principal) -> Result<UserView, AppError> {
        authorize(principal, &Action::ViewOwnProfile)?;
        let user = self.load(principal.user_id).await?;
        self.view(&user).await
    }

    pub async fn update_profile(
        &self,
        principal: &Principal,
        mut changes: ProfileChanges,
    ) -> Result<UserView, AppError> {
        authorize(principal, &Action::UpdateOwnProfile)?;
        let user = self.load(principal.user_id).await?;

        changes.first_name = validation::optional_name("firstName", changes.first_name.as_deref())?;
        changes.last_name = validation::optional_name("lastName", changes.last_name.as_deref())?;
        changes.title = changes.title.map(|t| t.trim().to_string());
        if let Some(year) = changes.graduation_year {
            validation::exam_year(year)
                .map_err(|_| AppError::validation("graduationYear", "Year is out of range"))?;
        }
        if let Some(department_id) = changes.department_id {
            if !DepartmentRepository::exists(&self.db, department_id).await? {
                return Err(AppError::validation("departmentId", "Department does not exist"));
            }
        }

        let mut tx = self.db.begin().await?;
        let updated = UserRepository::update_profile(&mut tx, &user, &changes).await?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, "profile updated");
        self.view(&updated).await
    }

    /// Marks the account inactive and revokes its refresh tokens. Access tokens already
    /// issued stay valid until they expire.
    pub async fn deactivate(&self, principal: &Principal) -> Result<(), AppError> {
        authorize(principal, &Action::UpdateOwnProfile)?;
        let user = self.load(principal.user_id).await?;

        UserRepository::deactivate(&self.db, user.id).await?;
        self.tokens.revoke(user.id).await?;

        tracing::info!(user_id = user.id, "account deactivated");
        Ok(())
    }
}
