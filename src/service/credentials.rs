use sqlx::{Pool, Sqlite};

use crate::crypto::{hash_password, verify_password, HashCost};
use crate::db::models::{Role, User};
use crate::db::users::NewUser;
use crate::db::{DepartmentRepository, UserRepository};
use crate::error::AppError;
use crate::validation;

/// Role-specific registration data; exactly one extension row is written per user.
#[derive(Debug, Clone)]
pub enum RoleProfile {
    Student {
        student_id: String,
        graduation_year: Option<i32>,
    },
    Instructor {
        title: Option<String>,
    },
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Student { .. } => Role::Student,
            RoleProfile::Instructor { .. } => Role::Instructor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub department_id: Option<i64>,
    pub profile: RoleProfile,
}

/// Users, password hashes and the extension rows that go with each role.
#[derive(Clone)]
pub struct CredentialStore {
    db: Pool<Sqlite>,
    hash_cost: HashCost,
    email_suffix: String,
}

impl CredentialStore {
    pub fn new(db: Pool<Sqlite>, hash_cost: HashCost, email_suffix: String) -> Self {
        CredentialStore {
            db,
            hash_cost,
            email_suffix,
        }
    }

    pub fn normalize_email(&self, email: &str) -> Result<String, AppError> {
        validation::normalize_email(email, &self.email_suffix)
    }

    /// Hashing is CPU-bound, so it runs off the async workers.
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || hash_password(&password, cost)).await?
    }

    pub async fn verify_password(&self, user: &User, plaintext: &str) -> Result<bool, AppError> {
        let plaintext = plaintext.to_string();
        let stored = user.pwd_hash.clone();
        tokio::task::spawn_blocking(move || verify_password(&plaintext, &stored)).await?
    }

    /// Burns roughly the time of a real verification so unknown emails are not
    /// distinguishable by latency.
    pub async fn waste_verification(&self, plaintext: &str) {
        if let Err(e) = self.hash(plaintext).await {
            tracing::warn!("dummy password hash failed: {}", e);
        }
    }

    pub async fn create_user(&self, account: NewAccount) -> Result<User, AppError> {
        let email = self.normalize_email(&account.email)?;
        validation::check_password(&account.password)?;
        let first_name = validation::required_name("firstName", &account.first_name)?;
        let last_name = validation::required_name("lastName", &account.last_name)?;
        if let RoleProfile::Student { student_id, .. } = &account.profile {
            validation::check_student_id(student_id)?;
        }
        if let Some(department_id) = account.department_id {
            if !DepartmentRepository::exists(&self.db, department_id).await? {
                return Err(AppError::validation("departmentId", "Department does not exist"));
            }
        }

        let pwd_hash = self.hash(&account.password).await?;

        let mut tx = self.db.begin().await?;
        let user = UserRepository::create(
            &mut tx,
            NewUser {
                email: &email,
                pwd_hash: &pwd_hash,
                first_name: &first_name,
                last_name: &last_name,
                role: account.profile.role(),
                department_id: account.department_id,
            },
        )
        .await?;

        match &account.profile {
            RoleProfile::Student {
                student_id,
                graduation_year,
            } => {
                UserRepository::create_student(&mut tx, user.id, student_id, *graduation_year)
                    .await?;
            }
            RoleProfile::Instructor { title } => {
                let title = title.as_deref().map(str::trim).unwrap_or_default();
                UserRepository::create_instructor(&mut tx, user.id, title).await?;
            }
        }
        tx.commit().await?;

        tracing::info!(user_id = user.id, role = ?user.role, "account created");
        Ok(user)
    }

    pub async fn find_active_by_email(&self, email: &str) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        UserRepository::get_by_email(&self.db, &email)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }
}
