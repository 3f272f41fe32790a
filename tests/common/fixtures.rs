use campus_portal::db::models::User;
use campus_portal::db::UserRepository;
use campus_portal::service::credentials::{NewAccount, RoleProfile};
use campus_portal::service::{Principal, TokenPair, Upload};

use super::database::TestApp;

pub const PASSWORD: &str = "Hunter22x";

pub struct TestUser {
    pub user: User,
    pub principal: Principal,
    pub tokens: TokenPair,
}

pub fn student_account(app: &TestApp, local: &str, student_id: &str) -> NewAccount {
    NewAccount {
        email: format!("{}@uni.edu.tr", local),
        password: PASSWORD.to_string(),
        first_name: local.to_string(),
        last_name: "Tester".to_string(),
        department_id: Some(app.department_id),
        profile: RoleProfile::Student {
            student_id: student_id.to_string(),
            graduation_year: Some(2026),
        },
    }
}

pub fn instructor_account(app: &TestApp, local: &str) -> NewAccount {
    NewAccount {
        email: format!("{}@uni.edu.tr", local),
        password: PASSWORD.to_string(),
        first_name: local.to_string(),
        last_name: "Lecturer".to_string(),
        department_id: Some(app.department_id),
        profile: RoleProfile::Instructor {
            title: Some("Dr.".to_string()),
        },
    }
}

/// Registers the account and marks its email verified.
pub async fn create_verified(app: &TestApp, account: NewAccount) -> TestUser {
    let (user, tokens) = app.services.auth.register(account).await.unwrap();
    UserRepository::set_email_verified(&app.db, user.id)
        .await
        .unwrap();
    TestUser {
        principal: Principal {
            user_id: user.id,
            role: user.role,
            email_verified: true,
        },
        user,
        tokens,
    }
}

pub async fn create_student(app: &TestApp, local: &str, student_id: &str) -> TestUser {
    create_verified(app, student_account(app, local, student_id)).await
}

pub async fn create_instructor(app: &TestApp, local: &str) -> TestUser {
    create_verified(app, instructor_account(app, local)).await
}

pub fn unverified(principal: Principal) -> Principal {
    Principal {
        email_verified: false,
        ..principal
    }
}

pub fn pdf(name: &str) -> Upload {
    Upload::new(name, Some("application/pdf".to_string()), b"%PDF-1.4 test".to_vec())
}

pub fn png(name: &str) -> Upload {
    Upload::new(name, Some("image/png".to_string()), vec![0x89, b'P', b'N', b'G', 1, 2, 3])
}

pub async fn count(app: &TestApp, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(&app.db).await.unwrap()
}
