//! Registration, login, token rotation, email verification and password reset
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use campus_portal::api::{create_router, AppState};
use campus_portal::db::models::Role;
use campus_portal::db::UserRepository;
use campus_portal::error::AppError;

use common::database::{setup, TestApp};
use common::fixtures::{
    count, create_instructor, create_student, instructor_account, student_account, PASSWORD,
};

fn router(app: &TestApp) -> Router {
    create_router(AppState::new(
        app.db.clone(),
        app.config.clone(),
        app.services.clone(),
    ))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn raw(method: &str, uri: &str, token: Option<&str>, content_type: &str, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn assert_validation_envelope(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VAL_001");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_register_login_refresh_over_http() {
    let app = setup().await;
    let router = router(&app);

    let (status, body) = send(
        &router,
        post_json(
            "/auth/register",
            json!({
                "email": "alice@uni.edu.tr",
                "password": "Hunter22x",
                "firstName": "Alice",
                "lastName": "A",
                "roleType": "STUDENT",
                "departmentId": app.department_id,
                "studentId": "12345678"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["studentId"], "12345678");
    assert!(body["data"]["tokens"]["accessToken"].is_string());

    let (status, body) = send(
        &router,
        post_json(
            "/auth/login",
            json!({"email": "alice@uni.edu.tr", "password": "Hunter22x"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let r2 = body["data"]["tokens"]["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = send(&router, post_json("/auth/refresh", json!({"refreshToken": r2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["refreshToken"].as_str().unwrap(), r2);

    let (status, body) = send(&router, post_json("/auth/refresh", json!({"refreshToken": r2}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_005");
}

#[tokio::test]
async fn test_bearer_header_handling() {
    let app = setup().await;
    let router = router(&app);
    let alice = create_student(&app, "alice", "12345678").await;

    let (status, body) = send(&router, get_with_token("/users/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_007");

    let (status, body) = send(&router, get_with_token("/users/me", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_005");

    let (status, body) = send(
        &router,
        get_with_token("/users/me", Some(&alice.tokens.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "alice@uni.edu.tr");

    let (status, _) = send(&router, get_with_token("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unverified_user_is_limited_to_own_profile() {
    let app = setup().await;
    let router = router(&app);
    // Token carries email_verified = false.
    let (_, tokens) = app
        .services
        .auth
        .register(student_account(&app, "bob", "87654321"))
        .await
        .unwrap();

    let (status, _) = send(&router, get_with_token("/users/me", Some(&tokens.access_token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        get_with_token("/past-exams", Some(&tokens.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_008");
}

#[tokio::test]
async fn test_non_institution_email_rejected() {
    let app = setup().await;
    let mut account = student_account(&app, "alice", "12345678");
    account.email = "alice@gmail.com".to_string();

    let err = app.services.auth.register(account).await.unwrap_err();
    assert_eq!(err.code(), "AUTH_002");
    assert_eq!(count(&app, "SELECT COUNT(*) FROM users").await, 0);
}

#[tokio::test]
async fn test_registration_validation() {
    let app = setup().await;

    let mut weak = student_account(&app, "weak", "12345678");
    weak.password = "password".to_string();
    assert_eq!(app.services.auth.register(weak).await.unwrap_err().code(), "AUTH_003");

    let bad_id = student_account(&app, "badid", "12-45678");
    assert_eq!(app.services.auth.register(bad_id).await.unwrap_err().code(), "AUTH_004");

    let mut no_dept = student_account(&app, "nodept", "12345678");
    no_dept.department_id = Some(999);
    assert_eq!(app.services.auth.register(no_dept).await.unwrap_err().code(), "VAL_001");

    create_student(&app, "alice", "12345678").await;
    let dup_email = student_account(&app, "alice", "11111111");
    assert!(matches!(
        app.services.auth.register(dup_email).await,
        Err(AppError::AlreadyExists(_))
    ));
    let dup_id = student_account(&app, "other", "12345678");
    match app.services.auth.register(dup_id).await {
        Err(AppError::AlreadyExists(what)) => assert_eq!(what, "Student ID"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    // The failed student insert must not leave a half-created user behind.
    assert_eq!(count(&app, "SELECT COUNT(*) FROM users").await, 1);
}

#[tokio::test]
async fn test_each_user_has_exactly_one_extension_row() {
    let app = setup().await;
    let student = create_student(&app, "stu", "12345678").await;
    let instructor = create_instructor(&app, "ins").await;

    assert_eq!(student.user.role, Role::Student);
    assert!(UserRepository::get_student(&app.db, student.user.id).await.unwrap().is_some());
    assert!(UserRepository::get_instructor(&app.db, student.user.id).await.unwrap().is_none());

    assert_eq!(instructor.user.role, Role::Instructor);
    assert!(UserRepository::get_instructor(&app.db, instructor.user.id).await.unwrap().is_some());
    assert!(UserRepository::get_student(&app.db, instructor.user.id).await.unwrap().is_none());

    let both = count(
        &app,
        "SELECT COUNT(*) FROM students s JOIN instructors i ON s.user_id = i.user_id",
    )
    .await;
    assert_eq!(both, 0);
}

#[tokio::test]
async fn test_login_failures_look_alike() {
    let app = setup().await;
    create_student(&app, "alice", "12345678").await;

    let wrong = app.services.auth.login("alice@uni.edu.tr", "Wrong1234").await.unwrap_err();
    let unknown = app.services.auth.login("nobody@uni.edu.tr", PASSWORD).await.unwrap_err();
    assert_eq!(wrong.code(), "AUTH_001");
    assert_eq!(unknown.code(), "AUTH_001");
    assert_eq!(wrong.public_message(), unknown.public_message());

    let (user, _) = app.services.auth.login("  ALICE@uni.edu.tr ", PASSWORD).await.unwrap();
    assert_eq!(user.email, "alice@uni.edu.tr");
}

#[tokio::test]
async fn test_logout_revokes_refresh_tokens() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "12345678").await;

    app.services.auth.logout(&alice.principal).await.unwrap();
    let err = app
        .services
        .auth
        .refresh(&alice.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTH_005");
}

#[tokio::test]
async fn test_email_verification_link_is_single_use() {
    let app = setup().await;
    let (user, _) = app
        .services
        .auth
        .register(instructor_account(&app, "ins"))
        .await
        .unwrap();
    assert!(!user.email_verified);

    let token = app.mailer.last_token_for("ins@uni.edu.tr").unwrap();
    app.services.auth.verify_email(&token).await.unwrap();

    let user = UserRepository::get_by_id(&app.db, user.id).await.unwrap().unwrap();
    assert!(user.email_verified);

    let err = app.services.auth.verify_email(&token).await.unwrap_err();
    assert_eq!(err.code(), "AUTH_005");

    // Verified accounts get no further mail.
    let before = app.mailer.sent().len();
    app.services.auth.resend_verification("ins@uni.edu.tr").await.unwrap();
    assert_eq!(app.mailer.sent().len(), before);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "12345678").await;

    app.services.auth.forgot_password("nobody@uni.edu.tr").await.unwrap();
    app.services.auth.forgot_password("alice@uni.edu.tr").await.unwrap();
    let token = app.mailer.last_token_for("alice@uni.edu.tr").unwrap();

    let weak = app.services.auth.reset_password(&token, "short").await.unwrap_err();
    assert_eq!(weak.code(), "AUTH_003");

    app.services.auth.reset_password(&token, "NewSecret99").await.unwrap();

    assert_eq!(
        app.services.auth.login("alice@uni.edu.tr", PASSWORD).await.unwrap_err().code(),
        "AUTH_001"
    );
    app.services.auth.login("alice@uni.edu.tr", "NewSecret99").await.unwrap();
    assert!(app.services.auth.refresh(&alice.tokens.refresh_token).await.is_err());
    assert!(app.services.auth.reset_password(&token, "Another99x").await.is_err());
}

#[tokio::test]
async fn test_deactivated_account_cannot_sign_in() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "12345678").await;

    app.services.users.deactivate(&alice.principal).await.unwrap();

    assert_eq!(
        app.services.auth.login("alice@uni.edu.tr", PASSWORD).await.unwrap_err().code(),
        "AUTH_001"
    );
    assert!(app.services.auth.refresh(&alice.tokens.refresh_token).await.is_err());
}

#[tokio::test]
async fn test_profile_update_keeps_role() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "12345678").await;

    let view = app
        .services
        .users
        .update_profile(
            &alice.principal,
            campus_portal::db::users::ProfileChanges {
                first_name: Some("  Alicia ".to_string()),
                graduation_year: Some(2027),
                title: Some("ignored for students".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(view.first_name, "Alicia");
    assert_eq!(view.graduation_year, Some(2027));
    assert_eq!(view.role, Role::Student);
    assert!(view.title.is_none());
}

#[tokio::test]
async fn test_malformed_requests_get_validation_envelope() {
    let app = setup().await;
    let router = router(&app);
    let alice = create_student(&app, "alice", "12345678").await;
    let token = Some(alice.tokens.access_token.as_str());

    let (status, body) = send(
        &router,
        raw("POST", "/auth/register", None, "application/json", "{"),
    )
    .await;
    assert_validation_envelope(status, &body);

    // Syntactically valid JSON with a required field missing.
    let (status, body) = send(
        &router,
        post_json("/auth/login", json!({"email": "alice@uni.edu.tr"})),
    )
    .await;
    assert_validation_envelope(status, &body);

    let (status, body) = send(&router, get_with_token("/communities/abc", token)).await;
    assert_validation_envelope(status, &body);

    let (status, body) = send(&router, get_with_token("/past-exams?year=soon", token)).await;
    assert_validation_envelope(status, &body);

    let (status, body) = send(
        &router,
        raw("POST", "/communities/1/chat/file", token, "application/json", "{}"),
    )
    .await;
    assert_validation_envelope(status, &body);
}
