pub mod auth;
pub mod chat;
pub mod class_notes;
pub mod communities;
pub mod extract;
pub mod middleware;
pub mod multipart;
pub mod past_exams;
pub mod response;
pub mod state;
pub mod users;

pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::response::ApiResponse;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/verify-email", get(auth::verify_email))
        .route("/auth/resend-verification", post(auth::resend_verification))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/me/deactivate", post(users::deactivate_me))
        // Past exams
        .route("/past-exams", get(past_exams::list).post(past_exams::create))
        .route(
            "/past-exams/:id",
            get(past_exams::get)
                .put(past_exams::update)
                .delete(past_exams::delete),
        )
        // Class notes
        .route("/class-notes", get(class_notes::list).post(class_notes::create))
        .route(
            "/class-notes/:id",
            get(class_notes::get)
                .put(class_notes::update)
                .delete(class_notes::delete),
        )
        .route(
            "/class-notes/:id/files",
            post(class_notes::add_files).delete(class_notes::remove_files),
        )
        // Communities
        .route("/communities", get(communities::list).post(communities::create))
        .route(
            "/communities/:id",
            get(communities::get)
                .put(communities::update)
                .delete(communities::delete),
        )
        .route(
            "/communities/:id/profile-photo",
            put(communities::update_profile_photo).delete(communities::delete_profile_photo),
        )
        .route(
            "/communities/:id/participants",
            get(communities::participants)
                .post(communities::join)
                .delete(communities::leave),
        )
        .route(
            "/communities/:id/participants/check",
            get(communities::check_participation),
        )
        // Chat
        .route("/communities/:id/chat", get(chat::get_messages))
        .route("/communities/:id/chat/text", post(chat::send_text))
        .route("/communities/:id/chat/file", post(chat::send_file))
        .route(
            "/communities/:id/chat/:message_id",
            axum::routing::delete(chat::delete_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut router = public.merge(protected);
    if state.config.file_base_url.is_none() {
        router = router.nest_service("/uploads", ServeDir::new(&state.config.upload_dir));
    }

    router
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_secs + 5,
        )))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
