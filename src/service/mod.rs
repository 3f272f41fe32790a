//! Core entrypoints. Every public method takes the resolved [`Principal`] (where the
//! operation is authenticated), loads its targets, asks the policy engine, and only then
//! mutates state.

pub mod auth;
pub mod chat;
pub mod class_notes;
pub mod communities;
pub mod credentials;
pub mod deadline;
pub mod files;
pub mod mail;
pub mod past_exams;
pub mod sweeper;
pub mod tokens;
pub mod users;
pub mod views;

use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::crypto::{AccessTokenSigner, HashCost};
use crate::storage::BlobStore;

pub use auth::AuthService;
pub use chat::ChatService;
pub use class_notes::ClassNoteService;
pub use communities::CommunityService;
pub use credentials::CredentialStore;
pub use deadline::Deadline;
pub use files::{FileService, Upload};
pub use mail::{LogMailer, Mailer, SmtpMailer};
pub use past_exams::PastExamService;
pub use sweeper::Sweeper;
pub use tokens::{TokenPair, TokenService};
pub use users::UserService;

pub use crate::policy::Principal;

/// Every core component, wired with its explicit dependencies.
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub tokens: TokenService,
    pub users: UserService,
    pub past_exams: PastExamService,
    pub class_notes: ClassNoteService,
    pub communities: CommunityService,
    pub chat: ChatService,
    pub sweeper: Sweeper,
}

impl Services {
    pub fn new(
        db: Pool<Sqlite>,
        config: &Config,
        blobs: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let hash_cost = HashCost {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
        };
        let credentials =
            CredentialStore::new(db.clone(), hash_cost, config.allowed_email_suffix.clone());
        let tokens = TokenService::new(
            db.clone(),
            AccessTokenSigner::new(config.jwt_secret.as_bytes()),
            chrono::Duration::minutes(config.access_token_ttl_minutes),
            chrono::Duration::days(config.refresh_token_ttl_days),
        );
        let files = FileService::new(db.clone(), blobs.clone());

        Services {
            auth: AuthService::new(
                db.clone(),
                credentials.clone(),
                tokens.clone(),
                mailer,
                config.public_app_url.clone(),
            ),
            users: UserService::new(db.clone(), tokens.clone()),
            tokens,
            past_exams: PastExamService::new(db.clone(), files.clone()),
            class_notes: ClassNoteService::new(db.clone(), files.clone()),
            communities: CommunityService::new(db.clone(), files.clone()),
            chat: ChatService::new(db.clone(), files),
            sweeper: Sweeper::new(
                db,
                blobs,
                chrono::Duration::seconds(config.file_sweep_grace_secs),
            ),
        }
    }
}
