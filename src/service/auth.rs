use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::crypto::opaque_token;
use crate::db::models::{now_millis, EmailTokenPurpose, User};
use crate::db::{EmailTokenRepository, RefreshTokenRepository, UserRepository};
use crate::error::AppError;
use crate::policy::Principal;
use crate::service::credentials::{CredentialStore, NewAccount};
use crate::service::mail::Mailer;
use crate::service::tokens::{TokenPair, TokenService};
use crate::validation;

const VERIFY_EMAIL_TTL_HOURS: i64 = 24;
const RESET_PASSWORD_TTL_HOURS: i64 = 1;

/// Registration, login, token refresh, email verification and password reset.
#[derive(Clone)]
pub struct AuthService {
    db: Pool<Sqlite>,
    credentials: CredentialStore,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    app_url: String,
}

impl AuthService {
    pub fn new(
        db: Pool<Sqlite>,
        credentials: CredentialStore,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        app_url: String,
    ) -> Self {
        AuthService {
            db,
            credentials,
            tokens,
            mailer,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn register(&self, account: NewAccount) -> Result<(User, TokenPair), AppError> {
        let user = self.credentials.create_user(account).await?;
        let tokens = self.tokens.issue(&user).await?;
        self.send_verification(&user).await?;
        Ok((user, tokens))
    }

    /// Unverified users may log in; inactive ones may not. Every failure looks the same.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AppError> {
        let user = match self.credentials.find_active_by_email(email).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                self.credentials.waste_verification(password).await;
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !self.credentials.verify_password(&user, password).await? {
            tracing::info!(user_id = user.id, "failed login");
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.tokens.issue(&user).await?;
        tracing::info!(user_id = user.id, "login");
        Ok((user, tokens))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.tokens.refresh(refresh_token.trim()).await
    }

    pub async fn logout(&self, principal: &Principal) -> Result<(), AppError> {
        self.tokens.revoke(principal.user_id).await
    }

    async fn issue_email_token(
        &self,
        user: &User,
        purpose: EmailTokenPurpose,
        ttl_hours: i64,
    ) -> Result<String, AppError> {
        let now = now_millis();
        let token = opaque_token();
        EmailTokenRepository::invalidate_for_user(&self.db, user.id, purpose).await?;
        EmailTokenRepository::insert(
            &self.db,
            &token,
            user.id,
            purpose,
            now,
            now + chrono::Duration::hours(ttl_hours).num_milliseconds(),
        )
        .await?;
        Ok(token)
    }

    async fn deliver(&self, to: &str, subject: &str, body: String) {
        if let Err(e) = self.mailer.send(to, subject, &body).await {
            tracing::error!(to, "mail delivery failed: {}", e);
        }
    }

    async fn send_verification(&self, user: &User) -> Result<(), AppError> {
        let token = self
            .issue_email_token(user, EmailTokenPurpose::VerifyEmail, VERIFY_EMAIL_TTL_HOURS)
            .await?;
        let link = format!("{}/auth/verify-email?token={}", self.app_url, token);
        self.deliver(
            &user.email,
            "Verify your email address",
            format!(
                "Hello {},\n\nConfirm your address by opening:\n{}\n\nThe link expires in {} hours.",
                user.first_name, link, VERIFY_EMAIL_TTL_HOURS
            ),
        )
        .await;
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        let consumed = EmailTokenRepository::consume(
            &self.db,
            token.trim(),
            EmailTokenPurpose::VerifyEmail,
            now_millis(),
        )
        .await?
        .ok_or_else(|| AppError::InvalidToken("Verification link is invalid or expired".to_string()))?;

        UserRepository::set_email_verified(&self.db, consumed.user_id).await?;
        tracing::info!(user_id = consumed.user_id, "email verified");
        Ok(())
    }

    /// Always succeeds from the caller's point of view so registered addresses can't be discovered.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        match self.credentials.find_active_by_email(email).await {
            Ok(user) if !user.email_verified => self.send_verification(&user).await,
            Ok(_) | Err(AppError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Always succeeds from the caller's point of view so registered addresses can't be discovered.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let user = match self.credentials.find_active_by_email(email).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let token = self
            .issue_email_token(&user, EmailTokenPurpose::ResetPassword, RESET_PASSWORD_TTL_HOURS)
            .await?;
        let link = format!("{}/reset-password?token={}", self.app_url, token);
        self.deliver(
            &user.email,
            "Reset your password",
            format!(
                "Hello {},\n\nChoose a new password here:\n{}\n\nThe link expires in {} hour.",
                user.first_name, link, RESET_PASSWORD_TTL_HOURS
            ),
        )
        .await;
        Ok(())
    }

    /// Consumes the reset token, rewrites the hash and signs the user out everywhere.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        validation::check_password(new_password)?;
        let pwd_hash = self.credentials.hash(new_password).await?;

        let mut tx = self.db.begin().await?;
        let consumed = EmailTokenRepository::consume(
            &mut *tx,
            token.trim(),
            EmailTokenPurpose::ResetPassword,
            now_millis(),
        )
        .await?
        .ok_or_else(|| AppError::InvalidToken("Reset link is invalid or expired".to_string()))?;

        UserRepository::set_password(&mut *tx, consumed.user_id, &pwd_hash).await?;
        RefreshTokenRepository::revoke_all(&mut *tx, consumed.user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = consumed.user_id, "password reset");
        Ok(())
    }
}
