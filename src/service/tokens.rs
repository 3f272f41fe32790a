use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::crypto::{opaque_token, AccessClaims, AccessTokenSigner, TokenError};
use crate::db::models::{now_millis, to_rfc3339, User};
use crate::db::tokens::Consumed;
use crate::db::{RefreshTokenRepository, UserRepository};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub access_token_expires_at: String,
    pub refresh_token_expires_at: String,
}

/// Access tokens are signed and self-validating; refresh tokens are opaque and persisted.
#[derive(Clone)]
pub struct TokenService {
    db: Pool<Sqlite>,
    signer: AccessTokenSigner,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(
        db: Pool<Sqlite>,
        signer: AccessTokenSigner,
        access_ttl: chrono::Duration,
        refresh_ttl: chrono::Duration,
    ) -> Self {
        TokenService {
            db,
            signer,
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign_access(&self, user: &User, now_ms: i64) -> Result<(String, i64), AppError> {
        let iat = now_ms / 1000;
        let exp = iat + self.access_ttl.num_seconds();
        let token = self.signer.sign(&AccessClaims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
            iat,
            exp,
        })?;
        Ok((token, exp * 1000))
    }

    fn pair(&self, access: (String, i64), refresh: String, refresh_expires: i64) -> TokenPair {
        TokenPair {
            access_token: access.0,
            refresh_token: refresh,
            token_type: "Bearer",
            access_token_expires_at: to_rfc3339(access.1),
            refresh_token_expires_at: to_rfc3339(refresh_expires),
        }
    }

    /// Mints a fresh access/refresh pair and persists the refresh half.
    pub async fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = now_millis();
        let refresh = opaque_token();
        let refresh_expires = now + self.refresh_ttl.num_milliseconds();

        RefreshTokenRepository::insert(&self.db, &refresh, user.id, now, refresh_expires).await?;
        let access = self.sign_access(user, now)?;

        tracing::debug!(user_id = user.id, "issued token pair");
        Ok(self.pair(access, refresh, refresh_expires))
    }

    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.signer.verify(token)
    }

    /// Rotation: the presented token is revoked and its replacement inserted in one
    /// transaction. Of two concurrent refreshes with the same token exactly one wins.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AppError> {
        let now = now_millis();
        let mut tx = self.db.begin().await?;

        let consumed = match RefreshTokenRepository::consume(&mut tx, presented, now).await? {
            Consumed::Ok(row) => row,
            Consumed::Revoked => {
                tracing::warn!("revoked refresh token presented");
                return Err(TokenError::Revoked.into());
            }
            Consumed::Expired => return Err(TokenError::Expired.into()),
            Consumed::Unknown => return Err(TokenError::Unknown.into()),
        };

        let user = UserRepository::get_by_id(&mut *tx, consumed.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::InvalidToken("Account is not active".to_string()))?;

        let refresh = opaque_token();
        let refresh_expires = now + self.refresh_ttl.num_milliseconds();
        RefreshTokenRepository::insert(&mut *tx, &refresh, user.id, now, refresh_expires).await?;
        let access = self.sign_access(&user, now)?;

        tx.commit().await?;

        tracing::debug!(user_id = user.id, "rotated refresh token");
        Ok(self.pair(access, refresh, refresh_expires))
    }

    /// Revokes every outstanding refresh token of the user.
    pub async fn revoke(&self, user_id: i64) -> Result<(), AppError> {
        let revoked = RefreshTokenRepository::revoke_all(&self.db, user_id).await?;
        tracing::debug!(user_id, revoked, "revoked refresh tokens");
        Ok(())
    }
}
