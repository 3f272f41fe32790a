use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::Role;
use crate::error::AppError;

/// Payload of a signed access token. Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("refresh token was revoked")]
    Revoked,
    #[error("refresh token is unknown")]
    Unknown,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::ExpiredToken,
            TokenError::Revoked => AppError::InvalidToken("Token has been revoked".to_string()),
            TokenError::Malformed | TokenError::BadSignature | TokenError::Unknown => {
                AppError::InvalidToken("Invalid token".to_string())
            }
        }
    }
}

/// HS256 signer for access tokens. Validation is self-contained: no storage lookup.
#[derive(Clone)]
pub struct AccessTokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl AccessTokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        AccessTokenSigner {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("JWT signing failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> AccessClaims {
        AccessClaims {
            user_id: 7,
            email: "alice@uni.edu.tr".to_string(),
            role: Role::Student,
            email_verified: true,
            iat,
            exp,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = AccessTokenSigner::new(b"correct-secret-correct-secret-00");
        let now = chrono::Utc::now().timestamp();
        let token = signer.sign(&claims(now, now + 600)).unwrap();

        let decoded = signer.verify(&token).unwrap();
        assert_eq!(decoded, claims(now, now + 600));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let now = chrono::Utc::now().timestamp();
        let token = AccessTokenSigner::new(b"correct-secret-correct-secret-00")
            .sign(&claims(now, now + 600))
            .unwrap();

        let other = AccessTokenSigner::new(b"another-secret-another-secret-00");
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_expired_token() {
        let signer = AccessTokenSigner::new(b"correct-secret-correct-secret-00");
        let now = chrono::Utc::now().timestamp();
        let token = signer.sign(&claims(now - 3600, now - 60)).unwrap();
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let signer = AccessTokenSigner::new(b"correct-secret-correct-secret-00");
        assert_eq!(signer.verify("not.a.jwt"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(AppError::from(TokenError::Expired).code(), "AUTH_006");
        assert_eq!(AppError::from(TokenError::Revoked).code(), "AUTH_005");
    }
}
