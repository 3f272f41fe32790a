pub mod jwt;
pub mod password;
pub mod random;

pub use jwt::{AccessClaims, AccessTokenSigner, TokenError};
pub use password::{hash_password, verify_password, HashCost};
pub use random::opaque_token;
