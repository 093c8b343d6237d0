//! Authentication and authorization
//!
//! Provides:
//! - JWT token generation and validation (HS256 access + refresh pair)
//! - Google OAuth access-token verification
//! - Role model for operation authorization

pub mod google;
pub mod jwt;
pub mod roles;

pub use google::{GoogleTokenInfo, GoogleVerifier};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenPair};
pub use roles::Role;
