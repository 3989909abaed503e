//! Authentication module
//!
//! Provides the account lifecycle:
//! - User registration with email verification codes
//! - Password login issuing JWT access tokens
//! - Password reset via emailed code and a short-lived reset token
//! - Bearer-token and role guards for axum routes

pub mod database;
pub mod email;
pub mod guard;
pub mod jwt;
pub mod models;
pub mod otp;
pub mod password;
pub mod routes;
pub mod service;
pub mod store;

pub use database::SqliteUserStore;
pub use email::{build_notifier, EmailConfig, LogNotifier, Notifier, OtpPurpose, SmtpNotifier};
pub use guard::{authenticate, authorize, extract_bearer, RequiredRoles};
pub use jwt::{JwtConfig, TokenError, TokenIssuer};
pub use models::*;
pub use otp::{OtpGenerator, RandomOtp};
pub use password::{Argon2Hasher, CredentialHasher};
pub use routes::{api_router, AppState};
pub use service::{AuthDeps, AuthService};
pub use store::{InMemoryUserStore, StoreError, UserStore};
