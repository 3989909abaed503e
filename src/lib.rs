//! # passgate
//!
//! Credential and identity-lifecycle backend.
//!
//! ## Features
//!
//! - **Registration**: account creation with a 6-digit email verification code
//! - **Login**: password check issuing signed bearer tokens
//! - **Password reset**: one-time code, then a short-lived reset token, then the new password
//! - **Guards**: bearer-token extraction and per-route role checks for axum routers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use passgate::auth::{AuthDeps, AuthService, InMemoryUserStore, JwtConfig, TokenIssuer};
//!
//! let tokens = Arc::new(TokenIssuer::new(JwtConfig::new("change-me".to_string(), 86_400)));
//! let service = AuthService::new(AuthDeps::new(
//!     Arc::new(InMemoryUserStore::new()),
//!     tokens.clone(),
//! ));
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Authentication core: service, tokens, hashing, OTP, stores, guards
pub mod auth;

/// Injectable time source
pub mod clock;

/// Command-line and environment settings
pub mod config;

/// Logger initialisation
pub mod logging;

/// HTTP server and response envelope
pub mod servers;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use auth::{AuthService, TokenIssuer};
pub use config::Settings;
pub use servers::{ApiResponse, WebServer, WebServerConfig};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for passgate
#[derive(Debug, thiserror::Error)]
pub enum PassgateError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// Malformed request input, one entry per problem
    #[error("Validation failed")]
    InvalidInput(Vec<String>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Expired(String),

    #[error("Store error: {0}")]
    Store(#[from] auth::StoreError),

    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(#[from] auth::TokenError),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PassgateError {
    /// True for failures whose detail must stay out of client responses.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            PassgateError::Store(_)
                | PassgateError::Hashing(_)
                | PassgateError::Token(_)
                | PassgateError::Notification(_)
                | PassgateError::Io(_)
                | PassgateError::Config(_)
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PassgateError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
