//! Registration, login and password lifecycle

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use super::email::{LogNotifier, Notifier, OtpPurpose};
use super::jwt::TokenIssuer;
use super::models::{
    InternalUpdate, LoginResponse, MessageResponse, NewUser, ProfileUpdate, RegisterResponse,
    ResetOtpVerified, Role, User, UserProfile, VerificationInfo,
};
use super::otp::{OtpGenerator, RandomOtp};
use super::password::{Argon2Hasher, CredentialHasher};
use super::store::{StoreError, UserStore};
use crate::clock::{Clock, SystemClock};
use crate::{PassgateError, Result};

/// Lifetime of a password reset code
pub const RESET_OTP_TTL_MINUTES: i64 = 10;

/// Same message for unknown email and wrong password
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

const INVALID_OTP: &str = "Invalid OTP";
const USER_NOT_FOUND: &str = "User not found";

/// Collaborators of [`AuthService`], built once at startup
#[derive(Clone)]
pub struct AuthDeps {
    pub store: Arc<dyn UserStore>,
    pub tokens: Arc<TokenIssuer>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub otp: Arc<dyn OtpGenerator>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl AuthDeps {
    /// Argon2 defaults, random codes, log-only delivery and the system clock
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            store,
            tokens,
            hasher: Arc::new(Argon2Hasher::new()),
            otp: Arc::new(RandomOtp),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_otp(mut self, otp: Arc<dyn OtpGenerator>) -> Self {
        self.otp = otp;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Should be the same clock the token issuer was built with
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

pub struct AuthService {
    deps: AuthDeps,
}

/// Emails are unique after trimming and lower-casing
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(deps: AuthDeps) -> Self {
        Self { deps }
    }

    pub fn tokens(&self) -> &Arc<TokenIssuer> {
        &self.deps.tokens
    }

    // ==================== Registration ====================

    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse> {
        let email = normalize_email(email);
        if self.deps.store.find_by_email(&email).await?.is_some() {
            return Err(PassgateError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.deps.hasher.hash(password).await?;
        let otp = self.deps.otp.generate();

        let user = self
            .deps
            .store
            .create(NewUser {
                id: Uuid::new_v4().to_string(),
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
                email,
                password_hash,
                role: Role::User,
                verification: VerificationInfo {
                    token: Some(otp.clone()),
                    ..Default::default()
                },
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail(_) => {
                    PassgateError::Conflict("Email already registered".to_string())
                }
                other => PassgateError::Store(other),
            })?;

        log::info!("Registered user {}", user.id);
        self.notify(user.email, otp, OtpPurpose::Registration);

        Ok(RegisterResponse {
            message: "User registered successfully. OTP sent to email.".to_string(),
            user_id: user.id,
        })
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<MessageResponse> {
        let user = self.user_by_email(email).await?;

        let Some(pending) = user.verification.token.as_deref() else {
            return Err(PassgateError::Validation(
                "No OTP found. Please register again".to_string(),
            ));
        };
        if !codes_match(pending, code) {
            return Err(PassgateError::Validation(INVALID_OTP.to_string()));
        }

        self.deps
            .store
            .apply(&user.id, InternalUpdate::MarkVerified)
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))?;

        log::info!("Email verified for user {}", user.id);
        Ok(MessageResponse::new("Email verified successfully"))
    }

    // ==================== Login ====================

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let Some(user) = self.deps.store.find_by_email(&normalize_email(email)).await? else {
            log::debug!("Login attempt for unknown email");
            return Err(PassgateError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !self.deps.hasher.verify(password, &user.password_hash).await? {
            log::debug!("Wrong password for user {}", user.id);
            return Err(PassgateError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self
            .deps
            .tokens
            .issue_access(&user.id, user.role, &user.display_name())?;
        Ok(LoginResponse { token })
    }

    // ==================== Password reset ====================

    /// Step 1: store a fresh code with a ten minute expiry and send it
    pub async fn send_password_reset_otp(&self, email: &str) -> Result<MessageResponse> {
        let user = self.user_by_email(email).await?;

        let otp = self.deps.otp.generate();
        let expiry = self.deps.clock.now() + Duration::minutes(RESET_OTP_TTL_MINUTES);
        self.deps
            .store
            .apply(
                &user.id,
                InternalUpdate::SetResetOtp {
                    otp: otp.clone(),
                    expiry,
                },
            )
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))?;

        log::info!("Password reset code issued for user {}", user.id);
        self.notify(user.email, otp, OtpPurpose::PasswordReset);
        Ok(MessageResponse::new("OTP sent to email"))
    }

    /// Step 2: trade a valid code for a reset token. The code is consumed even if the
    /// token is never used.
    pub async fn verify_reset_otp(&self, email: &str, otp: &str) -> Result<ResetOtpVerified> {
        let user = match self.deps.store.find_by_email(&normalize_email(email)).await? {
            Some(user)
                if user
                    .verification
                    .reset_otp
                    .as_deref()
                    .is_some_and(|stored| codes_match(stored, otp)) =>
            {
                user
            }
            _ => return Err(PassgateError::Validation(INVALID_OTP.to_string())),
        };

        if let Some(expiry) = user.verification.reset_otp_expiry {
            if expiry < self.deps.clock.now() {
                return Err(PassgateError::Expired("OTP expired".to_string()));
            }
        }

        let reset_token = self.deps.tokens.issue_reset(&user.id)?;
        self.deps
            .store
            .apply(&user.id, InternalUpdate::ClearResetOtp)
            .await?;

        Ok(ResetOtpVerified {
            message: "OTP verified".to_string(),
            reset_token,
        })
    }

    /// Step 3: set the new password. Callers must have obtained `user_id` from
    /// [`AuthService::verify_reset_token`]; no authorization happens here.
    pub async fn reset_password_with_token(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<MessageResponse> {
        let hash = self.deps.hasher.hash(new_password).await?;
        self.deps
            .store
            .apply(user_id, InternalUpdate::SetPasswordHash(hash))
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))?;

        log::info!("Password reset for user {}", user_id);
        Ok(MessageResponse::new("Password reset successful"))
    }

    pub fn verify_reset_token(&self, raw_token: &str) -> Result<String> {
        self.deps.tokens.verify_reset(raw_token).map_err(|e| {
            log::debug!("Reset token rejected: {}", e);
            PassgateError::Unauthorized("Invalid or expired token".to_string())
        })
    }

    // ==================== Authenticated account operations ====================

    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<MessageResponse> {
        let user = self.user_by_id(user_id).await?;

        if !self.deps.hasher.verify(old_password, &user.password_hash).await? {
            return Err(PassgateError::Validation("Old password is incorrect".to_string()));
        }

        let hash = self.deps.hasher.hash(new_password).await?;
        self.deps
            .store
            .apply(&user.id, InternalUpdate::SetPasswordHash(hash))
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))?;

        log::info!("Password changed for user {}", user.id);
        Ok(MessageResponse::new("Password changed successfully"))
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        Ok(UserProfile::from(&self.user_by_id(user_id).await?))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        mut update: ProfileUpdate,
    ) -> Result<UserProfile> {
        if let Some(first_name) = update.first_name.as_deref() {
            update.first_name = Some(required_name("firstName", first_name)?);
        }
        if let Some(last_name) = update.last_name.as_deref() {
            update.last_name = Some(required_name("lastName", last_name)?);
        }

        let saved = self
            .deps
            .store
            .apply(user_id, InternalUpdate::SetProfile(update))
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))?;
        Ok(UserProfile::from(&saved))
    }

    pub async fn assign_role(&self, user_id: &str, role: Role) -> Result<UserProfile> {
        let user = self
            .deps
            .store
            .apply(user_id, InternalUpdate::SetRole(role))
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))?;

        log::info!("User {} now has role {}", user.id, role);
        Ok(UserProfile::from(&user))
    }

    // ==================== Helpers ====================

    async fn user_by_email(&self, email: &str) -> Result<User> {
        self.deps
            .store
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))
    }

    async fn user_by_id(&self, user_id: &str) -> Result<User> {
        self.deps
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PassgateError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// Fire-and-forget delivery; failures are logged and never reach the caller
    fn notify(&self, email: String, otp: String, purpose: OtpPurpose) {
        let notifier = Arc::clone(&self.deps.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_otp(&email, &otp, purpose).await {
                log::error!("Failed to send {:?} email to {}: {}", purpose, email, e);
            }
        });
    }
}

fn codes_match(stored: &str, submitted: &str) -> bool {
    constant_time_eq::constant_time_eq(stored.as_bytes(), submitted.as_bytes())
}

fn required_name(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PassgateError::Validation(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}
