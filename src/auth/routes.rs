//! Authentication REST API routes

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

use super::guard::{extract_bearer, require_auth, require_roles, RequiredRoles};
use super::models::*;
use super::service::AuthService;
use crate::servers::ApiResponse;
use crate::{PassgateError, Result};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

/// JSON body whose rejections are reported through the error envelope
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = PassgateError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| PassgateError::InvalidInput(vec![e.body_text()]))?;
        Ok(Self(value))
    }
}

/// Routes mounted under `/v1`
pub fn api_router(auth: Arc<AuthService>) -> Router {
    let tokens = Arc::clone(auth.tokens());

    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset/password/verify-otp", post(verify_reset_otp))
        // carries a reset token, not an access token
        .route("/auth/reset-password", post(reset_password));

    let admin = Router::new()
        .route("/admin/users/{id}/role", put(assign_role))
        .route_layer(middleware::from_fn_with_state(
            RequiredRoles::new(&[Role::Admin]),
            require_roles,
        ));

    let protected = Router::new()
        .route("/auth/change-password", post(change_password))
        .route("/users/me", get(get_profile).patch(update_profile))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(tokens, require_auth));

    public.merge(protected).with_state(AppState { auth })
}

// ==================== Input checks ====================

/// Collects every problem with a request body before rejecting it
#[derive(Debug, Default)]
struct InputCheck(Vec<String>);

impl InputCheck {
    fn new() -> Self {
        Self::default()
    }

    fn required(mut self, name: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.0.push(format!("{name} is required"));
        }
        self
    }

    fn email(mut self, value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            self.0.push("email is required".to_string());
        } else if !is_valid_email(value) {
            self.0.push("Invalid email format".to_string());
        }
        self
    }

    fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PassgateError::InvalidInput(self.0))
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    email.len() >= 5
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

// ==================== Handlers ====================

/// POST /v1/auth/register
async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, ApiResponse<RegisterResponse>)> {
    InputCheck::new()
        .required("firstName", &req.first_name)
        .required("lastName", &req.last_name)
        .email(&req.email)
        .required("password", &req.password)
        .finish()?;

    let result = state
        .auth
        .register(&req.first_name, &req.last_name, &req.email, &req.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::success("User registered successfully", result),
    ))
}

/// POST /v1/auth/verify-otp
async fn verify_otp(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyOtpRequest>,
) -> Result<ApiResponse> {
    InputCheck::new()
        .required("email", &req.email)
        .required("token", &req.token)
        .finish()?;

    let result = state.auth.verify_otp(&req.email, &req.token).await?;
    Ok(ApiResponse::message(result.message))
}

/// POST /v1/auth/login
async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>> {
    InputCheck::new()
        .required("email", &req.email)
        .required("password", &req.password)
        .finish()?;

    let result = state.auth.login(&req.email, &req.password).await?;
    Ok(ApiResponse::success("Login successful", result))
}

/// POST /v1/auth/forgot-password
async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<ApiResponse> {
    InputCheck::new().required("email", &req.email).finish()?;

    let result = state.auth.send_password_reset_otp(&req.email).await?;
    Ok(ApiResponse::message(result.message))
}

/// POST /v1/auth/reset/password/verify-otp
async fn verify_reset_otp(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyResetOtpRequest>,
) -> Result<ApiResponse<ResetTokenData>> {
    InputCheck::new()
        .required("email", &req.email)
        .required("otp", &req.otp)
        .finish()?;

    let result = state.auth.verify_reset_otp(&req.email, &req.otp).await?;
    Ok(ApiResponse::success(
        result.message,
        ResetTokenData {
            reset_token: result.reset_token,
        },
    ))
}

/// POST /v1/auth/reset-password
///
/// The reset token is checked before the body is looked at.
async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<JsonBody<ResetPasswordRequest>, PassgateError>,
) -> Result<ApiResponse> {
    let token = extract_bearer(&headers)?;
    let user_id = state.auth.verify_reset_token(token)?;
    let JsonBody(req) = body?;
    InputCheck::new()
        .required("newPassword", &req.new_password)
        .finish()?;

    let result = state
        .auth
        .reset_password_with_token(&user_id, &req.new_password)
        .await?;
    Ok(ApiResponse::message(result.message))
}

/// POST /v1/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<ApiResponse> {
    InputCheck::new()
        .required("oldPassword", &req.old_password)
        .required("newPassword", &req.new_password)
        .finish()?;

    let result = state
        .auth
        .change_password(&identity.user_id, &req.old_password, &req.new_password)
        .await?;
    Ok(ApiResponse::message(result.message))
}

/// GET /v1/users/me
async fn get_profile(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiResponse<UserProfile>> {
    let profile = state.auth.profile(&identity.user_id).await?;
    Ok(ApiResponse::success("Profile retrieved", profile))
}

/// PATCH /v1/users/me
async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<ApiResponse<UserProfile>> {
    let profile = state.auth.update_profile(&identity.user_id, update).await?;
    Ok(ApiResponse::success("Profile updated", profile))
}

/// PUT /v1/admin/users/{id}/role
async fn assign_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(user_id): Path<String>,
    JsonBody(req): JsonBody<AssignRoleRequest>,
) -> Result<ApiResponse<UserProfile>> {
    log::info!(
        "Admin {} assigning role {} to user {}",
        identity.user_id,
        req.role,
        user_id
    );
    let profile = state.auth.assign_role(&user_id, req.role).await?;
    Ok(ApiResponse::success("Role updated", profile))
}
