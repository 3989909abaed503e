//! User persistence seam
//!
//! The service only relies on point lookups and point updates being atomic. Every write is an
//! [`InternalUpdate`] that touches its own fields, never a whole-record replace. Nothing here
//! serialises a lookup with a later write, so two registrations for the same email can both pass
//! the service's pre-check; the store's uniqueness rule is what finally rejects one of them.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{InternalUpdate, NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user; fails with `DuplicateEmail` if the email is taken
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Apply a field-scoped update atomically. Returns `None` if the id is unknown.
    async fn apply(&self, id: &str, update: InternalUpdate) -> Result<Option<User>, StoreError>;
}

/// Apply an internal update to a record in place
pub fn apply_update(user: &mut User, update: InternalUpdate) {
    match update {
        InternalUpdate::MarkVerified => {
            user.verification.verified = true;
            user.verification.token = None;
        }
        InternalUpdate::SetResetOtp { otp, expiry } => {
            user.verification.reset_otp = Some(otp);
            user.verification.reset_otp_expiry = Some(expiry);
        }
        InternalUpdate::ClearResetOtp => {
            user.verification.reset_otp = None;
            user.verification.reset_otp_expiry = None;
        }
        InternalUpdate::SetPasswordHash(hash) => user.password_hash = hash,
        InternalUpdate::SetRole(role) => user.role = role,
        InternalUpdate::SetProfile(profile) => {
            if let Some(first_name) = profile.first_name {
                user.first_name = first_name;
            }
            if let Some(last_name) = profile.last_name {
                user.last_name = last_name;
            }
            if profile.date_of_birth.is_some() {
                user.date_of_birth = profile.date_of_birth;
            }
            if profile.gender.is_some() {
                user.gender = profile.gender;
            }
            if profile.address.is_some() {
                user.address = profile.address;
            }
            if profile.phone_number.is_some() {
                user.phone_number = profile.phone_number;
            }
        }
    }
    user.updated_at = Utc::now();
}

/// Build the stored record for a new user
pub fn materialize(user: NewUser) -> User {
    let now = Utc::now();
    User {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        password_hash: user.password_hash,
        role: user.role,
        verification: user.verification,
        date_of_birth: None,
        gender: None,
        address: None,
        phone_number: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug, Default)]
struct UserTable {
    users: HashMap<String, User>,
    ids_by_email: HashMap<String, String>,
}

/// Process-local store, used for tests and `--database :memory:`
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    table: Arc<RwLock<UserTable>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .ids_by_email
            .get(email)
            .and_then(|id| table.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.table.read().await.users.get(id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;
        if table.ids_by_email.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let user = materialize(user);
        table
            .ids_by_email
            .insert(user.email.clone(), user.id.clone());
        table.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn apply(&self, id: &str, update: InternalUpdate) -> Result<Option<User>, StoreError> {
        let mut table = self.table.write().await;
        Ok(table.users.get_mut(id).map(|user| {
            apply_update(user, update);
            user.clone()
        }))
    }
}
