//! SQLite database operations for authentication

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use super::models::{InternalUpdate, NewUser, Role, User, VerificationInfo};
use super::store::{materialize, StoreError, UserStore};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, role, verified, \
     verification_token, reset_otp, reset_otp_expiry, date_of_birth, gender, address, \
     phone_number, created_at, updated_at";

/// SQLite-backed user store. Calls run on the blocking pool.
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open (or create) a database file and initialize tables
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::from_connection(conn)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_tables(&conn).map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }
}

impl Clone for SqliteUserStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Initialize database tables
fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            verified INTEGER NOT NULL DEFAULT 0,
            verification_token TEXT,
            reset_otp TEXT,
            reset_otp_expiry TEXT,
            date_of_birth TEXT,
            gender TEXT,
            address TEXT,
            phone_number TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
    )
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn conversion_error(idx: usize, e: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, StoreError::Corrupt(e.to_string())))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(5)?;
    let role = Role::parse(&role)
        .ok_or_else(|| conversion_error(5, StoreError::Corrupt(format!("unknown role {role}"))))?;

    let reset_otp_expiry = match row.get::<_, Option<String>>(9)? {
        Some(raw) => Some(parse_timestamp(9, &raw)?),
        None => None,
    };
    let date_of_birth = match row.get::<_, Option<String>>(10)? {
        Some(raw) => Some(
            raw.parse::<NaiveDate>()
                .map_err(|e| conversion_error(10, StoreError::Corrupt(e.to_string())))?,
        ),
        None => None,
    };
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        role,
        verification: VerificationInfo {
            verified: row.get::<_, i32>(6)? != 0,
            token: row.get(7)?,
            reset_otp: row.get(8)?,
            reset_otp_expiry,
        },
        date_of_birth,
        gender: row.get(11)?,
        address: row.get(12)?,
        phone_number: row.get(13)?,
        created_at: parse_timestamp(14, &created_at)?,
        updated_at: parse_timestamp(15, &updated_at)?,
    })
}

fn select_by(conn: &Connection, column: &str, value: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    conn.query_row(&sql, params![value], row_to_user)
        .optional()
        .map_err(db_error)
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_owned();
        self.with_conn(move |conn| select_by(conn, "email", &email)).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let id = id.to_owned();
        self.with_conn(move |conn| select_by(conn, "id", &id)).await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let user = materialize(user);
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    user.id,
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.verification.verified as i32,
                    user.verification.token,
                    user.verification.reset_otp,
                    user.verification.reset_otp_expiry.map(|t| t.to_rfc3339()),
                    user.date_of_birth.map(|d| d.to_string()),
                    user.gender,
                    user.address,
                    user.phone_number,
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            );
            match inserted {
                Ok(_) => Ok(user),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateEmail(user.email))
                }
                Err(e) => Err(db_error(e)),
            }
        })
        .await
    }

    async fn apply(&self, id: &str, update: InternalUpdate) -> Result<Option<User>, StoreError> {
        let id = id.to_owned();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let updated = match update {
                InternalUpdate::MarkVerified => conn.execute(
                    "UPDATE users SET verified = 1, verification_token = NULL, updated_at = ?1
                     WHERE id = ?2",
                    params![now, id],
                ),
                InternalUpdate::SetResetOtp { otp, expiry } => conn.execute(
                    "UPDATE users SET reset_otp = ?1, reset_otp_expiry = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![otp, expiry.to_rfc3339(), now, id],
                ),
                InternalUpdate::ClearResetOtp => conn.execute(
                    "UPDATE users SET reset_otp = NULL, reset_otp_expiry = NULL, updated_at = ?1
                     WHERE id = ?2",
                    params![now, id],
                ),
                InternalUpdate::SetPasswordHash(hash) => conn.execute(
                    "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
                    params![hash, now, id],
                ),
                InternalUpdate::SetRole(role) => conn.execute(
                    "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                    params![role.as_str(), now, id],
                ),
                // NULL parameters keep the stored value
                InternalUpdate::SetProfile(profile) => conn.execute(
                    "UPDATE users SET first_name = COALESCE(?1, first_name),
                        last_name = COALESCE(?2, last_name),
                        date_of_birth = COALESCE(?3, date_of_birth),
                        gender = COALESCE(?4, gender),
                        address = COALESCE(?5, address),
                        phone_number = COALESCE(?6, phone_number),
                        updated_at = ?7
                     WHERE id = ?8",
                    params![
                        profile.first_name,
                        profile.last_name,
                        profile.date_of_birth.map(|d| d.to_string()),
                        profile.gender,
                        profile.address,
                        profile.phone_number,
                        now,
                        id,
                    ],
                ),
            }
            .map_err(db_error)?;

            if updated == 0 {
                return Ok(None);
            }
            select_by(conn, "id", &id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::ProfileUpdate;
    use assert_matches::assert_matches;

    fn new_user(id: &str, email: &str) -> NewUser {
        NewUser {
            id: id.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: email.to_string(),
            password_hash: "hash123".to_string(),
            role: Role::User,
            verification: VerificationInfo {
                token: Some("123456".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = SqliteUserStore::in_memory().unwrap();
        db.create(new_user("user_123", "test@example.com")).await.unwrap();

        let found = db.find_by_email("test@example.com").await.unwrap();
        assert!(found.is_some());
        let found = found.unwrap();
        assert_eq!(found.first_name, "Test");
        assert_eq!(found.role, Role::User);
        assert!(!found.verification.verified);
        assert_eq!(found.verification.token.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let db = SqliteUserStore::in_memory().unwrap();
        db.create(new_user("a", "dup@example.com")).await.unwrap();

        let err = db.create(new_user("b", "dup@example.com")).await.unwrap_err();
        assert_matches!(err, StoreError::DuplicateEmail(email) if email == "dup@example.com");
    }

    #[tokio::test]
    async fn test_mark_verified() {
        let db = SqliteUserStore::in_memory().unwrap();
        db.create(new_user("user_456", "verify@example.com")).await.unwrap();

        db.apply("user_456", InternalUpdate::MarkVerified).await.unwrap().unwrap();

        let found = db.find_by_id("user_456").await.unwrap().unwrap();
        assert!(found.verification.verified);
        assert!(found.verification.token.is_none());
    }

    #[tokio::test]
    async fn test_internal_updates() {
        let db = SqliteUserStore::in_memory().unwrap();
        db.create(new_user("user_1", "reset@example.com")).await.unwrap();

        let expiry = DateTime::parse_from_rfc3339("2030-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let user = db
            .apply(
                "user_1",
                InternalUpdate::SetResetOtp {
                    otp: "111222".to_string(),
                    expiry,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.verification.reset_otp.as_deref(), Some("111222"));
        assert_eq!(user.verification.reset_otp_expiry, Some(expiry));

        let user = db.apply("user_1", InternalUpdate::ClearResetOtp).await.unwrap().unwrap();
        assert!(user.verification.reset_otp.is_none());
        assert!(user.verification.reset_otp_expiry.is_none());

        let user = db
            .apply("user_1", InternalUpdate::SetPasswordHash("new-hash".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.password_hash, "new-hash");

        let user = db
            .apply("user_1", InternalUpdate::SetRole(Role::Moderator))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, Role::Moderator);

        assert!(db
            .apply("missing", InternalUpdate::ClearResetOtp)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_profile_update_writes_only_given_columns() {
        let db = SqliteUserStore::in_memory().unwrap();
        db.create(new_user("user_1", "profile@example.com")).await.unwrap();
        db.apply("user_1", InternalUpdate::SetPasswordHash("newer-hash".to_string()))
            .await
            .unwrap();

        db.apply(
            "user_1",
            InternalUpdate::SetProfile(ProfileUpdate {
                date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17),
                address: Some("1 Main St".to_string()),
                phone_number: Some("+15550100".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .unwrap();

        let found = db.find_by_id("user_1").await.unwrap().unwrap();
        assert_eq!(found.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(found.address.as_deref(), Some("1 Main St"));
        assert_eq!(found.phone_number.as_deref(), Some("+15550100"));
        assert_eq!(found.first_name, "Test");
        assert!(found.gender.is_none());
        assert_eq!(found.password_hash, "newer-hash");
        assert_eq!(found.verification.token.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.db");
        let path = path.to_str().unwrap();

        {
            let db = SqliteUserStore::open(path).unwrap();
            db.create(new_user("user_1", "disk@example.com")).await.unwrap();
        }

        let db = SqliteUserStore::open(path).unwrap();
        let found = db.find_by_email("disk@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id).as_deref(), Some("user_1"));
    }
}
