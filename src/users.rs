// Users - account creation, lookup and credential checks

use crate::auth::{hash_password, verify_password, AuthError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Empty {0}")]
    MissingField(&'static str),

    #[error("username or email already registered")]
    AlreadyExists,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
}

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            is_active: row.get(4)?,
        })
    }
}

/// Account creation payload as it arrives; every field is optional so
/// missing ones can be reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAccount {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated account creation input
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl CreateAccount {
    pub fn validate(self) -> Result<NewAccount, AccountError> {
        fn required(value: Option<String>, field: &'static str) -> Result<String, AccountError> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(AccountError::MissingField(field)),
            }
        }

        Ok(NewAccount {
            username: required(self.username, "username")?,
            email: required(self.email, "email")?,
            password: required(self.password, "password")?,
        })
    }
}

pub fn create_user(conn: &Connection, account: &NewAccount) -> Result<User, AccountError> {
    let password_hash = hash_password(&account.password)?;

    let result = conn.execute(
        "INSERT INTO user (email, username, password_hash, is_active) VALUES (?1, ?2, ?3, 1)",
        params![account.email, account.username, password_hash],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AccountError::AlreadyExists);
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    info!(user_id = id, username = %account.username, "account created");

    Ok(User {
        id,
        email: account.email.clone(),
        username: account.username.clone(),
        password_hash,
        is_active: true,
    })
}

pub fn find_user_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, username, password_hash, is_active FROM user WHERE id = ?1",
        [id],
        User::from_row,
    )
    .optional()
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, username, password_hash, is_active FROM user WHERE username = ?1",
        [username],
        User::from_row,
    )
    .optional()
}

/// Check credentials. Unknown user and wrong password both give `Ok(None)`.
pub fn authenticate(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Option<User>, AccountError> {
    let Some(user) = find_user_by_username(conn, username)? else {
        debug!(username, "login for unknown user");
        return Ok(None);
    };

    if !user.is_active || !verify_password(password, &user.password_hash)? {
        debug!(username, "login rejected");
        return Ok(None);
    }

    Ok(Some(user))
}
