use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Table definition, applied on every open
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email    TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
);
";

const SELECT_USER: &str = "SELECT id, username, email, password FROM users";

/// A registered account
///
/// `password` holds whatever the active password scheme produced at
/// registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// Errors raised by the user store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("a user with this username or email already exists")]
    Duplicate,

    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("user store lock poisoned")]
    Poisoned,
}

/// SQLite-backed user table
///
/// A single connection guarded by a mutex; every query holds the lock only
/// for its own statement, so a lookup followed by an insert is not atomic.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the database file and ensure the schema exists
    ///
    /// # Errors
    /// * Returns an error if the parent directory cannot be created
    /// * Returns an error if SQLite cannot open the file or apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&conn)?)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{SELECT_USER} WHERE id = ?1"), params![id], row_to_user)
                .optional()
        })
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT_USER} WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .optional()
        })
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT_USER} WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()
        })
    }

    /// Insert a new user and return the stored record
    ///
    /// # Errors
    /// * `StoreError::Duplicate` if the username or email is already taken
    pub fn insert(&self, username: &str, email: &str, password: &str) -> Result<User, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        match conn.execute(
            "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
            params![username, email, password],
        ) {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            }),
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(StoreError::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Number of registered users
    pub fn count(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)))
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
    })
}
