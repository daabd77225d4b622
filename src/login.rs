use crate::app::AppState;
use crate::error::AppError;
use crate::flash;
use crate::forms::{LoginForm, RegisterForm};
use crate::users::{StoreError, User};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    Form,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use rand_core::OsRng;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Name of the signed cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

pub const LOGIN_PATH: &str = "/login.html";
pub const INDEX_PATH: &str = "/";

const LOGIN_TEMPLATE: &str = "pages/login.html";
const REGISTER_TEMPLATE: &str = "pages/register.html";

const MSG_USER_EXISTS: &str = "Error: User exists!";
const MSG_INPUT_ERROR: &str = "Input error";
const MSG_UNKNOWN_USER: &str = "Unknown user";
const MSG_WRONG_PASSWORD: &str = "Wrong password. Please try again.";

/// Errors raised while encoding or checking passwords
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed")]
    MalformedHash,
}

/// How passwords are written to and compared against the user table
///
/// `Plaintext` keeps the submitted password verbatim and compares by
/// equality. `Argon2` stores a PHC string with a random salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordScheme {
    #[default]
    Plaintext,
    Argon2,
}

impl PasswordScheme {
    /// Produce the value stored in the `password` column
    ///
    /// # Errors
    /// * Returns an error if Argon2 hashing fails
    pub fn encode(self, password: &str) -> Result<String, AuthError> {
        match self {
            Self::Plaintext => Ok(password.to_string()),
            Self::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map(|hash| hash.to_string())
                    .map_err(|err| AuthError::Hash(err.to_string()))
            }
        }
    }

    /// Check a submitted password against the stored value
    ///
    /// # Errors
    /// * Returns an error if an Argon2 hash cannot be parsed
    pub fn verify(self, password: &str, stored: &str) -> Result<bool, AuthError> {
        match self {
            Self::Plaintext => Ok(password == stored),
            Self::Argon2 => {
                let parsed = PasswordHash::new(stored).map_err(|_| AuthError::MalformedHash)?;
                Ok(Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok())
            }
        }
    }
}

/// Server-side record behind a session cookie
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub expires_at: SystemTime,
}

/// In-memory registry of active sessions
///
/// Keys are random UUIDs handed to the browser in the signed `session`
/// cookie. Sessions are lost on restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a session for `user_id` and return its id
    ///
    /// Expired sessions are dropped on the way.
    pub fn create(&self, user_id: i64) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = SystemTime::now();

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            session_id.clone(),
            Session {
                user_id,
                expires_at: now + self.ttl,
            },
        );

        session_id
    }

    /// Return the user id for a live session
    pub fn validate(&self, session_id: &str) -> Option<i64> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .filter(|session| session.expires_at > SystemTime::now())
            .map(|session| session.user_id)
    }

    /// Forget a session; returns whether it existed
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Resolve the logged-in user from the session cookie
///
/// A missing cookie, a bad signature, an expired session or a deleted user
/// all yield `Ok(None)`.
///
/// # Errors
/// * Returns an error if the user store cannot be queried
pub fn current_user(state: &AppState, jar: &SignedCookieJar) -> Result<Option<User>, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(user_id) = state.sessions.validate(cookie.value()) else {
        return Ok(None);
    };
    Ok(state.users.find_by_id(user_id)?)
}

fn session_cookie(session_id: String, ttl: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX))
        .build()
}

/// Serve the registration page with an empty form
pub async fn register_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Response, AppError> {
    let (jar, flashed) = flash::take(jar);
    let html = render_form(&state, REGISTER_TEMPLATE, None, None, flashed.as_deref())?;
    Ok((jar, html).into_response())
}

/// Handle a registration form submission
///
/// Duplicate usernames or emails leave the table untouched and re-render the
/// form with `Error: User exists!`. An invalid form yields `Input error`.
pub async fn register_submit(
    State(state): State<AppState>,
    form: Option<Form<RegisterForm>>,
) -> Result<Html<String>, AppError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let msg = match form.validate() {
        Ok(()) => register_user(&state, &form)?,
        Err(err) => {
            info!(error = %err, "rejected registration form");
            MSG_INPUT_ERROR.to_string()
        }
    };

    let submitted = json!({ "username": form.username, "email": form.email });
    render_form(&state, REGISTER_TEMPLATE, Some(&msg), Some(submitted), None)
}

fn register_user(state: &AppState, form: &RegisterForm) -> Result<String, AppError> {
    let by_username = state.users.find_by_username(&form.username)?;
    let by_email = state.users.find_by_email(&form.email)?;

    if by_username.is_some() || by_email.is_some() {
        info!(username = %form.username, "registration refused: user exists");
        return Ok(MSG_USER_EXISTS.to_string());
    }

    let stored = state.config.password_scheme.encode(&form.password)?;
    match state.users.insert(&form.username, &form.email, &stored) {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "registered user");
            Ok(format!(
                "User created, please <a href=\"{LOGIN_PATH}\">login</a>"
            ))
        }
        // lost the race against a concurrent registration
        Err(StoreError::Duplicate) => Ok(MSG_USER_EXISTS.to_string()),
        Err(err) => Err(err.into()),
    }
}

/// Serve the login page
pub async fn login_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Response, AppError> {
    let (jar, flashed) = flash::take(jar);
    let html = render_form(&state, LOGIN_TEMPLATE, None, None, flashed.as_deref())?;
    Ok((jar, html).into_response())
}

/// Handle a login form submission
///
/// On success a new session is stored, its id is written to the signed
/// `session` cookie, and the browser is sent to the index page.
#[axum::debug_handler]
pub async fn login_submit(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    form: Option<Form<LoginForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    if form.validate().is_err() {
        let submitted = json!({ "username": form.username });
        let html = render_form(&state, LOGIN_TEMPLATE, None, Some(submitted), None)?;
        return Ok(html.into_response());
    }

    let msg = match state.users.find_by_username(&form.username)? {
        Some(user) => {
            if state
                .config
                .password_scheme
                .verify(&form.password, &user.password)?
            {
                let session_id = state.sessions.create(user.id);
                info!(user_id = user.id, username = %user.username, "user logged in");
                let cookie = session_cookie(session_id, state.sessions.ttl());
                return Ok((jar.add(cookie), Redirect::to(INDEX_PATH)).into_response());
            }
            warn!(username = %form.username, "login failed: wrong password");
            MSG_WRONG_PASSWORD
        }
        None => {
            warn!(username = %form.username, "login failed: unknown user");
            MSG_UNKNOWN_USER
        }
    };

    let submitted = json!({ "username": form.username });
    let html = render_form(&state, LOGIN_TEMPLATE, Some(msg), Some(submitted), None)?;
    Ok(html.into_response())
}

/// Tear down the session (if any) and return to the index page
pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.remove(cookie.value()) {
            info!("session closed");
        }
    }

    let removal = Cookie::build(SESSION_COOKIE).path("/");
    (jar.remove(removal), Redirect::to(INDEX_PATH))
}

fn render_form(
    state: &AppState,
    template: &str,
    msg: Option<&str>,
    form: Option<serde_json::Value>,
    flashed: Option<&str>,
) -> Result<Html<String>, AppError> {
    let context = json!({
        "msg": msg,
        "form": form.unwrap_or_else(|| json!({})),
        "flash": flashed,
    });
    Ok(Html(state.templates.render(template, &context)?))
}
