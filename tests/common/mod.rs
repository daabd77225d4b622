#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header, request};
use axum_extra::extract::cookie::Key;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::ServiceExt;
use vizboard::{AppState, Config, PasswordScheme, Templates, UserStore, router};

const BOUNDARY: &str = "vizboard-test-boundary";

/// Response pieces the tests look at
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Router plus a tiny cookie-keeping client
pub struct TestApp {
    pub state: AppState,
    pub uploads: PathBuf,
    router: Router,
    cookies: HashMap<String, String>,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_scheme(PasswordScheme::Plaintext)
    }

    pub fn with_scheme(password_scheme: PasswordScheme) -> Self {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        Self::build(password_scheme, root.join("templates"))
    }

    /// App rendering from a template tree other than the repository's
    pub fn with_templates(template_dir: &Path) -> Self {
        Self::build(PasswordScheme::Plaintext, template_dir.to_path_buf())
    }

    fn build(password_scheme: PasswordScheme, template_dir: PathBuf) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let config = Config {
            template_dir,
            static_dir: root.join("static"),
            upload_dir: dir.path().join("user_data"),
            database_path: dir.path().join("users.db"),
            password_scheme,
            ..Config::default()
        };

        let templates = Templates::from_dir(&config.template_dir).unwrap();
        let uploads = config.upload_dir.clone();
        let state = AppState::new(
            config,
            UserStore::open_in_memory().unwrap(),
            templates,
            Key::generate(),
        );

        Self {
            router: router(state.clone()),
            state,
            uploads,
            cookies: HashMap::new(),
            _dir: dir,
        }
    }

    /// Request builder carrying the current cookies
    pub fn request(&self, method: Method, uri: &str) -> request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        if self.cookies.is_empty() {
            return builder;
        }
        let header_value = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder.header(header::COOKIE, header_value)
    }

    pub async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            if value.is_empty() {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.to_string());
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request(Method::GET, uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, body: &str) -> TestResponse {
        let request = self
            .request(Method::POST, uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn register(&mut self, username: &str, email: &str, password: &str) -> TestResponse {
        self.post_form(
            "/register.html",
            &format!("username={username}&email={email}&password={password}"),
        )
        .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.post_form(
            "/login.html",
            &format!("username={username}&password={password}"),
        )
        .await
    }

    /// Register and log in `alice`
    pub async fn signed_in() -> Self {
        let mut app = Self::new();
        app.register("alice", "alice@example.com", "secret").await;
        let response = app.login("alice", "secret").await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        app
    }

    /// POST a single file part named `input_data_file`
    pub async fn upload(&mut self, uri: &str, filename: &str, contents: &str) -> TestResponse {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"input_data_file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\
             \r\n\
             {contents}\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = self
            .request(Method::POST, uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }
}

pub const IRIS_CSV: &str = "\
Id,SepalLengthCm,SepalWidthCm,PetalLengthCm,PetalWidthCm,Species
1,5.1,3.5,1.4,0.2,Iris-setosa
2,4.9,3.0,1.4,0.2,Iris-setosa
3,7.0,3.2,4.7,1.4,Iris-versicolor";
