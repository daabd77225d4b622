use crate::config::Config;
use crate::error::{AppError, StartupError};
use crate::flash;
use crate::graph::{self, GraphOptions, PLACEHOLDER_POINTS};
use crate::loader;
use crate::login::{self, LOGIN_PATH, SessionStore, current_user};
use crate::pages::{self, Templates};
use crate::upload::{allowed_file, save_upload, secure_filename};
use crate::users::UserStore;
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRef, Multipart, Query, State},
    http::{HeaderMap, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Multipart field carrying the dataset
pub const UPLOAD_FIELD: &str = "input_data_file";

/// Where a failed upload goes back to when the `Referer` cannot be used
pub const UPLOAD_PAGE: &str = "/upload.html";

pub const VISUALIZATION_PATH: &str = "/visualization.html";

pub const VISUALIZATION_TEMPLATE: &str = "ml_pages/visualization.html";

/// Feature shown when the query string does not name one
pub const DEFAULT_FEATURE: &str = "SepalLengthCm";

/// Feature choices offered on the visualization page
pub const FEATURE_NAMES: [&str; 4] = [
    "SepalLengthCm",
    "SepalWidthCm",
    "PetalLengthCm",
    "PetalWidthCm",
];

/// Process-wide application context
///
/// Built once at startup and cloned into every handler; the clones share
/// the same stores through `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub sessions: Arc<SessionStore>,
    pub templates: Arc<Templates>,
    pub config: Arc<Config>,
    key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl AppState {
    pub fn new(config: Config, users: UserStore, templates: Templates, key: Key) -> Self {
        Self {
            users: Arc::new(users),
            sessions: Arc::new(SessionStore::new(config.session_ttl())),
            templates: Arc::new(templates),
            config: Arc::new(config),
            key,
        }
    }

    /// Open the user database and load templates as described by `config`
    ///
    /// # Errors
    /// * Returns an error if the signing key, database or templates cannot be set up
    pub fn from_config(config: Config) -> Result<Self, StartupError> {
        let key = config.signing_key()?;
        let users = UserStore::open(&config.database_path)?;
        let templates = Templates::from_dir(&config.template_dir)?;
        Ok(Self::new(config, users, templates, key))
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route(
            "/login.html",
            get(login::login_page).post(login::login_submit),
        )
        .route(
            "/register.html",
            get(login::register_page).post(login::register_submit),
        )
        .route("/logout.html", get(login::logout))
        .route(
            VISUALIZATION_PATH,
            get(visualize_data)
                .post(visualize_data)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_service("/sitemap.xml", ServeFile::new(static_dir.join("sitemap.xml")))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/", get(pages::index))
        .route("/:path", get(pages::page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server and block until it stops
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind = config.bind;
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = TcpListener::bind(bind).await?;
    info!("listening on http://{bind}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct VisualizeQuery {
    feature_name: Option<String>,
}

struct UploadedFile {
    filename: String,
    contents: Bytes,
}

/// Upload a dataset and render the chart page
///
/// A missing file part or an empty filename flashes a message and redirects
/// back. A filename outside the allow-list does not stop the request: the
/// loader is then called without a saved file and the request fails with
/// `LoadError::NoInputFile`.
#[axum::debug_handler]
pub async fn visualize_data(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
    Query(query): Query<VisualizeQuery>,
    multipart: Option<Multipart>,
) -> Result<Response, AppError> {
    let Some(user) = current_user(&state, &jar)? else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    let back = redirect_back(&headers);

    let upload = match multipart {
        Some(multipart) => read_upload(multipart).await?,
        None => None,
    };
    let Some(upload) = upload else {
        return Ok((flash::push(jar, "No file part"), Redirect::to(&back)).into_response());
    };
    if upload.filename.is_empty() {
        return Ok((flash::push(jar, "No selected file"), Redirect::to(&back)).into_response());
    }

    let filename = secure_filename(&upload.filename);
    let (saved, msg) = if allowed_file(&upload.filename) && !filename.is_empty() {
        let path = save_upload(&state.config.upload_dir, &filename, &upload.contents).await?;
        info!(
            user = %user.username,
            path = %path.display(),
            bytes = upload.contents.len(),
            "saved upload"
        );
        (Some(path), "loaded input file")
    } else {
        warn!(user = %user.username, filename = %upload.filename, "upload rejected by extension check");
        (None, "unable to load input file")
    };

    let frame = loader::load_input(saved.as_deref())?;
    debug!(rows = frame.height(), columns = frame.width(), "loaded input frame");

    let current_feature_name = query
        .feature_name
        .unwrap_or_else(|| DEFAULT_FEATURE.to_string());

    let options = GraphOptions {
        title: current_feature_name.clone(),
        ..GraphOptions::default()
    };
    let chart = graph::build_scatter(&PLACEHOLDER_POINTS, &options)?;

    let (jar, flashed) = flash::take(jar);
    let html = state.templates.render(
        VISUALIZATION_TEMPLATE,
        &json!({
            "username": user.username,
            "script": chart.script,
            "div": chart.div,
            "feature_names": FEATURE_NAMES,
            "current_feature_name": current_feature_name,
            "msg": msg,
            "flash": flashed,
        }),
    )?;

    Ok((jar, Html(html)).into_response())
}

/// Path a failed upload is sent back to
///
/// Only a same-origin `Referer` is honoured, reduced to its path and query.
/// A foreign or unparsable one, or one pointing at the upload route itself,
/// falls back to `UPLOAD_PAGE`.
fn redirect_back(headers: &HeaderMap) -> String {
    let host = headers.get(header::HOST).and_then(|value| value.to_str().ok());

    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Uri>().ok())
        .filter(|uri| match uri.authority() {
            Some(authority) => host == Some(authority.as_str()),
            None => uri.scheme().is_none(),
        })
        .and_then(|uri| uri.path_and_query().cloned())
        .filter(|target| {
            let path = target.path();
            path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && path != VISUALIZATION_PATH
        })
        .map(|target| target.to_string())
        .unwrap_or_else(|| UPLOAD_PAGE.to_string())
}

/// Pull the first file part named `input_data_file` out of the body
///
/// Parts without a filename are form fields, not files, and are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<Option<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let contents = field.bytes().await?;
        return Ok(Some(UploadedFile { filename, contents }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn back(referer: Option<&str>) -> String {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        if let Some(referer) = referer {
            headers.insert(header::REFERER, HeaderValue::from_str(referer).unwrap());
        }
        redirect_back(&headers)
    }

    #[test]
    fn same_origin_referer_is_reduced_to_its_path() {
        assert_eq!(back(Some("/index.html?tab=1")), "/index.html?tab=1");
        assert_eq!(back(Some("http://localhost:3000/index.html")), "/index.html");
    }

    #[test]
    fn unusable_referers_fall_back_to_upload_page() {
        assert_eq!(back(None), UPLOAD_PAGE);
        assert_eq!(back(Some("https://evil.example/phish")), UPLOAD_PAGE);
        assert_eq!(back(Some("//evil.example/phish")), UPLOAD_PAGE);
        assert_eq!(back(Some("not a uri")), UPLOAD_PAGE);
    }

    #[test]
    fn upload_route_never_redirects_to_itself() {
        assert_eq!(back(Some("/visualization.html")), UPLOAD_PAGE);
        assert_eq!(
            back(Some("http://localhost:3000/visualization.html?feature_name=SepalWidthCm")),
            UPLOAD_PAGE
        );
    }
}
