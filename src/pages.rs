use crate::app::AppState;
use crate::error::AppError;
use crate::flash;
use crate::login::{LOGIN_PATH, current_user};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use std::path::{Path as FsPath, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Template directories searched by the page router, in order
pub const LOOKUP_ORDER: [&str; 2] = ["pages", "ml_pages"];

/// Page served for `/`
pub const DEFAULT_PAGE: &str = "index.html";

pub const NOT_FOUND_TEMPLATE: &str = "pages/error-404.html";

/// Extension of template files under the template directory
const TEMPLATE_EXTENSION: &str = ".html";

/// Errors raised by template lookup and rendering
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(String),

    #[error("failed to render {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },

    #[error("failed to load templates from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: handlebars::TemplateError,
    },
}

/// Registry of every `.html` template under the template directory
///
/// Templates are addressed by their path relative to that directory, for
/// example `pages/login.html`.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Register all templates found below `dir`
    ///
    /// # Errors
    /// * Returns an error if a template fails to parse or the directory cannot be walked
    pub fn from_dir(dir: &FsPath) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry
            .register_templates_directory(TEMPLATE_EXTENSION, dir)
            .map_err(|source| TemplateError::Load {
                path: dir.to_path_buf(),
                source,
            })?;
        debug!(count = registry.get_templates().len(), dir = %dir.display(), "registered templates");
        Ok(Self { registry })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.has_template(registry_key(name))
    }

    /// Render a single template by name
    ///
    /// # Errors
    /// * `TemplateError::NotFound` if no such template is registered
    /// * `TemplateError::Render` if rendering fails
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, TemplateError> {
        let key = registry_key(name);
        if !self.registry.has_template(key) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        self.registry
            .render(key, data)
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }

    /// Render `path` from the first directory in `LOOKUP_ORDER` that can serve it
    ///
    /// A failure in one directory moves on to the next. If nothing renders,
    /// a render failure takes precedence over `NotFound`.
    ///
    /// # Errors
    /// * `TemplateError::NotFound` if no directory has the template
    /// * `TemplateError::Render` if a matching template failed to render
    pub fn resolve<T: Serialize>(&self, path: &str, data: &T) -> Result<String, TemplateError> {
        let mut render_failure = None;

        for dir in LOOKUP_ORDER {
            match self.render(&format!("{dir}/{path}"), data) {
                Ok(html) => return Ok(html),
                Err(TemplateError::NotFound(name)) => debug!(%name, "template lookup missed"),
                Err(err) => {
                    debug!(error = %err, "template lookup failed");
                    render_failure.get_or_insert(err);
                }
            }
        }

        Err(render_failure.unwrap_or_else(|| TemplateError::NotFound(path.to_string())))
    }
}

// handlebars names directory templates by relative path without extension
fn registry_key(name: &str) -> &str {
    name.strip_suffix(TEMPLATE_EXTENSION).unwrap_or(name)
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Response, AppError> {
    serve_page(&state, jar, DEFAULT_PAGE)
}

/// `GET /{path}`
pub async fn page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    serve_page(&state, jar, &path)
}

/// Generic page router
///
/// Unauthenticated requests are sent to the login page before the path is
/// looked at.
fn serve_page(state: &AppState, jar: SignedCookieJar, path: &str) -> Result<Response, AppError> {
    let Some(user) = current_user(state, &jar)? else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    let (jar, flashed) = flash::take(jar);
    let context = json!({
        "username": user.username,
        "path": path,
        "flash": flashed,
    });

    match state.templates.resolve(path, &context) {
        Ok(html) => Ok((jar, Html(html)).into_response()),
        Err(TemplateError::NotFound(_)) => {
            let html = state.templates.render(NOT_FOUND_TEMPLATE, &context)?;
            Ok((StatusCode::NOT_FOUND, jar, Html(html)).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, Templates) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::create_dir_all(dir.path().join("ml_pages")).unwrap();
        fs::write(dir.path().join("pages/index.html"), "index {{name}}").unwrap();
        fs::write(dir.path().join("pages/shared.html"), "from pages").unwrap();
        fs::write(dir.path().join("ml_pages/shared.html"), "from ml_pages").unwrap();
        fs::write(dir.path().join("ml_pages/model.html"), "model").unwrap();
        fs::write(dir.path().join("ml_pages/broken.html"), "{{no_such_helper 1}}").unwrap();
        let templates = Templates::from_dir(dir.path()).unwrap();
        (dir, templates)
    }

    #[test]
    fn pages_directory_wins() {
        let (_dir, templates) = fixture();
        let html = templates.resolve("shared.html", &json!({})).unwrap();
        assert_eq!(html, "from pages");
    }

    #[test]
    fn falls_back_to_ml_pages() {
        let (_dir, templates) = fixture();
        assert_eq!(templates.resolve("model.html", &json!({})).unwrap(), "model");
        assert_eq!(
            templates.resolve("index.html", &json!({"name": "x"})).unwrap(),
            "index x"
        );
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let (_dir, templates) = fixture();
        assert!(matches!(
            templates.resolve("nope.html", &json!({})),
            Err(TemplateError::NotFound(path)) if path == "nope.html"
        ));
        assert!(matches!(
            templates.resolve("../pages/index.html", &json!({})),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn render_failure_is_reported() {
        let (_dir, templates) = fixture();
        assert!(matches!(
            templates.resolve("broken.html", &json!({})),
            Err(TemplateError::Render { name, .. }) if name == "ml_pages/broken.html"
        ));
    }
}
