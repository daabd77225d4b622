use crate::config::ConfigError;
use crate::graph::ChartError;
use crate::loader::LoadError;
use crate::login::AuthError;
use crate::pages::TemplateError;
use crate::users::StoreError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failure of a single request
///
/// Converted into an HTML error page; the underlying error is logged and
/// never affects other requests.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("failed to read upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("failed to save upload: {0}")]
    Upload(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Multipart(err) => err.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(error = %self, status = status.as_u16(), "request failed");

        let body = format!(
            "<!DOCTYPE html><html><head><title>{status}</title></head>\
             <body><h1>{status}</h1><p>{}</p></body></html>",
            handlebars::html_escape(&self.to_string())
        );
        (status, Html(body)).into_response()
    }
}

/// Errors that stop the server from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}
