/*!
# Vizboard

A small authenticated web application for uploading CSV datasets and viewing a
chart of a chosen feature column.

## Overview

Users register and log in with a username and password. Once logged in they
can browse the template-driven pages, upload a CSV file, and see the
visualization page for it. Uploaded files are written to a fixed folder and
parsed into an in-memory table before the chart is rendered.

## Architecture

### Web Layer
- **Technologies**: Rust, axum, handlebars
- **Key Components**:
  - Auth flow - login, registration and logout handlers
  - Page router - resolves `/{path}` against the `pages/` then `ml_pages/` templates
  - Upload handler - multipart upload, extension allow-list, chart page

### Data Layer
- **User store** - SQLite `users` table (id, username, email, password)
- **Session store** - in-memory sessions keyed by a signed cookie
- **CSV loader** - headed CSV files parsed into a `DataFrame`
- **Chart builder** - inline SVG scatter chart plus a JSON data block

## Modules

- **app**: Application context, routing and the upload handler
- **config**: TOML/CLI configuration
- **error**: Request and startup error types
- **flash**: One-shot messages carried across redirects
- **forms**: Login and registration form validation
- **graph**: Chart generation
- **loader**: CSV loading
- **login**: Password schemes, sessions and auth handlers
- **pages**: Template registry and generic page router
- **upload**: Filename checks and upload persistence
- **users**: User table access

## Routes

- `/login.html`, `/register.html`, `/logout.html` - authentication
- `/visualization.html` - upload a dataset (`input_data_file`) and view its chart
- `/sitemap.xml`, `/static/...` - static files
- `/`, `/{path}` - any template under `pages/` or `ml_pages/`
*/

pub mod app;
pub mod config;
pub mod error;
pub mod flash;
pub mod forms;
pub mod graph;
pub mod loader;
pub mod login;
pub mod pages;
pub mod upload;
pub mod users;

pub use app::{AppState, router};
pub use config::Config;
pub use error::{AppError, StartupError};
pub use graph::{ChartComponents, GraphOptions};
pub use loader::DataFrame;
pub use login::{PasswordScheme, SessionStore};
pub use pages::Templates;
pub use users::{User, UserStore};
