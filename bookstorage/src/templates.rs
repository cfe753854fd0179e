//! Server-rendered pages.
//!
//! Templates are embedded from `templates/` at compile time and loaded once into a minijinja
//! [`Environment`] shared through [`crate::AppState`].

use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use minijinja::{Environment, context};
use rust_embed::RustEmbed;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{
    errors::Error,
    intercept::{ErrorKind, RequestFlavor},
};

#[derive(RustEmbed)]
#[folder = "templates/"]
struct TemplateFiles;

/// Error page template, rendered for every [`ErrorKind`]
const ERROR_TEMPLATE: &str = "error.html";

const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
    /// Linked from the 401 page
    login_path: String,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}

impl Templates {
    /// Load every embedded template. Fails on syntax errors so a broken template stops startup.
    pub fn load() -> anyhow::Result<Self> {
        let mut env = Environment::new();
        for name in TemplateFiles::iter() {
            let file = TemplateFiles::get(&name).ok_or_else(|| anyhow::anyhow!("embedded template {name} disappeared"))?;
            let source = String::from_utf8(file.data.into_owned())?;
            env.add_template_owned(name.into_owned(), source)?;
        }
        Ok(Self {
            env: Arc::new(env),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        })
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// Render a full page with status 200
    pub fn page<S: Serialize>(&self, name: &str, ctx: S) -> Result<Html<String>, Error> {
        self.render(name, ctx).map(Html).map_err(|e| Error::Internal {
            operation: format!("render template {name}: {e:#}"),
        })
    }

    /// The uniform error presentation: `{"error": kind}` for API requests, the error page otherwise
    pub fn render_error(&self, kind: ErrorKind, flavor: RequestFlavor, requested_path: &str) -> Response {
        let status = kind.status();
        match flavor {
            RequestFlavor::Api => (status, Json(json!({ "error": kind.as_str() }))).into_response(),
            RequestFlavor::Page => {
                let ctx = context! {
                    status => status.as_u16(),
                    kind => kind,
                    title => kind.title(),
                    message => kind.message(),
                    requested_path => requested_path,
                    login_path => self.login_path,
                };
                match self.render(ERROR_TEMPLATE, ctx) {
                    Ok(body) => (status, Html(body)).into_response(),
                    Err(e) => {
                        error!("Failed to render error page for {}: {:#}", status, e);
                        (status, format!("{} {}", status.as_u16(), kind.title())).into_response()
                    }
                }
            }
        }
    }

    /// Present an auth-layer error the way the rest of the router presents errors
    pub fn present(&self, err: Error, flavor: RequestFlavor, requested_path: &str) -> Response {
        match ErrorKind::from_status(err.status_code()) {
            Some(kind) => {
                err.log();
                self.render_error(kind, flavor, requested_path)
            }
            None => err.into_response(),
        }
    }
}

/// Fallback for unmatched routes; the interceptor turns the bare status into the 404 page
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::{CONTENT_TYPE, LOCATION};

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_all_templates_load() {
        let templates = Templates::load().unwrap();
        for name in ["layout.html", "error.html", "login.html", "home.html", "dashboard.html", "admin_accounts.html"] {
            assert!(templates.env.get_template(name).is_ok(), "{name} missing");
        }
    }

    #[tokio::test]
    async fn test_api_errors_are_compact_json() {
        let templates = Templates::load().unwrap();
        let response = templates.render_error(ErrorKind::Forbidden, RequestFlavor::Api, "/api/admin");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body_text(response).await, r#"{"error":"forbidden"}"#);
    }

    #[tokio::test]
    async fn test_error_page_mentions_requested_path() {
        let templates = Templates::load().unwrap();
        let response = templates.render_error(ErrorKind::NotFound, RequestFlavor::Page, "/works/<script>");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_text(response).await;
        assert!(body.contains("Page not found"));
        assert!(body.contains("404"));
        // Auto-escaped
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[tokio::test]
    async fn test_unauthorized_page_links_configured_login_path() {
        let templates = Templates::load().unwrap().with_login_path("/signin");
        let response = templates.render_error(ErrorKind::Unauthorized, RequestFlavor::Page, "/shelf");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_text(response).await;
        assert!(body.contains("signin"), "{body}");
        assert!(!body.contains("&#x2f;login"), "{body}");
        assert!(!body.contains("\"/login\""), "{body}");
    }

    #[tokio::test]
    async fn test_present_keeps_redirects() {
        let templates = Templates::load().unwrap();
        let response = templates.present(
            Error::LoginRequired {
                location: "/login".to_string(),
            },
            RequestFlavor::Page,
            "/dashboard",
        );
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn test_present_renders_taxonomy_errors() {
        let templates = Templates::load().unwrap();
        let response = templates.present(Error::Unauthenticated { message: None }, RequestFlavor::Api, "/api/session");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(response).await, r#"{"error":"unauthorized"}"#);
    }
}
