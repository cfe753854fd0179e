//! Uniform error presentation for the whole router.
//!
//! [`intercept_errors`] wraps every route. It runs the downstream chain to completion, buffering
//! the response, before anything is sent to the client:
//!
//! ```text
//! Running ──panic / body failure──▶ Panicked ──▶ 500 error presentation
//!    │
//!    └──────────returned──────────▶ Completed(status)
//!                                      ├─ 401/403/404/405/500 ─▶ error presentation for that status
//!                                      └─ anything else ───────▶ buffered response, verbatim
//! ```
//!
//! The error presentation is a JSON object `{"error": "<kind>"}` for paths under the configured
//! API prefix and a rendered HTML page for everything else. Handlers can therefore answer with a
//! bare status code and never build error bodies themselves.

use std::panic::AssertUnwindSafe;

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{Method, StatusCode, response::Parts},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error};

use crate::{AppState, templates::Templates};

/// Whether a request expects machine-readable or human-readable errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFlavor {
    Api,
    Page,
}

impl RequestFlavor {
    pub fn for_path(path: &str, api_prefix: &str) -> Self {
        if path.starts_with(api_prefix) {
            RequestFlavor::Api
        } else {
            RequestFlavor::Page
        }
    }
}

/// The statuses that always get the uniform presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl ErrorKind {
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::UNAUTHORIZED => Some(ErrorKind::Unauthorized),
            StatusCode::FORBIDDEN => Some(ErrorKind::Forbidden),
            StatusCode::NOT_FOUND => Some(ErrorKind::NotFound),
            StatusCode::METHOD_NOT_ALLOWED => Some(ErrorKind::MethodNotAllowed),
            StatusCode::INTERNAL_SERVER_ERROR => Some(ErrorKind::InternalServerError),
            _ => None,
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier used in JSON bodies
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::InternalServerError => "internal_server_error",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Access denied",
            ErrorKind::NotFound => "Page not found",
            ErrorKind::MethodNotAllowed => "Method not allowed",
            ErrorKind::InternalServerError => "Something went wrong",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "You need to log in to see this page.",
            ErrorKind::Forbidden => "You do not have permission to access this page.",
            ErrorKind::NotFound => "The page you are looking for does not exist.",
            ErrorKind::MethodNotAllowed => "This page does not accept that kind of request.",
            ErrorKind::InternalServerError => "An unexpected error occurred. Please try again later.",
        }
    }
}

/// What the downstream chain produced, fully buffered
pub enum Interception {
    /// The handler panicked, or its body failed while being buffered
    Panicked { detail: String },
    Completed { parts: Parts, body: Bytes },
}

/// What the interceptor will send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Rewrite(ErrorKind),
    PassThrough,
}

impl Interception {
    /// Run the rest of the chain, catching panics and buffering the whole body
    pub async fn run(request: Request, next: Next) -> Self {
        let downstream = async move {
            let response = next.run(request).await;
            let (parts, body) = response.into_parts();
            let body = to_bytes(body, usize::MAX).await;
            (parts, body)
        };

        match AssertUnwindSafe(downstream).catch_unwind().await {
            Ok((parts, Ok(body))) => Interception::Completed { parts, body },
            Ok((_, Err(e))) => Interception::Panicked {
                detail: format!("response body failed: {e}"),
            },
            Err(payload) => Interception::Panicked {
                detail: panic_detail(payload.as_ref()),
            },
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            Interception::Panicked { .. } => Disposition::Rewrite(ErrorKind::InternalServerError),
            Interception::Completed { parts, .. } => ErrorKind::from_status(parts.status).map_or(Disposition::PassThrough, Disposition::Rewrite),
        }
    }

    /// Produce the one response the client sees
    pub fn finish(self, templates: &Templates, method: &Method, path: &str, flavor: RequestFlavor) -> Response {
        let disposition = self.disposition();
        match (self, disposition) {
            (Interception::Panicked { detail }, _) => {
                error!(method = %method, path, detail = %detail, "[panic] request handler failed");
                templates.render_error(ErrorKind::InternalServerError, flavor, path)
            }
            (Interception::Completed { .. }, Disposition::Rewrite(kind)) => {
                debug!(method = %method, path, status = kind.status().as_u16(), "Rewriting error response");
                templates.render_error(kind, flavor, path)
            }
            (Interception::Completed { parts, body }, Disposition::PassThrough) => Response::from_parts(parts, Body::from(body)),
        }
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Middleware giving every response under the router the uniform error presentation
pub async fn intercept_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let flavor = RequestFlavor::for_path(&path, &state.config.auth.api_prefix);

    Interception::run(request, next)
        .await
        .finish(&state.templates, &method, &path, flavor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StaticDirectory, create_test_state};
    use axum::{
        Router,
        http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE},
        middleware::from_fn_with_state,
        response::{IntoResponse, Redirect},
        routing::get,
    };
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    fn server(router: Router<AppState>) -> TestServer {
        let state = create_test_state(StaticDirectory::new());
        let app = router
            .layer(from_fn_with_state(state.clone(), intercept_errors))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    async fn custom_404() -> impl IntoResponse {
        (StatusCode::NOT_FOUND, [(SET_COOKIE, "leak=1")], "handler-specific 404 body")
    }

    async fn custom_500() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "database exploded: table users")
    }

    async fn boom() -> &'static str {
        panic!("handler blew up with secret detail")
    }

    async fn boom_formatted() -> &'static str {
        let id = 42;
        panic!("work {id} vanished")
    }

    #[test]
    fn test_request_flavor() {
        assert_eq!(RequestFlavor::for_path("/api/session", "/api/"), RequestFlavor::Api);
        assert_eq!(RequestFlavor::for_path("/api", "/api/"), RequestFlavor::Page);
        assert_eq!(RequestFlavor::for_path("/apiary", "/api/"), RequestFlavor::Page);
        assert_eq!(RequestFlavor::for_path("/dashboard", "/api/"), RequestFlavor::Page);
    }

    #[test]
    fn test_error_kind_taxonomy() {
        for (status, kind) in [
            (401, "unauthorized"),
            (403, "forbidden"),
            (404, "not_found"),
            (405, "method_not_allowed"),
            (500, "internal_server_error"),
        ] {
            let status = StatusCode::from_u16(status).unwrap();
            let error_kind = ErrorKind::from_status(status).unwrap();
            assert_eq!(error_kind.as_str(), kind);
            assert_eq!(error_kind.status(), status);
            assert_eq!(serde_json::to_value(error_kind).unwrap(), json!(kind));
        }

        for status in [200, 201, 204, 302, 303, 400, 409, 418, 502, 503] {
            assert_eq!(ErrorKind::from_status(StatusCode::from_u16(status).unwrap()), None);
        }
    }

    #[tokio::test]
    async fn test_api_404_replaced_with_json() {
        let server = server(Router::new().route("/api/works/{id}", get(custom_404)));

        let response = server.get("/api/works/7").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.text(), r#"{"error":"not_found"}"#);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_page_404_replaced_with_error_page() {
        let server = server(Router::new().route("/works/{id}", get(custom_404)));

        let response = server.get("/works/7").await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body = response.text();
        assert!(!body.contains("handler-specific"));
        assert!(body.contains("Page not found"));
        assert!(response.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap().starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_unrouted_paths_get_uniform_404() {
        let server = server(Router::new().route("/", get(|| async { "home" })));

        let page = server.get("/nowhere").await;
        page.assert_status(StatusCode::NOT_FOUND);
        assert!(page.text().contains("Page not found"));

        let api = server.get("/api/nowhere").await;
        api.assert_status(StatusCode::NOT_FOUND);
        let body: Value = api.json();
        assert_eq!(body, json!({"error": "not_found"}));
    }

    #[tokio::test]
    async fn test_wrong_method_gets_uniform_405() {
        let server = server(Router::new().route("/api/session", get(|| async { "ok" })));

        let response = server.post("/api/session").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json();
        assert_eq!(body, json!({"error": "method_not_allowed"}));
    }

    #[tokio::test]
    async fn test_handler_500_body_is_never_exposed() {
        let server = server(
            Router::new()
                .route("/api/export", get(custom_500))
                .route("/export", get(custom_500)),
        );

        let api = server.get("/api/export").await;
        api.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.text(), r#"{"error":"internal_server_error"}"#);

        let page = server.get("/export").await;
        page.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!page.text().contains("database exploded"));
        assert!(page.text().contains("Something went wrong"));
    }

    #[test_log::test(tokio::test)]
    async fn test_panic_becomes_single_500() {
        let server = server(
            Router::new()
                .route("/api/boom", get(boom))
                .route("/boom", get(boom_formatted)),
        );

        let api = server.get("/api/boom").await;
        api.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.text(), r#"{"error":"internal_server_error"}"#);

        let page = server.get("/boom").await;
        page.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!page.text().contains("vanished"));

        // The server keeps serving after a panic
        let again = server.get("/api/boom").await;
        again.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Log output shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_panic_logs_one_error_line() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = server(Router::new().route("/boom", get(boom_formatted)));
        server.get("/boom").await.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let errors: Vec<String> = logs.lines().into_iter().filter(|line| line.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "{errors:?}");
        let line = &errors[0];
        assert!(line.contains("GET"), "{line}");
        assert!(line.contains("/boom"), "{line}");
        assert!(line.contains("work 42 vanished"), "{line}");
    }

    #[tokio::test]
    async fn test_success_passes_through_verbatim() {
        let server = server(Router::new().route(
            "/api/data",
            get(|| async { ([(SET_COOKIE, "theme=dark"), (CONTENT_TYPE, "text/csv")], "title,progress\nDune,3\n") }),
        ));

        let response = server.get("/api/data").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "title,progress\nDune,3\n");
        assert_eq!(response.headers().get(SET_COOKIE).unwrap(), "theme=dark");
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/csv");
    }

    #[tokio::test]
    async fn test_other_statuses_pass_through() {
        let server = server(
            Router::new()
                .route("/redirect", get(|| async { Redirect::to("/login") }))
                .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }))
                .route("/api/bad", get(|| async { (StatusCode::BAD_REQUEST, "missing title") })),
        );

        let redirect = server.get("/redirect").await;
        redirect.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(redirect.headers().get(LOCATION).unwrap(), "/login");

        let teapot = server.get("/teapot").await;
        teapot.assert_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(teapot.text(), "short and stout");

        let bad = server.get("/api/bad").await;
        bad.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(bad.text(), "missing title");
    }

    #[tokio::test]
    async fn test_empty_success_defaults_to_200() {
        let server = server(Router::new().route("/ping", get(|| async {})));

        let response = server.get("/ping").await;

        response.assert_status_ok();
        assert!(response.text().is_empty());
    }
}
