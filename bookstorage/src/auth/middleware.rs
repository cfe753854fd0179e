//! Access guards.
//!
//! Both guards are axum `from_fn_with_state` middleware meant for `route_layer`, so they only run
//! for requests that matched a route. A blocked request never reaches the handler.
//!
//! | caller            | authenticated guard          | admin guard                  |
//! |-------------------|------------------------------|------------------------------|
//! | no session, API   | 401 `unauthorized`           | 401 `unauthorized`           |
//! | no session, page  | redirect to the login path   | redirect to the login path   |
//! | session, not admin| handler, cookie refreshed    | 403 `forbidden`              |
//! | session, admin    | handler, cookie refreshed    | handler                      |

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, instrument};

use crate::{
    AppState,
    auth::{
        identity::{SessionUser, resolve_identity, session_user_id},
        session::session_cookie,
    },
    errors::Error,
    intercept::RequestFlavor,
    types::UserId,
};

/// Let the request through when it carries a session, refreshing the cookie's lifetime.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn require_authenticated(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let session = &state.config.auth.session;
    let Some(user_id) = session_user_id(request.headers(), session) else {
        return reject_anonymous(&state, &request);
    };

    request.extensions_mut().insert(SessionUser(user_id));
    let mut response = next.run(request).await;

    // Login and logout set the cookie themselves
    if !sets_cookie(response.headers(), &session.cookie_name) {
        refresh_cookie(&mut response, user_id, &state);
    }
    response
}

/// Let the request through only when the session belongs to an administrator.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn require_admin(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // Owned copy: the request body is not `Sync`, so the request cannot be borrowed across the lookup
    let headers = request.headers().clone();
    let Some(identity) = resolve_identity(&headers, &state.config.auth.session, state.directory.as_ref()).await else {
        return reject_anonymous(&state, &request);
    };

    if !identity.is_admin {
        let path = request.uri().path();
        let flavor = RequestFlavor::for_path(path, &state.config.auth.api_prefix);
        return state.templates.present(
            Error::Forbidden {
                resource: path.to_string(),
            },
            flavor,
            path,
        );
    }

    debug!(user_id = identity.user_id, "Admin access granted");
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Routes in `router` require a session
pub fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state.clone(), require_authenticated))
}

/// Routes in `router` require an administrator
pub fn admin_only(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state.clone(), require_admin))
}

fn reject_anonymous(state: &AppState, request: &Request) -> Response {
    let path = request.uri().path();
    match RequestFlavor::for_path(path, &state.config.auth.api_prefix) {
        RequestFlavor::Api => state.templates.present(
            Error::Unauthenticated {
                message: Some("session missing or expired".to_string()),
            },
            RequestFlavor::Api,
            path,
        ),
        RequestFlavor::Page => Error::LoginRequired {
            location: state.config.auth.login_path.clone(),
        }
        .into_response(),
    }
}

fn sets_cookie(headers: &HeaderMap, cookie_name: &str) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.strip_prefix(cookie_name).is_some_and(|rest| rest.starts_with('=')))
}

fn refresh_cookie(response: &mut Response, user_id: UserId, state: &AppState) {
    match HeaderValue::from_str(&session_cookie(user_id, &state.config.auth.session)) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(user_id, "Failed to build session cookie: {}", e),
    }
}
