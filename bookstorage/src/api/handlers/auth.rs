use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::context;

use crate::{
    AppState,
    api::models::auth::{LoginForm, LoginQuery, SessionRedirect},
    auth::{
        identity::session_user_id,
        login::authenticate,
        session::{clear_session_cookie, session_cookie},
    },
    errors::Error,
};

/// Where a successful login lands
const AFTER_LOGIN: &str = "/dashboard";

/// Login form, with a banner for whichever flag the previous redirect set
#[tracing::instrument(skip_all)]
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<LoginQuery>) -> Result<Html<String>, Error> {
    state.templates.page(
        "login.html",
        context! {
            user_id => session_user_id(&headers, &state.config.auth.session),
            error => query.error(),
            pending => query.pending(),
            registered => query.registered(),
            expired => query.expired(),
        },
    )
}

/// Check the submitted credentials and start a session
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response, Error> {
    let login_path = &state.config.auth.login_path;

    match authenticate(state.directory.as_ref(), &form.username, &form.password).await {
        Ok(user_id) => Ok(SessionRedirect {
            location: AFTER_LOGIN.to_string(),
            cookie: session_cookie(user_id, &state.config.auth.session),
        }
        .into_response()),
        Err(Error::InvalidCredentials) => Ok(Redirect::to(&format!("{login_path}?error=1")).into_response()),
        Err(Error::PendingApproval) => Ok(Redirect::to(&format!("{login_path}?pending=1")).into_response()),
        Err(e) => Err(e),
    }
}

/// End the session. Works with or without one.
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> SessionRedirect {
    SessionRedirect {
        location: "/".to_string(),
        cookie: clear_session_cookie(&state.config.auth.session),
    }
}
