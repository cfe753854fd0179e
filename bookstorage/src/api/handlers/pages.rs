use axum::{extract::State, http::HeaderMap, response::Html};
use minijinja::context;

use crate::{
    AppState,
    auth::identity::{Identity, SessionUser, session_user_id},
    errors::Error,
};

/// Public landing page
#[tracing::instrument(skip_all)]
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, Error> {
    state.templates.page(
        "home.html",
        context! { user_id => session_user_id(&headers, &state.config.auth.session) },
    )
}

#[tracing::instrument(skip_all, fields(user_id = user.0))]
pub async fn dashboard(State(state): State<AppState>, user: SessionUser) -> Result<Html<String>, Error> {
    state.templates.page("dashboard.html", context! { user_id => user.0 })
}

#[tracing::instrument(skip_all, fields(user_id = identity.user_id))]
pub async fn admin_accounts(State(state): State<AppState>, identity: Identity) -> Result<Html<String>, Error> {
    state.templates.page(
        "admin_accounts.html",
        context! {
            user_id => identity.user_id,
            is_superadmin => identity.is_superadmin,
        },
    )
}
