use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::auth::{AccountFlagsResponse, SessionResponse},
    auth::identity::{Identity, SessionUser},
    errors::Error,
    types::UserId,
};

/// The id behind the caller's session
#[tracing::instrument(skip_all)]
pub async fn get_session(SessionUser(user_id): SessionUser) -> Json<SessionResponse> {
    Json(SessionResponse { user_id })
}

/// Privilege flags of any account, for administrators
#[tracing::instrument(skip(state, _admin))]
pub async fn get_account_flags(
    State(state): State<AppState>,
    _admin: Identity,
    Path(user_id): Path<UserId>,
) -> Result<Json<AccountFlagsResponse>, Error> {
    let flags = state.directory.lookup_flags(user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Account".to_string(),
        id: user_id.to_string(),
    })?;

    Ok(Json(AccountFlagsResponse {
        user_id,
        is_admin: flags.is_admin,
        is_superadmin: flags.is_superadmin,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::{AccountFlagsResponse, SessionResponse};
    use crate::test_utils::{StaticDirectory, create_test_server};
    use serde_json::json;

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_superadmin(1, "root", "pw")
            .with_user(2, "reader", "pw", true, false)
    }

    #[tokio::test]
    async fn test_get_session() {
        let server = create_test_server(directory());

        let response = server.get("/api/session").add_header("cookie", "user_id=2").await;
        response.assert_status_ok();
        assert_eq!(response.json::<SessionResponse>(), SessionResponse { user_id: 2 });

        let response = server.get("/api/session").await;
        response.assert_status_unauthorized();
        response.assert_json(&json!({ "error": "unauthorized" }));
    }

    #[tokio::test]
    async fn test_get_account_flags() {
        let server = create_test_server(directory());

        let response = server.get("/api/admin/accounts/2").add_header("cookie", "user_id=1").await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<AccountFlagsResponse>(),
            AccountFlagsResponse {
                user_id: 2,
                is_admin: false,
                is_superadmin: false,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found_json() {
        let server = create_test_server(directory());

        let response = server.get("/api/admin/accounts/404").add_header("cookie", "user_id=1").await;
        response.assert_status_not_found();
        response.assert_json(&json!({ "error": "not_found" }));
    }

    #[tokio::test]
    async fn test_account_flags_forbidden_for_readers() {
        let server = create_test_server(directory());

        let response = server.get("/api/admin/accounts/1").add_header("cookie", "user_id=2").await;
        response.assert_status_forbidden();
        response.assert_json(&json!({ "error": "forbidden" }));
    }
}
