//! Session cookie encoding.
//!
//! The session token is the account's decimal user id, carried in a plain HTTP-only cookie.
//! It is neither signed nor encrypted: anyone who can set a cookie can claim any id. Admin
//! checks re-read privilege flags from the database on every request, but plain "logged in"
//! checks trust the cookie as-is.

use axum::http::{HeaderMap, header::COOKIE};

use crate::{config::SessionConfig, types::UserId};

/// Encode a user id as a session token
pub fn encode_session(user_id: UserId) -> String {
    user_id.to_string()
}

/// Decode a session token. Anything other than a positive decimal integer is no session.
pub fn decode_session(token: &str) -> Option<UserId> {
    token.parse::<UserId>().ok().filter(|id| crate::types::is_valid_user_id(*id))
}

/// Value of the first cookie called `name`, across all `Cookie` headers.
/// One pair of surrounding double quotes is removed.
pub fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find_map(|(cookie_name, value)| (cookie_name == name).then_some(unquote(value)))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Set-Cookie value establishing (or refreshing) the session for `user_id`
pub fn session_cookie(user_id: UserId, config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}{}",
        config.cookie_name,
        encode_session(user_id),
        config.cookie_same_site,
        config.timeout.as_secs(),
        secure
    )
}

/// Set-Cookie value that removes the session cookie
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0", config.cookie_name, config.cookie_same_site)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_encode_decode_round_trip() {
        for id in [1, 2, 42, 1_000_000, i64::MAX] {
            assert_eq!(decode_session(&encode_session(id)), Some(id));
        }
    }

    #[test]
    fn test_decode_rejects_non_positive_and_garbage() {
        for token in ["0", "-5", "abc", "", " 7", "7 ", "1.5", "99999999999999999999"] {
            assert_eq!(decode_session(token), None, "token {token:?}");
        }
    }

    #[test]
    fn test_cookie_value_finds_named_cookie() {
        let headers = headers(&["theme=dark; user_id=12; lang=fr"]);
        assert_eq!(cookie_value(&headers, "user_id"), Some("12"));
        assert_eq!(cookie_value(&headers, "lang"), Some("fr"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_across_multiple_headers() {
        let headers = headers(&["theme=dark", "user_id=3"]);
        assert_eq!(cookie_value(&headers, "user_id"), Some("3"));
    }

    #[test]
    fn test_cookie_value_strips_one_pair_of_quotes() {
        let headers = headers(&[r#"user_id="5"; theme=""dark""; lang=""#]);
        assert_eq!(cookie_value(&headers, "user_id"), Some("5"));
        assert_eq!(cookie_value(&headers, "theme"), Some(r#""dark""#));
        assert_eq!(cookie_value(&headers, "lang"), Some(r#"""#));
        assert_eq!(cookie_value(&headers, "user_id").and_then(decode_session), Some(5));

        // Unbalanced quotes are kept, so the token does not decode
        let headers = self::headers(&[r#"user_id="5"#]);
        assert_eq!(cookie_value(&headers, "user_id").and_then(decode_session), None);
    }

    #[test]
    fn test_cookie_value_requires_exact_name() {
        let headers = headers(&["xuser_id=4; user_idx=5"]);
        assert_eq!(cookie_value(&headers, "user_id"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig {
            timeout: Duration::from_secs(3600),
            ..Default::default()
        };
        assert_eq!(session_cookie(7, &config), "user_id=7; Path=/; HttpOnly; SameSite=lax; Max-Age=3600");

        let secure = SessionConfig {
            cookie_secure: true,
            ..config.clone()
        };
        assert!(session_cookie(7, &secure).ends_with("; Secure"));
    }

    #[test]
    fn test_clear_session_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&SessionConfig::default());
        assert!(cookie.starts_with("user_id=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
