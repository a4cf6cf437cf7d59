//! Authentication middleware that validates the session cookie and extends sessions.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use time::Duration;

use crate::{
    AppState, Error,
    auth::cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid session cookie.
///
/// The user ID is placed into the request and the request executed normally if the cookie is
/// valid, otherwise a 401 response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}");
            return Error::Unauthorized.into_response();
        }
    };
    let user_id = match get_token_from_cookies(&jar) {
        Ok(token) => token.user_id,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(jar.clone(), state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod auth_guard_tests {
    use axum::{
        Extension, Router,
        extract::State,
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key},
    };
    use axum_test::TestServer;
    use sha2::Digest;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{
            Token, UserID,
            cookie::{COOKIE_TOKEN, set_auth_cookie},
        },
    };

    use super::{AuthState, auth_guard};

    async fn test_handler(Extension(user_id): Extension<UserID>) -> String {
        user_id.to_string()
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(jar, UserID::new(42), state.cookie_duration)
    }

    async fn stub_short_log_in_route(jar: PrivateCookieJar) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(jar, UserID::new(42), Duration::seconds(30))
    }

    const TEST_LOG_IN_ROUTE: &str = "/log_in";
    const TEST_SHORT_LOG_IN_ROUTE: &str = "/log_in/short";
    const TEST_PROTECTED_ROUTE: &str = "/protected";

    fn get_state(cookie_duration: Duration) -> AuthState {
        let hash = sha2::Sha512::digest("nafstenoas");

        AuthState {
            cookie_key: Key::from(&hash),
            cookie_duration,
        }
    }

    fn get_test_server(state: AuthState) -> TestServer {
        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(test_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE, post(stub_log_in_route))
            .route(TEST_SHORT_LOG_IN_ROUTE, post(stub_short_log_in_route))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn get_protected_route_with_valid_cookie() {
        let server = get_test_server(get_state(Duration::minutes(5)));
        let session = server.post(TEST_LOG_IN_ROUTE).await.cookie(COOKIE_TOKEN);

        let response = server.get(TEST_PROTECTED_ROUTE).add_cookie(session).await;

        response.assert_status_ok();
        response.assert_text("42");
    }

    #[tokio::test]
    async fn get_protected_route_without_cookie_is_unauthorized() {
        let server = get_test_server(get_state(Duration::minutes(5)));

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status_unauthorized();
        response.assert_json(&serde_json::json!({ "message": "Not authorized" }));
    }

    #[tokio::test]
    async fn get_protected_route_with_unencrypted_cookie_is_unauthorized() {
        let server = get_test_server(get_state(Duration::minutes(5)));
        let token = Token {
            user_id: UserID::new(42),
            expires_at: OffsetDateTime::now_utc() + Duration::days(1),
        };
        let forged = Cookie::new(COOKIE_TOKEN, serde_json::to_string(&token).unwrap());

        server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(forged)
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn protected_route_extends_short_sessions() {
        let server = get_test_server(get_state(Duration::minutes(5)));
        let session = server.post(TEST_SHORT_LOG_IN_ROUTE).await.cookie(COOKIE_TOKEN);

        let response = server.get(TEST_PROTECTED_ROUTE).add_cookie(session).await;

        response.assert_status_ok();
        let expires = response.cookie(COOKIE_TOKEN).expires_datetime().unwrap();
        assert!(
            expires > OffsetDateTime::now_utc() + Duration::minutes(4),
            "want session extended to ~5 minutes, got expiry {expires}"
        );
    }
}
