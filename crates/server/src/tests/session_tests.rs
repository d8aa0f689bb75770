use super::*;
use axum::http::HeaderValue;

fn test_config() -> SessionConfig {
    SessionConfig {
        secret: "test-secret".into(),
        ttl_seconds: 60,
    }
}

#[test]
fn mint_and_verify_round_trip() {
    let cfg = test_config();
    let token = mint_session_token(&cfg, UserId(7), "alice").expect("token");

    let user = verify_session_token(&cfg, &token).expect("valid session");
    assert_eq!(user.user_id, UserId(7));
    assert_eq!(user.username, "alice");
}

#[test]
fn token_signed_with_other_secret_is_rejected() {
    let cfg = test_config();
    let other = SessionConfig {
        secret: "other-secret".into(),
        ttl_seconds: 60,
    };
    let token = mint_session_token(&other, UserId(7), "alice").expect("token");

    assert!(verify_session_token(&cfg, &token).is_none());
}

#[test]
fn expired_token_is_rejected() {
    let cfg = SessionConfig {
        secret: "test-secret".into(),
        ttl_seconds: -120,
    };
    let token = mint_session_token(&cfg, UserId(7), "alice").expect("token");

    assert!(verify_session_token(&cfg, &token).is_none());
}

#[test]
fn garbage_token_is_rejected() {
    let cfg = test_config();
    assert!(verify_session_token(&cfg, "not-a-jwt").is_none());
}

#[test]
fn bearer_token_requires_the_bearer_scheme() {
    let mut headers = HeaderMap::new();
    assert!(bearer_token(&headers).is_none());

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert!(bearer_token(&headers).is_none());

    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer abc.def.ghi"),
    );
    assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
}
