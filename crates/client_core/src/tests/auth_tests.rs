use super::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

fn sign(claims: serde_json::Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"server-only-secret"),
    )
    .expect("encode token")
}

#[test]
fn reads_user_id_claim_without_the_server_secret() {
    let token = sign(json!({ "user_id": "5b0c-user", "name": "alice", "exp": 1 }));
    let session = AuthSession::from_token(&token).expect("decode");
    assert_eq!(session.user_id(), &UserId::new("5b0c-user"));
    assert_eq!(session.token(), Some(token.as_str()));
}

#[test]
fn numeric_user_id_is_stringified() {
    let token = sign(json!({ "user_id": 42 }));
    let session = AuthSession::from_token(&token).expect("decode");
    assert_eq!(session.user_id().as_str(), "42");
}

#[test]
fn falls_back_to_subject_claim() {
    let token = sign(json!({ "sub": "user-7", "aud": "web" }));
    let session = AuthSession::from_token(&token).expect("decode");
    assert_eq!(session.user_id().as_str(), "user-7");
}

#[test]
fn rejects_token_without_user() {
    let token = sign(json!({ "name": "nobody" }));
    let err = AuthSession::from_token(&token).expect_err("no user id");
    assert!(matches!(err, ClientError::Auth(_)));
}

#[test]
fn rejects_garbage() {
    assert!(AuthSession::from_token("not-a-jwt").is_err());
}

#[test]
fn explicit_session_has_no_token() {
    let session = AuthSession::new(UserId::new("u1"));
    assert!(session.token().is_none());
}
