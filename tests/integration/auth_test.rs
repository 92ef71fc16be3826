//! Token minting integration tests.

use ahti_connect::auth::{mint_token, verify_token, Access, KeyPair, TokenClaims};
use ahti_connect::config::ConnectionConfig;
use ahti_connect::connection::apply_private_key;
use ahti_connect::error::AhtiError;

#[test]
fn test_keygen_output_round_trips_through_env_form() {
    let pair = KeyPair::generate();
    let restored = KeyPair::from_private_key_b64(&pair.private_key_b64()).unwrap();
    assert_eq!(restored.public_key_b64(), pair.public_key_b64());
}

#[test]
fn test_read_only_token_claims() {
    let pair = KeyPair::generate();
    let claims = TokenClaims::expiring_in(600).unwrap().with_access(Access::ReadOnly);

    let token = mint_token(&pair.private_key_b64(), &claims).unwrap();
    let verified = verify_token(&pair.public_key_b64(), &token).unwrap();

    assert_eq!(verified.a, Some(Access::ReadOnly));
    assert!(verified.exp.is_some());
}

#[test]
fn test_token_from_other_key_rejected() {
    let signer = KeyPair::generate();
    let other = KeyPair::generate();
    let token = signer.mint(&TokenClaims::default()).unwrap();

    let err = verify_token(&other.public_key_b64(), &token).unwrap_err();
    assert!(matches!(err, AhtiError::Auth(_)));
}

#[test]
fn test_session_token_applied_to_connection() {
    let pair = KeyPair::generate();
    let mut conn = ConnectionConfig::from_url("http://localhost:8082").unwrap();

    apply_private_key(&mut conn, Some(&pair.private_key_b64())).unwrap();

    let token = conn.auth_token.clone().unwrap();
    verify_token(&pair.public_key_b64(), &token).unwrap();
    assert!(conn.display_string().ends_with("(replica, token)"));
}

#[test]
fn test_bad_private_key_is_auth_error() {
    let mut conn = ConnectionConfig::default();
    let err = apply_private_key(&mut conn, Some("not-a-key")).unwrap_err();
    assert!(matches!(err, AhtiError::Auth(_)));
    assert_eq!(conn.auth_token, None);
}
