//! Ed25519 keys and JWT auth tokens for libsql-server.
//!
//! Keys use the same layout as the operator's auth secret: unpadded
//! URL-safe base64, with the private key stored as the 64-byte
//! `seed || public` form.

use crate::error::{AhtiError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// JWS header for every minted token.
const TOKEN_HEADER: &str = r#"{"alg":"EdDSA","typ":"JWT"}"#;

/// An Ed25519 key pair.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a fresh key pair from the OS random source.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Loads a key pair from an encoded private key.
    pub fn from_private_key_b64(encoded: &str) -> Result<Self> {
        Ok(Self {
            signing_key: parse_signing_key(encoded)?,
        })
    }

    /// The public key, suitable for `SQLD_AUTH_JWT_KEY`.
    pub fn public_key_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.signing_key.verifying_key().to_bytes())
    }

    /// The 64-byte private key form.
    pub fn private_key_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.signing_key.to_keypair_bytes())
    }

    /// Signs a token with this key pair.
    pub fn mint(&self, claims: &TokenClaims) -> Result<String> {
        sign(&self.signing_key, claims)
    }
}

/// Access level granted by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
}

/// Claims carried by an auth token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry as a unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<Access>,
}

impl TokenClaims {
    /// Claims that expire `secs` seconds from now.
    ///
    /// Fails when the expiry does not fit in a unix timestamp.
    pub fn expiring_in(secs: i64) -> Result<Self> {
        let exp = chrono::Utc::now()
            .timestamp()
            .checked_add(secs)
            .ok_or_else(|| AhtiError::config("--expires-in is too large"))?;
        Ok(Self {
            exp: Some(exp),
            a: None,
        })
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.a = Some(access);
        self
    }

    fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Mints a token signed by the given base64 private key.
pub fn mint_token(private_key_b64: &str, claims: &TokenClaims) -> Result<String> {
    let signing_key = parse_signing_key(private_key_b64)?;
    sign(&signing_key, claims)
}

/// Checks a token's signature and expiry, returning its claims.
pub fn verify_token(public_key_b64: &str, token: &str) -> Result<TokenClaims> {
    let key_bytes: [u8; 32] = decode_b64(public_key_b64)?
        .try_into()
        .map_err(|_| AhtiError::auth("Public key must be 32 bytes"))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| AhtiError::auth(format!("Invalid public key: {e}")))?;

    let token = token.trim();
    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| AhtiError::auth("Token must have three segments"))?;
    let (header, payload) = signing_input
        .split_once('.')
        .filter(|(_, payload)| !payload.contains('.'))
        .ok_or_else(|| AhtiError::auth("Token must have three segments"))?;

    let header: serde_json::Value = serde_json::from_slice(&decode_b64(header)?)
        .map_err(|e| AhtiError::auth(format!("Invalid token header: {e}")))?;
    if header.get("alg").and_then(|v| v.as_str()) != Some("EdDSA") {
        return Err(AhtiError::auth("Token is not signed with EdDSA"));
    }

    let signature = Signature::from_slice(&decode_b64(signature)?)
        .map_err(|e| AhtiError::auth(format!("Invalid token signature: {e}")))?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| AhtiError::auth("Token signature does not match the public key"))?;

    let claims: TokenClaims = serde_json::from_slice(&decode_b64(payload)?)
        .map_err(|e| AhtiError::auth(format!("Invalid token claims: {e}")))?;

    if claims.is_expired(chrono::Utc::now().timestamp()) {
        return Err(AhtiError::auth("Token has expired"));
    }

    Ok(claims)
}

/// Parses a 32-byte seed or a 64-byte keypair.
pub fn parse_signing_key(encoded: &str) -> Result<SigningKey> {
    let bytes = decode_b64(encoded)?;
    match bytes.len() {
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair)
                .map_err(|e| AhtiError::auth(format!("Invalid private key: {e}")))
        }
        n => Err(AhtiError::auth(format!(
            "Private key must be 32 or 64 bytes, got {n}"
        ))),
    }
}

fn sign(signing_key: &SigningKey, claims: &TokenClaims) -> Result<String> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| AhtiError::internal(format!("Failed to encode token claims: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = signing_key.sign(signing_input.as_bytes());

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

fn decode_b64(encoded: &str) -> Result<Vec<u8>> {
    let cleaned: String = encoded
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('=')
        .to_string();

    URL_SAFE_NO_PAD
        .decode(cleaned.as_bytes())
        .map_err(|e| AhtiError::auth(format!("Invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_lengths() {
        let pair = KeyPair::generate();
        assert_eq!(decode_b64(&pair.public_key_b64()).unwrap().len(), 32);
        assert_eq!(decode_b64(&pair.private_key_b64()).unwrap().len(), 64);
        assert!(!pair.private_key_b64().contains('='));
    }

    #[test]
    fn test_private_key_reload_keeps_public_key() {
        let pair = KeyPair::generate();
        let reloaded = KeyPair::from_private_key_b64(&pair.private_key_b64()).unwrap();
        assert_eq!(reloaded.public_key_b64(), pair.public_key_b64());
    }

    #[test]
    fn test_seed_form_accepted() {
        let pair = KeyPair::generate();
        let keypair_bytes = decode_b64(&pair.private_key_b64()).unwrap();
        let seed_b64 = URL_SAFE_NO_PAD.encode(&keypair_bytes[..32]);

        let from_seed = KeyPair::from_private_key_b64(&seed_b64).unwrap();
        assert_eq!(from_seed.public_key_b64(), pair.public_key_b64());
    }

    #[test]
    fn test_padding_and_whitespace_tolerated() {
        let pair = KeyPair::generate();
        let padded = format!(" {}== \n", pair.public_key_b64());
        assert_eq!(decode_b64(&padded).unwrap().len(), 32);
    }

    #[test]
    fn test_default_claims_serialize_empty() {
        let json = serde_json::to_string(&TokenClaims::default()).unwrap();
        assert_eq!(json, "{}");

        let json = serde_json::to_string(&TokenClaims::default().with_access(Access::ReadOnly))
            .unwrap();
        assert_eq!(json, r#"{"a":"ro"}"#);
    }

    #[test]
    fn test_mint_and_verify() {
        let pair = KeyPair::generate();
        let claims = TokenClaims::expiring_in(3600).unwrap().with_access(Access::ReadWrite);
        let token = mint_token(&pair.private_key_b64(), &claims).unwrap();

        assert_eq!(token.split('.').count(), 3);
        let header = decode_b64(token.split('.').next().unwrap()).unwrap();
        assert_eq!(header, TOKEN_HEADER.as_bytes());

        let verified = verify_token(&pair.public_key_b64(), &token).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let token = signer.mint(&TokenClaims::default()).unwrap();

        let err = verify_token(&other.public_key_b64(), &token).unwrap_err();
        assert!(matches!(err, AhtiError::Auth(_)));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let pair = KeyPair::generate();
        let token = pair.mint(&TokenClaims::default()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"a":"rw"}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(verify_token(&pair.public_key_b64(), &forged).is_err());
    }

    #[test]
    fn test_verify_rejects_expired() {
        let pair = KeyPair::generate();
        let token = pair.mint(&TokenClaims::expiring_in(-10).unwrap()).unwrap();

        let err = verify_token(&pair.public_key_b64(), &token).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_expiry_overflow_is_config_error() {
        let err = TokenClaims::expiring_in(i64::MAX).unwrap_err();
        assert!(matches!(err, AhtiError::Config(_)));
        assert!(err.to_string().contains("--expires-in is too large"));

        assert!(TokenClaims::expiring_in(i64::MIN).is_err());
    }

    #[test]
    fn test_malformed_inputs() {
        let pair = KeyPair::generate();
        assert!(verify_token(&pair.public_key_b64(), "only.two").is_err());
        assert!(verify_token(&pair.public_key_b64(), "a.b.c.d").is_err());
        assert!(mint_token("!!!", &TokenClaims::default()).is_err());
        assert!(mint_token(&URL_SAFE_NO_PAD.encode([0u8; 16]), &TokenClaims::default()).is_err());
    }
}
