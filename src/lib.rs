// RS256 compact JWT construction for authorization filter test fixtures.

pub mod claims;
pub mod fixture;
pub mod key;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{crypto, Algorithm};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub use claims::{Claim, Claims};
pub use key::{KeyError, KeyPair, SigningKey, VerifyingKey};

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

/// The only header this crate emits, encoded as `{"alg":"RS256","typ":"JWT"}`.
const HEADER: Header = Header {
    alg: "RS256",
    typ: "JWT",
};

/// Produces compact RS256 tokens under a single private key.
///
/// Signing is a pure function of the claim bytes and the key: PKCS#1 v1.5
/// padding is deterministic, so the same claims always yield the same token.
#[derive(Clone, Debug)]
pub struct TokenSigner {
    key: SigningKey,
}

impl TokenSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Returns `<header>.<payload>.<signature>`, each segment base64url
    /// encoded without padding.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        sign(claims, &self.key)
    }
}

/// Signs `claims` with `key`. See [`TokenSigner::sign`].
pub fn sign(claims: &Claims, key: &SigningKey) -> Result<String, TokenError> {
    let header = encode_segment(&HEADER)?;
    let payload = encode_segment(claims)?;
    let signing_input = format!("{header}.{payload}");

    // jsonwebtoken hands back the signature already base64url encoded.
    let signature = crypto::sign(signing_input.as_bytes(), &key.inner, Algorithm::RS256)
        .map_err(TokenError::Signing)?;

    debug!(claims = claims.len(), "Signed RS256 token.");
    Ok(format!("{signing_input}.{signature}"))
}

/// The decoded parts of a token whose signature has been checked.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedToken {
    pub header: Value,
    pub claims: Value,
}

/// Checks the RS256 signature of `token` and decodes its header and claims.
///
/// No claim is validated: expired or not-yet-valid tokens still decode.
pub fn verify(token: &str, key: &VerifyingKey) -> Result<DecodedToken, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed(
            "expected three dot-separated segments".to_owned(),
        ));
    };
    if [header, payload, signature].iter().any(|segment| segment.is_empty()) {
        return Err(TokenError::Malformed("empty segment".to_owned()));
    }
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|err| TokenError::Malformed(format!("signature is not base64url: {err}")))?;

    let signing_input = &token[..header.len() + 1 + payload.len()];
    let valid = crypto::verify(
        signature,
        signing_input.as_bytes(),
        &key.inner,
        Algorithm::RS256,
    )
    .map_err(TokenError::Verification)?;
    if !valid {
        return Err(TokenError::InvalidSignature);
    }

    Ok(DecodedToken {
        header: decode_segment(header)?,
        claims: decode_segment(payload)?,
    })
}

fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment(segment: &str) -> Result<Value, TokenError> {
    let json = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| TokenError::Malformed(format!("segment is not base64url: {err}")))?;
    serde_json::from_slice(&json)
        .map_err(|err| TokenError::Malformed(format!("segment is not JSON: {err}")))
}

/// An error producing or checking a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The header or claims could not be serialized to JSON, for example a
    /// float claim holding NaN.
    #[error("could not encode token contents: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The key was rejected or the signing backend failed.
    #[error("could not sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// The public key was rejected or the verification backend failed.
    #[error("could not verify token: {0}")]
    Verification(#[source] jsonwebtoken::errors::Error),

    /// `iat` plus the token lifetime does not fit in an i64.
    #[error("expiry overflows: issued at {issued_at} with a lifetime of {ttl}s")]
    ExpiryOverflow { issued_at: i64, ttl: i64 },

    /// The token is not a well-formed compact JWT.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The signature does not match the header and payload.
    #[error("token signature does not match")]
    InvalidSignature,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const PRIVATE_PEM: &str = include_str!("../tests/keys/rsa-private.pem");
    const PUBLIC_PEM: &str = include_str!("../tests/keys/rsa-public.pem");
    const OTHER_PUBLIC_PEM: &str = include_str!("../tests/keys/rsa-other-public.pem");
    // Signed independently with the same private key, iat 1700000000.
    const USER2_TOKEN: &str = include_str!("../tests/keys/user2-1700000000.jwt");

    fn signer() -> TokenSigner {
        TokenSigner::new(SigningKey::from_pem(PRIVATE_PEM.as_bytes()).unwrap())
    }

    fn verifying_key() -> VerifyingKey {
        VerifyingKey::from_pem(PUBLIC_PEM.as_bytes()).unwrap()
    }

    fn user2_claims() -> Claims {
        Claims::new()
            .with("iss", "https://auth.oxymoney.com")
            .with("sub", "user2")
            .with("aud", ["api.oxymoney.com"])
            .with("exp", 1_700_003_600_i64)
            .with("nbf", 1_700_000_000_i64)
            .with("iat", 1_700_000_000_i64)
            .with("client_id", "client_002")
            .with("username", "user2")
            .with("scope", "read write")
            .with("roles", "user")
    }

    fn is_base64url(segment: &str) -> bool {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }

    #[test]
    fn header_is_fixed() {
        assert_eq!(
            serde_json::to_string(&HEADER).unwrap(),
            r#"{"alg":"RS256","typ":"JWT"}"#
        );
    }

    #[test]
    fn token_has_three_unpadded_segments() {
        let token = signer().sign(&user2_claims()).unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|segment| is_base64url(segment)));
        assert_eq!(segments[0], "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9");

        // 2048-bit modulus, 256 byte signature.
        assert_eq!(URL_SAFE_NO_PAD.decode(segments[2]).unwrap().len(), 256);
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = signer();
        let first = signer.sign(&user2_claims()).unwrap();
        let second = signer.sign(&user2_claims()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn matches_reference_token() {
        let token = signer().sign(&user2_claims()).unwrap();
        assert_eq!(token, USER2_TOKEN.trim());
    }

    #[test]
    fn decodes_to_the_signed_claims() {
        let token = signer().sign(&user2_claims()).unwrap();
        let decoded = verify(&token, &verifying_key()).unwrap();

        assert_eq!(decoded.header, json!({ "alg": "RS256", "typ": "JWT" }));
        assert_eq!(
            decoded.claims,
            json!({
                "iss": "https://auth.oxymoney.com",
                "sub": "user2",
                "aud": ["api.oxymoney.com"],
                "exp": 1700003600,
                "nbf": 1700000000,
                "iat": 1700000000,
                "client_id": "client_002",
                "username": "user2",
                "scope": "read write",
                "roles": "user"
            })
        );
        assert_eq!(decoded.claims, user2_claims().to_value().unwrap());
    }

    #[test]
    fn any_tampered_character_fails_verification() {
        let token = signer().sign(&user2_claims()).unwrap();
        let key = verifying_key();
        let signing_input_len = token.rfind('.').unwrap();

        for index in (0..signing_input_len).filter(|i| token.as_bytes()[*i] != b'.') {
            let mut tampered = token.clone().into_bytes();
            tampered[index] = if tampered[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered).unwrap();

            assert!(
                matches!(verify(&tampered, &key), Err(TokenError::InvalidSignature)),
                "tampering at {index} went unnoticed"
            );
        }
    }

    #[test]
    fn wrong_public_key_fails_verification() {
        let token = signer().sign(&user2_claims()).unwrap();
        let other = VerifyingKey::from_pem(OTHER_PUBLIC_PEM.as_bytes()).unwrap();
        assert!(matches!(
            verify(&token, &other),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn nan_claim_is_an_encoding_error() {
        let claims = user2_claims().with("exp", f64::NAN);
        assert!(matches!(
            signer().sign(&claims),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn rejects_malformed_tokens() {
        let key = verifying_key();
        for token in ["", "abc", "a.b", "a.b.c.d", "..", "a..c", "a.b.!!!"] {
            assert!(matches!(
                verify(token, &key),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn undecodable_signature_is_malformed() {
        let token = signer().sign(&user2_claims()).unwrap();
        let signing_input = &token[..token.rfind('.').unwrap()];

        let err = verify(&format!("{signing_input}.!!!"), &verifying_key()).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)), "{err:?}");
    }

    #[test]
    fn free_function_matches_signer() {
        let key = SigningKey::from_pem(PRIVATE_PEM.as_bytes()).unwrap();
        assert_eq!(
            sign(&user2_claims(), &key).unwrap(),
            signer().sign(&user2_claims()).unwrap()
        );
    }
}
