//! Compact HS256 bearer tokens.
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(HMAC-SHA256(secret, header "." claims))
//! ```
//!
//! The header is always `{"alg":"HS256","typ":"JWT"}` and the claims carry
//! only the login. Tokens do not expire.

use super::AuthError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    login: String,
}

/// Issues and verifies tokens with one shared secret.
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, login: &str) -> Result<String, AuthError> {
        let header = encode_json(&Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        })?;
        let claims = encode_json(&Claims {
            login: login.to_string(),
        })?;

        let signing_input = format!("{}.{}", header, claims);
        let signature = self
            .mac()?
            .chain_update(signing_input.as_bytes())
            .finalize()
            .into_bytes();

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check the signature and return the login the token was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("malformed token"));
        };

        let decoded: Header = decode_json(header)?;
        if decoded.alg != ALGORITHM {
            return Err(invalid("unsupported signing algorithm"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| invalid("malformed signature"))?;
        self.mac()?
            .chain_update(header.as_bytes())
            .chain_update(b".")
            .chain_update(claims.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| invalid("signature mismatch"))?;

        let claims: Claims = decode_json(claims)?;
        if claims.login.is_empty() {
            return Err(invalid("token carries no login"));
        }
        Ok(claims.login)
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("token key: {}", e)))
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AuthError::Internal(format!("encode token: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_json<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| invalid("malformed token"))?;
    serde_json::from_slice(&bytes).map_err(|_| invalid("malformed token"))
}

fn invalid(reason: &str) -> AuthError {
    AuthError::InvalidToken(reason.to_string())
}
