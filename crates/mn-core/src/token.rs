//! # Token Service
//!
//! Signs and verifies the opaque authorization tokens used for
//! ownership cookies, moderation action links, and unsubscribe links.
//!
//! Each logical use gets its own claim variant, and the discriminator
//! is serialized inside the signed payload, so a token minted for one
//! purpose can never verify for another. Verification fails closed on
//! every mismatch: wrong variant, missing fields, tampered signature,
//! or an elapsed expiry. There is no partial acceptance.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// What a token proves. The `scope` tag is part of the signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum Claim {
    /// Issued to the creating client as a cookie; grants edit/delete on
    /// one comment while the ownership window lasts.
    Ownership { id: i64 },
    /// Embedded in moderation links; grants activate/edit/delete on one
    /// comment without an ownership cookie.
    Moderation { id: i64 },
    /// Embedded in notification emails; grants clearing the
    /// notification flag for one address.
    Unsubscribe { email: String },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    claim: Claim,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    Signature,
    #[error("token has expired")]
    Expired,
    #[error("token not valid for this purpose")]
    Scope,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

/// HMAC-SHA256 signer over a base64url `payload.signature` pair.
#[derive(Clone)]
pub struct Signer {
    key: Vec<u8>,
}

impl Signer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: secret.to_vec(),
        }
    }

    /// Signs `claim`, optionally bound to an expiry `ttl` from now.
    pub fn sign(&self, claim: Claim, ttl: Option<Duration>) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let envelope = Envelope {
            iat: now,
            exp: ttl.map(|d| now + d.num_seconds()),
            claim,
        };
        let payload = serde_json::to_vec(&envelope).map_err(|_| TokenError::Malformed)?;
        let sig = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    /// Checks signature and expiry, then returns the embedded claim.
    /// Callers must still pattern-match the variant they require.
    pub fn verify(&self, token: &str) -> Result<Claim, TokenError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;

        self.mac(&payload)?
            .verify_slice(&sig)
            .map_err(|_| TokenError::Signature)?;

        let envelope: Envelope =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if let Some(exp) = envelope.exp {
            if exp < Utc::now().timestamp() {
                return Err(TokenError::Expired);
            }
        }
        Ok(envelope.claim)
    }

    /// Proves the caller owns comment `id`.
    pub fn verify_ownership(&self, token: &str, id: i64) -> Result<(), TokenError> {
        match self.verify(token)? {
            Claim::Ownership { id: t } if t == id => Ok(()),
            _ => Err(TokenError::Scope),
        }
    }

    /// Proves the caller holds a moderation link for comment `id`.
    pub fn verify_moderation(&self, token: &str, id: i64) -> Result<(), TokenError> {
        match self.verify(token)? {
            Claim::Moderation { id: t } if t == id => Ok(()),
            _ => Err(TokenError::Scope),
        }
    }

    /// Proves the caller holds an unsubscribe link for `email`.
    pub fn verify_unsubscribe(&self, token: &str, email: &str) -> Result<(), TokenError> {
        match self.verify(token)? {
            Claim::Unsubscribe { email: e } if e == email => Ok(()),
            _ => Err(TokenError::Scope),
        }
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::Malformed)?;
        mac.update(payload);
        Ok(mac)
    }
}
