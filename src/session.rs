//! Signed session tokens.
//!
//! A token is `base64url(json claims) "." hex(hmac_sha256(secret, payload))`.
//! It carries the user id and the issue time; nothing is stored server side.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    uid: i64,
    iat: i64,
}

pub struct SessionKey {
    secret: Vec<u8>,
    max_age: Duration,
}

impl SessionKey {
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        Self {
            secret: secret.to_vec(),
            max_age,
        }
    }

    /// Random per-process key; sessions do not survive a restart.
    pub fn generate(max_age: Duration) -> Self {
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self { secret, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn issue(&self, user_id: i64, now: DateTime<Utc>) -> String {
        let claims = Claims {
            uid: user_id,
            iat: now.timestamp(),
        };
        // Serializing two integers cannot fail
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.mac(payload.as_bytes()).finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// The user id of a valid, unexpired token.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Option<i64> {
        let (payload, signature) = token.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac(payload.as_bytes()).verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: Claims = serde_json::from_slice(&json).ok()?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0)?;
        if issued_at > now + Duration::minutes(5) || now - issued_at > self.max_age {
            return None;
        }
        Some(claims.uid)
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac key length is unrestricted"));
        mac.update(payload);
        mac
    }
}
