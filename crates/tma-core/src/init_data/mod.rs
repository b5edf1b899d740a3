//! Telegram WebApp initData: canonicalization, signing, verification, and
//! synthetic payloads for tests.
//!
//! initData is a URL-encoded query string. Every key except `hash` is signed;
//! `hash` carries the hex HMAC-SHA256 of the data-check-string under a key
//! derived from the bot token.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod canonical;
pub mod fixture;
pub mod signer;
pub mod verifier;

pub use canonical::data_check_string;
pub use fixture::InitDataFixture;
pub use signer::{derive_secret_key, sign, sign_fields};
pub use verifier::{validate, validate_at, verify, ValidatedInitData};

pub const HASH_KEY: &str = "hash";
pub const AUTH_DATE_KEY: &str = "auth_date";
pub const USER_KEY: &str = "user";

/// Why `validate` refused a payload. `verify` collapses all of these to `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitDataError {
    #[error("init data is empty")]
    Empty,

    #[error("missing hash parameter")]
    MissingHash,

    #[error("hash does not match signed fields")]
    SignatureMismatch,

    #[error("missing auth_date parameter")]
    MissingAuthDate,

    #[error("invalid auth_date: {0}")]
    InvalidAuthDate(String),

    #[error("init data expired: {age_secs}s old, limit {max_age_secs}s")]
    Expired { age_secs: i64, max_age_secs: u64 },

    #[error("invalid user object: {0}")]
    InvalidUser(String),
}

/// The `user` object embedded in initData.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_write_to_pm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl From<&crate::domain::UserInfo> for WebAppUser {
    fn from(u: &crate::domain::UserInfo) -> Self {
        Self {
            id: u.id.0,
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            username: u.username.clone(),
            language_code: u.language_code.clone(),
            is_premium: u.is_premium,
            allows_write_to_pm: Some(true),
            photo_url: None,
        }
    }
}

/// Decoded key/value pairs of an initData query string, in wire order.
///
/// Keys may repeat on the wire; lookups use the first occurrence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InitDataFields {
    pairs: Vec<(String, String)>,
}

impl InitDataFields {
    /// Decode a URL-encoded query string. Never fails: malformed escapes are
    /// kept as-is and pairs without `=` get an empty value.
    pub fn parse(query: &str) -> Self {
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn hash(&self) -> Option<&str> {
        self.get(HASH_KEY)
    }

    /// Every key except `hash`, first value per key.
    pub fn signed_fields(&self) -> BTreeMap<&str, &str> {
        let mut out = BTreeMap::new();
        for (k, v) in self.iter().filter(|(k, _)| *k != HASH_KEY) {
            out.entry(k).or_insert(v);
        }
        out
    }

    pub fn auth_date(&self) -> Result<DateTime<Utc>, InitDataError> {
        let raw = self.get(AUTH_DATE_KEY).ok_or(InitDataError::MissingAuthDate)?;
        let secs = raw
            .parse::<i64>()
            .map_err(|_| InitDataError::InvalidAuthDate(raw.to_string()))?;
        DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| InitDataError::InvalidAuthDate(raw.to_string()))
    }

    /// The decoded `user` object, if the payload carries one.
    pub fn user(&self) -> Result<Option<WebAppUser>, InitDataError> {
        let Some(raw) = self.get(USER_KEY) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| InitDataError::InvalidUser(e.to_string()))
    }
}
