use std::collections::HashSet;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{errors::Error, Result};

use super::{canonical::data_check_string, HASH_KEY};

type HmacSha256 = Hmac<Sha256>;

/// Fixed HMAC key Telegram uses to derive the WebApp signing key from a bot token.
pub const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// `HMAC-SHA256(key = "WebAppData", msg = secret)`.
pub fn derive_secret_key(secret: &str) -> Result<[u8; 32]> {
    if secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    hmac_sha256(WEB_APP_DATA_KEY, secret.as_bytes())
}

/// Sign a data-check-string with the key derived from `secret`.
///
/// Returns 64 lowercase hex characters. Only emptiness of `secret` is checked;
/// token format is the config layer's concern.
pub fn sign(check_string: &str, secret: &str) -> Result<String> {
    let key = derive_secret_key(secret)?;
    let digest = hmac_sha256(&key, check_string.as_bytes())?;
    Ok(hex::encode(digest))
}

/// Sign `fields` and render them as a query string with `hash` appended.
///
/// Pairs keep the given order in the output; any `hash` pair passed in is
/// dropped and replaced by the computed one. A repeated key keeps its first
/// value, matching what `verify` reads back.
pub fn sign_fields<K, V>(fields: &[(K, V)], secret: &str) -> Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut seen = HashSet::new();
    let signed: Vec<(&str, &str)> = fields
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .filter(|(k, _)| *k != HASH_KEY && seen.insert(*k))
        .collect();

    let hash = sign(&data_check_string(signed.iter().copied()), secret)?;

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in signed {
        query.append_pair(k, v);
    }
    query.append_pair(HASH_KEY, &hash);
    Ok(query.finish())
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::External(format!("hmac key error: {e}")))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "123456789:ABCdefGHIjklMNOpqrsTUVwxyz";

    #[test]
    fn signature_is_lowercase_hex_of_fixed_length() {
        let sig = sign("auth_date=1698000000", SECRET).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn matches_reference_signature() {
        // Computed independently with Python's hmac/hashlib.
        let sig = sign("auth_date=1698000000\nuser={\"id\":123}", SECRET).unwrap();
        assert_eq!(
            sig,
            "b9c194774d6ad2c0c033eaba001c441127ccfbd38c39991b00d8cddce51b2cdf"
        );
    }

    #[test]
    fn repeated_keys_keep_first_value() {
        let query = sign_fields(&[("a", "1"), ("a", "2"), ("b", "3")], SECRET).unwrap();
        assert!(query.starts_with("a=1&b=3&hash="), "{query}");
        assert!(crate::init_data::verify(&query, SECRET));
    }

    #[test]
    fn signing_is_deterministic() {
        let a = sign("auth_date=1\nuser={}", SECRET).unwrap();
        let b = sign("auth_date=1\nuser={}", SECRET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_give_different_signatures() {
        let a = sign("auth_date=1", SECRET).unwrap();
        let b = sign("auth_date=1", "987654321:XYZabcDEFghiJKLmnoPQRstuVWX").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derived_key_is_not_the_raw_secret_hmac() {
        // Signing with the raw token as key must differ from the two-step scheme.
        let raw = hmac_sha256(SECRET.as_bytes(), b"auth_date=1").unwrap();
        assert_ne!(hex::encode(raw), sign("auth_date=1", SECRET).unwrap());
    }

    #[test]
    fn empty_secret_is_an_error() {
        assert!(matches!(sign("auth_date=1", ""), Err(Error::EmptySecret)));
        assert!(matches!(derive_secret_key(""), Err(Error::EmptySecret)));
    }

    #[test]
    fn sign_fields_appends_hash_and_replaces_stale_one() {
        let query = sign_fields(
            &[("auth_date", "1698000000"), ("hash", "stale")],
            SECRET,
        )
        .unwrap();
        assert!(query.starts_with("auth_date=1698000000&hash="));
        assert!(!query.contains("stale"));

        let expected = sign("auth_date=1698000000", SECRET).unwrap();
        assert!(query.ends_with(&expected));
    }
}
