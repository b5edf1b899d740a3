use std::time::Duration;

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::{errors::Error, Result};

use super::{
    canonical::data_check_string, signer::sign, InitDataError, InitDataFields, WebAppUser,
};

/// Decide whether `init_data` was signed with the key derived from `secret`.
///
/// Fails closed: empty input, a missing `hash`, or any internal failure yield
/// `false`. Comparison runs in constant time over the hex text.
pub fn verify(init_data: &str, secret: &str) -> bool {
    if init_data.is_empty() || secret.is_empty() {
        debug!("init data verification skipped: empty payload or secret");
        return false;
    }

    let fields = InitDataFields::parse(init_data);
    match signature_matches(&fields, secret) {
        Ok(true) => true,
        Ok(false) => {
            debug!("init data signature mismatch");
            false
        }
        Err(Error::InitData(InitDataError::MissingHash)) => {
            debug!("init data has no hash parameter");
            false
        }
        Err(e) => {
            warn!(error = %e, "init data verification failed");
            false
        }
    }
}

/// Result of a successful `validate`.
#[derive(Clone, Debug)]
pub struct ValidatedInitData {
    pub fields: InitDataFields,
    pub auth_date: DateTime<Utc>,
    pub user: Option<WebAppUser>,
}

/// Like `verify`, but explains rejections and checks `auth_date` freshness.
///
/// `max_age` of `None` accepts any age.
pub fn validate(init_data: &str, secret: &str, max_age: Option<Duration>) -> Result<ValidatedInitData> {
    validate_at(init_data, secret, max_age, Utc::now())
}

pub fn validate_at(
    init_data: &str,
    secret: &str,
    max_age: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<ValidatedInitData> {
    if secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    if init_data.is_empty() {
        return Err(InitDataError::Empty.into());
    }

    let fields = InitDataFields::parse(init_data);
    if !signature_matches(&fields, secret)? {
        return Err(InitDataError::SignatureMismatch.into());
    }

    let auth_date = fields.auth_date()?;
    if let Some(max_age) = max_age {
        let age_secs = (now - auth_date).num_seconds();
        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        if age_secs > max_age_secs {
            return Err(InitDataError::Expired {
                age_secs,
                max_age_secs: max_age.as_secs(),
            }
            .into());
        }
    }

    let user = fields.user()?;
    Ok(ValidatedInitData {
        fields,
        auth_date,
        user,
    })
}

fn signature_matches(fields: &InitDataFields, secret: &str) -> Result<bool> {
    let received = fields.hash().ok_or(InitDataError::MissingHash)?;
    let signed = fields.signed_fields();
    if signed.is_empty() {
        debug!("init data carries a hash but no signed fields");
        return Ok(false);
    }
    let expected = sign(&data_check_string(signed), secret)?;
    Ok(bool::from(received.as_bytes().ct_eq(expected.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_data::{sign, sign_fields};

    const SECRET: &str = "123456789:ABCdefGHIjklMNOpqrsTUVwxyz";

    fn signed(auth_date: &str) -> String {
        sign_fields(
            &[
                ("user", r#"{"id":123,"first_name":"Ann"}"#),
                ("auth_date", auth_date),
                ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
            ],
            SECRET,
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_payload() {
        assert!(verify(&signed("1698000000"), SECRET));
    }

    #[test]
    fn fails_closed_on_empty_or_unsigned_input() {
        assert!(!verify("", SECRET));
        assert!(!verify(&signed("1698000000"), ""));
        assert!(!verify("auth_date=1698000000&user=%7B%7D", SECRET));
        assert!(!verify("&&&===%%%", SECRET));
        assert!(!verify("hash=", SECRET));
    }

    #[test]
    fn rejects_uppercase_hash() {
        let query = signed("1698000000");
        let (body, hash) = query.rsplit_once("hash=").unwrap();
        let upper = format!("{body}hash={}", hash.to_uppercase());
        assert!(!verify(&upper, SECRET));
    }

    #[test]
    fn duplicate_keys_use_first_value() {
        let query = signed("1698000000");
        // A trailing duplicate does not change what was signed.
        assert!(verify(&format!("{query}&auth_date=1"), SECRET));
        // A leading duplicate does.
        assert!(!verify(&format!("auth_date=1&{query}"), SECRET));
    }

    #[test]
    fn field_order_on_the_wire_is_irrelevant() {
        let query = signed("1698000000");
        let fields = InitDataFields::parse(&query);
        let mut pairs: Vec<(&str, &str)> = fields.iter().collect();
        pairs.reverse();
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            ser.append_pair(k, v);
        }
        assert!(verify(&ser.finish(), SECRET));
    }

    #[test]
    fn validate_reports_reasons() {
        let now = DateTime::<Utc>::from_timestamp(1_698_000_600, 0).unwrap();

        let ok = validate_at(&signed("1698000000"), SECRET, None, now).unwrap();
        assert_eq!(ok.user.unwrap().id, 123);
        assert_eq!(ok.auth_date.timestamp(), 1_698_000_000);

        let err = validate_at(
            &signed("1698000000"),
            SECRET,
            Some(Duration::from_secs(60)),
            now,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InitData(InitDataError::Expired { age_secs: 600, max_age_secs: 60 })
        ));

        let err = validate_at(&signed("1698000000"), "other-secret", None, now).unwrap_err();
        assert!(matches!(err, Error::InitData(InitDataError::SignatureMismatch)));

        let err = validate_at("auth_date=1", SECRET, None, now).unwrap_err();
        assert!(matches!(err, Error::InitData(InitDataError::MissingHash)));

        let err = validate_at(&signed("soon"), SECRET, None, now).unwrap_err();
        assert!(matches!(err, Error::InitData(InitDataError::InvalidAuthDate(_))));

        assert!(matches!(
            validate_at("auth_date=1", "", None, now),
            Err(Error::EmptySecret)
        ));
    }

    #[test]
    fn hash_without_signed_fields_is_rejected() {
        let query = format!("hash={}", sign("", SECRET).unwrap());
        assert!(!verify(&query, SECRET));
        assert!(validate(&query, SECRET, None).is_err());
    }

    #[test]
    fn unbounded_max_age_does_not_expire_fresh_payloads() {
        let now = DateTime::<Utc>::from_timestamp(1_698_000_000, 0).unwrap();
        let res = validate_at(
            &signed("1698000000"),
            SECRET,
            Some(Duration::from_secs(u64::MAX)),
            now,
        );
        assert!(res.is_ok(), "{res:?}");
    }

    #[test]
    fn validate_accepts_within_max_age() {
        let now = DateTime::<Utc>::from_timestamp(1_698_000_030, 0).unwrap();
        let res = validate_at(
            &signed("1698000000"),
            SECRET,
            Some(Duration::from_secs(86_400)),
            now,
        );
        assert!(res.is_ok());
    }
}
