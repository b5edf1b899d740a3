use chrono::{DateTime, Utc};

use crate::Result;

use super::{signer::sign_fields, WebAppUser, AUTH_DATE_KEY, USER_KEY};

/// Builder for synthetic, correctly signed initData.
///
/// Lets tests of API clients and auth flows run without a live Telegram
/// session. `auth_date` defaults to the time `generate` is called.
#[derive(Clone, Debug)]
pub struct InitDataFixture {
    pub user: WebAppUser,
    pub auth_date: Option<DateTime<Utc>>,
    pub query_id: Option<String>,
    pub start_param: Option<String>,
    pub chat_instance: Option<String>,
    pub chat_type: Option<String>,
}

impl InitDataFixture {
    pub fn new(user_id: i64, first_name: impl Into<String>) -> Self {
        Self::from_user(WebAppUser {
            id: user_id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            language_code: Some("en".to_string()),
            is_premium: false,
            allows_write_to_pm: Some(true),
            photo_url: None,
        })
    }

    pub fn from_user(user: WebAppUser) -> Self {
        Self {
            user,
            auth_date: None,
            query_id: None,
            start_param: None,
            chat_instance: None,
            chat_type: None,
        }
    }

    pub fn last_name(mut self, last_name: impl Into<String>) -> Self {
        self.user.last_name = Some(last_name.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.user.username = Some(username.into());
        self
    }

    pub fn language_code(mut self, code: impl Into<String>) -> Self {
        self.user.language_code = Some(code.into());
        self
    }

    pub fn premium(mut self, is_premium: bool) -> Self {
        self.user.is_premium = is_premium;
        self
    }

    pub fn auth_date(mut self, at: DateTime<Utc>) -> Self {
        self.auth_date = Some(at);
        self
    }

    pub fn query_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    pub fn start_param(mut self, param: impl Into<String>) -> Self {
        self.start_param = Some(param.into());
        self
    }

    pub fn chat(mut self, chat_instance: impl Into<String>, chat_type: impl Into<String>) -> Self {
        self.chat_instance = Some(chat_instance.into());
        self.chat_type = Some(chat_type.into());
        self
    }

    /// Unsigned fields in wire order, with `auth_date` taken from `now` unless set.
    pub fn fields(&self, now: DateTime<Utc>) -> Result<Vec<(&'static str, String)>> {
        let mut out = Vec::with_capacity(6);
        if let Some(q) = &self.query_id {
            out.push(("query_id", q.clone()));
        }
        out.push((USER_KEY, serde_json::to_string(&self.user)?));
        if let Some(ci) = &self.chat_instance {
            out.push(("chat_instance", ci.clone()));
        }
        if let Some(ct) = &self.chat_type {
            out.push(("chat_type", ct.clone()));
        }
        if let Some(sp) = &self.start_param {
            out.push(("start_param", sp.clone()));
        }
        let auth_date = self.auth_date.unwrap_or(now);
        out.push((AUTH_DATE_KEY, auth_date.timestamp().to_string()));
        Ok(out)
    }

    pub fn generate(&self, secret: &str) -> Result<String> {
        self.generate_at(secret, Utc::now())
    }

    pub fn generate_at(&self, secret: &str, now: DateTime<Utc>) -> Result<String> {
        let fields = self.fields(now)?;
        sign_fields(&fields, secret)
    }
}
