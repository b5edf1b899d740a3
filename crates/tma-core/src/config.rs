use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{errors::Error, Result};

pub const ENV_PREFIX: &str = "TMA_";

const API_ID_MAX: i64 = 999_999_999;
const API_HASH_LEN: usize = 32;
const TIMEOUT_RANGE: (i64, i64) = (1, 300);
const RETRY_COUNT_MAX: i64 = 10;
const RETRY_DELAY_RANGE: (f64, f64) = (0.1, 10.0);
const START_PARAM_MAX: usize = 512;

const DEFAULT_TIMEOUT_SECS: i64 = 30;
const DEFAULT_RETRY_COUNT: i64 = 3;
const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

/// Unvalidated configuration input.
///
/// Every source (explicit arguments, environment, YAML) produces one of these;
/// only `Config::new` turns it into a usable `Config`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigParams {
    pub api_id: Option<i64>,
    pub api_hash: Option<String>,
    pub session_string: Option<String>,
    pub session_file: Option<PathBuf>,
    pub timeout: Option<i64>,
    pub retry_count: Option<i64>,
    pub retry_delay: Option<f64>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub mini_app_url: Option<String>,
    pub start_param: Option<String>,
}

impl ConfigParams {
    /// Read `TMA_*` variables. Unset variables stay `None`; unparsable numbers
    /// are rejected here rather than silently defaulted.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_id: env_num("API_ID", "api_id")?,
            api_hash: env_str("API_HASH"),
            session_string: env_str("SESSION_STRING"),
            session_file: env_str("SESSION_FILE").map(PathBuf::from),
            timeout: env_num("TIMEOUT", "timeout")?,
            retry_count: env_num("RETRY_COUNT", "retry_count")?,
            retry_delay: env_num("RETRY_DELAY", "retry_delay")?,
            log_level: env_str("LOG_LEVEL"),
            bot_token: env_str("BOT_TOKEN"),
            mini_app_url: env_str("MINI_APP_URL"),
            start_param: env_str("START_PARAM"),
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Figment::from(Yaml::string(yaml))
            .extract()
            .map_err(|e| Error::Config(format!("invalid yaml config: {e}")))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Overlay `other` on top of `self`: every field set in `other` wins.
    ///
    /// Session sources are replaced as a pair so an override can switch from a
    /// file to an inline token without tripping the exclusivity rule.
    pub fn merge(mut self, other: ConfigParams) -> Self {
        if other.session_string.is_some() || other.session_file.is_some() {
            self.session_string = other.session_string;
            self.session_file = other.session_file;
        }
        self.api_id = other.api_id.or(self.api_id);
        self.api_hash = other.api_hash.or(self.api_hash);
        self.timeout = other.timeout.or(self.timeout);
        self.retry_count = other.retry_count.or(self.retry_count);
        self.retry_delay = other.retry_delay.or(self.retry_delay);
        self.log_level = other.log_level.or(self.log_level);
        self.bot_token = other.bot_token.or(self.bot_token);
        self.mini_app_url = other.mini_app_url.or(self.mini_app_url);
        self.start_param = other.start_param.or(self.start_param);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// `tracing` has no level above error, so CRITICAL maps onto it.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        LogLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == upper)
            .ok_or_else(|| Error::Validation {
                field: "log_level",
                value: s.to_string(),
                reason: "must be one of DEBUG, INFO, WARNING, ERROR, CRITICAL".to_string(),
            })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the Telegram client session comes from. Exactly one is configured.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionSource {
    Inline(String),
    File(PathBuf),
}

impl fmt::Debug for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionSource::Inline(s) => f
                .debug_tuple("Inline")
                .field(&redacted(s))
                .finish(),
            SessionSource::File(p) => f.debug_tuple("File").field(p).finish(),
        }
    }
}

/// Validated, immutable toolkit configuration.
///
/// Fields are private; a different configuration means building a new value
/// through `Config::new` (or one of the loaders that end there).
#[derive(Clone)]
pub struct Config {
    api_id: i32,
    api_hash: String,
    session: SessionSource,
    timeout: Duration,
    retry_count: u32,
    retry_delay: Duration,
    log_level: LogLevel,
    bot_token: Option<String>,
    mini_app_url: Option<Url>,
    start_param: Option<String>,
}

impl Config {
    pub fn new(params: ConfigParams) -> Result<Self> {
        let api_id = validate_api_id(params.api_id)?;
        let api_hash = validate_api_hash(params.api_hash)?;
        let session = validate_session(params.session_string, params.session_file)?;

        let timeout = params.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !(TIMEOUT_RANGE.0..=TIMEOUT_RANGE.1).contains(&timeout) {
            return Err(invalid(
                "timeout",
                timeout.to_string(),
                format!("must be between {} and {} seconds", TIMEOUT_RANGE.0, TIMEOUT_RANGE.1),
            ));
        }

        let retry_count = params.retry_count.unwrap_or(DEFAULT_RETRY_COUNT);
        if !(0..=RETRY_COUNT_MAX).contains(&retry_count) {
            return Err(invalid(
                "retry_count",
                retry_count.to_string(),
                format!("must be between 0 and {RETRY_COUNT_MAX}"),
            ));
        }

        let retry_delay = params.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY_SECS);
        if !(retry_delay.is_finite()
            && (RETRY_DELAY_RANGE.0..=RETRY_DELAY_RANGE.1).contains(&retry_delay))
        {
            return Err(invalid(
                "retry_delay",
                retry_delay.to_string(),
                format!(
                    "must be between {} and {} seconds",
                    RETRY_DELAY_RANGE.0, RETRY_DELAY_RANGE.1
                ),
            ));
        }

        let log_level = match params.log_level {
            Some(raw) => raw.parse()?,
            None => LogLevel::Info,
        };

        let bot_token = params.bot_token.map(validate_bot_token).transpose()?;
        let mini_app_url = params.mini_app_url.map(validate_mini_app_url).transpose()?;
        let start_param = params.start_param.map(validate_start_param).transpose()?;

        Ok(Self {
            api_id: api_id as i32,
            api_hash,
            session,
            timeout: Duration::from_secs(timeout as u64),
            retry_count: retry_count as u32,
            retry_delay: Duration::from_secs_f64(retry_delay),
            log_level,
            bot_token,
            mini_app_url,
            start_param,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ConfigParams::from_env()?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::new(ConfigParams::from_yaml_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        Self::new(ConfigParams::from_yaml_file(path)?)
    }

    /// YAML file (if any) with `TMA_*` environment variables layered on top.
    pub fn load(yaml: Option<&Path>) -> Result<Self> {
        let base = match yaml {
            Some(path) => ConfigParams::from_yaml_file(path)?,
            None => ConfigParams::default(),
        };
        Self::new(base.merge(ConfigParams::from_env()?))
    }

    pub fn api_id(&self) -> i32 {
        self.api_id
    }

    pub fn api_hash(&self) -> &str {
        &self.api_hash
    }

    pub fn session(&self) -> &SessionSource {
        &self.session
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn bot_token(&self) -> Option<&str> {
        self.bot_token.as_deref()
    }

    pub fn mini_app_url(&self) -> Option<&Url> {
        self.mini_app_url.as_ref()
    }

    pub fn start_param(&self) -> Option<&str> {
        self.start_param.as_deref()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_id", &self.api_id)
            .field("api_hash", &redacted(&self.api_hash))
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .field("log_level", &self.log_level)
            .field("bot_token", &self.bot_token.as_deref().map(redacted))
            .field("mini_app_url", &self.mini_app_url.as_ref().map(Url::as_str))
            .field("start_param", &self.start_param)
            .finish()
    }
}

fn validate_api_id(raw: Option<i64>) -> Result<i64> {
    let Some(api_id) = raw else {
        return Err(invalid("api_id", "<missing>", "is required"));
    };
    if !(1..=API_ID_MAX).contains(&api_id) {
        return Err(invalid(
            "api_id",
            api_id.to_string(),
            format!("must be between 1 and {API_ID_MAX}"),
        ));
    }
    Ok(api_id)
}

fn validate_api_hash(raw: Option<String>) -> Result<String> {
    let Some(api_hash) = raw else {
        return Err(invalid("api_hash", "<missing>", "is required"));
    };
    if api_hash.chars().count() != API_HASH_LEN {
        return Err(invalid(
            "api_hash",
            redacted(&api_hash),
            format!("must be exactly {API_HASH_LEN} characters"),
        ));
    }
    Ok(api_hash)
}

fn validate_session(inline: Option<String>, file: Option<PathBuf>) -> Result<SessionSource> {
    match (inline, file) {
        (Some(s), None) => {
            if s.trim().is_empty() {
                return Err(invalid(
                    "session_string",
                    redacted(&s),
                    "must not be empty or whitespace",
                ));
            }
            Ok(SessionSource::Inline(s))
        }
        (None, Some(p)) => {
            if p.as_os_str().to_string_lossy().trim().is_empty() {
                return Err(invalid(
                    "session_file",
                    format!("{:?}", p.display()),
                    "must not be empty or whitespace",
                ));
            }
            Ok(SessionSource::File(p))
        }
        (Some(_), Some(p)) => Err(invalid(
            "session_string",
            format!("session_file={}", p.display()),
            "set either session_string or session_file, not both",
        )),
        (None, None) => Err(invalid(
            "session_string",
            "<missing>",
            "one of session_string or session_file is required",
        )),
    }
}

fn validate_bot_token(token: String) -> Result<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[0-9]+:[A-Za-z0-9_-]+$").expect("valid regex"));
    if !re.is_match(&token) {
        return Err(invalid(
            "bot_token",
            redacted(&token),
            "must look like <bot id>:<secret>",
        ));
    }
    Ok(token)
}

fn validate_mini_app_url(raw: String) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| invalid("mini_app_url", raw.clone(), format!("not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("mini_app_url", raw, "must use http or https"));
    }
    Ok(url)
}

fn validate_start_param(param: String) -> Result<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));
    if param.len() > START_PARAM_MAX || !re.is_match(&param) {
        return Err(invalid(
            "start_param",
            param,
            format!("must be 1-{START_PARAM_MAX} characters of A-Z, a-z, 0-9, _ or -"),
        ));
    }
    Ok(param)
}

fn invalid(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Error {
    Error::Validation {
        field,
        value: value.into(),
        reason: reason.into(),
    }
}

/// Secrets are described, never echoed.
fn redacted(secret: &str) -> String {
    format!("<{} chars>", secret.chars().count())
}

fn env_str(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn env_num<T: FromStr>(key: &str, field: &'static str) -> Result<Option<T>> {
    let Some(raw) = env_str(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| invalid(field, raw.clone(), "must be a number"))
}
