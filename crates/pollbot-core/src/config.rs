use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Upper bound for `POLL_TIMEOUT_SECS`; longer long-polls are refused.
pub const MAX_POLL_TIMEOUT_SECS: u64 = 3600;

/// Slack added on top of the long-poll window for the default HTTP timeout.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Exponential backoff applied after consecutive transport failures.
///
/// Disabled by default: the polling loop retries immediately unless this is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl RetryBackoff {
    /// Delay before the next attempt after `failures` consecutive failures (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.initial
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// Typed configuration for the bot engine and its HTTP adapter.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub api_base_url: String,

    // Polling
    pub poll_timeout: Duration,
    pub poll_limit: u32,
    pub http_timeout: Duration,
    pub retry_backoff: Option<RetryBackoff>,

    // Outgoing message defaults
    pub parse_mode: Option<String>,
    pub disable_web_page_preview: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (env, map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let api_base_url = get("TELEGRAM_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_timeout_secs = parse_u64(&get, "POLL_TIMEOUT_SECS")?.unwrap_or(3);
        if poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "POLL_TIMEOUT_SECS must be at most {MAX_POLL_TIMEOUT_SECS}, got {poll_timeout_secs}"
            )));
        }
        let poll_timeout = Duration::from_secs(poll_timeout_secs);
        let poll_limit = parse_u64(&get, "POLL_LIMIT")?.unwrap_or(10).clamp(1, 100) as u32;

        // Must outlive the long-poll window, otherwise every idle poll times out.
        let http_timeout = match parse_u64(&get, "HTTP_TIMEOUT_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => poll_timeout.checked_add(HTTP_TIMEOUT_SLACK).ok_or_else(|| {
                Error::Config("POLL_TIMEOUT_SECS is too large to derive HTTP_TIMEOUT_SECS".into())
            })?,
        };
        if http_timeout <= poll_timeout {
            return Err(Error::Config(format!(
                "HTTP_TIMEOUT_SECS ({}s) must be greater than POLL_TIMEOUT_SECS ({}s)",
                http_timeout.as_secs(),
                poll_timeout.as_secs()
            )));
        }

        let backoff_ms = parse_u64(&get, "POLL_RETRY_BACKOFF_MS")?.unwrap_or(0);
        let backoff_max_ms = parse_u64(&get, "POLL_RETRY_BACKOFF_MAX_MS")?.unwrap_or(30_000);
        let retry_backoff = (backoff_ms > 0).then(|| RetryBackoff {
            initial: Duration::from_millis(backoff_ms),
            max: Duration::from_millis(backoff_max_ms.max(backoff_ms)),
        });

        // An explicitly empty PARSE_MODE means plain text.
        let parse_mode = match get("PARSE_MODE") {
            Some(v) => non_empty(v),
            None => Some("HTML".to_string()),
        };
        let disable_web_page_preview = get("DISABLE_WEB_PAGE_PREVIEW")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        Ok(Self {
            telegram_bot_token,
            api_base_url,
            poll_timeout,
            poll_limit,
            http_timeout,
            retry_backoff,
            parse_mode,
            disable_web_page_preview,
        })
    }

    /// Defaults for everything but the token.
    pub fn with_token(token: impl Into<String>) -> Self {
        let poll_timeout = Duration::from_secs(3);
        Self {
            telegram_bot_token: token.into(),
            api_base_url: DEFAULT_API_URL.to_string(),
            poll_timeout,
            poll_limit: 10,
            http_timeout: poll_timeout + HTTP_TIMEOUT_SLACK,
            retry_backoff: None,
            parse_mode: Some("HTML".to_string()),
            disable_web_page_preview: true,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
