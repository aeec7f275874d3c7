//! Session tokens and idle detection.
//!
//! Holds the four values the client keeps between requests: access token,
//! refresh token, CSRF token, and the time of the last request.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub const ACCESS_TOKEN_KEY: &str = "vidgen.access_token";
pub const REFRESH_TOKEN_KEY: &str = "vidgen.refresh_token";
pub const CSRF_TOKEN_KEY: &str = "vidgen.csrf_token";
pub const LAST_ACTIVITY_KEY: &str = "vidgen.last_activity";

/// Sessions untouched for this long are considered idle.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Key/value session storage with idle tracking.
#[derive(Debug)]
pub struct SessionStore {
    values: Mutex<HashMap<&'static str, String>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// A store already holding an access token, active as of now.
    pub fn with_access_token(token: impl Into<String>) -> Self {
        let store = Self::default();
        store.set_tokens(token, None);
        store
    }

    fn get(&self, key: &'static str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &'static str, value: String) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key, value);
        }
    }

    /// Store fresh tokens and mark the session active.
    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: Option<String>) {
        self.set(ACCESS_TOKEN_KEY, access_token.into());
        if let Some(refresh) = refresh_token {
            self.set(REFRESH_TOKEN_KEY, refresh);
        }
        self.touch();
    }

    pub fn set_csrf_token(&self, token: impl Into<String>) {
        self.set(CSRF_TOKEN_KEY, token.into());
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.get(CSRF_TOKEN_KEY)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.get(LAST_ACTIVITY_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    pub fn touch_at(&self, at: DateTime<Utc>) {
        self.set(LAST_ACTIVITY_KEY, at.to_rfc3339());
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle_at(Utc::now())
    }

    /// A session with tokens but no recorded activity counts as idle.
    pub fn is_idle_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity() {
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed >= self.idle_timeout)
                .unwrap_or(false),
            None => self.access_token().is_some(),
        }
    }

    /// Drop every stored value.
    pub fn clear(&self) {
        if let Ok(mut values) = self.values.lock() {
            values.clear();
        }
    }
}
