//! Session configuration.

use std::fmt;
use std::time::Duration;

use siyuan_core::DEFAULT_BASE_URL;

/// Where the kernel lives and how to authenticate against it.
///
/// `timeout` bounds each request end to end; `None` leaves it to the
/// transport's defaults.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub url: String,
    pub token: String,
    pub timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(url: &str, token: &str) -> Self {
        Self {
            url: url.to_string(),
            token: token.to_string(),
            timeout: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, "")
    }
}

// Hand-written so the token never ends up in logs.
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("timeout", &self.timeout)
            .finish()
    }
}
