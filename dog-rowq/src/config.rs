use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{retry::RetryPolicy, QueueError, QueueResult};

/// Environment variable holding the remote endpoint
pub const REMOTE_URL_VAR: &str = "TURSO_URL";
/// Environment variable holding the optional remote auth token
pub const REMOTE_AUTH_TOKEN_VAR: &str = "TURSO_AUTH_TOKEN";
/// Environment variable holding the optional remote encryption key
pub const REMOTE_ENCRYPTION_KEY_VAR: &str = "TURSO_REMOTE_ENCRYPTION_KEY";

/// Directory local queue files live in, relative to the working directory
pub const DEFAULT_LOCAL_DIR: &str = ".db";

/// Claim, retry and dead-letter settings for a queue handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Delay before a nacked job becomes eligible again
    pub retry_backoff: Duration,
    /// Upper bound of the random delay added to every backoff
    pub retry_jitter: Duration,
    /// Jobs nacked more often than this are dead-lettered
    pub max_retries: u32,
    /// How long a claim holds a job before any consumer may take it
    pub lease_duration: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(5),
            retry_jitter: Duration::from_secs(2),
            max_retries: 1000,
            lease_duration: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry backoff
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the jitter ceiling added to each backoff
    pub fn with_retry_jitter(mut self, jitter: Duration) -> Self {
        self.retry_jitter = jitter;
        self
    }

    /// Set the dead-letter threshold
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the lease duration (also the reclaim sweep interval)
    pub fn with_lease_duration(mut self, lease: Duration) -> Self {
        self.lease_duration = lease;
        self
    }

    /// Retry policy derived from this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_backoff, self.retry_jitter, self.max_retries)
    }
}

/// Addressing for an embedded queue file: `<dir>/<name>.db`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub dir: PathBuf,
    pub name: String,
}

impl LocalConfig {
    /// Queue file `name` under the default `.db` directory
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            name: name.into(),
        }
    }

    /// Place the queue file under a different directory
    pub fn with_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = dir.as_ref().to_path_buf();
        self
    }

    /// Full path of the queue file
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(format!("{}.db", self.name))
    }

    pub(crate) fn validate(&self) -> QueueResult<()> {
        if self.name.trim().is_empty() {
            return Err(QueueError::configuration("local queue name must not be empty"));
        }
        if self.name.contains(['/', '\\']) {
            return Err(QueueError::configuration(format!(
                "local queue name {:?} must not contain path separators",
                self.name
            )));
        }
        Ok(())
    }
}

/// Addressing for a networked libSQL replica
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub encryption_key: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            encryption_key: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Resolve from `TURSO_URL`, `TURSO_AUTH_TOKEN` and
    /// `TURSO_REMOTE_ENCRYPTION_KEY`
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> QueueResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let url = non_empty(REMOTE_URL_VAR).ok_or_else(|| {
            QueueError::configuration(format!("{} environment variable not set", REMOTE_URL_VAR))
        })?;

        Ok(Self {
            url,
            auth_token: non_empty(REMOTE_AUTH_TOKEN_VAR),
            encryption_key: non_empty(REMOTE_ENCRYPTION_KEY_VAR),
        })
    }

    /// Endpoint address with no credentials attached
    pub fn location(&self) -> &str {
        &self.url
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
