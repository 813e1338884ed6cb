//! Bearer token lookup injected into upload sessions.

use crate::config::Config;

/// Synchronous credential accessor.
///
/// Returning `None` means the caller is not authenticated; the session then
/// fails with [`crate::Error::Auth`] before any request is made.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, typically read from the command line or environment.
#[derive(Clone, Debug)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }
}

impl From<&Config> for StaticToken {
    fn from(config: &Config) -> Self {
        Self(config.token.clone())
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone().filter(|t| !t.is_empty())
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}
