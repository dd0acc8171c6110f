//! Where the bearer token comes from.
//!
//! The client asks its provider for a token on every request, so a login
//! or logout in another process is picked up without rebuilding the client.

use std::path::PathBuf;

use crate::auth::{auth_file_path, load_auth_from};

/// Environment variable read by [`EnvCredentials::default`].
pub const TOKEN_ENV: &str = "PCHOQUE_TOKEN";

pub trait CredentialProvider: Send + Sync {
    /// Current token, or None when the user is not logged in.
    fn token(&self) -> Option<String>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// A fixed token, for tests and `--token`.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// The saved auth file.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: Option<PathBuf>,
}

impl FileCredentials {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }
}

impl Default for FileCredentials {
    fn default() -> Self {
        Self { path: auth_file_path() }
    }
}

impl CredentialProvider for FileCredentials {
    fn token(&self) -> Option<String> {
        load_auth_from(self.path.as_deref()?).map(|c| c.token)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// A token from the environment.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(TOKEN_ENV)
    }
}

impl CredentialProvider for EnvCredentials {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok().map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// First provider that yields a token wins.
#[derive(Default)]
pub struct ChainedCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Environment first, then the auth file.
    pub fn standard() -> Self {
        Self::new().with(EnvCredentials::default()).with(FileCredentials::default())
    }
}

impl CredentialProvider for ChainedCredentials {
    fn token(&self) -> Option<String> {
        self.providers.iter().find_map(|p| {
            let token = p.token()?;
            tracing::trace!(provider = p.name(), "token resolved");
            Some(token)
        })
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
