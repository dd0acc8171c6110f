//! Plan Choque backend client: shared between the dashboards and the CLI.
//!
//! Single source of truth for the backend wire contract: auth, reference
//! lists, KPI datasets, implementation submit.
//!
//! No retries. No UI concepts.

mod auth;
mod client;
mod credentials;
mod error;

pub use auth::{
    auth_file_path, delete_auth, delete_auth_at, load_auth, load_auth_from, save_auth, save_auth_to,
    StoreError, StoredCredentials,
};
pub use client::{ApiClient, DEFAULT_TIMEOUT, USER_AGENT};
pub use credentials::{
    ChainedCredentials, CredentialProvider, EnvCredentials, FileCredentials, StaticToken, TOKEN_ENV,
};
pub use error::ApiError;
