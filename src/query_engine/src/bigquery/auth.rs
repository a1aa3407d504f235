use std::{fmt, sync::Arc};

use gcp_auth::TokenProvider;
use secrecy::SecretString;
use snafu::ResultExt;

use crate::errors::{AuthSnafu, ClientInitError, CredentialsSnafu, EngineError};

/// OAuth scope for BigQuery read/write access.
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// How requests are authenticated.
#[derive(Clone, Default)]
pub enum Auth {
    /// No `Authorization` header. Only useful against local emulators.
    #[default]
    None,
    /// A fixed bearer token, e.g. minted by `gcloud auth print-access-token`.
    Static(SecretString),
    /// Application-default credentials, refreshed by `gcp_auth` as needed.
    Gcp(Arc<dyn TokenProvider>),
}

impl Auth {
    /// Discovers application-default credentials (metadata server, service
    /// account key file, or gcloud user credentials).
    pub async fn application_default() -> Result<Self, ClientInitError> {
        let provider = gcp_auth::provider().await.context(CredentialsSnafu)?;
        Ok(Auth::Gcp(provider))
    }

    /// The bearer token to attach to the next request, if any.
    pub(crate) async fn bearer(&self) -> Result<Option<SecretString>, EngineError> {
        match self {
            Auth::None => Ok(None),
            Auth::Static(token) => Ok(Some(token.clone())),
            Auth::Gcp(provider) => {
                let token = provider.token(&[BIGQUERY_SCOPE]).await.map_err(|e| {
                    AuthSnafu {
                        message: e.to_string(),
                    }
                    .build()
                })?;
                Ok(Some(SecretString::new(token.as_str().into())))
            }
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("Auth::None"),
            Auth::Static(_) => f.write_str("Auth::Static(<redacted>)"),
            Auth::Gcp(_) => f.write_str("Auth::Gcp(<TokenProvider>)"),
        }
    }
}
