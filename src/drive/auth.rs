use std::path::PathBuf;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use google_drive3 as drive3;
use google_sheets4::Sheets;

use drive3::{hyper, hyper_rustls, oauth2, DriveHub};

use super::hub::Connector;
use crate::config::CredentialsConfig;

/// URL-safe base64 of a service-account key JSON. When set, it wins over the
/// interactive flow.
pub const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_KEY";

pub type Authenticator = oauth2::authenticator::Authenticator<Connector>;

/// Authenticated API hubs sharing one HTTPS client and one token source.
pub struct Hubs {
    pub drive: DriveHub<Connector>,
    pub sheets: Sheets<Connector>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("GOOGLE_SERVICE_ACCOUNT_KEY is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("GOOGLE_SERVICE_ACCOUNT_KEY is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("failed to parse service account key: {0}")]
    ServiceAccountKey(std::io::Error),

    #[error("failed to read client secret {path:?}: {source}")]
    ClientSecret {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to prepare token cache: {0}")]
    TokenCache(std::io::Error),

    #[error("failed to create authenticator: {0}")]
    Build(std::io::Error),
}

pub async fn authenticate(config: &CredentialsConfig) -> Result<Authenticator, AuthError> {
    match std::env::var(SERVICE_ACCOUNT_ENV) {
        Ok(encoded) => {
            tracing::info!("authenticating with service account from {}", SERVICE_ACCOUNT_ENV);
            service_account(&encoded).await
        }
        Err(_) => installed_flow(config).await,
    }
}

async fn service_account(encoded: &str) -> Result<Authenticator, AuthError> {
    let key_json = String::from_utf8(URL_SAFE.decode(encoded.trim().as_bytes())?)?;
    let key =
        oauth2::parse_service_account_key(&key_json).map_err(AuthError::ServiceAccountKey)?;

    oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(AuthError::Build)
}

/// OAuth installed-application flow. The first run opens the consent page and
/// waits on the local redirect port; later runs reuse or refresh the cached token.
async fn installed_flow(config: &CredentialsConfig) -> Result<Authenticator, AuthError> {
    let secret = oauth2::read_application_secret(&config.client_secret)
        .await
        .map_err(|source| AuthError::ClientSecret {
            path: config.client_secret.clone(),
            source,
        })?;

    if let Some(parent) = config.token_cache.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(AuthError::TokenCache)?;
        }
    }

    if !config.token_cache.exists() {
        tracing::info!("no cached token found, starting new OAuth flow");
    }

    oauth2::InstalledFlowAuthenticator::builder(
        secret,
        oauth2::InstalledFlowReturnMethod::HTTPPortRedirect(config.redirect_port),
    )
    .persist_tokens_to_disk(config.token_cache.clone())
    .build()
    .await
    .map_err(AuthError::Build)
}

pub async fn connect(config: &CredentialsConfig) -> Result<Hubs, AuthError> {
    let auth = authenticate(config).await?;

    let client = hyper::Client::builder().build(
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(AuthError::Build)?
            .https_or_http()
            .enable_http1()
            .build(),
    );

    Ok(Hubs {
        drive: DriveHub::new(client.clone(), auth.clone()),
        sheets: Sheets::new(client, auth),
    })
}
