use std::{env, path::Path};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BODY_LIMIT_MB: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("PORT must be a valid number between 0 and 65535, got '{0}'")]
    Port(String),
    #[error("BODY_LIMIT_MB must be a valid integer, got '{0}'")]
    BodyLimit(String),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("model artifact {0} is missing and MODEL_URL is not set")]
    NoSource(String),
    #[error("invalid GITHUB_TOKEN format")]
    InvalidToken,
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download {url}: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime settings taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_url: Option<String>,
    pub github_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| SettingsError::Port(raw))?,
            None => DEFAULT_PORT,
        };

        let body_limit_bytes = {
            let mb = match lookup("BODY_LIMIT_MB") {
                Some(raw) => raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| SettingsError::BodyLimit(raw))?,
                None => DEFAULT_BODY_LIMIT_MB,
            };
            mb * 1024 * 1024
        };

        Ok(Settings {
            port,
            body_limit_bytes,
            model_url: lookup("MODEL_URL").filter(|v| !v.is_empty()),
            github_token: lookup("GITHUB_TOKEN").filter(|v| !v.is_empty()),
        })
    }
}

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> Result<(), DownloadError> {
    tracing::info!("Downloading {} from {}", path.display(), url);

    let mut header_map = HeaderMap::new();
    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DownloadError::InvalidToken)?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let request_error = |source: reqwest::Error| DownloadError::Request {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .map_err(request_error)?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let bytes = response.bytes().await.map_err(request_error)?;

    let write_error = |source: std::io::Error| DownloadError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(path, &bytes).await.map_err(write_error)?;

    tracing::info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Makes sure the model artifact is on disk, fetching it from `MODEL_URL`
/// when it is not.
pub async fn ensure_model_exists(
    model_path: &Path,
    settings: &Settings,
) -> Result<(), DownloadError> {
    tracing::info!("Checking model at {}", model_path.display());
    if model_path.exists() {
        return Ok(());
    }

    let url = settings
        .model_url
        .as_deref()
        .ok_or_else(|| DownloadError::NoSource(model_path.display().to_string()))?;
    download_file(url, model_path, settings.github_token.as_deref()).await
}
