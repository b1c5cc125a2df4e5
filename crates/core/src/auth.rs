//! Credentials for the managed-cloud deployment.
//!
//! Access tokens expire, so nothing here hands out a token once and keeps
//! it. Callers hold a [`TokenProvider`] and ask it again for every
//! connection or request.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use google_cloud_auth::credentials::{Builder, CacheableResource, Credentials};
use http::{Extensions, header::AUTHORIZATION};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// A source of OAuth access tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token that is valid now. May refresh behind the scenes.
    async fn access_token(&self) -> Result<String>;
}

/// A token pinned at startup through the environment.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Application default credentials. The auth library caches the token and
/// refreshes it before it expires.
pub struct DefaultCredentials {
    credentials: Credentials,
}

impl DefaultCredentials {
    pub fn new() -> Result<Self> {
        let credentials = Builder::default()
            .with_scopes([CLOUD_PLATFORM_SCOPE])
            .build()
            .context("Failed to load Google application default credentials")?;
        Ok(Self { credentials })
    }
}

#[async_trait]
impl TokenProvider for DefaultCredentials {
    async fn access_token(&self) -> Result<String> {
        let headers = match self.credentials.headers(Extensions::new()).await? {
            CacheableResource::New { data, .. } => data,
            CacheableResource::NotModified => bail!("Credentials returned no headers"),
        };
        bearer_token(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
    }
}

fn bearer_token(authorization: Option<&str>) -> Result<String> {
    authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Credentials did not produce a bearer token"))
}

/// The project named by the credentials file that application default
/// credentials would load, if any.
pub fn default_credentials_project() -> Option<String> {
    project_from_credentials_file(&default_credentials_path()?)
}

fn default_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        return Some(PathBuf::from(path));
    }
    let config_dir = if cfg!(windows) {
        PathBuf::from(std::env::var("APPDATA").ok()?)
    } else {
        PathBuf::from(std::env::var("HOME").ok()?).join(".config")
    };
    Some(config_dir.join("gcloud").join("application_default_credentials.json"))
}

/// Service account keys carry `project_id`; user credentials from
/// `gcloud auth application-default login` carry `quota_project_id`.
pub fn project_from_credentials_file(path: &Path) -> Option<String> {
    #[derive(Deserialize)]
    struct CredentialsFile {
        project_id: Option<String>,
        quota_project_id: Option<String>,
    }

    let raw = std::fs::read_to_string(path).ok()?;
    let file: CredentialsFile = serde_json::from_str(&raw).ok()?;
    file.project_id
        .or(file.quota_project_id)
        .filter(|project| !project.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials_file(label: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "aerodesk-adc-{label}-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let provider = StaticToken::new("ya29.pinned");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.pinned");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.pinned");
    }

    #[test]
    fn test_bearer_token_is_extracted_from_header() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(None).is_err());
    }

    #[test]
    fn test_project_from_service_account_key() {
        let path = credentials_file(
            "sa",
            r#"{"type":"service_account","project_id":"airline-prod","quota_project_id":"billing"}"#,
        );
        assert_eq!(
            project_from_credentials_file(&path).as_deref(),
            Some("airline-prod")
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_project_from_user_credentials() {
        let path = credentials_file(
            "user",
            r#"{"type":"authorized_user","quota_project_id":"airline-dev"}"#,
        );
        assert_eq!(
            project_from_credentials_file(&path).as_deref(),
            Some("airline-dev")
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_no_project_when_file_is_missing_or_silent() {
        let path = credentials_file("none", r#"{"type":"authorized_user"}"#);
        assert_eq!(project_from_credentials_file(&path), None);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(project_from_credentials_file(&path), None);
    }
}
