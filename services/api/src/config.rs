use aerodesk_core::auth::{
    DefaultCredentials, StaticToken, TokenProvider, default_credentials_project,
};
use anyhow::bail;
use gemini_realtime::Endpoint;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where both models are hosted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelBackend {
    /// Managed cloud. Without a pinned `access_token`, tokens come from
    /// application default credentials and are refreshed as they expire.
    VertexAi {
        project: String,
        location: String,
        access_token: Option<String>,
    },
    ApiKey { api_key: String },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Hosting mode shared by the live and chat models.
    pub backend: ModelBackend,
    pub live_model: String,
    pub chat_model: String,
    pub voice_name: String,
    pub rag_corpus: Option<String>,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub frontend_build_dir: PathBuf,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str, mode: &str) -> Result<String, ConfigError> {
    optional(name)
        .ok_or_else(|| ConfigError::MissingVar(format!("{name} must be set in {mode} mode")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{raw}' is not a boolean"),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:8000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let use_vertex = parse_flag("VERTEXAI", &var_or("VERTEXAI", "true"))?;
        let backend = if use_vertex {
            let project = optional("GOOGLE_CLOUD_PROJECT")
                .or_else(default_credentials_project)
                .ok_or_else(|| {
                    ConfigError::MissingVar(
                        "GOOGLE_CLOUD_PROJECT must be set in Vertex AI mode when the credentials do not name a project".to_string(),
                    )
                })?;
            ModelBackend::VertexAi {
                project,
                location: var_or("GOOGLE_CLOUD_LOCATION", "us-central1"),
                access_token: optional("GOOGLE_ACCESS_TOKEN"),
            }
        } else {
            ModelBackend::ApiKey {
                api_key: required("GOOGLE_API_KEY", "API key")?,
            }
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            backend,
            live_model: var_or("LIVE_MODEL", "gemini-live-2.5-flash-preview-native-audio"),
            chat_model: var_or("CHAT_MODEL", "gemini-2.5-flash"),
            voice_name: var_or("VOICE_NAME", "Kore"),
            rag_corpus: std::env::var("RAG_CORPUS").ok().filter(|v| !v.is_empty()),
            log_level,
            prompts_path: PathBuf::from(var_or("PROMPTS_PATH", "./prompts")),
            frontend_build_dir: PathBuf::from(var_or("FRONTEND_BUILD_DIR", "./frontend/build")),
        })
    }

    /// Token source for Vertex AI mode; `None` in API-key mode.
    pub fn token_provider(&self) -> anyhow::Result<Option<Arc<dyn TokenProvider>>> {
        Ok(match &self.backend {
            ModelBackend::VertexAi {
                access_token: Some(token),
                ..
            } => Some(Arc::new(StaticToken::new(token.clone()))),
            ModelBackend::VertexAi {
                access_token: None,
                ..
            } => Some(Arc::new(DefaultCredentials::new()?)),
            ModelBackend::ApiKey { .. } => None,
        })
    }

    /// The live model endpoint, authenticated through `tokens` in Vertex AI mode.
    pub fn live_endpoint(
        &self,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> anyhow::Result<Endpoint> {
        match (&self.backend, tokens) {
            (
                ModelBackend::VertexAi {
                    project, location, ..
                },
                Some(tokens),
            ) => Ok(Endpoint::VertexAi {
                project: project.clone(),
                location: location.clone(),
                tokens,
            }),
            (ModelBackend::VertexAi { .. }, None) => {
                bail!("Vertex AI mode needs a token provider")
            }
            (ModelBackend::ApiKey { api_key }, _) => Ok(Endpoint::ApiKey {
                api_key: api_key.clone(),
            }),
        }
    }

    pub fn is_vertex_ai(&self) -> bool {
        matches!(self.backend, ModelBackend::VertexAi { .. })
    }

    /// Base URL of the OpenAI-compatible chat API for the configured mode.
    pub fn chat_api_base(&self) -> String {
        match &self.backend {
            ModelBackend::VertexAi {
                project, location, ..
            } => format!(
                "https://{location}-aiplatform.googleapis.com/v1beta1/projects/{project}/locations/{location}/endpoints/openapi"
            ),
            ModelBackend::ApiKey { .. } => {
                "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
            }
        }
    }

    /// Fixed chat API key. Vertex AI mode sends a fresh token per request instead.
    pub fn chat_api_key(&self) -> Option<&str> {
        match &self.backend {
            ModelBackend::VertexAi { .. } => None,
            ModelBackend::ApiKey { api_key } => Some(api_key),
        }
    }

    /// Model id as the chat API expects it. Vertex needs the publisher prefix.
    pub fn chat_model_id(&self) -> String {
        match &self.backend {
            ModelBackend::VertexAi { .. } => format!("google/{}", self.chat_model),
            ModelBackend::ApiKey { .. } => self.chat_model.clone(),
        }
    }
}
