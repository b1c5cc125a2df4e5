//! Connection settings and the setup message sent when a session opens.

use crate::error::TransportError;
use aerodesk_core::auth::TokenProvider;
use serde::Serialize;
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Where the live model is hosted and how to authenticate against it.
#[derive(Clone)]
pub enum Endpoint {
    /// Managed-cloud mode, authenticated with an OAuth bearer token taken
    /// from `tokens` on every connect.
    VertexAi {
        project: String,
        location: String,
        tokens: Arc<dyn TokenProvider>,
    },
    /// Direct mode against the public API, authenticated with an API key.
    ApiKey { api_key: String },
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::VertexAi {
                project, location, ..
            } => f
                .debug_struct("VertexAi")
                .field("project", project)
                .field("location", location)
                .finish_non_exhaustive(),
            Endpoint::ApiKey { .. } => f.debug_struct("ApiKey").finish_non_exhaustive(),
        }
    }
}

impl Endpoint {
    /// The websocket URL to dial.
    pub fn url(&self) -> String {
        match self {
            Endpoint::VertexAi { location, .. } => format!(
                "wss://{location}-aiplatform.googleapis.com/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent"
            ),
            Endpoint::ApiKey { api_key } => format!(
                "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent?key={api_key}"
            ),
        }
    }

    /// The fully qualified model name expected in the setup message.
    pub fn model_path(&self, model: &str) -> String {
        match self {
            Endpoint::VertexAi {
                project, location, ..
            } => format!("projects/{project}/locations/{location}/publishers/google/models/{model}"),
            Endpoint::ApiKey { .. } => format!("models/{model}"),
        }
    }

    /// A current bearer token for the upgrade request, if the mode uses one.
    pub async fn bearer_token(&self) -> Result<Option<String>, TransportError> {
        match self {
            Endpoint::VertexAi { tokens, .. } => tokens
                .access_token()
                .await
                .map(Some)
                .map_err(|e| TransportError::Auth(format!("{e:#}"))),
            Endpoint::ApiKey { .. } => Ok(None),
        }
    }
}

/// A function the model may call, as declared in the setup message.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Session-level settings for the live model.
#[derive(Clone, Debug)]
pub struct LiveConnectConfig {
    pub model: String,
    pub system_instruction: String,
    pub voice_name: String,
    pub enable_affective_dialog: bool,
    pub function_declarations: Vec<FunctionDeclaration>,
    /// Optional retrieval corpus resource name.
    pub rag_corpus: Option<String>,
}

impl LiveConnectConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: String::new(),
            voice_name: "Kore".to_string(),
            enable_affective_dialog: true,
            function_declarations: Vec::new(),
            rag_corpus: None,
        }
    }

    /// Renders the `setup` client message for `endpoint`.
    pub fn setup_message(&self, endpoint: &Endpoint) -> Result<String, TransportError> {
        if self.model.trim().is_empty() {
            return Err(TransportError::InvalidConfig("model name is empty".into()));
        }

        let mut tools = Vec::new();
        if !self.function_declarations.is_empty() {
            tools.push(wire::Tool {
                function_declarations: Some(self.function_declarations.clone()),
                retrieval: None,
            });
        }
        if let Some(corpus) = &self.rag_corpus {
            tools.push(wire::Tool {
                function_declarations: None,
                retrieval: Some(wire::Retrieval {
                    vertex_rag_store: wire::VertexRagStore {
                        rag_resources: vec![wire::RagResource {
                            rag_corpus: corpus.clone(),
                        }],
                    },
                }),
            });
        }

        let message = wire::SetupMessage {
            setup: wire::Setup {
                model: endpoint.model_path(&self.model),
                generation_config: wire::GenerationConfig {
                    response_modalities: vec!["AUDIO"],
                    speech_config: wire::SpeechConfig {
                        voice_config: wire::VoiceConfig {
                            prebuilt_voice_config: wire::PrebuiltVoiceConfig {
                                voice_name: self.voice_name.clone(),
                            },
                        },
                    },
                    enable_affective_dialog: self.enable_affective_dialog,
                },
                system_instruction: (!self.system_instruction.is_empty()).then(|| {
                    wire::Content {
                        parts: vec![wire::Part {
                            text: self.system_instruction.clone(),
                        }],
                    }
                }),
                tools,
            },
        };
        Ok(serde_json::to_string(&message)?)
    }
}

// --- Setup wire format ---
mod wire {
    use super::FunctionDeclaration;
    use serde::Serialize;

    #[derive(Serialize)]
    pub(super) struct SetupMessage {
        pub setup: Setup,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Setup {
        pub model: String,
        pub generation_config: GenerationConfig,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub system_instruction: Option<Content>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tools: Vec<Tool>,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        pub response_modalities: Vec<&'static str>,
        pub speech_config: SpeechConfig,
        pub enable_affective_dialog: bool,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct SpeechConfig {
        pub voice_config: VoiceConfig,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct VoiceConfig {
        pub prebuilt_voice_config: PrebuiltVoiceConfig,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct PrebuiltVoiceConfig {
        pub voice_name: String,
    }
    #[derive(Serialize)]
    pub(super) struct Content {
        pub parts: Vec<Part>,
    }
    #[derive(Serialize)]
    pub(super) struct Part {
        pub text: String,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Tool {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub function_declarations: Option<Vec<FunctionDeclaration>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub retrieval: Option<Retrieval>,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Retrieval {
        pub vertex_rag_store: VertexRagStore,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct VertexRagStore {
        pub rag_resources: Vec<RagResource>,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct RagResource {
        pub rag_corpus: String,
    }
}
