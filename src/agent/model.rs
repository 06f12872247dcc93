//! Gemini model client and tool-schema translation
//!
//! Speaks the `generateContent` REST format. Tool input schemas are
//! translated into function declarations through a typed schema-kind
//! boundary so unsupported types fail here, not at the model call site.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::ModelConfig;
use crate::protocol::Tool;
use crate::{Error, Result};

/// One turn of model-wire conversation content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelContent {
    /// Turn role: `user` or `model`
    pub role: String,
    /// Content parts in order
    #[serde(default)]
    pub parts: Vec<ModelPart>,
}

impl ModelContent {
    /// A user turn holding plain text
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![ModelPart::Text { text: text.into() }],
        }
    }

    /// A model turn holding a single part
    #[must_use]
    pub fn model_part(part: ModelPart) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![part],
        }
    }

    /// A user turn holding a single part (tool results go back as user turns)
    #[must_use]
    pub fn user_part(part: ModelPart) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![part],
        }
    }
}

/// A single part of a content turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelPart {
    /// Plain text
    Text {
        /// Text value
        text: String,
    },
    /// Function call requested by the model
    FunctionCall {
        /// The call
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    /// Function result injected back into the conversation
    FunctionResponse {
        /// The result
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
}

/// A function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name
    pub name: String,
    /// Call arguments
    #[serde(default)]
    pub args: Value,
}

/// A function result part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Tool name the result belongs to
    pub name: String,
    /// Result payload
    pub response: Value,
}

/// A translated function declaration
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Parameter schema in the model's declaration format
    pub parameters: Value,
}

/// Schema kinds accepted at the translation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// `string`
    String,
    /// `number`
    Number,
    /// `integer`
    Integer,
    /// `boolean`
    Boolean,
    /// `object`
    Object,
    /// `array`
    Array,
}

impl SchemaKind {
    /// Parse a JSON-schema type name
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "integer" => Ok(Self::Integer),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            other => Err(Error::Protocol(format!(
                "unsupported schema type `{other}`"
            ))),
        }
    }

    /// Upper-cased type name in the model's declaration format
    #[must_use]
    pub fn declaration_name(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Integer => "INTEGER",
            Self::Boolean => "BOOLEAN",
            Self::Object => "OBJECT",
            Self::Array => "ARRAY",
        }
    }
}

/// Translate advertised tools into function declarations.
///
/// Nested schemas are flattened to a single property level: an `object` or
/// `array` property keeps only its type and description. The `required`
/// list is passed through verbatim.
pub fn translate_tools(tools: &[Tool]) -> Result<Vec<FunctionDeclaration>> {
    let mut declarations = Vec::with_capacity(tools.len());

    for tool in tools {
        let mut properties = Map::new();

        if let Some(props) = tool.input_schema.get("properties").and_then(Value::as_object) {
            for (prop_name, details) in props {
                let type_name = details.get("type").and_then(Value::as_str).unwrap_or("string");
                let kind = SchemaKind::parse(type_name).map_err(|_| {
                    Error::Protocol(format!(
                        "unsupported schema type `{type_name}` for parameter `{prop_name}` of tool `{}`",
                        tool.name
                    ))
                })?;

                let description = details
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("");

                properties.insert(
                    prop_name.clone(),
                    json!({
                        "type": kind.declaration_name(),
                        "description": description,
                    }),
                );
            }
        }

        let mut parameters = json!({
            "type": "OBJECT",
            "properties": Value::Object(properties),
        });

        if let Some(required) = tool.input_schema.get("required") {
            parameters["required"] = required.clone();
        }

        declarations.push(FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters,
        });
    }

    Ok(declarations)
}

/// Gemini `generateContent` client
pub struct GeminiModel {
    /// HTTP client
    http: Client,
    /// Provider configuration
    config: ModelConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ModelContent>,
}

impl GeminiModel {
    /// Create a model client
    pub fn new(config: ModelConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Request a completion for the conversation so far
    pub async fn generate(
        &self,
        contents: &[ModelContent],
        declarations: &[FunctionDeclaration],
    ) -> Result<ModelContent> {
        let mut url = self.config.generate_url();
        if let Some(key) = self.config.resolve_api_key() {
            url = format!("{url}?key={key}");
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        });
        if !declarations.is_empty() {
            body["tools"] = json!([{ "function_declarations": declarations }]);
        }

        debug!(model = %self.config.name, turns = contents.len(), "Model request");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Model request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "Model returned HTTP {status}: {text}"
            )));
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Invalid model response: {e}")))?;

        // No candidates reads as an empty final answer
        Ok(data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .unwrap_or(ModelContent {
                role: "model".to_string(),
                parts: Vec::new(),
            }))
    }
}
