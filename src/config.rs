//! Configuration management

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Google OAuth and Drive API configuration
    pub google: GoogleConfig,
    /// Model provider configuration
    pub model: ModelConfig,
    /// Agent (chat client) configuration
    pub agent: AgentConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Externally reachable base URL, when it differs from host:port
    /// (e.g. behind a reverse proxy). Used for the OAuth redirect URI.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            public_url: None,
        }
    }
}

impl ServerConfig {
    /// Base URL clients and the OAuth provider reach this server at
    #[must_use]
    pub fn base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    /// Redirect URI registered with the OAuth provider
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth2callback", self.base_url())
    }
}

/// Google OAuth and Drive API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Path to the OAuth client secrets JSON (Google Cloud console download)
    pub credentials_file: String,
    /// OpenID userinfo endpoint for principal identity lookup
    pub userinfo_endpoint: String,
    /// Drive API base URL
    pub drive_api_base: String,
    /// Requested OAuth scopes
    pub scopes: Vec<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_file: "credentials.json".to_string(),
            userinfo_endpoint: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            drive_api_base: "https://www.googleapis.com/drive/v3".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/drive.metadata.readonly".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "openid".to_string(),
            ],
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name
    pub name: String,
    /// Generative Language API base URL (ignored when project/location are set)
    pub base_url: String,
    /// Vertex AI project (switches to the Vertex endpoint together with `location`)
    pub project: Option<String>,
    /// Vertex AI location
    pub location: Option<String>,
    /// API key; falls back to the `GEMINI_API_KEY` environment variable
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Response token budget
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            project: None,
            location: None,
            api_key: None,
            temperature: 0.7,
            top_p: 0.95,
            max_output_tokens: 1000,
        }
    }
}

impl ModelConfig {
    /// Full `generateContent` URL for the configured model
    #[must_use]
    pub fn generate_url(&self) -> String {
        if let (Some(project), Some(location)) = (&self.project, &self.location) {
            format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent",
                model = self.name,
            )
        } else {
            format!(
                "{}/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.name,
            )
        }
    }

    /// Resolve the API key from config or environment
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    }
}

/// Agent (chat client) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Bridge server URL the chat client connects to
    pub server_url: String,
    /// Cap on tool-call rounds per turn. `None` preserves the unbounded
    /// behavior; a malfunctioning model that always requests tools will
    /// then loop until interrupted.
    pub max_tool_rounds: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8081".to_string(),
            max_tool_rounds: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file plus `DRIVE_BRIDGE_*`
    /// environment variables (nested keys split on `__`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        } else {
            figment = figment.merge(Yaml::file("bridge.yaml"));
        }

        figment
            .merge(Env::prefixed("DRIVE_BRIDGE_").split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

/// OAuth app material from a Google client secrets file
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    /// OAuth app client identifier
    pub client_id: String,
    /// OAuth app client secret
    pub client_secret: String,
    /// Authorization endpoint
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The download wraps the app material under a `web` or `installed` key
#[derive(Debug, Deserialize)]
struct SecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Load client secrets from a Google-format credentials JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Cannot read client secrets {}: {e}",
                path.display()
            ))
        })?;

        let file: SecretsFile = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Malformed client secrets: {e}")))?;

        file.web
            .or(file.installed)
            .ok_or_else(|| Error::Config("Client secrets missing `web` or `installed` section".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_redirect_uri_uses_host_and_port() {
        let server = ServerConfig::default();
        assert_eq!(server.redirect_uri(), "http://127.0.0.1:8081/oauth2callback");
    }

    #[test]
    fn public_url_overrides_redirect_base() {
        let server = ServerConfig {
            public_url: Some("https://bridge.example.com".to_string()),
            ..ServerConfig::default()
        };
        assert_eq!(
            server.redirect_uri(),
            "https://bridge.example.com/oauth2callback"
        );
    }

    #[test]
    fn generate_url_defaults_to_generative_language() {
        let model = ModelConfig::default();
        assert_eq!(
            model.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn generate_url_switches_to_vertex_with_project_and_location() {
        let model = ModelConfig {
            project: Some("my-project".to_string()),
            location: Some("europe-north1".to_string()),
            ..ModelConfig::default()
        };
        let url = model.generate_url();
        assert!(url.starts_with("https://europe-north1-aiplatform.googleapis.com/"));
        assert!(url.contains("/projects/my-project/"));
        assert!(url.ends_with("models/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn default_scopes_include_drive_metadata() {
        let google = GoogleConfig::default();
        assert!(
            google
                .scopes
                .iter()
                .any(|s| s.ends_with("drive.metadata.readonly"))
        );
        assert!(google.scopes.iter().any(|s| s == "openid"));
    }

    #[test]
    fn client_secrets_parse_web_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"web": {{"client_id": "app-id", "client_secret": "app-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"}}}}"#
        )
        .unwrap();

        let secrets = ClientSecrets::load(file.path()).unwrap();
        assert_eq!(secrets.client_id, "app-id");
        assert_eq!(secrets.client_secret, "app-secret");
        assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn client_secrets_accept_installed_section_and_default_uris() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"installed": {{"client_id": "cli-id", "client_secret": "cli-secret"}}}}"#
        )
        .unwrap();

        let secrets = ClientSecrets::load(file.path()).unwrap();
        assert_eq!(secrets.client_id, "cli-id");
        assert_eq!(secrets.auth_uri, default_auth_uri());
        assert_eq!(secrets.token_uri, default_token_uri());
    }

    #[test]
    fn client_secrets_reject_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"other": {{}}}}"#).unwrap();

        let err = ClientSecrets::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
