use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("PROJECT_ID environment variable not set. Please set the PROJECT_ID environment variable.")]
    MissingProjectId,
}

// ──────────────────── Gateway ────────────────────

/// Transport binding the gateway listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON over stdin/stdout.
    #[default]
    Stdio,
    /// Server-sent events push channel.
    Sse,
    /// Request/response over HTTP POST.
    Http,
}

impl Transport {
    /// Port used when neither a flag nor `PORT` supplies one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Transport::Stdio => None,
            Transport::Sse => Some(8081),
            Transport::Http => Some(8080),
        }
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "sse" => Ok(Transport::Sse),
            "http" => Ok(Transport::Http),
            other => Err(format!(
                "invalid transport '{other}', expected one of: stdio, sse, http"
            )),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Transport::Stdio => "stdio",
            Transport::Sse => "sse",
            Transport::Http => "http",
        };
        f.write_str(s)
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub transport: Transport,
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on. Unset means "use the transport default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Base URL advertised to push-channel clients. Defaults to `http://localhost:<port>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_host(),
            port: None,
            public_base_url: None,
        }
    }
}

// ──────────────────── Backend ────────────────────

/// Remote generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Cloud project identifier. Required to serve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    /// Location for Gemini image models, which are served from `global`.
    #[serde(default = "default_gemini_location")]
    pub gemini_location: String,
    /// Overrides `https://<location>-aiplatform.googleapis.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default = "default_speech_endpoint")]
    pub speech_endpoint: String,
    /// Static bearer token; when unset the metadata server is asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_gemini_location() -> String {
    "global".to_string()
}

fn default_speech_endpoint() -> String {
    "https://texttospeech.googleapis.com".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            gemini_location: default_gemini_location(),
            api_endpoint: None,
            speech_endpoint: default_speech_endpoint(),
            access_token: None,
        }
    }
}

impl BackendConfig {
    /// Base URL for Vertex AI calls.
    pub fn api_base(&self) -> String {
        match &self.api_endpoint {
            Some(endpoint) if endpoint.starts_with("http") => endpoint.trim_end_matches('/').to_string(),
            Some(endpoint) => format!("https://{}", endpoint.trim_end_matches('/')),
            None => Self::regional_base(&self.location),
        }
    }

    /// Base URL for Gemini image calls. `api_endpoint` applies here too.
    pub fn gemini_api_base(&self) -> String {
        match &self.api_endpoint {
            Some(_) => self.api_base(),
            None => Self::regional_base(&self.gemini_location),
        }
    }

    fn regional_base(location: &str) -> String {
        if location == "global" {
            "https://aiplatform.googleapis.com".to_string()
        } else {
            format!("https://{location}-aiplatform.googleapis.com")
        }
    }
}

// ──────────────────── Storage ────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Default bucket name, without the `gs://` scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_access_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_secret: Option<String>,
}

fn default_signed_url_ttl() -> u64 {
    900
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            signed_url_ttl_secs: default_signed_url_ttl(),
            hmac_access_id: None,
            hmac_secret: None,
        }
    }
}

// ──────────────────── Timeouts ────────────────────

/// Per-operation wait ceilings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_video_secs")]
    pub video_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_image_secs")]
    pub image_secs: u64,
    #[serde(default = "default_speech_secs")]
    pub speech_secs: u64,
    #[serde(default = "default_transform_secs")]
    pub transform_secs: u64,
}

fn default_video_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_image_secs() -> u64 {
    120
}

fn default_speech_secs() -> u64 {
    30
}

fn default_transform_secs() -> u64 {
    120
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            video_secs: default_video_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            image_secs: default_image_secs(),
            speech_secs: default_speech_secs(),
            transform_secs: default_transform_secs(),
        }
    }
}

// ──────────────────── Rate limit / CORS ────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requests admitted per identity inside one window.
    #[serde(default = "default_rate_limit")]
    pub limit: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> usize {
    10
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_rate_limit(),
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_exposed_headers")]
    pub exposed_headers: Vec<String>,
    #[serde(default = "default_true")]
    pub allow_credentials: bool,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_headers() -> Vec<String> {
    [
        "Accept",
        "Authorization",
        "Content-Type",
        "X-CSRF-Token",
        "X-MCP-Progress-Token",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exposed_headers() -> Vec<String> {
    vec!["Link".to_string()]
}

fn default_max_age() -> u64 {
    300
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
            allowed_methods: default_methods(),
            allowed_headers: default_headers(),
            exposed_headers: default_exposed_headers(),
            allow_credentials: true,
            max_age_secs: default_max_age(),
        }
    }
}

// ──────────────────── Top level ────────────────────

/// Top-level genmedia configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenMediaConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    /// JSON file that replaces the built-in model catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

impl GenMediaConfig {
    /// Overlay environment variables read through `lookup`.
    ///
    /// Taking a lookup function keeps tests away from the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = get("PROJECT_ID") {
            self.backend.project_id = Some(project);
        }
        if let Some(location) = get("LOCATION") {
            self.backend.location = location;
        }
        if let Some(location) = get("GEMINI_LOCATION") {
            self.backend.gemini_location = location;
        }
        if let Some(endpoint) = get("VERTEX_API_ENDPOINT") {
            self.backend.api_endpoint = Some(endpoint);
        }
        if let Some(token) = get("GENMEDIA_ACCESS_TOKEN") {
            self.backend.access_token = Some(token);
        }
        if let Some(bucket) = get("GENMEDIA_BUCKET") {
            self.storage.bucket = Some(normalize_bucket(&bucket));
        }
        if let Some(id) = get("GENMEDIA_HMAC_ACCESS_ID") {
            self.storage.hmac_access_id = Some(id);
        }
        if let Some(secret) = get("GENMEDIA_HMAC_SECRET") {
            self.storage.hmac_secret = Some(secret);
        }
        if let Some(origins) = get("GENMEDIA_CORS_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = Some(port),
                Err(_) => tracing::warn!(
                    value = %port,
                    "Invalid PORT environment variable, falling back to default port"
                ),
            }
        }
    }

    /// Resolve the listen port: explicit flag, then env/file, then transport default.
    pub fn resolve_port(&self, flag: Option<u16>) -> Option<u16> {
        flag.or(self.gateway.port)
            .or_else(|| self.gateway.transport.default_port())
    }

    /// The project identifier, or the fatal startup error when missing.
    pub fn require_project_id(&self) -> Result<&str, ConfigError> {
        self.backend
            .project_id
            .as_deref()
            .ok_or(ConfigError::MissingProjectId)
    }
}

/// Strip a leading `gs://` and any trailing slash from a bucket setting.
pub fn normalize_bucket(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("gs://")
        .trim_end_matches('/')
        .to_string()
}

/// Resolve the genmedia config directory (~/.genmedia/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".genmedia"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.genmedia/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration: file (explicit or default path), then `.env`, then process env.
pub fn load_config(explicit: Option<&Path>) -> Result<GenMediaConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let mut config = match explicit {
        Some(path) => load_config_from(path)?,
        None => match config_file_path() {
            Ok(path) => load_config_from(&path)?,
            Err(ConfigError::NoDirFound) => GenMediaConfig::default(),
            Err(e) => return Err(e),
        },
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<GenMediaConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(GenMediaConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: GenMediaConfig = json5::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = GenMediaConfig::default();
        assert_eq!(config.gateway.transport, Transport::Stdio);
        assert_eq!(config.backend.location, "us-central1");
        assert_eq!(config.storage.signed_url_ttl_secs, 900);
        assert_eq!(config.timeouts.video_secs, 300);
        assert_eq!(config.timeouts.poll_interval_secs, 2);
        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.cors.allowed_origins, vec!["*"]);
        assert_eq!(config.cors.max_age_secs, 300);
    }

    #[test]
    fn test_json5_parse() {
        let json5_str = r#"{
            gateway: { transport: "http", port: 9000 },
            backend: { project_id: "demo", location: "europe-west4" },
            rate_limit: { limit: 3 },
        }"#;
        let config: GenMediaConfig = json5::from_str(json5_str).unwrap();
        assert_eq!(config.gateway.transport, Transport::Http);
        assert_eq!(config.gateway.port, Some(9000));
        assert_eq!(config.backend.project_id.as_deref(), Some("demo"));
        assert_eq!(config.rate_limit.limit, 3);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn test_env_overlay() {
        let mut config = GenMediaConfig::default();
        config.apply_env(env(&[
            ("PROJECT_ID", "proj"),
            ("GENMEDIA_BUCKET", "gs://my-bucket/"),
            ("GENMEDIA_CORS_ORIGINS", "https://a.example, https://b.example"),
        ]));
        assert_eq!(config.require_project_id().unwrap(), "proj");
        assert_eq!(config.storage.bucket.as_deref(), Some("my-bucket"));
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_missing_project_id() {
        let config = GenMediaConfig::default();
        assert!(matches!(
            config.require_project_id(),
            Err(ConfigError::MissingProjectId)
        ));
    }

    #[test]
    fn test_port_precedence() {
        let mut config = GenMediaConfig::default();
        config.gateway.transport = Transport::Http;
        assert_eq!(config.resolve_port(None), Some(8080));

        config.apply_env(env(&[("PORT", "9100")]));
        assert_eq!(config.resolve_port(None), Some(9100));
        assert_eq!(config.resolve_port(Some(7000)), Some(7000));
    }

    #[test]
    fn test_invalid_port_env_ignored() {
        let mut config = GenMediaConfig::default();
        config.gateway.transport = Transport::Sse;
        config.apply_env(env(&[("PORT", "not-a-port")]));
        assert_eq!(config.resolve_port(None), Some(8081));
    }

    #[test]
    fn test_stdio_has_no_port() {
        let config = GenMediaConfig::default();
        assert_eq!(config.resolve_port(None), None);
    }

    #[test]
    fn test_api_base() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.api_base(), "https://us-central1-aiplatform.googleapis.com");
        backend.api_endpoint = Some("staging-aiplatform.example.com/".into());
        assert_eq!(backend.api_base(), "https://staging-aiplatform.example.com");
    }

    #[test]
    fn test_gemini_api_base() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.gemini_api_base(), "https://aiplatform.googleapis.com");
        backend.gemini_location = "europe-west4".into();
        assert_eq!(backend.gemini_api_base(), "https://europe-west4-aiplatform.googleapis.com");
        backend.api_endpoint = Some("https://staging.example.com".into());
        assert_eq!(backend.gemini_api_base(), "https://staging.example.com");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json5")).unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ storage: { bucket: 'media' }, timeouts: { video_secs: 60 } }")
            .unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.storage.bucket.as_deref(), Some("media"));
        assert_eq!(config.timeouts.video_secs, 60);
        assert_eq!(config.timeouts.image_secs, 120);
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("SSE".parse::<Transport>().unwrap(), Transport::Sse);
        assert!("carrier".parse::<Transport>().is_err());
    }
}
