//! genmedia-gateway: MCP server in front of the generative-media tools.
//!
//! Provides:
//! - JSON-RPC 2.0 framing with the MCP methods: initialize, ping,
//!   tools/list, tools/call, resources/list/read, prompts/list/get
//! - The [`ToolDispatcher`] fault boundary around tool execution
//! - Progress notifications for long-running generations
//! - Sliding-window rate limiting for the network transports
//! - Transports: stdio, SSE push channel, HTTP with CORS
//! - Startup wiring from [`GenMediaConfig`]

pub mod dispatcher;
pub mod handlers;
pub mod http;
pub mod prompts;
pub mod protocol;
pub mod rate_limit;
pub mod resources;
pub mod sse;
pub mod stdio;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use genmedia_backends::{
    BackendSet, CloudTtsBackend, FfmpegTransform, GenerationBackend, ImagenBackend, VeoBackend,
    VertexClient,
};
use genmedia_config::{GenMediaConfig, Transport};
use genmedia_delivery::OutputMaterializer;
use genmedia_registry::{CapabilityRegistry, VoiceCatalog};
use genmedia_storage::{
    GcsClient, HmacV4Signer, MetadataTokenProvider, ObjectStore, StaticTokenProvider,
    TokenProvider, UnconfiguredSigner, UrlSigner,
};
use genmedia_tools::{ToolContext, default_tools};

pub use dispatcher::ToolDispatcher;
pub use handlers::{CallContext, McpServer};
pub use rate_limit::RateLimiter;
pub use sse::SseState;

/// Build the server: backend clients, voice catalog, registry, delivery, tools.
///
/// Fails when the project identifier is missing or a client cannot be built.
pub async fn build_server(config: &GenMediaConfig) -> anyhow::Result<Arc<McpServer>> {
    let project = config.require_project_id()?;
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let tokens: Arc<dyn TokenProvider> = match &config.backend.access_token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => Arc::new(MetadataTokenProvider::new(http.clone())),
    };
    let vertex = Arc::new(VertexClient::new(
        http.clone(),
        tokens.clone(),
        config.backend.api_base(),
        project,
        config.backend.location.clone(),
    ));
    let gemini = Arc::new(VertexClient::new(
        http.clone(),
        tokens.clone(),
        config.backend.gemini_api_base(),
        project,
        config.backend.gemini_location.clone(),
    ));
    let speech = Arc::new(CloudTtsBackend::new(
        http.clone(),
        tokens.clone(),
        config.backend.speech_endpoint.clone(),
        project,
    ));
    info!(
        project,
        location = %config.backend.location,
        gemini_location = %config.backend.gemini_location,
        "Backend clients initialized"
    );

    let voices = load_voice_catalog(speech.as_ref()).await;
    let builder = match &config.catalog_path {
        Some(path) => CapabilityRegistry::builder()
            .with_catalog_file(path)
            .with_context(|| format!("failed to load model catalog {}", path.display()))?,
        None => CapabilityRegistry::builder().with_builtin_models(),
    };
    let registry = Arc::new(builder.voices(voices).build()?);

    let backends = BackendSet::new()
        .with(Arc::new(VeoBackend::new(vertex.clone())))
        .with(Arc::new(ImagenBackend::new(vertex).with_gemini_client(gemini)))
        .with(speech);

    let store: Arc<dyn ObjectStore> = Arc::new(GcsClient::new(http, tokens));
    let signer: Arc<dyn UrlSigner> =
        match (&config.storage.hmac_access_id, &config.storage.hmac_secret) {
            (Some(id), Some(secret)) => Arc::new(HmacV4Signer::new(id.clone(), secret.clone())),
            _ => {
                info!("No signing credentials configured, stored outputs will be returned unsigned");
                Arc::new(UnconfiguredSigner)
            }
        };
    let materializer = Arc::new(OutputMaterializer::new(
        Some(store.clone()),
        signer,
        Duration::from_secs(config.storage.signed_url_ttl_secs),
    ));

    let transform = Arc::new(FfmpegTransform::new(Duration::from_secs(
        config.timeouts.transform_secs,
    )));
    let ctx = ToolContext::new(registry.clone(), backends, materializer)
        .with_store(store)
        .with_transform(transform)
        .with_default_bucket(config.storage.bucket.clone())
        .with_timeouts(config.timeouts.clone());
    if ctx.default_bucket.is_none() {
        warn!("GENMEDIA_BUCKET is not set, video output needs an explicit storage_locator or output_directory");
    }

    let dispatcher = ToolDispatcher::new(default_tools(Arc::new(ctx)));
    info!(tools = ?dispatcher.names(), "Tools registered");
    Ok(Arc::new(McpServer::new(Arc::new(dispatcher), registry)))
}

/// Voices from the speech backend, or the built-in list when listing fails.
pub async fn load_voice_catalog(backend: &dyn GenerationBackend) -> VoiceCatalog {
    match backend.list_voices().await {
        Ok(listing) => {
            let catalog = VoiceCatalog::from_listing(listing);
            if catalog.is_empty() {
                warn!("Speech backend listed no usable voices, using built-in voice list");
                VoiceCatalog::builtin()
            } else {
                info!(voices = catalog.len(), "Voice catalog loaded");
                catalog
            }
        }
        Err(e) => {
            warn!("Failed to list voices, using built-in voice list: {e}");
            VoiceCatalog::builtin()
        }
    }
}

/// Start the gateway on the configured transport and run until `shutdown`
/// fires (or stdin closes, for stdio).
pub async fn start_gateway(config: GenMediaConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let server = build_server(&config).await?;
    let transport = config.gateway.transport;

    if transport == Transport::Stdio {
        return stdio::run(server, shutdown).await;
    }

    let port = config
        .resolve_port(None)
        .with_context(|| format!("no port configured for the {transport} transport"))?;
    let addr: SocketAddr = format!("{}:{}", config.gateway.host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{port}", config.gateway.host))?;

    let limiter = RateLimiter::from_config(&config.rate_limit).map(Arc::new);
    if let Some(limiter) = &limiter {
        limiter.spawn_sweeper(shutdown.child_token());
        info!(
            limit = config.rate_limit.limit,
            window_secs = config.rate_limit.window_secs,
            "Rate limiting enabled"
        );
    }

    match transport {
        Transport::Sse => {
            let base_url = config
                .gateway
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{port}"));
            let state = Arc::new(SseState::new(server, Some(base_url)));
            sse::serve(state, limiter, addr, shutdown).await
        }
        _ => http::serve(server, limiter, &config.cors, addr, shutdown).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genmedia_backends::{BackendError, GenerationRequest, Submission};
    use genmedia_registry::VoiceInfo;
    use genmedia_types::MediaDomain;

    struct VoiceLister(Result<Vec<VoiceInfo>, String>);

    #[async_trait]
    impl GenerationBackend for VoiceLister {
        fn id(&self) -> &str {
            "voice-lister"
        }

        fn domain(&self) -> MediaDomain {
            MediaDomain::Speech
        }

        async fn submit(&self, _request: &GenerationRequest) -> Result<Submission, BackendError> {
            Err(BackendError::Api {
                status: 500,
                message: "unused".into(),
            })
        }

        async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
            self.0.clone().map_err(|message| BackendError::Api {
                status: 403,
                message,
            })
        }
    }

    fn chirp(name: &str) -> VoiceInfo {
        VoiceInfo {
            name: name.into(),
            language_codes: vec![name[..5].to_string()],
            gender: None,
        }
    }

    #[tokio::test]
    async fn test_voice_catalog_from_listing() {
        let catalog = load_voice_catalog(&VoiceLister(Ok(vec![
            chirp("en-US-Chirp3-HD-Kore"),
            chirp("de-DE-Chirp3-HD-Kore"),
            chirp("en-US-Chirp3-HD-Puck"),
        ])))
        .await;
        assert_eq!(catalog.len(), 2);
        assert!(catalog.find("Kore").unwrap().speaks("de-DE"));
    }

    #[tokio::test]
    async fn test_voice_catalog_falls_back() {
        let failed = load_voice_catalog(&VoiceLister(Err("denied".into()))).await;
        assert_eq!(failed.len(), VoiceCatalog::builtin().len());

        let empty = load_voice_catalog(&VoiceLister(Ok(vec![chirp("en-US-Standard-A")]))).await;
        assert_eq!(empty.len(), VoiceCatalog::builtin().len());
    }

    #[tokio::test]
    async fn test_missing_project_is_fatal() {
        let err = build_server(&GenMediaConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("PROJECT_ID"));
    }
}
