//! Shared state handed to every tool.

use std::sync::Arc;
use std::time::Duration;

use genmedia_backends::{BackendSet, FfmpegTransform, MediaTransform, OperationPoller};
use genmedia_config::TimeoutConfig;
use genmedia_delivery::OutputMaterializer;
use genmedia_registry::CapabilityRegistry;
use genmedia_storage::ObjectStore;
use genmedia_types::MediaDomain;

/// Long-lived handles built once at startup.
///
/// Everything here is read-only or internally synchronized, so one
/// `Arc<ToolContext>` serves all concurrent requests.
pub struct ToolContext {
    pub registry: Arc<CapabilityRegistry>,
    pub backends: BackendSet,
    pub materializer: Arc<OutputMaterializer>,
    /// Used to read `gs://` inputs for `process-media`.
    pub store: Option<Arc<dyn ObjectStore>>,
    pub transform: Arc<dyn MediaTransform>,
    /// Bucket for outputs when the caller names none.
    pub default_bucket: Option<String>,
    pub timeouts: TimeoutConfig,
}

impl ToolContext {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        backends: BackendSet,
        materializer: Arc<OutputMaterializer>,
    ) -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            registry,
            backends,
            materializer,
            store: None,
            transform: Arc::new(FfmpegTransform::new(Duration::from_secs(
                timeouts.transform_secs,
            ))),
            default_bucket: None,
            timeouts,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn MediaTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_default_bucket(mut self, bucket: Option<String>) -> Self {
        self.default_bucket = bucket.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Wall-clock ceiling for one request in `domain`.
    pub fn ceiling(&self, domain: MediaDomain) -> Duration {
        let secs = match domain {
            MediaDomain::Video => self.timeouts.video_secs,
            MediaDomain::Image => self.timeouts.image_secs,
            MediaDomain::Speech => self.timeouts.speech_secs,
            MediaDomain::Transform => self.timeouts.transform_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn poller(&self, domain: MediaDomain) -> OperationPoller {
        OperationPoller::new(
            Duration::from_secs(self.timeouts.poll_interval_secs),
            self.ceiling(domain),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceilings_follow_config() {
        let ctx = crate::testing::context(BackendSet::new());
        assert_eq!(ctx.ceiling(MediaDomain::Video), Duration::from_secs(300));
        assert_eq!(ctx.ceiling(MediaDomain::Speech), Duration::from_secs(30));
        let poller = ctx.poller(MediaDomain::Video);
        assert_eq!(poller.interval(), Duration::from_secs(2));
        assert_eq!(poller.ceiling(), Duration::from_secs(300));
    }

    #[test]
    fn test_blank_bucket_ignored() {
        let ctx = crate::testing::context(BackendSet::new()).with_default_bucket(Some("  ".into()));
        assert!(ctx.default_bucket.is_none());
    }
}
