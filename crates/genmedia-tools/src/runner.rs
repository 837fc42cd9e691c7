//! Submit-then-track flow shared by the generation tools, plus result assembly.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use genmedia_backends::{GenerationRequest, ProgressSink, Submission};
use genmedia_delivery::DeliveryResult;
use genmedia_types::{ContentBlock, GeneratedAsset, MediaDomain, ToolError};

use crate::context::ToolContext;
use crate::params::DeliveryArgs;

/// Submit `request` to its domain's backend and wait for the assets.
///
/// Synchronous backends are bounded by the domain ceiling; long-running
/// operations are handed to the poller. Nothing is retried.
pub async fn generate(
    ctx: &ToolContext,
    request: GenerationRequest,
    cancel: &CancellationToken,
    progress: Option<&ProgressSink>,
) -> Result<Vec<GeneratedAsset>, ToolError> {
    let domain = request.domain();
    let backend = ctx
        .backends
        .get(domain)
        .map_err(|e| ToolError::BackendSubmission(e.to_string()))?;
    let ceiling = ctx.ceiling(domain);

    info!(backend = backend.id(), %domain, "Submitting generation request");
    let submission = tokio::select! {
        _ = cancel.cancelled() => {
            return Err(ToolError::Canceled { operation: format!("{domain} generation") });
        }
        result = tokio::time::timeout(ceiling, backend.submit(&request)) => match result {
            Ok(Ok(submission)) => submission,
            Ok(Err(e)) => {
                warn!(backend = backend.id(), error = %e, "Generation submission failed");
                return Err(ToolError::BackendSubmission(e.to_string()));
            }
            Err(_) => {
                warn!(backend = backend.id(), ceiling_secs = ceiling.as_secs(), "Generation request timed out");
                return Err(ToolError::Timeout {
                    operation: format!("{domain} generation"),
                    elapsed_secs: ceiling.as_secs(),
                });
            }
        },
    };

    match submission {
        Submission::Ready(assets) => Ok(assets),
        Submission::Pending(handle) => {
            let outcome = ctx
                .poller(domain)
                .wait(backend.as_ref(), &handle, cancel, progress)
                .await;
            outcome.into_result(&handle)
        }
    }
}

/// Materialize every asset with the caller's delivery preferences.
pub async fn deliver_all(
    ctx: &ToolContext,
    assets: Vec<GeneratedAsset>,
    delivery: &DeliveryArgs,
    domain: MediaDomain,
    filename_prefix: &str,
) -> Result<Vec<DeliveryResult>, ToolError> {
    let mut results = Vec::with_capacity(assets.len());
    for asset in assets {
        let request =
            delivery.request_for(&asset, ctx.default_bucket.as_deref(), domain, filename_prefix);
        results.push(ctx.materializer.materialize(asset, &request).await?);
    }
    Ok(results)
}

/// A headline text block, one block per delivered asset, then any warnings.
pub fn result_blocks(headline: String, results: &[DeliveryResult]) -> Vec<ContentBlock> {
    let mut blocks = vec![ContentBlock::text(headline)];
    blocks.extend(results.iter().map(|r| r.delivered.content_block()));
    blocks.extend(
        results
            .iter()
            .flat_map(|r| r.warnings.iter())
            .map(|w| ContentBlock::text(format!("Warning: {w}"))),
    );
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use genmedia_backends::{BackendSet, ImageRequest};
    use genmedia_registry::NormalizedParams;
    use genmedia_types::OperationHandle;

    use crate::testing::{FakeBackend, context};

    fn image_request() -> GenerationRequest {
        GenerationRequest::Image(ImageRequest {
            prompt: "a lighthouse".into(),
            negative_prompt: None,
            reference_images: Vec::new(),
            params: NormalizedParams {
                model: "imagen-3.0-generate-002".into(),
                count: 1,
                duration: None,
                aspect_ratio: Some("1:1".into()),
                image_size: None,
                generate_audio: false,
            },
        })
    }

    #[tokio::test]
    async fn test_missing_backend_is_submission_error() {
        let ctx = context(BackendSet::new());
        let err = generate(&ctx, image_request(), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "backend_submission");
    }

    #[tokio::test]
    async fn test_submission_error_forwarded() {
        let backend = Arc::new(FakeBackend::failing(MediaDomain::Image, "quota exhausted"));
        let ctx = context(BackendSet::new().with(backend.clone()));
        let err = generate(&ctx, image_request(), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
        assert_eq!(backend.submissions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_operation_is_polled() {
        let asset = GeneratedAsset::from_locator("gs://b/v.mp4", "video/mp4");
        let backend = Arc::new(FakeBackend::pending(
            MediaDomain::Image,
            OperationHandle::new("ops/9", "imagen"),
            2,
            vec![asset],
        ));
        let ctx = context(BackendSet::new().with(backend.clone()));
        let assets = generate(&ctx, image_request(), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(backend.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sync_backend_times_out() {
        let backend = Arc::new(
            FakeBackend::ready(MediaDomain::Image, vec![]).with_delay(Duration::from_secs(600)),
        );
        let ctx = context(BackendSet::new().with(backend));
        let err = generate(&ctx, image_request(), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_result_blocks_order() {
        use genmedia_delivery::Delivered;
        let results = vec![DeliveryResult {
            delivered: Delivered::Inline {
                data: bytes::Bytes::from_static(b"x"),
                mime_type: "image/png".into(),
            },
            warnings: vec!["signing failed".into()],
        }];
        let blocks = result_blocks("Done.".into(), &results);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].as_text(), Some("Done."));
        assert!(matches!(blocks[1], ContentBlock::Binary { .. }));
        assert_eq!(blocks[2].as_text(), Some("Warning: signing failed"));
    }
}
