use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::engine::EngineClient;
use crate::error::{ProvisionError, ProvisionResult};
use crate::stream::copy_stream;

/// Finds an image tag in the local cache, pulling it when absent.
pub struct ImageResolver {
    engine: Arc<dyn EngineClient>,
}

impl ImageResolver {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        Self { engine }
    }

    /// Returns the reference to create the container from.
    ///
    /// A failed listing counts as "not cached" and falls through to a pull.
    /// Any unmatched scan pulls, so the result is never empty.
    pub async fn resolve<W>(
        &self,
        ctx: &RunContext,
        desired: &str,
        progress: &mut W,
    ) -> ProvisionResult<String>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if desired.trim().is_empty() {
            return Err(ProvisionError::InvalidSpec(
                "image reference must not be empty".to_string(),
            ));
        }

        if self.find_local(ctx, desired).await {
            info!("✓ Image found locally: {}", desired);
            return Ok(desired.to_string());
        }

        info!("Pulling image {}", desired);
        let written = ctx
            .bound(
                "image pull",
                copy_stream(self.engine.pull_image(desired), progress),
            )
            .await?;

        info!("✓ Image pulled: {} ({} bytes of progress)", desired, written);
        Ok(desired.to_string())
    }

    async fn find_local(&self, ctx: &RunContext, desired: &str) -> bool {
        match ctx.bound("image list", self.engine.list_images()).await {
            Ok(images) => images
                .iter()
                .any(|image| image.tags.iter().any(|tag| tag == desired)),
            Err(e) => {
                warn!("Error searching locally for images: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{Call, MockEngine};

    fn is_pull(call: &Call) -> bool {
        matches!(call, Call::PullImage(_))
    }

    #[tokio::test]
    async fn test_cached_tag_is_not_pulled() {
        let engine = MockEngine::new()
            .with_image(&["alpine:3.20"])
            .with_image(&["ubuntu:22.04", "ubuntu:latest"]);
        let resolver = ImageResolver::new(Arc::new(engine.clone()));
        let mut out = Vec::<u8>::new();

        let image = resolver
            .resolve(&RunContext::background(), "ubuntu:latest", &mut out)
            .await
            .unwrap();

        assert_eq!(image, "ubuntu:latest");
        assert_eq!(engine.count(is_pull), 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tag_is_pulled_once() {
        let engine = MockEngine::new().with_image(&["ubuntu:22.04"]);
        let resolver = ImageResolver::new(Arc::new(engine.clone()));
        let mut out = Vec::<u8>::new();

        let image = resolver
            .resolve(&RunContext::background(), "ubuntu:latest", &mut out)
            .await
            .unwrap();

        assert_eq!(image, "ubuntu:latest");
        assert_eq!(
            engine.calls(),
            vec![Call::ListImages, Call::PullImage("ubuntu:latest".to_string())]
        );
        let progress = String::from_utf8(out).unwrap();
        assert!(progress.contains("Downloaded newer image for ubuntu:latest"));
    }

    #[tokio::test]
    async fn test_prefix_match_is_not_a_match() {
        let engine = MockEngine::new().with_image(&["ubuntu:latest-minimal"]);
        let resolver = ImageResolver::new(Arc::new(engine.clone()));
        let mut out = Vec::<u8>::new();

        resolver
            .resolve(&RunContext::background(), "ubuntu:latest", &mut out)
            .await
            .unwrap();

        assert_eq!(engine.count(is_pull), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_falls_back_to_pull() {
        let engine = MockEngine::new().failing_listing();
        let resolver = ImageResolver::new(Arc::new(engine.clone()));
        let mut out = Vec::<u8>::new();

        let image = resolver
            .resolve(&RunContext::background(), "ubuntu:latest", &mut out)
            .await
            .unwrap();

        assert_eq!(image, "ubuntu:latest");
        assert_eq!(engine.count(is_pull), 1);
    }

    #[tokio::test]
    async fn test_empty_listing_still_pulls() {
        let engine = MockEngine::new();
        let resolver = ImageResolver::new(Arc::new(engine.clone()));
        let mut out = Vec::<u8>::new();

        let image = resolver
            .resolve(&RunContext::background(), "ubuntu:latest", &mut out)
            .await
            .unwrap();

        assert!(!image.is_empty());
        assert_eq!(engine.count(is_pull), 1);
    }

    #[tokio::test]
    async fn test_pull_failure_is_fatal() {
        let engine = MockEngine::new().failing_pull();
        let resolver = ImageResolver::new(Arc::new(engine.clone()));
        let mut out = Vec::<u8>::new();

        let err = resolver
            .resolve(&RunContext::background(), "nosuch/image:latest", &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::InvalidSpec(_)));
    }
}
