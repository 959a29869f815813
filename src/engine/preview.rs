//! 3D preview collaborator
//!
//! The viewer itself runs in the browser; the service only decides which
//! texture is installed on the tape material and how the mesh is scaled.
//! [`PreviewSink`] is that seam, [`PreviewChannel`] the implementation HTTP
//! clients read from.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use super::compensation::ModelScale;
use super::compositor::CompositeTexture;

/// Preview errors
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Preview viewer is gone")]
    Closed,
}

/// Receiver of textures and mesh scales
#[async_trait]
pub trait PreviewSink: Send + Sync {
    /// Install a composited texture; `None` restores the material's base map
    async fn apply_texture(&self, texture: Option<CompositeTexture>) -> Result<(), PreviewError>;

    /// Apply a non-uniform scale to the tape mesh
    async fn set_model_scale(&self, scale: ModelScale) -> Result<(), PreviewError>;
}

/// Current state of the preview
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Bumped on every texture or scale change
    pub revision: u64,
    /// `None` means the material's own base texture
    pub texture: Option<CompositeTexture>,
    pub model_scale: ModelScale,
}

/// Preview state published to polling clients
pub struct PreviewChannel {
    frame: watch::Sender<PreviewFrame>,
}

impl PreviewChannel {
    pub fn new() -> Self {
        let (frame, _) = watch::channel(PreviewFrame {
            revision: 0,
            texture: None,
            model_scale: ModelScale::IDENTITY,
        });
        PreviewChannel { frame }
    }

    pub fn current(&self) -> PreviewFrame {
        self.frame.borrow().clone()
    }

    /// Wait until the revision exceeds `after`, or the timeout passes
    ///
    /// Returns the current frame either way.
    pub async fn wait_newer(&self, after: u64, timeout: Duration) -> PreviewFrame {
        let mut frames = self.frame.subscribe();
        let newer = frames.wait_for(|frame| frame.revision > after);
        if let Ok(Ok(frame)) = tokio::time::timeout(timeout, newer).await {
            return frame.clone();
        }
        self.current()
    }
}

impl Default for PreviewChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreviewSink for PreviewChannel {
    async fn apply_texture(&self, texture: Option<CompositeTexture>) -> Result<(), PreviewError> {
        self.frame.send_modify(|frame| {
            frame.revision += 1;
            frame.texture = texture;
            debug!(revision = frame.revision, has_artwork = frame.texture.is_some(), "Texture applied");
        });
        Ok(())
    }

    async fn set_model_scale(&self, scale: ModelScale) -> Result<(), PreviewError> {
        self.frame.send_modify(|frame| {
            frame.revision += 1;
            frame.model_scale = scale;
            debug!(revision = frame.revision, scale_y = scale.y, "Model rescaled");
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn texture() -> CompositeTexture {
        CompositeTexture {
            png: Bytes::from_static(b"png"),
            width: 1,
            height: 1,
            compensation_factor: 1.0,
        }
    }

    #[tokio::test]
    async fn test_apply_and_scale_bump_revision() {
        let channel = PreviewChannel::new();
        channel.apply_texture(Some(texture())).await.unwrap();
        channel
            .set_model_scale(ModelScale { x: 1.0, y: 1.5, z: 1.0 })
            .await
            .unwrap();

        let frame = channel.current();
        assert_eq!(frame.revision, 2);
        assert!(frame.texture.is_some());
        assert_eq!(frame.model_scale.y, 1.5);

        channel.apply_texture(None).await.unwrap();
        assert!(channel.current().texture.is_none());
    }

    #[tokio::test]
    async fn test_wait_newer_times_out_with_current_frame() {
        let channel = PreviewChannel::new();
        let frame = channel.wait_newer(0, Duration::from_millis(10)).await;
        assert_eq!(frame.revision, 0);
    }

    #[tokio::test]
    async fn test_wait_newer_wakes_on_update() {
        let channel = std::sync::Arc::new(PreviewChannel::new());
        let waiter = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.wait_newer(0, Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        channel.apply_texture(Some(texture())).await.unwrap();

        let frame = waiter.await.unwrap();
        assert_eq!(frame.revision, 1);
    }
}
