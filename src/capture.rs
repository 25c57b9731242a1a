// src/capture.rs - External frame-capture collaborator
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type CaptureError = Box<dyn std::error::Error + Send + Sync>;

/// "Capture one frame now". Implementations live outside this crate (camera
/// tooling, network hooks); the controller invokes and discards the result.
#[async_trait]
pub trait CaptureTrigger: Send + Sync {
    async fn capture_frame(&self) -> Result<(), CaptureError>;
}

/// When the controller should fire the trigger. Time-paced capture is the
/// collaborator's own business; the controller only knows about layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    #[default]
    Disabled,
    /// One frame at every detected layer change.
    PerLayer,
}
