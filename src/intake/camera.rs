use crate::common::{ImageBlob, ImageSource};
use crate::error::AppError;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    #[default]
    Environment,
}

/// A live video feed. Frames are pulled on demand.
pub trait MediaStream: Send {
    fn grab_frame(&mut self) -> Result<DynamicImage, AppError>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// Platform capture capability that hands out [`MediaStream`]s.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, AppError>;
}

/// Scoped ownership of an open camera stream. The stream is stopped on
/// capture, cancel, or drop, whichever comes first.
pub struct CameraSession {
    stream: Option<Box<dyn MediaStream>>,
}

impl CameraSession {
    pub async fn start(device: &dyn CameraDevice, facing: FacingMode) -> Result<Self, AppError> {
        debug!("Requesting {:?}-facing camera stream", facing);
        let stream = device.open(facing).await?;
        info!("Camera stream started");
        Ok(Self {
            stream: Some(stream),
        })
    }

    pub fn is_active(&self) -> bool {
        self.stream
            .as_ref()
            .map(|stream| stream.is_active())
            .unwrap_or(false)
    }

    /// Grabs the current frame as a PNG still and releases the stream, even
    /// when grabbing or encoding fails.
    pub fn capture(mut self) -> Result<ImageBlob, AppError> {
        let mut stream = self.stream.take().ok_or_else(|| {
            AppError::DeviceAccess("camera stream already released".to_string())
        })?;
        let frame = stream.grab_frame();
        stream.stop();
        debug!("Camera stream released after capture");

        let frame = frame?;
        let mut encoded = Cursor::new(Vec::new());
        frame.write_to(&mut encoded, ImageFormat::Png)?;
        info!(
            "Captured {}x{} frame from camera",
            frame.width(),
            frame.height()
        );
        Ok(ImageBlob::new(
            encoded.into_inner(),
            ImageFormat::Png.to_mime_type(),
            ImageSource::Camera,
        ))
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("Camera stream released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// A [`CameraDevice`] whose video feed is a still image read from disk.
pub struct StillFrameCamera {
    path: PathBuf,
}

impl StillFrameCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

struct StillFrameStream {
    frame: Option<DynamicImage>,
}

impl MediaStream for StillFrameStream {
    fn grab_frame(&mut self) -> Result<DynamicImage, AppError> {
        self.frame
            .clone()
            .ok_or_else(|| AppError::DeviceAccess("camera stream is stopped".to_string()))
    }

    fn stop(&mut self) {
        self.frame = None;
    }

    fn is_active(&self) -> bool {
        self.frame.is_some()
    }
}

#[async_trait]
impl CameraDevice for StillFrameCamera {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, AppError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            warn!("Still frame source {} unavailable: {}", self.path.display(), e);
            AppError::DeviceAccess(format!(
                "no camera available at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let frame = image::load_from_memory(&bytes).map_err(|e| {
            AppError::DeviceAccess(format!(
                "camera source {} produced no frames: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!(
            "Opened still frame camera {} ({:?}-facing hint ignored)",
            self.path.display(),
            facing
        );
        Ok(Box::new(StillFrameStream { frame: Some(frame) }))
    }
}
