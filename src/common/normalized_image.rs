use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::sync::Arc;

/// A resized, re-encoded copy of an [`ImageBlob`](super::ImageBlob) ready for
/// transmission. The longer side never exceeds the bound it was produced with.
#[derive(Clone)]
pub struct NormalizedImage {
    bytes: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    mime_type: &'static str,
}

impl NormalizedImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, mime_type: &'static str) -> Self {
        Self {
            bytes: Arc::new(bytes),
            width,
            height,
            mime_type,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes.as_slice())
    }
}

impl fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
