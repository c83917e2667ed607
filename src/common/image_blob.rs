use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where an [`ImageBlob`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File { name: String },
    Camera,
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::File { name } => write!(f, "{}", name),
            ImageSource::Camera => write!(f, "camera capture"),
        }
    }
}

/// Raw bytes of a selected or captured photo, owned by one workflow attempt.
#[derive(Clone)]
pub struct ImageBlob {
    id: Uuid,
    bytes: Arc<Vec<u8>>,
    mime_type: String,
    source: ImageSource,
    captured_at: DateTime<Utc>,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, source: ImageSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes: Arc::new(bytes),
            mime_type: mime_type.into(),
            source,
            captured_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        self.bytes.clone()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("source", &self.source)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
