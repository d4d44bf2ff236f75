use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;

/// Width and height of a capture in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Raster encoding requested from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg { quality: u8 },
}

impl RasterFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// One raster screenshot of a page, immutable once created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    /// Encoded raster bytes
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    #[serde(skip)]
    pub format: RasterFormat,
    pub captured_at_millis: i64,
    pub source_url: String,
    /// True when captured through size-planned emulation
    pub is_full_page: bool,
    /// Present for full-page captures
    pub dimensions: Option<Dimensions>,
}

impl CaptureResult {
    /// A capture of the current viewport only
    pub fn viewport(image_bytes: Vec<u8>, format: RasterFormat, source_url: String) -> Self {
        Self {
            image_bytes,
            format,
            captured_at_millis: chrono::Utc::now().timestamp_millis(),
            source_url,
            is_full_page: false,
            dimensions: None,
        }
    }

    /// A capture taken under a device-metrics override of `dimensions`
    pub fn full_page(
        image_bytes: Vec<u8>,
        format: RasterFormat,
        source_url: String,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            image_bytes,
            format,
            captured_at_millis: chrono::Utc::now().timestamp_millis(),
            source_url,
            is_full_page: true,
            dimensions: Some(dimensions),
        }
    }

    /// The raster as a `data:` URL, as handed to renderers and the history store
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), BASE64.encode(&self.image_bytes))
    }
}
