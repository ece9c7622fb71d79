//! Generation provider types.

use serde::{Deserialize, Serialize};

/// Supported output aspect ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 21:9 ultra-wide.
    #[serde(rename = "21:9")]
    UltraWide,
    /// 16:9 landscape.
    #[serde(rename = "16:9")]
    Landscape,
    /// 4:3 classic.
    #[serde(rename = "4:3")]
    Classic,
    /// 3:2 photo.
    #[serde(rename = "3:2")]
    Photo,
    /// 1:1 square (default).
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 2:3 portrait photo.
    #[serde(rename = "2:3")]
    PortraitPhoto,
    /// 3:4 portrait.
    #[serde(rename = "3:4")]
    PortraitClassic,
    /// 9:16 vertical.
    #[serde(rename = "9:16")]
    Vertical,
    /// 9:21 ultra-tall.
    #[serde(rename = "9:21")]
    UltraTall,
}

/// Output image format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG (default).
    #[default]
    Jpeg,
    /// PNG.
    Png,
}

/// A text-to-image generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// The text prompt.
    pub prompt: String,
    /// Number of images to generate.
    pub num_images: u32,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Output format.
    pub output_format: OutputFormat,
}

impl GenerationRequest {
    /// Create a request with provider defaults for everything but the prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            num_images: 1,
            aspect_ratio: AspectRatio::default(),
            output_format: OutputFormat::default(),
        }
    }
}

/// A generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Hosted URL of the image.
    pub url: String,
    /// Width in pixels, when reported.
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in pixels, when reported.
    #[serde(default)]
    pub height: Option<u32>,
    /// MIME type, when reported.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// The canonical result every generation call is normalized into.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Generated images; never empty.
    pub images: Vec<GeneratedImage>,
    /// Model-provided description, when present.
    pub description: Option<String>,
    /// Seed used by the model, when reported.
    pub seed: Option<u64>,
}

/// Raw provider response. The provider returns images under several shapes
/// depending on model and queue path; all of them are accepted here and
/// flattened by [`RawResponse::into_images`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    /// Images at the top level.
    #[serde(default)]
    pub images: Option<Vec<GeneratedImage>>,
    /// Single image at the top level.
    #[serde(default)]
    pub image: Option<GeneratedImage>,
    /// Nested data envelope.
    #[serde(default)]
    pub data: Option<RawResponseData>,
    /// Model-provided description.
    #[serde(default)]
    pub description: Option<String>,
    /// Seed used by the model.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Nested response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponseData {
    /// Images inside the envelope.
    #[serde(default)]
    pub images: Option<Vec<GeneratedImage>>,
    /// Single image inside the envelope.
    #[serde(default)]
    pub image: Option<GeneratedImage>,
    /// Description inside the envelope.
    #[serde(default)]
    pub description: Option<String>,
}

impl RawResponse {
    /// Flatten whichever shape the provider used into a plain image list.
    #[must_use]
    pub fn into_images(self) -> (Vec<GeneratedImage>, Option<String>, Option<u64>) {
        let description = self
            .description
            .or_else(|| self.data.as_ref().and_then(|d| d.description.clone()));
        let seed = self.seed;

        let images = if let Some(images) = self.images {
            images
        } else if let Some(image) = self.image {
            vec![image]
        } else if let Some(data) = self.data {
            if let Some(images) = data.images {
                images
            } else if let Some(image) = data.image {
                vec![image]
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        (images, description, seed)
    }
}
