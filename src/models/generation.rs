// Icon generation data models
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Maximum number of images a single request may ask for.
pub const MAX_IMAGES_PER_REQUEST: u32 = 10;

/// Closed set of resolutions understood by the supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "256x256")]
    Square256,
    #[serde(rename = "512x512")]
    Square512,
    #[serde(rename = "1024x1024")]
    Square1024,
    #[serde(rename = "1792x1024")]
    Wide1792,
    #[serde(rename = "1024x1792")]
    Tall1792,
    #[serde(rename = "1536x1024")]
    Wide1536,
    #[serde(rename = "1024x1536")]
    Tall1536,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square256 => "256x256",
            Self::Square512 => "512x512",
            Self::Square1024 => "1024x1024",
            Self::Wide1792 => "1792x1024",
            Self::Tall1792 => "1024x1792",
            Self::Wide1536 => "1536x1024",
            Self::Tall1536 => "1024x1536",
        }
    }

    pub fn all() -> [Resolution; 7] {
        [
            Self::Square256,
            Self::Square512,
            Self::Square1024,
            Self::Wide1792,
            Self::Tall1792,
            Self::Wide1536,
            Self::Tall1536,
        ]
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Square1024
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown resolution: {}", s))
    }
}

/// Image models the client knows how to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ImageModel {
    DallE3,
    DallE2,
    GptImage1,
    /// Any other model id, passed through untouched.
    Other(String),
}

impl ImageModel {
    /// The primary model; the only one whose resolution is coerced.
    pub const PRIMARY: ImageModel = ImageModel::DallE3;

    pub fn id(&self) -> &str {
        match self {
            Self::DallE3 => "dall-e-3",
            Self::DallE2 => "dall-e-2",
            Self::GptImage1 => "gpt-image-1",
            Self::Other(id) => id,
        }
    }

    /// Whether the provider rejects `n > 1` for this model
    pub fn single_image_per_call(&self) -> bool {
        matches!(self, Self::DallE3)
    }

    /// Supported resolutions, or None when unknown (no coercion possible)
    pub fn supported_resolutions(&self) -> Option<&'static [Resolution]> {
        match self {
            Self::DallE3 => Some(&[
                Resolution::Square1024,
                Resolution::Wide1792,
                Resolution::Tall1792,
            ]),
            Self::DallE2 => Some(&[
                Resolution::Square256,
                Resolution::Square512,
                Resolution::Square1024,
            ]),
            Self::GptImage1 => Some(&[
                Resolution::Square1024,
                Resolution::Wide1536,
                Resolution::Tall1536,
            ]),
            Self::Other(_) => None,
        }
    }

    /// gpt-image-1 only ever answers with inline base64 payloads and rejects
    /// the `response_format` field.
    pub fn accepts_response_format(&self) -> bool {
        !matches!(self, Self::GptImage1)
    }
}

impl Default for ImageModel {
    fn default() -> Self {
        Self::PRIMARY
    }
}

impl From<String> for ImageModel {
    fn from(id: String) -> Self {
        match id.trim() {
            "dall-e-3" => Self::DallE3,
            "dall-e-2" => Self::DallE2,
            "gpt-image-1" => Self::GptImage1,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<ImageModel> for String {
    fn from(model: ImageModel) -> Self {
        model.id().to_string()
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// PNG compression level, 0 (fastest) to 9 (smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressLevel(u8);

impl CompressLevel {
    pub fn new(level: u8) -> Result<Self, String> {
        if level > 9 {
            return Err(format!("PNG compression level must be 0-9, got {}", level));
        }
        Ok(Self(level))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

/// Desired representation of each generated icon.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    /// Write PNG files (and optionally a 256x256 ICO) under `output_dir`.
    Path {
        output_dir: PathBuf,
        filename_prefix: Option<String>,
        compress_level: Option<CompressLevel>,
        write_ico: bool,
    },
    /// Decoded RGBA pixel buffers.
    Image,
    /// Encoded PNG bytes.
    Bytes { compress_level: Option<CompressLevel> },
    /// Encoded PNG bytes as standard base64 text.
    Base64 { compress_level: Option<CompressLevel> },
}

impl OutputFormat {
    pub fn path(output_dir: impl Into<PathBuf>) -> Self {
        Self::Path {
            output_dir: output_dir.into(),
            filename_prefix: None,
            compress_level: None,
            write_ico: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub template: Option<String>,
    pub keywords: Vec<String>,
    pub resolution: Resolution,
    pub model: ImageModel,
    pub count: u32,
    pub output: OutputFormat,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, output: OutputFormat) -> Self {
        Self {
            prompt: prompt.into(),
            template: None,
            keywords: Vec::new(),
            resolution: Resolution::default(),
            model: ImageModel::default(),
            count: 1,
            output,
        }
    }

    /// Requested count clamped to `1..=MAX_IMAGES_PER_REQUEST`.
    pub fn effective_count(&self) -> u32 {
        self.count.clamp(1, MAX_IMAGES_PER_REQUEST)
    }
}

/// One generated icon, in the representation the request asked for.
#[derive(Debug, Clone)]
pub enum IconArtifact {
    Path { png: PathBuf, ico: Option<PathBuf> },
    Image(RgbaImage),
    Bytes(Vec<u8>),
    Base64(String),
}

impl IconArtifact {
    pub fn png_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Path { png, .. } => Some(png),
            _ => None,
        }
    }
}

/// Artifacts in provider order; length equals the effective count.
pub type GenerationResult = Vec<IconArtifact>;
