// Shared data model for the translation pipeline

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Horizontal alignment for rendered text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    Left,
    #[default]
    Center,
    Right,
}

/// One detected text area plus everything later stages accumulate on it.
///
/// Geometry (`xyxy`, `angle`) is fixed once detection completes; OCR adds
/// `text`, translation adds `translation`, and rendering only reads. Style
/// hints use 0 / empty-string sentinels meaning "use the configured default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    /// Axis-aligned bounds [x1, y1, x2, y2] in image pixels
    pub xyxy: [f32; 4],
    /// Rotation of the box around its center, degrees
    pub angle: f32,
    /// Source language code, stamped by the OCR stage
    pub source_lang: String,
    /// Target language code, stamped by the Translate stage
    pub target_lang: String,
    /// Recognized text
    pub text: String,
    /// Translated text, empty until the Translate stage succeeds
    pub translation: String,
    /// Hex fill color, empty = renderer default
    pub font_color: String,
    /// 0.0 = renderer default
    pub min_font_size: f32,
    /// 0.0 = renderer default
    pub max_font_size: f32,
    /// Line-height multiplier, 0.0 = renderer default
    pub line_spacing: f32,
    pub alignment: TextAlignment,
}

impl TextRegion {
    pub fn new(xyxy: [f32; 4], angle: f32) -> Self {
        Self {
            xyxy,
            angle,
            source_lang: String::new(),
            target_lang: String::new(),
            text: String::new(),
            translation: String::new(),
            font_color: String::new(),
            min_font_size: 0.0,
            max_font_size: 0.0,
            line_spacing: 0.0,
            alignment: TextAlignment::default(),
        }
    }

    /// Derived [x, y, width, height] view of the bounds
    pub fn xywh(&self) -> [f32; 4] {
        let [x1, y1, x2, y2] = self.xyxy;
        [x1, y1, x2 - x1, y2 - y1]
    }

    pub fn width(&self) -> f32 {
        self.xyxy[2] - self.xyxy[0]
    }

    pub fn height(&self) -> f32 {
        self.xyxy[3] - self.xyxy[1]
    }

    pub fn center(&self) -> (f32, f32) {
        let [x1, y1, x2, y2] = self.xyxy;
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }
}

/// How far one image has progressed through the stage order.
///
/// Advances forward only (or to `Error`); each stage requires the previous
/// one to have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Detected,
    OcrCompleted,
    Translated,
    Inpainted,
    Rendered,
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Detected => "detected",
            PipelineStatus::OcrCompleted => "ocr_completed",
            PipelineStatus::Translated => "translated",
            PipelineStatus::Inpainted => "inpainted",
            PipelineStatus::Rendered => "rendered",
            PipelineStatus::Error => "error",
        }
    }
}

/// Per-image processing state owned by the controller for one session.
///
/// The region collection is created by Detect and mutated in place by the
/// later stages; the image buffers accumulate as stages complete. Dropped
/// when the image's processing session ends.
pub struct PipelineSession {
    pub image: RgbaImage,
    pub regions: Vec<TextRegion>,
    pub status: Option<PipelineStatus>,
    pub last_error: Option<String>,
    pub inpainted: Option<RgbaImage>,
    pub rendered: Option<RgbaImage>,
}

impl PipelineSession {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            regions: Vec::new(),
            status: None,
            last_error: None,
            inpainted: None,
            rendered: None,
        }
    }

    /// Forward-only status transition; `Error` is terminal.
    pub fn advance(&mut self, status: PipelineStatus) {
        match self.status {
            Some(PipelineStatus::Error) => {}
            Some(current) if status <= current => {}
            _ => self.status = Some(status),
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.status = Some(PipelineStatus::Error);
        self.last_error = Some(message.into());
    }

    pub fn status_str(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or("uploaded")
    }
}

/// Result of a full detect → render run for one image
pub struct PipelineOutput {
    pub inpainted_image: RgbaImage,
    pub final_image: RgbaImage,
    pub regions: Vec<TextRegion>,
}

/// Wire view of a region, mirrored by the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlockData {
    pub id: String,
    pub xyxy: [f32; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default)]
    pub angle: f32,
}

impl TextBlockData {
    pub fn from_region(index: usize, region: &TextRegion) -> Self {
        Self {
            id: index.to_string(),
            xyxy: region.xyxy,
            text: (!region.text.is_empty()).then(|| region.text.clone()),
            translation: (!region.translation.is_empty()).then(|| region.translation.clone()),
            angle: region.angle,
        }
    }
}

/// Response body shared by the step-by-step endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub image_id: String,
    pub blocks: Vec<TextBlockData>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xywh_view() {
        let region = TextRegion::new([10.0, 20.0, 110.0, 50.0], 0.0);
        assert_eq!(region.xywh(), [10.0, 20.0, 100.0, 30.0]);
        assert_eq!(region.width(), 100.0);
        assert_eq!(region.height(), 30.0);
    }

    #[test]
    fn test_status_never_moves_backward() {
        let mut session = PipelineSession::new(RgbaImage::new(4, 4));
        session.advance(PipelineStatus::Translated);
        session.advance(PipelineStatus::Detected);
        assert_eq!(session.status, Some(PipelineStatus::Translated));

        session.record_error("backend down");
        session.advance(PipelineStatus::Rendered);
        assert_eq!(session.status, Some(PipelineStatus::Error));
    }
}
