//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Predictor model settings
    pub models: ModelConfig,
    /// Annotation behavior settings
    pub annotation: AnnotationConfig,
    /// Zoom bounds and step
    pub zoom: ZoomConfig,
}

/// Detection/recognition model selection and filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Text detection model identifier
    pub detection_model: String,
    /// Text recognition model identifier
    pub recognition_model: String,
    /// Minimum objectness score for accepted predictions
    pub score_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detection_model: "fast_base".to_string(),
            recognition_model: "parseq-multilingual-v1".to_string(),
            score_threshold: 0.8,
        }
    }
}

/// Annotation behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// Region type tags offered for labeling
    pub text_types: Vec<String>,
    /// Binarization cutoff for tight-box refinement (0-255)
    pub binarize_threshold: u8,
    /// Viewport size (width, height) used to compute the initial scale
    pub viewport: (u32, u32),
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            text_types: vec!["words".to_string()],
            binarize_threshold: 128,
            viewport: (1920, 1080),
        }
    }
}

impl AnnotationConfig {
    /// The configured type tags, with "words" always present and first
    pub fn type_options(&self) -> Vec<String> {
        if self.text_types.iter().any(|t| t == "words") {
            self.text_types.clone()
        } else {
            let mut options = vec!["words".to_string()];
            options.extend(self.text_types.iter().cloned());
            options
        }
    }

    /// The default type tag assigned to new regions
    pub fn default_type(&self) -> String {
        self.type_options()
            .first()
            .cloned()
            .unwrap_or_else(|| "words".to_string())
    }
}

/// Zoom bounds and quantization step for the display scale factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoomConfig {
    /// Smallest allowed scale factor, must be positive
    pub min_zoom: f32,
    /// Largest allowed scale factor
    pub max_zoom: f32,
    /// Quantization step for zoom operations
    pub step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 3.0,
            step: 0.1,
        }
    }
}

impl ZoomConfig {
    /// Snap a requested scale to the configured step
    pub fn quantize(&self, scale: f32) -> f32 {
        (scale / self.step).round() * self.step
    }

    /// Whether a scale lies inside the configured bounds
    pub fn contains(&self, scale: f32) -> bool {
        scale >= self.min_zoom - 1e-4 && scale <= self.max_zoom + 1e-4
    }

    /// Initial scale for an image of `(height, width)` shown in `viewport`
    /// (width, height). Always positive and inside the configured bounds.
    pub fn fit_scale(&self, dimensions: (u32, u32), viewport: (u32, u32)) -> f32 {
        let (img_h, img_w) = (dimensions.0.max(1) as f32, dimensions.1.max(1) as f32);
        let (view_w, view_h) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
        let fit = (view_w / img_w).min(view_h / img_h).min(1.0);
        self.quantize(fit).clamp(self.min_zoom, self.max_zoom)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
