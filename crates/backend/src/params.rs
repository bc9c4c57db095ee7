//! Generation parameters shared by every prompt of a run.

use serde::{Deserialize, Serialize};

/// Everything the generation backend needs besides the prompt itself.
///
/// Defaults match what the generation application ships with out of the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub negative_prompt: String,
    pub styles: Vec<String>,
    /// Performance tier (e.g. `Speed`, `Quality`).
    pub performance: String,
    /// Aspect ratio as `width*height`.
    pub aspect_ratio: String,
    /// Image file format (e.g. `png`, `jpeg`, `webp`).
    pub output_format: String,
    pub seed: u64,
    /// Ignore `seed` and let the backend pick one per image.
    pub random_seed: bool,
}
impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            negative_prompt: String::new(),
            styles: Vec::new(),
            performance: "Speed".to_string(),
            aspect_ratio: "1152*896".to_string(),
            output_format: "png".to_string(),
            seed: 0,
            random_seed: true,
        }
    }
}
