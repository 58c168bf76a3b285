use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Opaque server-assigned identifier naming one generation job.
///
/// Exactly one outstanding handle is supported per client at a time; the
/// registry enforces this by overwriting on save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-reported lifecycle status of a generation task.
///
/// Transitions are monotone toward a terminal value; once `Completed` or
/// `Failed` is observed, polling for that handle stops permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Preparing,
    Optimizing,
    Generating,
    Saving,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Preparing => "preparing",
            GenerationStatus::Optimizing => "optimizing",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Saving => "saving",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GenerationStatus::Pending),
            "preparing" => Some(GenerationStatus::Preparing),
            "optimizing" => Some(GenerationStatus::Optimizing),
            "generating" => Some(GenerationStatus::Generating),
            "saving" => Some(GenerationStatus::Saving),
            "completed" => Some(GenerationStatus::Completed),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }

    /// `completed` and `failed` end the task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

/// Output of a completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// URL the artifact can be fetched from.
    pub artifact_url: String,
    /// Server-side file path of the saved artifact.
    pub file_path: String,
    /// The prompt actually used (post-optimization, if any).
    pub final_prompt: String,
}

/// One polled server response describing current progress for a handle.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: GenerationStatus,
    /// Percentage in 0..=100. Displayed as-is; the client does not reject
    /// regressions from the server.
    pub progress: u8,
    /// Display text for the current stage.
    pub stage: String,
    /// Present once the task completes.
    pub result: Option<GenerationResult>,
    /// Server message, set on failure (and sometimes on completion).
    pub message: Option<String>,
}

/// Hardware optimization mode the model was loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    Basic,
    LowVram,
}

impl OptimizationMode {
    pub fn as_str(&self) -> &str {
        match self {
            OptimizationMode::Basic => "basic",
            OptimizationMode::LowVram => "low_vram",
        }
    }
}

const MIN_DIMENSION: u32 = 256;
const MAX_DIMENSION: u32 = 4096;
const MAX_STEPS: u32 = 50;

/// Immutable parameter snapshot captured at submission time.
///
/// Validated at construction via [`GenerationParamsBuilder::build()`]; used
/// for the request payload and as estimator input, nothing else.
///
/// # Example
/// ```
/// use zimage_client::GenerationParams;
///
/// let params = GenerationParams::builder()
///     .size(1024, 1024)
///     .steps(9)
///     .filename("sunset")
///     .build()
///     .unwrap();
/// assert_eq!(params.filename, "sunset.png");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub filename: String,
    pub optimization_mode: OptimizationMode,
    /// Whether the server should run prompt optimization before generating.
    pub optimize_prompt: bool,
    pub art_style: String,
    pub character: String,
    pub pose: String,
    pub background: String,
    pub clothing: String,
    pub lighting: String,
    pub composition: String,
    pub details: String,
}

impl GenerationParams {
    /// Start building parameters. Defaults: 1024x1024, 9 steps, basic mode.
    pub fn builder() -> GenerationParamsBuilder {
        GenerationParamsBuilder::default()
    }
}

/// Builder for [`GenerationParams`] with construction-time validation.
#[derive(Debug, Clone)]
pub struct GenerationParamsBuilder {
    width: u32,
    height: u32,
    steps: u32,
    filename: String,
    optimization_mode: OptimizationMode,
    optimize_prompt: bool,
    art_style: String,
    character: String,
    pose: String,
    background: String,
    clothing: String,
    lighting: String,
    composition: String,
    details: String,
}

impl Default for GenerationParamsBuilder {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            steps: 9,
            filename: "generated_image.png".to_string(),
            optimization_mode: OptimizationMode::Basic,
            optimize_prompt: false,
            art_style: String::new(),
            character: String::new(),
            pose: String::new(),
            background: String::new(),
            clothing: String::new(),
            lighting: String::new(),
            composition: String::new(),
            details: String::new(),
        }
    }
}

impl GenerationParamsBuilder {
    /// Set output dimensions. Both must be within 256..=4096.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of inference steps (1..=50).
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set the output filename. A `.png` extension is appended when the name
    /// carries no recognized image extension.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn optimization_mode(mut self, mode: OptimizationMode) -> Self {
        self.optimization_mode = mode;
        self
    }

    /// Ask the server to optimize the prompt before generating.
    pub fn optimize_prompt(mut self, enabled: bool) -> Self {
        self.optimize_prompt = enabled;
        self
    }

    pub fn art_style(mut self, value: impl Into<String>) -> Self {
        self.art_style = value.into();
        self
    }

    pub fn character(mut self, value: impl Into<String>) -> Self {
        self.character = value.into();
        self
    }

    pub fn pose(mut self, value: impl Into<String>) -> Self {
        self.pose = value.into();
        self
    }

    pub fn background(mut self, value: impl Into<String>) -> Self {
        self.background = value.into();
        self
    }

    pub fn clothing(mut self, value: impl Into<String>) -> Self {
        self.clothing = value.into();
        self
    }

    pub fn lighting(mut self, value: impl Into<String>) -> Self {
        self.lighting = value.into();
        self
    }

    pub fn composition(mut self, value: impl Into<String>) -> Self {
        self.composition = value.into();
        self
    }

    pub fn details(mut self, value: impl Into<String>) -> Self {
        self.details = value.into();
        self
    }

    /// Validate and build the final [`GenerationParams`].
    pub fn build(self) -> Result<GenerationParams> {
        for (label, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(TrackerError::InvalidParams(format!(
                    "{} must be between {} and {} (got {})",
                    label, MIN_DIMENSION, MAX_DIMENSION, value
                )));
            }
        }
        if !(1..=MAX_STEPS).contains(&self.steps) {
            return Err(TrackerError::InvalidParams(format!(
                "steps must be between 1 and {} (got {})",
                MAX_STEPS, self.steps
            )));
        }
        if self.filename.trim().is_empty() {
            return Err(TrackerError::InvalidParams(
                "filename must not be empty".into(),
            ));
        }

        Ok(GenerationParams {
            width: self.width,
            height: self.height,
            steps: self.steps,
            filename: normalize_filename(self.filename),
            optimization_mode: self.optimization_mode,
            optimize_prompt: self.optimize_prompt,
            art_style: self.art_style,
            character: self.character,
            pose: self.pose,
            background: self.background,
            clothing: self.clothing,
            lighting: self.lighting,
            composition: self.composition,
            details: self.details,
        })
    }
}

fn normalize_filename(filename: String) -> String {
    let lower = filename.to_lowercase();
    if [".png", ".jpg", ".jpeg"]
        .iter()
        .any(|ext| lower.ends_with(ext))
    {
        filename
    } else {
        format!("{}.png", filename)
    }
}
