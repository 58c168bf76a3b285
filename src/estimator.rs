use std::time::Duration;

use crate::types::OptimizationMode;

/// Reference configuration the baseline duration is calibrated against.
const REF_WIDTH: u32 = 1024;
const REF_HEIGHT: u32 = 1024;
const REF_STEPS: u32 = 9;

/// Extra cost of running with aggressive VRAM offloading.
const LOW_VRAM_FACTOR: f64 = 2.0;

/// Pure expected-duration estimator for a generation request.
///
/// The estimate scales a baseline duration by pixel count, step count, and a
/// per-mode multiplier. The result is display-only; it is never used to
/// enforce a timeout or abort a task.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use zimage_client::{DurationEstimator, OptimizationMode};
///
/// let est = DurationEstimator::new(Duration::from_secs(6));
/// // The reference configuration reproduces the baseline exactly.
/// assert_eq!(
///     est.estimate(1024, 1024, 9, OptimizationMode::Basic),
///     Duration::from_secs(6),
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DurationEstimator {
    base: Duration,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        // Observed ballpark for a 9-step 1024x1024 render on mid-range hardware.
        Self::new(Duration::from_secs(6))
    }
}

impl DurationEstimator {
    /// Create an estimator calibrated so that the reference configuration
    /// (1024x1024, 9 steps, basic mode) takes exactly `base`.
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Estimate the expected duration for the given request shape.
    pub fn estimate(
        &self,
        width: u32,
        height: u32,
        steps: u32,
        mode: OptimizationMode,
    ) -> Duration {
        let pixel_scale =
            (width as f64 * height as f64) / (REF_WIDTH as f64 * REF_HEIGHT as f64);
        let step_scale = steps as f64 / REF_STEPS as f64;
        let mode_scale = match mode {
            OptimizationMode::Basic => 1.0,
            OptimizationMode::LowVram => LOW_VRAM_FACTOR,
        };

        Duration::from_secs_f64(self.base.as_secs_f64() * pixel_scale * step_scale * mode_scale)
    }
}
