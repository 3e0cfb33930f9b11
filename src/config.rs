//! Engine configuration: timing constants, fidelity thresholds, and the
//! per-variant experiment designs.

use std::path::PathBuf;
use std::time::Duration;

use crate::fidelity::scale::infer_scale_bucket;
use crate::models::FaceStimulus;

/// Strategy mapping a raw device pixel ratio to a logical scale bucket
/// (1x, 2x, ...) given a relative tolerance. Returns `None` when the ratio
/// sits between buckets (fractional OS scaling).
pub type ScaleInference = fn(f64, f64) -> Option<u32>;

/// Screen pacing for one presentation.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// How long the stimulus stays on screen. No input is accepted.
    pub exposure: Duration,
    /// Neutral mask/fixation shown between stimulus and prompts.
    pub mask: Duration,
    /// Hard per-prompt deadline. On expiry the prompt resolves to the
    /// timeout sentinel.
    pub prompt_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            exposure: Duration::from_millis(2000),
            mask: Duration::from_millis(500),
            prompt_timeout: Duration::from_secs(30),
        }
    }
}

/// Thresholds and pacing for the display-fidelity monitor.
///
/// The precondition tolerance is deliberately coarser than the drift
/// tolerance: entry accepts anything close to an integer scale bucket,
/// while mid-session drift detection treats any measurable change as a
/// deviation. The two are separate knobs on purpose.
#[derive(Debug, Clone)]
pub struct FidelityConfig {
    /// Fallback poll cadence; resize and media-query signals usually fire
    /// first, but no single browser signal covers every zoom pathway.
    pub poll_interval: Duration,
    /// Relative tolerance around an integer bucket for the entry check.
    pub precondition_tolerance: f64,
    /// Absolute tolerance for mid-session drift against the baseline.
    pub drift_tolerance: f64,
    /// Failed automatic re-checks required before the manual bypass is
    /// offered (fullscreen must already be satisfied).
    pub min_bypass_attempts: u32,
    /// Bucket inference strategy. Heuristic; misfires on some high-density
    /// or fractionally-scaled displays, which is what the bypass is for.
    pub scale_inference: ScaleInference,
}

impl Default for FidelityConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            precondition_tolerance: 0.05,
            drift_tolerance: 0.001,
            min_bypass_attempts: 3,
            scale_inference: infer_scale_bucket,
        }
    }
}

/// Single-face trials: display size crossed with question set.
#[derive(Debug, Clone)]
pub struct TrialsDesign {
    /// Routing tag the export sink uses to pick a record set.
    pub tag: String,
    pub pool: Vec<FaceStimulus>,
    /// Presentations per size x question-set combination.
    pub reps_per_condition: usize,
    pub practice_count: usize,
}

impl TrialsDesign {
    pub fn new(pool: Vec<FaceStimulus>) -> Self {
        Self {
            tag: "face_trials".to_string(),
            pool,
            reps_per_condition: 4,
            practice_count: 2,
        }
    }
}

/// Grid rounds: display size crossed with count task.
#[derive(Debug, Clone)]
pub struct RoundsDesign {
    /// Routing tag the export sink uses to pick a record set.
    pub tag: String,
    pub pool: Vec<FaceStimulus>,
    /// Presentations per size x count-task combination.
    pub reps_per_condition: usize,
    pub practice_count: usize,
    /// Faces per grid.
    pub grid_size: usize,
    /// Minimum appearances per face category within one grid.
    pub category_min: usize,
    /// Minimum cells per expression side within one grid.
    pub expression_min: usize,
}

impl RoundsDesign {
    pub fn new(pool: Vec<FaceStimulus>) -> Self {
        Self {
            tag: "face_rounds".to_string(),
            pool,
            reps_per_condition: 3,
            practice_count: 1,
            grid_size: 8,
            category_min: 1,
            expression_min: 2,
        }
    }
}

/// Which experiment variant this session runs.
#[derive(Debug, Clone)]
pub enum ExperimentDesign {
    Trials(TrialsDesign),
    Rounds(RoundsDesign),
}

impl ExperimentDesign {
    pub fn tag(&self) -> &str {
        match self {
            ExperimentDesign::Trials(d) => &d.tag,
            ExperimentDesign::Rounds(d) => &d.tag,
        }
    }

    pub fn practice_count(&self) -> usize {
        match self {
            ExperimentDesign::Trials(d) => d.practice_count,
            ExperimentDesign::Rounds(d) => d.practice_count,
        }
    }

    /// Size of the main block: condition combinations x repetitions.
    pub fn main_count(&self) -> usize {
        match self {
            ExperimentDesign::Trials(d) => 4 * d.reps_per_condition,
            ExperimentDesign::Rounds(d) => 4 * d.reps_per_condition,
        }
    }
}

/// Everything the engine needs for one session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub fidelity: FidelityConfig,
    pub design: ExperimentDesign,
    /// Seed for assignment/order randomization. `None` seeds from entropy;
    /// tests pass a fixed seed for reproducible blocks.
    pub seed: Option<u64>,
    /// Where to write the payload when the primary sink fails. `None`
    /// disables the fallback.
    pub fallback_export_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new(design: ExperimentDesign) -> Self {
        Self {
            timing: TimingConfig::default(),
            fidelity: FidelityConfig::default(),
            design,
            seed: None,
            fallback_export_path: None,
        }
    }
}
