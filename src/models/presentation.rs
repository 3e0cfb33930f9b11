//! Presentation data models: conditions, stimuli, prompts, and outcomes.
//!
//! Everything here ends up inside the export payload, so serde names follow
//! the wire format (snake_case) rather than the camelCase used for
//! host-facing screen traffic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display-size condition for a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySize {
    Small,
    Large,
}

impl DisplaySize {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplaySize::Small => "small",
            DisplaySize::Large => "large",
        }
    }

    pub fn all() -> [DisplaySize; 2] {
        [DisplaySize::Small, DisplaySize::Large]
    }
}

/// Expression a face photograph is shown with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Neutral,
    Smiling,
}

impl Expression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Smiling => "smiling",
        }
    }

    pub fn all() -> [Expression; 2] {
        [Expression::Neutral, Expression::Smiling]
    }

    pub fn flipped(&self) -> Expression {
        match self {
            Expression::Neutral => Expression::Smiling,
            Expression::Smiling => Expression::Neutral,
        }
    }
}

/// Demographic category a face belongs to; ground truth for count tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceCategory {
    YoungFemale,
    YoungMale,
    OlderFemale,
    OlderMale,
}

impl FaceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceCategory::YoungFemale => "young_female",
            FaceCategory::YoungMale => "young_male",
            FaceCategory::OlderFemale => "older_female",
            FaceCategory::OlderMale => "older_male",
        }
    }

    pub fn all() -> [FaceCategory; 4] {
        [
            FaceCategory::YoungFemale,
            FaceCategory::YoungMale,
            FaceCategory::OlderFemale,
            FaceCategory::OlderMale,
        ]
    }
}

/// One face in the stimulus pool. Image-path lookup is the host's concern;
/// the engine only tracks identity and ground-truth category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceStimulus {
    pub face_id: String,
    pub category: FaceCategory,
}

impl FaceStimulus {
    pub fn new(face_id: impl Into<String>, category: FaceCategory) -> Self {
        Self {
            face_id: face_id.into(),
            category,
        }
    }
}

/// Question/measurement-type condition for a presentation.
///
/// Trials cross display size with `Ratings`/`Judgments`; rounds cross it
/// with `CategoryCounts`/`ExpressionCounts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCondition {
    /// Two trait sliders with confidence (single-face trials).
    Ratings,
    /// Categorical expression choice plus familiarity boolean (trials).
    Judgments,
    /// Count entry per face category (grid rounds).
    CategoryCounts,
    /// Count entry per expression side (grid rounds).
    ExpressionCounts,
}

impl TaskCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCondition::Ratings => "ratings",
            TaskCondition::Judgments => "judgments",
            TaskCondition::CategoryCounts => "category_counts",
            TaskCondition::ExpressionCounts => "expression_counts",
        }
    }

    /// Measurement dimensions this condition asks, in canonical order.
    /// The sequencer shuffles the order per presentation.
    pub fn dims(&self) -> Vec<MeasureDim> {
        match self {
            TaskCondition::Ratings => {
                vec![MeasureDim::Trustworthiness, MeasureDim::Dominance]
            }
            TaskCondition::Judgments => {
                vec![MeasureDim::PerceivedExpression, MeasureDim::Familiarity]
            }
            TaskCondition::CategoryCounts | TaskCondition::ExpressionCounts => {
                vec![MeasureDim::Counts, MeasureDim::ExpressionMajority]
            }
        }
    }
}

/// One measurement dimension asked during a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureDim {
    Trustworthiness,
    Dominance,
    PerceivedExpression,
    Familiarity,
    Counts,
    ExpressionMajority,
}

impl MeasureDim {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureDim::Trustworthiness => "trustworthiness",
            MeasureDim::Dominance => "dominance",
            MeasureDim::PerceivedExpression => "perceived_expression",
            MeasureDim::Familiarity => "familiarity",
            MeasureDim::Counts => "counts",
            MeasureDim::ExpressionMajority => "expression_majority",
        }
    }
}

/// One cell of a grid presentation: a face plus the expression it is shown
/// with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub face: FaceStimulus,
    pub expression: Expression,
}

/// What is on screen during the stimulus exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusLayout {
    /// One face shown alone (trials variant).
    Single {
        face: FaceStimulus,
        expression: Expression,
    },
    /// Several faces shown simultaneously (rounds variant).
    Grid { cells: Vec<GridCell> },
}

impl StimulusLayout {
    /// Ground-truth count of grid cells in the given category.
    pub fn category_count(&self, category: FaceCategory) -> u32 {
        match self {
            StimulusLayout::Single { face, .. } => (face.category == category) as u32,
            StimulusLayout::Grid { cells } => {
                cells.iter().filter(|c| c.face.category == category).count() as u32
            }
        }
    }

    /// Ground-truth count of grid cells shown with the given expression.
    pub fn expression_count(&self, expression: Expression) -> u32 {
        match self {
            StimulusLayout::Single { expression: e, .. } => (*e == expression) as u32,
            StimulusLayout::Grid { cells } => {
                cells.iter().filter(|c| c.expression == expression).count() as u32
            }
        }
    }

    /// Whether smiling faces outnumber neutral ones. `None` on a tie.
    pub fn smiling_majority(&self) -> Option<bool> {
        let smiling = self.expression_count(Expression::Smiling);
        let neutral = self.expression_count(Expression::Neutral);
        if smiling == neutral {
            None
        } else {
            Some(smiling > neutral)
        }
    }

    pub fn cell_count(&self) -> usize {
        match self {
            StimulusLayout::Single { .. } => 1,
            StimulusLayout::Grid { cells } => cells.len(),
        }
    }
}

/// Immutable configuration for one stimulus showing. Generated before the
/// presentation begins; never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationSpec {
    /// Position within its block (practice and main count separately).
    pub index: usize,
    pub practice: bool,
    pub size: DisplaySize,
    pub task: TaskCondition,
    pub layout: StimulusLayout,
}

/// What a prompt asks the participant. Option and field orders are already
/// randomized by the sequencer; hosts render them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptKind {
    /// 0-100 value slider plus 0-100 confidence slider.
    RatingSliders { label: String },
    /// Single choice among the given options, in the given order.
    Choice {
        question: String,
        options: Vec<String>,
    },
    /// Bounded integer entry per field, with a host-side running-sum aid
    /// against `total`.
    CountEntry {
        fields: Vec<String>,
        max_per_field: u32,
        total: u32,
    },
    /// Yes/no choice.
    BoolChoice { question: String },
}

impl PromptKind {
    /// The randomized label order this prompt presents, for prompt types
    /// that have one. Recorded with the outcome.
    pub fn options_shown(&self) -> Option<Vec<String>> {
        match self {
            PromptKind::Choice { options, .. } => Some(options.clone()),
            PromptKind::CountEntry { fields, .. } => Some(fields.clone()),
            PromptKind::RatingSliders { .. } | PromptKind::BoolChoice { .. } => None,
        }
    }
}

/// What the participant answered. Values are raw; derived metrics are
/// computed at the record step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptAnswer {
    Ratings { value: f64, confidence: f64 },
    Selected { option: String },
    /// Parallel to the field order the prompt was shown with.
    Counts { values: Vec<u32> },
    Bool { answer: bool },
}

/// A captured response with its derived metric where applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseValue {
    Rating {
        value: f64,
        confidence: f64,
    },
    Choice {
        selected: String,
        correct: Option<bool>,
    },
    Counts {
        fields: Vec<CountField>,
    },
    Bool {
        answer: bool,
        correct: Option<bool>,
    },
}

/// One count-entry field with its signed error against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountField {
    pub label: String,
    pub reported: u32,
    pub actual: u32,
    pub error: i32,
}

/// Result of one measurement dimension within a presentation.
///
/// A timed-out prompt records `response: None, elapsed_ms: None` — the
/// timeout sentinel from the widget contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureOutcome {
    pub dim: MeasureDim,
    /// Label order actually presented, for choice and count prompts.
    pub options_shown: Option<Vec<String>>,
    pub response: Option<ResponseValue>,
    pub elapsed_ms: Option<u64>,
}

impl MeasureOutcome {
    pub fn timed_out(&self) -> bool {
        self.response.is_none() && self.elapsed_ms.is_none()
    }
}

/// The recorded result of one presentation: the scheduled
/// [`PresentationSpec`], the randomized orderings actually used, and
/// every captured response. Immutable once appended to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationOutcome {
    pub spec: PresentationSpec,
    /// The order measurement dimensions were asked in.
    pub dim_order: Vec<MeasureDim>,
    /// One entry per dimension, in `dim_order` sequence.
    pub measures: Vec<MeasureOutcome>,
    pub recorded_at: DateTime<Utc>,
}
