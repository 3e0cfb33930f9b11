//! Screen scripting for one presentation: the fixed intro/exposure/mask
//! prefix, then one prompt per measurement dimension in a per-presentation
//! randomized order. Option and field orders are randomized here too, and
//! both orderings travel with the script so they end up in the outcome.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::TimingConfig;
use crate::models::{
    Expression, FaceCategory, MeasureDim, PresentationSpec, PromptKind, TaskCondition,
};

/// One screen in a presentation's script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenStep {
    /// Pre-presentation instruction interstitial.
    Intro,
    /// Stimulus on screen for the fixed duration. No input accepted.
    Exposure { duration: Duration },
    /// Neutral fixation between stimulus and prompts.
    Mask { duration: Duration },
    Prompt { dim: MeasureDim, kind: PromptKind },
}

/// The ordered screen list for one presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationScript {
    pub spec: PresentationSpec,
    /// The order dimensions are asked in. Recorded, not incidental.
    pub dim_order: Vec<MeasureDim>,
    pub steps: Vec<ScreenStep>,
}

pub fn build_script(
    spec: PresentationSpec,
    timing: &TimingConfig,
    rng: &mut StdRng,
) -> PresentationScript {
    let mut dim_order = spec.task.dims();
    dim_order.shuffle(rng);

    let mut steps = Vec::with_capacity(dim_order.len() + 3);
    steps.push(ScreenStep::Intro);
    steps.push(ScreenStep::Exposure {
        duration: timing.exposure,
    });
    steps.push(ScreenStep::Mask {
        duration: timing.mask,
    });
    for &dim in &dim_order {
        steps.push(ScreenStep::Prompt {
            dim,
            kind: prompt_for(dim, &spec, rng),
        });
    }

    PresentationScript {
        spec,
        dim_order,
        steps,
    }
}

fn prompt_for(dim: MeasureDim, spec: &PresentationSpec, rng: &mut StdRng) -> PromptKind {
    match dim {
        MeasureDim::Trustworthiness => PromptKind::RatingSliders {
            label: "How trustworthy does this face look?".to_string(),
        },
        MeasureDim::Dominance => PromptKind::RatingSliders {
            label: "How dominant does this face look?".to_string(),
        },
        MeasureDim::PerceivedExpression => {
            let mut options: Vec<String> = Expression::all()
                .iter()
                .map(|e| e.as_str().to_string())
                .collect();
            options.shuffle(rng);
            PromptKind::Choice {
                question: "Which expression did this face show?".to_string(),
                options,
            }
        }
        MeasureDim::Familiarity => PromptKind::BoolChoice {
            question: "Have you seen this face before?".to_string(),
        },
        MeasureDim::Counts => {
            let total = spec.layout.cell_count() as u32;
            let mut fields: Vec<String> = match spec.task {
                TaskCondition::ExpressionCounts => Expression::all()
                    .iter()
                    .map(|e| e.as_str().to_string())
                    .collect(),
                _ => FaceCategory::all()
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            };
            fields.shuffle(rng);
            PromptKind::CountEntry {
                fields,
                max_per_field: total,
                total,
            }
        }
        MeasureDim::ExpressionMajority => PromptKind::BoolChoice {
            question: "Were more than half of the faces smiling?".to_string(),
        },
    }
}
