//! The record step: after the last prompt resolves, derive accuracy and
//! error metrics against the layout's ground truth and assemble the
//! immutable `PresentationOutcome`.

use std::collections::HashMap;

use chrono::Utc;

use crate::models::{
    CountField, Expression, FaceCategory, MeasureDim, MeasureOutcome, PresentationOutcome,
    PromptAnswer, ResponseValue, StimulusLayout,
};

use super::ledger::RecordedAnswer;
use super::screens::PresentationScript;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::log_warn;

/// Assemble the outcome for one presentation from the ledger's snapshot.
/// Prompts that never resolved (the session ended mid-script) record the
/// same shape as a timeout.
pub fn record_outcome(
    script: &PresentationScript,
    answers: &HashMap<MeasureDim, RecordedAnswer>,
) -> PresentationOutcome {
    let measures = script
        .dim_order
        .iter()
        .map(|&dim| match answers.get(&dim) {
            Some(entry) => MeasureOutcome {
                dim,
                options_shown: entry.options_shown.clone(),
                response: derive(dim, entry, &script.spec.layout),
                elapsed_ms: entry.elapsed_ms,
            },
            None => MeasureOutcome {
                dim,
                options_shown: None,
                response: None,
                elapsed_ms: None,
            },
        })
        .collect();

    PresentationOutcome {
        spec: script.spec.clone(),
        dim_order: script.dim_order.clone(),
        measures,
        recorded_at: Utc::now(),
    }
}

fn derive(
    dim: MeasureDim,
    entry: &RecordedAnswer,
    layout: &StimulusLayout,
) -> Option<ResponseValue> {
    let answer = entry.answer.as_ref()?;
    match (dim, answer) {
        (
            MeasureDim::Trustworthiness | MeasureDim::Dominance,
            PromptAnswer::Ratings { value, confidence },
        ) => Some(ResponseValue::Rating {
            value: *value,
            confidence: *confidence,
        }),
        (MeasureDim::PerceivedExpression, PromptAnswer::Selected { option }) => {
            let correct = match layout {
                StimulusLayout::Single { expression, .. } => Some(option == expression.as_str()),
                StimulusLayout::Grid { .. } => None,
            };
            Some(ResponseValue::Choice {
                selected: option.clone(),
                correct,
            })
        }
        (MeasureDim::Familiarity, PromptAnswer::Bool { answer }) => {
            // No ground truth; faces are unfamiliar by design.
            Some(ResponseValue::Bool {
                answer: *answer,
                correct: None,
            })
        }
        (MeasureDim::Counts, PromptAnswer::Counts { values }) => Some(ResponseValue::Counts {
            fields: count_fields(entry, values, layout),
        }),
        (MeasureDim::ExpressionMajority, PromptAnswer::Bool { answer }) => {
            // A tied grid has no majority, so no correctness either way.
            let correct = layout.smiling_majority().map(|truth| truth == *answer);
            Some(ResponseValue::Bool {
                answer: *answer,
                correct,
            })
        }
        (dim, answer) => {
            log_warn!(
                "prompt for {} resolved with a mismatched answer shape: {:?}",
                dim.as_str(),
                answer
            );
            None
        }
    }
}

/// Pair reported values with the field order the prompt was shown with.
/// A short value list pads with zeros; extras are ignored.
fn count_fields(
    entry: &RecordedAnswer,
    values: &[u32],
    layout: &StimulusLayout,
) -> Vec<CountField> {
    let labels = entry.options_shown.as_deref().unwrap_or(&[]);
    if labels.len() != values.len() {
        log_warn!(
            "count entry returned {} values for {} fields",
            values.len(),
            labels.len()
        );
    }
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let reported = values.get(i).copied().unwrap_or(0);
            let actual = ground_truth_count(label, layout);
            CountField {
                label: label.clone(),
                reported,
                actual,
                error: reported as i32 - actual as i32,
            }
        })
        .collect()
}

fn ground_truth_count(label: &str, layout: &StimulusLayout) -> u32 {
    if let Some(category) = FaceCategory::all().iter().find(|c| c.as_str() == label) {
        return layout.category_count(*category);
    }
    if let Some(expression) = Expression::all().iter().find(|e| e.as_str() == label) {
        return layout.expression_count(*expression);
    }
    log_warn!("count field {label:?} matches no category or expression");
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{DisplaySize, FaceStimulus, GridCell, PresentationSpec, TaskCondition};
    use crate::sequencer::screens::ScreenStep;

    fn single_script(expression: Expression) -> PresentationScript {
        let spec = PresentationSpec {
            index: 0,
            practice: false,
            size: DisplaySize::Small,
            task: TaskCondition::Judgments,
            layout: StimulusLayout::Single {
                face: FaceStimulus::new("face-00", FaceCategory::YoungFemale),
                expression,
            },
        };
        PresentationScript {
            spec,
            dim_order: vec![MeasureDim::PerceivedExpression, MeasureDim::Familiarity],
            steps: vec![ScreenStep::Intro],
        }
    }

    /// Grid with five smiling cells and category counts 3/2/2/1.
    fn grid_script(task: TaskCondition) -> PresentationScript {
        let makeup = [
            (FaceCategory::YoungFemale, Expression::Smiling),
            (FaceCategory::YoungFemale, Expression::Smiling),
            (FaceCategory::YoungFemale, Expression::Neutral),
            (FaceCategory::YoungMale, Expression::Smiling),
            (FaceCategory::YoungMale, Expression::Neutral),
            (FaceCategory::OlderFemale, Expression::Smiling),
            (FaceCategory::OlderFemale, Expression::Neutral),
            (FaceCategory::OlderMale, Expression::Smiling),
        ];
        let cells = makeup
            .iter()
            .enumerate()
            .map(|(i, &(category, expression))| GridCell {
                face: FaceStimulus::new(format!("face-{i:02}"), category),
                expression,
            })
            .collect();
        let spec = PresentationSpec {
            index: 0,
            practice: false,
            size: DisplaySize::Large,
            task,
            layout: StimulusLayout::Grid { cells },
        };
        PresentationScript {
            spec,
            dim_order: vec![MeasureDim::Counts, MeasureDim::ExpressionMajority],
            steps: vec![ScreenStep::Intro],
        }
    }

    fn answered(
        dim: MeasureDim,
        options_shown: Option<Vec<String>>,
        answer: PromptAnswer,
    ) -> RecordedAnswer {
        RecordedAnswer {
            dim,
            options_shown,
            answer: Some(answer),
            elapsed_ms: Some(900),
        }
    }

    #[test]
    fn perceived_expression_scores_against_the_shown_face() {
        let script = single_script(Expression::Smiling);
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::PerceivedExpression,
            answered(
                MeasureDim::PerceivedExpression,
                Some(vec!["smiling".to_string(), "neutral".to_string()]),
                PromptAnswer::Selected {
                    option: "smiling".to_string(),
                },
            ),
        );
        answers.insert(
            MeasureDim::Familiarity,
            answered(
                MeasureDim::Familiarity,
                None,
                PromptAnswer::Bool { answer: false },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        assert_eq!(outcome.measures.len(), 2);
        match &outcome.measures[0].response {
            Some(ResponseValue::Choice { selected, correct }) => {
                assert_eq!(selected, "smiling");
                assert_eq!(*correct, Some(true));
            }
            other => panic!("unexpected response {other:?}"),
        }
        // Familiarity has no ground truth.
        match &outcome.measures[1].response {
            Some(ResponseValue::Bool { correct, .. }) => assert_eq!(*correct, None),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn wrong_expression_choice_scores_incorrect() {
        let script = single_script(Expression::Neutral);
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::PerceivedExpression,
            answered(
                MeasureDim::PerceivedExpression,
                Some(vec!["neutral".to_string(), "smiling".to_string()]),
                PromptAnswer::Selected {
                    option: "smiling".to_string(),
                },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        match &outcome.measures[0].response {
            Some(ResponseValue::Choice { correct, .. }) => assert_eq!(*correct, Some(false)),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn category_counts_carry_signed_errors_in_shown_order() {
        let script = grid_script(TaskCondition::CategoryCounts);
        let shown = vec![
            "young_male".to_string(),
            "young_female".to_string(),
            "older_male".to_string(),
            "older_female".to_string(),
        ];
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::Counts,
            answered(
                MeasureDim::Counts,
                Some(shown.clone()),
                PromptAnswer::Counts {
                    values: vec![2, 2, 2, 2],
                },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        match &outcome.measures[0].response {
            Some(ResponseValue::Counts { fields }) => {
                let labels: Vec<&str> = fields.iter().map(|f| f.label.as_str()).collect();
                assert_eq!(labels, vec!["young_male", "young_female", "older_male", "older_female"]);
                // Ground truth is 2/3/1/2.
                assert_eq!(fields[0].error, 0);
                assert_eq!(fields[1].error, -1);
                assert_eq!(fields[2].error, 1);
                assert_eq!(fields[3].error, 0);
            }
            other => panic!("unexpected response {other:?}"),
        }
        assert_eq!(
            outcome.measures[0].options_shown.as_deref(),
            Some(&shown[..])
        );
    }

    #[test]
    fn expression_counts_and_majority_score_against_the_grid() {
        let script = grid_script(TaskCondition::ExpressionCounts);
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::Counts,
            answered(
                MeasureDim::Counts,
                Some(vec!["smiling".to_string(), "neutral".to_string()]),
                PromptAnswer::Counts { values: vec![4, 4] },
            ),
        );
        answers.insert(
            MeasureDim::ExpressionMajority,
            answered(
                MeasureDim::ExpressionMajority,
                None,
                PromptAnswer::Bool { answer: true },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        match &outcome.measures[0].response {
            Some(ResponseValue::Counts { fields }) => {
                // Five smiling, three neutral.
                assert_eq!(fields[0].error, -1);
                assert_eq!(fields[1].error, 1);
            }
            other => panic!("unexpected response {other:?}"),
        }
        // Smiling holds the majority and the answer said so.
        match &outcome.measures[1].response {
            Some(ResponseValue::Bool { correct, .. }) => assert_eq!(*correct, Some(true)),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn tied_grid_scores_majority_as_unknowable() {
        let mut script = grid_script(TaskCondition::ExpressionCounts);
        if let StimulusLayout::Grid { cells } = &mut script.spec.layout {
            // Rebalance to four smiling, four neutral.
            cells[0].expression = Expression::Neutral;
        }
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::ExpressionMajority,
            answered(
                MeasureDim::ExpressionMajority,
                None,
                PromptAnswer::Bool { answer: false },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        match &outcome.measures[1].response {
            Some(ResponseValue::Bool { correct, .. }) => assert_eq!(*correct, None),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn timeouts_and_unresolved_prompts_record_the_sentinel() {
        let script = single_script(Expression::Neutral);
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::PerceivedExpression,
            RecordedAnswer::timed_out(
                MeasureDim::PerceivedExpression,
                Some(vec!["neutral".to_string(), "smiling".to_string()]),
            ),
        );
        // Familiarity never resolved at all.

        let outcome = record_outcome(&script, &answers);
        assert!(outcome.measures[0].timed_out());
        assert!(outcome.measures[0].options_shown.is_some());
        assert!(outcome.measures[1].timed_out());
        assert_eq!(outcome.measures[1].options_shown, None);
    }

    #[test]
    fn mismatched_answer_shape_drops_the_response_but_keeps_timing() {
        let script = single_script(Expression::Neutral);
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::PerceivedExpression,
            answered(
                MeasureDim::PerceivedExpression,
                None,
                PromptAnswer::Ratings {
                    value: 10.0,
                    confidence: 5.0,
                },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        assert_eq!(outcome.measures[0].response, None);
        assert_eq!(outcome.measures[0].elapsed_ms, Some(900));
        assert!(!outcome.measures[0].timed_out());
    }

    #[test]
    fn short_count_answers_pad_with_zeros() {
        let script = grid_script(TaskCondition::CategoryCounts);
        let shown = vec![
            "young_female".to_string(),
            "young_male".to_string(),
            "older_female".to_string(),
            "older_male".to_string(),
        ];
        let mut answers = HashMap::new();
        answers.insert(
            MeasureDim::Counts,
            answered(
                MeasureDim::Counts,
                Some(shown),
                PromptAnswer::Counts { values: vec![3] },
            ),
        );

        let outcome = record_outcome(&script, &answers);
        match &outcome.measures[0].response {
            Some(ResponseValue::Counts { fields }) => {
                assert_eq!(fields.len(), 4);
                assert_eq!(fields[0].reported, 3);
                assert!(fields[1..].iter().all(|f| f.reported == 0));
                // Ground truth 3/2/2/1 turns the padding into negative errors.
                assert_eq!(fields[0].error, 0);
                assert_eq!(fields[1].error, -2);
                assert_eq!(fields[2].error, -2);
                assert_eq!(fields[3].error, -1);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
