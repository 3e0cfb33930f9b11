//! Grid composition for count rounds: category quotas, per-cell expression
//! assignment, and a local-repair pass that keeps both expression sides at
//! their minimum.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::RoundsDesign;
use crate::models::{
    Expression, FaceCategory, FaceStimulus, GridCell, PresentationSpec, StimulusLayout,
    TaskCondition,
};

use super::assignment::{balanced_condition_order, practice_condition_order};

/// Select `grid_size` faces honoring the per-category minimum, then assign
/// expressions near-randomly and repair to the per-side minimum.
///
/// Faces repeat within one grid only when the pool itself is smaller than
/// the grid.
pub fn build_round_layout(design: &RoundsDesign, rng: &mut StdRng) -> Result<StimulusLayout> {
    let categories = FaceCategory::all();
    let quota_total = design.category_min * categories.len();
    if quota_total > design.grid_size {
        bail!(
            "grid of {} cannot hold {} of each of {} categories",
            design.grid_size,
            design.category_min,
            categories.len()
        );
    }
    if design.grid_size < design.expression_min * 2 {
        bail!(
            "grid of {} cannot hold {} of both expressions",
            design.grid_size,
            design.expression_min
        );
    }

    let mut chosen: Vec<FaceStimulus> = Vec::with_capacity(design.grid_size);

    // Category quotas first.
    for &category in categories.iter() {
        let mut members: Vec<&FaceStimulus> = design
            .pool
            .iter()
            .filter(|face| face.category == category)
            .collect();
        if members.is_empty() {
            bail!("stimulus pool has no faces for category {}", category.as_str());
        }
        members.shuffle(rng);
        for i in 0..design.category_min {
            chosen.push(members[i % members.len()].clone());
        }
    }

    // Fill the remaining cells from the whole pool, preferring faces not
    // already in this grid.
    let mut rest = design.pool.clone();
    rest.shuffle(rng);
    let mut cursor = 0;
    while chosen.len() < design.grid_size {
        let unused = rest
            .iter()
            .skip(cursor)
            .position(|face| !chosen.iter().any(|c| c.face_id == face.face_id));
        match unused {
            Some(offset) => {
                chosen.push(rest[cursor + offset].clone());
                cursor += offset + 1;
            }
            None => {
                // Pool smaller than the grid: repeats are unavoidable.
                chosen.push(rest[cursor % rest.len()].clone());
                cursor += 1;
            }
        }
    }

    chosen.shuffle(rng);

    let mut cells: Vec<GridCell> = chosen
        .into_iter()
        .map(|face| GridCell {
            face,
            expression: if rng.gen_bool(0.5) {
                Expression::Smiling
            } else {
                Expression::Neutral
            },
        })
        .collect();

    enforce_expression_minimum(&mut cells, design.expression_min, rng);

    Ok(StimulusLayout::Grid { cells })
}

/// Flip random cells from the over-supplied side until both expression
/// sides hold the minimum. Flips reassign expressions only; the selected
/// faces never change, so category quotas stay intact. No-op on grids too
/// small to satisfy both sides.
pub(crate) fn enforce_expression_minimum(cells: &mut [GridCell], min: usize, rng: &mut StdRng) {
    if cells.len() < min * 2 {
        return;
    }

    loop {
        let smiling: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.expression == Expression::Smiling)
            .map(|(i, _)| i)
            .collect();
        let neutral: Vec<usize> = (0..cells.len())
            .filter(|i| !smiling.contains(i))
            .collect();

        let flip = if smiling.len() < min {
            neutral.choose(rng).copied()
        } else if neutral.len() < min {
            smiling.choose(rng).copied()
        } else {
            None
        };

        match flip {
            Some(i) => cells[i].expression = cells[i].expression.flipped(),
            None => break,
        }
    }
}

/// Build one round block: practice cycles conditions, the main block is
/// fully balanced. Every presentation gets a freshly composed grid.
pub fn build_rounds_block(
    design: &RoundsDesign,
    practice: bool,
    rng: &mut StdRng,
) -> Result<Vec<PresentationSpec>> {
    let tasks = [TaskCondition::CategoryCounts, TaskCondition::ExpressionCounts];
    let slots = if practice {
        practice_condition_order(tasks, design.practice_count, rng)
    } else {
        balanced_condition_order(tasks, design.reps_per_condition, rng)
    };

    let mut specs = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        specs.push(PresentationSpec {
            index,
            practice,
            size: slot.size,
            task: slot.task,
            layout: build_round_layout(design, rng)?,
        });
    }
    Ok(specs)
}
