//! Balanced assignment for single-face trial blocks: which conditions run
//! in what order, and which face each presentation shows.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::TrialsDesign;
use crate::models::{
    DisplaySize, Expression, FaceStimulus, PresentationSpec, StimulusLayout, TaskCondition,
};

/// One main-block slot before a stimulus is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionSlot {
    pub size: DisplaySize,
    pub task: TaskCondition,
}

/// Every size x task combination exactly `reps` times, order shuffled.
pub fn balanced_condition_order(
    tasks: [TaskCondition; 2],
    reps: usize,
    rng: &mut StdRng,
) -> Vec<ConditionSlot> {
    let mut slots = Vec::with_capacity(DisplaySize::all().len() * tasks.len() * reps);
    for &size in DisplaySize::all().iter() {
        for &task in tasks.iter() {
            for _ in 0..reps {
                slots.push(ConditionSlot { size, task });
            }
        }
    }
    slots.shuffle(rng);
    slots
}

/// Practice slots cycle the shuffled combinations, so even a short
/// practice touches distinct conditions.
pub fn practice_condition_order(
    tasks: [TaskCondition; 2],
    count: usize,
    rng: &mut StdRng,
) -> Vec<ConditionSlot> {
    let mut combos = Vec::with_capacity(DisplaySize::all().len() * tasks.len());
    for &size in DisplaySize::all().iter() {
        for &task in tasks.iter() {
            combos.push(ConditionSlot { size, task });
        }
    }
    combos.shuffle(rng);
    (0..count).map(|i| combos[i % combos.len()]).collect()
}

/// Deals faces from a shuffled pool without replacement, reshuffling only
/// when a full pass completes. Within one pass every face is distinct, so
/// a block no larger than the pool never repeats an individual.
pub struct PoolDealer {
    pool: Vec<FaceStimulus>,
    cursor: usize,
}

impl PoolDealer {
    pub fn new(mut pool: Vec<FaceStimulus>, rng: &mut StdRng) -> Result<Self> {
        if pool.is_empty() {
            bail!("stimulus pool is empty");
        }
        pool.shuffle(rng);
        Ok(Self { pool, cursor: 0 })
    }

    pub fn deal(&mut self, rng: &mut StdRng) -> FaceStimulus {
        if self.cursor >= self.pool.len() {
            self.pool.shuffle(rng);
            self.cursor = 0;
        }
        let face = self.pool[self.cursor].clone();
        self.cursor += 1;
        face
    }
}

/// Near-balanced expression sequence: half of each, odd slot arbitrary,
/// positions shuffled.
fn expression_sequence(len: usize, rng: &mut StdRng) -> Vec<Expression> {
    let mut seq: Vec<Expression> = (0..len)
        .map(|i| {
            if i % 2 == 0 {
                Expression::Neutral
            } else {
                Expression::Smiling
            }
        })
        .collect();
    seq.shuffle(rng);
    seq
}

/// Build one trial block: practice cycles conditions with reuse allowed,
/// the main block is fully balanced across combinations.
pub fn build_trials_block(
    design: &TrialsDesign,
    practice: bool,
    rng: &mut StdRng,
) -> Result<Vec<PresentationSpec>> {
    let tasks = [TaskCondition::Ratings, TaskCondition::Judgments];
    let slots = if practice {
        practice_condition_order(tasks, design.practice_count, rng)
    } else {
        balanced_condition_order(tasks, design.reps_per_condition, rng)
    };

    let mut dealer = PoolDealer::new(design.pool.clone(), rng)?;
    let expressions = expression_sequence(slots.len(), rng);

    let mut specs = Vec::with_capacity(slots.len());
    for (index, (slot, expression)) in slots.into_iter().zip(expressions).enumerate() {
        specs.push(PresentationSpec {
            index,
            practice,
            size: slot.size,
            task: slot.task,
            layout: StimulusLayout::Single {
                face: dealer.deal(rng),
                expression,
            },
        });
    }
    Ok(specs)
}
