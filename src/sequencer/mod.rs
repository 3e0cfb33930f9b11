pub mod assignment;
pub mod grid;
pub mod ledger;
pub mod outcome;
pub mod screens;

pub use ledger::{RecordedAnswer, ResponseLedger};
pub use outcome::record_outcome;
pub use screens::{build_script, PresentationScript, ScreenStep};

use anyhow::Result;
use rand::rngs::StdRng;

use crate::config::ExperimentDesign;
use crate::models::PresentationSpec;

/// Build one block's presentation specs for the configured design.
pub fn build_block(
    design: &ExperimentDesign,
    practice: bool,
    rng: &mut StdRng,
) -> Result<Vec<PresentationSpec>> {
    match design {
        ExperimentDesign::Trials(design) => assignment::build_trials_block(design, practice, rng),
        ExperimentDesign::Rounds(design) => grid::build_rounds_block(design, practice, rng),
    }
}
