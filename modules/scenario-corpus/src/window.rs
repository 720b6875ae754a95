//! Per-generation corpus windows.

use serde::Serialize;

use crate::error::{CorpusError, Result};

/// The final generation composes this many times more scenarios per
/// configuration, to reduce variance in the terminal ranking.
pub const FINAL_COMPOSITE_FACTOR: usize = 5;

/// How scenarios are spread over generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSchedule {
    pub per_generation: usize,
    pub final_generation: usize,
    pub composite_size: usize,
    /// Every generation reuses the leading slice of the corpus.
    pub reuse_across_generations: bool,
}

/// Contiguous corpus range `[from, to)` used by one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationWindow {
    pub from: usize,
    pub to: usize,
    pub composite_size: usize,
}

impl GenerationWindow {
    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the window for `generation`. Never clamps: a window past the end of
/// the corpus means the corpus is too small for the schedule.
pub fn window_for(
    generation: usize,
    is_final: bool,
    schedule: &WindowSchedule,
    corpus_len: usize,
) -> Result<GenerationWindow> {
    let overflow = || CorpusError::Range {
        from: usize::MAX,
        to: usize::MAX,
        len: corpus_len,
    };

    let from = if schedule.reuse_across_generations {
        0
    } else {
        generation
            .checked_mul(schedule.per_generation)
            .ok_or_else(overflow)?
    };
    let count = if is_final {
        schedule.final_generation
    } else {
        schedule.per_generation
    };
    let to = from.checked_add(count).ok_or_else(overflow)?;

    if to > corpus_len {
        return Err(CorpusError::Range {
            from,
            to,
            len: corpus_len,
        });
    }

    let composite_size = if is_final {
        schedule
            .composite_size
            .checked_mul(FINAL_COMPOSITE_FACTOR)
            .ok_or_else(overflow)?
    } else {
        schedule.composite_size
    };

    Ok(GenerationWindow {
        from,
        to,
        composite_size,
    })
}

/// Windows for every generation of a run, validated up front.
pub fn plan_schedule(
    total_generations: usize,
    schedule: &WindowSchedule,
    corpus_len: usize,
) -> Result<Vec<GenerationWindow>> {
    (0..total_generations)
        .map(|g| window_for(g, g + 1 == total_generations, schedule, corpus_len))
        .collect()
}
