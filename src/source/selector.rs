//! Source selection: notification preemption, then a pluggable strategy over NORMAL sources.

use crate::error::ApiError;
use crate::source::registry::SourceRegistry;
use crate::source::{GenerationContext, PriorityClass, SourceEntry};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Injectable randomness for selection.
pub trait RandomSource: Send + Sync {
    /// Index in `0..upper`; `upper` is never zero.
    fn next_index(&self, upper: usize) -> usize;
}

/// Thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_index(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Reproducible RNG from a fixed seed.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_index(&self, upper: usize) -> usize {
        self.rng.lock().gen_range(0..upper)
    }
}

/// Replays a fixed sequence of indices (taken modulo `upper`), cycling when exhausted.
pub struct SequenceRandom {
    values: Vec<usize>,
    pending: Mutex<VecDeque<usize>>,
}

impl SequenceRandom {
    pub fn new(values: impl IntoIterator<Item = usize>) -> Self {
        let values: Vec<usize> = values.into_iter().collect();
        Self {
            pending: Mutex::new(values.iter().copied().collect()),
            values,
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_index(&self, upper: usize) -> usize {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            pending.extend(self.values.iter().copied());
        }
        pending.pop_front().unwrap_or(0) % upper
    }
}

/// Chooses one source among eligible candidates.
pub trait SelectionStrategy: Send + Sync {
    fn choose(
        &self,
        candidates: &[Arc<SourceEntry>],
        random: &dyn RandomSource,
    ) -> Option<Arc<SourceEntry>>;
}

/// Uniform choice, recomputed on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformStrategy;

impl SelectionStrategy for UniformStrategy {
    fn choose(
        &self,
        candidates: &[Arc<SourceEntry>],
        random: &dyn RandomSource,
    ) -> Option<Arc<SourceEntry>> {
        if candidates.is_empty() {
            return None;
        }
        candidates.get(random.next_index(candidates.len())).cloned()
    }
}

/// Why a source was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Trigger matched the cycle's event
    Notification,
    /// Picked by the selection strategy
    Strategy,
    /// Requested by id
    Explicit,
}

/// Outcome of selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub entry: Arc<SourceEntry>,
    pub reason: SelectionReason,
}

/// Picks exactly one source per cycle.
pub struct SourceSelector {
    strategy: Box<dyn SelectionStrategy>,
    random: Arc<dyn RandomSource>,
}

impl Default for SourceSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceSelector {
    pub fn new() -> Self {
        Self {
            strategy: Box::new(UniformStrategy),
            random: Arc::new(ThreadRandom),
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Select the source for `ctx`.
    ///
    /// A notification source whose trigger matches the event wins outright (first match
    /// in registration order). Otherwise the strategy chooses among NORMAL sources.
    pub fn select(
        &self,
        registry: &SourceRegistry,
        ctx: &GenerationContext,
    ) -> Result<Selection, ApiError> {
        if let Some(event) = &ctx.event {
            let matched = registry
                .list_by_priority(PriorityClass::Notification)
                .into_iter()
                .find(|entry| entry.meta.matches_event(event));
            if let Some(entry) = matched {
                debug!(
                    source = %entry.id(),
                    event_type = %event.event_type,
                    "Notification source preempts selection"
                );
                return Ok(Selection {
                    entry: entry.clone(),
                    reason: SelectionReason::Notification,
                });
            }
        }

        let candidates: Vec<Arc<SourceEntry>> = registry
            .list_by_priority(PriorityClass::Normal)
            .into_iter()
            .cloned()
            .collect();
        let entry = self
            .strategy
            .choose(&candidates, self.random.as_ref())
            .ok_or(ApiError::NoEligibleSource)?;
        debug!(
            source = %entry.id(),
            candidates = candidates.len(),
            "Selected content source"
        );
        Ok(Selection {
            entry,
            reason: SelectionReason::Strategy,
        })
    }

    /// Select a source by id, bypassing priority rules.
    pub fn select_by_id(
        &self,
        registry: &SourceRegistry,
        source_id: &str,
    ) -> Result<Selection, ApiError> {
        Ok(Selection {
            entry: registry.get_or_error(source_id)?.clone(),
            reason: SelectionReason::Explicit,
        })
    }
}
