//! Weighted selection of the next action.
//!
//! Each iteration is stateless given the per-action counters and the current
//! catalog emptiness: compute the runnable subset, re-normalize its weights
//! and draw.  When nothing is runnable the scheduler forces a catalog fetch
//! so catalog-dependent actions can become runnable again, or reports a
//! stall if even that is capped out.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::actions::{ActionDescriptor, ActionKind};

/// What the scheduler decided for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Run(ActionKind),
    /// Nothing can run and the catalog fetch itself is unavailable; the
    /// caller should pause and try again rather than crash.
    Stall,
}

pub struct Scheduler {
    actions: Vec<ActionDescriptor>,
    rng: StdRng,
}

impl Scheduler {
    pub fn new(actions: Vec<ActionDescriptor>) -> Self {
        Self::with_rng(actions, StdRng::from_entropy())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(actions: Vec<ActionDescriptor>, rng: StdRng) -> Self {
        Self { actions, rng }
    }

    /// Indices of actions allowed to run right now: execution cap not
    /// reached, weight above zero, and not starved of arguments by an empty
    /// catalog.
    fn runnable(&self, catalog_empty: bool) -> Vec<usize> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, action)| {
                !action.cap_reached()
                    && action.weight > 0.0
                    && !(action.kind.requires_catalog() && catalog_empty)
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Choose the next action.  Probability of each runnable action is its
    /// configured weight divided by the runnable subset's weight sum.
    pub fn select(&mut self, catalog_empty: bool) -> Selection {
        let runnable = self.runnable(catalog_empty);
        if runnable.is_empty() {
            // Likely waiting for the first products to show up: force a full
            // catalog fetch unless its own cap is exhausted.
            let fetch = self
                .actions
                .iter()
                .find(|action| action.kind == ActionKind::FetchCatalog);
            return match fetch {
                Some(action) if !action.cap_reached() => {
                    tracing::debug!("no runnable actions, forcing catalog fetch");
                    Selection::Run(ActionKind::FetchCatalog)
                }
                _ => Selection::Stall,
            };
        }

        let weights: Vec<f64> = runnable.iter().map(|&idx| self.actions[idx].weight).collect();
        tracing::trace!(normalized = ?renormalize(&weights), "runnable weights");
        let dist = match WeightedIndex::new(&weights) {
            Ok(dist) => dist,
            Err(err) => {
                tracing::error!(error = %err, "weighted draw failed");
                return Selection::Stall;
            }
        };
        let chosen = runnable[dist.sample(&mut self.rng)];
        Selection::Run(self.actions[chosen].kind)
    }

    /// Record that an action was actually dispatched.  Abstained iterations
    /// must not call this.
    pub fn record_execution(&mut self, kind: ActionKind) {
        if let Some(action) = self.actions.iter_mut().find(|action| action.kind == kind) {
            action.executed += 1;
        }
    }

    /// Per-action execution counters, for the shutdown report.
    pub fn counters(&self) -> Vec<(&'static str, u64)> {
        self.actions
            .iter()
            .map(|action| (action.kind.name(), action.executed))
            .collect()
    }

    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }
}

/// Weights of the runnable subset scaled to sum to 1.  Used for diagnostics;
/// the draw itself works on relative weights.
pub fn renormalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| w / total).collect()
}
