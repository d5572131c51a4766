//! Layered backward search and chain reconstruction.
//!
//! The engine expands one frontier of residual resistances per layer, working
//! backward from the target toward zero, and keeps for each deduplicated
//! residual the step that produced it. Reconstruction then walks the recorded
//! layers back out, which yields the chain already in forward build order.

use std::fmt;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{Error, RPool, RStep};

/// Search limits, passed in explicitly at call time.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum number of resistors in a chain (search depth bound).
    pub max_chain_length: usize,
    /// Residuals closer than this are treated as the same value.
    pub error_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_chain_length: 3,
            error_threshold: 1e-6,
        }
    }
}

/// One reachable residual and the step that produced it. Only the layer-0
/// entry, the target itself, has no originating step.
#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    residual: f64,
    via: Option<RStep>,
}

type Frontier = Vec<FrontierEntry>;

/// Appends only if no existing entry lies within `threshold` of `residual`;
/// the first entry recorded for a value wins and later duplicates are dropped.
fn push_unique(frontier: &mut Frontier, threshold: f64, residual: f64, via: RStep) {
    if frontier
        .iter()
        .any(|e| (e.residual - residual).abs() < threshold)
    {
        return;
    }
    frontier.push(FrontierEntry {
        residual,
        via: Some(via),
    });
}

fn find_near(frontier: &Frontier, value: f64, threshold: f64) -> Option<&FrontierEntry> {
    frontier
        .iter()
        .find(|e| (e.residual - value).abs() < threshold)
}

/// An ordered build sequence: apply step 0 to a bare 0R wire, then step 1 to
/// the result, and so on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RChain(Vec<RStep>);

impl RChain {
    /// Forward-applies every step starting from 0R and returns the resistance
    /// the chain realises. Pure; replaying twice gives identical results.
    pub fn replay(&self) -> f64 {
        self.0.iter().fold(0.0, |r, step| step.forward(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RStep> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RChain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sep = if f.alternate() { "\n" } else { ", " };
        write!(f, "{}", self.0.iter().map(|s| s.to_string()).join(sep))
    }
}

/// Outcome of a search: the build order, the resistance it realises, and
/// whether that hits the target exactly (within the configured threshold).
#[derive(Debug, Clone)]
pub struct RSolution {
    pub chain: RChain,
    pub resistance: f64,
    pub exact: bool,
}

/// The layered backward search engine. Borrows a pool, owns its random
/// source; reusable across targets within one process.
#[derive(Debug)]
pub struct RSearch<'p, R: Rng = StdRng> {
    pool: &'p RPool,
    config: SearchConfig,
    rng: R,
}

impl<'p> RSearch<'p, StdRng> {
    /// A search with an entropy-seeded shuffle, the normal mode of operation.
    pub fn new(pool: &'p RPool, config: SearchConfig) -> Self {
        Self::with_rng(pool, config, StdRng::from_entropy())
    }

    /// A search with a pinned shuffle seed, for reproducible runs.
    pub fn seeded(pool: &'p RPool, config: SearchConfig, seed: u64) -> Self {
        Self::with_rng(pool, config, StdRng::seed_from_u64(seed))
    }
}

impl<'p, R: Rng> RSearch<'p, R> {
    pub fn with_rng(pool: &'p RPool, config: SearchConfig, rng: R) -> Self {
        RSearch { pool, config, rng }
    }

    /// Runs the backward expansion and reconstructs the shortest chain found.
    ///
    /// Returns an approximate solution (`exact == false`) when no chain of at
    /// most `max_chain_length` steps lands on the target; the chain then
    /// realises the closest approach to the target reached within the depth
    /// bound, and its resistance is recomputed by forward replay from 0R.
    pub fn solve(&mut self, target: f64) -> Result<RSolution, Error> {
        if !target.is_finite() || target <= 0.0 {
            return Err(Error::InvalidTarget(target));
        }
        let threshold = self.config.error_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::InvalidThreshold(threshold));
        }
        if self.pool.is_empty() {
            return Err(Error::EmptyPool);
        }

        let (frontiers, found) = self.expand(target);
        Ok(reconstruct(&frontiers, found, threshold))
    }

    /// Expands frontiers layer by layer until a residual reaches zero or the
    /// depth bound is hit. Returns every frontier (layer 0 included) plus the
    /// solution flag observed at the stopping layer.
    fn expand(&mut self, target: f64) -> (Vec<Frontier>, bool) {
        let threshold = self.config.error_threshold;
        let mut frontiers = vec![vec![FrontierEntry {
            residual: target,
            via: None,
        }]];
        let mut found = target < threshold;

        while !found && frontiers.len() <= self.config.max_chain_length {
            let view = self.pool.shuffled(&mut self.rng);
            let mut next = Frontier::new();
            for entry in &frontiers[frontiers.len() - 1] {
                for step in &view {
                    match step.inverse(entry.residual) {
                        Some(v) if v >= threshold => {
                            push_unique(&mut next, threshold, v, *step);
                        }
                        Some(v) if v.abs() < threshold => {
                            push_unique(&mut next, threshold, v, *step);
                            found = true;
                        }
                        // Parallel singularity or overshoot past zero:
                        // unreachable via this step.
                        _ => {}
                    }
                }
            }
            if next.is_empty() {
                // No step makes progress from any residual; only possible
                // with degenerate user-supplied pools. Stop here so the last
                // recorded frontier stays non-empty.
                break;
            }
            debug!(
                layer = frontiers.len(),
                width = next.len(),
                found,
                "expanded frontier"
            );
            frontiers.push(next);
        }
        (frontiers, found)
    }
}

/// Walks the recorded layers from the best terminal residual back to the
/// target, emitting steps in forward build order as it goes.
fn reconstruct(frontiers: &[Frontier], found: bool, threshold: f64) -> RSolution {
    let last = frontiers.last().expect("layer 0 is always recorded");
    let anchor = last
        .iter()
        .min_by(|a, b| a.residual.total_cmp(&b.residual))
        .expect("recorded frontiers are never empty");

    let mut current = anchor.residual;
    let mut steps = Vec::with_capacity(frontiers.len() - 1);
    for layer in frontiers[1..].iter().rev() {
        let entry = find_near(layer, current, threshold)
            .expect("forward-applied residual is present in the previous frontier");
        let step = entry
            .via
            .expect("entries past layer 0 record their originating step");
        steps.push(step);
        current = step.forward(current);
    }

    let chain = RChain(steps);
    // An anchor that never reached zero is only an approximation target, so
    // the achieved resistance is recomputed from an actual 0R replay.
    let resistance = if found { current } else { chain.replay() };
    RSolution {
        chain,
        resistance,
        exact: found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::Mode;

    fn e6_search(seed: u64) -> RSearch<'static, StdRng> {
        use lazy_static::lazy_static;
        lazy_static! {
            static ref POOL: RPool = RPool::e6();
        }
        RSearch::seeded(&POOL, SearchConfig::default(), seed)
    }

    #[test]
    fn pool_value_is_found_in_one_step() {
        let solution = e6_search(1).solve(1000.0).unwrap();
        assert!(solution.exact);
        assert_eq!(solution.chain.len(), 1);
        assert_eq!(solution.resistance, 1000.0);
        let step = solution.chain.iter().next().unwrap();
        assert_eq!(step.mode(), Mode::Series);
        assert_eq!(step.value(), 1000.0);
    }

    #[test]
    fn off_series_value_needs_two_steps() {
        // 1010R is not a pool value but splits as 1K + 10R.
        let solution = e6_search(2).solve(1010.0).unwrap();
        assert!(solution.exact);
        assert_eq!(solution.chain.len(), 2);
        assert!((solution.chain.replay() - 1010.0).abs() < 1e-6);
    }

    #[test]
    fn exact_chain_replays_to_target() {
        for seed in 0..8 {
            let solution = e6_search(seed).solve(1500.0).unwrap();
            assert!(solution.exact, "seed {seed}");
            assert!(solution.chain.len() <= 3);
            assert!((solution.chain.replay() - 1500.0).abs() < 1e-6);
        }
    }

    #[test]
    fn unreachable_target_reports_approximation() {
        // The smallest pool value is 10R, so 0.5R cannot be reached by any
        // chain of three steps.
        let solution = e6_search(3).solve(0.5).unwrap();
        assert!(!solution.exact);
        assert!(!solution.chain.is_empty());
        assert!(solution.chain.len() <= 3);
        assert_eq!(solution.resistance, solution.chain.replay());
    }

    #[test]
    fn replay_is_idempotent() {
        let solution = e6_search(4).solve(0.5).unwrap();
        assert_eq!(solution.chain.replay(), solution.chain.replay());
    }

    #[test]
    fn zero_depth_yields_empty_chain() {
        let pool = RPool::e6();
        let config = SearchConfig {
            max_chain_length: 0,
            ..SearchConfig::default()
        };
        let solution = RSearch::seeded(&pool, config, 5).solve(220.0).unwrap();
        assert!(!solution.exact);
        assert!(solution.chain.is_empty());
        assert_eq!(solution.resistance, 0.0);
    }

    #[test]
    fn zero_depth_near_zero_target_is_exact() {
        let pool = RPool::e6();
        let config = SearchConfig {
            max_chain_length: 0,
            ..SearchConfig::default()
        };
        let solution = RSearch::seeded(&pool, config, 6).solve(1e-9).unwrap();
        assert!(solution.exact);
        assert!(solution.chain.is_empty());
        assert!(solution.resistance.abs() < 1e-6);
    }

    #[test]
    fn frontiers_stay_deduplicated_and_bounded() {
        let pool = RPool::e6();
        let mut search = RSearch::seeded(&pool, SearchConfig::default(), 7);
        let (frontiers, _) = search.expand(777.7);

        let threshold = SearchConfig::default().error_threshold;
        for pair in frontiers.windows(2) {
            assert!(pair[1].len() <= pool.len() * pair[0].len());
        }
        for frontier in &frontiers {
            for (i, a) in frontier.iter().enumerate() {
                for b in &frontier[i + 1..] {
                    assert!((a.residual - b.residual).abs() >= threshold);
                }
            }
        }
    }

    #[test]
    fn pinned_seed_is_deterministic() {
        let a = e6_search(8).solve(777.7).unwrap();
        let b = e6_search(8).solve(777.7).unwrap();
        assert_eq!(a.chain, b.chain);
        assert_eq!(a.resistance, b.resistance);
        assert_eq!(a.exact, b.exact);
    }

    #[test]
    fn invalid_configuration_fails_fast() {
        let pool = RPool::e6();
        let mut search = RSearch::seeded(&pool, SearchConfig::default(), 9);
        assert!(matches!(search.solve(-5.0), Err(Error::InvalidTarget(_))));
        assert!(matches!(search.solve(0.0), Err(Error::InvalidTarget(_))));

        let config = SearchConfig {
            error_threshold: 0.0,
            ..SearchConfig::default()
        };
        let mut search = RSearch::seeded(&pool, config, 9);
        assert!(matches!(
            search.solve(100.0),
            Err(Error::InvalidThreshold(_))
        ));
    }
}
