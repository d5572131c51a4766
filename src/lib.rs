//! A resistor chain designer for circuit design.
//!
//! Given a target resistance, it searches for the shortest chain of series and
//! parallel combination steps, drawn from standard series values, that builds
//! the target starting from a bare 0R wire. The search works backward from the
//! target toward zero, one component per layer, deduplicating residual values
//! as it goes, and then reconstructs the forward build order.
//!
//! # Example
//! ```
//! use resistor_chain::{RPool, RSearch, SearchConfig};
//!
//! let pool = RPool::e6();
//! let mut search = RSearch::seeded(&pool, SearchConfig::default(), 7);
//!
//! let solution = search.solve(1500.0).unwrap();
//!
//! assert!(solution.exact);
//! assert!((solution.chain.replay() - 1500.0).abs() < 1e-6);
//! println!("{:#}", solution.chain);
//! ```
//! Running this example prints a build order such as:
//! ```text
//! series 1K5
//! ```
//! With a different seed an equally short but differently composed chain may
//! win instead; pin the seed when you need reproducible output.

use std::fmt;

use itertools::Itertools;
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

mod search;

pub use search::{RChain, RSearch, RSolution, SearchConfig};

/// Decade scale factors applied to every base value in the reference pool.
pub const DECADES: &[f64] = &[1e1, 1e3, 1e5];

lazy_static! {
    /// Single-decade base values for the E6 standard series.
    pub static ref E6: Vec<f64> = vec![1.0, 1.5, 2.2, 3.3, 4.7, 6.8];
    /// Single-decade base values for the E12 standard series.
    pub static ref E12: Vec<f64> = extend(&E6, &[1.2, 1.8, 2.7, 3.9, 5.6, 8.2]);
    /// Single-decade base values for the E24 standard series.
    pub static ref E24: Vec<f64> = extend(
        &E12,
        &[1.1, 1.3, 1.6, 2.0, 2.4, 3.0, 3.6, 4.3, 5.1, 6.2, 7.5, 9.1]
    );
}

fn extend(base: &[f64], add: &[f64]) -> Vec<f64> {
    base.iter().chain(add.iter()).cloned().collect()
}

/// Configuration errors surfaced before a search starts. Arithmetic edge
/// cases inside the search are modelled as data, never as errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("target resistance must be positive, got {0}")]
    InvalidTarget(f64),
    #[error("error threshold must be positive, got {0}")]
    InvalidThreshold(f64),
    #[error("candidate pool contains no steps")]
    EmptyPool,
}

/// How a step combines its resistor with the chain built so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Series,
    Parallel,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Series => write!(f, "series"),
            Mode::Parallel => write!(f, "parallel"),
        }
    }
}

/// One build step: a single resistor of a fixed value, combined in series or
/// in parallel with whatever has been built so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RStep {
    mode: Mode,
    value: f64,
}

impl RStep {
    pub fn new(mode: Mode, value: f64) -> Self {
        RStep { mode, value }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Resistance after combining this step's resistor with a chain of
    /// resistance `r`.
    pub fn forward(&self, r: f64) -> f64 {
        match self.mode {
            Mode::Series => r + self.value,
            Mode::Parallel => r * self.value / (r + self.value),
        }
    }

    /// Resistance the chain must have had before this step, if the combined
    /// result is `r`. Exact inverse of [`forward`](RStep::forward), except at
    /// the parallel singularity `r == value`, where no prior resistance can
    /// produce `r` and `None` is returned.
    pub fn inverse(&self, r: f64) -> Option<f64> {
        match self.mode {
            Mode::Series => Some(r - self.value),
            Mode::Parallel => {
                let denom = self.value - r;
                if denom == 0.0 {
                    None
                } else {
                    Some(r * self.value / denom)
                }
            }
        }
    }
}

impl fmt::Display for RStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.mode, print_r(self.value))
    }
}

fn format_rval(r: f64, unit: &str) -> String {
    let mut val = format!("{}", r);
    if val.contains('.') {
        val.replace('.', unit)
    } else {
        val.push_str(unit);
        val
    }
}

/// Renders a resistance in the usual R/K/M suffix notation, e.g. `4700.0`
/// becomes `4K7`.
pub fn print_r(r: f64) -> String {
    if r < 1000.0 {
        format_rval(r, "R")
    } else if r < 1_000_000.0 {
        format_rval(r / 1000.0, "K")
    } else {
        format_rval(r / 1_000_000.0, "M")
    }
}

/// The fixed pool of candidate build steps: every base value, at every decade
/// scale, in both combination modes. Built once per run and read-only after
/// that; only the iteration order handed to the search is randomized.
#[derive(Debug, Clone)]
pub struct RPool {
    steps: Box<[RStep]>,
}

impl RPool {
    /// Builds the cross product of `bases` × `scales` × {series, parallel}.
    pub fn new(bases: &[f64], scales: &[f64]) -> Result<Self, Error> {
        let steps: Vec<RStep> = bases
            .iter()
            .cartesian_product(scales.iter())
            .flat_map(|(base, scale)| {
                let value = base * scale;
                [
                    RStep::new(Mode::Series, value),
                    RStep::new(Mode::Parallel, value),
                ]
            })
            .collect();
        if steps.is_empty() {
            return Err(Error::EmptyPool);
        }
        Ok(RPool {
            steps: steps.into_boxed_slice(),
        })
    }

    /// The reference pool: E6 base values over the default decades, 36 steps.
    pub fn e6() -> Self {
        RPool::new(&E6, DECADES).expect("E6 domains are non-empty")
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RStep> {
        self.steps.iter()
    }

    /// A fresh randomized permutation of the pool. The search consumes one
    /// per layer: when several steps collapse onto the same deduplicated
    /// residual, shuffle order decides which one is kept, so equally short
    /// chains can differ between runs.
    pub fn shuffled<R: Rng>(&self, rng: &mut R) -> Vec<RStep> {
        let mut view = self.steps.to_vec();
        view.shuffle(rng);
        view
    }
}
