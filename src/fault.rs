//! Deterministic and seeded fault schedules.
//!
//! A [`FaultPolicy`] maps the 1-based number of a datagram to a [`Fault`].
//! The receiver consults one for every inbound datagram, and the
//! [`crate::simulator::Simulator`] consults one for every outbound datagram,
//! so tests can substitute any schedule without a real lossy network.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What happens to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Deliver normally.
    #[default]
    Pass,
    /// Treat as lost.
    Drop,
    /// Treat as damaged in transit.
    Corrupt,
}

/// A schedule of faults, indexed by datagram number (starting at 1).
pub trait FaultPolicy: Send {
    fn decide(&mut self, attempt: u64) -> Fault;
}

impl<F> FaultPolicy for F
where
    F: FnMut(u64) -> Fault + Send,
{
    fn decide(&mut self, attempt: u64) -> Fault {
        self(attempt)
    }
}

/// Every datagram passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultPolicy for NoFaults {
    fn decide(&mut self, _attempt: u64) -> Fault {
        Fault::Pass
    }
}

/// Counter-modulo schedule.
///
/// Every `drop_every`-th datagram is lost; every `corrupt_every`-th datagram
/// that is not also lost is corrupted.  `None` disables either rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EveryNth {
    pub drop_every: Option<u64>,
    pub corrupt_every: Option<u64>,
}

impl EveryNth {
    /// Drop every 6th datagram and corrupt every 3rd.
    pub const REFERENCE: Self = Self {
        drop_every: Some(6),
        corrupt_every: Some(3),
    };

    pub fn new(drop_every: Option<u64>, corrupt_every: Option<u64>) -> Self {
        // A zero modulus would divide by zero; treat it as "disabled".
        Self {
            drop_every: drop_every.filter(|n| *n > 0),
            corrupt_every: corrupt_every.filter(|n| *n > 0),
        }
    }
}

impl Default for EveryNth {
    fn default() -> Self {
        Self::REFERENCE
    }
}

impl FaultPolicy for EveryNth {
    fn decide(&mut self, attempt: u64) -> Fault {
        let hits = |every: Option<u64>| every.is_some_and(|n| n > 0 && attempt % n == 0);
        if hits(self.drop_every) {
            Fault::Drop
        } else if hits(self.corrupt_every) {
            Fault::Corrupt
        } else {
            Fault::Pass
        }
    }
}

/// An explicit list of faults for the first datagrams, then [`Fault::Pass`].
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    faults: VecDeque<Fault>,
}

impl Schedule {
    pub fn new(faults: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            faults: faults.into_iter().collect(),
        }
    }
}

impl FaultPolicy for Schedule {
    fn decide(&mut self, _attempt: u64) -> Fault {
        self.faults.pop_front().unwrap_or_default()
    }
}

/// Independent per-datagram loss and corruption, drawn from a seeded RNG so
/// failing runs can be replayed.
#[derive(Debug, Clone)]
pub struct RandomFaults {
    loss_rate: f64,
    corrupt_rate: f64,
    rng: StdRng,
}

impl RandomFaults {
    /// Rates are clamped to `[0.0, 1.0]`; a NaN or infinite rate means 0.
    pub fn new(seed: u64, loss_rate: f64, corrupt_rate: f64) -> Self {
        Self {
            loss_rate: probability(loss_rate),
            corrupt_rate: probability(corrupt_rate),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Probability that a datagram is lost.
    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// Probability that a surviving datagram is corrupted.
    pub fn corrupt_rate(&self) -> f64 {
        self.corrupt_rate
    }
}

fn probability(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl FaultPolicy for RandomFaults {
    fn decide(&mut self, _attempt: u64) -> Fault {
        if self.rng.gen_bool(self.loss_rate) {
            Fault::Drop
        } else if self.rng.gen_bool(self.corrupt_rate) {
            Fault::Corrupt
        } else {
            Fault::Pass
        }
    }
}
