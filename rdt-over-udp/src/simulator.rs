//! Fault-injecting network layer.
//!
//! Real networks drop and damage packets.  To exercise the reliability
//! mechanisms without depending on actual network conditions, [`Simulator`]
//! wraps any [`Transport`] and intercepts outgoing datagrams, applying a
//! configurable fault model:
//!
//! | Fault         | Description                                            |
//! |---------------|--------------------------------------------------------|
//! | Packet loss   | Drop a datagram with probability `loss_rate`.          |
//! | Corruption    | Flip one random bit with probability `corrupt_rate`.   |
//! | Periodic      | Corrupt every `corrupt_every`-th datagram.             |
//! | Scripted      | Drop or corrupt the datagram with a given send index.  |
//!
//! Scripted faults take precedence over periodic ones, which take precedence
//! over random ones.  The RNG is seeded so failures are reproducible.
//! Reordering and duplication are never simulated: the protocol relies on an
//! ordered, duplicate-free channel.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::TransportError;
use crate::transport::Transport;

/// What to do to one outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Drop,
    Corrupt,
}

/// Configuration for the fault-injection model.
///
/// Probabilities are clamped to `[0.0, 1.0]`; a non-finite rate disables
/// that fault.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that any given datagram has one bit flipped.
    pub corrupt_rate: f64,
    /// Corrupt every Nth datagram (1-based), if set.
    pub corrupt_every: Option<u64>,
    /// Seed for the fault RNG.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            corrupt_every: None,
            seed: 0,
        }
    }
}

/// Counters for what the simulator did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    /// Datagrams handed to `send`, including the ones that were dropped.
    pub sent: u64,
    pub dropped: u64,
    pub corrupted: u64,
}

/// A fault-injecting wrapper around another transport.
#[derive(Debug)]
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    rng: StdRng,
    script: HashMap<u64, Fault>,
    stats: SimulatorStats,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, mut config: SimulatorConfig) -> Self {
        config.loss_rate = probability(config.loss_rate);
        config.corrupt_rate = probability(config.corrupt_rate);
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng,
            script: HashMap::new(),
            stats: SimulatorStats::default(),
        }
    }

    /// A simulator that injects nothing until faults are scripted.
    pub fn passthrough(inner: T) -> Self {
        Self::new(inner, SimulatorConfig::default())
    }

    /// Apply `fault` to the outgoing datagram with 0-based send index `index`.
    pub fn with_fault(mut self, index: u64, fault: Fault) -> Self {
        self.script.insert(index, fault);
        self
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    fn pick_fault(&mut self, index: u64) -> Option<Fault> {
        if let Some(fault) = self.script.remove(&index) {
            return Some(fault);
        }
        if let Some(n) = self.config.corrupt_every.filter(|n| *n > 0) {
            if (index + 1) % n == 0 {
                return Some(Fault::Corrupt);
            }
        }
        if self.rng.random_bool(self.config.loss_rate) {
            return Some(Fault::Drop);
        }
        if self.rng.random_bool(self.config.corrupt_rate) {
            return Some(Fault::Corrupt);
        }
        None
    }
}

/// Clamp into `[0.0, 1.0]`; NaN and infinities mean "never".
fn probability(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl<T: Transport> Transport for Simulator<T> {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        let index = self.stats.sent;
        self.stats.sent += 1;

        match self.pick_fault(index) {
            Some(Fault::Drop) => {
                self.stats.dropped += 1;
                log::debug!("[sim] drop #{index} ({} bytes)", datagram.len());
                Ok(())
            }
            Some(Fault::Corrupt) if !datagram.is_empty() => {
                self.stats.corrupted += 1;
                let mut damaged = datagram.to_vec();
                let bit = self.rng.random_range(0..damaged.len() * 8);
                damaged[bit / 8] ^= 1 << (bit % 8);
                log::debug!("[sim] corrupt #{index} (bit {bit})");
                self.inner.send(&damaged).await
            }
            _ => self.inner.send(datagram).await,
        }
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        self.inner.recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryLink;

    #[tokio::test]
    async fn scripted_drop_skips_exactly_that_datagram() {
        let (a, mut b) = MemoryLink::pair();
        let mut sim = Simulator::passthrough(a).with_fault(1, Fault::Drop);

        let msgs: [&[u8]; 3] = [b"one", b"two", b"three"];
        for msg in msgs {
            sim.send(msg).await.unwrap();
        }

        assert_eq!(b.recv().await.unwrap(), b"one");
        assert_eq!(b.recv().await.unwrap(), b"three");
        assert_eq!(sim.stats().dropped, 1);
        assert_eq!(sim.stats().sent, 3);
    }

    #[tokio::test]
    async fn corruption_flips_exactly_one_bit() {
        let (a, mut b) = MemoryLink::pair();
        let mut sim = Simulator::passthrough(a).with_fault(0, Fault::Corrupt);

        sim.send(&[0u8; 16]).await.unwrap();
        let got = b.recv().await.unwrap();
        let flipped: u32 = got.iter().map(|b| b.count_ones()).sum();
        assert_eq!(flipped, 1);
    }

    #[tokio::test]
    async fn corrupt_every_nth() {
        let (a, mut b) = MemoryLink::pair();
        let config = SimulatorConfig {
            corrupt_every: Some(3),
            ..Default::default()
        };
        let mut sim = Simulator::new(a, config);

        for _ in 0..9 {
            sim.send(&[0u8; 4]).await.unwrap();
        }
        let mut damaged = Vec::new();
        for i in 0..9 {
            if b.recv().await.unwrap() != [0u8; 4] {
                damaged.push(i);
            }
        }
        assert_eq!(damaged, vec![2, 5, 8]);
    }

    #[tokio::test]
    async fn same_seed_same_losses() {
        let config = SimulatorConfig {
            loss_rate: 0.5,
            seed: 7,
            ..Default::default()
        };
        let mut runs = Vec::new();
        for _ in 0..2 {
            let (a, _b) = MemoryLink::pair();
            let mut sim = Simulator::new(a, config.clone());
            for _ in 0..64 {
                sim.send(b"x").await.unwrap();
            }
            runs.push(sim.stats());
        }
        assert_eq!(runs[0], runs[1]);
        assert!(runs[0].dropped > 0 && runs[0].dropped < 64);
    }

    #[tokio::test]
    async fn non_finite_rates_inject_nothing() {
        let (a, mut b) = MemoryLink::pair();
        let config = SimulatorConfig {
            loss_rate: f64::NAN,
            corrupt_rate: f64::INFINITY,
            ..Default::default()
        };
        let mut sim = Simulator::new(a, config);

        for _ in 0..8 {
            sim.send(b"x").await.unwrap();
        }
        for _ in 0..8 {
            assert_eq!(b.recv().await.unwrap(), b"x");
        }
        assert_eq!(sim.stats().dropped, 0);
        assert_eq!(sim.stats().corrupted, 0);
    }
}
