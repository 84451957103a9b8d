//! Per-scenario randomness for the execution overlay.
//!
//! Only the friction draws are random; the strategy-level simulation is
//! not. Each scenario is keyed by the strategy's run id, the token it trades
//! and its iteration number, and gets its own generator seeded from that key
//! and the sweep's master seed. Workers therefore never share a stream, and
//! a scenario draws the same fills whether it runs first, last or alone.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::RunId;

const SEED_CONTEXT: &str = "simlab 2024 scenario friction seed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Seed for one scenario. The token is length-prefixed so no
    /// `(token, iteration)` pair can alias another.
    pub fn sub_seed(&self, run_id: &RunId, token: &str, iteration: u64) -> u64 {
        let mut key = blake3::Hasher::new_derive_key(SEED_CONTEXT);
        key.update(&self.master_seed.to_le_bytes())
            .update(&run_id.0)
            .update(&(token.len() as u64).to_le_bytes())
            .update(token.as_bytes())
            .update(&iteration.to_le_bytes());
        let mut seed = [0u8; 8];
        key.finalize_xof().fill(&mut seed);
        u64::from_le_bytes(seed)
    }

    pub fn rng_for(&self, run_id: &RunId, token: &str, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(run_id, token, iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn strategy_run() -> RunId {
        RunId::from_bytes(b"ema_cross@3f9a")
    }

    #[test]
    fn every_key_component_moves_the_seed() {
        let h = RngHierarchy::new(42);
        let run = strategy_run();
        let base = h.sub_seed(&run, "BONK", 0);
        assert_eq!(base, h.sub_seed(&run, "BONK", 0));
        assert_ne!(base, h.sub_seed(&run, "WIF", 0));
        assert_ne!(base, h.sub_seed(&run, "BONK", 1));
        assert_ne!(base, RngHierarchy::new(43).sub_seed(&run, "BONK", 0));
        assert_ne!(base, h.sub_seed(&RunId::from_bytes(b"dip_buyer@77c0"), "BONK", 0));
    }

    #[test]
    fn token_boundary_is_unambiguous() {
        let h = RngHierarchy::new(1);
        let run = strategy_run();
        assert_ne!(h.sub_seed(&run, "AB", 0), h.sub_seed(&run, "A", u64::from(b'B')));
    }

    #[test]
    fn seeds_ignore_scenario_order() {
        let h = RngHierarchy::new(7);
        let run = strategy_run();
        let forward: Vec<u64> = (0..4).map(|i| h.sub_seed(&run, "SOL", i)).collect();
        let mut backward: Vec<u64> = (0..4).rev().map(|i| h.sub_seed(&run, "SOL", i)).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn scenario_generator_replays() {
        let h = RngHierarchy::new(1);
        let run = strategy_run();
        let mut a = h.rng_for(&run, "SOL", 3);
        let mut b = h.rng_for(&run, "SOL", 3);
        let draws_a: Vec<f64> = (0..7).map(|_| a.gen()).collect();
        let draws_b: Vec<f64> = (0..7).map(|_| b.gen()).collect();
        assert_eq!(draws_a, draws_b);
    }
}
