use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Hands out one named ChaCha stream per consumer, all derived from a single
/// scenario seed. A stream's seed is taken from the master generator the
/// first time its name is requested, so the request order is part of the
/// reproducible behaviour.
pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let master = &mut self.master;
        let entry = self.streams.entry(name.to_string()).or_insert_with(|| {
            let mut seed_bytes = [0u8; 32];
            master.fill_bytes(&mut seed_bytes);
            ChaCha8Rng::from_seed(seed_bytes)
        });
        SystemRng { inner: entry }
    }
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for SystemRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RngManager::new(42);
        let mut b = RngManager::new(42);
        let x: u64 = a.stream("aging").gen();
        let y: u64 = b.stream("aging").gen();
        assert_eq!(x, y);
    }

    #[test]
    fn streams_are_independent_and_persistent() {
        let mut rng = RngManager::new(42);
        let first: u64 = rng.stream("reproduction").gen();
        let other: u64 = rng.stream("aging").gen();
        let second: u64 = rng.stream("reproduction").gen();
        assert_ne!(first, other);
        assert_ne!(first, second, "a stream continues where it left off");
    }

    #[test]
    fn request_order_defines_stream_seeds() {
        let mut forward = RngManager::new(9);
        let a1: u64 = forward.stream("a").gen();
        let b1: u64 = forward.stream("b").gen();

        let mut reversed = RngManager::new(9);
        let b2: u64 = reversed.stream("b").gen();
        let a2: u64 = reversed.stream("a").gen();

        assert_eq!(a1, b2);
        assert_eq!(b1, a2);
    }
}
