// SPDX-License-Identifier: MIT

use std::time::Duration;

/// Delays between dequeue attempts, shortest first.
pub const DEFAULT_DELAYS: [Duration; 5] = [
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_millis(1000),
    Duration::from_millis(2500),
    Duration::from_millis(5000),
];

/// Index into an ascending delay table.
///
/// An empty poll moves one step up the table and stays on the last entry
/// once it gets there; a successful poll goes back to the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    delays: Vec<Duration>,
    index: usize,
}

impl Backoff {
    /// An empty table means no delay at all.
    pub fn new(mut delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            delays.push(Duration::ZERO);
        }
        Self { delays, index: 0 }
    }

    pub fn from_millis(delays: &[u64]) -> Self {
        Self::new(delays.iter().copied().map(Duration::from_millis).collect())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Delay to sleep before the next dequeue attempt.
    pub fn current(&self) -> Duration {
        self.delays[self.index]
    }

    pub fn hit(&mut self) {
        self.index = 0;
    }

    pub fn miss(&mut self) {
        self.index = (self.index + 1).min(self.delays.len() - 1);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_DELAYS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misses_climb_and_clamp() {
        let mut backoff = Backoff::default();
        let mut seen = vec![backoff.current()];
        for _ in 0..8 {
            backoff.miss();
            seen.push(backoff.current());
        }

        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(seen.last(), Some(&Duration::from_secs(5)));
        assert_eq!(backoff.index(), DEFAULT_DELAYS.len() - 1);
    }

    #[test]
    fn test_hit_resets_to_minimum() {
        let mut backoff = Backoff::default();
        backoff.miss();
        backoff.miss();
        assert_eq!(backoff.current(), Duration::from_secs(1));

        backoff.hit();
        assert_eq!(backoff.index(), 0);
        assert_eq!(backoff.current(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_table_never_sleeps() {
        let mut backoff = Backoff::new(Vec::new());
        backoff.miss();
        assert_eq!(backoff.current(), Duration::ZERO);
    }
}
