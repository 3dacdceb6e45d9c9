//! The per-room draw sequencer.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::CallerError;

/// Largest pool a ticket layout can cover (nine bands of ten).
pub const MAX_POOL_SIZE: u8 = 90;

/// Numbers drawn so far: the draw order plus an O(1) membership set.
///
/// The two views are only ever updated together, so they cannot disagree.
#[derive(Debug, Clone, Default)]
pub struct CalledNumbers {
    sequence: Vec<u8>,
    members: HashSet<u8>,
}

impl CalledNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a draw. Returns `false` (and changes nothing) for a repeat.
    fn push(&mut self, number: u8) -> bool {
        if !self.members.insert(number) {
            return false;
        }
        self.sequence.push(number);
        true
    }

    /// Every number called, oldest first.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn contains(&self, number: u8) -> bool {
        self.members.contains(&number)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The most recent draw, if any.
    pub fn last(&self) -> Option<u8> {
        self.sequence.last().copied()
    }
}

/// The outcome of one successful draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub number: u8,
    /// 1-based position of this draw in the room's sequence.
    pub sequence: usize,
    /// Numbers still undrawn after this one.
    pub remaining: usize,
}

/// Draws numbers uniformly, without replacement, from `1..=pool_size`.
///
/// Pass a seed for a reproducible draw order (tests, replays); without one
/// the generator is seeded from the OS.
#[derive(Debug)]
pub struct NumberCaller {
    pool_size: u8,
    remaining: Vec<u8>,
    called: CalledNumbers,
    rng: StdRng,
}

impl NumberCaller {
    pub fn new(pool_size: u8, seed: Option<u64>) -> Result<Self, CallerError> {
        if pool_size == 0 || pool_size > MAX_POOL_SIZE {
            return Err(CallerError::InvalidPoolSize(pool_size));
        }
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            pool_size,
            remaining: (1..=pool_size).collect(),
            called: CalledNumbers::new(),
            rng,
        })
    }

    /// Draws the next number.
    ///
    /// # Errors
    /// [`CallerError::PoolExhausted`] once every number has been called.
    pub fn call_next(&mut self) -> Result<Draw, CallerError> {
        if self.remaining.is_empty() {
            return Err(CallerError::PoolExhausted {
                called: self.called.len(),
            });
        }
        let idx = self.rng.random_range(0..self.remaining.len());
        let number = self.remaining.swap_remove(idx);
        // `remaining` and `called` partition the pool, so this never repeats
        let fresh = self.called.push(number);
        debug_assert!(fresh, "number {number} drawn twice");

        tracing::trace!(number, remaining = self.remaining.len(), "number drawn");
        Ok(Draw {
            number,
            sequence: self.called.len(),
            remaining: self.remaining.len(),
        })
    }

    pub fn called(&self) -> &CalledNumbers {
        &self.called
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn pool_size(&self) -> u8 {
        self.pool_size
    }

    /// Returns `true` if `number` could ever be drawn from this pool.
    pub fn in_range(&self, number: u8) -> bool {
        (1..=self.pool_size).contains(&number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draws_every_number_exactly_once() {
        let mut caller = NumberCaller::new(90, Some(7)).unwrap();
        let mut seen = HashSet::new();
        for i in 1..=90 {
            let draw = caller.call_next().unwrap();
            assert!(caller.in_range(draw.number));
            assert!(seen.insert(draw.number), "duplicate {}", draw.number);
            assert_eq!(draw.sequence, i);
            assert_eq!(draw.remaining, 90 - i);
        }
        assert!(caller.is_exhausted());
        assert_eq!(caller.called().len(), 90);
    }

    #[test]
    fn test_exhausted_pool_errors_without_side_effects() {
        let mut caller = NumberCaller::new(3, Some(1)).unwrap();
        for _ in 0..3 {
            caller.call_next().unwrap();
        }
        assert_eq!(
            caller.call_next(),
            Err(CallerError::PoolExhausted { called: 3 })
        );
        assert_eq!(caller.called().len(), 3);
    }

    #[test]
    fn test_same_seed_same_order() {
        let mut a = NumberCaller::new(90, Some(42)).unwrap();
        let mut b = NumberCaller::new(90, Some(42)).unwrap();
        for _ in 0..20 {
            assert_eq!(a.call_next().unwrap(), b.call_next().unwrap());
        }
        assert_eq!(a.called().sequence(), b.called().sequence());
    }

    #[test]
    fn test_called_numbers_membership_tracks_sequence() {
        let mut caller = NumberCaller::new(90, Some(3)).unwrap();
        let first = caller.call_next().unwrap().number;
        assert!(caller.called().contains(first));
        assert_eq!(caller.called().last(), Some(first));
        let never = (1..=90u8).find(|n| !caller.called().contains(*n)).unwrap();
        assert!(!caller.called().contains(never));
    }

    #[test]
    fn test_invalid_pool_sizes_rejected() {
        assert!(matches!(
            NumberCaller::new(0, None),
            Err(CallerError::InvalidPoolSize(0))
        ));
        assert!(matches!(
            NumberCaller::new(91, None),
            Err(CallerError::InvalidPoolSize(91))
        ));
        assert!(!NumberCaller::new(90, None).unwrap().in_range(0));
    }

    #[test]
    fn test_duplicate_push_is_ignored() {
        let mut called = CalledNumbers::new();
        assert!(called.push(5));
        assert!(!called.push(5));
        assert_eq!(called.sequence(), &[5]);
    }
}
