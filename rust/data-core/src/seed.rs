// rust/data-core/src/seed.rs

//! Deterministic seed derivation for mapped transformation stages.
//!
//! A [`SeedSequencer`] holds a stack of scopes. Each scope carries an
//! optional base offset; while a base is set, every call to
//! [`SeedSequencer::next_seeds`] hands out consecutive, non-overlapping seed
//! pairs and advances the base. Without a base every caller receives
//! [`Seed::Unspecified`] and nothing advances, so stages stay
//! non-deterministic unless a pipeline opts in.
//!
//! # Example
//!
//! ```
//! use data_core::seed::{Seed, SeedSequencer};
//!
//! let sequencer = SeedSequencer::new();
//! {
//!     let _scope = sequencer.enter_scope(Some(5));
//!     assert_eq!(sequencer.next_seeds(1).unwrap(), vec![Seed::Pair(5, 6)]);
//! }
//! assert_eq!(sequencer.next_seeds(1).unwrap(), vec![Seed::Unspecified]);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{DataError, Result};

/// Random-generation key handed to one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seed {
    /// No deterministic seed; consumers fall back to entropy.
    Unspecified,
    Pair(i32, i32),
}

impl Seed {
    pub fn pair(&self) -> Option<(i32, i32)> {
        match *self {
            Seed::Pair(a, b) => Some((a, b)),
            Seed::Unspecified => None,
        }
    }

    /// Packs both components into a single `u64` for seeding an RNG.
    pub fn to_u64(&self) -> Option<u64> {
        self.pair()
            .map(|(a, b)| (u64::from(a as u32) << 32) | u64::from(b as u32))
    }
}

/// Builds `count` seed pairs starting at `base`.
///
/// Pair `i` is `(base + 2i, base + 2i + 1)`. Returns the pairs together with
/// the base the next block should start from.
pub fn seed_block(base: i64, count: usize) -> Result<(Vec<Seed>, i64)> {
    let out_of_range = || DataError::SeedRange { base, count };

    let span = i64::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(2))
        .ok_or_else(out_of_range)?;
    let next = base.checked_add(span).ok_or_else(out_of_range)?;

    let seeds = (0..span)
        .step_by(2)
        .map(|offset| {
            let first = i32::try_from(base + offset).map_err(|_| out_of_range())?;
            let second = i32::try_from(base + offset + 1).map_err(|_| out_of_range())?;
            Ok(Seed::Pair(first, second))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((seeds, next))
}

/// Scoped, stack-disciplined source of seed pairs.
///
/// All state sits behind one mutex, so seed derivation for concurrently
/// constructed stages is serialized and never hands out overlapping pairs.
#[derive(Debug, Default)]
pub struct SeedSequencer {
    // One entry per open scope; `None` marks a non-deterministic scope.
    frames: Mutex<Vec<Option<i64>>>,
}

impl SeedSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a scope with the given base seed.
    ///
    /// The previous base is restored when the returned guard is dropped,
    /// including when the enclosed work returns early or panics.
    pub fn enter_scope(&self, initial_seed: Option<i32>) -> ScopeGuard<'_> {
        let mut frames = self.frames_recovering();
        let depth = frames.len();
        frames.push(initial_seed.map(i64::from));
        ScopeGuard {
            sequencer: self,
            depth,
        }
    }

    /// Explicit form of dropping the guard.
    pub fn exit_scope(&self, guard: ScopeGuard<'_>) {
        debug_assert!(std::ptr::eq(guard.sequencer, self));
        drop(guard);
    }

    /// Runs `f` inside a scope seeded with `initial_seed`.
    pub fn seed_scope<T>(&self, initial_seed: Option<i32>, f: impl FnOnce() -> T) -> T {
        let _scope = self.enter_scope(initial_seed);
        f()
    }

    /// Returns the next `count` seed pairs of the active scope.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `count` is zero, `SeedRange` when
    /// the block would leave the 32-bit range, and `ConcurrencyViolation`
    /// when a previous holder of the lock panicked.
    pub fn next_seeds(&self, count: usize) -> Result<Vec<Seed>> {
        if count == 0 {
            return Err(DataError::config("next_seeds requires count >= 1"));
        }

        let mut frames = self
            .frames
            .lock()
            .map_err(|_| DataError::concurrency("seed sequencer lock poisoned"))?;

        match frames.last_mut() {
            Some(Some(base)) => {
                let (seeds, next) = seed_block(*base, count)?;
                *base = next;
                Ok(seeds)
            }
            _ => Ok(vec![Seed::Unspecified; count]),
        }
    }

    /// Base the next seed block would start from, if the active scope has one.
    pub fn current_base(&self) -> Option<i64> {
        self.frames_recovering().last().copied().flatten()
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.frames_recovering().len()
    }

    // Frame pushes and truncations cannot leave the stack half-updated, so a
    // poisoned lock still guards consistent data.
    fn frames_recovering(&self) -> MutexGuard<'_, Vec<Option<i64>>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Open seed scope. Dropping it restores the enclosing scope.
#[must_use = "the scope closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    sequencer: &'a SeedSequencer,
    depth: usize,
}

impl ScopeGuard<'_> {
    pub fn exit(self) {}
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.sequencer.frames_recovering().truncate(self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(seeds: &[Seed]) -> Vec<i32> {
        seeds
            .iter()
            .flat_map(|s| {
                let (a, b) = s.pair().unwrap();
                [a, b]
            })
            .collect()
    }

    #[test]
    fn test_consecutive_blocks_are_contiguous_and_disjoint() {
        for (s0, n1, n2) in [(0, 1, 1), (42, 3, 2), (-10, 4, 7), (1_000, 1, 5)] {
            let sequencer = SeedSequencer::new();
            let _scope = sequencer.enter_scope(Some(s0));

            let first = sequencer.next_seeds(n1).unwrap();
            let second = sequencer.next_seeds(n2).unwrap();

            let expected_first: Vec<i32> = (s0..s0 + 2 * n1 as i32).collect();
            let expected_second: Vec<i32> =
                (s0 + 2 * n1 as i32..s0 + 2 * (n1 + n2) as i32).collect();
            assert_eq!(components(&first), expected_first);
            assert_eq!(components(&second), expected_second);
        }
    }

    #[test]
    fn test_no_scope_returns_sentinel_without_advancing() {
        let sequencer = SeedSequencer::new();
        for _ in 0..5 {
            assert_eq!(
                sequencer.next_seeds(3).unwrap(),
                vec![Seed::Unspecified; 3]
            );
        }
        assert_eq!(sequencer.current_base(), None);
    }

    #[test]
    fn test_unset_scope_returns_sentinel() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(None);
        assert_eq!(sequencer.next_seeds(2).unwrap(), vec![Seed::Unspecified; 2]);
        assert_eq!(sequencer.current_base(), None);
    }

    #[test]
    fn test_nested_scope_resumes_outer_counter() {
        let sequencer = SeedSequencer::new();
        let outer = sequencer.enter_scope(Some(5));
        assert_eq!(sequencer.next_seeds(1).unwrap(), vec![Seed::Pair(5, 6)]);

        let inner = sequencer.enter_scope(Some(100));
        assert_eq!(sequencer.next_seeds(1).unwrap(), vec![Seed::Pair(100, 101)]);
        sequencer.exit_scope(inner);

        assert_eq!(sequencer.next_seeds(1).unwrap(), vec![Seed::Pair(7, 8)]);
        outer.exit();
        assert_eq!(sequencer.depth(), 0);
    }

    #[test]
    fn test_scope_restored_after_early_return() {
        fn failing_stage(sequencer: &SeedSequencer) -> Result<()> {
            let _scope = sequencer.enter_scope(Some(50));
            sequencer.next_seeds(1)?;
            Err(DataError::config("stage failed"))
        }

        let sequencer = SeedSequencer::new();
        let _outer = sequencer.enter_scope(Some(0));
        assert!(failing_stage(&sequencer).is_err());
        assert_eq!(sequencer.current_base(), Some(0));
        assert_eq!(sequencer.depth(), 1);
    }

    #[test]
    fn test_scope_restored_after_panic() {
        let sequencer = SeedSequencer::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sequencer.seed_scope(Some(9), || panic!("stage exploded"))
        }));
        assert!(result.is_err());
        assert_eq!(sequencer.depth(), 0);
        assert_eq!(sequencer.next_seeds(1).unwrap(), vec![Seed::Unspecified]);
    }

    #[test]
    fn test_zero_count_rejected() {
        let sequencer = SeedSequencer::new();
        assert!(matches!(
            sequencer.next_seeds(0),
            Err(DataError::Config { .. })
        ));
    }

    #[test]
    fn test_seed_block_overflow() {
        let result = seed_block(i64::from(i32::MAX) - 1, 2);
        assert!(matches!(result, Err(DataError::SeedRange { count: 2, .. })));

        // The last representable pair is still handed out.
        let (seeds, next) = seed_block(i64::from(i32::MAX) - 1, 1).unwrap();
        assert_eq!(seeds, vec![Seed::Pair(i32::MAX - 1, i32::MAX)]);
        assert_eq!(next, i64::from(i32::MAX) + 1);
    }

    #[test]
    fn test_concurrent_derivation_never_overlaps() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(0));

        let mut all: Vec<i32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| components(&sequencer.next_seeds(3).unwrap())))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        all.sort_unstable();
        assert_eq!(all, (0..48).collect::<Vec<_>>());
    }

    #[test]
    fn test_seed_to_u64() {
        assert_eq!(Seed::Pair(1, 2).to_u64(), Some((1u64 << 32) | 2));
        assert_eq!(Seed::Pair(-1, 0).to_u64(), Some(0xFFFF_FFFF_0000_0000));
        assert_eq!(Seed::Unspecified.to_u64(), None);
    }
}
