// rust/data-core/src/stage.rs

//! Per-element mapping stages with optional deterministic seeding.
//!
//! A [`MapStage`] wraps a pure element transformation. Stages that declare
//! seeds draw them from a [`SeedSequencer`] once per invocation of
//! [`MapStage::apply`] (not once per element), so a pipeline built inside a
//! seed scope is reproducible no matter how many elements flow through it.
//!
//! # Example
//!
//! ```
//! use data_core::seed::{Seed, SeedSequencer};
//! use data_core::stage::MapStage;
//!
//! let sequencer = SeedSequencer::new();
//! let tag = MapStage::with_seed(|x: u32, prefix: &String, seed: Seed| {
//!     format!("{prefix}{x}:{:?}", seed.pair())
//! });
//!
//! let _scope = sequencer.enter_scope(Some(0));
//! let out: Vec<String> = tag
//!     .apply(&sequencer, vec![1, 2], "ex".to_string())
//!     .unwrap()
//!     .collect();
//! assert_eq!(out, vec!["ex1:Some((0, 1))", "ex2:Some((0, 1))"]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{DataError, Result};
use crate::seed::{Seed, SeedSequencer};

type StageFn<T, A, U> = dyn Fn(T, &A, &[Seed]) -> U + Send + Sync;

/// A transformation applied independently to every element of a sequence.
pub struct MapStage<T, A, U> {
    num_seeds: usize,
    func: Arc<StageFn<T, A, U>>,
}

impl<T: 'static, A: 'static, U: 'static> MapStage<T, A, U> {
    /// Stage that needs no randomness.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T, &A) -> U + Send + Sync + 'static,
    {
        Self {
            num_seeds: 0,
            func: Arc::new(move |x: T, args: &A, _: &[Seed]| f(x, args)),
        }
    }

    /// Stage that receives one seed pair per invocation.
    pub fn with_seed<F>(f: F) -> Self
    where
        F: Fn(T, &A, Seed) -> U + Send + Sync + 'static,
    {
        Self {
            num_seeds: 1,
            func: Arc::new(move |x: T, args: &A, seeds: &[Seed]| f(x, args, seeds[0])),
        }
    }

    /// Stage that receives `num_seeds` seed pairs per invocation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `num_seeds` is zero.
    pub fn with_seeds<F>(num_seeds: usize, f: F) -> Result<Self>
    where
        F: Fn(T, &A, &[Seed]) -> U + Send + Sync + 'static,
    {
        if num_seeds == 0 {
            return Err(DataError::config(
                "with_seeds requires num_seeds >= 1; use MapStage::new for unseeded stages",
            ));
        }
        Ok(Self {
            num_seeds,
            func: Arc::new(f),
        })
    }
}

impl<T, A, U> MapStage<T, A, U> {
    pub fn num_seeds(&self) -> usize {
        self.num_seeds
    }

    /// Maps the stage over `input`, lazily and in input order.
    ///
    /// Seeds are drawn once, before any element is processed, and the
    /// active scope advances by `2 * num_seeds` even for empty input.
    ///
    /// # Errors
    ///
    /// Propagates seed derivation errors from the sequencer.
    pub fn apply<I>(
        &self,
        sequencer: &SeedSequencer,
        input: I,
        args: A,
    ) -> Result<Mapped<I::IntoIter, T, A, U>>
    where
        I: IntoIterator<Item = T>,
    {
        let seeds = self.draw_seeds(sequencer)?;
        Ok(Mapped {
            inner: input.into_iter(),
            func: Arc::clone(&self.func),
            args,
            seeds,
        })
    }

    /// Maps the stage over `input` on up to `workers` threads.
    ///
    /// Elements are split into contiguous chunks; the output preserves input
    /// order. Seeds are derived once on the calling thread before any worker
    /// starts.
    ///
    /// # Errors
    ///
    /// Propagates seed derivation errors, and reports a worker panic as a
    /// concurrency violation.
    pub fn apply_parallel(
        &self,
        sequencer: &SeedSequencer,
        input: Vec<T>,
        args: A,
        workers: usize,
    ) -> Result<Vec<U>>
    where
        T: Send,
        A: Sync,
        U: Send,
    {
        let seeds = self.draw_seeds(sequencer)?;
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let workers = workers.clamp(1, input.len());
        let chunk_size = input.len().div_ceil(workers);

        let mut chunks: Vec<Vec<T>> = Vec::with_capacity(workers);
        let mut remaining = input.into_iter();
        loop {
            let chunk: Vec<T> = remaining.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunks.push(chunk);
        }

        let func: &StageFn<T, A, U> = &*self.func;
        let args = &args;
        let seeds = seeds.as_slice();

        let outputs = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|chunk| {
                    s.spawn(move |_| {
                        chunk
                            .into_iter()
                            .map(|x| func(x, args, seeds))
                            .collect::<Vec<U>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<std::thread::Result<Vec<Vec<U>>>>()
        })
        .map_err(|_| DataError::concurrency("map stage worker scope panicked"))?
        .map_err(|_| DataError::concurrency("map stage worker panicked"))?;

        Ok(outputs.into_iter().flatten().collect())
    }

    fn draw_seeds(&self, sequencer: &SeedSequencer) -> Result<Vec<Seed>> {
        if self.num_seeds == 0 {
            return Ok(Vec::new());
        }
        let seeds = sequencer.next_seeds(self.num_seeds)?;
        tracing::debug!(num_seeds = self.num_seeds, first = ?seeds.first(), "drew stage seeds");
        Ok(seeds)
    }
}

impl<T, A, U> Clone for MapStage<T, A, U> {
    fn clone(&self) -> Self {
        Self {
            num_seeds: self.num_seeds,
            func: Arc::clone(&self.func),
        }
    }
}

impl<T, A, U> fmt::Debug for MapStage<T, A, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStage")
            .field("num_seeds", &self.num_seeds)
            .finish_non_exhaustive()
    }
}

/// Lazy output of [`MapStage::apply`].
pub struct Mapped<I, T, A, U> {
    inner: I,
    func: Arc<StageFn<T, A, U>>,
    args: A,
    seeds: Vec<Seed>,
}

impl<I, T, A, U> Mapped<I, T, A, U> {
    /// Seeds drawn for this invocation; empty for unseeded stages.
    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }
}

impl<I, T, A, U> Iterator for Mapped<I, T, A, U>
where
    I: Iterator<Item = T>,
{
    type Item = U;

    fn next(&mut self) -> Option<U> {
        let x = self.inner.next()?;
        Some((self.func)(x, &self.args, &self.seeds))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unseeded_stage_preserves_order_and_args() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(10));

        let add = MapStage::new(|x: i64, offset: &i64| x + offset);
        let out: Vec<i64> = add.apply(&sequencer, vec![1, 2, 3], 100).unwrap().collect();

        assert_eq!(out, vec![101, 102, 103]);
        // Unseeded stages never consume seeds.
        assert_eq!(sequencer.current_base(), Some(10));
    }

    #[test]
    fn test_single_seed_drawn_once_per_invocation() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(0));

        let stage = MapStage::with_seed(|x: u8, _: &(), seed: Seed| (x, seed));
        let out: Vec<(u8, Seed)> = stage
            .apply(&sequencer, vec![1, 2, 3, 4], ())
            .unwrap()
            .collect();

        assert!(out.iter().all(|(_, seed)| *seed == Seed::Pair(0, 1)));
        assert_eq!(sequencer.current_base(), Some(2));
    }

    #[test]
    fn test_multiple_seeds_passed_as_slice() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(4));

        let stage = MapStage::with_seeds(3, |_: (), _: &(), seeds: &[Seed]| seeds.to_vec()).unwrap();
        let out: Vec<Vec<Seed>> = stage.apply(&sequencer, vec![(), ()], ()).unwrap().collect();

        let expected = vec![Seed::Pair(4, 5), Seed::Pair(6, 7), Seed::Pair(8, 9)];
        assert_eq!(out, vec![expected.clone(), expected]);
        assert_eq!(sequencer.current_base(), Some(10));
    }

    #[test]
    fn test_with_seeds_rejects_zero() {
        let result = MapStage::with_seeds(0, |x: u8, _: &(), _: &[Seed]| x);
        assert!(result.is_err());
    }

    #[test]
    fn test_sequential_stages_do_not_overlap() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(0));

        let a = MapStage::with_seeds(2, |_: u8, _: &(), seeds: &[Seed]| seeds.to_vec()).unwrap();
        let b = MapStage::with_seed(|_: u8, _: &(), seed: Seed| seed);

        let a_seeds = a.apply(&sequencer, vec![0], ()).unwrap().next().unwrap();
        let b_seed = b.apply(&sequencer, vec![0], ()).unwrap().next().unwrap();

        assert_eq!(a_seeds, vec![Seed::Pair(0, 1), Seed::Pair(2, 3)]);
        assert_eq!(b_seed, Seed::Pair(4, 5));
    }

    #[test]
    fn test_empty_input_still_advances() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(0));

        let stage = MapStage::with_seed(|x: u8, _: &(), _: Seed| x);
        let mapped = stage.apply(&sequencer, Vec::<u8>::new(), ()).unwrap();

        assert_eq!(mapped.seeds(), &[Seed::Pair(0, 1)]);
        assert_eq!(mapped.count(), 0);
        assert_eq!(sequencer.current_base(), Some(2));
    }

    #[test]
    fn test_apply_is_lazy() {
        let sequencer = SeedSequencer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let stage = MapStage::new(move |x: u32, _: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            x * 2
        });

        let mut mapped = stage.apply(&sequencer, 0..100, ()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(mapped.next(), Some(0));
        assert_eq!(mapped.next(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unscoped_seeded_stage_gets_sentinel() {
        let sequencer = SeedSequencer::new();
        let stage = MapStage::with_seed(|_: u8, _: &(), seed: Seed| seed);
        let out: Vec<Seed> = stage.apply(&sequencer, vec![1, 2], ()).unwrap().collect();
        assert_eq!(out, vec![Seed::Unspecified, Seed::Unspecified]);
    }

    #[test]
    fn test_apply_parallel_preserves_order() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(20));

        let stage = MapStage::with_seed(|x: u64, scale: &u64, seed: Seed| {
            let (a, _) = seed.pair().unwrap();
            x * scale + a as u64
        });

        let input: Vec<u64> = (0..1000).collect();
        let out = stage.apply_parallel(&sequencer, input, 3, 7).unwrap();

        let expected: Vec<u64> = (0..1000).map(|x| x * 3 + 20).collect();
        assert_eq!(out, expected);
        assert_eq!(sequencer.current_base(), Some(22));
    }

    #[test]
    fn test_apply_parallel_more_workers_than_elements() {
        let sequencer = SeedSequencer::new();
        let stage = MapStage::new(|x: String, suffix: &String| format!("{x}{suffix}"));
        let out = stage
            .apply_parallel(&sequencer, vec!["a".to_string(), "b".to_string()], "!".to_string(), 16)
            .unwrap();
        assert_eq!(out, vec!["a!", "b!"]);
    }

    #[test]
    fn test_apply_parallel_empty_input_advances() {
        let sequencer = SeedSequencer::new();
        let _scope = sequencer.enter_scope(Some(0));
        let stage = MapStage::with_seeds(2, |x: u8, _: &(), _: &[Seed]| x).unwrap();
        let out = stage.apply_parallel(&sequencer, Vec::new(), (), 4).unwrap();
        assert!(out.is_empty());
        assert_eq!(sequencer.current_base(), Some(4));
    }
}
