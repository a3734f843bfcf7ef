//! Parallelism policy shared by the block engine and the tree predictor.
//!
//! Components never build thread pools themselves. They receive a
//! [`Parallelism`] flag and either use `rayon` parallel iterators or plain
//! sequential iteration. The pool itself is installed once at the operator
//! level via [`run_with_threads`].

use rayon::prelude::*;

/// Whether work may be spread over the current rayon pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Map a worker count to a policy.
    ///
    /// `1` is sequential. `0` follows the current pool: parallel unless it
    /// has a single thread. Anything larger is parallel.
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        match n_threads {
            1 => Parallelism::Sequential,
            0 if rayon::current_num_threads() <= 1 => Parallelism::Sequential,
            _ => Parallelism::Parallel,
        }
    }

    #[inline]
    pub fn is_parallel(self) -> bool {
        self == Parallelism::Parallel
    }

    /// Map `f` over `items`, keeping input order in the result.
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, items: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        match self {
            Parallelism::Parallel => items.into_par_iter().map(f).collect(),
            Parallelism::Sequential => items.into_iter().map(f).collect(),
        }
    }

    /// Run `f` on every item of a `Send` iterator such as `chunks_mut`.
    /// Order is only guaranteed when sequential.
    #[inline]
    pub fn maybe_par_bridge_for_each<T, I, F>(self, items: I, f: F)
    where
        T: Send,
        I: Iterator<Item = T> + Send,
        F: Fn(T) + Sync + Send,
    {
        match self {
            Parallelism::Parallel => items.par_bridge().for_each(f),
            Parallelism::Sequential => items.for_each(f),
        }
    }
}

/// Run `f` inside a rayon pool of `n_threads` workers (`0` = one per core).
///
/// With `n_threads == 1` no pool is built and `f` runs on the calling thread
/// with [`Parallelism::Sequential`].
///
/// # Errors
///
/// Fails if rayon cannot spawn the workers.
///
/// ```
/// use wqf::run_with_threads;
///
/// let sum = run_with_threads(1, |_| (0..10).sum::<i32>()).unwrap();
/// assert_eq!(sum, 45);
/// ```
pub fn run_with_threads<T: Send>(
    n_threads: usize,
    f: impl FnOnce(Parallelism) -> T + Send,
) -> Result<T, rayon::ThreadPoolBuildError> {
    if n_threads == 1 {
        return Ok(f(Parallelism::Sequential));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()?;
    Ok(pool.install(|| f(Parallelism::from_threads(n_threads))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_counts_map_to_policy() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert!(Parallelism::from_threads(4).is_parallel());
    }

    #[test]
    fn par_map_keeps_block_order() {
        let blocks: Vec<usize> = (0..100).collect();
        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let squares = parallelism.maybe_par_map(blocks.clone(), |b| b * b);
            assert_eq!(squares, (0..100).map(|b| b * b).collect::<Vec<_>>());
        }
    }

    #[test]
    fn bridge_touches_every_row_block() {
        let mut rows = vec![0u32; 10];
        Parallelism::Parallel.maybe_par_bridge_for_each(rows.chunks_mut(3), |block| {
            block.iter_mut().for_each(|v| *v += 1);
        });
        assert!(rows.iter().all(|&v| v == 1));
    }

    #[test]
    fn single_worker_runs_inline() {
        assert_eq!(run_with_threads(1, |p| p).unwrap(), Parallelism::Sequential);
    }

    #[test]
    fn worker_pool_enables_parallelism() {
        assert_eq!(run_with_threads(2, |p| p).unwrap(), Parallelism::Parallel);
    }
}
