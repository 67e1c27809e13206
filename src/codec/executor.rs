// src/codec/executor.rs

//! Runs one job per slice, on the rayon pool when the `rayon` feature is
//! enabled and the caller asks for it, in order on the calling thread
//! otherwise. Results come back in slice order either way.

#[cfg(feature = "rayon")]
pub(crate) fn map_slices<T, R, F>(items: Vec<T>, parallel: bool, job: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    if parallel && items.len() > 1 {
        use rayon::prelude::*;
        items.into_par_iter().map(job).collect()
    } else {
        items.into_iter().map(job).collect()
    }
}

#[cfg(not(feature = "rayon"))]
pub(crate) fn map_slices<T, R, F>(items: Vec<T>, _parallel: bool, job: F) -> Vec<R>
where
    F: Fn(T) -> R,
{
    items.into_iter().map(job).collect()
}
