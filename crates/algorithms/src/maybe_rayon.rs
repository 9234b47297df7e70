//! `rayon` when the `parallel` feature is on, plain iterators otherwise.
//!
//! Only the entry point used in this crate is shimmed: `into_par_iter()`
//! falls back to `into_iter()`, and the rest of the chain resolves to the
//! standard `Iterator` methods. Results are the same either way.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
