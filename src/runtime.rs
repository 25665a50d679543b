//! Shared Runtime

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

/// Global multi-thread runtime reused by the blocking CLI entry points.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .thread_name("riskintel-worker")
        .enable_all()
        .build()
        .expect("failed to build global runtime")
});

/// Run a future to completion on the shared runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    RUNTIME.block_on(future)
}

#[cfg(test)]
mod tests {
    #[test]
    fn runtime_is_reusable_across_calls() {
        let first = super::block_on(async { 21 * 2 });
        let second = super::block_on(async { first + 1 });
        assert_eq!(second, 43);
    }
}
