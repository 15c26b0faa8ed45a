//! One-shot memoizing holder.
//!
//! Tolerates a benign race where two callers both run the producer; every
//! caller ends up observing some fully computed value, and once a value is
//! published no caller ever sees the unpublished state again. Built on
//! `arc-swap` rather than `std::sync::OnceLock` / `once_cell` on purpose:
//! those serialize racing callers through an internal lock on first access,
//! which is exactly the hot-path locking this design avoids (spec-wise,
//! "tolerates" racing recomputation rather than preventing it).

use std::sync::Arc;

use arc_swap::ArcSwapOption;

type Producer<T> = Box<dyn Fn() -> T + Send + Sync>;

pub struct Lazy<T> {
    value: ArcSwapOption<T>,
    producer: ArcSwapOption<Producer<T>>,
}

impl<T: Send + Sync + 'static> Lazy<T> {
    /// Creates a holder that computes its value with `producer` on first use.
    pub fn new(producer: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let boxed: Producer<T> = Box::new(producer);
        Self {
            value: ArcSwapOption::empty(),
            producer: ArcSwapOption::from_pointee(boxed),
        }
    }

    /// Creates a holder whose value is already known.
    pub fn ready(value: T) -> Self {
        Self {
            value: ArcSwapOption::from_pointee(value),
            producer: ArcSwapOption::empty(),
        }
    }

    /// Returns the memoized value, computing it on first call.
    ///
    /// No locks guard this read: a cache hit is a single atomic load. On a
    /// cache miss the producer runs outside any lock, so a racing caller may
    /// run it concurrently; only the stable published result is ever handed
    /// back.
    pub fn get(&self) -> Arc<T> {
        if let Some(value) = self.value.load_full() {
            return value;
        }
        let Some(producer) = self.producer.load_full() else {
            // Another thread already took and ran the producer and hasn't
            // published yet. Spin until it does; the window is a handful of
            // instructions (one allocation plus a store).
            loop {
                if let Some(value) = self.value.load_full() {
                    return value;
                }
                std::hint::spin_loop();
            }
        };
        let computed = Arc::new(producer());
        self.value
            .compare_and_swap(&None::<Arc<T>>, Some(Arc::clone(&computed)));
        // Release the producer; harmless if another racing caller is still
        // mid-invocation with its own loaded clone.
        self.producer.store(None);
        self.value.load_full().unwrap_or(computed)
    }
}
