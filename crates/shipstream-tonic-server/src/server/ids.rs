//! The fresh-identifier capability.
//!
//! Stores and the shipment aggregator never mint identifiers themselves; they
//! are handed an [`IdSource`] at construction. Production wiring uses random
//! UUIDs, tests substitute a deterministic sequence.

use uuid::Uuid;

/// Source of fresh identifiers for stored entities and emitted shipments.
pub trait IdSource: Send + Sync + 'static {
    /// Returns a new identifier, unique for the lifetime of the process.
    fn fresh_id(&self) -> String;
}

/// Random identifiers backed by UUID v4.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn fresh_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::IdSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic identifiers (`id-0`, `id-1`, ...) for tests.
    #[derive(Debug, Default)]
    pub(crate) struct SeqSource {
        next: AtomicUsize,
    }

    impl IdSource for SeqSource {
        fn fresh_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            format!("id-{n}")
        }
    }
}
