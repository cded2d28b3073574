//! Process-scoped in-memory stores.
//!
//! Both stores are shared across concurrent calls behind an `Arc`; every
//! operation takes the lock once, so each insert/lookup is an atomic
//! read-modify-write. Nothing survives a restart.

pub mod orders;
pub mod products;
