//! Scheduled expiry of cache entries.
//!
//! A single background task per cache keeps every pending deadline and
//! evicts entries once their TTL has elapsed.

mod scheduler;

pub(crate) use scheduler::ExpiryHandle;
pub(crate) use scheduler::ExpiryScheduler;
