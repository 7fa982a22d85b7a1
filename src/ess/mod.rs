//! IBM Spectrum Scale (ESS/GPFS) storage backend: REST transport client
//! with asynchronous-job polling, and the storage operation adapters.

pub mod client;
pub mod ops;

pub use client::{classify_ess_error, EssClient, EssRest};
