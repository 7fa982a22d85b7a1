//! FreeIPA identity backend: JSON-RPC transport client and the identity
//! operation adapters built on top of it.

pub mod client;
pub mod ops;

pub use client::{classify_ipa_error, IpaClient, IpaRpc};
