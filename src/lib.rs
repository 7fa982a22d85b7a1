//! Example extension programs for a resource-provider integration layer.
//!
//! Each module is a thin, stateless translation layer: validate the named
//! arguments of an operation request, issue one or more HTTP requests or
//! shell commands against a concrete backend, map backend-specific error
//! codes onto a small generic taxonomy, and shape the response into a plain
//! key/value result.
//!
//! Backends covered:
//! - FreeIPA identity server (JSON-RPC over HTTPS), [`ipa`]
//! - IBM Spectrum Scale / ESS storage manager (REST over HTTPS), [`ess`]
//! - Slurm workload manager (local CLI invocation), [`slurm`]
//! - local OS account database, [`simple`] and [`sync`]

pub mod config;
pub mod errors;
pub mod ess;
pub mod ipa;
pub mod request;
pub mod simple;
pub mod slurm;
pub mod sync;
pub mod validate;

pub use config::ExtensionConfig;
pub use errors::{OpError, OpResult};
pub use request::{OpOutput, OpRequest};
