//! Slurm workload-manager backend: CLI runner with pipe-delimited output
//! parsing, and the scheduler operation adapters.

pub mod cli;
pub mod ops;

pub use cli::{parse_duration_secs, CmdOutput, Program, SlurmCli, SlurmRun};
