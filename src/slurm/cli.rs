//! CLI runner for the Slurm accounting and control tools.
//!
//! All output is requested pipe-delimited without headers (`-nP`) and
//! parsed positionally. Mutating `sacctmgr` invocations always pass `-i`
//! so no interactive confirmation is ever attempted.

use log::{debug, warn};
use std::process::Command;

use crate::config::SlurmConfig;
use crate::errors::OpError;

/// Which Slurm tool to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Sacctmgr,
    Sshare,
    Sacct,
    Scancel,
}

/// Captured outcome of one CLI invocation.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Non-empty stdout lines.
    pub fn lines(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }
}

/// Seam between the scheduler adapters and process spawning. Production
/// code uses [`SlurmCli`]; tests substitute a fake.
pub trait SlurmRun {
    fn run(&self, program: Program, args: &[String]) -> Result<CmdOutput, OpError>;
}

/// Spawns the real Slurm tools. Executable names come from configuration
/// so tests and unusual installations can point elsewhere.
pub struct SlurmCli {
    config: SlurmConfig,
}

impl SlurmCli {
    pub fn new(config: SlurmConfig) -> Self {
        Self { config }
    }

    fn executable(&self, program: Program) -> &str {
        match program {
            Program::Sacctmgr => &self.config.sacctmgr,
            Program::Sshare => &self.config.sshare,
            Program::Sacct => &self.config.sacct,
            Program::Scancel => &self.config.scancel,
        }
    }
}

impl SlurmRun for SlurmCli {
    fn run(&self, program: Program, args: &[String]) -> Result<CmdOutput, OpError> {
        let exe = self.executable(program);
        debug!("running {} {:?}", exe, args);

        let output = Command::new(exe).args(args).output()?;
        let result = CmdOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success() {
            warn!(
                "{} exited with {}: {}",
                exe,
                result.status,
                result.stderr.trim()
            );
        }
        Ok(result)
    }
}

/// Parse a Slurm duration (`[D-]HH:MM:SS`, `MM:SS`, or a bare minute
/// count) into seconds. `UNLIMITED` and `Partition_Limit` map to 0.
pub fn parse_duration_secs(s: &str) -> Result<u64, OpError> {
    let s = s.trim();
    if s.is_empty()
        || s.eq_ignore_ascii_case("UNLIMITED")
        || s.eq_ignore_ascii_case("Partition_Limit")
    {
        return Ok(0);
    }

    let (days, rest) = match s.split_once('-') {
        Some((d, rest)) => {
            let days = d
                .parse::<u64>()
                .map_err(|_| OpError::InvalidField(format!("duration: {}", s)))?;
            (days, rest)
        }
        None => (0, s),
    };

    let parts: Vec<&str> = rest.split(':').collect();
    let mut fields = [0u64; 3];
    match parts.len() {
        // MM:SS as sacct emits for short jobs
        2 => {
            fields[1] = parse_part(parts[0], s)?;
            fields[2] = parse_part(parts[1], s)?;
        }
        3 => {
            fields[0] = parse_part(parts[0], s)?;
            fields[1] = parse_part(parts[1], s)?;
            fields[2] = parse_part(parts[2], s)?;
        }
        // bare minutes, as sacctmgr reports time limits
        1 => {
            let minutes = parse_part(parts[0], s)?;
            return Ok(days * 86_400 + minutes * 60);
        }
        _ => return Err(OpError::InvalidField(format!("duration: {}", s))),
    }

    Ok(days * 86_400 + fields[0] * 3600 + fields[1] * 60 + fields[2])
}

fn parse_part(part: &str, whole: &str) -> Result<u64, OpError> {
    // sacct may append fractional seconds (e.g. 00:00:01.123)
    let part = part.split('.').next().unwrap_or(part);
    part.parse::<u64>()
        .map_err(|_| OpError::InvalidField(format!("duration: {}", whole)))
}

/// Split one pipe-delimited output line into its positional fields.
pub fn split_fields(line: &str) -> Vec<&str> {
    line.split('|').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_with_days() {
        assert_eq!(parse_duration_secs("1-02:03:04").unwrap(), 93_784);
        assert_eq!(parse_duration_secs("2-00:00:00").unwrap(), 172_800);
    }

    #[test]
    fn test_parse_duration_hms_and_ms() {
        assert_eq!(parse_duration_secs("02:03:04").unwrap(), 7_384);
        assert_eq!(parse_duration_secs("03:04").unwrap(), 184);
        assert_eq!(parse_duration_secs("00:00:01.123").unwrap(), 1);
    }

    #[test]
    fn test_parse_duration_unlimited() {
        assert_eq!(parse_duration_secs("UNLIMITED").unwrap(), 0);
        assert_eq!(parse_duration_secs("Partition_Limit").unwrap(), 0);
        assert_eq!(parse_duration_secs("").unwrap(), 0);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration_secs("abc").is_err());
        assert!(parse_duration_secs("1:2:3:4").is_err());
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(
            split_fields("RUNNING|alice|proj1|train|gpu"),
            vec!["RUNNING", "alice", "proj1", "train", "gpu"]
        );
    }

    #[test]
    fn test_cmd_output_lines_skip_blanks() {
        let out = CmdOutput {
            status: 0,
            stdout: "a\n\n b \n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.lines(), vec!["a", "b"]);
    }
}
