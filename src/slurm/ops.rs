//! Scheduler operation adapters over the Slurm accounting CLI.
//!
//! Account credits are granted in core-minutes; the fairshare weight is
//! the per-day share (`credits / 1440`) and the raw credit figure becomes
//! the account's billing limit (`GrpTRESMins=billing=credits`).

use crate::errors::{OpError, OpResult};
use crate::request::{OpRequest, OutputBuilder};
use crate::slurm::cli::{parse_duration_secs, split_fields, CmdOutput, Program, SlurmRun};
use crate::validate::validate_name;

const MINUTES_PER_DAY: u64 = 1440;

/// QoS name that must never be modified through this interface.
const RESERVED_QOS: &str = "normal";

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Fail with the backend's own exit code and stderr when a mutating
/// command did not succeed.
fn expect_success(output: CmdOutput) -> Result<CmdOutput, OpError> {
    if output.success() {
        Ok(output)
    } else {
        Err(OpError::backend(
            output.status,
            output.stderr.trim().to_string(),
        ))
    }
}

fn account_exists(run: &dyn SlurmRun, account: &str) -> Result<bool, OpError> {
    let output = expect_success(run.run(
        Program::Sacctmgr,
        &args(&[
            "-nP",
            "show",
            "account",
            account,
            "format=account",
        ]),
    )?)?;
    Ok(!output.lines().is_empty())
}

/// Users associated with an account, from the association table.
fn associated_users(run: &dyn SlurmRun, account: &str) -> Result<Vec<String>, OpError> {
    let output = expect_success(run.run(
        Program::Sacctmgr,
        &args(&[
            "-nP",
            "show",
            "association",
            &format!("account={}", account),
            "format=user",
        ]),
    )?)?;
    Ok(output.lines().iter().map(|l| l.to_string()).collect())
}

fn association_exists(run: &dyn SlurmRun, account: &str, user: &str) -> Result<bool, OpError> {
    let output = expect_success(run.run(
        Program::Sacctmgr,
        &args(&[
            "-nP",
            "show",
            "association",
            &format!("account={}", account),
            &format!("user={}", user),
            "format=user",
        ]),
    )?)?;
    Ok(!output.lines().is_empty())
}

/// Create an account, optionally granting credits.
pub fn account_create(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let account = req.required_name("account")?;
    let credits = req.optional_u64("credits")?;
    let parent = req.optional("parent")?;
    let description = req.optional("description")?;
    let organization = req.optional("organization")?;

    if account_exists(run, account)? {
        return Err(OpError::AlreadyExists(account.to_string()));
    }

    let mut cmd = args(&["-i", "add", "account", account]);
    if let Some(parent) = parent {
        if !validate_name(parent) {
            return Err(OpError::InvalidField("parent".to_string()));
        }
        cmd.push(format!("parent={}", parent));
    }
    if let Some(description) = description {
        cmd.push(format!("Description={}", description));
    }
    if let Some(organization) = organization {
        cmd.push(format!("Organization={}", organization));
    }
    if let Some(credits) = credits {
        cmd.push(format!("Fairshare={}", credits / MINUTES_PER_DAY));
        cmd.push(format!("GrpTRESMins=billing={}", credits));
    }

    expect_success(run.run(Program::Sacctmgr, &cmd)?)?;
    Ok(OutputBuilder::new().build())
}

/// Report an account's share weight and accumulated raw usage.
pub fn account_query(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let account = req.required_name("account")?;

    let output = expect_success(run.run(
        Program::Sshare,
        &args(&["-A", account, "-nP", "-o", "Account,RawShares,RawUsage"]),
    )?)?;
    let lines = output.lines();
    let Some(line) = lines.first() else {
        return Err(OpError::NotFound(account.to_string()));
    };

    let fields = split_fields(line);
    let fairshare = fields
        .get(1)
        .and_then(|f| f.parse::<u64>().ok())
        .unwrap_or(0);
    let usage = fields
        .get(2)
        .and_then(|f| f.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(OutputBuilder::new()
        .field("fairshare", fairshare)
        .field("usage", usage)
        .build())
}

/// Delete an account. Refused while any user is still associated.
pub fn account_delete(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let account = req.required_name("account")?;

    if !account_exists(run, account)? {
        return Err(OpError::NotFound(account.to_string()));
    }
    let users = associated_users(run, account)?;
    if !users.is_empty() {
        return Err(OpError::Precondition(format!(
            "account {} still has {} associated user(s)",
            account,
            users.len()
        )));
    }

    expect_success(run.run(Program::Sacctmgr, &args(&["-i", "delete", "account", account]))?)?;
    Ok(OutputBuilder::new().build())
}

/// Associate a user with an account. Adding an existing association is a
/// no-op.
pub fn user_add_to_account(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let account = req.required_name("account")?;
    let user = req.required_name("user")?;

    if !account_exists(run, account)? {
        return Err(OpError::NotFound(account.to_string()));
    }
    if association_exists(run, account, user)? {
        return Ok(OutputBuilder::new().build());
    }

    expect_success(run.run(
        Program::Sacctmgr,
        &args(&["-i", "add", "user", user, &format!("account={}", account)]),
    )?)?;
    Ok(OutputBuilder::new().build())
}

/// Remove a user's association with an account.
pub fn user_remove_from_account(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let account = req.required_name("account")?;
    let user = req.required_name("user")?;

    if !association_exists(run, account, user)? {
        return Err(OpError::NotFound(format!("{} in {}", user, account)));
    }

    expect_success(run.run(
        Program::Sacctmgr,
        &args(&[
            "-i",
            "delete",
            "user",
            user,
            &format!("account={}", account),
        ]),
    )?)?;
    Ok(OutputBuilder::new().build())
}

/// Direction of a QoS modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QosOp {
    Add,
    Remove,
}

/// Parse a sign-prefixed QoS list: `+qos1,qos2` adds, `-qos1` removes.
/// The reserved `normal` QoS is always rejected.
fn parse_qos_spec(spec: &str) -> Result<(QosOp, Vec<String>), OpError> {
    let (op, rest) = match spec.chars().next() {
        Some('+') => (QosOp::Add, &spec[1..]),
        Some('-') => (QosOp::Remove, &spec[1..]),
        _ => return Err(OpError::InvalidField("qos".to_string())),
    };

    let names: Vec<String> = rest
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(OpError::InvalidField("qos".to_string()));
    }
    for name in &names {
        if name == RESERVED_QOS || !validate_name(name) {
            return Err(OpError::InvalidField("qos".to_string()));
        }
    }
    Ok((op, names))
}

/// QoS names known to the scheduler.
fn qos_catalog(run: &dyn SlurmRun) -> Result<Vec<String>, OpError> {
    let output = expect_success(run.run(
        Program::Sacctmgr,
        &args(&["-nP", "show", "qos", "format=name"]),
    )?)?;
    Ok(output.lines().iter().map(|l| l.to_string()).collect())
}

/// Add or remove QoS entries on an account.
pub fn qos_modify(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let account = req.required_name("account")?;
    let spec = req.required("qos")?;

    let (op, names) = parse_qos_spec(spec)?;

    let catalog = qos_catalog(run)?;
    for name in &names {
        if !catalog.contains(name) {
            return Err(OpError::NotFound(name.clone()));
        }
    }

    let assignment = match op {
        QosOp::Add => format!("qos+={}", names.join(",")),
        QosOp::Remove => format!("qos-={}", names.join(",")),
    };
    expect_success(run.run(
        Program::Sacctmgr,
        &args(&["-i", "modify", "account", account, "set", &assignment]),
    )?)?;
    Ok(OutputBuilder::new().build())
}

/// Look up accounting data for a job.
pub fn job_query(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let jobid = req.required_u64("jobid")?;

    let output = expect_success(run.run(
        Program::Sacct,
        &args(&[
            "-j",
            &jobid.to_string(),
            "-nP",
            "-o",
            "State,User,Account,JobName,Partition,Elapsed,Timelimit",
        ]),
    )?)?;
    let lines = output.lines();
    let Some(line) = lines.first() else {
        return Err(OpError::NotFound(jobid.to_string()));
    };

    let fields = split_fields(line);
    if fields.len() < 7 {
        return Err(OpError::backend(
            "sacct",
            format!("unexpected accounting record: {}", line),
        ));
    }

    Ok(OutputBuilder::new()
        .field("state", fields[0])
        .field("user", fields[1])
        .field("account", fields[2])
        .field("name", fields[3])
        .field("partition", fields[4])
        .field("runtime", parse_duration_secs(fields[5])?)
        .field("timelimit", parse_duration_secs(fields[6])?)
        .build())
}

/// Request cancellation of a job. The request is unconditional; no
/// existence check is performed first.
pub fn job_cancel(run: &dyn SlurmRun, req: &OpRequest) -> OpResult {
    let jobid = req.required_u64("jobid")?;
    expect_success(run.run(Program::Scancel, &args(&[&jobid.to_string()]))?)?;
    Ok(OutputBuilder::new().build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qos_spec_add_and_remove() {
        let (op, names) = parse_qos_spec("+fast,gpu-high").unwrap();
        assert_eq!(op, QosOp::Add);
        assert_eq!(names, vec!["fast", "gpu-high"]);

        let (op, names) = parse_qos_spec("-fast").unwrap();
        assert_eq!(op, QosOp::Remove);
        assert_eq!(names, vec!["fast"]);
    }

    #[test]
    fn test_parse_qos_spec_rejects_reserved_normal() {
        assert!(matches!(
            parse_qos_spec("+normal"),
            Err(OpError::InvalidField(f)) if f == "qos"
        ));
        assert!(matches!(
            parse_qos_spec("-normal"),
            Err(OpError::InvalidField(_))
        ));
        assert!(matches!(
            parse_qos_spec("+fast,normal"),
            Err(OpError::InvalidField(_))
        ));
    }

    #[test]
    fn test_parse_qos_spec_requires_sign_prefix() {
        assert!(parse_qos_spec("fast").is_err());
        assert!(parse_qos_spec("+").is_err());
        assert!(parse_qos_spec("").is_err());
    }

    #[test]
    fn test_fairshare_formula() {
        assert_eq!(1440 / MINUTES_PER_DAY, 1);
        assert_eq!(28_800 / MINUTES_PER_DAY, 20);
    }
}
