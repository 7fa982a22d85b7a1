//! Minimal local-system adapter.
//!
//! A deliberately simplified alternative to the richer backend adapters:
//! each function wraps one OS account-management command (or a reduced
//! scheduler command) and returns a plain boolean. Failures are logged at
//! `warn!` and collapse to `false`; there is no error taxonomy here.

use log::{debug, warn};
use std::process::Command;

fn run(program: &str, args: &[&str]) -> bool {
    debug!("running {} {:?}", program, args);
    match Command::new(program).args(args).output() {
        Ok(output) => {
            if !output.status.success() {
                warn!(
                    "{} {:?} exited with {:?}: {}",
                    program,
                    args,
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            output.status.success()
        }
        Err(e) => {
            warn!("failed to spawn {}: {}", program, e);
            false
        }
    }
}

/// True iff the group exists in the system group database.
pub fn group_exists(group: &str) -> bool {
    run("getent", &["group", group])
}

/// True iff the user exists in the system user database.
pub fn user_exists(user: &str) -> bool {
    run("id", &["-u", user])
}

/// Create a group, optionally with a fixed gid.
pub fn group_add(group: &str, gid: Option<u32>) -> bool {
    match gid {
        Some(gid) => run("groupadd", &["-g", &gid.to_string(), group]),
        None => run("groupadd", &[group]),
    }
}

/// Rename a group.
pub fn group_rename(group: &str, new_name: &str) -> bool {
    run("groupmod", &["-n", new_name, group])
}

/// Delete a group.
pub fn group_delete(group: &str) -> bool {
    run("groupdel", &[group])
}

/// Add a user to a supplementary group.
pub fn user_add_to_group(user: &str, group: &str) -> bool {
    run("usermod", &["-aG", group, user])
}

/// Remove a user from a group.
pub fn user_remove_from_group(user: &str, group: &str) -> bool {
    run("gpasswd", &["-d", user, group])
}

/// Create a directory owned by `owner` with the given mode string.
pub fn create_owned_dir(path: &str, owner: &str, mode: &str) -> bool {
    run("mkdir", &["-p", path]) && run("chown", &[owner, path]) && run("chmod", &[mode, path])
}

/// True iff the scheduler account exists.
pub fn slurm_account_exists(account: &str) -> bool {
    match Command::new("sacctmgr")
        .args(["-nP", "show", "account", account, "format=account"])
        .output()
    {
        Ok(output) => {
            output.status.success() && !String::from_utf8_lossy(&output.stdout).trim().is_empty()
        }
        Err(e) => {
            warn!("failed to spawn sacctmgr: {}", e);
            false
        }
    }
}

/// Create a scheduler account.
pub fn slurm_account_add(account: &str) -> bool {
    run("sacctmgr", &["-i", "add", "account", account])
}

/// Associate a user with a scheduler account.
pub fn slurm_user_add(user: &str, account: &str) -> bool {
    run(
        "sacctmgr",
        &["-i", "add", "user", user, &format!("account={}", account)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // These wrappers shell out to system tools, so tests stay with what
    // can run anywhere: a spawn failure must collapse to false, not
    // panic or error.
    #[test]
    fn test_missing_binary_is_false() {
        assert!(!run("definitely-not-a-real-binary-xyz", &[]));
    }

    #[test]
    fn test_true_binary_succeeds() {
        assert!(run("true", &[]));
        assert!(!run("false", &[]));
    }
}
